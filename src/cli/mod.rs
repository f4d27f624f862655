//! PARITY command line support.
//!
//! The `parity` binary is a thin shell over these pieces: [`CliConfig`]
//! resolves paths and configuration, [`ScenarioRunner`] drives an engine
//! through scripted steps, and [`OutputFormatter`] prints the results.

pub mod config;
pub mod output;
pub mod scenario;

pub use config::*;
pub use output::*;
pub use scenario::*;
