//! Protocol module - orchestration of every PARITY component.
//!
//! The [`ProtocolEngine`] runs mints, burns, swaps, transfers and price
//! submissions as atomic transactions over a single [`EngineState`], and
//! records what happened in an [`EventLog`].

pub mod calculations;
pub mod engine;
pub mod events;
pub mod guard;
pub mod operations;
pub mod statistics;

pub use calculations::*;
pub use engine::*;
pub use events::*;
pub use guard::*;
pub use operations::*;
pub use statistics::*;
