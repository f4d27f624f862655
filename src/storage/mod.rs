//! Storage module for persistent engine state.
//!
//! ## Backends
//!
//! - **InMemoryStore**: ephemeral storage for tests and dry runs
//! - **FileStore**: JSON file persistence for the CLI
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parity::storage::{FileStore, StateManager};
//!
//! let manager = StateManager::new(FileStore::open("./parity-data")?);
//! manager.save_state(engine.state())?;
//! ```

pub mod backend;
pub mod state;

pub use backend::*;
pub use state::*;
