//! # PARITY Protocol
//!
//! A synthetic asset whose price tracks the KSM/DOT market capitalization
//! ratio, backed by a multi-asset reserve of KSM, DOT and a stablecoin.
//!
//! ## Architecture
//!
//! - **Oracle**: weighted average consensus over a small reporter set
//! - **Reserve**: protocol-owned collateral and the surplus sweeper
//! - **Trading**: proactive market maker swaps against the reserve
//! - **NAV**: the accumulator that receives contributions and pays premiums
//! - **Policy**: the dynamic burn policy and per-user activity baselines
//! - **Protocol**: the engine that composes mint, burn, swap and maintenance
//!
//! Every state-changing operation runs inside an all-or-nothing
//! transaction: a failed operation leaves no trace and emits no events.
//!
//! ## Example
//!
//! ```rust,ignore
//! use parity::prelude::*;
//!
//! let admin = Address::from_label("admin");
//! let mut engine = ProtocolEngine::new(ProtocolConfig::default(), RoleRegistry::with_admin(admin))?;
//! engine.begin_block(1, 1_000)?;
//! engine.add_reporter(&admin, Address::from_label("reporter"), 10)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod governance;
pub mod nav;
pub mod oracle;
pub mod policy;
pub mod protocol;
pub mod reserve;
pub mod storage;
pub mod trading;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        access::{AllowAll, AuthorizationPolicy, Capability, RoleRegistry},
        asset::{Asset, AssetBalances},
        config::ProtocolConfig,
        token::{ParityToken, TokenAmount},
    };
    pub use crate::error::{Error, Result};
    pub use crate::governance::ProtocolParameter;
    pub use crate::nav::{NavAccumulator, NavPayoutMode};
    pub use crate::oracle::{OracleConsensus, PriceSubmission};
    pub use crate::protocol::{
        BurnOp, EngineState, MintOp, MultiBurnOp, ProtocolEngine, ProtocolEvent, SubmitPriceOp,
        SwapOp, TransferOp,
    };
    pub use crate::storage::{InMemoryStore, StateManager};
    pub use crate::utils::{
        crypto::{Address, Hash},
        math::FixedPoint,
    };
}

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name
pub const PROTOCOL_NAME: &str = "PARITY";
