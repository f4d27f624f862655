//! Protocol events for state change notifications.
//!
//! Every committed state change emits one or more events. Events are
//! buffered per transaction and only reach the block's [`EventLog`] when
//! the transaction commits, so an aborted operation emits nothing.

use serde::{Deserialize, Serialize};

use crate::core::access::Capability;
use crate::core::asset::{Asset, AssetBalances, AssetPrices};
use crate::utils::crypto::{merkle_root, Address, Hash};
use crate::utils::math::FixedPoint;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

macro_rules! protocol_events {
    ($( $(#[$doc:meta])* $variant:ident($event:ident) ),+ $(,)?) => {
        /// All protocol event types
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub enum ProtocolEvent {
            $( $(#[$doc])* $variant($event), )+
        }

        impl ProtocolEvent {
            /// Get the event type as a string
            pub fn event_type(&self) -> &'static str {
                match self {
                    $( Self::$variant(_) => stringify!($variant), )+
                }
            }

            /// Get the timestamp of the event
            pub fn timestamp(&self) -> u64 {
                match self {
                    $( Self::$variant(e) => e.timestamp, )+
                }
            }

            /// Get the block height of the event
            pub fn block_height(&self) -> u64 {
                match self {
                    $( Self::$variant(e) => e.block_height, )+
                }
            }
        }
    };
}

protocol_events! {
    // Oracle
    /// A reporter submitted a price
    PriceSubmitted(PriceSubmittedEvent),
    /// Consensus was recomputed
    ConsensusUpdated(ConsensusUpdatedEvent),
    /// Too few live reporters to update consensus
    QuorumNotMet(QuorumNotMetEvent),
    /// Bootstrap ended and quorum reached its configured value
    BootstrapCompleted(BootstrapCompletedEvent),
    /// Reporter registered
    ReporterAdded(ReporterAddedEvent),
    /// Reporter removed
    ReporterRemoved(ReporterRemovedEvent),

    // Token
    /// PARITY minted against collateral
    Minted(MintedEvent),
    /// PARITY burned for collateral
    Burned(BurnedEvent),
    /// PARITY transferred
    Transferred(TransferredEvent),

    // Trading
    /// Swap settled against the reserve
    Swapped(SwappedEvent),
    /// Slippage was zero or at the cap
    SlippageAnomaly(SlippageAnomalyEvent),

    // NAV / reserve
    /// Protocol-owned liquidity added to the reserve
    ReserveDeposited(ReserveDepositedEvent),
    /// Collateral added to the NAV pool
    NavContributed(NavContributedEvent),
    /// Collateral paid out of the NAV pool
    NavDistributed(NavDistributedEvent),
    /// NAV holdings moved back toward target weights
    NavRebalanced(NavRebalancedEvent),
    /// Reserve surplus sent to the sink
    SurplusSwept(SurplusSweptEvent),
    /// A maintenance task failed and was skipped
    MaintenanceFailed(MaintenanceFailedEvent),

    // Administration
    /// A protocol parameter changed
    ParameterChanged(ParameterChangedEvent),
    /// Capability granted
    RoleGranted(RoleChangedEvent),
    /// Capability revoked
    RoleRevoked(RoleChangedEvent),
    /// User operations halted
    Paused(PauseEvent),
    /// User operations resumed
    Unpaused(PauseEvent),
}

impl ProtocolEvent {
    /// Compute event hash
    pub fn hash(&self) -> Hash {
        let data = bincode::serialize(self).unwrap_or_default();
        Hash::sha256(&data)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when a reporter submits a price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSubmittedEvent {
    /// Reporter
    pub reporter: Address,
    /// Reported prices
    pub prices: AssetPrices,
    /// Reported confidence (0-100)
    pub confidence: u8,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when consensus is recomputed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusUpdatedEvent {
    /// Weighted consensus prices
    pub prices: AssetPrices,
    /// KSM/DOT market cap ratio
    pub consensus_ratio: FixedPoint,
    /// Weighted confidence
    pub confidence: u8,
    /// Reporters that contributed
    pub live_reporters: usize,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a submission could not update consensus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumNotMetEvent {
    /// Reporters with fresh records
    pub live_reporters: usize,
    /// Quorum in force
    pub quorum: usize,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when bootstrap mode ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapCompletedEvent {
    /// Quorum now in force
    pub quorum: usize,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a reporter is registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterAddedEvent {
    /// Reporter
    pub reporter: Address,
    /// Consensus weight
    pub weight: u32,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a reporter is removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterRemovedEvent {
    /// Reporter
    pub reporter: Address,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when PARITY is minted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedEvent {
    /// Depositor
    pub user: Address,
    /// Deposited asset
    pub asset: Asset,
    /// Deposited amount
    pub amount: u128,
    /// PARITY credited to the user
    pub parity_minted: u128,
    /// PARITY credited to the surplus sink
    pub fee_parity: u128,
    /// Collateral routed to the NAV pool
    pub nav_amount: u128,
    /// Collateral deposited in the reserve
    pub reserve_amount: u128,
    /// PARITY price used
    pub parity_price: u64,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when PARITY is burned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnedEvent {
    /// Burner
    pub user: Address,
    /// PARITY destroyed
    pub parity_burned: u128,
    /// PARITY moved to the surplus sink
    pub fee_parity: u128,
    /// Signed policy adjustment in basis points
    pub policy_bps: i64,
    /// Collateral paid from the reserve
    pub reserve_payout: AssetBalances,
    /// Collateral routed from the reserve to the NAV pool
    pub nav_contribution: AssetBalances,
    /// Collateral paid from the NAV pool
    pub nav_payout: AssetBalances,
    /// Whole supply was burned
    pub final_burn: bool,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when PARITY changes hands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferredEvent {
    /// Sender
    pub from: Address,
    /// Recipient
    pub to: Address,
    /// Amount
    pub amount: u128,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRADING EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when a swap settles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwappedEvent {
    /// Trader, or the NAV pool for rebalance swaps
    pub trader: Address,
    /// Asset paid
    pub asset_in: Asset,
    /// Amount paid
    pub amount_in: u128,
    /// Asset received
    pub asset_out: Asset,
    /// Amount received
    pub amount_out: u128,
    /// Slippage applied
    pub slippage_bps: u64,
    /// Fee retained by the reserve
    pub fee_amount: u128,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when slippage is zero or at the cap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippageAnomalyEvent {
    /// Asset paid
    pub asset_in: Asset,
    /// Asset received
    pub asset_out: Asset,
    /// Slippage applied
    pub slippage_bps: u64,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAV / RESERVE EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when protocol-owned liquidity enters the reserve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveDepositedEvent {
    /// Depositor
    pub depositor: Address,
    /// Asset
    pub asset: Asset,
    /// Amount
    pub amount: u128,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when collateral enters the NAV pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavContributedEvent {
    /// Amounts added
    pub amounts: AssetBalances,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when the NAV pool pays out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavDistributedEvent {
    /// Recipient
    pub recipient: Address,
    /// Amounts paid
    pub amounts: AssetBalances,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted after a rebalance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavRebalancedEvent {
    /// Number of swaps executed
    pub swaps: usize,
    /// Holdings after the rebalance
    pub holdings: AssetBalances,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when reserve surplus is swept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurplusSweptEvent {
    /// Receiving account
    pub sink: Address,
    /// Amounts withdrawn
    pub withdrawn: AssetBalances,
    /// USD value withdrawn (18 decimals)
    pub value_usd: u128,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a maintenance task fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceFailedEvent {
    /// Task name (`rebalance` or `sweep`)
    pub task: String,
    /// Error message
    pub reason: String,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADMINISTRATION EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when a protocol parameter changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterChangedEvent {
    /// Parameter that changed
    pub parameter: String,
    /// Old value
    pub old_value: String,
    /// New value
    pub new_value: String,
    /// Account that made the change
    pub changed_by: Address,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted when a capability is granted or revoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChangedEvent {
    /// Account affected
    pub account: Address,
    /// Capability
    pub capability: Capability,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

/// Event emitted on pause and unpause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseEvent {
    /// Account that toggled the switch
    pub by: Address,
    /// Block height
    pub block_height: u64,
    /// Timestamp
    pub timestamp: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Collection of events from a transaction or block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<ProtocolEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn push(&mut self, event: ProtocolEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&ProtocolEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get the number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Merge another event log into this one
    pub fn merge(&mut self, other: EventLog) {
        self.events.extend(other.events);
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Merkle root of all event hashes
    pub fn merkle_root(&self) -> Hash {
        let hashes: Vec<Hash> = self.events.iter().map(|e| e.hash()).collect();
        merkle_root(&hashes)
    }
}
