//! Engine state persistence.
//!
//! The whole [`EngineState`] is stored as one bincode snapshot next to a
//! small metadata record, and each block's committed events are stored
//! under the block height so they can be replayed in order.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{EngineState, EventLog, ProtocolEvent};
use crate::storage::backend::{make_key, prefixes, StorageBackend, TypedStore};
use crate::utils::crypto::{merkle_root, tagged_hash, Hash};

/// Snapshot format version
pub const STATE_VERSION: u32 = 1;

/// Describes the stored snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMetadata {
    /// Snapshot format version
    pub version: u32,
    /// Block height of the snapshot
    pub block_height: u64,
    /// Timestamp of the snapshot
    pub timestamp: u64,
    /// Root over the component hashes
    pub state_root: Hash,
}

/// Hash of one serializable component
fn component_hash<T: Serialize>(tag: &str, value: &T) -> Result<Hash> {
    let bytes = bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(tagged_hash(tag, &bytes))
}

/// Merkle root over every component of the engine state
pub fn state_root(state: &EngineState) -> Result<Hash> {
    let hashes = [
        component_hash("token", &state.token)?,
        component_hash("collateral", &state.collateral)?,
        component_hash("oracle", &state.oracle)?,
        component_hash("reserve", &state.reserve)?,
        component_hash("pmm", &state.pmm)?,
        component_hash("nav", &state.nav)?,
        component_hash("sweeper", &state.sweeper)?,
        component_hash("baselines", &state.baselines)?,
        component_hash("counters", &state.counters)?,
        component_hash("config", &state.config)?,
        component_hash("flags", &(state.paused, &state.last_burn, state.block_height, state.timestamp))?,
    ];
    Ok(merkle_root(&hashes))
}

/// Saves and loads engine snapshots and block events
pub struct StateManager<B: StorageBackend> {
    store: TypedStore<B>,
}

impl<B: StorageBackend> StateManager<B> {
    /// Create a new state manager
    pub fn new(backend: B) -> Self {
        Self {
            store: TypedStore::new(backend),
        }
    }

    fn state_key() -> Vec<u8> {
        make_key(prefixes::STATE, b"current")
    }

    fn meta_key() -> Vec<u8> {
        make_key(prefixes::META, b"current")
    }

    fn events_key(block_height: u64) -> Vec<u8> {
        make_key(prefixes::EVENTS, &block_height.to_be_bytes())
    }

    /// Whether a snapshot has been saved
    pub fn has_state(&self) -> Result<bool> {
        self.store.exists(&Self::state_key())
    }

    /// Persist a snapshot and flush it
    pub fn save_state(&self, state: &EngineState) -> Result<StateMetadata> {
        let metadata = StateMetadata {
            version: STATE_VERSION,
            block_height: state.block_height,
            timestamp: state.timestamp,
            state_root: state_root(state)?,
        };
        self.store.set(&Self::state_key(), state)?;
        self.store.set(&Self::meta_key(), &metadata)?;
        self.store.flush()?;
        info!(
            block = metadata.block_height,
            root = %metadata.state_root.to_hex(),
            "State snapshot saved"
        );
        Ok(metadata)
    }

    /// Metadata of the stored snapshot
    pub fn load_metadata(&self) -> Result<Option<StateMetadata>> {
        self.store.get(&Self::meta_key())
    }

    /// Load the stored snapshot, checking its version and root
    pub fn load_state(&self) -> Result<Option<EngineState>> {
        let Some(state) = self.store.get::<EngineState>(&Self::state_key())? else {
            return Ok(None);
        };
        let metadata = self
            .load_metadata()?
            .ok_or_else(|| Error::Storage("snapshot has no metadata".into()))?;
        if metadata.version != STATE_VERSION {
            return Err(Error::Storage(format!(
                "snapshot version {} is not supported (expected {})",
                metadata.version, STATE_VERSION
            )));
        }
        let root = state_root(&state)?;
        if root != metadata.state_root {
            return Err(Error::InvariantViolation(format!(
                "snapshot root {} does not match recorded root {}",
                root.to_hex(),
                metadata.state_root.to_hex()
            )));
        }
        debug!(block = state.block_height, "State snapshot loaded");
        Ok(Some(state))
    }

    /// Store the events committed in one block
    pub fn save_block_events(&self, block_height: u64, events: &EventLog) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        self.store.set(&Self::events_key(block_height), &events.events().to_vec())
    }

    /// Events committed in one block
    pub fn load_block_events(&self, block_height: u64) -> Result<Vec<ProtocolEvent>> {
        Ok(self
            .store
            .get::<Vec<ProtocolEvent>>(&Self::events_key(block_height))?
            .unwrap_or_default())
    }

    /// Every stored event, in block order
    pub fn load_all_events(&self) -> Result<Vec<ProtocolEvent>> {
        let mut all = Vec::new();
        for key in self.store.list_prefix(prefixes::EVENTS)? {
            if let Some(events) = self.store.get::<Vec<ProtocolEvent>>(&key)? {
                all.extend(events);
            }
        }
        Ok(all)
    }

    /// Flush pending writes
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset::Asset;
    use crate::core::config::ProtocolConfig;
    use crate::protocol::{MaintenanceFailedEvent, ProtocolEvent};
    use crate::storage::backend::{FileStore, InMemoryStore};
    use crate::utils::crypto::Address;

    fn sample_state() -> EngineState {
        let mut state = EngineState::new(ProtocolConfig::default());
        state.block_height = 7;
        state.timestamp = 700;
        state
            .collateral
            .credit(Address::from_label("alice"), Asset::Dot, 5_000)
            .unwrap();
        state
    }

    #[test]
    fn test_save_and_load_state() {
        let manager = StateManager::new(InMemoryStore::new());
        assert!(!manager.has_state().unwrap());
        assert_eq!(manager.load_state().unwrap(), None);

        let state = sample_state();
        let metadata = manager.save_state(&state).unwrap();
        assert_eq!(metadata.block_height, 7);
        assert_eq!(manager.load_state().unwrap(), Some(state));
    }

    #[test]
    fn test_state_root_tracks_every_component() {
        let state = sample_state();
        let mut changed = state.clone();
        changed.paused = true;
        assert_ne!(state_root(&state).unwrap(), state_root(&changed).unwrap());
        assert_eq!(state_root(&state).unwrap(), state_root(&state.clone()).unwrap());
    }

    #[test]
    fn test_tampered_snapshot_is_rejected() {
        let manager = StateManager::new(InMemoryStore::new());
        manager.save_state(&sample_state()).unwrap();

        let mut other = sample_state();
        other.timestamp = 701;
        manager
            .store
            .set(&StateManager::<InMemoryStore>::state_key(), &other)
            .unwrap();
        assert!(matches!(manager.load_state(), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_block_events_in_order() {
        let manager = StateManager::new(InMemoryStore::new());
        let event = |block_height| {
            ProtocolEvent::MaintenanceFailed(MaintenanceFailedEvent {
                task: "sweep".into(),
                reason: "stale".into(),
                block_height,
                timestamp: block_height * 10,
            })
        };
        for height in [3u64, 1, 2] {
            let mut log = EventLog::new();
            log.push(event(height));
            manager.save_block_events(height, &log).unwrap();
        }
        manager.save_block_events(4, &EventLog::new()).unwrap();

        let heights: Vec<u64> = manager
            .load_all_events()
            .unwrap()
            .iter()
            .map(|e| e.block_height())
            .collect();
        assert_eq!(heights, vec![1, 2, 3]);
        assert!(manager.load_block_events(4).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = sample_state();
        {
            let manager = StateManager::new(FileStore::open(temp_dir.path()).unwrap());
            manager.save_state(&state).unwrap();
        }
        let manager = StateManager::new(FileStore::open(temp_dir.path()).unwrap());
        assert_eq!(manager.load_state().unwrap(), Some(state));
    }
}
