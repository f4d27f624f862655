//! Storage backend implementations.
//!
//! Two backends sit behind [`StorageBackend`]:
//! - [`InMemoryStore`]: ephemeral, for tests and dry runs
//! - [`FileStore`]: a hex-encoded JSON document on disk, written on flush
//!
//! [`TypedStore`] layers bincode encoding on top of either.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::{Error, Result};

/// Key type for storage operations
pub type StorageKey = Vec<u8>;

/// Value type for storage operations
pub type StorageValue = Vec<u8>;

type Table = BTreeMap<StorageKey, StorageValue>;

fn poisoned<T>(_: PoisonError<T>) -> Error {
    Error::Storage("storage lock poisoned".into())
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORAGE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Key-value storage used for engine snapshots and block event logs
pub trait StorageBackend: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>>;

    /// Set a value for a key
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key, returning whether it existed
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// List keys with a given prefix, in ascending order
    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>>;

    /// Flush pending writes to persistent storage
    fn flush(&self) -> Result<()>;

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

fn keys_with_prefix(table: &Table, prefix: &[u8]) -> Vec<StorageKey> {
    table
        .range(prefix.to_vec()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, _)| k.clone())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<Table>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> Result<usize> {
        Ok(self.data.read().map_err(poisoned)?.len())
    }

    /// Whether the store holds nothing
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl StorageBackend for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        Ok(self.data.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data
            .write()
            .map_err(poisoned)?
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        Ok(self.data.write().map_err(poisoned)?.remove(key).is_some())
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        Ok(keys_with_prefix(&*self.data.read().map_err(poisoned)?, prefix))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE-BASED STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// File-backed store: one JSON document of hex keys and values
#[derive(Debug)]
pub struct FileStore {
    base_path: PathBuf,
    cache: RwLock<Table>,
    dirty: RwLock<bool>,
}

impl FileStore {
    /// File name inside the store directory
    pub const DATA_FILE: &'static str = "parity-store.json";

    /// Open (or create) a store in `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| {
            Error::Storage(format!("cannot create {}: {}", base_path.display(), e))
        })?;

        let store = Self {
            base_path,
            cache: RwLock::new(Table::new()),
            dirty: RwLock::new(false),
        };
        store.load_from_disk()?;
        Ok(store)
    }

    /// Path of the data file
    pub fn data_file_path(&self) -> PathBuf {
        self.base_path.join(Self::DATA_FILE)
    }

    fn load_from_disk(&self) -> Result<()> {
        let path = self.data_file_path();
        if !path.exists() {
            return Ok(());
        }

        let file = File::open(&path)
            .map_err(|e| Error::Storage(format!("cannot open {}: {}", path.display(), e)))?;
        let encoded: BTreeMap<String, String> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Deserialization(format!("{}: {}", path.display(), e)))?;

        let mut cache = self.cache.write().map_err(poisoned)?;
        for (key, value) in encoded {
            let key = hex::decode(&key).map_err(|e| Error::Deserialization(format!("key {}: {}", key, e)))?;
            let value = hex::decode(&value).map_err(|e| Error::Deserialization(format!("value: {}", e)))?;
            cache.insert(key, value);
        }
        Ok(())
    }

    fn save_to_disk(&self) -> Result<()> {
        let encoded: BTreeMap<String, String> = self
            .cache
            .read()
            .map_err(poisoned)?
            .iter()
            .map(|(k, v)| (hex::encode(k), hex::encode(v)))
            .collect();

        // Write to a sibling file first so a crash never leaves a torn document
        let path = self.data_file_path();
        let tmp = path.with_extension("json.tmp");
        let file = File::create(&tmp)
            .map_err(|e| Error::Storage(format!("cannot create {}: {}", tmp.display(), e)))?;
        serde_json::to_writer(BufWriter::new(file), &encoded)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::rename(&tmp, &path)
            .map_err(|e| Error::Storage(format!("cannot replace {}: {}", path.display(), e)))?;

        *self.dirty.write().map_err(poisoned)? = false;
        Ok(())
    }

    fn mark_dirty(&self) -> Result<()> {
        *self.dirty.write().map_err(poisoned)? = true;
        Ok(())
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        Ok(self.cache.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.cache
            .write()
            .map_err(poisoned)?
            .insert(key.to_vec(), value.to_vec());
        self.mark_dirty()
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let existed = self.cache.write().map_err(poisoned)?.remove(key).is_some();
        if existed {
            self.mark_dirty()?;
        }
        Ok(existed)
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        Ok(keys_with_prefix(&*self.cache.read().map_err(poisoned)?, prefix))
    }

    fn flush(&self) -> Result<()> {
        if *self.dirty.read().map_err(poisoned)? {
            self.save_to_disk()?;
        }
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "FileStore flush on drop failed");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPED STORE WRAPPER
// ═══════════════════════════════════════════════════════════════════════════════

/// Bincode-encoding wrapper around a storage backend
pub struct TypedStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> TypedStore<B> {
    /// Create a new typed store
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Get a typed value
    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        self.backend
            .get(key)?
            .map(|data| bincode::deserialize(&data).map_err(|e| Error::Deserialization(e.to_string())))
            .transpose()
    }

    /// Set a typed value
    pub fn set<T: Serialize>(&self, key: &[u8], value: &T) -> Result<()> {
        let data = bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.backend.set(key, &data)
    }

    /// Delete a value
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.backend.delete(key)
    }

    /// Check if a key exists
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.backend.exists(key)
    }

    /// List keys with prefix
    pub fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        self.backend.list_prefix(prefix)
    }

    /// Flush pending writes
    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }

    /// Underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PREFIXES
// ═══════════════════════════════════════════════════════════════════════════════

/// Key prefixes for stored records
pub mod prefixes {
    /// Engine state snapshot
    pub const STATE: &[u8] = b"state:";
    /// Snapshot metadata
    pub const META: &[u8] = b"meta:";
    /// Committed events, keyed by big-endian block height
    pub const EVENTS: &[u8] = b"evt:";
}

/// Create a key with a prefix
pub fn make_key(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(prefix.len() + key.len());
    result.extend_from_slice(prefix);
    result.extend_from_slice(key);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryStore::new();
        store.set(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.get(b"missing").unwrap(), None);
        assert!(store.exists(b"key1").unwrap());

        assert!(store.delete(b"key1").unwrap());
        assert!(!store.delete(b"key1").unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_list_prefix_is_ordered() {
        let store = InMemoryStore::new();
        store.set(&make_key(prefixes::EVENTS, &2u64.to_be_bytes()), b"b").unwrap();
        store.set(&make_key(prefixes::EVENTS, &1u64.to_be_bytes()), b"a").unwrap();
        store.set(b"state:current", b"s").unwrap();

        let keys = store.list_prefix(prefixes::EVENTS).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys[0] < keys[1]);
        assert!(keys[0].ends_with(&1u64.to_be_bytes()));
    }

    #[test]
    fn test_typed_store() {
        let store = TypedStore::new(InMemoryStore::new());
        store.set(b"amount", &u128::MAX).unwrap();
        assert_eq!(store.get::<u128>(b"amount").unwrap(), Some(u128::MAX));
        assert_eq!(store.get::<u128>(b"missing").unwrap(), None);
    }

    #[test]
    fn test_file_store_persistence() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(temp_dir.path()).unwrap();
            store.set(b"persistent", b"data").unwrap();
            store.flush().unwrap();
            assert!(store.data_file_path().exists());
        }

        let store = FileStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.get(b"persistent").unwrap(), Some(b"data".to_vec()));
    }

    #[test]
    fn test_file_store_flushes_on_drop() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(temp_dir.path()).unwrap();
            store.set(b"k", b"v").unwrap();
        }
        let store = FileStore::open(temp_dir.path()).unwrap();
        assert!(store.exists(b"k").unwrap());
    }

    #[test]
    fn test_file_store_list_prefix() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        store.set(&make_key(prefixes::EVENTS, &7u64.to_be_bytes()), b"e").unwrap();
        store.set(b"state:current", b"s").unwrap();

        let keys = store.list_prefix(prefixes::EVENTS).unwrap();
        assert_eq!(keys, vec![make_key(prefixes::EVENTS, &7u64.to_be_bytes())]);
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(FileStore::DATA_FILE), "not json").unwrap();
        assert!(matches!(
            FileStore::open(temp_dir.path()),
            Err(Error::Deserialization(_))
        ));
    }
}
