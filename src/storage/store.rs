// LedgerStore - Persistent key-value storage using sled
//
// Holds:
// - Ledger state (balances, events)
// - Runtime state (external funds, custody)
// - Labelled participant keypairs

use crate::identity::Keypair;
use crate::ledger::Ledger;
use crate::runtime::Runtime;
use std::path::Path;
use thiserror::Error;

mod keys {
    pub const LEDGER: &[u8] = b"ledger:state";
    pub const RUNTIME: &[u8] = b"runtime:state";
    pub const KEYPAIR_PREFIX: &[u8] = b"identity:keypair:";
}

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Number of keys in the database
    pub key_count: usize,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
}

/// Where the service writes ledger and runtime after each commit
pub trait StateStore: Send {
    /// Load the last saved state, or fresh state if nothing was saved
    fn load(&self) -> Result<(Ledger, Runtime), StoreError>;

    /// Durably save both halves together
    fn save(&self, ledger: &Ledger, runtime: &Runtime) -> Result<(), StoreError>;
}

/// Persistent store for ledger data
///
/// Ledger and runtime are written in one sled batch so a crash never
/// leaves one updated without the other.
pub struct LedgerStore {
    db: sled::Db,
}

impl LedgerStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Open a throwaway in-memory store
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.db.is_empty())
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        Ok(StorageStats {
            key_count: self.db.len(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    // ========================================================================
    // RAW KEY-VALUE OPERATIONS
    // ========================================================================

    pub fn put_raw(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db.insert(key, value)?;
        Ok(())
    }

    pub fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.db.remove(key)?;
        Ok(())
    }

    /// List all keys with a given prefix
    pub fn list_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut keys = Vec::new();
        for result in self.db.scan_prefix(prefix) {
            let (key, _) = result?;
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    // ========================================================================
    // LEDGER + RUNTIME
    // ========================================================================

    /// Save ledger and runtime together, atomically
    pub fn save_state(&self, ledger: &Ledger, runtime: &Runtime) -> Result<(), StoreError> {
        let ledger_bytes = ledger
            .to_bytes()
            .map_err(|e| StoreError::SerializationFailed(e.to_string()))?;
        let runtime_bytes = runtime
            .to_bytes()
            .map_err(|e| StoreError::SerializationFailed(e.to_string()))?;

        let mut batch = sled::Batch::default();
        batch.insert(keys::LEDGER, ledger_bytes);
        batch.insert(keys::RUNTIME, runtime_bytes);
        self.db.apply_batch(batch)?;
        Ok(())
    }

    /// Load the ledger state
    pub fn load_ledger(&self) -> Result<Option<Ledger>, StoreError> {
        match self.get_raw(keys::LEDGER)? {
            Some(bytes) => {
                let ledger = Ledger::from_bytes(&bytes)
                    .map_err(|e| StoreError::DeserializationFailed(e.to_string()))?;
                Ok(Some(ledger))
            }
            None => Ok(None),
        }
    }

    /// Load the runtime state
    pub fn load_runtime(&self) -> Result<Option<Runtime>, StoreError> {
        match self.get_raw(keys::RUNTIME)? {
            Some(bytes) => {
                let runtime = Runtime::from_bytes(&bytes)
                    .map_err(|e| StoreError::DeserializationFailed(e.to_string()))?;
                Ok(Some(runtime))
            }
            None => Ok(None),
        }
    }

    /// Load both halves, starting fresh when nothing was saved yet
    pub fn load_state(&self) -> Result<(Ledger, Runtime), StoreError> {
        let ledger = self.load_ledger()?.unwrap_or_default();
        let runtime = self.load_runtime()?.unwrap_or_default();
        Ok((ledger, runtime))
    }

    // ========================================================================
    // IDENTITY PERSISTENCE
    // ========================================================================

    /// Save a keypair with a label
    pub fn save_keypair_with_label(&self, keypair: &Keypair, label: &str) -> Result<(), StoreError> {
        let key = [keys::KEYPAIR_PREFIX, label.as_bytes()].concat();
        self.put_raw(&key, &keypair.to_bytes())
    }

    /// Load a keypair by label
    pub fn load_keypair_with_label(&self, label: &str) -> Result<Option<Keypair>, StoreError> {
        let key = [keys::KEYPAIR_PREFIX, label.as_bytes()].concat();
        match self.get_raw(&key)? {
            Some(bytes) => {
                let keypair = Keypair::from_bytes(&bytes)
                    .map_err(|e| StoreError::DeserializationFailed(e.to_string()))?;
                Ok(Some(keypair))
            }
            None => Ok(None),
        }
    }

    /// All stored keypair labels, sorted
    pub fn list_labels(&self) -> Result<Vec<String>, StoreError> {
        let labels = self
            .list_keys_with_prefix(keys::KEYPAIR_PREFIX)?
            .into_iter()
            .map(|key| String::from_utf8_lossy(&key[keys::KEYPAIR_PREFIX.len()..]).into_owned())
            .collect();
        Ok(labels)
    }
}

impl StateStore for LedgerStore {
    fn load(&self) -> Result<(Ledger, Runtime), StoreError> {
        self.load_state()
    }

    fn save(&self, ledger: &Ledger, runtime: &Runtime) -> Result<(), StoreError> {
        self.save_state(ledger, runtime)?;
        self.flush()
    }
}
