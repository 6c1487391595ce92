//! State store backends
//!
//! The ledger only assumes a key-value store with point reads and writes.
//! No multi-key transaction primitive is offered to the ledger logic; every
//! `put` is independently durable.
//!
//! # Backends
//!
//! - [`MemoryStore`] - in-process map, used by tests and the bootstrap tool
//! - `RocksStore` - RocksDB with a single `state` column family (feature `rocksdb`)
//! - [`FaultInjectingStore`] - wraps another store and fails chosen operations

use crate::{
    config::{StorageBackend, StorageConfig},
    error::{Error, Result},
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key-value state interface the ledger runs against
pub trait StateStore: Send + Sync {
    /// Read a value; `None` when the key is absent
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a key (absent keys are not an error)
    fn delete(&self, key: &str) -> Result<()>;

    /// All keys currently stored
    fn keys(&self) -> Result<Vec<String>>;
}

impl<S: StateStore + ?Sized> StateStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}

/// Open the backend selected by configuration
pub fn open(config: &StorageConfig) -> Result<Arc<dyn StateStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory state store");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "rocksdb")]
        StorageBackend::RocksDb => Ok(Arc::new(rocks::RocksStore::open(config)?)),
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::RocksDb => Err(Error::Config(
            "rocksdb backend requested but the `rocksdb` feature is disabled".to_string(),
        )),
    }
}

/// In-process state store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

/// Store operation a fault can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// `get`
    Get,
    /// `put`
    Put,
    /// `delete`
    Delete,
}

#[derive(Debug)]
struct Fault {
    op: StoreOp,
    key: String,
    skip: usize,
    // None = fires on every matching call once `skip` is exhausted
    remaining: Option<usize>,
}

/// Store wrapper that fails selected operations
///
/// Faults match on operation and exact key. A fault lets `skip` matching
/// calls through, then fails. One-shot faults clear themselves after firing,
/// so a later compensating write to the same key succeeds.
#[derive(Debug)]
pub struct FaultInjectingStore<S> {
    inner: S,
    faults: Mutex<Vec<Fault>>,
}

impl<S: StateStore> FaultInjectingStore<S> {
    /// Wrap a store with no faults armed
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next matching call after letting `skip` through
    pub fn fail_once(&self, op: StoreOp, key: impl Into<String>, skip: usize) {
        self.arm(op, key.into(), skip, Some(1));
    }

    /// Fail every matching call after letting `skip` through
    pub fn fail_always(&self, op: StoreOp, key: impl Into<String>, skip: usize) {
        self.arm(op, key.into(), skip, None);
    }

    /// Disarm all faults
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn arm(&self, op: StoreOp, key: String, skip: usize, remaining: Option<usize>) {
        self.faults.lock().push(Fault {
            op,
            key,
            skip,
            remaining,
        });
    }

    fn check(&self, op: StoreOp, key: &str) -> Result<()> {
        let mut faults = self.faults.lock();
        let position = faults.iter().position(|f| f.op == op && f.key == key);

        let Some(index) = position else {
            return Ok(());
        };

        let fault = &mut faults[index];
        if fault.skip > 0 {
            fault.skip -= 1;
            return Ok(());
        }

        if let Some(remaining) = fault.remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                faults.remove(index);
            }
        }

        tracing::debug!(?op, key, "Injected store fault");
        Err(Error::Storage(format!("injected {:?} fault on {}", op, key)))
    }
}

impl<S: StateStore> StateStore for FaultInjectingStore<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check(StoreOp::Get, key)?;
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.check(StoreOp::Put, key)?;
        self.inner.put(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.check(StoreOp::Delete, key)?;
        self.inner.delete(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys()
    }
}

#[cfg(feature = "rocksdb")]
pub use rocks::RocksStore;

#[cfg(feature = "rocksdb")]
mod rocks {
    use super::StateStore;
    use crate::{
        config::StorageConfig,
        error::{Error, Result},
    };
    use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, DB};

    /// Column family holding every ledger record
    const CF_STATE: &str = "state";

    /// RocksDB-backed state store
    pub struct RocksStore {
        db: DB,
    }

    impl std::fmt::Debug for RocksStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RocksStore")
                .field("path", &self.db.path())
                .finish()
        }
    }

    impl RocksStore {
        /// Open or create database
        pub fn open(config: &StorageConfig) -> Result<Self> {
            let path = &config.data_dir;

            std::fs::create_dir_all(path)?;

            let mut db_opts = Options::default();
            db_opts.create_if_missing(true);
            db_opts.create_missing_column_families(true);

            let tuning = &config.rocksdb;
            db_opts.set_write_buffer_size(tuning.write_buffer_size_mb * 1024 * 1024);
            db_opts.set_max_write_buffer_number(tuning.max_write_buffer_number);
            db_opts.set_max_background_jobs(tuning.max_background_jobs);
            db_opts.set_level_zero_file_num_compaction_trigger(
                tuning.level0_file_num_compaction_trigger,
            );

            if tuning.enable_statistics {
                db_opts.enable_statistics();
            }

            // State is read on every operation, use LZ4 for speed
            let mut cf_opts = Options::default();
            cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

            let db = DB::open_cf_descriptors(
                &db_opts,
                path,
                vec![ColumnFamilyDescriptor::new(CF_STATE, cf_opts)],
            )?;

            tracing::info!("Opened RocksDB state store at {:?}", path);

            Ok(Self { db })
        }

        fn cf(&self) -> Result<&ColumnFamily> {
            self.db
                .cf_handle(CF_STATE)
                .ok_or_else(|| Error::Storage(format!("Column family {} not found", CF_STATE)))
        }
    }

    impl StateStore for RocksStore {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.db.get_cf(self.cf()?, key.as_bytes())?)
        }

        fn put(&self, key: &str, value: &[u8]) -> Result<()> {
            self.db.put_cf(self.cf()?, key.as_bytes(), value)?;
            Ok(())
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.db.delete_cf(self.cf()?, key.as_bytes())?;
            Ok(())
        }

        fn keys(&self) -> Result<Vec<String>> {
            let mut keys = Vec::new();
            for item in self.db.iterator_cf(self.cf()?, IteratorMode::Start) {
                let (key, _) = item?;
                keys.push(String::from_utf8_lossy(&key).into_owned());
            }
            Ok(keys)
        }
    }

}
