//! Configuration for BucketDB
//!
//! Centralized configuration with sensible defaults.

use crate::error::{BucketError, Result};

/// Expected upper bound on the number of records in one store.
pub const DEFAULT_EXPECTED_MAX_RECORDS: u64 = 1_000_000;

/// Shard capacity used when the backend does not report one.
pub const DEFAULT_CAPACITY: u64 = 512;

/// Fraction of `capacity` an index shard is expected to fill.
pub const DEFAULT_FILL_FACTOR: f64 = 0.9;

/// How reads that precede a transaction are protected against concurrent writers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyMode {
    /// Watch every key the batch decision depends on; retry on conflict.
    Optimistic,

    /// Plain check-then-transact. Concurrent creates may produce duplicate
    /// payloads or overlapping ids.
    Unguarded,
}

/// Configuration for a store handle
#[derive(Debug, Clone)]
pub struct StoreConfig {
    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------
    /// Store name; prefixes every persisted key (`{name}/maxid`, ...)
    pub name: String,

    // -------------------------------------------------------------------------
    // Sharding
    // -------------------------------------------------------------------------
    /// Expected maximum record count, used to size the index shard space
    pub expected_max_records: u64,

    /// Target fill of an index shard relative to capacity, in (0, 1]
    pub fill_factor: f64,

    /// Capacity to persist on first open if the backend reports none
    pub default_capacity: u64,

    // -------------------------------------------------------------------------
    // Scanning
    // -------------------------------------------------------------------------
    /// Page size hint passed to SCAN/HSCAN
    pub scan_count: usize,

    // -------------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------------
    /// Race handling for check-then-transact sequences
    pub consistency: ConsistencyMode,

    /// Attempts, the first one included, before giving up with `Conflict`
    /// (optimistic mode only)
    pub max_txn_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "bucketdb".to_string(),
            expected_max_records: DEFAULT_EXPECTED_MAX_RECORDS,
            fill_factor: DEFAULT_FILL_FACTOR,
            default_capacity: DEFAULT_CAPACITY,
            scan_count: 1024,
            consistency: ConsistencyMode::Optimistic,
            max_txn_attempts: 16,
        }
    }
}

impl StoreConfig {
    /// Create a new config builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Config with defaults and the given store name
    pub fn named(name: impl Into<String>) -> Self {
        Self::builder().name(name).build()
    }

    /// Reject values the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(BucketError::ConfigInvalid("empty store name".to_string()));
        }
        // `a/idx` would store its record shards under `a`'s index keys
        if self.name.contains('/') {
            return Err(BucketError::ConfigInvalid(format!(
                "store name {:?} must not contain '/'",
                self.name
            )));
        }
        if !(self.fill_factor > 0.0 && self.fill_factor <= 1.0) {
            return Err(BucketError::ConfigInvalid(format!(
                "fill factor must be in (0, 1], got {}",
                self.fill_factor
            )));
        }
        if self.expected_max_records == 0 {
            return Err(BucketError::ConfigInvalid(
                "expected max records must be > 0".to_string(),
            ));
        }
        if self.scan_count == 0 {
            return Err(BucketError::ConfigInvalid("scan count must be > 0".to_string()));
        }
        if self.consistency == ConsistencyMode::Optimistic && self.max_txn_attempts == 0 {
            return Err(BucketError::ConfigInvalid(
                "optimistic mode needs at least one attempt".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the store name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the expected maximum number of records
    pub fn expected_max_records(mut self, count: u64) -> Self {
        self.config.expected_max_records = count;
        self
    }

    /// Set the index shard fill factor
    pub fn fill_factor(mut self, factor: f64) -> Self {
        self.config.fill_factor = factor;
        self
    }

    /// Set the fallback shard capacity
    pub fn default_capacity(mut self, capacity: u64) -> Self {
        self.config.default_capacity = capacity;
        self
    }

    /// Set the SCAN/HSCAN page size hint
    pub fn scan_count(mut self, count: usize) -> Self {
        self.config.scan_count = count;
        self
    }

    /// Set the consistency mode
    pub fn consistency(mut self, mode: ConsistencyMode) -> Self {
        self.config.consistency = mode;
        self
    }

    /// Set the number of optimistic transaction attempts
    pub fn max_txn_attempts(mut self, attempts: u32) -> Self {
        self.config.max_txn_attempts = attempts;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}

/// Configuration for the backend server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP listen address
    pub listen_addr: String,

    /// Number of worker threads serving connections
    pub workers: usize,

    /// Hash capacity the backend reports through CONFIG GET
    pub hash_max_entries: u64,

    /// Connection read timeout (milliseconds, 0 = none). A client idle for
    /// longer is disconnected, so stores on a long-lived `RemoteBackend`
    /// need this left at 0.
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7379".to_string(),
            workers: 4,
            hash_max_entries: DEFAULT_CAPACITY,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl ServerConfig {
    /// Create a new config builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for ServerConfig
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the worker pool size
    pub fn workers(mut self, count: usize) -> Self {
        self.config.workers = count;
        self
    }

    /// Set the reported hash capacity
    pub fn hash_max_entries(mut self, entries: u64) -> Self {
        self.config.hash_max_entries = entries;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}
