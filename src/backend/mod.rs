//! Backend Module
//!
//! The hash-map-capable key/value surface the store is layered on.
//!
//! ## Responsibilities
//! - Plain string keys (counters, persisted capacity)
//! - Hash keys with field-level get/set/delete (record and index shards)
//! - Atomic transactions: queued writes applied all-or-nothing, optionally
//!   guarded by watched key versions
//! - Cursor scans over keys and over hash fields, glob-filtered
//!
//! ## Implementations
//! - `MemoryBackend`: in-process, shared by cloning the handle
//! - `RemoteBackend`: one TCP connection to a `bucketdb-server`

pub mod glob;
mod memory;
mod remote;
mod txn;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use memory::{MemoryBackend, TOMBSTONE_LIMIT};
pub use remote::RemoteBackend;
pub use txn::Transaction;

/// Config parameter holding the hash capacity of the backend
pub const HASH_MAX_ENTRIES: &str = "hash-max-entries";

/// A write queued inside a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Overwrite a string key
    Set { key: String, value: Vec<u8> },

    /// Add `delta` to an integer string key (absent counts as 0)
    IncrBy { key: String, delta: i64 },

    /// Set a hash field
    HSet { key: String, field: Vec<u8>, value: Vec<u8> },

    /// Remove a hash field
    HDel { key: String, field: Vec<u8> },
}

impl WriteOp {
    /// Key the operation writes
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Set { key, .. }
            | WriteOp::IncrBy { key, .. }
            | WriteOp::HSet { key, .. }
            | WriteOp::HDel { key, .. } => key,
        }
    }
}

/// Version of a key observed by `watch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watched {
    pub key: String,
    pub version: u64,
}

/// Everything `exec` needs to commit one transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnRequest {
    /// Keys that must be unmodified since they were watched
    pub watched: Vec<Watched>,

    /// Writes applied in order, all or none
    pub ops: Vec<WriteOp>,
}

/// Result of `exec`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnOutcome {
    /// Every queued write was applied
    Committed,

    /// A watched key changed; nothing was applied
    Conflict,
}

/// One page of a cursor scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPage<T> {
    /// Cursor for the next call; 0 when the scan is complete
    pub cursor: u64,

    pub items: Vec<T>,
}

/// Hash-map-capable key/value backend
///
/// Every call is one synchronous request/response. Implementations are
/// internally synchronized so a handle can be shared by reference.
pub trait Backend: Send + Sync {
    // -------------------------------------------------------------------------
    // String keys
    // -------------------------------------------------------------------------
    fn exists(&self, key: &str) -> Result<bool>;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    // -------------------------------------------------------------------------
    // Hash keys
    // -------------------------------------------------------------------------
    fn hexists(&self, key: &str, field: &[u8]) -> Result<bool>;

    fn hget(&self, key: &str, field: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Returns true if the field was newly created
    fn hset(&self, key: &str, field: &[u8], value: &[u8]) -> Result<bool>;

    /// Returns true if the field existed
    fn hdel(&self, key: &str, field: &[u8]) -> Result<bool>;

    fn hlen(&self, key: &str) -> Result<u64>;

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------
    fn config_get(&self, name: &str) -> Result<Option<String>>;

    // -------------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------------
    /// Current versions of `keys`, in order
    fn watch(&self, keys: &[String]) -> Result<Vec<u64>>;

    /// Apply a transaction atomically
    fn exec(&self, txn: &TxnRequest) -> Result<TxnOutcome>;

    // -------------------------------------------------------------------------
    // Cursor scans
    // -------------------------------------------------------------------------
    /// Keys matching `pattern`, `count` keys examined per call
    fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage<String>>;

    /// `(field, value)` pairs of a hash, optionally filtered by a field glob
    fn hscan(
        &self,
        key: &str,
        cursor: u64,
        pattern: Option<&[u8]>,
        count: usize,
    ) -> Result<ScanPage<(Vec<u8>, Vec<u8>)>>;

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------
    /// Release the underlying connection
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
