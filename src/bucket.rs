//! Bucket Allocator
//!
//! Maps records and payloads onto bounded-size backend hashes ("buckets").
//!
//! ## Two Independent Partitions
//! ```text
//! record shard:  (id - 1) / capacity + 1          {store}/bucket/{n}
//! index shard:   crc32(payload) % index_shards    {store}/idx/bucket/{n}
//! ```
//!
//! `capacity` is fixed per store (persisted on first open). The index shard
//! count is sized so that no index shard should outgrow `capacity` when the
//! store holds `expected_max_records` uniformly hashed payloads.

use crate::error::{BucketError, Result};
use crate::record::RecordId;

/// Namespace segment of record shards
const RECORD_SEGMENT: &str = "bucket";

/// Namespace segment of index shards
const INDEX_SEGMENT: &str = "idx/bucket";

/// Key holding the persisted shard capacity of a store
pub fn capacity_key(store: &str) -> String {
    format!("{}/hash-max-entries", store)
}

/// Number of index shards needed for `expected_max_records` entries
///
/// Never returns 0, even for tiny capacities or fill factors.
pub fn estimate_index_shard_count(capacity: u64, expected_max_records: u64, fill_factor: f64) -> u64 {
    let per_shard = ((capacity as f64) * fill_factor).floor() as u64;
    (expected_max_records / per_shard.max(1)).max(1)
}

/// Pure key placement for one store
#[derive(Debug, Clone)]
pub struct BucketAllocator {
    name: String,
    capacity: u64,
    index_shard_count: u64,
    index_scan_pattern: String,
}

impl BucketAllocator {
    /// Build the allocator for `name`; `capacity` must be positive
    pub fn new(name: &str, capacity: u64, expected_max_records: u64, fill_factor: f64) -> Result<Self> {
        if capacity == 0 {
            return Err(BucketError::ConfigInvalid(format!(
                "shard capacity of store {:?} is 0",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            capacity,
            index_shard_count: estimate_index_shard_count(capacity, expected_max_records, fill_factor),
            index_scan_pattern: format!("{}/{}/*", escape_glob(name), INDEX_SEGMENT),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn index_shard_count(&self) -> u64 {
        self.index_shard_count
    }

    // =========================================================================
    // Shard ids
    // =========================================================================

    /// 1-based record shard of `id`
    pub fn record_shard_id(&self, id: RecordId) -> u64 {
        id.get().saturating_sub(1) / self.capacity + 1
    }

    /// Index shard of `data`, in `0..index_shard_count`
    pub fn index_shard_id(&self, data: &[u8]) -> u64 {
        u64::from(crc32fast::hash(data)) % self.index_shard_count
    }

    // =========================================================================
    // Keys
    // =========================================================================

    pub fn record_shard_key(&self, id: RecordId) -> String {
        self.record_shard_key_for(self.record_shard_id(id))
    }

    pub fn record_shard_key_for(&self, shard_id: u64) -> String {
        format!("{}/{}/{}", self.name, RECORD_SEGMENT, shard_id)
    }

    pub fn index_shard_key(&self, data: &[u8]) -> String {
        format!("{}/{}/{}", self.name, INDEX_SEGMENT, self.index_shard_id(data))
    }

    pub fn max_id_key(&self) -> String {
        format!("{}/maxid", self.name)
    }

    pub fn max_shard_id_key(&self) -> String {
        format!("{}/maxbucketid", self.name)
    }

    pub fn capacity_key(&self) -> String {
        capacity_key(&self.name)
    }

    /// SCAN pattern matching every index shard key of this store
    pub fn index_scan_pattern(&self) -> &str {
        &self.index_scan_pattern
    }
}

/// Escape glob metacharacters so a store name matches only itself
fn escape_glob(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
