//! Store Module
//!
//! The public handle of one named store on one backend connection.
//!
//! ## Responsibilities
//! - Resolve and persist the shard capacity on open
//! - Route public operations to the batch engine, oracle and search
//! - Read-only diagnostics (`count`, `info`)

use std::collections::BTreeMap;

use crate::backend::{Backend, HASH_MAX_ENTRIES};
use crate::batch::BatchEngine;
use crate::bucket::{self, BucketAllocator};
use crate::config::StoreConfig;
use crate::error::{BucketError, Result};
use crate::oracle::Oracle;
use crate::record::{Record, RecordId};
use crate::registry::Registry;
use crate::search::PatternSearch;

/// A named record store
///
/// ## Concurrency Model
///
/// The handle issues synchronous calls on one backend connection and keeps
/// no mutable state of its own: counters and capacity live in the backend,
/// so any number of handles may share a store. Races between handles are
/// governed by `StoreConfig::consistency`.
pub struct Store<B: Backend> {
    backend: B,
    layout: BucketAllocator,
    config: StoreConfig,
}

impl<B: Backend> Store<B> {
    /// Open (or create) the store named by `config.name`
    ///
    /// On first open the backend's hash capacity is read once and persisted;
    /// every later open uses the persisted value.
    pub fn open(backend: B, config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let capacity = Self::resolve_capacity(&backend, &config)?;
        let layout = BucketAllocator::new(
            &config.name,
            capacity,
            config.expected_max_records,
            config.fill_factor,
        )?;

        tracing::debug!(
            "Opened store {:?}: capacity={}, index shards={}, consistency={:?}",
            config.name,
            layout.capacity(),
            layout.index_shard_count(),
            config.consistency
        );

        Ok(Self {
            backend,
            layout,
            config,
        })
    }

    fn resolve_capacity(backend: &B, config: &StoreConfig) -> Result<u64> {
        let key = bucket::capacity_key(&config.name);

        if let Some(raw) = backend.get(&key)? {
            return parse_capacity(&String::from_utf8_lossy(&raw), &key);
        }

        let capacity = match backend.config_get(HASH_MAX_ENTRIES)? {
            Some(value) => parse_capacity(&value, HASH_MAX_ENTRIES)?,
            None => {
                tracing::warn!(
                    "Backend reports no {}, using default {}",
                    HASH_MAX_ENTRIES,
                    config.default_capacity
                );
                config.default_capacity
            }
        };

        if capacity == 0 {
            return Err(BucketError::ConfigInvalid(format!(
                "shard capacity of store {:?} is 0",
                config.name
            )));
        }

        backend.set(&key, capacity.to_string().as_bytes())?;
        Ok(capacity)
    }

    /// Release the backend connection
    pub fn close(self) -> Result<()> {
        tracing::debug!("Closing store {:?}", self.layout.name());
        self.backend.close()
    }

    fn engine(&self) -> BatchEngine<'_, B> {
        BatchEngine::new(&self.backend, &self.layout, &self.config)
    }

    fn oracle(&self) -> Oracle<'_, B> {
        Oracle::new(&self.backend, &self.layout)
    }

    fn searcher(&self) -> PatternSearch<'_, B> {
        PatternSearch::new(&self.backend, &self.layout, self.config.scan_count)
    }

    fn registry(&self) -> Registry<'_, B> {
        Registry::new(&self.backend, &self.layout)
    }

    // =========================================================================
    // Create
    // =========================================================================

    pub fn create(&self, data: impl AsRef<[u8]>) -> Result<RecordId> {
        let ids = self.engine().create(&[data.as_ref()])?;
        ids.into_iter()
            .next()
            .ok_or_else(|| BucketError::Backend("create returned no id".to_string()))
    }

    /// All-or-nothing create; ids in input order
    pub fn batch_create<D: AsRef<[u8]>>(&self, payloads: &[D]) -> Result<Vec<RecordId>> {
        self.engine().create(payloads)
    }

    // =========================================================================
    // Read
    // =========================================================================

    pub fn get(&self, id: RecordId) -> Result<Vec<u8>> {
        self.oracle()
            .payload_of(id)?
            .ok_or_else(|| BucketError::NotFound(id.to_string()))
    }

    /// Fails on the first missing id
    pub fn batch_get(&self, ids: &[RecordId]) -> Result<Vec<Record>> {
        ids.iter()
            .map(|&id| Ok(Record { id, data: self.get(id)? }))
            .collect()
    }

    pub fn exists(&self, data: impl AsRef<[u8]>) -> Result<bool> {
        self.oracle().exists(data.as_ref())
    }

    pub fn id_exists(&self, id: RecordId) -> Result<bool> {
        self.oracle().id_exists(id)
    }

    // =========================================================================
    // Update / Delete
    // =========================================================================

    pub fn update(&self, id: RecordId, data: impl AsRef<[u8]>) -> Result<()> {
        self.engine().update(&[Record::new(id, data.as_ref())])?;
        Ok(())
    }

    /// All-or-nothing update; returns the number of records whose payload changed
    pub fn batch_update(&self, records: &[Record]) -> Result<usize> {
        self.engine().update(records)
    }

    pub fn delete(&self, id: RecordId) -> Result<()> {
        self.engine().delete(&[id])
    }

    /// All-or-nothing delete
    pub fn batch_delete(&self, ids: &[RecordId]) -> Result<()> {
        self.engine().delete(ids)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Glob search over payloads (`*`, `?`, `[...]`); empty matches all
    pub fn search(&self, pattern: impl AsRef<[u8]>) -> Result<Vec<RecordId>> {
        self.searcher().search(pattern.as_ref())
    }

    /// Regular expression search; one result list per pattern
    pub fn regexp_search<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Vec<Vec<RecordId>>> {
        self.searcher().regexp_search(patterns)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Number of stored records (sum of record shard sizes)
    pub fn count(&self) -> Result<u64> {
        let max_shard_id = self.registry().current_max_shard_id()?;
        (1..=max_shard_id).try_fold(0u64, |total, shard_id| {
            Ok(total + self.backend.hlen(&self.layout.record_shard_key_for(shard_id))?)
        })
    }

    /// Counters, shard occupancy and shards that outgrew the capacity
    pub fn info(&self) -> Result<BTreeMap<String, String>> {
        let registry = self.registry();
        let max_id = registry.current_max_id()?;
        let max_shard_id = registry.current_max_shard_id()?;
        let capacity = self.layout.capacity();

        let mut record_shards = 0u64;
        let mut records = 0u64;
        let mut oversized_record_shards = Vec::new();
        for shard_id in 1..=max_shard_id {
            let key = self.layout.record_shard_key_for(shard_id);
            let len = self.backend.hlen(&key)?;
            if len > 0 {
                record_shards += 1;
                records += len;
            }
            if len > capacity {
                oversized_record_shards.push(key);
            }
        }

        let mut index_shards = 0u64;
        let mut index_entries = 0u64;
        let mut oversized_index_shards = Vec::new();
        self.searcher().for_each_index_shard(|key| {
            let len = self.backend.hlen(key)?;
            index_shards += 1;
            index_entries += len;
            if len > capacity {
                oversized_index_shards.push(key.to_string());
            }
            Ok(())
        })?;

        let mut info = BTreeMap::new();
        info.insert("name".to_string(), self.layout.name().to_string());
        info.insert("capacity".to_string(), capacity.to_string());
        info.insert(
            "estimated index shards".to_string(),
            self.layout.index_shard_count().to_string(),
        );
        info.insert("max id".to_string(), max_id.to_string());
        info.insert("max shard id".to_string(), max_shard_id.to_string());
        info.insert("record shards".to_string(), record_shards.to_string());
        info.insert("records".to_string(), records.to_string());
        info.insert("index shards".to_string(), index_shards.to_string());
        info.insert("index entries".to_string(), index_entries.to_string());
        info.insert(
            "oversized record shards".to_string(),
            oversized_record_shards.join(","),
        );
        info.insert(
            "oversized index shards".to_string(),
            oversized_index_shards.join(","),
        );
        Ok(info)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        self.layout.name()
    }

    pub fn capacity(&self) -> u64 {
        self.layout.capacity()
    }

    pub fn index_shard_count(&self) -> u64 {
        self.layout.index_shard_count()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Last allocated id (0 before the first create)
    pub fn max_id(&self) -> Result<u64> {
        self.registry().current_max_id()
    }
}

fn parse_capacity(raw: &str, source: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        BucketError::ConfigInvalid(format!("{} is not a valid capacity: {:?}", source, raw))
    })
}
