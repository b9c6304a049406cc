//! Batch Mutation Engine
//!
//! Applies batches of creates, updates and deletes as one backend transaction.
//!
//! ## Per-call State Machine
//! ```text
//! Validate (pure) ─► WATCH ─► Validate (reads) ─► Allocate/Resolve
//!                      ▲                               │
//!                      │ conflict                      ▼
//!                      └──────────── EXEC ◄──── BuildTransaction
//!                                     │
//!                          Committed ─┴─ Abort (on any error)
//! ```
//!
//! Every validation error is raised before EXEC. In `Unguarded` mode there is
//! no WATCH and no retry: the reads that precede EXEC can race with other
//! writers (duplicate payloads, overlapping ids).

use std::collections::HashSet;

use crate::backend::{Backend, Transaction, TxnOutcome, WriteOp};
use crate::bucket::BucketAllocator;
use crate::config::{ConsistencyMode, StoreConfig};
use crate::error::{BucketError, Result};
use crate::oracle::Oracle;
use crate::record::{preview, Record, RecordId};
use crate::registry::Registry;

pub struct BatchEngine<'a, B: Backend + ?Sized> {
    backend: &'a B,
    layout: &'a BucketAllocator,
    config: &'a StoreConfig,
}

impl<'a, B: Backend + ?Sized> BatchEngine<'a, B> {
    pub fn new(backend: &'a B, layout: &'a BucketAllocator, config: &'a StoreConfig) -> Self {
        Self {
            backend,
            layout,
            config,
        }
    }

    fn oracle(&self) -> Oracle<'a, B> {
        Oracle::new(self.backend, self.layout)
    }

    fn registry(&self) -> Registry<'a, B> {
        Registry::new(self.backend, self.layout)
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Store new payloads; returns their ids in input order
    pub fn create<D: AsRef<[u8]>>(&self, payloads: &[D]) -> Result<Vec<RecordId>> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::with_capacity(payloads.len());
        for data in payloads {
            let data = data.as_ref();
            if data.is_empty() {
                return Err(BucketError::EmptyPayload);
            }
            if !seen.insert(data) {
                return Err(BucketError::DuplicateInBatch(preview(data)));
            }
        }

        let mut watch_keys = vec![self.layout.max_id_key()];
        watch_keys.extend(payloads.iter().map(|data| self.layout.index_shard_key(data.as_ref())));

        let ids = self.execute("create", watch_keys, |txn| {
            let oracle = self.oracle();
            for data in payloads {
                let data = data.as_ref();
                if oracle.exists(data)? {
                    return Err(BucketError::AlreadyExists(preview(data)));
                }
            }

            let registry = self.registry();
            let allocation = registry.allocate(payloads.len())?;

            for (&id, data) in allocation.ids.iter().zip(payloads) {
                let data = data.as_ref();
                txn.queue(WriteOp::HSet {
                    key: self.layout.record_shard_key(id),
                    field: id.to_bytes(),
                    value: data.to_vec(),
                });
                txn.queue(WriteOp::HSet {
                    key: self.layout.index_shard_key(data),
                    field: data.to_vec(),
                    value: id.to_bytes(),
                });
            }
            registry.queue_advance(txn, &allocation);

            Ok(allocation.ids)
        })?;

        tracing::debug!(
            "Created {} records in {:?}: {}..={}",
            ids.len(),
            self.layout.name(),
            ids[0],
            ids[ids.len() - 1]
        );
        Ok(ids)
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Replace payloads in place; returns how many records actually changed
    pub fn update(&self, records: &[Record]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut ids = HashSet::with_capacity(records.len());
        let mut payloads = HashSet::with_capacity(records.len());
        for record in records {
            if record.data.is_empty() {
                return Err(BucketError::EmptyPayload);
            }
            if !ids.insert(record.id) {
                return Err(BucketError::DuplicateInBatch(format!("id {}", record.id)));
            }
            if !payloads.insert(record.data.as_slice()) {
                return Err(BucketError::DuplicateInBatch(preview(&record.data)));
            }
        }

        let mut watch_keys: Vec<String> = records
            .iter()
            .map(|record| self.layout.record_shard_key(record.id))
            .collect();
        watch_keys.extend(records.iter().map(|record| self.layout.index_shard_key(&record.data)));

        let changed = self.execute("update", watch_keys, |txn| {
            let oracle = self.oracle();

            // (record, previous payload) for entries that really change
            let mut changes: Vec<(&Record, Vec<u8>)> = Vec::new();
            for record in records {
                let current = oracle
                    .payload_of(record.id)?
                    .ok_or_else(|| BucketError::NotFound(record.id.to_string()))?;

                if current == record.data {
                    continue;
                }

                if let Some(owner) = oracle.owner_of(&record.data)? {
                    if owner != record.id {
                        return Err(BucketError::AlreadyExists(preview(&record.data)));
                    }
                }
                changes.push((record, current));
            }

            for (record, old) in &changes {
                txn.queue(WriteOp::HSet {
                    key: self.layout.record_shard_key(record.id),
                    field: record.id.to_bytes(),
                    value: record.data.clone(),
                });
                txn.queue(WriteOp::HDel {
                    key: self.layout.index_shard_key(old),
                    field: old.clone(),
                });
                txn.queue(WriteOp::HSet {
                    key: self.layout.index_shard_key(&record.data),
                    field: record.data.clone(),
                    value: record.id.to_bytes(),
                });
            }

            Ok(changes.len())
        })?;

        tracing::debug!(
            "Updated {} of {} records in {:?}",
            changed,
            records.len(),
            self.layout.name()
        );
        Ok(changed)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Remove records and their index entries
    pub fn delete(&self, ids: &[RecordId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut seen = HashSet::with_capacity(ids.len());
        for &id in ids {
            if !seen.insert(id) {
                return Err(BucketError::DuplicateInBatch(format!("id {}", id)));
            }
        }

        let watch_keys = ids.iter().map(|&id| self.layout.record_shard_key(id)).collect();

        self.execute("delete", watch_keys, |txn| {
            let oracle = self.oracle();

            let mut doomed = Vec::with_capacity(ids.len());
            for &id in ids {
                let data = oracle
                    .payload_of(id)?
                    .ok_or_else(|| BucketError::NotFound(id.to_string()))?;
                doomed.push((id, data));
            }

            for (id, data) in doomed {
                txn.queue(WriteOp::HDel {
                    key: self.layout.record_shard_key(id),
                    field: id.to_bytes(),
                });
                txn.queue(WriteOp::HDel {
                    key: self.layout.index_shard_key(&data),
                    field: data,
                });
            }

            Ok(())
        })?;

        tracing::debug!("Deleted {} records from {:?}", ids.len(), self.layout.name());
        Ok(())
    }

    // =========================================================================
    // Transaction driver
    // =========================================================================

    /// Run `build` inside a transaction and commit what it queued
    ///
    /// `build` performs the read-side validation and queues writes. It is
    /// re-run from scratch after an optimistic conflict.
    fn execute<T>(
        &self,
        what: &str,
        mut watch_keys: Vec<String>,
        mut build: impl FnMut(&mut Transaction<'a, B>) -> Result<T>,
    ) -> Result<T> {
        let guarded = self.config.consistency == ConsistencyMode::Optimistic;
        let max_attempts = if guarded { self.config.max_txn_attempts } else { 1 };

        watch_keys.sort();
        watch_keys.dedup();

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut txn = Transaction::begin(self.backend);
            if guarded {
                txn.watch(&watch_keys)?;
            }

            let value = match build(&mut txn) {
                Ok(value) => value,
                Err(e) => {
                    txn.abort();
                    return Err(e);
                }
            };

            if txn.queued() == 0 {
                txn.abort();
                return Ok(value);
            }

            match txn.commit()? {
                TxnOutcome::Committed => return Ok(value),
                TxnOutcome::Conflict if attempt < max_attempts => {
                    tracing::warn!(
                        "{} in {:?} raced a concurrent writer, retrying (attempt {}/{})",
                        what,
                        self.layout.name(),
                        attempt,
                        max_attempts
                    );
                }
                TxnOutcome::Conflict => {
                    tracing::warn!(
                        "{} in {:?} gave up after {} conflicting attempts",
                        what,
                        self.layout.name(),
                        attempt
                    );
                    return Err(BucketError::Conflict { attempts: attempt });
                }
            }
        }
    }
}
