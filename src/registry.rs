//! Identity & Shard-Bound Registry
//!
//! Owns the two persisted counters of a store:
//! - `{store}/maxid`: last allocated id (absent means 0)
//! - `{store}/maxbucketid`: highest record shard ever allocated (absent means 1)
//!
//! Counters are never cached; several handles may share one backend. They
//! only move inside the transaction that writes the records they describe.

use crate::backend::{Backend, Transaction, WriteOp};
use crate::bucket::BucketAllocator;
use crate::error::{BucketError, Result};
use crate::record::RecordId;

/// Read/advance access to the counters of one store
pub struct Registry<'a, B: Backend + ?Sized> {
    backend: &'a B,
    layout: &'a BucketAllocator,
}

/// Ids reserved for one batch, valid only until its transaction commits
#[derive(Debug, Clone)]
pub struct Allocation {
    pub ids: Vec<RecordId>,

    /// New `maxbucketid` to persist, if the batch spills into a new shard
    pub shard_advance: Option<u64>,
}

impl<'a, B: Backend + ?Sized> Registry<'a, B> {
    pub fn new(backend: &'a B, layout: &'a BucketAllocator) -> Self {
        Self { backend, layout }
    }

    /// Last allocated id, 0 before the first write
    pub fn current_max_id(&self) -> Result<u64> {
        let key = self.layout.max_id_key();
        match self.backend.get(&key)? {
            Some(raw) => parse_counter(&key, &raw),
            None => Ok(0),
        }
    }

    /// Highest record shard ever used; initialised to 1 on first read
    pub fn current_max_shard_id(&self) -> Result<u64> {
        let key = self.layout.max_shard_id_key();
        match self.backend.get(&key)? {
            Some(raw) => parse_counter(&key, &raw),
            None => {
                self.backend.set(&key, b"1")?;
                Ok(1)
            }
        }
    }

    /// Compute ids `max_id+1 ..= max_id+count` without reserving them
    pub fn allocate(&self, count: usize) -> Result<Allocation> {
        let max_id = self.current_max_id()?;
        let max_shard_id = self.current_max_shard_id()?;

        let ids: Vec<RecordId> = (1..=count as u64).map(|n| RecordId::new(max_id + n)).collect();

        let shard_advance = ids
            .last()
            .map(|&last| self.layout.record_shard_id(last))
            .filter(|&shard_id| shard_id > max_shard_id);

        Ok(Allocation { ids, shard_advance })
    }

    /// Queue the counter advances for `allocation` into `txn`
    pub fn queue_advance(&self, txn: &mut Transaction<'_, B>, allocation: &Allocation) {
        if let Some(shard_id) = allocation.shard_advance {
            txn.queue(WriteOp::Set {
                key: self.layout.max_shard_id_key(),
                value: shard_id.to_string().into_bytes(),
            });
        }
        txn.queue(WriteOp::IncrBy {
            key: self.layout.max_id_key(),
            delta: allocation.ids.len() as i64,
        });
    }
}

fn parse_counter(key: &str, raw: &[u8]) -> Result<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<u64>().ok())
        .ok_or_else(|| {
            BucketError::Backend(format!(
                "counter {:?} holds a non-integer value {:?}",
                key,
                String::from_utf8_lossy(raw)
            ))
        })
}
