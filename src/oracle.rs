//! Uniqueness Oracle
//!
//! Point lookups answering "is this payload/id already stored?". Index
//! placement is a pure hash of the payload, so one shard lookup is enough.

use crate::backend::Backend;
use crate::bucket::BucketAllocator;
use crate::error::Result;
use crate::record::RecordId;

pub struct Oracle<'a, B: Backend + ?Sized> {
    backend: &'a B,
    layout: &'a BucketAllocator,
}

impl<'a, B: Backend + ?Sized> Oracle<'a, B> {
    pub fn new(backend: &'a B, layout: &'a BucketAllocator) -> Self {
        Self { backend, layout }
    }

    /// True if some record holds exactly `data`
    pub fn exists(&self, data: &[u8]) -> Result<bool> {
        self.backend.hexists(&self.layout.index_shard_key(data), data)
    }

    /// Id of the record holding exactly `data`
    pub fn owner_of(&self, data: &[u8]) -> Result<Option<RecordId>> {
        self.backend
            .hget(&self.layout.index_shard_key(data), data)?
            .map(|raw| RecordId::from_bytes(&raw))
            .transpose()
    }

    pub fn id_exists(&self, id: RecordId) -> Result<bool> {
        self.backend
            .hexists(&self.layout.record_shard_key(id), &id.to_bytes())
    }

    /// Current payload of `id`
    pub fn payload_of(&self, id: RecordId) -> Result<Option<Vec<u8>>> {
        self.backend.hget(&self.layout.record_shard_key(id), &id.to_bytes())
    }
}
