//! # BucketDB
//!
//! A sharded record store with a content-addressed secondary index, layered
//! on any hash-map-capable key/value backend:
//! - Monotonic record ids that are never reused
//! - Uniqueness enforcement on record payloads
//! - All-or-nothing batch create/update/delete
//! - Best-effort glob and regular expression search over payloads
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Store                                │
//! │        create / get / update / delete / search / info        │
//! └──────┬──────────────┬──────────────┬───────────────┬────────┘
//!        │              │              │               │
//!        ▼              ▼              ▼               ▼
//!   ┌─────────┐   ┌──────────┐   ┌──────────┐   ┌───────────┐
//!   │ Bucket  │   │ Registry │   │  Oracle  │   │  Search   │
//!   │Allocator│   │ (max id) │   │ (exists) │   │(SCAN/HSCAN│
//!   └─────────┘   └──────────┘   └──────────┘   └───────────┘
//!        │              │              │               │
//!        └──────────────┴──────┬───────┴───────────────┘
//!                              ▼
//!                    ┌──────────────────┐
//!                    │  Batch Engine    │
//!                    │ WATCH/MULTI/EXEC │
//!                    └────────┬─────────┘
//!                             ▼
//!              ┌─────────────────────────────┐
//!              │   Backend (trait)           │
//!              │  MemoryBackend | Remote TCP │
//!              └─────────────────────────────┘
//! ```
//!
//! ## Persisted Layout
//!
//! ```text
//! {store}/maxid              next id is maxid + 1
//! {store}/maxbucketid        highest record shard ever allocated
//! {store}/hash-max-entries   shard capacity, written once
//! {store}/bucket/{n}         record shard:  id      -> payload
//! {store}/idx/bucket/{n}     index shard:   payload -> id
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod bucket;
pub mod registry;
pub mod oracle;
pub mod batch;
pub mod search;
pub mod store;

pub mod backend;
pub mod protocol;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BucketError, Result};
pub use config::{ConsistencyMode, ServerConfig, StoreConfig};
pub use record::{Record, RecordId};
pub use backend::{Backend, MemoryBackend, RemoteBackend};
pub use store::Store;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of BucketDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
