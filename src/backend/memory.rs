//! In-memory backend
//!
//! A hash-map-capable key/value server living in process memory. Cloning the
//! handle shares the same data, the way several connections share one server.
//!
//! ## Concurrency
//! - One `RwLock` over the whole keyspace: reads run concurrently, writes and
//!   `exec` are exclusive
//! - Every write stamps the key with a fresh version from a logical clock;
//!   `exec` compares watched versions under the write lock
//! - Writes change hashes in place; `exec` keeps an undo log instead of
//!   copying the shards it touches
//!
//! ## Versions of removed keys
//! A removed key keeps its last version so a watcher still sees the change.
//! Once more than `TOMBSTONE_LIMIT` removed keys are tracked they are dropped
//! and every absent key reports the clock at that moment instead. Watchers of
//! absent keys may then see a spurious conflict, never a missed one.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{BucketError, Result};

use super::glob::glob_match;
use super::{Backend, ScanPage, TxnOutcome, TxnRequest, WriteOp, HASH_MAX_ENTRIES};

/// Names under which other servers expose the hash capacity
const HASH_MAX_ENTRIES_ALIASES: &[&str] = &["hash-max-ziplist-entries", "hash-max-listpack-entries"];

/// Removed keys whose versions are kept before they are pruned
pub const TOMBSTONE_LIMIT: usize = 4096;

#[derive(Debug, Clone)]
enum Value {
    Str(Vec<u8>),
    Hash(BTreeMap<Vec<u8>, Vec<u8>>),
}

#[derive(Debug, Default)]
struct State {
    data: BTreeMap<String, Value>,
    /// Last write version per key; kept a while after the key is removed
    versions: HashMap<String, u64>,
    /// Version of every key absent from `versions`
    floor: u64,
    clock: u64,
}

impl State {
    fn touch(&mut self, key: &str) {
        self.clock += 1;
        self.versions.insert(key.to_string(), self.clock);
        if self.versions.len() > self.data.len() + TOMBSTONE_LIMIT {
            self.prune_tombstones();
        }
    }

    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(self.floor)
    }

    fn prune_tombstones(&mut self) {
        let data = &self.data;
        let before = self.versions.len();
        self.versions.retain(|key, _| data.contains_key(key));
        self.floor = self.clock;
        tracing::trace!(
            "Pruned {} removed-key versions at clock {}",
            before - self.versions.len(),
            self.floor
        );
    }

    fn hash(&self, key: &str) -> Result<Option<&BTreeMap<Vec<u8>, Vec<u8>>>> {
        match self.data.get(key) {
            None => Ok(None),
            Some(Value::Hash(fields)) => Ok(Some(fields)),
            Some(Value::Str(_)) => Err(wrong_type(key)),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: RwLock<State>,
    config: RwLock<HashMap<String, String>>,
}

/// In-process backend
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    inner: Arc<Shared>,
}

impl MemoryBackend {
    /// Empty backend reporting the default hash capacity
    pub fn new() -> Self {
        Self::with_hash_max_entries(crate::config::DEFAULT_CAPACITY)
    }

    /// Empty backend reporting `entries` as its hash capacity
    pub fn with_hash_max_entries(entries: u64) -> Self {
        let backend = Self {
            inner: Arc::new(Shared::default()),
        };
        backend.set_config(HASH_MAX_ENTRIES, entries.to_string());
        backend
    }

    /// Set a config parameter
    pub fn set_config(&self, name: &str, value: impl Into<String>) {
        self.inner
            .config
            .write()
            .insert(canonical_config_name(name).to_string(), value.into());
    }

    /// Remove a config parameter
    pub fn remove_config(&self, name: &str) {
        self.inner.config.write().remove(canonical_config_name(name));
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        self.inner.state.read().data.len()
    }

    /// Number of keys with a tracked version, removed keys included
    pub fn tracked_versions(&self) -> usize {
        self.inner.state.read().versions.len()
    }

    /// Drop every key
    pub fn flush_all(&self) {
        let mut state = self.inner.state.write();
        let keys: Vec<String> = state.data.keys().cloned().collect();
        state.data.clear();
        for key in keys {
            state.touch(&key);
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.inner.state.read().data.contains_key(key))
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.inner.state.read().data.get(key) {
            None => Ok(None),
            Some(Value::Str(value)) => Ok(Some(value.clone())),
            Some(Value::Hash(_)) => Err(wrong_type(key)),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut state = self.inner.state.write();
        state.data.insert(key.to_string(), Value::Str(value.to_vec()));
        state.touch(key);
        Ok(())
    }

    fn hexists(&self, key: &str, field: &[u8]) -> Result<bool> {
        let state = self.inner.state.read();
        Ok(state.hash(key)?.map_or(false, |fields| fields.contains_key(field)))
    }

    fn hget(&self, key: &str, field: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.inner.state.read();
        Ok(state.hash(key)?.and_then(|fields| fields.get(field).cloned()))
    }

    fn hset(&self, key: &str, field: &[u8], value: &[u8]) -> Result<bool> {
        let mut state = self.inner.state.write();
        let previous = with_slot(&mut state, key, |slot| apply_hset(slot, key, field, value))?;
        state.touch(key);
        Ok(previous.is_none())
    }

    fn hdel(&self, key: &str, field: &[u8]) -> Result<bool> {
        let mut state = self.inner.state.write();
        let removed = with_slot(&mut state, key, |slot| apply_hdel(slot, key, field))?;
        if removed.is_some() {
            state.touch(key);
        }
        Ok(removed.is_some())
    }

    fn hlen(&self, key: &str) -> Result<u64> {
        let state = self.inner.state.read();
        Ok(state.hash(key)?.map_or(0, |fields| fields.len() as u64))
    }

    fn config_get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.inner.config.read().get(canonical_config_name(name)).cloned())
    }

    fn watch(&self, keys: &[String]) -> Result<Vec<u64>> {
        let state = self.inner.state.read();
        Ok(keys
            .iter()
            .map(|key| state.version(key))
            .collect())
    }

    fn exec(&self, txn: &TxnRequest) -> Result<TxnOutcome> {
        let mut state = self.inner.state.write();

        for watched in &txn.watched {
            if state.version(&watched.key) != watched.version {
                tracing::trace!("EXEC aborted: {} changed since WATCH", watched.key);
                return Ok(TxnOutcome::Conflict);
            }
        }

        // A failing op rolls back everything applied before it
        let mut undo = Vec::with_capacity(txn.ops.len());
        for op in &txn.ops {
            if let Err(e) = apply_op(&mut state, op, &mut undo) {
                for entry in undo.into_iter().rev() {
                    entry.revert(&mut state);
                }
                return Err(e);
            }
        }

        let mut touched: Vec<&str> = txn.ops.iter().map(WriteOp::key).collect();
        touched.sort_unstable();
        touched.dedup();
        for key in touched {
            state.touch(key);
        }

        Ok(TxnOutcome::Committed)
    }

    fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage<String>> {
        let state = self.inner.state.read();
        let start = cursor as usize;
        let count = count.max(1);

        let items = state
            .data
            .keys()
            .skip(start)
            .take(count)
            .filter(|key| glob_match(pattern.as_bytes(), key.as_bytes()))
            .cloned()
            .collect();

        Ok(ScanPage {
            cursor: next_cursor(start, count, state.data.len()),
            items,
        })
    }

    fn hscan(
        &self,
        key: &str,
        cursor: u64,
        pattern: Option<&[u8]>,
        count: usize,
    ) -> Result<ScanPage<(Vec<u8>, Vec<u8>)>> {
        let state = self.inner.state.read();
        let fields = match state.hash(key)? {
            Some(fields) => fields,
            None => {
                return Ok(ScanPage {
                    cursor: 0,
                    items: Vec::new(),
                })
            }
        };

        let start = cursor as usize;
        let count = count.max(1);
        let items = fields
            .iter()
            .skip(start)
            .take(count)
            .filter(|(field, _)| pattern.map_or(true, |p| glob_match(p, field)))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();

        Ok(ScanPage {
            cursor: next_cursor(start, count, fields.len()),
            items,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn canonical_config_name(name: &str) -> &str {
    if HASH_MAX_ENTRIES_ALIASES.contains(&name) {
        HASH_MAX_ENTRIES
    } else {
        name
    }
}

fn wrong_type(key: &str) -> BucketError {
    BucketError::Backend(format!(
        "WRONGTYPE operation against key {:?} holding the wrong kind of value",
        key
    ))
}

fn next_cursor(start: usize, count: usize, total: usize) -> u64 {
    let next = start.saturating_add(count);
    if next >= total {
        0
    } else {
        next as u64
    }
}

/// How to take back one applied op
enum Undo {
    /// Restore the whole value (`None` removes the key)
    Value { key: String, previous: Option<Value> },
    /// Restore one hash field (`None` removes the field)
    Field {
        key: String,
        field: Vec<u8>,
        previous: Option<Vec<u8>>,
    },
}

impl Undo {
    fn revert(self, state: &mut State) {
        match self {
            Undo::Value { key, previous } => match previous {
                Some(value) => {
                    state.data.insert(key, value);
                }
                None => {
                    state.data.remove(&key);
                }
            },
            Undo::Field { key, field, previous } => {
                let slot = state
                    .data
                    .entry(key.clone())
                    .or_insert_with(|| Value::Hash(BTreeMap::new()));
                let emptied = match slot {
                    Value::Hash(fields) => {
                        match previous {
                            Some(value) => fields.insert(field, value),
                            None => fields.remove(&field),
                        };
                        fields.is_empty()
                    }
                    Value::Str(_) => false,
                };
                if emptied {
                    state.data.remove(&key);
                }
            }
        }
    }
}

/// Run `apply` on the value at `key` without copying it; a slot left `None`
/// removes the key
fn with_slot<T>(
    state: &mut State,
    key: &str,
    apply: impl FnOnce(&mut Option<Value>) -> Result<T>,
) -> Result<T> {
    let mut slot = state.data.remove(key);
    let result = apply(&mut slot);
    if let Some(value) = slot {
        state.data.insert(key.to_string(), value);
    }
    result
}

/// Apply one op in place, logging how to undo it
fn apply_op(state: &mut State, op: &WriteOp, undo: &mut Vec<Undo>) -> Result<()> {
    match op {
        WriteOp::Set { key, value } => {
            let previous = state.data.insert(key.clone(), Value::Str(value.clone()));
            undo.push(Undo::Value {
                key: key.clone(),
                previous,
            });
        }
        WriteOp::IncrBy { key, delta } => {
            let next = incremented(state.data.get(key), key, *delta)?;
            let previous = state.data.insert(key.clone(), Value::Str(next));
            undo.push(Undo::Value {
                key: key.clone(),
                previous,
            });
        }
        WriteOp::HSet { key, field, value } => {
            let previous = with_slot(state, key, |slot| apply_hset(slot, key, field, value))?;
            undo.push(Undo::Field {
                key: key.clone(),
                field: field.clone(),
                previous,
            });
        }
        WriteOp::HDel { key, field } => {
            if let Some(previous) = with_slot(state, key, |slot| apply_hdel(slot, key, field))? {
                undo.push(Undo::Field {
                    key: key.clone(),
                    field: field.clone(),
                    previous: Some(previous),
                });
            }
        }
    }
    Ok(())
}

fn incremented(current: Option<&Value>, key: &str, delta: i64) -> Result<Vec<u8>> {
    let current = match current {
        None => 0,
        Some(Value::Str(bytes)) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or_else(|| BucketError::Backend(format!("value at {:?} is not an integer", key)))?,
        Some(Value::Hash(_)) => return Err(wrong_type(key)),
    };
    let next = current
        .checked_add(delta)
        .ok_or_else(|| BucketError::Backend(format!("increment at {:?} would overflow", key)))?;
    Ok(next.to_string().into_bytes())
}

/// Returns the field's previous value
fn apply_hset(
    slot: &mut Option<Value>,
    key: &str,
    field: &[u8],
    value: &[u8],
) -> Result<Option<Vec<u8>>> {
    match slot {
        None => {
            let mut fields = BTreeMap::new();
            fields.insert(field.to_vec(), value.to_vec());
            *slot = Some(Value::Hash(fields));
            Ok(None)
        }
        Some(Value::Hash(fields)) => Ok(fields.insert(field.to_vec(), value.to_vec())),
        Some(Value::Str(_)) => Err(wrong_type(key)),
    }
}

/// Returns the removed value. Emptied hashes disappear, as on a real server
fn apply_hdel(slot: &mut Option<Value>, key: &str, field: &[u8]) -> Result<Option<Vec<u8>>> {
    match slot {
        None => Ok(None),
        Some(Value::Hash(fields)) => {
            let removed = fields.remove(field);
            if fields.is_empty() {
                *slot = None;
            }
            Ok(removed)
        }
        Some(Value::Str(_)) => Err(wrong_type(key)),
    }
}
