//! Tests for batch create/update/delete
//!
//! These tests verify:
//! - Ids are allocated contiguously in input order
//! - A batch is all-or-nothing: any validation failure leaves no trace
//! - Updates re-index payloads and skip unchanged entries
//! - Deletes remove the record and its index entry together
//! - The shard bound advances when ids spill into new record shards

use bucketdb::{Backend, BucketError, MemoryBackend, Record, RecordId, Store, StoreConfig};

// =============================================================================
// Helper Functions
// =============================================================================

fn open_store() -> (MemoryBackend, Store<MemoryBackend>) {
    let backend = MemoryBackend::new();
    let store = Store::open(backend.clone(), StoreConfig::named("batch")).unwrap();
    (backend, store)
}

fn open_small_store(capacity: u64) -> (MemoryBackend, Store<MemoryBackend>) {
    let backend = MemoryBackend::with_hash_max_entries(capacity);
    let store = Store::open(backend.clone(), StoreConfig::named("batch")).unwrap();
    (backend, store)
}

fn ids(raw: &[u64]) -> Vec<RecordId> {
    raw.iter().copied().map(RecordId::new).collect()
}

// =============================================================================
// Batch Create Tests
// =============================================================================

#[test]
fn test_batch_create_ids_in_input_order() {
    let (_, store) = open_store();

    let first = store.batch_create(&["a", "b", "c"]).unwrap();
    assert_eq!(first, ids(&[1, 2, 3]));

    let second = store.batch_create(&["d", "e"]).unwrap();
    assert_eq!(second, ids(&[4, 5]));

    assert_eq!(store.get(RecordId::new(2)).unwrap(), b"b".to_vec());
    assert_eq!(store.get(RecordId::new(5)).unwrap(), b"e".to_vec());
    assert_eq!(store.max_id().unwrap(), 5);
}

#[test]
fn test_empty_batches_are_noops() {
    let (backend, store) = open_store();
    let keys_before = backend.key_count();

    let empty: [&str; 0] = [];
    assert!(store.batch_create(&empty).unwrap().is_empty());
    assert_eq!(store.batch_update(&[]).unwrap(), 0);
    store.batch_delete(&[]).unwrap();

    assert_eq!(backend.key_count(), keys_before);
    assert_eq!(store.max_id().unwrap(), 0);
}

#[test]
fn test_batch_create_empty_payload_writes_nothing() {
    let (_, store) = open_store();

    let result = store.batch_create(&["a", "", "c"]);
    assert!(matches!(result, Err(BucketError::EmptyPayload)));

    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(store.max_id().unwrap(), 0);
    assert!(!store.exists("a").unwrap());
    assert!(!store.exists("c").unwrap());
}

#[test]
fn test_batch_create_duplicate_in_batch() {
    let (_, store) = open_store();

    let result = store.batch_create(&["a", "b", "a"]);
    assert!(matches!(result, Err(BucketError::DuplicateInBatch(_))));
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn test_batch_create_existing_payload_writes_nothing() {
    let (_, store) = open_store();
    store.create("b").unwrap();

    let result = store.batch_create(&["a", "b", "c"]);
    assert!(matches!(result, Err(BucketError::AlreadyExists(_))));

    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.max_id().unwrap(), 1);
    assert!(!store.exists("a").unwrap());
    assert!(!store.exists("c").unwrap());

    // The failed batch consumed no ids
    assert_eq!(store.create("a").unwrap(), RecordId::new(2));
}

#[test]
fn test_validation_errors_are_flagged() {
    let (_, store) = open_store();
    store.create("x").unwrap();

    let errors = vec![
        store.batch_create(&[""]).unwrap_err(),
        store.batch_create(&["y", "y"]).unwrap_err(),
        store.create("x").unwrap_err(),
        store.delete(RecordId::new(42)).unwrap_err(),
    ];
    for error in errors {
        assert!(error.is_validation(), "{} should be a validation error", error);
    }

    assert!(!BucketError::Conflict { attempts: 3 }.is_validation());
    assert!(!BucketError::Backend("down".to_string()).is_validation());
}

// =============================================================================
// Shard Bound Tests
// =============================================================================

#[test]
fn test_max_shard_id_initialised_to_one() {
    let (backend, store) = open_store();

    assert_eq!(backend.get("batch/maxbucketid").unwrap(), None);
    store.count().unwrap();
    assert_eq!(backend.get("batch/maxbucketid").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_batch_spills_into_new_record_shards() {
    let (backend, store) = open_small_store(4);

    let payloads: Vec<String> = (1..=9).map(|i| format!("p{}", i)).collect();
    store.batch_create(&payloads).unwrap();

    // ids 1..=4 -> shard 1, 5..=8 -> shard 2, 9 -> shard 3
    assert_eq!(backend.hlen("batch/bucket/1").unwrap(), 4);
    assert_eq!(backend.hlen("batch/bucket/2").unwrap(), 4);
    assert_eq!(backend.hlen("batch/bucket/3").unwrap(), 1);
    assert_eq!(backend.get("batch/maxbucketid").unwrap(), Some(b"3".to_vec()));
    assert_eq!(backend.get("batch/maxid").unwrap(), Some(b"9".to_vec()));
}

#[test]
fn test_shard_bound_never_decreases() {
    let (backend, store) = open_small_store(2);

    let created = store.batch_create(&["a", "b", "c", "d", "e"]).unwrap();
    store.batch_delete(&created).unwrap();
    assert_eq!(backend.get("batch/maxbucketid").unwrap(), Some(b"3".to_vec()));

    store.create("f").unwrap();
    assert_eq!(backend.get("batch/maxbucketid").unwrap(), Some(b"3".to_vec()));
    assert_eq!(store.count().unwrap(), 1);
}

// =============================================================================
// Batch Update Tests
// =============================================================================

#[test]
fn test_batch_update_reindexes() {
    let (_, store) = open_store();
    let created = store.batch_create(&["a", "b", "c"]).unwrap();

    let changed = store
        .batch_update(&[Record::new(created[0], "A"), Record::new(created[2], "C")])
        .unwrap();
    assert_eq!(changed, 2);

    assert_eq!(store.get(created[0]).unwrap(), b"A".to_vec());
    assert_eq!(store.get(created[1]).unwrap(), b"b".to_vec());
    assert_eq!(store.get(created[2]).unwrap(), b"C".to_vec());

    assert!(!store.exists("a").unwrap());
    assert!(!store.exists("c").unwrap());
    assert_eq!(store.search("A").unwrap(), vec![created[0]]);
    assert_eq!(store.search("C").unwrap(), vec![created[2]]);

    // Old payloads are free again
    assert_eq!(store.create("a").unwrap(), RecordId::new(4));
}

#[test]
fn test_update_unchanged_payload_is_skipped() {
    let (backend, store) = open_store();
    let id = store.create("same").unwrap();
    let max_id = store.max_id().unwrap();
    let keys = backend.key_count();

    assert_eq!(store.batch_update(&[Record::new(id, "same")]).unwrap(), 0);
    store.update(id, "same").unwrap();

    assert_eq!(store.get(id).unwrap(), b"same".to_vec());
    assert_eq!(store.search("same").unwrap(), vec![id]);
    assert_eq!(store.max_id().unwrap(), max_id);
    assert_eq!(backend.key_count(), keys);
}

#[test]
fn test_update_to_payload_owned_by_other_record_fails() {
    let (_, store) = open_store();
    let created = store.batch_create(&["a", "b"]).unwrap();

    let result = store.batch_update(&[
        Record::new(created[0], "z"),
        Record::new(created[1], "a"),
    ]);
    assert!(matches!(result, Err(BucketError::AlreadyExists(_))));

    // Neither update was applied
    assert_eq!(store.get(created[0]).unwrap(), b"a".to_vec());
    assert_eq!(store.get(created[1]).unwrap(), b"b".to_vec());
    assert!(!store.exists("z").unwrap());
}

#[test]
fn test_update_missing_record_writes_nothing() {
    let (_, store) = open_store();
    let id = store.create("a").unwrap();

    let result = store.batch_update(&[Record::new(id, "b"), Record::new(99u64, "c")]);
    assert!(matches!(result, Err(BucketError::NotFound(_))));

    assert_eq!(store.get(id).unwrap(), b"a".to_vec());
    assert!(!store.exists("b").unwrap());
    assert!(!store.exists("c").unwrap());
}

#[test]
fn test_update_rejects_bad_batches() {
    let (_, store) = open_store();
    let created = store.batch_create(&["a", "b"]).unwrap();

    let empty = store.batch_update(&[Record::new(created[0], "")]);
    assert!(matches!(empty, Err(BucketError::EmptyPayload)));

    let same_id = store.batch_update(&[
        Record::new(created[0], "x"),
        Record::new(created[0], "y"),
    ]);
    assert!(matches!(same_id, Err(BucketError::DuplicateInBatch(_))));

    let same_payload = store.batch_update(&[
        Record::new(created[0], "x"),
        Record::new(created[1], "x"),
    ]);
    assert!(matches!(same_payload, Err(BucketError::DuplicateInBatch(_))));

    assert_eq!(store.get(created[0]).unwrap(), b"a".to_vec());
    assert_eq!(store.get(created[1]).unwrap(), b"b".to_vec());
}

// =============================================================================
// Batch Delete Tests
// =============================================================================

#[test]
fn test_batch_delete_removes_record_and_index() {
    let (backend, store) = open_store();
    let created = store.batch_create(&["a", "b", "c"]).unwrap();

    store.batch_delete(&[created[0], created[2]]).unwrap();

    assert_eq!(store.count().unwrap(), 1);
    assert!(!store.id_exists(created[0]).unwrap());
    assert!(!store.exists("a").unwrap());
    assert!(!store.exists("c").unwrap());
    assert_eq!(store.search("").unwrap(), vec![created[1]]);

    // Emptied index shards are gone from the backend
    store.delete(created[1]).unwrap();
    let remaining = backend.scan(0, "batch/idx/bucket/*", 1000).unwrap();
    assert!(remaining.items.is_empty());
}

#[test]
fn test_batch_delete_missing_id_writes_nothing() {
    let (_, store) = open_store();
    let created = store.batch_create(&["a", "b"]).unwrap();

    let result = store.batch_delete(&[created[0], RecordId::new(77)]);
    assert!(matches!(result, Err(BucketError::NotFound(_))));

    assert_eq!(store.count().unwrap(), 2);
    assert!(store.exists("a").unwrap());
}

#[test]
fn test_batch_delete_duplicate_ids() {
    let (_, store) = open_store();
    let id = store.create("a").unwrap();

    let result = store.batch_delete(&[id, id]);
    assert!(matches!(result, Err(BucketError::DuplicateInBatch(_))));
    assert!(store.id_exists(id).unwrap());
}
