//! Tests for the Store handle
//!
//! These tests verify:
//! - Open: capacity resolution, persistence and validation
//! - Single-record create/get/update/delete round trips
//! - Uniqueness and NotFound errors
//! - Diagnostics (count, info, max id)

use bucketdb::backend::HASH_MAX_ENTRIES;
use bucketdb::{Backend, BucketError, MemoryBackend, Record, RecordId, Store, StoreConfig};

// =============================================================================
// Helper Functions
// =============================================================================

fn open_store(name: &str) -> (MemoryBackend, Store<MemoryBackend>) {
    let backend = MemoryBackend::new();
    let store = Store::open(backend.clone(), StoreConfig::named(name)).unwrap();
    (backend, store)
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_reads_backend_capacity() {
    let backend = MemoryBackend::with_hash_max_entries(128);
    let store = Store::open(backend.clone(), StoreConfig::named("users")).unwrap();

    assert_eq!(store.name(), "users");
    assert_eq!(store.capacity(), 128);
    assert_eq!(backend.get("users/hash-max-entries").unwrap(), Some(b"128".to_vec()));
}

#[test]
fn test_open_accepts_capacity_aliases() {
    let backend = MemoryBackend::new();
    backend.set_config("hash-max-ziplist-entries", "64");
    let store = Store::open(backend, StoreConfig::named("users")).unwrap();
    assert_eq!(store.capacity(), 64);

    let backend = MemoryBackend::new();
    backend.set_config("hash-max-listpack-entries", "32");
    let store = Store::open(backend, StoreConfig::named("users")).unwrap();
    assert_eq!(store.capacity(), 32);
}

#[test]
fn test_capacity_persisted_across_handles() {
    let backend = MemoryBackend::with_hash_max_entries(100);
    let first = Store::open(backend.clone(), StoreConfig::named("users")).unwrap();
    assert_eq!(first.capacity(), 100);

    // The backend setting changes after the store was created
    backend.set_config(HASH_MAX_ENTRIES, "5000");

    let second = Store::open(backend.clone(), StoreConfig::named("users")).unwrap();
    assert_eq!(second.capacity(), 100);

    // A different store picks up the new setting
    let other = Store::open(backend, StoreConfig::named("orders")).unwrap();
    assert_eq!(other.capacity(), 5000);
}

#[test]
fn test_open_falls_back_to_default_capacity() {
    let backend = MemoryBackend::new();
    backend.remove_config(HASH_MAX_ENTRIES);

    let store = Store::open(backend.clone(), StoreConfig::named("users")).unwrap();
    assert_eq!(store.capacity(), 512);
    assert_eq!(backend.get("users/hash-max-entries").unwrap(), Some(b"512".to_vec()));

    let config = StoreConfig::builder().name("tiny").default_capacity(8).build();
    let store = Store::open(backend, config).unwrap();
    assert_eq!(store.capacity(), 8);
}

#[test]
fn test_open_rejects_zero_capacity() {
    let backend = MemoryBackend::with_hash_max_entries(0);
    let result = Store::open(backend.clone(), StoreConfig::named("users"));
    assert!(matches!(result, Err(BucketError::ConfigInvalid(_))));

    // Nothing was persisted
    assert_eq!(backend.get("users/hash-max-entries").unwrap(), None);
}

#[test]
fn test_open_rejects_persisted_zero_capacity() {
    let backend = MemoryBackend::new();
    backend.set("users/hash-max-entries", b"0").unwrap();

    let result = Store::open(backend, StoreConfig::named("users"));
    assert!(matches!(result, Err(BucketError::ConfigInvalid(_))));
}

#[test]
fn test_open_rejects_unparseable_capacity() {
    let backend = MemoryBackend::new();
    backend.set_config(HASH_MAX_ENTRIES, "lots");

    let result = Store::open(backend, StoreConfig::named("users"));
    assert!(matches!(result, Err(BucketError::ConfigInvalid(_))));
}

#[test]
fn test_open_rejects_invalid_config() {
    let cases = [
        StoreConfig::named(""),
        StoreConfig::builder().name("s").fill_factor(0.0).build(),
        StoreConfig::builder().name("s").fill_factor(1.5).build(),
        StoreConfig::builder().name("s").expected_max_records(0).build(),
        StoreConfig::builder().name("s").scan_count(0).build(),
        StoreConfig::builder().name("s").max_txn_attempts(0).build(),
    ];

    for config in cases {
        let result = Store::open(MemoryBackend::new(), config.clone());
        assert!(
            matches!(result, Err(BucketError::ConfigInvalid(_))),
            "{:?} should be rejected",
            config
        );
    }
}

#[test]
fn test_open_and_close_leave_data() {
    let backend = MemoryBackend::new();
    let store = Store::open(backend.clone(), StoreConfig::named("users")).unwrap();
    let id = store.create("alice").unwrap();
    store.close().unwrap();

    let reopened = Store::open(backend, StoreConfig::named("users")).unwrap();
    assert_eq!(reopened.get(id).unwrap(), b"alice".to_vec());
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_create_get_round_trip() {
    let (_, store) = open_store("users");

    let id = store.create(r#"{"name":"alice"}"#).unwrap();
    assert_eq!(id, RecordId::new(1));
    assert_eq!(store.get(id).unwrap(), br#"{"name":"alice"}"#.to_vec());
    assert!(store.exists(r#"{"name":"alice"}"#).unwrap());
    assert!(store.id_exists(id).unwrap());
}

#[test]
fn test_binary_payload_round_trip() {
    let (_, store) = open_store("blobs");
    let payload = vec![0u8, 255, 10, 13, 42, 0, 7];

    let id = store.create(&payload).unwrap();
    assert_eq!(store.get(id).unwrap(), payload);
    assert!(store.exists(&payload).unwrap());
}

#[test]
fn test_get_missing_is_not_found() {
    let (_, store) = open_store("users");

    assert!(matches!(store.get(RecordId::new(1)), Err(BucketError::NotFound(_))));
    assert!(!store.id_exists(RecordId::new(1)).unwrap());
    assert!(!store.exists("nobody").unwrap());
}

#[test]
fn test_batch_get_in_input_order() {
    let (_, store) = open_store("users");
    let ids = store.batch_create(&["a", "b", "c"]).unwrap();

    let records = store.batch_get(&[ids[2], ids[0]]).unwrap();
    assert_eq!(
        records,
        vec![Record::new(ids[2], "c"), Record::new(ids[0], "a")]
    );

    let missing = store.batch_get(&[ids[0], RecordId::new(99)]);
    assert!(matches!(missing, Err(BucketError::NotFound(_))));
}

#[test]
fn test_update_round_trip() {
    let (_, store) = open_store("users");
    let id = store.create("old").unwrap();

    store.update(id, "new").unwrap();

    assert_eq!(store.get(id).unwrap(), b"new".to_vec());
    assert!(store.exists("new").unwrap());
    assert!(!store.exists("old").unwrap());
}

#[test]
fn test_delete_round_trip() {
    let (_, store) = open_store("users");
    let id = store.create("gone soon").unwrap();

    store.delete(id).unwrap();

    assert!(matches!(store.get(id), Err(BucketError::NotFound(_))));
    assert!(!store.exists("gone soon").unwrap());
    assert!(matches!(store.delete(id), Err(BucketError::NotFound(_))));
}

// =============================================================================
// Uniqueness & Identity Tests
// =============================================================================

#[test]
fn test_create_duplicate_payload_fails() {
    let (_, store) = open_store("users");
    store.create("alice").unwrap();

    let result = store.create("alice");
    assert!(matches!(result, Err(BucketError::AlreadyExists(_))));
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_recreate_after_delete_gets_new_id() {
    let (_, store) = open_store("users");
    let first = store.create("alice").unwrap();
    store.delete(first).unwrap();

    let second = store.create("alice").unwrap();
    assert!(second > first);
    assert_eq!(store.get(second).unwrap(), b"alice".to_vec());
}

#[test]
fn test_ids_never_reused() {
    let (_, store) = open_store("users");
    let ids = store.batch_create(&["a", "b", "c"]).unwrap();
    store.batch_delete(&ids).unwrap();

    let next = store.create("d").unwrap();
    assert_eq!(next, RecordId::new(4));
    assert_eq!(store.max_id().unwrap(), 4);
}

#[test]
fn test_stores_are_isolated() {
    let backend = MemoryBackend::new();
    let users = Store::open(backend.clone(), StoreConfig::named("users")).unwrap();
    let orders = Store::open(backend, StoreConfig::named("orders")).unwrap();

    let user_id = users.create("same payload").unwrap();
    let order_id = orders.create("same payload").unwrap();

    assert_eq!(user_id, RecordId::new(1));
    assert_eq!(order_id, RecordId::new(1));
    assert_eq!(users.count().unwrap(), 1);
    assert_eq!(orders.count().unwrap(), 1);

    users.delete(user_id).unwrap();
    assert!(orders.exists("same payload").unwrap());
}

#[test]
fn test_nested_store_names_rejected() {
    let backend = MemoryBackend::new();
    let outer = Store::open(backend.clone(), StoreConfig::named("a")).unwrap();

    // `a/idx/bucket/{n}` would be both a record shard here and an index shard of `a`
    for name in ["a/idx", "a/", "/a"] {
        let result = Store::open(backend.clone(), StoreConfig::named(name));
        assert!(
            matches!(result, Err(BucketError::ConfigInvalid(_))),
            "{:?} should be rejected",
            name
        );
    }

    // Nothing was written for the rejected names
    assert!(!backend.exists("a/idx/hash-max-entries").unwrap());
    assert_eq!(outer.search("").unwrap(), Vec::<RecordId>::new());
    assert_eq!(outer.count().unwrap(), 0);
}

// =============================================================================
// Diagnostics Tests
// =============================================================================

#[test]
fn test_count_spans_record_shards() {
    let backend = MemoryBackend::with_hash_max_entries(4);
    let store = Store::open(backend, StoreConfig::named("users")).unwrap();

    let payloads: Vec<String> = (0..10).map(|i| format!("user-{}", i)).collect();
    store.batch_create(&payloads).unwrap();

    assert_eq!(store.count().unwrap(), 10);
}

#[test]
fn test_count_empty_store() {
    let (_, store) = open_store("users");
    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(store.max_id().unwrap(), 0);
}

#[test]
fn test_info_reports_counters_and_shards() {
    let backend = MemoryBackend::with_hash_max_entries(4);
    let store = Store::open(backend, StoreConfig::named("users")).unwrap();

    let payloads: Vec<String> = (0..10).map(|i| format!("user-{}", i)).collect();
    let ids = store.batch_create(&payloads).unwrap();
    store.delete(ids[0]).unwrap();

    let info = store.info().unwrap();
    assert_eq!(info["name"], "users");
    assert_eq!(info["capacity"], "4");
    assert_eq!(info["max id"], "10");
    // ids 9..=10 live in shard 3
    assert_eq!(info["max shard id"], "3");
    assert_eq!(info["record shards"], "3");
    assert_eq!(info["records"], "9");
    assert_eq!(info["index entries"], "9");
    assert_eq!(info["oversized record shards"], "");
    assert_eq!(
        info["estimated index shards"],
        store.index_shard_count().to_string()
    );
}

#[test]
fn test_info_flags_oversized_shards() {
    let backend = MemoryBackend::with_hash_max_entries(2);
    let store = Store::open(backend.clone(), StoreConfig::named("users")).unwrap();
    store.create("a").unwrap();

    // Grow record shard 1 past capacity behind the store's back
    for field in ["x", "y", "z"] {
        backend.hset("users/bucket/1", field.as_bytes(), b"v").unwrap();
    }

    let info = store.info().unwrap();
    assert_eq!(info["oversized record shards"], "users/bucket/1");
}

#[test]
fn test_corrupt_counter_is_backend_error() {
    let (backend, store) = open_store("users");
    backend.set("users/maxid", b"not a number").unwrap();

    assert!(matches!(store.create("a"), Err(BucketError::Backend(_))));
    assert!(matches!(store.max_id(), Err(BucketError::Backend(_))));
    assert_eq!(store.count().unwrap(), 0);
}
