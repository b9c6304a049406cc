//! Tests for the Bucket Allocator and record ids
//!
//! These tests verify:
//! - Record shard arithmetic (1-based, capacity-sized)
//! - Index shard placement (CRC-32 modulo estimated shard count)
//! - Index shard count estimation edge cases
//! - Persisted key layout
//! - Record id parsing

use bucketdb::backend::glob::glob_match;
use bucketdb::bucket::{capacity_key, estimate_index_shard_count, BucketAllocator};
use bucketdb::{BucketError, RecordId};

// =============================================================================
// Helper Functions
// =============================================================================

fn allocator(capacity: u64) -> BucketAllocator {
    BucketAllocator::new("users", capacity, 1_000_000, 0.9).unwrap()
}

// =============================================================================
// Record Shard Tests
// =============================================================================

#[test]
fn test_record_shard_boundaries() {
    let layout = allocator(512);

    assert_eq!(layout.record_shard_id(RecordId::new(1)), 1);
    assert_eq!(layout.record_shard_id(RecordId::new(512)), 1);
    assert_eq!(layout.record_shard_id(RecordId::new(513)), 2);
    assert_eq!(layout.record_shard_id(RecordId::new(1024)), 2);
    assert_eq!(layout.record_shard_id(RecordId::new(1025)), 3);
}

#[test]
fn test_record_shard_third_shard_starts_at_two_capacities_plus_one() {
    for capacity in [1u64, 2, 7, 128, 512] {
        let layout = allocator(capacity);
        let id = RecordId::new(capacity * 2 + 1);

        assert_eq!(layout.record_shard_id(id), 3, "capacity {}", capacity);
        // Deterministic
        assert_eq!(layout.record_shard_id(id), layout.record_shard_id(id));
    }
}

#[test]
fn test_record_shard_key() {
    let layout = allocator(4);

    assert_eq!(layout.record_shard_key(RecordId::new(1)), "users/bucket/1");
    assert_eq!(layout.record_shard_key(RecordId::new(5)), "users/bucket/2");
    assert_eq!(layout.record_shard_key_for(9), "users/bucket/9");
}

#[test]
fn test_zero_capacity_rejected() {
    let result = BucketAllocator::new("users", 0, 1_000_000, 0.9);
    assert!(matches!(result, Err(BucketError::ConfigInvalid(_))));
}

// =============================================================================
// Index Shard Tests
// =============================================================================

#[test]
fn test_index_shard_is_crc32_modulo_count() {
    let layout = allocator(512);
    let count = layout.index_shard_count();

    // CRC-32/IEEE check value
    assert_eq!(crc32fast::hash(b"123456789"), 0xCBF4_3926);
    assert_eq!(layout.index_shard_id(b"123456789"), 0xCBF4_3926u64 % count);
}

#[test]
fn test_index_shard_is_deterministic_and_in_range() {
    let layout = allocator(16);
    let count = layout.index_shard_count();

    for i in 0..1000 {
        let data = format!("{{\"name\":\"user{}\"}}", i);
        let shard = layout.index_shard_id(data.as_bytes());
        assert!(shard < count);
        assert_eq!(shard, layout.index_shard_id(data.as_bytes()));
        assert_eq!(
            layout.index_shard_key(data.as_bytes()),
            format!("users/idx/bucket/{}", shard)
        );
    }
}

#[test]
fn test_index_shards_spread_payloads() {
    let layout = allocator(512);
    let mut shards = std::collections::HashSet::new();

    for i in 0..1000 {
        shards.insert(layout.index_shard_id(format!("payload-{}", i).as_bytes()));
    }

    // 1000 payloads over 2173 shards should land in many distinct shards
    assert!(shards.len() > 500, "only {} distinct shards", shards.len());
}

#[test]
fn test_estimate_index_shard_count() {
    // 512 * 0.9 = 460.8 -> 460 per shard
    assert_eq!(estimate_index_shard_count(512, 1_000_000, 0.9), 2173);
    assert_eq!(allocator(512).index_shard_count(), 2173);

    // Full fill factor
    assert_eq!(estimate_index_shard_count(1000, 1_000_000, 1.0), 1000);
}

#[test]
fn test_estimate_index_shard_count_never_zero() {
    // Tiny capacity: floor(1 * 0.9) = 0 per shard is treated as 1
    assert_eq!(estimate_index_shard_count(1, 1_000_000, 0.9), 1_000_000);

    // Capacity larger than the expected record count
    assert_eq!(estimate_index_shard_count(10_000_000, 1_000_000, 0.9), 1);
}

// =============================================================================
// Key Layout Tests
// =============================================================================

#[test]
fn test_counter_and_config_keys() {
    let layout = allocator(512);

    assert_eq!(layout.max_id_key(), "users/maxid");
    assert_eq!(layout.max_shard_id_key(), "users/maxbucketid");
    assert_eq!(layout.capacity_key(), "users/hash-max-entries");
    assert_eq!(capacity_key("users"), "users/hash-max-entries");
}

#[test]
fn test_index_scan_pattern_matches_only_index_shards() {
    let layout = allocator(512);
    let pattern = layout.index_scan_pattern().as_bytes();

    assert!(glob_match(pattern, layout.index_shard_key(b"x").as_bytes()));
    assert!(!glob_match(pattern, layout.record_shard_key(RecordId::new(1)).as_bytes()));
    assert!(!glob_match(pattern, layout.max_id_key().as_bytes()));
    assert!(!glob_match(pattern, b"other/idx/bucket/1"));
}

#[test]
fn test_index_scan_pattern_escapes_store_name() {
    let layout = BucketAllocator::new("a*b", 512, 1_000_000, 0.9).unwrap();
    let pattern = layout.index_scan_pattern().as_bytes();

    assert_eq!(layout.index_scan_pattern(), "a\\*b/idx/bucket/*");
    assert!(glob_match(pattern, b"a*b/idx/bucket/7"));
    assert!(!glob_match(pattern, b"axxb/idx/bucket/7"));
}

// =============================================================================
// Record Id Tests
// =============================================================================

#[test]
fn test_record_id_parse() {
    assert_eq!("42".parse::<RecordId>().unwrap(), RecordId::new(42));
    assert_eq!(
        "18446744073709551615".parse::<RecordId>().unwrap(),
        RecordId::new(u64::MAX)
    );
    assert_eq!(RecordId::from_bytes(b"7").unwrap(), RecordId::new(7));
}

#[test]
fn test_record_id_parse_malformed() {
    for raw in ["", "0", "abc", "-1", "+1", " 1", "1.5", "18446744073709551616"] {
        assert!(
            matches!(raw.parse::<RecordId>(), Err(BucketError::MalformedId(_))),
            "{:?} should be malformed",
            raw
        );
    }
    assert!(matches!(
        RecordId::from_bytes(b"\xFF\xFE"),
        Err(BucketError::MalformedId(_))
    ));
}

#[test]
fn test_record_id_display_round_trip() {
    let id = RecordId::new(1234);
    assert_eq!(id.to_string(), "1234");
    assert_eq!(id.to_bytes(), b"1234".to_vec());
}
