//! Snapshot persistence and settings bootstrap.

use tempfile::TempDir;

use crate::common::{all_ids, record, registry_with, sizes};
use vecshard::shard::SnapshotRecord;
use vecshard::{
    RegistrySnapshot, Settings, ShardError, ShardRegistry, ShardStatus, StrategyKind,
};

#[test]
fn test_snapshot_file_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join(".vecshard").join("snapshot.json");

    let registry = registry_with(StrategyKind::Hash, &[("s1", 10), ("s2", 0)]);
    for i in 0..12 {
        registry
            .insert(record(&format!("v{i}"), &[1.0, i as f32]).with_metadata("n", i))
            .unwrap();
    }
    registry
        .set_shard_status(&"s2".into(), ShardStatus::Offline)
        .unwrap();

    registry.snapshot().save(&path).unwrap();
    let restored = ShardRegistry::restore(RegistrySnapshot::load(&path).unwrap()).unwrap();

    assert_eq!(restored.strategy(), StrategyKind::Hash);
    assert_eq!(restored.get_shards(), registry.get_shards());
    assert_eq!(all_ids(&restored), all_ids(&registry));
    assert_eq!(restored.get("v7"), registry.get("v7"));
    assert_eq!(
        restored.search(&[1.0, 3.0], 5, 0.0),
        registry.search(&[1.0, 3.0], 5, 0.0)
    );
}

#[test]
fn test_restore_rejects_vector_in_two_shards() {
    let registry = registry_with(StrategyKind::RoundRobin, &[("s1", 0), ("s2", 0)]);
    registry.insert(record("a", &[1.0])).unwrap();
    registry.insert(record("b", &[1.0])).unwrap();

    let mut snapshot = registry.snapshot();
    let copy = snapshot.shards[0].records[0].clone();
    snapshot.shards[1].records.push(SnapshotRecord {
        sequence: 99,
        record: copy.record,
    });
    snapshot.shards[1].descriptor.current_size += 1;

    let err = ShardRegistry::restore(snapshot).unwrap_err();
    assert!(matches!(err, ShardError::InvariantViolation { .. }), "{err}");
    assert!(err.is_fatal());
}

#[test]
fn test_restore_rejects_over_capacity_and_bad_sizes() {
    let registry = registry_with(StrategyKind::RoundRobin, &[("s1", 2)]);
    registry.insert(record("a", &[1.0])).unwrap();
    registry.insert(record("b", &[1.0])).unwrap();

    let mut shrunk = registry.snapshot();
    shrunk.shards[0].descriptor.capacity = 1;
    assert!(ShardRegistry::restore(shrunk).is_err());

    let mut miscounted = registry.snapshot();
    miscounted.shards[0].descriptor.current_size = 5;
    assert!(matches!(
        ShardRegistry::restore(miscounted),
        Err(ShardError::InvariantViolation { .. })
    ));
}

#[test]
fn test_restore_rejects_exhausted_sequence() {
    let registry = registry_with(StrategyKind::RoundRobin, &[("s1", 0)]);
    registry.insert(record("a", &[1.0])).unwrap();

    let mut snapshot = registry.snapshot();
    snapshot.shards[0].records[0].sequence = u64::MAX;

    let err = ShardRegistry::restore(snapshot).unwrap_err();
    assert!(matches!(err, ShardError::InvariantViolation { .. }), "{err}");
    assert!(err.to_string().contains("out of range"));
}

#[test]
fn test_restore_rejects_duplicate_shard_ids() {
    let registry = registry_with(StrategyKind::RoundRobin, &[("s1", 0)]);
    let mut snapshot = registry.snapshot();
    snapshot.shards.push(snapshot.shards[0].clone());

    assert!(matches!(
        ShardRegistry::restore(snapshot),
        Err(ShardError::DuplicateShardId { .. })
    ));
}

#[test]
fn test_registry_from_settings_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &config_path,
        r#"
[placement]
strategy = "round-robin"

[[shards]]
id = "primary"
capacity = 2

[[shards]]
id = "overflow"
name = "Overflow pool"
"#,
    )
    .unwrap();

    let settings = Settings::load_from(&config_path).unwrap();
    let registry = ShardRegistry::from_settings(&settings).unwrap();

    let shards = registry.get_shards();
    assert_eq!(shards.len(), 2);
    assert_eq!(shards[1].name, "Overflow pool");
    assert!(shards[1].is_unlimited());

    for i in 0..6 {
        registry.insert(record(&format!("v{i}"), &[1.0])).unwrap();
    }
    assert_eq!(sizes(&registry), vec![2, 4]);
}

#[test]
fn test_settings_with_duplicate_shards_fail_bootstrap() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &config_path,
        "[[shards]]\nid = \"s1\"\n\n[[shards]]\nid = \"s1\"\n",
    )
    .unwrap();

    let settings = Settings::load_from(&config_path).unwrap();
    assert!(matches!(
        ShardRegistry::from_settings(&settings),
        Err(ShardError::DuplicateShardId { .. })
    ));
}
