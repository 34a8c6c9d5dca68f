//! End-to-end behavior of the registry through its public API.

use crate::common::{fill_skewed, record, registry_with, sizes};
use vecshard::{ShardId, ShardStatus, StrategyKind};

#[test]
fn test_round_robin_splits_four_inserts_evenly() {
    println!("\n=== TEST: Round-robin across two shards ===");
    let registry = registry_with(StrategyKind::RoundRobin, &[("s1", 100), ("s2", 100)]);

    for i in 1..=4 {
        let shard = registry
            .insert(record(&format!("v{i}"), &[1.0, 0.0]))
            .unwrap();
        println!("  v{i} -> {shard:?}");
    }

    assert_eq!(sizes(&registry), vec![2, 2]);
    assert_eq!(registry.total_vectors(), 4);
}

#[test]
fn test_full_registry_rejects_insert_without_error() {
    let registry = registry_with(StrategyKind::RoundRobin, &[("only", 1)]);

    assert_eq!(
        registry.insert(record("v1", &[1.0])).unwrap(),
        Some(ShardId::from("only"))
    );
    assert_eq!(registry.insert(record("v2", &[1.0])).unwrap(), None);
    assert_eq!(registry.total_vectors(), 1);
}

#[test]
fn test_search_orders_by_similarity() {
    let registry = registry_with(StrategyKind::RoundRobin, &[("s1", 0), ("s2", 0)]);
    registry.insert(record("a", &[1.0, 0.0, 0.0])).unwrap();
    registry.insert(record("b", &[0.9, 0.1, 0.0])).unwrap();
    registry.insert(record("c", &[0.0, 0.0, 1.0])).unwrap();

    let hits = registry.search(&[1.0, 0.0, 0.0], 10, 0.0);
    let ids: Vec<&str> = hits.iter().map(|hit| hit.id()).collect();

    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert!(hits[1].score > 0.99 && hits[1].score < 1.0);
    assert!(hits[2].score.abs() < 1e-6);
}

#[test]
fn test_search_min_score_filters() {
    let registry = registry_with(StrategyKind::RoundRobin, &[("s1", 0), ("s2", 0)]);
    registry.insert(record("a", &[1.0, 0.0, 0.0])).unwrap();
    registry.insert(record("b", &[0.9, 0.1, 0.0])).unwrap();
    registry.insert(record("c", &[0.0, 0.0, 1.0])).unwrap();

    let hits = registry.search(&[1.0, 0.0, 0.0], 10, 0.9);
    let ids: Vec<&str> = hits.iter().map(|hit| hit.id()).collect();

    assert_eq!(ids, vec!["a", "b"]);
    assert!(hits.iter().all(|hit| hit.score >= 0.9));
}

#[test]
fn test_search_skips_offline_shards() {
    let registry = registry_with(StrategyKind::RoundRobin, &[("s1", 0), ("s2", 0)]);
    for i in 0..6 {
        registry
            .insert(record(&format!("v{i}"), &[1.0, i as f32]))
            .unwrap();
    }
    registry
        .set_shard_status(&"s1".into(), ShardStatus::Offline)
        .unwrap();

    let hits = registry.search(&[1.0, 1.0], 10, -1.0);
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|hit| hit.shard_id.as_str() == "s2"));

    // Offline shards keep their vectors
    assert_eq!(registry.total_vectors(), 6);
    assert!(registry.get("v0").is_some());
}

#[test]
fn test_rebalance_after_skewed_inserts() {
    println!("\n=== TEST: Rebalance skewed registry ===");
    let registry = registry_with(StrategyKind::RoundRobin, &[("s1", 0), ("s2", 0)]);
    fill_skewed(&registry, 8);
    registry.insert(record("late-1", &[1.0, 1.0])).unwrap();
    registry.insert(record("late-2", &[1.0, 1.0])).unwrap();

    let before = sizes(&registry);
    println!("  before: {before:?}");
    assert_eq!(registry.total_vectors(), 10);

    let report = registry.rebalance().unwrap();
    let after = sizes(&registry);
    println!("  after: {after:?}, moved {}", report.moved);

    assert_eq!(registry.total_vectors(), 10);
    let spread = |s: &[usize]| s.iter().max().unwrap() - s.iter().min().unwrap();
    assert!(spread(&after) < spread(&before));
    assert_eq!(after, vec![5, 5]);
}

#[test]
fn test_drain_then_remove_decommissions_shard() {
    let registry = registry_with(
        StrategyKind::RoundRobin,
        &[("old", 0), ("new-1", 0), ("new-2", 0)],
    );
    for i in 0..12 {
        registry
            .insert(record(&format!("v{i}"), &[1.0, 0.5]))
            .unwrap();
    }

    assert!(!registry.remove_shard(&"old".into()));

    let report = registry.drain_shard(&"old".into()).unwrap();
    assert_eq!(report.moved, 4);
    assert_eq!(registry.get_shard(&"old".into()).unwrap().current_size, 0);

    assert!(registry.remove_shard(&"old".into()));
    assert_eq!(sizes(&registry), vec![6, 6]);
    registry.verify_invariants().unwrap();
}

#[test]
fn test_strategy_switch_only_affects_new_inserts() {
    let registry = registry_with(StrategyKind::RoundRobin, &[("s1", 0), ("s2", 0)]);
    registry.insert(record("x", &[1.0])).unwrap();
    registry.insert(record("y", &[1.0])).unwrap();
    let x_home = registry.locate("x");

    registry.set_strategy(StrategyKind::Range);
    // Low and high ends of the keyspace land on the first and last shard
    assert_eq!(
        registry.insert(record("\u{1}low", &[1.0])).unwrap(),
        Some(ShardId::from("s1"))
    );
    assert_eq!(
        registry.insert(record("\u{ff}high", &[1.0])).unwrap(),
        Some(ShardId::from("s2"))
    );
    assert_eq!(registry.locate("x"), x_home);
}

#[test]
fn test_hash_placement_is_stable_for_fixed_topology() {
    let registry = registry_with(StrategyKind::Hash, &[("s1", 0), ("s2", 0), ("s3", 0)]);
    let placed = registry.insert(record("doc-42", &[1.0])).unwrap();
    registry.remove("doc-42").unwrap();

    let again = registry.insert(record("doc-42", &[1.0])).unwrap();
    assert_eq!(placed, again);
}

#[test]
fn test_tie_order_survives_rebalance_and_drain() {
    println!("\n=== TEST: Tie order after records move between shards ===");
    let registry = registry_with(StrategyKind::RoundRobin, &[("s1", 0), ("s2", 0)]);
    registry
        .set_shard_status(&"s2".into(), ShardStatus::Offline)
        .unwrap();
    for id in ["a", "b", "c", "d"] {
        registry.insert(record(id, &[1.0, 0.0])).unwrap();
    }
    registry
        .set_shard_status(&"s2".into(), ShardStatus::Active)
        .unwrap();

    let ranked = |registry: &vecshard::ShardRegistry| -> Vec<String> {
        registry
            .search(&[1.0, 0.0], 10, 0.0)
            .iter()
            .map(|hit| hit.id().to_string())
            .collect()
    };

    let report = registry.rebalance().unwrap();
    assert_eq!(report.moved, 2);
    assert_eq!(registry.locate("a"), Some(ShardId::from("s2")));
    assert_eq!(registry.locate("b"), Some(ShardId::from("s2")));
    assert_eq!(registry.locate("c"), Some(ShardId::from("s1")));
    assert_eq!(ranked(&registry), vec!["a", "b", "c", "d"]);

    registry.drain_shard(&"s1".into()).unwrap();
    assert_eq!(sizes(&registry), vec![0, 4]);
    assert_eq!(ranked(&registry), vec!["a", "b", "c", "d"]);
    println!("  Order after rebalance and drain: {:?}", ranked(&registry));
}
