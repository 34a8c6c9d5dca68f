//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::HashSet;

use vecshard::{ShardDescriptor, ShardId, ShardRegistry, ShardStatus, StrategyKind, VectorRecord};

/// Registry with `(id, capacity)` shards registered in order.
pub fn registry_with(strategy: StrategyKind, shards: &[(&str, usize)]) -> ShardRegistry {
    let registry = ShardRegistry::new(strategy);
    for (id, capacity) in shards {
        registry
            .add_shard(ShardDescriptor::new(*id, format!("shard {id}"), *capacity))
            .expect("Failed to register shard");
    }
    registry
}

pub fn record(id: &str, vector: &[f32]) -> VectorRecord {
    VectorRecord::new(id, vector.to_vec())
}

/// Current sizes in registration order.
pub fn sizes(registry: &ShardRegistry) -> Vec<usize> {
    registry
        .get_shards()
        .iter()
        .map(|shard| shard.current_size)
        .collect()
}

/// Ids stored anywhere in the registry, read from a snapshot.
pub fn all_ids(registry: &ShardRegistry) -> HashSet<String> {
    registry
        .snapshot()
        .shards
        .into_iter()
        .flat_map(|shard| shard.records)
        .map(|entry| entry.record.id)
        .collect()
}

/// Inserts `count` records while only the first shard is active, leaving the
/// registry skewed onto it.
pub fn fill_skewed(registry: &ShardRegistry, count: usize) {
    let others: Vec<ShardId> = registry
        .get_shards()
        .into_iter()
        .skip(1)
        .filter(|shard| shard.status == ShardStatus::Active)
        .map(|shard| shard.id)
        .collect();

    for id in &others {
        registry.set_shard_status(id, ShardStatus::Offline).unwrap();
    }
    for i in 0..count {
        registry
            .insert(record(&format!("skew-{i}"), &[i as f32, 1.0]))
            .unwrap()
            .expect("first shard should have room");
    }
    for id in &others {
        registry.set_shard_status(id, ShardStatus::Active).unwrap();
    }
}
