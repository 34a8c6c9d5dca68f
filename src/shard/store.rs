//! Per-shard vector store.
//!
//! Each shard keeps its records in a hash map keyed by id, plus an index by
//! insertion sequence so the oldest record can be found in O(log n) when
//! rebalancing picks what to move. The store enforces its own capacity as a
//! second line of defense behind the registry's placement checks.

use std::collections::{BTreeMap, HashMap};

use crate::error::{ShardError, ShardResult};
use crate::shard::ShardId;
use crate::vector::{SearchHit, VectorRecord, cosine_similarity};

/// A record together with its registry-wide insertion sequence.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredRecord {
    pub(crate) record: VectorRecord,
    pub(crate) sequence: u64,
}

/// Vectors and metadata held by a single shard.
#[derive(Debug, Clone)]
pub struct ShardStore {
    shard_id: ShardId,

    /// Maximum record count, 0 for unlimited
    capacity: usize,

    records: HashMap<String, StoredRecord>,

    /// Insertion sequence -> record id
    order: BTreeMap<u64, String>,
}

impl ShardStore {
    /// Creates an empty store. A `capacity` of 0 means unlimited.
    pub fn new(shard_id: ShardId, capacity: usize) -> Self {
        Self {
            shard_id,
            capacity,
            records: HashMap::new(),
            order: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.capacity != 0 && self.records.len() >= self.capacity
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Adds a record under the insertion sequence the owning registry assigned.
    ///
    /// Fails with [`ShardError::ShardFull`] if the store is at capacity. An
    /// existing record with the same id is replaced in place and keeps its
    /// original sequence; that never needs a free slot.
    pub(crate) fn insert_stored(&mut self, stored: StoredRecord) -> ShardResult<()> {
        if let Some(existing) = self.records.get_mut(&stored.record.id) {
            existing.record = stored.record;
            return Ok(());
        }

        if self.is_full() {
            return Err(ShardError::ShardFull {
                id: self.shard_id.clone(),
                capacity: self.capacity,
            });
        }

        self.order.insert(stored.sequence, stored.record.id.clone());
        self.records.insert(stored.record.id.clone(), stored);
        Ok(())
    }

    /// Looks up a record by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&VectorRecord> {
        self.records.get(id).map(|stored| &stored.record)
    }

    pub(crate) fn get_stored(&self, id: &str) -> Option<&StoredRecord> {
        self.records.get(id)
    }

    /// Removes a record. Returns `false` if the id is not held here.
    pub fn remove(&mut self, id: &str) -> bool {
        self.take(id).is_some()
    }

    pub(crate) fn take(&mut self, id: &str) -> Option<StoredRecord> {
        let stored = self.records.remove(id)?;
        self.order.remove(&stored.sequence);
        Some(stored)
    }

    /// Id of the earliest-inserted record still held.
    #[must_use]
    pub fn oldest_id(&self) -> Option<&str> {
        self.order.values().next().map(String::as_str)
    }

    /// Record ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.values().map(String::as_str)
    }

    /// Records in insertion order.
    pub(crate) fn stored_records(&self) -> impl Iterator<Item = &StoredRecord> {
        self.order.values().filter_map(|id| self.records.get(id))
    }

    /// Scores every local record against `query`, dropping scores below
    /// `min_score`. Results are unordered.
    pub fn score_all(&self, query: &[f32], min_score: f32) -> Vec<SearchHit> {
        self.records
            .values()
            .filter_map(|stored| {
                let score = cosine_similarity(query, &stored.record.vector);
                (score >= min_score).then(|| SearchHit {
                    record: stored.record.clone(),
                    score,
                    shard_id: self.shard_id.clone(),
                    sequence: stored.sequence,
                })
            })
            .collect()
    }

    /// Checks that the sequence index and the record map agree.
    pub(crate) fn check_consistency(&self) -> ShardResult<()> {
        if self.order.len() != self.records.len() {
            return Err(ShardError::InvariantViolation {
                reason: format!(
                    "shard '{}' order index holds {} entries for {} records",
                    self.shard_id,
                    self.order.len(),
                    self.records.len()
                ),
            });
        }
        Ok(())
    }
}
