//! Placement strategies for fresh inserts.
//!
//! A strategy maps a vector id onto one of the registered shards. It only
//! runs for new inserts; rebalance and drain assign destinations directly.
//! Every strategy skips offline shards and shards without room, and returns
//! `None` when nothing can accept the vector.
//!
//! # Strategies
//! - `round-robin`: cycles through shards in registration order. The cursor
//!   lives in the strategy and survives across calls.
//! - `hash`: SHA-256 of the id modulo the number of active shards. Stable only
//!   while the active set is unchanged.
//! - `range`: splits the lexicographic id keyspace into contiguous slices, one
//!   per active shard, in registration order.
//!
//! `hash` and `range` probe forward (wrapping) from their preferred shard when
//! it is full.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::ShardError;

/// Name of a placement policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    RoundRobin,
    Hash,
    Range,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round-robin",
            Self::Hash => "hash",
            Self::Range => "range",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            "hash" => Ok(Self::Hash),
            "range" => Ok(Self::Range),
            _ => Err(ShardError::InvalidStrategy {
                name: s.to_string(),
            }),
        }
    }
}

/// What placement needs to know about one shard, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementCandidate {
    pub active: bool,
    pub has_room: bool,
}

impl PlacementCandidate {
    #[must_use]
    pub fn accepts(&self) -> bool {
        self.active && self.has_room
    }
}

/// A placement policy with its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementStrategy {
    RoundRobin { cursor: usize },
    Hash,
    Range,
}

impl Default for PlacementStrategy {
    fn default() -> Self {
        Self::new(StrategyKind::default())
    }
}

impl PlacementStrategy {
    /// Fresh strategy state; the round-robin cursor starts at the first shard.
    pub fn new(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::RoundRobin => Self::RoundRobin { cursor: 0 },
            StrategyKind::Hash => Self::Hash,
            StrategyKind::Range => Self::Range,
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::RoundRobin { .. } => StrategyKind::RoundRobin,
            Self::Hash => StrategyKind::Hash,
            Self::Range => StrategyKind::Range,
        }
    }

    /// Picks the index into `candidates` that should receive `vector_id`.
    pub fn select(&mut self, vector_id: &str, candidates: &[PlacementCandidate]) -> Option<usize> {
        match self {
            Self::RoundRobin { cursor } => {
                let len = candidates.len();
                let chosen = (0..len)
                    .map(|step| (*cursor + step) % len)
                    .find(|&idx| candidates[idx].accepts())?;
                *cursor = (chosen + 1) % len;
                Some(chosen)
            }
            Self::Hash => {
                let active = active_positions(candidates);
                if active.is_empty() {
                    return None;
                }
                let start = (stable_hash(vector_id) % active.len() as u64) as usize;
                probe(candidates, &active, start)
            }
            Self::Range => {
                let active = active_positions(candidates);
                if active.is_empty() {
                    return None;
                }
                probe(candidates, &active, range_slot(vector_id, active.len()))
            }
        }
    }
}

fn active_positions(candidates: &[PlacementCandidate]) -> Vec<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.active)
        .map(|(idx, _)| idx)
        .collect()
}

/// First active position with room, starting at `start` and wrapping.
fn probe(candidates: &[PlacementCandidate], active: &[usize], start: usize) -> Option<usize> {
    (0..active.len())
        .map(|step| active[(start + step) % active.len()])
        .find(|&idx| candidates[idx].has_room)
}

/// Stable 64-bit hash of an id: the leading 8 bytes of its SHA-256 digest.
pub fn stable_hash(id: &str) -> u64 {
    let digest = Sha256::digest(id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Maps an id onto one of `slots` contiguous slices of the keyspace.
///
/// The leading 8 bytes of the id, zero-padded, form a big-endian key, so the
/// mapping is monotonic in lexicographic byte order.
pub fn range_slot(id: &str, slots: usize) -> usize {
    let mut bytes = [0u8; 8];
    for (dst, src) in bytes.iter_mut().zip(id.as_bytes()) {
        *dst = *src;
    }
    let key = u64::from_be_bytes(bytes) as u128;
    ((key * slots as u128) >> 64) as usize
}
