//! Snapshot format for saving and restoring a registry.
//!
//! The engine itself is in-memory. A snapshot captures every shard
//! descriptor and record, plus the insertion sequence each record carries, so
//! a restored registry ranks ties exactly as the original did. Snapshots are
//! written as pretty-printed JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ShardError, ShardResult};
use crate::shard::{ShardDescriptor, StrategyKind};
use crate::vector::VectorRecord;

/// A record as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Registry-wide insertion sequence
    pub sequence: u64,
    pub record: VectorRecord,
}

/// One shard and its records, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardSnapshot {
    pub descriptor: ShardDescriptor,
    #[serde(default)]
    pub records: Vec<SnapshotRecord>,
}

/// Serializable copy of a whole registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Version of the snapshot format
    pub version: u32,

    /// Placement strategy in effect when the snapshot was taken
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Sequence the next fresh insert will receive
    #[serde(default)]
    pub next_sequence: u64,

    /// Shards in registration order
    #[serde(default)]
    pub shards: Vec<ShardSnapshot>,
}

impl RegistrySnapshot {
    /// Current snapshot format version
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(strategy: StrategyKind, next_sequence: u64, shards: Vec<ShardSnapshot>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            strategy,
            next_sequence,
            shards,
        }
    }

    /// Total number of records across shards.
    pub fn vector_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.records.len()).sum()
    }

    /// Save the snapshot to a JSON file, creating parent directories.
    pub fn save(&self, path: &Path) -> ShardResult<()> {
        let io_error = |source| ShardError::SnapshotIo {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|source| {
            ShardError::SnapshotFormat {
                path: path.to_path_buf(),
                source,
            }
        })?;

        std::fs::write(path, json).map_err(io_error)
    }

    /// Load a snapshot from a JSON file
    pub fn load(path: &Path) -> ShardResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ShardError::SnapshotIo {
            path: path.to_path_buf(),
            source,
        })?;

        let snapshot: Self =
            serde_json::from_str(&json).map_err(|source| ShardError::SnapshotFormat {
                path: path.to_path_buf(),
                source,
            })?;

        // Check version compatibility
        if snapshot.version > Self::CURRENT_VERSION {
            return Err(ShardError::UnsupportedSnapshotVersion {
                found: snapshot.version,
                supported: Self::CURRENT_VERSION,
            });
        }

        Ok(snapshot)
    }

    /// Check if a snapshot file exists
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }
}
