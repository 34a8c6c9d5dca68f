//! Error types for the sharding engine
//!
//! Expected outcomes (all shards full, unknown ids, refused removal of a
//! non-empty shard) are plain return values on the registry API. The types
//! here cover rejected commands, which always leave the registry unchanged,
//! and invariant violations, which indicate a bug.

use std::path::PathBuf;
use thiserror::Error;

use crate::shard::ShardId;

/// Main error type for shard operations
#[derive(Error, Debug)]
pub enum ShardError {
    /// Topology errors
    #[error("Shard '{id}' is already registered")]
    DuplicateShardId { id: ShardId },

    #[error("Shard '{id}' not found. Register it with add_shard first.")]
    ShardNotFound { id: ShardId },

    /// Capacity errors
    #[error("Shard '{id}' is full (capacity {capacity})")]
    ShardFull { id: ShardId, capacity: usize },

    #[error(
        "Cannot drain shard '{shard}': {required} vectors need a new home but active shards only have {available} free slots"
    )]
    NoCapacity {
        shard: ShardId,
        required: usize,
        available: usize,
    },

    /// Internal consistency errors
    #[error("Shard invariant violated: {reason}")]
    InvariantViolation { reason: String },

    /// Parsing errors for operator input
    #[error("Unknown placement strategy '{name}'. Expected one of: round-robin, hash, range")]
    InvalidStrategy { name: String },

    #[error("Invalid shard status '{value}'. Expected 'active' or 'offline'")]
    InvalidStatus { value: String },

    /// Snapshot errors
    #[error("Failed to access snapshot '{path}': {source}")]
    SnapshotIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Snapshot '{path}' is malformed: {source}")]
    SnapshotFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Snapshot version {found} is newer than supported version {supported}")]
    UnsupportedSnapshotVersion { found: u32, supported: u32 },
}

impl ShardError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::DuplicateShardId { .. } => "DUPLICATE_SHARD_ID",
            Self::ShardNotFound { .. } => "SHARD_NOT_FOUND",
            Self::ShardFull { .. } => "SHARD_FULL",
            Self::NoCapacity { .. } => "NO_CAPACITY",
            Self::InvariantViolation { .. } => "INVARIANT_VIOLATION",
            Self::InvalidStrategy { .. } => "INVALID_STRATEGY",
            Self::InvalidStatus { .. } => "INVALID_STATUS",
            Self::SnapshotIo { .. } => "SNAPSHOT_IO_ERROR",
            Self::SnapshotFormat { .. } => "SNAPSHOT_FORMAT_ERROR",
            Self::UnsupportedSnapshotVersion { .. } => "UNSUPPORTED_SNAPSHOT_VERSION",
        }
        .to_string()
    }

    /// Whether this error signals a bug rather than a refused request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::DuplicateShardId { .. } => vec![
                "Choose a different shard id",
                "Remove the existing shard first if it is empty",
            ],
            Self::ShardNotFound { .. } => {
                vec!["List registered shards with 'vecshard shard list'"]
            }
            Self::ShardFull { .. } | Self::NoCapacity { .. } => vec![
                "Add a shard or raise capacity on an existing one",
                "Bring offline shards back with 'vecshard shard status <id> active'",
            ],
            Self::InvariantViolation { .. } => vec![
                "This is a bug: the registry state no longer matches its stores",
                "Restore from the last good snapshot",
            ],
            Self::InvalidStrategy { .. } | Self::InvalidStatus { .. } => {
                vec!["Check the spelling of the value"]
            }
            Self::SnapshotIo { .. } => vec![
                "Check that the snapshot path exists and you have read/write permissions",
            ],
            Self::SnapshotFormat { .. } | Self::UnsupportedSnapshotVersion { .. } => vec![
                "The snapshot file may be corrupted or written by a newer version",
                "Move it aside to start from an empty registry",
            ],
        }
    }
}

/// Result type alias for shard operations
pub type ShardResult<T> = Result<T, ShardError>;
