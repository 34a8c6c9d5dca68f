//! Shard identity, status and descriptor types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ShardError;

/// Type-safe wrapper for shard identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(String);

impl ShardId {
    /// Creates a new `ShardId`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ShardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ShardId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Availability of a shard.
///
/// Offline shards keep their vectors but are skipped by placement, search
/// and rebalance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardStatus {
    #[default]
    Active,
    Offline,
}

impl ShardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShardStatus {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "offline" => Ok(Self::Offline),
            _ => Err(ShardError::InvalidStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// Public description of a shard.
///
/// `capacity` of 0 means unlimited. `current_size` always equals the number
/// of records held by the shard's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDescriptor {
    /// Unique shard identifier
    pub id: ShardId,

    /// Display label
    pub name: String,

    /// Maximum vector count, 0 for unlimited
    #[serde(default)]
    pub capacity: usize,

    /// Number of vectors currently held
    #[serde(default)]
    pub current_size: usize,

    /// Availability
    #[serde(default)]
    pub status: ShardStatus,
}

impl ShardDescriptor {
    /// Describe a new, empty, active shard.
    pub fn new(id: impl Into<ShardId>, name: impl Into<String>, capacity: usize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capacity,
            current_size: 0,
            status: ShardStatus::Active,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ShardStatus::Active
    }

    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        self.capacity == 0
    }

    /// Free slots left, `None` when capacity is unlimited.
    #[must_use]
    pub fn free_slots(&self) -> Option<usize> {
        if self.is_unlimited() {
            None
        } else {
            Some(self.capacity.saturating_sub(self.current_size))
        }
    }

    /// Whether one more vector fits.
    #[must_use]
    pub fn has_room(&self) -> bool {
        self.free_slots().is_none_or(|free| free > 0)
    }

    /// Fraction of capacity in use; always 0.0 for unlimited shards.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.is_unlimited() {
            0.0
        } else {
            self.current_size as f64 / self.capacity as f64
        }
    }
}

/// Point-in-time load report for one shard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShardStats {
    pub shard_id: ShardId,
    pub vector_count: usize,
    /// 0 for unlimited
    pub capacity: usize,
    pub utilization: f64,
}

impl From<&ShardDescriptor> for ShardStats {
    fn from(descriptor: &ShardDescriptor) -> Self {
        Self {
            shard_id: descriptor.id.clone(),
            vector_count: descriptor.current_size,
            capacity: descriptor.capacity,
            utilization: descriptor.utilization(),
        }
    }
}

/// Outcome of a rebalance or drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Number of vectors transferred between shards
    pub moved: usize,
}
