//! Core record types for vector storage and search.
//!
//! A [`VectorRecord`] is the unit the engine stores, moves between shards and
//! returns from searches. Its metadata is carried verbatim and never inspected.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::shard::ShardId;

/// Opaque key/value metadata attached to a record by the catalog service.
pub type Metadata = HashMap<String, serde_json::Value>;

/// An embedding vector plus its caller-supplied identity and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Identifier, unique across every shard of a registry
    pub id: String,

    /// Embedding values. Dimensionality is assumed consistent, not enforced.
    pub vector: Vec<f32>,

    /// Caller metadata, carried but not interpreted
    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorRecord {
    /// Create a record without metadata.
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A single ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// The matching record
    pub record: VectorRecord,

    /// Cosine similarity to the query, in [-1.0, 1.0]
    pub score: f32,

    /// Shard that held the record when it was scored
    pub shard_id: ShardId,

    /// Registry-wide insertion sequence, used to break score ties
    #[serde(skip)]
    pub(crate) sequence: u64,
}

impl SearchHit {
    /// Identifier of the matching record.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.record.id
    }
}
