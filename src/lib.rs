//! The main library module for vecshard

pub mod config;
pub mod display;
pub mod error;
pub mod shard;
pub mod vector;

// Explicit exports for better API clarity
pub use config::{Settings, ShardConfig};
pub use error::{ShardError, ShardResult};
pub use shard::{
    MigrationReport, RegistrySnapshot, ShardDescriptor, ShardId, ShardRegistry, ShardStats,
    ShardStatus, StrategyKind,
};
pub use vector::{Metadata, SearchHit, VectorRecord, cosine_similarity};
