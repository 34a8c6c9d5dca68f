//! Vector sharding: placement, per-shard storage, scatter-gather search,
//! rebalance and drain.
//!
//! # Architecture
//!
//! ```text
//!                      ┌──────────────────┐
//!   insert ──────────▶ │  ShardRegistry   │ ◀────── rebalance / drain
//!                      │ (owns all shards)│
//!                      └───┬──────────┬───┘
//!                          │          │
//!              ┌───────────▼──┐   ┌───▼─────────────────┐
//!              │  Placement   │   │ search: scatter to  │
//!              │  Strategy    │   │ active shards, merge│
//!              └──────────────┘   └───┬─────────────────┘
//!                                     │
//!                 ┌───────────────────┼───────────────────┐
//!                 ▼                   ▼                   ▼
//!          ┌────────────┐      ┌────────────┐      ┌────────────┐
//!          │ ShardStore │      │ ShardStore │      │ ShardStore │
//!          └────────────┘      └────────────┘      └────────────┘
//! ```
//!
//! Everything outside the registry refers to shards by [`ShardId`]; only the
//! registry touches a shard's store.

mod placement;
mod registry;
mod snapshot;
mod store;
mod types;

pub use placement::{
    PlacementCandidate, PlacementStrategy, StrategyKind, range_slot, stable_hash,
};
pub use registry::ShardRegistry;
pub use snapshot::{RegistrySnapshot, ShardSnapshot, SnapshotRecord};
pub use store::ShardStore;
pub use types::{MigrationReport, ShardDescriptor, ShardId, ShardStats, ShardStatus};
