//! Terminal display utilities for CLI output.
//!
//! Provides styled tables for shard listings, stats and search results.

pub mod tables;

pub use tables::{TableBuilder, create_hits_table, create_shard_table, create_stats_table};
