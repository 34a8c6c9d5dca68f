//! Table formatting utilities for structured output.

use comfy_table::{
    Attribute, Cell, Color, Row, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

use crate::shard::{ShardDescriptor, ShardStats, ShardStatus, StrategyKind};
use crate::vector::SearchHit;

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Create a new table builder.
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        // Apply rounded corners
        table.apply_modifier(UTF8_ROUND_CORNERS);
        Self { table }
    }

    /// Set the table headers.
    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        self.table.set_header(
            headers
                .into_iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
        self
    }

    /// Add a row of plain strings or styled cells.
    pub fn add_row(mut self, row: impl Into<Row>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Build and return the formatted table.
    pub fn build(self) -> String {
        self.table.to_string()
    }
}

fn capacity_label(capacity: usize) -> String {
    if capacity == 0 {
        "unlimited".to_string()
    } else {
        capacity.to_string()
    }
}

/// Create a table listing registered shards in registration order.
pub fn create_shard_table(shards: &[ShardDescriptor]) -> String {
    let mut table =
        TableBuilder::new().set_headers(vec!["Shard", "Name", "Status", "Vectors", "Capacity"]);

    for shard in shards {
        let status_color = match shard.status {
            ShardStatus::Active => Color::Green,
            ShardStatus::Offline => Color::Yellow,
        };
        table = table.add_row(vec![
            Cell::new(shard.id.as_str()),
            Cell::new(&shard.name),
            Cell::new(shard.status.as_str()).fg(status_color),
            Cell::new(shard.current_size),
            Cell::new(capacity_label(shard.capacity)),
        ]);
    }

    table.build()
}

/// Create a load report table with a total row.
pub fn create_stats_table(stats: &[ShardStats], strategy: StrategyKind) -> String {
    let mut table =
        TableBuilder::new().set_headers(vec!["Shard", "Vectors", "Capacity", "Utilization"]);

    let mut total_vectors = 0;
    for entry in stats {
        total_vectors += entry.vector_count;

        // Add rows without ANSI colors (comfy-table doesn't handle them well)
        let utilization = if entry.capacity == 0 {
            "-".to_string()
        } else {
            format!("{:.1}%", entry.utilization * 100.0)
        };
        table = table.add_row(vec![
            entry.shard_id.to_string(),
            entry.vector_count.to_string(),
            capacity_label(entry.capacity),
            utilization,
        ]);
    }

    // Total row
    table
        .add_row(vec![
            Cell::new("TOTAL").add_attribute(Attribute::Bold),
            Cell::new(total_vectors).add_attribute(Attribute::Bold),
            Cell::new(format!("strategy: {strategy}")),
            Cell::new(""),
        ])
        .build()
}

/// Create a table of ranked search hits.
pub fn create_hits_table(hits: &[SearchHit]) -> String {
    let mut table = TableBuilder::new().set_headers(vec!["#", "Id", "Score", "Shard", "Metadata"]);

    for (rank, hit) in hits.iter().enumerate() {
        let metadata = if hit.record.metadata.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&hit.record.metadata).unwrap_or_default()
        };
        table = table.add_row(vec![
            (rank + 1).to_string(),
            hit.id().to_string(),
            format!("{:.4}", hit.score),
            hit.shard_id.to_string(),
            metadata,
        ]);
    }

    table.build()
}
