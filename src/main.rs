//! CLI entry point for the vector sharding engine.
//!
//! Each invocation loads the registry from its snapshot file (or bootstraps it
//! from settings), runs one command, and saves the snapshot again if the
//! command changed anything.

use anyhow::{Context, Result, anyhow, bail};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::{Path, PathBuf};
use tracing::Level;

use vecshard::display::{create_hits_table, create_shard_table, create_stats_table};
use vecshard::{
    RegistrySnapshot, Settings, ShardDescriptor, ShardError, ShardId, ShardRegistry, ShardStatus,
    StrategyKind, VectorRecord,
};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Sharded vector store with scatter-gather similarity search
#[derive(Parser)]
#[command(
    name = "vecshard",
    version = env!("CARGO_PKG_VERSION"),
    about = "Sharded vector store with scatter-gather similarity search",
    long_about = "Place vectors across capacity-bounded shards, search them all at once, and move vectors between shards to rebalance or drain.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the registry snapshot (overrides settings)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .vecshard directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    /// Manage shards
    #[command(
        about = "Add, remove, list shards or change their status",
        after_help = "Examples:\n  vecshard shard add s1 --capacity 1000\n  vecshard shard status s1 offline\n  vecshard shard list"
    )]
    Shard {
        #[command(subcommand)]
        action: ShardCommand,
    },

    /// Switch the placement strategy for future inserts
    #[command(about = "Set placement strategy: round-robin, hash or range")]
    Strategy {
        /// Strategy name
        name: String,
    },

    /// Store a vector
    #[command(after_help = "Examples:\n  vecshard insert doc-1 0.1,0.9,0.3 --meta lang=\"rust\" --meta stars=42")]
    Insert {
        /// Vector id
        id: String,

        /// Comma-separated components
        #[arg(allow_hyphen_values = true)]
        vector: String,

        /// Metadata entry; values parse as JSON, falling back to a string
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },

    /// Fetch a vector by id
    Get {
        /// Vector id
        id: String,
    },

    /// Delete a vector by id
    Delete {
        /// Vector id
        id: String,
    },

    /// Nearest-neighbor search across active shards
    Search {
        /// Comma-separated query components
        #[arg(allow_hyphen_values = true)]
        vector: String,

        /// Maximum number of results (overrides config)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum cosine similarity (overrides config)
        #[arg(long, allow_hyphen_values = true)]
        min_score: Option<f32>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Even out vector counts across active shards
    Rebalance,

    /// Move every vector off a shard
    #[command(after_help = "The shard keeps its status. Remove it afterwards with 'vecshard shard remove <id>'.")]
    Drain {
        /// Shard to empty
        id: String,
    },

    /// Show per-shard load
    Stats,
}

#[derive(Subcommand)]
enum ShardCommand {
    /// Register a new empty shard
    Add {
        /// Unique shard id
        id: String,

        /// Display name (defaults to the id)
        #[arg(long)]
        name: Option<String>,

        /// Maximum vectors, 0 for unlimited
        #[arg(long, default_value_t = 0)]
        capacity: usize,
    },

    /// Remove an empty shard
    Remove {
        /// Shard id
        id: String,
    },

    /// Mark a shard active or offline
    Status {
        /// Shard id
        id: String,

        /// "active" or "offline"
        status: String,
    },

    /// List shards in registration order
    List,
}

fn main() {
    let cli = Cli::parse();

    // Load configuration
    let settings = if let Some(config_path) = &cli.config {
        Settings::load_from(config_path).unwrap_or_else(|e| {
            eprintln!(
                "Configuration error loading from {}: {}",
                config_path.display(),
                e
            );
            std::process::exit(1);
        })
    } else {
        Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        })
    };

    init_logging(&settings.logging.level, cli.verbose);

    if let Err(e) = run(cli, settings) {
        eprintln!("Error: {e}");
        if let Some(shard_error) = e.downcast_ref::<ShardError>() {
            for suggestion in shard_error.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
        }
        std::process::exit(1);
    }
}

fn init_logging(level: &str, verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        level.parse::<Level>().unwrap_or_else(|_| {
            eprintln!("Warning: unknown log level '{level}', using warn");
            Level::WARN
        })
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli, settings: Settings) -> Result<()> {
    let snapshot_path = cli
        .snapshot
        .clone()
        .unwrap_or_else(|| settings.snapshot_path.clone());

    match cli.command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(".", force).map_err(|e| anyhow!("{e}"))?;
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
        }

        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&settings)?);
        }

        Commands::Shard { action } => {
            let registry = load_registry(&settings, &snapshot_path)?;
            match action {
                ShardCommand::Add { id, name, capacity } => {
                    let name = name.unwrap_or_else(|| id.clone());
                    registry.add_shard(ShardDescriptor::new(id.as_str(), name, capacity))?;
                    save_registry(&registry, &snapshot_path)?;
                    println!("Added shard '{id}'");
                }
                ShardCommand::Remove { id } => {
                    let shard_id = ShardId::from(id);
                    if !registry.remove_shard(&shard_id) {
                        match registry.get_shard(&shard_id) {
                            None => return Err(ShardError::ShardNotFound { id: shard_id }.into()),
                            Some(shard) => bail!(
                                "Shard '{shard_id}' still holds {} vectors. Drain it first with 'vecshard drain {shard_id}'",
                                shard.current_size
                            ),
                        }
                    }
                    save_registry(&registry, &snapshot_path)?;
                    println!("Removed shard '{shard_id}'");
                }
                ShardCommand::Status { id, status } => {
                    let status: ShardStatus = status.parse()?;
                    let shard_id = ShardId::from(id);
                    registry.set_shard_status(&shard_id, status)?;
                    save_registry(&registry, &snapshot_path)?;
                    println!("Shard '{shard_id}' is {status}");
                }
                ShardCommand::List => {
                    let shards = registry.get_shards();
                    if shards.is_empty() {
                        println!("No shards registered. Add one with 'vecshard shard add <id>'");
                    } else {
                        println!("{}", create_shard_table(&shards));
                    }
                }
            }
        }

        Commands::Strategy { name } => {
            let kind: StrategyKind = name.parse()?;
            let registry = load_registry(&settings, &snapshot_path)?;
            registry.set_strategy(kind);
            save_registry(&registry, &snapshot_path)?;
            println!("Placement strategy set to {kind}");
        }

        Commands::Insert { id, vector, meta } => {
            let mut record = VectorRecord::new(id.as_str(), parse_vector(&vector)?);
            for entry in &meta {
                let (key, value) = parse_meta(entry)?;
                record.metadata.insert(key, value);
            }

            let registry = load_registry(&settings, &snapshot_path)?;
            match registry.insert(record)? {
                Some(shard) => {
                    save_registry(&registry, &snapshot_path)?;
                    println!("Stored '{id}' on shard '{shard}'");
                }
                None => bail!("No active shard has room for '{id}'. Add a shard or bring one online"),
            }
        }

        Commands::Get { id } => {
            let registry = load_registry(&settings, &snapshot_path)?;
            let record = registry
                .get(&id)
                .ok_or_else(|| anyhow!("Vector '{id}' not found"))?;
            if let Some(shard) = registry.locate(&id) {
                println!("Shard: {shard}");
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::Delete { id } => {
            let registry = load_registry(&settings, &snapshot_path)?;
            if !registry.remove(&id)? {
                bail!("Vector '{id}' not found");
            }
            save_registry(&registry, &snapshot_path)?;
            println!("Deleted '{id}'");
        }

        Commands::Search {
            vector,
            limit,
            min_score,
            json,
        } => {
            let query = parse_vector(&vector)?;
            let limit = limit.unwrap_or(settings.search.default_limit);
            let min_score = min_score.unwrap_or(settings.search.min_score);

            let registry = load_registry(&settings, &snapshot_path)?;
            let hits = registry.search(&query, limit, min_score);

            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No matches");
            } else {
                println!("{}", create_hits_table(&hits));
            }
        }

        Commands::Rebalance => {
            let registry = load_registry(&settings, &snapshot_path)?;
            let report = registry.rebalance()?;
            if report.moved > 0 {
                save_registry(&registry, &snapshot_path)?;
            }
            println!("Rebalance moved {} vectors", report.moved);
        }

        Commands::Drain { id } => {
            let registry = load_registry(&settings, &snapshot_path)?;
            let shard_id = ShardId::from(id);
            let report = registry.drain_shard(&shard_id)?;
            save_registry(&registry, &snapshot_path)?;
            println!("Drained {} vectors from shard '{shard_id}'", report.moved);
        }

        Commands::Stats => {
            let registry = load_registry(&settings, &snapshot_path)?;
            println!(
                "{}",
                create_stats_table(&registry.get_shard_stats(), registry.strategy())
            );
        }
    }

    Ok(())
}

/// Restores the registry from its snapshot, or bootstraps it from settings
/// when no snapshot exists yet.
fn load_registry(settings: &Settings, snapshot_path: &Path) -> Result<ShardRegistry> {
    if RegistrySnapshot::exists(snapshot_path) {
        let snapshot = RegistrySnapshot::load(snapshot_path)?;
        tracing::debug!(
            "Loading {} vectors across {} shards from {}",
            snapshot.vector_count(),
            snapshot.shards.len(),
            snapshot_path.display()
        );
        Ok(ShardRegistry::restore(snapshot)?)
    } else {
        tracing::debug!(
            "No snapshot at {}, bootstrapping from settings",
            snapshot_path.display()
        );
        Ok(ShardRegistry::from_settings(settings)?)
    }
}

fn save_registry(registry: &ShardRegistry, snapshot_path: &Path) -> Result<()> {
    registry
        .snapshot()
        .save(snapshot_path)
        .with_context(|| format!("Failed to persist registry to {}", snapshot_path.display()))
}

/// Parses "0.1,0.2,0.3" into components.
fn parse_vector(input: &str) -> Result<Vec<f32>> {
    let components = input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| -> Result<f32> {
            let value: f32 = part
                .parse()
                .with_context(|| format!("Invalid vector component '{part}'"))?;
            if !value.is_finite() {
                bail!("Vector component '{part}' is not finite");
            }
            Ok(value)
        })
        .collect::<Result<Vec<f32>>>()?;

    if components.is_empty() {
        bail!("Vector must have at least one component");
    }
    Ok(components)
}

/// Parses "key=value"; the value is JSON when it parses as such, else a string.
fn parse_meta(entry: &str) -> Result<(String, serde_json::Value)> {
    let (key, value) = entry
        .split_once('=')
        .ok_or_else(|| anyhow!("Metadata '{entry}' must look like key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("Metadata '{entry}' has an empty key");
    }

    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
