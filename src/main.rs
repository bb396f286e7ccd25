//! Symload CLI - Upload per-paper symbol detection output into the database

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use symload::config::{self, UploadConfig};
use symload::pipeline;
use symload::storage::SqliteStore;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "symload")]
#[command(version = "0.1.0")]
#[command(about = "Persists per-paper symbol detection output into a relational symbol graph")]
#[command(long_about = r#"
Symload takes the output of a symbol detection pipeline (one directory per
paper with symbols.csv, symbol_locations.csv, matches.csv and metadata.json)
and uploads it into a SQLite symbol graph:
  • MathML deduplicated into canonical content rows
  • Parent/child hierarchy and ranked cross-paper matches preserved
  • Writes chunked to configurable per-entity batch sizes

Example usage:
  symload init --database symload.db
  symload upload --data-dir ./papers --database symload.db
  symload stats --database symload.db
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and a starter config (idempotent)
    Init {
        /// Path to the database file
        #[arg(short, long, default_value = "symload.db")]
        database: PathBuf,

        /// Overwrite an existing symload.toml
        #[arg(short, long)]
        force: bool,
    },

    /// Upload every document directory under the data dir
    Upload {
        /// Directory containing one sub-directory per document
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Path to a symload.toml config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Worker threads (0 = one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Show statistics about the uploaded symbol graph
    Stats {
        /// Path to the database file
        #[arg(short, long, default_value = "symload.db")]
        database: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { database, force } => {
            config::ensure_db_dir(&database)?;
            let store = SqliteStore::open(&database)?;
            store.initialize_schema()?;
            println!("✅ Schema ready in {:?}", database);

            let config_path = config::default_config_path();
            if !config_path.exists() || force {
                let starter = UploadConfig {
                    database: Some(database.display().to_string()),
                    ..Default::default()
                };
                config::write_config(&config_path, &starter, force)?;
                println!("📝 Wrote starter config to {:?}", config_path);
            }
        }

        Commands::Upload { data_dir, database, config: config_path, jobs } => {
            let file_config = config::load_config(config_path.as_deref())?.unwrap_or_default();

            let data_dir = data_dir
                .or_else(|| file_config.data_dir.as_ref().map(PathBuf::from))
                .ok_or_else(|| anyhow::anyhow!("no data dir given (flag or config)"))?;
            let database = database
                .or_else(|| file_config.database.as_ref().map(PathBuf::from))
                .unwrap_or_else(|| config::default_database_path_in(Path::new(".")));
            let jobs = jobs.or(file_config.jobs).unwrap_or(0);

            println!("🚀 Uploading symbol data");
            println!("📂 Data dir: {:?}", data_dir);
            println!("🗄️  Database: {:?}", database);

            // Schema setup happens once here, not inside the workers
            config::ensure_db_dir(&database)?;
            SqliteStore::open(&database)?.initialize_schema()?;

            let summary = pipeline::run(&data_dir, &database, jobs, &file_config.batch)?;
            println!("\n📊 Run complete: {}", summary);

            let stats = SqliteStore::open(&database)?.stats()?;
            println!("{}", stats);

            if summary.all_failed() {
                anyhow::bail!("all {} documents failed", summary.failed);
            }
        }

        Commands::Stats { database, format } => {
            let store = SqliteStore::open(&database)?;
            let stats = store.stats()?;

            if format == "json" {
                let data = serde_json::json!({
                    "documents": stats.documents,
                    "canonical_content": stats.canonical_content,
                    "symbols": stats.symbols,
                    "geometries": stats.geometries,
                    "matches": stats.matches,
                    "child_links": stats.child_links,
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("📊 Symload Statistics ({:?})", database);
                println!("------------------------------------");
                println!("{}", stats);
            }
        }
    }

    Ok(())
}
