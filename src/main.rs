//! # jobpost CLI
//!
//! ## Usage
//!
//! ```bash
//! jobpost --config ./config/jobpost.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `jobpost init` | Create the SQLite database and run schema migrations |
//! | `jobpost ingest [--replace]` | Chunk, embed and store the configured source document |
//! | `jobpost create "<query>"` | Generate and record a job posting |
//! | `jobpost list` | List recorded job postings, newest first |
//! | `jobpost delete <id>` | Delete one job posting |
//! | `jobpost delete-all` | Delete every job posting |
//! | `jobpost clear-chunks` | Delete every stored chunk |
//! | `jobpost serve` | Start the HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use jobpost_rag::service::JobPostingService;
use jobpost_rag::{config, db, logging, migrate, server};

/// Retrieval-augmented job posting generator.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/jobpost.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "jobpost", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/jobpost.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Chunk, embed and store the configured source document.
    Ingest {
        /// Delete this source's stored chunks first.
        #[arg(long)]
        replace: bool,
    },

    /// Generate a job posting grounded in the stored chunks.
    Create {
        /// What to hire for, e.g. "Senior backend engineer in Berlin".
        query: String,
    },

    /// List recorded job postings, newest first.
    List,

    /// Delete one job posting by id.
    Delete { id: String },

    /// Delete every job posting.
    DeleteAll,

    /// Delete every stored chunk.
    ClearChunks,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Ingest { replace } => {
            if replace {
                cfg.source.replace_existing = true;
            }
            let service = JobPostingService::from_config(&cfg).await?;
            let report = service.create_vector_embeddings().await?;
            println!("{}", report.message);
        }
        Commands::Create { query } => {
            let service = JobPostingService::from_config(&cfg).await?;
            let record = service.create_job_posting(Some(&query)).await?;
            println!("id: {}", record.id);
            println!("created_at: {}", record.created_at);
            println!();
            println!("{}", record.generated_text);
        }
        Commands::List => {
            let service = JobPostingService::from_config(&cfg).await?;
            let postings = service.list_job_postings().await?;
            if postings.is_empty() {
                println!("No job postings recorded.");
            }
            for p in postings {
                println!("{}  {}  {}", p.id, p.created_at, p.user_query);
            }
        }
        Commands::Delete { id } => {
            let service = JobPostingService::from_config(&cfg).await?;
            println!("{}", service.delete_job_posting(&id).await?.message);
        }
        Commands::DeleteAll => {
            let service = JobPostingService::from_config(&cfg).await?;
            println!("{}", service.delete_job_postings().await?.message);
        }
        Commands::ClearChunks => {
            let service = JobPostingService::from_config(&cfg).await?;
            println!("{}", service.delete_vector_embeddings().await?.message);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
