//! # Health Copilot CLI (`copilot`)
//!
//! Builds the local evidence index and answers questions against it.
//!
//! ## Usage
//!
//! ```bash
//! copilot --config ./config/copilot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `copilot build` | Load the corpus, build and activate a new index generation |
//! | `copilot search "<q>"` | Semantic search over the local index |
//! | `copilot answer "<q>"` | Cited answer grounded in the local index |
//! | `copilot route "<q>"` | Planned lookup across live literature sources |
//! | `copilot fallback "<q>"` | Lookup across every live source |
//! | `copilot inspect` | Show the active index's manifest and entries |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use health_copilot::{commands, config, logging};

/// Health Copilot CLI: evidence-grounded answers to health questions.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/copilot.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "copilot",
    about = "Health Copilot: evidence-grounded answers to health and biomedical questions",
    version,
    long_about = "Health Copilot indexes biomedical corpus files into a local vector index, \
    retrieves the closest evidence for a question, fans out to live literature sources, and \
    synthesizes answers that cite their evidence."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/copilot.toml`.
    #[arg(long, global = true, default_value = "./config/copilot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vector index from corpus files.
    ///
    /// Reads every `.json`, `.jsonl` and `.csv` file in the corpus
    /// directory, chunks and embeds the documents, and atomically
    /// activates the new index. A failed build leaves the previous index
    /// in place.
    Build {
        /// Corpus directory (overrides `[corpus].dir`).
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Print the build report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Semantic search over the local index.
    Search {
        /// The search query string.
        query: String,

        /// Number of hits (defaults to `[retrieval].default_k`).
        #[arg(long)]
        k: Option<usize>,

        /// Keep only hits whose title or text contains the query.
        #[arg(long)]
        filter: bool,

        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the local index, with citations.
    Answer {
        /// The question.
        query: String,

        /// Number of evidence chunks (defaults to `[retrieval].default_k`).
        #[arg(long)]
        k: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Classify a query and search the live sources its route names.
    Route {
        query: String,

        #[arg(long)]
        json: bool,
    },

    /// Search every live source.
    Fallback {
        query: String,

        #[arg(long)]
        json: bool,
    },

    /// Show the active index's manifest and first entries.
    Inspect {
        /// Number of entries to print.
        #[arg(long, default_value_t = 5)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build { corpus, json } => {
            commands::run_build(&cfg, corpus.as_deref(), json).await?;
        }
        Commands::Search {
            query,
            k,
            filter,
            json,
        } => {
            commands::run_search(cfg, &query, k, filter, json).await?;
        }
        Commands::Answer { query, k, json } => {
            commands::run_answer(cfg, &query, k, json).await?;
        }
        Commands::Route { query, json } => {
            commands::run_route(&cfg, &query, json).await?;
        }
        Commands::Fallback { query, json } => {
            commands::run_fallback(&cfg, &query, json).await?;
        }
        Commands::Inspect { limit, json } => {
            commands::run_inspect(&cfg, limit, json)?;
        }
    }

    Ok(())
}
