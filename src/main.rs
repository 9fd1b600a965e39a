//! # Docshelf CLI (`shelf`)
//!
//! Store short text and PDF documents, find them by meaning, and group
//! them into topics. Every document command acts on the active database.
//!
//! ## Usage
//!
//! ```bash
//! shelf --config ./config/shelf.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shelf init` | Create the storage root and the default database |
//! | `shelf add` | Add a document from flags or `--file` |
//! | `shelf search "<query>"` | Semantic search |
//! | `shelf cluster` | Group documents into topics |
//! | `shelf reconcile` | Repair drift between documents and vectors |
//! | `shelf db ...` | Create, list, switch, update, and delete databases |
//!
//! ## Examples
//!
//! ```bash
//! shelf init
//! shelf add --title "Sourdough" --content "Feed the starter twice a day" --tags baking
//! shelf add --file ./papers/attention.pdf
//! shelf search "bread fermentation"
//! shelf cluster --min-k 2 --max-k 6
//! shelf db create "Research" --switch
//! shelf move 3 --to db_3f2a91c0
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

use docshelf::config::{self, Config};
use docshelf::edit::DocumentFields;
use docshelf::registry::Registry;
use docshelf::{
    cluster_cmd, databases, edit, embed_cmd, embedding, export, get, logging, search, stats,
};

const DEFAULT_CONFIG: &str = "./config/shelf.toml";

/// Docshelf: a semantic document shelf.
///
/// Reads settings from a TOML file. When `--config` is not given and
/// `./config/shelf.toml` does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "shelf",
    about = "Docshelf — store documents, search them by meaning, and group them by topic",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Default)]
struct FieldArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    content: Option<String>,
    /// Free-form type label, e.g. `note` or `article`.
    #[arg(long = "type")]
    doc_type: Option<String>,
    /// Comma-separated tags.
    #[arg(long)]
    tags: Option<String>,
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    authors: Option<String>,
}

impl From<FieldArgs> for DocumentFields {
    fn from(args: FieldArgs) -> Self {
        DocumentFields {
            title: args.title,
            content: args.content,
            doc_type: args.doc_type,
            tags: args.tags,
            source: args.source,
            authors: args.authors,
        }
    }
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the storage root, registry, and default database.
    ///
    /// Idempotent. Also loads the embedding model so the first real
    /// command does not pay for it.
    Init,

    /// Add a document.
    Add {
        /// Import a `.pdf` or UTF-8 text file. The title defaults to the file name.
        #[arg(long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Change fields of a document. Title or content changes re-embed it.
    Update {
        /// Document id or 1-based position.
        target: String,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Change a document's title.
    Rename { target: String, title: String },

    /// Delete a document.
    Delete { target: String },

    /// Show one document.
    Get {
        /// Document id or 1-based position in creation order.
        target: String,
        #[arg(long)]
        json: bool,
    },

    /// List documents, newest first.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Semantic search over the active database.
    Search {
        query: String,
        /// Maximum results. Defaults to `[search] default_limit`.
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },

    /// Delete every document in the active database.
    Clear {
        #[arg(long)]
        yes: bool,
    },

    /// Move a document into another database.
    Move {
        target: String,
        /// Destination database id.
        #[arg(long)]
        to: String,
    },

    /// Group documents into topic clusters.
    ///
    /// Without `--k`, every k in `[min-k, max-k]` is tried and the one the
    /// configured validity index rates best is kept.
    Cluster {
        /// Use exactly this many clusters.
        #[arg(long)]
        k: Option<usize>,
        #[arg(long)]
        min_k: Option<usize>,
        #[arg(long)]
        max_k: Option<usize>,
        #[arg(long)]
        json: bool,
    },

    /// Repair drift between the document rows and their vectors.
    Reconcile {
        #[arg(long)]
        json: bool,
    },

    /// Recompute every vector with the configured embedding model.
    Reembed,

    /// Show counts, model, consistency, and size of the active database.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Export the active database as JSON.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Manage databases.
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Print a shell completion script.
    Completions { shell: clap_complete::Shell },
}

#[derive(Subcommand)]
enum DbAction {
    /// Create a new, empty database.
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Make it the active database.
        #[arg(long)]
        switch: bool,
    },
    /// List databases with document counts. `*` marks the active one.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Make another database active.
    Switch { id: String },
    /// Rename or re-describe a database.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// Empty string clears the description.
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a database and its storage. Refuses the active one.
    Delete { id: String },
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None if Path::new(DEFAULT_CONFIG).exists() => config::load_config(Path::new(DEFAULT_CONFIG)),
        None => Ok(Config::minimal()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "shelf", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = resolve_config(cli.config.as_deref())?;
    logging::init_with_config(&cfg.logging);

    let embedder = embedding::create_provider(&cfg.embedding)?;
    let registry = Registry::from_config(&cfg, embedder.clone()).await?;

    match cli.command {
        Commands::Init => {
            if cfg.embedding.is_enabled() {
                embedder.warm_up().await?;
            }
            let database = registry.active_database()?;
            println!("Initialized shelf at {}", cfg.storage.root.display());
            println!("Active database: {} ({})", database.name, database.id);
        }
        Commands::Add { file, fields } => {
            edit::run_add(&registry, file.as_deref(), fields.into()).await?;
        }
        Commands::Update { target, fields } => {
            edit::run_update(&registry, &target, fields.into()).await?;
        }
        Commands::Rename { target, title } => {
            edit::run_rename(&registry, &target, &title).await?;
        }
        Commands::Delete { target } => {
            edit::run_delete(&registry, &target).await?;
        }
        Commands::Get { target, json } => {
            get::run_get(&registry, &target, json).await?;
        }
        Commands::List { json } => {
            get::run_list(&registry, json).await?;
        }
        Commands::Search { query, limit, json } => {
            let limit = limit.unwrap_or(cfg.search.default_limit);
            search::run_search(&registry, &query, limit, json).await?;
        }
        Commands::Clear { yes } => {
            edit::run_clear(&registry, yes).await?;
        }
        Commands::Move { target, to } => {
            edit::run_move(&registry, &target, &to).await?;
        }
        Commands::Cluster {
            k,
            min_k,
            max_k,
            json,
        } => {
            let params = cluster_cmd::params_from_args(&cfg, k, min_k, max_k);
            cluster_cmd::run_cluster(&registry, params, json).await?;
        }
        Commands::Reconcile { json } => {
            embed_cmd::run_reconcile(&registry, json).await?;
        }
        Commands::Reembed => {
            embed_cmd::run_reembed(&registry).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&registry, json).await?;
        }
        Commands::Export { output } => {
            export::run_export(&registry, output.as_deref()).await?;
        }
        Commands::Db { action } => match action {
            DbAction::Create {
                name,
                description,
                switch,
            } => {
                databases::run_db_create(&registry, &name, description.as_deref(), switch).await?;
            }
            DbAction::List { json } => {
                databases::run_db_list(&registry, json).await?;
            }
            DbAction::Switch { id } => {
                databases::run_db_switch(&registry, &id).await?;
            }
            DbAction::Update {
                id,
                name,
                description,
            } => {
                databases::run_db_update(&registry, &id, name.as_deref(), description.as_deref())
                    .await?;
            }
            DbAction::Delete { id } => {
                databases::run_db_delete(&registry, &id).await?;
            }
        },
        Commands::Completions { .. } => {}
    }

    Ok(())
}
