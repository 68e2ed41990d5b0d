//! # lectern CLI
//!
//! Command-line front end for the lectern retrieval index.
//!
//! lectern keeps a folder of course material searchable by meaning: files
//! are extracted (PDFs through OCR), embedded, and matched against
//! questions to build context for a tutor prompt.
//!
//! ## Commands
//!
//! - `lectern scan` - Synchronize the watched folder with the index
//! - `lectern query <QUERY>` - Retrieve relevant documents
//! - `lectern context <QUERY>` - Print the formatted context block
//! - `lectern watch` - Rescan whenever the folder changes
//! - `lectern status` - Show index statistics
//!
//! ## Examples
//!
//! ```bash
//! # Copy a file into the folder and index it
//! lectern upload notes/photosynthesis.pdf
//!
//! # Search
//! lectern query "how do plants make sugar" --top-k 5
//!
//! # Get JSON output
//! lectern list --format json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lectern_core::{Embedder, NewDocument};
#[cfg(feature = "candle")]
use lectern_embed::CandleEmbedder;
use lectern_embed::HashingEmbedder;
use lectern_extract::ExtractorRegistry;
use lectern_index::{FolderWatcher, RetrievalService};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

mod config;

use config::{Config, HASHING_MODEL};

#[derive(Parser)]
#[command(name = "lectern")]
#[command(about = "Semantic retrieval over a folder of course material")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/lectern/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize the watched folder with the index
    Scan,

    /// List stored documents
    List,

    /// Retrieve documents relevant to a query
    Query {
        /// Query string
        query: String,

        /// Maximum results (default from config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Print retrieved documents as a prompt context block
    Context {
        /// Query string
        query: String,

        /// Maximum results (default from config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Add a text document that has no source file
    Add {
        /// Document text
        content: String,

        /// Display title
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Copy a file into the watched folder and index it
    Upload {
        /// File to copy
        file: PathBuf,
    },

    /// Remove a document by id
    Remove {
        /// Document id
        id: String,
    },

    /// Remove every document and reset the vector index
    Clear,

    /// Re-embed every stored document and compact the vector index
    Reindex,

    /// Show index status
    Status,

    /// Scan, then rescan on every change until Ctrl+C
    Watch,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

/// Output structure for query results.
#[derive(Serialize)]
struct QueryOutput {
    query: String,
    results: Vec<ResultItem>,
}

#[derive(Serialize)]
struct ResultItem {
    id: String,
    title: String,
    score: f32,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
}

/// Output structure for status.
#[derive(Serialize)]
struct StatusOutput {
    data_dir: String,
    folder: String,
    documents: usize,
    index_slots: usize,
    live_slots: usize,
    ghost_slots: usize,
}

#[derive(Serialize)]
struct AddOutput {
    id: String,
}

#[derive(Serialize)]
struct RemoveOutput {
    id: String,
    removed: bool,
}

#[derive(Serialize)]
struct ReindexOutput {
    documents: usize,
}

/// Pick the embedder named by the config.
async fn create_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    if config.embedding.model == HASHING_MODEL {
        info!("Using the feature-hashing embedder");
        return Ok(Arc::new(HashingEmbedder::new()));
    }

    create_model_embedder(config).await
}

#[cfg(feature = "candle")]
async fn create_model_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    if config.embedding.model != lectern_embed::candle::MODEL_ID {
        anyhow::bail!(
            "Unsupported embedding model '{}' (expected '{}' or '{}')",
            config.embedding.model,
            lectern_embed::candle::MODEL_ID,
            HASHING_MODEL
        );
    }

    let cache_dir = config.models_dir()?;
    let embedder = if config.embedding.use_gpu {
        CandleEmbedder::new(cache_dir)
    } else {
        CandleEmbedder::cpu(cache_dir)
    };

    info!("Initializing embedder (this may download the model on first run)...");
    embedder
        .init()
        .await
        .context("Failed to initialize embedder")?;

    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "candle"))]
async fn create_model_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    anyhow::bail!(
        "Model '{}' needs the `candle` feature; set embedding.model = \"{}\" instead",
        config.embedding.model,
        HASHING_MODEL
    )
}

/// Open the retrieval service described by the config.
async fn open_service(config: &Config) -> Result<RetrievalService> {
    let embedder = create_embedder(config).await?;
    let extractors = Arc::new(ExtractorRegistry::with_defaults(&config.ocr_config()));
    let service_config = config.service_config()?;

    RetrievalService::open(service_config, embedder, extractors)
        .context("Failed to open document index")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_scan(format: OutputFormat, stats: &lectern_core::ScanStats) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(stats)?,
        OutputFormat::Text => {
            println!(
                "Scan complete: {} added, {} updated, {} failed",
                stats.added, stats.updated, stats.failed
            );
            println!("  Files in folder: {}", stats.files_seen);
            println!("  Documents:       {}", stats.total_documents);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_from(cli.config.clone()).context("Failed to load config")?;

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Scan => {
            let service = open_service(&config).await?;
            let stats = service.scan_folder().await.context("Folder scan failed")?;
            print_scan(cli.format, &stats)?;
        }

        Commands::List => {
            let service = open_service(&config).await?;
            let documents = service.get_document_list().await;

            match cli.format {
                OutputFormat::Json => print_json(&documents)?,
                OutputFormat::Text => {
                    if documents.is_empty() {
                        println!("No documents.");
                    }
                    for doc in &documents {
                        let mut flags = Vec::new();
                        if !doc.in_index {
                            flags.push("not indexed");
                        }
                        if !doc.original_file.is_empty() && !doc.in_folder {
                            flags.push("missing from folder");
                        }
                        println!("{}  {}", doc.id, doc.title);
                        println!(
                            "   modified {}{}",
                            doc.last_modified.format("%Y-%m-%d %H:%M:%S"),
                            if flags.is_empty() {
                                String::new()
                            } else {
                                format!(" ({})", flags.join(", "))
                            }
                        );
                    }
                }
            }
        }

        Commands::Query { query, top_k } => {
            let service = open_service(&config).await?;
            let top_k = top_k.unwrap_or(config.retrieval.default_top_k);
            let results = service
                .retrieve(&query, top_k)
                .await
                .context("Retrieval failed")?;

            match cli.format {
                OutputFormat::Json => {
                    let output = QueryOutput {
                        query: query.clone(),
                        results: results
                            .iter()
                            .map(|r| ResultItem {
                                id: r.document.id.clone(),
                                title: r.document.title.clone(),
                                score: r.score,
                                content: truncate(&r.document.content, 200),
                                file: r
                                    .document
                                    .source_path()
                                    .map(|p| p.to_string_lossy().to_string()),
                            })
                            .collect(),
                    };
                    print_json(&output)?;
                }
                OutputFormat::Text => {
                    println!("Query: {query}\n");
                    if results.is_empty() {
                        println!("No results found.");
                    } else {
                        for (i, result) in results.iter().enumerate() {
                            println!(
                                "{}. {} (score: {:.3})",
                                i + 1,
                                result.document.title,
                                result.score
                            );
                            if let Some(path) = result.document.source_path() {
                                println!("   File: {}", path.display());
                            }
                            println!("   {}", truncate(&result.document.content, 100));
                            println!();
                        }
                    }
                }
            }
        }

        Commands::Context { query, top_k } => {
            let service = open_service(&config).await?;
            let top_k = top_k.unwrap_or(config.retrieval.default_top_k);
            let context = service
                .format_context(&query, top_k)
                .await
                .context("Retrieval failed")?;
            println!("{context}");
        }

        Commands::Add { content, title } => {
            let service = open_service(&config).await?;
            let mut new = NewDocument::new(content);
            if let Some(title) = title {
                new = new.with_title(title);
            }
            let id = service
                .add_document(new)
                .await
                .context("Failed to add document")?;

            match cli.format {
                OutputFormat::Json => print_json(&AddOutput { id })?,
                OutputFormat::Text => println!("Added {id}"),
            }
        }

        Commands::Upload { file } => {
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .with_context(|| format!("Not a file: {}", file.display()))?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let service = open_service(&config).await?;
            let outcome = service
                .upload_file(&file_name, &bytes)
                .await
                .context("Upload failed")?;

            match cli.format {
                OutputFormat::Json => print_json(&outcome)?,
                OutputFormat::Text => {
                    println!("Saved {}", outcome.path.display());
                    print_scan(cli.format, &outcome.scan)?;
                }
            }
        }

        Commands::Remove { id } => {
            let service = open_service(&config).await?;
            let removed = service
                .remove_document(&id)
                .await
                .context("Failed to remove document")?;

            match cli.format {
                OutputFormat::Json => print_json(&RemoveOutput { id, removed })?,
                OutputFormat::Text if removed => println!("Removed {id}"),
                OutputFormat::Text => println!("No document with id {id}"),
            }
        }

        Commands::Clear => {
            let service = open_service(&config).await?;
            service
                .remove_all_documents()
                .await
                .context("Failed to clear documents")?;
            if let OutputFormat::Text = cli.format {
                println!("All documents removed.");
            }
        }

        Commands::Reindex => {
            let service = open_service(&config).await?;
            let documents = service
                .rebuild_index()
                .await
                .context("Failed to rebuild index")?;

            match cli.format {
                OutputFormat::Json => print_json(&ReindexOutput { documents })?,
                OutputFormat::Text => println!("Re-embedded {documents} documents"),
            }
        }

        Commands::Status => {
            let service = open_service(&config).await?;
            let stats = service.stats().await;
            let data_dir = config.data_dir()?;

            match cli.format {
                OutputFormat::Json => {
                    let output = StatusOutput {
                        data_dir: data_dir.to_string_lossy().to_string(),
                        folder: service.folder().to_string_lossy().to_string(),
                        documents: stats.documents,
                        index_slots: stats.index_slots,
                        live_slots: stats.live_slots,
                        ghost_slots: stats.ghost_slots,
                    };
                    print_json(&output)?;
                }
                OutputFormat::Text => {
                    println!("Index Status for {}", data_dir.display());
                    println!("  Folder:      {}", service.folder().display());
                    println!("  Documents:   {}", stats.documents);
                    println!(
                        "  Index slots: {} ({} live, {} stale)",
                        stats.index_slots, stats.live_slots, stats.ghost_slots
                    );
                    if stats.ghost_slots > 0 {
                        println!("Run 'lectern reindex' to compact the index.");
                    }
                }
            }
        }

        Commands::Watch => {
            let service = open_service(&config).await?;
            let stats = service.scan_folder().await.context("Folder scan failed")?;
            print_scan(cli.format, &stats)?;

            let (tx, mut rx) = mpsc::channel::<Vec<PathBuf>>(32);
            let mut watcher =
                FolderWatcher::new(tx, Duration::from_millis(config.folder.debounce_ms))
                    .context("Failed to create folder watcher")?;
            watcher
                .watch(service.folder())
                .context("Failed to watch folder")?;

            info!(
                "Watching {:?} for changes. Press Ctrl+C to stop.",
                service.folder()
            );

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Stopping watcher");
                        break;
                    }
                    changed = rx.recv() => {
                        let Some(paths) = changed else { break };
                        info!("{} paths changed, rescanning", paths.len());
                        match service.scan_folder().await {
                            Ok(stats) => print_scan(cli.format, &stats)?,
                            Err(e) => warn!("Rescan failed: {}", e),
                        }
                    }
                }
            }

            watcher.unwatch(service.folder()).ok();
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config)
                            .context("Failed to serialize config")?
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{}",
                        toml::to_string_pretty(&config).context("Failed to serialize config")?
                    );
                }
            },
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
            }
            ConfigAction::Path => {
                if let Some(path) = Config::config_path() {
                    println!("{}", path.display());
                } else {
                    println!("Could not determine config directory");
                }
            }
        },
    }

    Ok(())
}

/// Truncate a string to max characters, adding ellipsis if needed.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ").replace('\r', "");
    if s.chars().count() <= max_len {
        s
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
