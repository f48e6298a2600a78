//! # Vecdex CLI (`vdx`)
//!
//! The `vdx` binary drives the ingestion pipeline and the query service.
//!
//! ## Usage
//!
//! ```bash
//! vdx --config ./config/vdx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vdx ingest` | Walk sources, extract, chunk, embed, and update the index |
//! | `vdx search "<query>"` | One-off similarity search against the index |
//! | `vdx serve` | Start the HTTP query service |
//!
//! ## Examples
//!
//! ```bash
//! # Ingest local and remote documents into the index
//! vdx ingest --config ./config/vdx.toml
//!
//! # See what would be ingested without touching the index
//! vdx ingest --dry-run
//!
//! # Query from the command line
//! vdx search "quarterly revenue" --k 5
//!
//! # Serve queries over HTTP
//! vdx serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use vecdex::config::{self, Config};
use vecdex::embedding::{self, create_provider};
use vecdex::index::VectorIndex;
use vecdex::ingest;
use vecdex::server;

/// Vecdex — a document ingestion and vector search service.
#[derive(Parser)]
#[command(
    name = "vdx",
    about = "Vecdex — ingest PDF/DOCX documents into a persistent vector index and query it",
    version,
    long_about = "Vecdex walks a local directory (and optionally an S3 bucket) for PDF and DOCX \
    documents, splits their text into overlapping chunks, embeds them, and maintains a persistent \
    vector index served over a JSON HTTP API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vdx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest documents into the vector index.
    ///
    /// Walks the configured local root (and the remote bucket when
    /// `S3_BUCKET_NAME` is set), extracts text, chunks it, embeds the
    /// chunks, and merges them into the persisted index. Per-document
    /// failures are reported at the end without aborting the run.
    Ingest {
        /// Show document and chunk counts without embedding or writing
        /// the index.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of local documents to process (remote
        /// documents are not capped).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Search the index from the command line.
    ///
    /// Embeds the query, loads the persisted index, and prints the
    /// nearest chunks with scores and sources.
    Search {
        /// The search query string.
        query: String,

        /// Number of results to return.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Start the HTTP query service.
    ///
    /// The service starts with no index loaded; POST /load before
    /// querying.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { dry_run, limit } => run_ingest(config, dry_run, limit).await,
        Commands::Search { query, k } => run_search(config, &query, k).await,
        Commands::Serve => server::run_server(&config).await,
    }
}

async fn run_ingest(mut config: Config, dry_run: bool, limit: Option<usize>) -> anyhow::Result<()> {
    if limit.is_some() {
        config.ingest.max_items = limit;
    }

    let report = ingest::collect_chunks(&config).await?;

    println!();
    println!(
        "Ingestion: {} document(s) processed, {} skipped (empty), {} failed, {} chunk(s)",
        report.docs_processed,
        report.docs_skipped_empty,
        report.failures.len(),
        report.chunks.len()
    );

    if dry_run {
        println!("Dry run — index not modified");
        return Ok(());
    }

    if report.chunks.is_empty() {
        println!("Nothing to index");
        return Ok(());
    }

    let provider = create_provider(&config.embedding)?;
    let mut index = VectorIndex::open_or_create(
        &config.index.dir,
        &config.index.name,
        provider.model_name(),
        provider.dims(),
        config.index.dedup_sources,
    )?;

    let before = index.len();
    ingest::embed_and_add(&mut index, &config, report.chunks).await?;
    index.save()?;

    println!(
        "Index '{}' saved to {} ({} vectors, +{})",
        config.index.name,
        config.index.dir.display(),
        index.len(),
        index.len() - before
    );

    if !report.failures.is_empty() {
        println!();
        println!("{} document(s) failed:", report.failures.len());
        for failure in &report.failures {
            println!("  {} — {}", failure.source, failure.reason);
        }
    }

    Ok(())
}

async fn run_search(config: Config, query: &str, k: Option<usize>) -> anyhow::Result<()> {
    let provider = create_provider(&config.embedding)?;
    let index = VectorIndex::load(
        &config.index.dir,
        &config.index.name,
        provider.model_name(),
        provider.dims(),
    )?;

    let k = k.unwrap_or(config.server.default_k);
    let query_vector = embedding::embed_query(&config.embedding, query).await?;
    let hits = index.search(&query_vector, k);

    if hits.is_empty() {
        println!("No results");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} (chunk {})",
            i + 1,
            hit.score,
            hit.metadata.source,
            hit.metadata.chunk_id
        );
        let preview: String = hit.content.chars().take(200).collect();
        println!("   {}", preview.replace('\n', " "));
    }

    Ok(())
}
