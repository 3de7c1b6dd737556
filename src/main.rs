//! # ragmill CLI
//!
//! Commands for running the pipeline service and exercising it locally:
//!
//! ```bash
//! ragmill --config ./config/ragmill.toml serve
//! ragmill --config ./config/ragmill.toml ingest "some text to index"
//! ragmill --config ./config/ragmill.toml ask "what does the corpus say?"
//! ragmill --config ./config/ragmill.toml deliver ./batch.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use ragmill::answer::AnswerPipeline;
use ragmill::config::{load_config, Config};
use ragmill::embedding::{Embedder, HttpEmbedder};
use ragmill::generation::{Generator, HttpGenerator};
use ragmill::ingest::IngestionPipeline;
use ragmill::models::{DeliveryMessage, IngestReport, TextRecord};
use ragmill::server::{run_server, AppState};
use ragmill::store::{InMemoryStore, SqliteStore, VectorStore};

/// ragmill — a retrieval-augmented question answering pipeline.
#[derive(Parser)]
#[command(
    name = "ragmill",
    about = "Retrieval-augmented question answering: chunk, embed, store, retrieve, generate",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragmill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,

    /// Ingest one text directly (the pipeline chunks it and derives
    /// document ids).
    Ingest {
        /// The raw text to ingest.
        text: String,
        /// Optional record id; generated when absent.
        #[arg(long)]
        id: Option<String>,
    },

    /// Answer a question from retrieved context.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Ingest a delivery batch from a JSON file containing an array of
    /// `{"id": .., "body": ..}` messages.
    Deliver {
        /// Path to the batch file.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let state = build_state(&config).await?;
            run_server(&config.server.bind, state).await?;
        }
        Commands::Ingest { text, id } => {
            let state = build_state(&config).await?;
            let record = match id {
                Some(id) => TextRecord::new(id, text),
                None => TextRecord::anonymous(text),
            };
            let report = state.ingest.ingest_direct(record).await;
            print_report(&report);
            if !report.is_fully_successful() {
                std::process::exit(1);
            }
        }
        Commands::Ask { question } => {
            let state = build_state(&config).await?;
            let result = state.answer.answer(&question).await?;
            println!("{}", result.text);
        }
        Commands::Deliver { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read batch file: {}", file.display()))?;
            let messages: Vec<DeliveryMessage> =
                serde_json::from_str(&content).with_context(|| "Failed to parse batch file")?;
            if messages.len() > config.delivery.max_batch {
                anyhow::bail!(
                    "batch of {} exceeds delivery.max_batch ({})",
                    messages.len(),
                    config.delivery.max_batch
                );
            }
            let state = build_state(&config).await?;
            let report = state.ingest.ingest_delivery(messages).await;
            print_report(&report);
        }
    }

    Ok(())
}

/// Construct providers, store, and pipelines from configuration. The
/// store connection is acquired once here and its readiness confirmed
/// within the configured bounded wait before first use.
async fn build_state(config: &Config) -> Result<AppState> {
    let store: Arc<dyn VectorStore> = match config.store.backend.as_str() {
        "sqlite" => Arc::new(SqliteStore::connect(&config.store).await?),
        _ => Arc::new(InMemoryStore::new(config.store.dims)),
    };
    store
        .ready(Duration::from_secs(config.store.ready_timeout_secs))
        .await?;

    let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::from_config(&config.embedding)?);
    let generator: Arc<dyn Generator> = Arc::new(HttpGenerator::from_config(&config.generation)?);

    let ingest = Arc::new(IngestionPipeline::new(
        embedder.clone(),
        store.clone(),
        config.chunking.clone(),
    ));
    let answer = Arc::new(AnswerPipeline::new(
        embedder,
        generator,
        store,
        config.retrieval.top_k,
    ));

    Ok(AppState {
        answer,
        ingest,
        max_batch: config.delivery.max_batch,
    })
}

fn print_report(report: &IngestReport) {
    println!("ingested: {} documents", report.succeeded.len());
    for id in &report.succeeded {
        println!("  {}", id);
    }
    if !report.failed.is_empty() {
        println!("failed: {} records", report.failed.len());
        for f in &report.failed {
            println!("  {} [{}]: {}", f.record_id, f.code, f.message);
        }
    }
}
