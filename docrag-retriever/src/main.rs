use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use docrag_context::TextSplitter;
use docrag_embed::{BatchEmbedder, create_provider};
use docrag_retriever::{
    answer::{Answerer, OpenAiChat},
    config::AppConfig,
    confirm::confirm,
    pipeline::{IngestPipeline, IngestStatus, QueryPipeline},
    retrieval::Retriever,
    storage::{ChunkStore, Destructive, connect, schema::SchemaManager, sqlite_store::SqliteStore},
};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// A CLI tool to index documents and ask questions about them.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to ./docrag.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database URL or path, overriding the configuration
    #[arg(short, long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the chunk table if it does not exist
    Init,
    /// Index a PDF (or text) document
    Ingest {
        /// Document to index
        file: PathBuf,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Answer a question from the indexed documents
    Query {
        /// The question to answer
        question: String,
        /// Number of chunks to use as context
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show chunk counts per source file
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Show a sample of stored chunks
    Inspect {
        /// Only show chunks from this source file
        #[arg(short, long)]
        source: Option<String>,
        /// Maximum number of chunks to show
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Delete chunks of one source file, or all chunks
    Delete {
        /// Source file whose chunks are deleted
        #[arg(short, long, conflicts_with = "all", required_unless_present = "all")]
        source: Option<String>,
        /// Delete every chunk
        #[arg(long)]
        all: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Drop and recreate the chunk table
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the columns of the chunk table
    Schema,
    /// Check that the database answers
    Ping,
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    total_chunks: u64,
    sources: &'a [docrag_retriever::storage::SourceCount],
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(database) = args.database {
        config.database.url = database;
    }

    match args.command {
        Commands::Init => {
            let schema = SchemaManager::new(connect(&config.database.url).await?);
            schema.ensure_table().await?;
            println!("Initialized chunk database at {}", config.database.url);
            println!("Table exists: {}", schema.table_exists().await?);
            println!("Rows: {}", schema.row_count().await?);
            Ok(())
        }
        Commands::Ingest { file, format } => {
            let store = Arc::new(SqliteStore::open(&config.database.url).await?);
            let embed_config = config.embed_config()?;
            let provider = create_provider(&embed_config)?;
            let embedder = BatchEmbedder::from_config(provider, &embed_config);
            let splitter = TextSplitter::new(config.splitter_config()?)?;

            let report = IngestPipeline::new(splitter, embedder, store)
                .ingest(&file)
                .await;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Summary => {
                    println!("Document: {}", report.source_file);
                    println!("Chunking: {}", report.split_strategy);
                    println!("Pages loaded: {}", report.pages);
                    println!("Chunks created: {}", report.chunks);
                    println!("Embeddings generated: {}", report.embedded);
                    println!("Chunks stored: {}", report.stored);
                    if let Some(warning) = &report.warning {
                        println!("Warning: {warning}");
                    }
                    match &report.status {
                        IngestStatus::Completed => println!("Status: completed"),
                        IngestStatus::Partial => println!("Status: partial"),
                        IngestStatus::NothingToIndex => println!("Status: nothing to index"),
                        IngestStatus::Failed(message) => println!("Status: failed ({message})"),
                    }
                }
            }
            Ok(())
        }
        Commands::Query {
            question,
            top_k,
            format,
        } => {
            let store = Arc::new(SqliteStore::open(&config.database.url).await?);
            let embed_config = config.embed_config()?;
            let provider = create_provider(&embed_config)?;
            let embedder = BatchEmbedder::from_config(provider, &embed_config);

            let Some(api_key) = config.chat.api_key.clone() else {
                bail!("missing chat API key (set OPENAI_API_KEY or [chat] api_key)");
            };
            let mut chat = OpenAiChat::new(
                api_key,
                Duration::from_secs(config.chat.request_timeout_secs),
            )?
            .with_model(config.chat.model.clone())
            .with_temperature(config.chat.temperature);
            if let Some(base_url) = &config.chat.base_url {
                chat = chat.with_base_url(base_url.clone());
            }
            let answerer = Answerer::new(Arc::new(chat)).with_domain(config.chat.domain.clone());

            let pipeline = QueryPipeline::new(embedder, Retriever::new(store), answerer);
            let report = pipeline
                .ask(&question, top_k.unwrap_or(config.retrieval.top_k))
                .await;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Summary => {
                    println!("Query: {}", report.question);
                    if let Some(failure) = &report.failure {
                        println!("{failure}");
                    }
                    println!("Found {} relevant chunks:", report.results.len());
                    for (i, result) in report.results.iter().enumerate() {
                        println!(
                            "{}. Similarity: {:.4} | File: {}",
                            i + 1,
                            result.score,
                            result.record.source_file
                        );
                    }
                    println!();
                    println!("ANSWER:");
                    println!("{}", report.answer);
                }
            }
            Ok(())
        }
        Commands::Stats { format } => {
            let store = SqliteStore::open(&config.database.url).await?;
            let total = store.schema().row_count().await?;
            let sources = store.counts_by_source().await?;

            match format {
                OutputFormat::Json => {
                    let output = StatsOutput {
                        total_chunks: total,
                        sources: &sources,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary => {
                    println!("Total chunks: {total}");
                    println!("Source files: {}", sources.len());
                    for source in &sources {
                        println!("  {}: {} chunks", source.source_file, source.chunks);
                    }
                }
            }
            Ok(())
        }
        Commands::Inspect {
            source,
            limit,
            format,
        } => {
            let store = SqliteStore::open(&config.database.url).await?;
            let records = store.sample(source.as_deref(), limit).await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
                OutputFormat::Summary => {
                    println!("Showing {} chunks:", records.len());
                    for record in &records {
                        println!(
                            "  ID: {} | File: {} | Method: {} | Created: {} | Dim: {}",
                            record.id,
                            record.source_file,
                            record.split_strategy,
                            record.created_at,
                            record.embedding.len()
                        );
                        println!("    {}", record.preview(100));
                    }
                }
            }
            Ok(())
        }
        Commands::Delete { source, all, yes } => {
            let store = SqliteStore::open(&config.database.url).await?;
            if let Some(source) = source {
                let deleted = store.delete_by_source(&source).await?;
                println!("Deleted {deleted} chunks from {source}");
                return Ok(());
            }
            if !all {
                bail!("specify --source <FILE> or --all");
            }

            let confirmed = yes
                || confirm(
                    "Delete ALL chunks from the database?",
                    &mut io::stdin().lock(),
                    &mut io::stdout(),
                );
            match store.delete_all(confirmed).await? {
                Destructive::Done { rows } => println!("Deleted {rows} chunks"),
                Destructive::Declined => println!("Deletion cancelled"),
            }
            Ok(())
        }
        Commands::Reset { yes } => {
            let schema = SchemaManager::new(connect(&config.database.url).await?);
            let confirmed = yes
                || confirm(
                    "Drop and recreate the document_chunks table?",
                    &mut io::stdin().lock(),
                    &mut io::stdout(),
                );
            match schema.drop_and_recreate(confirmed).await? {
                Destructive::Done { rows } => {
                    println!("Table recreated ({rows} chunks removed)")
                }
                Destructive::Declined => println!("Reset cancelled"),
            }
            Ok(())
        }
        Commands::Schema => {
            let schema = SchemaManager::new(connect(&config.database.url).await?);
            let columns = schema.columns().await?;
            if columns.is_empty() {
                println!("Table document_chunks does not exist (run `docrag init`)");
                return Ok(());
            }
            println!("Columns of document_chunks:");
            for column in &columns {
                println!(
                    "  {} {}{}{}",
                    column.name,
                    column.declared_type,
                    if column.not_null { " NOT NULL" } else { "" },
                    if column.primary_key { " PRIMARY KEY" } else { "" }
                );
            }
            Ok(())
        }
        Commands::Ping => {
            let pool = connect(&config.database.url)
                .await
                .context("Database connection failed")?;
            let version = SchemaManager::new(pool).ping().await?;
            println!("Database connection OK");
            println!("SQLite version: {version}");
            Ok(())
        }
    }
}
