//! Phone finder CLI.
//!
//! Usage:
//!     phonefinder search --filters '{"price_max": 15000}' --catalog phones.json
//!     phonefinder ask "best phones under 15000 with good camera" --catalog phones.json
//!     phonefinder normalize --filters '{"ram": "8GB", "brand": "Samsung"}'
//!     phonefinder health

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use phonefinder_backend::{
    BackendError, CatalogStore, ConversationLog, JsonlConversationLog, LogError, ManticoreCatalog,
    ManticoreConfig, MemoryCatalog, MemoryConversationLog,
};
use phonefinder_explain::{describe_query, explain_hit, summarize_candidate, summarize_outcome};
use phonefinder_extract::{ExtractorConfig, FilterExtractor, OpenAiExtractor};
use phonefinder_model::{CatalogRecord, RawFilters, ResolutionRecord};
use phonefinder_pipeline::{config, PipelineConfig, SearchPipeline, SearchRequest};
use phonefinder_query::{normalize, translate, ManticoreDialect, QueryDialect, StoreQuery};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "phonefinder")]
#[command(about = "Resolve phone search filters and rank catalog matches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the catalog with structured filters
    Search {
        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Extract filters from a natural-language request, then search
    Ask {
        /// The user's request
        message: String,

        /// Chat model used for extraction
        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,

        /// OpenAI-compatible API base URL
        #[arg(long, default_value = "https://api.openai.com/v1")]
        api_base: String,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Show how filters normalize and translate, without searching
    Normalize {
        #[command(flatten)]
        filters: FilterArgs,

        /// Pipeline config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check Manticore health
    Health {
        /// Manticore URL
        #[arg(long, default_value = "http://127.0.0.1:9308")]
        manticore_url: String,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Filters as a JSON object
    #[arg(long, conflicts_with = "filters_file", required_unless_present = "filters_file")]
    filters: Option<String>,

    /// Path to a JSON file holding the filters
    #[arg(long)]
    filters_file: Option<PathBuf>,
}

#[derive(Args)]
struct SearchArgs {
    /// Catalog JSON file; searches Manticore when omitted
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Manticore URL
    #[arg(long, default_value = "http://127.0.0.1:9308")]
    manticore_url: String,

    /// Append resolution records to this JSONL file
    #[arg(long)]
    log: Option<PathBuf>,

    /// Pipeline config (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Conversation id (random when omitted)
    #[arg(long)]
    conversation_id: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Show the score breakdown of each phone
    #[arg(long)]
    explain: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Store selected on the command line.
enum Store {
    Memory(MemoryCatalog),
    Manticore(ManticoreCatalog),
}

impl CatalogStore for Store {
    async fn query(&self, query: &StoreQuery) -> Result<Vec<CatalogRecord>, BackendError> {
        match self {
            Store::Memory(store) => store.query(query).await,
            Store::Manticore(store) => store.query(query).await,
        }
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        match self {
            Store::Memory(store) => store.health_check().await,
            Store::Manticore(store) => store.health_check().await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Store::Memory(store) => store.name(),
            Store::Manticore(store) => store.name(),
        }
    }
}

/// Without `--log`, records are kept in memory and dropped on exit.
enum Log {
    Jsonl(JsonlConversationLog),
    Discard(MemoryConversationLog),
}

impl ConversationLog for Log {
    async fn append(&self, record: &ResolutionRecord) -> Result<(), LogError> {
        match self {
            Log::Jsonl(log) => log.append(record).await,
            Log::Discard(log) => log.append(record).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("phonefinder=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search { filters, search } => {
            let filters = read_filters(&filters)?;
            run_search(&search, filters, None).await?;
        }
        Commands::Ask {
            message,
            model,
            api_base,
            search,
        } => {
            run_ask(&search, message, model, api_base).await?;
        }
        Commands::Normalize { filters, config } => {
            let filters = read_filters(&filters)?;
            run_normalize(filters, config.as_deref())?;
        }
        Commands::Health { manticore_url } => {
            run_health(manticore_url).await?;
        }
    }

    Ok(())
}

fn read_filters(args: &FilterArgs) -> Result<RawFilters> {
    let text = match (&args.filters, &args.filters_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read filters from {}", path.display()))?,
        (None, None) => anyhow::bail!("Pass --filters or --filters-file"),
    };

    let value: Value = serde_json::from_str(&text).context("Filters are not valid JSON")?;
    Ok(RawFilters::from_value(value))
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => Ok(config::load(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn open_store(args: &SearchArgs) -> Result<Store> {
    match &args.catalog {
        Some(path) => {
            let catalog = MemoryCatalog::from_json_file(path)?;
            tracing::debug!(records = catalog.len(), "Loaded catalog");
            Ok(Store::Memory(catalog))
        }
        None => {
            let config = ManticoreConfig {
                base_url: args.manticore_url.clone(),
                ..Default::default()
            };
            Ok(Store::Manticore(ManticoreCatalog::new(config)?))
        }
    }
}

fn open_log(args: &SearchArgs) -> Log {
    match &args.log {
        Some(path) => Log::Jsonl(JsonlConversationLog::new(path)),
        None => Log::Discard(MemoryConversationLog::new()),
    }
}

async fn run_search(args: &SearchArgs, filters: RawFilters, message: Option<String>) -> Result<()> {
    let pipeline = SearchPipeline::new(
        open_store(args)?,
        open_log(args),
        load_config(args.config.as_deref())?,
    );

    let conversation_id = args
        .conversation_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut request = SearchRequest::new(conversation_id, filters);
    if let Some(message) = message {
        request = request.with_message(message);
    }

    let criteria = describe_query(&pipeline.resolve(&request.filters));
    let outcome = pipeline.search(&request).await?;
    let scoring = &pipeline.config().scoring;

    if args.format == Format::Json {
        let mut output = serde_json::to_value(&outcome)?;
        output["conversation_id"] = json!(request.conversation_id);
        if args.explain {
            let explanations: Vec<_> = outcome
                .candidates()
                .iter()
                .map(|hit| explain_hit(hit, scoring))
                .collect();
            output["explanations"] = serde_json::to_value(explanations)?;
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Conversation: {}", request.conversation_id);
    if !criteria.is_empty() {
        println!("Criteria: {}", criteria.join("; "));
    }
    println!("---");

    for (i, hit) in outcome.candidates().iter().enumerate() {
        println!("\n{}. {}", i + 1, summarize_candidate(hit));
        if let Some(url) = &hit.record.product_url {
            println!("   {}", url);
        }

        if args.explain {
            let explanation = explain_hit(hit, scoring);
            println!("   {} | {}", explanation.summary, explanation.detail);
            for item in &explanation.evidence {
                println!(
                    "     {}: {} {}",
                    item.kind,
                    item.value,
                    item.context.as_deref().unwrap_or("")
                );
            }
        }
    }

    println!("\n---");
    println!("{}", summarize_outcome(&outcome));

    Ok(())
}

async fn run_ask(args: &SearchArgs, message: String, model: String, api_base: String) -> Result<()> {
    let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;

    let extractor = OpenAiExtractor::new(ExtractorConfig {
        api_base,
        api_key,
        model,
        ..Default::default()
    })?;

    let filters = extractor.extract(&message).await?;
    tracing::info!(filters = %serde_json::to_string(&filters)?, "Extracted filters");

    run_search(args, filters, Some(message)).await
}

fn run_normalize(filters: RawFilters, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let canonical = normalize(&filters, &config.normalize);

    println!("Canonical query:");
    println!("{}", serde_json::to_string_pretty(&canonical)?);

    if canonical.is_empty() {
        println!("\nNo actionable criteria.");
        return Ok(());
    }

    for phrase in describe_query(&canonical) {
        println!("  - {}", phrase);
    }

    let store_query = translate(&canonical);
    println!("\nStore query:");
    println!("{}", serde_json::to_string_pretty(&store_query)?);

    let sql = ManticoreDialect::default().render(&store_query)?;
    println!("\nManticore SQL:");
    println!("{}", sql);

    Ok(())
}

async fn run_health(manticore_url: String) -> Result<()> {
    let store = ManticoreCatalog::new(ManticoreConfig {
        base_url: manticore_url,
        ..Default::default()
    })?;

    print!("Checking {} store... ", store.name());

    match store.health_check().await {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(e) => {
            println!("FAILED: {}", e);
            std::process::exit(1);
        }
    }
}
