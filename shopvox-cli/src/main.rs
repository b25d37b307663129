use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use shopvox_core::config::{Config, EmbeddingBackend};
use shopvox_core::index::{self, IndexBuilder};
use shopvox_core::refine::{self, refine_query};
use shopvox_core::{normalize_rows, read_catalogue, CatalogueFormat, Embedder, QueryOutcome, SearchPipeline};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Log directive used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "shopvox_core=warn";

#[derive(Parser)]
#[command(name = "shopvox")]
#[command(about = "Voice-driven product search over a catalogue index", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Model management commands")]
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    #[command(about = "Normalize a catalogue export and build the search index")]
    Index {
        #[arg(help = "Catalogue file (CSV or JSON)")]
        catalogue: PathBuf,

        #[arg(short, long, value_enum, help = "Input format; inferred from the extension if omitted")]
        format: Option<Format>,

        #[arg(long, help = "Delete the existing index first (required to change embedding models)")]
        fresh: bool,
    },

    #[command(about = "Refine a transcript into a search query")]
    Refine {
        #[arg(required = true, num_args = 1.., help = "Transcript text")]
        text: Vec<String>,
    },

    #[command(about = "Search the catalogue")]
    Search {
        #[arg(required = true, num_args = 1.., help = "What you are looking for")]
        text: Vec<String>,

        #[arg(short = 'k', long, help = "Number of products to return")]
        top_k: Option<usize>,

        #[arg(long, help = "Print the outcome as JSON")]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    #[command(about = "Show current models")]
    Show,

    #[command(about = "Set the LLM model")]
    Set {
        #[arg(help = "Model name (e.g., 'llama3.2:3b')")]
        model: String,
    },

    #[command(about = "List available models from Ollama")]
    List {
        #[arg(short, long, default_value = "http://localhost:11434")]
        url: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

impl From<Format> for CatalogueFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => CatalogueFormat::Csv,
            Format::Json => CatalogueFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show => show_config(&cli.config),
        Commands::Model { command } => match command {
            ModelCommands::Show => show_model(&cli.config),
            ModelCommands::Set { model } => set_model(&cli.config, &model),
            ModelCommands::List { url } => list_models(&url).await,
        },
        Commands::Index {
            catalogue,
            format,
            fresh,
        } => build_index(&cli.config, &catalogue, format, fresh).await,
        Commands::Refine { text } => refine_text(&cli.config, &text.join(" ")).await,
        Commands::Search { text, top_k, json } => search(&cli.config, &text.join(" "), top_k, json).await,
    }
}

/// Loads the config file, or the defaults when there is none.
fn load_config(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        Config::load(config_path).context("Failed to load config")
    } else {
        warn!(path = %config_path.display(), "Config file not found, using defaults");
        Ok(Config::default())
    }
}

fn show_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:           {}", config.llm.model.cyan());
    println!("  Base URL:        {}", config.llm.base_url);
    println!("  Temperature:     {}", config.llm.temperature);
    println!("  Timeout:         {}s", config.llm.timeout_secs);
    println!();
    println!("{}", "Embedding:".bold());
    match &config.embedding.backend {
        EmbeddingBackend::Ollama { model } => println!("  Backend:         ollama ({})", model.cyan()),
        EmbeddingBackend::Hashing { dimensions } => {
            println!("  Backend:         hashing ({} dimensions)", dimensions.to_string().cyan())
        }
    }
    println!("  Concurrency:     {}", config.embedding.concurrency);
    println!();
    println!("{}", "Search:".bold());
    println!("  Top K:           {}", config.search.top_k);
    println!("  Refiner:         {:?}", config.refiner.mode);
    println!("  Shaping:         {:?} ({})", config.shaping.mode, config.shaping.currency);
    println!("  Verify images:   {}", config.images.verify);
    println!("  Query timeout:   {}s", config.pipeline.query_timeout_secs);
    println!();
    println!("{}", "Storage:".bold());
    println!("  Index:           {}", config.storage.index_path);
    println!("  Records:         {}", config.storage.records_path);

    Ok(())
}

fn show_model(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}: {}", "Current model".bold(), config.llm.model.cyan());
    if let EmbeddingBackend::Ollama { model } = &config.embedding.backend {
        println!("{}: {}", "Embedding model".bold(), model.cyan());
    }
    Ok(())
}

fn set_model(config_path: &Path, model: &str) -> Result<()> {
    let content = std::fs::read_to_string(config_path).context("Failed to read config file")?;

    let mut config: serde_yaml::Value = serde_yaml::from_str(&content).context("Failed to parse config")?;

    let root = config
        .as_mapping_mut()
        .context("Config file is not a YAML mapping")?;
    let llm = root
        .entry(serde_yaml::Value::String("llm".to_string()))
        .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
    if let Some(llm_map) = llm.as_mapping_mut() {
        llm_map.insert(
            serde_yaml::Value::String("model".to_string()),
            serde_yaml::Value::String(model.to_string()),
        );
    }

    let updated_content = serde_yaml::to_string(&config).context("Failed to serialize config")?;

    std::fs::write(config_path, updated_content).context("Failed to write config file")?;

    println!("{} Model updated to: {}", "✓".green().bold(), model.cyan());

    Ok(())
}

async fn list_models(base_url: &str) -> Result<()> {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct OllamaModel {
        name: String,
        size: u64,
    }

    #[derive(Deserialize)]
    struct OllamaResponse {
        models: Vec<OllamaModel>,
    }

    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));

    println!("{} Fetching models from {}...", "→".blue(), base_url);
    println!();

    let response = reqwest::get(&url)
        .await
        .context("Failed to connect to Ollama. Is it running?")?;

    if !response.status().is_success() {
        anyhow::bail!("Ollama returned error: {}", response.status());
    }

    let data: OllamaResponse = response.json().await.context("Failed to parse Ollama response")?;

    if data.models.is_empty() {
        println!("{}", "No models found. Pull a model with 'ollama pull <model>'".yellow());
        return Ok(());
    }

    println!("{}", "Available models:".bold().green());
    println!();

    for model in data.models {
        let size_gb = model.size as f64 / (1024.0 * 1024.0 * 1024.0);
        println!("  {} {} ({:.2} GB)", "•".cyan(), model.name.bold(), size_gb);
    }

    println!();
    println!("Use {} to set a model", "shopvox -c config.yaml model set <model>".bold());

    Ok(())
}

async fn build_index(config_path: &Path, catalogue: &Path, format: Option<Format>, fresh: bool) -> Result<()> {
    let config = load_config(config_path)?;

    let rows = read_catalogue(catalogue, format.map(Into::into))
        .with_context(|| format!("Failed to read catalogue {}", catalogue.display()))?;
    let normalized = normalize_rows(rows);

    println!(
        "{} Normalized {} records from {}",
        "→".blue(),
        normalized.records.len(),
        catalogue.display()
    );
    if !normalized.issues.is_empty() {
        println!(
            "{} {} unusable field values were replaced by defaults",
            "!".yellow().bold(),
            normalized.issues.len()
        );
    }

    if fresh {
        index::remove(&config.storage.index_path, &config.storage.records_path)
            .await
            .context("Failed to remove existing index")?;
    }

    let builder =
        IndexBuilder::new(Embedder::from_config(&config)).with_concurrency(config.embedding.concurrency);
    let (_, report) = builder
        .build_and_persist(normalized.records, &config.storage)
        .await
        .context("Failed to build index")?;

    println!(
        "{} Indexed {} records ({} dimensions)",
        "✓".green().bold(),
        report.records,
        report.dimension
    );
    println!("  Index:   {}", config.storage.index_path);
    println!("  Records: {}", config.storage.records_path);

    Ok(())
}

async fn refine_text(config_path: &Path, text: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let refiner = refine::from_config(&config);

    let refinement = refine_query(refiner.as_ref(), text, config.llm.timeout()).await;
    println!("{}", refinement.query);
    if refinement.degraded {
        eprintln!("{}", "Refinement failed; showing the raw transcript".yellow());
    }

    Ok(())
}

async fn search(config_path: &Path, text: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(top_k) = top_k {
        config.search.top_k = top_k;
    }

    let pipeline = SearchPipeline::from_config(&config)
        .await
        .context("Failed to open catalogue index. Run 'shopvox index <catalogue>' first")?;
    let outcome = pipeline.search_text(text).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome, pipeline.engine().top_k());
    }

    Ok(())
}

fn print_outcome(outcome: &QueryOutcome, top_k: usize) {
    println!("{} {}", "Query:".bold(), outcome.query.cyan());
    if outcome.degraded {
        println!("{}", "(degraded: showing best-effort results)".yellow());
    }
    println!();

    if outcome.products.is_empty() {
        println!("{}", "No products found.".yellow());
        return;
    }

    println!(
        "{}",
        format!("Top {} of {} products:", outcome.products.len(), top_k).bold().green()
    );
    for (position, rendered) in outcome.products.iter().enumerate() {
        let product = &rendered.product;
        println!();
        println!("{} {}", format!("{}.", position + 1).bold(), product.name.bold());
        println!("   {} {}", "Price:".bold(), product.price.green());
        println!("   {} {}", "Category:".bold(), product.category);
        println!("   {} {}", "Description:".bold(), product.description);
        println!("   {}", "Specifications:".bold());
        for line in product.specifications.lines() {
            println!("     {}", line);
        }
        println!("   {} {}", "Buy now:".bold(), product.url.blue());

        for item in &rendered.gallery {
            let label = if item.src.starts_with("data:") {
                "[placeholder]".dimmed().to_string()
            } else {
                item.src.clone()
            };
            match item.title.as_str() {
                "" => println!("   {} {}", "•".cyan(), label),
                title => println!("   {} {} {}", "•".cyan(), title, label),
            }
        }
    }
}
