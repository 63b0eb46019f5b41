mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use runtime::{ChatRequest, ConnectionManager, GeminiConnector, TurnOptions, handle_chat};
use storage::{Product, ProductStore};
use tools::providers::{ScrapeClient, SearchClient, YoutubeClient};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const SYSTEM_PROMPT: &str = "You are Shelfscout, a retail shopping assistant. \
    Ground every claim in tool results: fetch catalog data and research \
    sources before answering, and cite what you found. Be concise.";
const CONFIG_FILE: &str = "shelfscout.toml";

#[derive(Parser)]
#[command(name = "shelfscout")]
#[command(about = "A tool-using retail research assistant", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Product id to anchor the conversation on
        #[arg(short, long)]
        product: Option<String>,
        /// User id recorded with the session
        #[arg(short, long, default_value = "local")]
        user: String,
    },
    /// Manage the product catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Load products from a JSON file (array of product records)
    Seed { file: PathBuf },
    /// List product ids in the catalog
    List,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config()?;

    match cli.command {
        Some(Commands::Chat { product, user }) => cmd_chat(&config, product, user).await,
        None => cmd_chat(&config, None, "local".to_string()).await,
        Some(Commands::Catalog { command }) => match command {
            CatalogCommands::Seed { file } => cmd_seed(&config, &file),
            CatalogCommands::List => cmd_list(&config),
        },
    }
}

async fn cmd_chat(config: &Config, product_id: Option<String>, user_id: String) -> Result<()> {
    println!("shelfscout v{}", env!("CARGO_PKG_VERSION"));

    let connector = GeminiConnector::new(config.model_api_key()?, &config.model.model)
        .system(SYSTEM_PROMPT);
    let connection = ConnectionManager::new(connector);

    let store = ProductStore::open(&config.catalog.db_path)?;
    let youtube = Arc::new(YoutubeClient::new(config.youtube_api_key()?));
    let (search_key, engine_id) = config.search_credentials()?;
    let search = Arc::new(SearchClient::new(search_key, engine_id));
    let scrape = Arc::new(ScrapeClient::new());
    let host = tools::standard_host(Arc::new(Mutex::new(store)), youtube, search, scrape);

    let options = TurnOptions {
        max_tool_calls: config.model.max_tool_calls,
        ..TurnOptions::default()
    };

    println!("Model: {}", config.model.model);
    if let Some(id) = &product_id {
        println!("Product context: {id}");
    }
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        let request = ChatRequest {
            message: input.to_string(),
            product_id: product_id.clone(),
            user_id: user_id.clone(),
        };
        let response = handle_chat(&connection, &host, request, options.clone()).await;
        let status = response.status();
        match response.text {
            Some(text) => println!("\n{text}\n"),
            None => eprintln!(
                "Error ({status}): {}\n",
                response.error.unwrap_or_else(|| "unknown".to_string())
            ),
        }
    }

    println!("\nSession ended.");
    Ok(())
}

fn cmd_seed(config: &Config, file: &PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(file)?;
    let products: Vec<Product> =
        serde_json::from_str(&content).map_err(|e| Error::InvalidProduct(e.to_string()))?;

    let store = ProductStore::open(&config.catalog.db_path)?;
    for product in &products {
        store.upsert(product)?;
    }
    println!(
        "Loaded {} product(s) into {}",
        products.len(),
        config.catalog.db_path
    );
    Ok(())
}

fn cmd_list(config: &Config) -> Result<()> {
    let store = ProductStore::open(&config.catalog.db_path)?;
    let ids = store.list_ids()?;
    if ids.is_empty() {
        println!("Catalog is empty.");
        return Ok(());
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

fn load_config() -> Result<Config> {
    if std::path::Path::new(CONFIG_FILE).exists() {
        Ok(Config::load(CONFIG_FILE)?)
    } else {
        Ok(Config::default())
    }
}
