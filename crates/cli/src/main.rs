//! Dropship relay CLI - request signing and catalog tools.
//!
//! # Usage
//!
//! ```bash
//! # Print a signed gateway URL
//! relay-cli sign --method aliexpress.affiliate.product.query --param keywords=lamp
//!
//! # Run the search pipeline and print the JSON the API would return
//! relay-cli search "phone case" --min-price 5 --max-price 20
//! ```
//!
//! # Commands
//!
//! - `sign` - Sign an affiliate API call with the configured credentials
//! - `search` - Run a catalog search end to end

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(author, version, about = "Dropship relay CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a signed affiliate API request URL
    Sign {
        /// API method, e.g. `aliexpress.affiliate.product.query`
        #[arg(short, long)]
        method: String,

        /// Business parameter as `key=value` (repeatable)
        #[arg(short, long = "param", value_parser = commands::sign::parse_param)]
        params: Vec<(String, String)>,

        /// Timestamp in milliseconds (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,
    },
    /// Search the catalog and print results as JSON
    Search {
        /// Search keywords
        keywords: String,

        /// Only keep products in this category
        #[arg(long)]
        category_id: Option<String>,

        /// Minimum marked-up price (inclusive)
        #[arg(long)]
        min_price: Option<String>,

        /// Maximum marked-up price (inclusive)
        #[arg(long)]
        max_price: Option<String>,

        /// Page number (1-based)
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Sign {
            method,
            params,
            timestamp,
        } => commands::sign::run(&method, params, timestamp)?,
        Commands::Search {
            keywords,
            category_id,
            min_price,
            max_price,
            page,
        } => {
            commands::search::run(commands::search::SearchArgs {
                keywords,
                category_id,
                min_price,
                max_price,
                page,
            })
            .await?;
        }
    }
    Ok(())
}
