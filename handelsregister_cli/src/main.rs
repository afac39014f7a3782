mod commands;
mod input;
mod logging;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "handelsregister")]
#[command(about = "Look up legal entities in the German common register portal")]
struct Cli {
    /// Portal base URL (defaults to HANDELSREGISTER_BASE_URL or the production portal)
    #[arg(long, global = true, hide = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the entities of an input CSV file and write their register data
    Scrape(commands::scrape::ScrapeArgs),
    /// List the registry courts known to the portal
    Courts(commands::courts::CourtsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Scrape(args) => {
            let _guards = logging::init(Some(args.target.as_path()))?;
            commands::scrape::run(args, cli.base_url.as_deref()).await?
        }
        Commands::Courts(args) => {
            let _guards = logging::init(None)?;
            commands::courts::run(args, cli.base_url.as_deref()).await?
        }
    }

    Ok(())
}
