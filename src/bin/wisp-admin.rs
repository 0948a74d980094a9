use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wisp::analytics::{AnalyticsAggregator, AnalyticsError};
use wisp::config::Config;
use wisp::links::create_link;
use wisp::storage;

#[derive(Parser)]
#[command(name = "wisp-admin")]
#[command(about = "Wisp link management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a short link
    Create {
        /// Absolute target URL
        url: String,
        /// Number of counted hits before the link expires
        #[arg(long)]
        max_uses: Option<i64>,
    },
    /// List all links with usage and visit counts
    List,
    /// Print the analytics summary of a link as JSON
    Stats {
        /// Short code
        code: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage = storage::connect(&config.database).await?;

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::Create { url, max_uses } => {
            let link = create_link(storage.as_ref(), &config.links, Some(&url), max_uses).await?;
            println!(
                "✓ Created '{}' -> {} ({} uses)",
                link.code, link.target_url, link.max_uses
            );
        }
        Commands::List => {
            let links = storage.list_with_visits().await?;
            if links.is_empty() {
                println!("No links");
            } else {
                println!(
                    "{:<12} {:>7} {:>5} {:>7} {:<8} TARGET",
                    "CODE", "USES", "LEFT", "VISITS", "STATE"
                );
                for entry in links {
                    let link = entry.link;
                    println!(
                        "{:<12} {:>7} {:>5} {:>7} {:<8} {}",
                        link.code,
                        format!("{}/{}", link.usage_count, link.max_uses),
                        link.remaining_uses(),
                        entry.visits,
                        if link.is_expired() { "expired" } else { "active" },
                        link.target_url
                    );
                }
            }
        }
        Commands::Stats { code } => {
            let aggregator =
                AnalyticsAggregator::new(storage, config.analytics.recent_visits_limit);
            match aggregator.summarize(&code).await {
                Ok(summary) => {
                    let json = serde_json::to_string_pretty(&summary)
                        .context("failed to serialize summary")?;
                    println!("{json}");
                }
                Err(AnalyticsError::NotFound) => {
                    anyhow::bail!("link '{}' not found", code);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}
