//! # Analytics Report
//!
//! Prints the analytics document for the last N days as JSON.
//!
//! ## Usage
//! ```bash
//! # default window from engine.toml (30 days unless configured)
//! cargo run -p storefront-engine --bin report
//!
//! # last 7 days of a specific database
//! STOREFRONT_DB_PATH=./storefront_dev.db cargo run -p storefront-engine --bin report -- --days 7
//! ```
//!
//! Logs go to stderr (`RUST_LOG=debug` for query detail); stdout carries
//! only the JSON document.

use std::env;
use std::path::PathBuf;

use storefront_engine::{EngineConfig, Storefront};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut days: Option<i64> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--days" => {
                if i + 1 < args.len() {
                    days = Some(args[i + 1].parse()?);
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Storefront Analytics Report");
                println!();
                println!("Usage: report [OPTIONS]");
                println!();
                println!("Options:");
                println!("      --days <N>       Window length in days (default: reporting.default_days)");
                println!("  -c, --config <PATH>  engine.toml to load (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = EngineConfig::load(config_path)?;
    info!(path = %config.database.path.display(), "Opening storefront database");

    let storefront = Storefront::open(&config).await?;
    let report = match days {
        Some(days) => storefront.reports().get_analytics(days).await,
        None => storefront.reports().get_default_analytics().await,
    };
    storefront.shutdown().await?;

    println!("{}", serde_json::to_string_pretty(&report?)?);
    Ok(())
}
