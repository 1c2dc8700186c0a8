//! Barvault CLI: fetch artifacts and inspect cache decisions.
//!
//! Commands:
//! - `fetch`: fetch one or more artifact keys (in parallel), downloading as needed
//! - `window`: print the UTC window a download of a key would cover
//! - `check`: print whether fetching a key would consult the downloader

use anyhow::{Context, Result};
use barvault_core::{DownloaderDataProvider, DownloaderRegistry, ProviderConfig};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "barvault",
    about = "Barvault: fetch-once cache for historical market data"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "barvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch artifacts, downloading missing or stale ones.
    Fetch {
        /// Artifact keys (e.g., equity/usa/daily/spy_trade.parquet).
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Print the UTC window a download of this key would cover.
    Window {
        key: String,

        /// Evaluate as of this instant (RFC 3339). Defaults to now.
        #[arg(long)]
        now: Option<String>,
    },
    /// Print whether fetching this key would trigger a download.
    Check {
        key: String,

        /// Evaluate as of this instant (RFC 3339). Defaults to now.
        #[arg(long)]
        now: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let provider = load_provider(&cli.config)?;

    match cli.command {
        Commands::Fetch { keys } => run_fetch(&provider, &keys),
        Commands::Window { key, now } => run_window(&provider, &key, parse_now(now.as_deref())?),
        Commands::Check { key, now } => run_check(&provider, &key, parse_now(now.as_deref())?),
    }
}

fn load_provider(config_path: &Path) -> Result<DownloaderDataProvider> {
    tracing::debug!(config = %config_path.display(), "loading config");
    let config = ProviderConfig::from_file(config_path)?;
    let registry = DownloaderRegistry::with_builtins();
    Ok(DownloaderDataProvider::from_config(&config, &registry)?)
}

fn parse_now(now: Option<&str>) -> Result<DateTime<Utc>> {
    match now {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid --now '{s}'"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

fn run_fetch(provider: &DownloaderDataProvider, keys: &[String]) -> Result<()> {
    let results: Vec<(&String, Option<u64>)> = keys
        .par_iter()
        .map(|key| {
            let size = provider
                .fetch(key)
                .and_then(|file| file.metadata().ok())
                .map(|meta| meta.len());
            (key, size)
        })
        .collect();

    let mut unavailable = 0;
    for (key, size) in &results {
        match size {
            Some(bytes) => println!(
                "{key}: {} ({bytes} bytes)",
                provider.artifact_path(key).display()
            ),
            None => {
                unavailable += 1;
                println!("{key}: unavailable");
            }
        }
    }
    println!(
        "\n{}/{} artifacts available",
        results.len() - unavailable,
        results.len()
    );

    if unavailable > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_window(provider: &DownloaderDataProvider, key: &str, now: DateTime<Utc>) -> Result<()> {
    let artifact = provider.parse_key(key)?;
    println!("Artifact: {artifact}");
    match provider.window(key, now)? {
        Some(window) => {
            println!("Window:   {window}");
            println!("Span:     {} hours", window.duration().num_hours());
        }
        None => println!("Window:   none (no complete data to download yet)"),
    }
    Ok(())
}

fn run_check(provider: &DownloaderDataProvider, key: &str, now: DateTime<Utc>) -> Result<()> {
    let path = provider.artifact_path(key);
    let verdict = if provider.needs_fetch(key, now) {
        "download"
    } else {
        "serve from disk"
    };
    println!("{}: {verdict}", path.display());
    Ok(())
}
