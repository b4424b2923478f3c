//! pubsync - scheduled publication list updater
//!
//! Fetches an author's publications from Google Scholar (via SerpAPI),
//! enriches missing DOIs from Crossref, merges with the saved list so curated
//! `doi`/`pdf` fields survive, and rewrites `data/publications.json`.
//!
//! Designed to run unattended from a scheduler; every flag has a default and
//! the only required input is the `SERPAPI_KEY` environment variable.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use pubsync::{
    crossref::CrossrefClient,
    merge::{index_by_title, merge, DoiForm},
    serpapi::ScholarClient,
    store::PublicationStore,
    PubsyncError,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the SerpAPI credential
const API_KEY_VAR: &str = "SERPAPI_KEY";

/// Sync a Google Scholar author profile into a curated publications JSON file
#[derive(Parser)]
#[command(name = "pubsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Google Scholar author profile ID
    #[arg(long, default_value = "UdIP7WoAAAAJ")]
    author_id: String,

    /// Path of the persisted publication list
    #[arg(short, long, default_value = "data/publications.json")]
    output: PathBuf,

    /// Canonical on-disk DOI form
    #[arg(long, default_value = "url", value_parser = ["url", "bare"])]
    doi_form: String,

    /// Minimum delay between Crossref lookups, in milliseconds
    #[arg(long, default_value = "1000")]
    delay_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let doi_form = match cli.doi_form.as_str() {
        "bare" => DoiForm::Bare,
        _ => DoiForm::Url,
    };

    // Credential check comes before any I/O side effect.
    let api_key = std::env::var(API_KEY_VAR).map_err(|_| {
        PubsyncError::Config(format!("{} not set in the environment", API_KEY_VAR))
    })?;

    let store = PublicationStore::new(&cli.output);
    let previous = index_by_title(store.load(doi_form));
    info!(previous = previous.len(), "Loaded previous publication set");

    // A fetch failure aborts here, before the saved file is touched.
    let scholar = ScholarClient::new(api_key)?;
    let fetched = scholar
        .fetch_author(&cli.author_id)
        .await
        .context("Failed to fetch author publications")?;

    let resolver = CrossrefClient::new(Duration::from_millis(cli.delay_ms))?;
    let merged = merge(&fetched, &previous, &resolver, doi_form).await;

    store.save(&merged)?;

    println!(
        "✓ Updated {} publications at {}",
        merged.len(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}
