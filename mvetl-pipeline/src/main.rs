//! mvetl - movie metadata and ratings ETL
//!
//! Loads the encyclopedia extraction, the catalog export and the rating
//! events, and writes the merged movie table and the ratings table into a
//! SQLite database. Exits non-zero unless every stage completed.

use anyhow::{Context, Result};
use clap::Parser;
use mvetl_common::config::load_config;
use mvetl_common::db::init_database;
use mvetl_pipeline::{run, CliArgs, MovieStore, Settings};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();

    let toml = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let settings = Settings::resolve(&cli, &toml).context("Invalid configuration")?;

    // RUST_LOG overrides the configured level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting mvetl {}", env!("CARGO_PKG_VERSION"));
    info!("Wiki source: {}", settings.wiki_path.display());
    info!("Catalog source: {}", settings.catalog_path.display());
    info!("Ratings source: {}", settings.ratings_path.display());
    info!("Database: {}", settings.database_path.display());

    let pool = init_database(&settings.database_path)
        .await
        .context("Failed to open database")?;
    let store = MovieStore::new(pool, &settings.movies_table, &settings.ratings_table)?;

    let report = run(&settings.pipeline_config(), &store)
        .await
        .context("Failed to record run in ledger")?;

    store.pool().close().await;

    if let Some(failure) = &report.failure {
        anyhow::bail!(
            "run {} {} ({} movies, {} ratings written): {}",
            report.run_id,
            report.status().as_str(),
            report.movies_written,
            report.ratings_written,
            failure
        );
    }

    Ok(())
}
