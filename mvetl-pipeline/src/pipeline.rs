// Pipeline orchestrator
//
// Runs the stages in order and stops at the first error; no stage ever runs
// on the input of a stage that failed. Every run is recorded in the
// etl_runs ledger with its outcome and the number of rows persisted.

use crate::catalog::{clean_catalog, load_catalog};
use crate::error::{EtlError, EtlResult, Stage};
use crate::merge::merge;
use crate::ratings::{attach_ratings, RatingChunks, RatingHistogram};
use crate::store::MovieStore;
use crate::wiki::{consolidate, filter_films, load_wiki_records, parse_wiki_table};
use chrono::{DateTime, Utc};
use mvetl_common::db::{finish_run, start_run, RunStatus};
use mvetl_common::time;
use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Inputs and options of one run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub wiki_path: PathBuf,
    pub catalog_path: PathBuf,
    pub ratings_path: PathBuf,
    /// Rating events per chunk (at least 1)
    pub chunk_size: usize,
    /// Delete existing rows from both output tables before the first write
    pub clear_tables: bool,
}

/// Outcome of one run
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub movies_written: u64,
    pub ratings_written: u64,
    /// First error, if any stage failed
    pub failure: Option<EtlError>,
}

impl RunReport {
    /// Completed, partial (rows persisted before the failure) or failed
    pub fn status(&self) -> RunStatus {
        match &self.failure {
            None => RunStatus::Completed,
            Some(_) if self.movies_written > 0 || self.ratings_written > 0 => RunStatus::Partial,
            Some(_) => RunStatus::Failed,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        self.failure.as_ref().map(EtlError::stage)
    }
}

/// Rows persisted so far; survives a failing stage
#[derive(Debug, Default)]
struct Progress {
    movies_written: u64,
    ratings_written: u64,
}

/// Run every stage and record the run in the ledger
///
/// Stage failures are reported in [`RunReport::failure`]; the `Err` case is
/// reserved for failures of the ledger itself.
pub async fn run(config: &PipelineConfig, store: &MovieStore) -> mvetl_common::Result<RunReport> {
    let run_id = Uuid::new_v4();
    let started_at = time::now();
    start_run(store.pool(), run_id, started_at).await?;
    info!(%run_id, "Starting movie ETL run");

    let mut progress = Progress::default();
    let failure = run_stages(config, store, &mut progress).await.err();

    let report = RunReport {
        run_id,
        started_at,
        ended_at: time::now(),
        movies_written: progress.movies_written,
        ratings_written: progress.ratings_written,
        failure,
    };

    let message = report.failure.as_ref().map(ToString::to_string);
    finish_run(
        store.pool(),
        run_id,
        report.ended_at,
        report.status(),
        report.failed_stage().map(|s| s.as_str()),
        message.as_deref(),
        report.movies_written as i64,
        report.ratings_written as i64,
    )
    .await?;

    log_report(&report);
    Ok(report)
}

fn log_report(report: &RunReport) {
    let elapsed = (report.ended_at - report.started_at).num_milliseconds() as f64 / 1000.0;
    match (&report.failure, report.status()) {
        (None, _) => info!(
            run_id = %report.run_id,
            movies = report.movies_written,
            ratings = report.ratings_written,
            elapsed_secs = elapsed,
            "Movie ETL run completed"
        ),
        (Some(e), RunStatus::Partial) => warn!(
            run_id = %report.run_id,
            movies = report.movies_written,
            ratings = report.ratings_written,
            stage = %e.stage(),
            "Movie ETL run partially persisted before failing: {}",
            e
        ),
        (Some(e), _) => error!(
            run_id = %report.run_id,
            stage = %e.stage(),
            "Movie ETL run failed, nothing persisted: {}",
            e
        ),
    }
}

async fn run_stages(
    config: &PipelineConfig,
    store: &MovieStore,
    progress: &mut Progress,
) -> EtlResult<()> {
    let raw = load_wiki_records(&config.wiki_path)?;
    info!(stage = %Stage::LoadWiki, records = raw.len(), "Stage complete");

    let films = filter_films(raw);
    info!(stage = %Stage::FilterWiki, records = films.len(), "Stage complete");

    let consolidated = consolidate(films);
    info!(
        stage = %Stage::ConsolidateWiki,
        records = consolidated.table.rows.len(),
        "Stage complete"
    );

    let wiki = parse_wiki_table(consolidated.table)?;
    info!(stage = %Stage::ParseWikiFields, movies = wiki.len(), "Stage complete");

    let raw_catalog = load_catalog(&config.catalog_path)?;
    info!(stage = %Stage::LoadCatalog, rows = raw_catalog.len(), "Stage complete");

    let catalog = clean_catalog(raw_catalog)?;
    info!(stage = %Stage::CleanCatalog, movies = catalog.len(), "Stage complete");

    let merged = merge(wiki, catalog);
    info!(
        stage = %Stage::Merge,
        movies = merged.movies.len(),
        anomalies = merged.anomalies,
        "Stage complete"
    );

    // Open the event stream before anything destructive happens
    let chunks = RatingChunks::open(&config.ratings_path, config.chunk_size)?;

    if config.clear_tables {
        store
            .clear_tables()
            .await
            .map_err(|e| EtlError::database(Stage::ClearTables, e))?;
        info!(stage = %Stage::ClearTables, "Stage complete");
    }

    let histogram = stream_ratings(chunks, store, progress).await?;
    info!(
        stage = %Stage::StreamRatings,
        events = histogram.event_count(),
        movies = histogram.movie_count(),
        "Stage complete"
    );

    let table = attach_ratings(merged.movies, &histogram);
    info!(stage = %Stage::AttachRatings, movies = table.rows.len(), "Stage complete");

    progress.movies_written = store
        .write_movies(&table)
        .await
        .map_err(|e| EtlError::database(Stage::PersistMovies, e))?;
    info!(
        stage = %Stage::PersistMovies,
        rows = progress.movies_written,
        "Stage complete"
    );

    Ok(())
}

/// Read, aggregate and append the rating events chunk by chunk
///
/// Chunk N+1 is not read until chunk N is committed. A failed append is
/// fatal and not retried.
async fn stream_ratings(
    chunks: RatingChunks<File>,
    store: &MovieStore,
    progress: &mut Progress,
) -> EtlResult<RatingHistogram> {
    store
        .prepare_ratings_table()
        .await
        .map_err(|e| EtlError::database(Stage::StreamRatings, e))?;

    let started = Instant::now();
    let mut histogram = RatingHistogram::new();

    for chunk in chunks {
        let chunk = chunk?;
        let from = progress.ratings_written;
        let to = from + chunk.len() as u64;
        info!(from, to, "Importing rating rows");

        histogram.absorb(&chunk);
        progress.ratings_written += store
            .append_ratings_chunk(&chunk)
            .await
            .map_err(|e| EtlError::database(Stage::StreamRatings, e))?;

        info!(
            rows = progress.ratings_written,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Rating rows imported"
        );
    }

    Ok(histogram)
}
