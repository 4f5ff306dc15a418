//! Run ledger
//!
//! One row per pipeline run so that a partially loaded database can be told
//! apart from a fully loaded one after the fact.

use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Run started, not finished yet (or the process died)
    Running,
    /// Every stage succeeded
    Completed,
    /// A stage failed after some rows were persisted
    Partial,
    /// A stage failed before anything was persisted
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "partial" => Some(RunStatus::Partial),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// Ledger row
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub failed_stage: Option<String>,
    pub message: Option<String>,
    pub movies_written: i64,
    pub ratings_written: i64,
}

/// Record the start of a run
pub async fn start_run(pool: &SqlitePool, run_id: Uuid, started_at: DateTime<Utc>) -> Result<()> {
    sqlx::query("INSERT INTO etl_runs (run_id, started_at, status) VALUES (?, ?, ?)")
        .bind(run_id.to_string())
        .bind(started_at.to_rfc3339())
        .bind(RunStatus::Running.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

/// Record the outcome of a run
#[allow(clippy::too_many_arguments)]
pub async fn finish_run(
    pool: &SqlitePool,
    run_id: Uuid,
    ended_at: DateTime<Utc>,
    status: RunStatus,
    failed_stage: Option<&str>,
    message: Option<&str>,
    movies_written: i64,
    ratings_written: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE etl_runs
        SET ended_at = ?, status = ?, failed_stage = ?, message = ?,
            movies_written = ?, ratings_written = ?
        WHERE run_id = ?
        "#,
    )
    .bind(ended_at.to_rfc3339())
    .bind(status.as_str())
    .bind(failed_stage)
    .bind(message)
    .bind(movies_written)
    .bind(ratings_written)
    .bind(run_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Load a run from the ledger
pub async fn load_run(pool: &SqlitePool, run_id: Uuid) -> Result<Option<RunRecord>> {
    let row = sqlx::query(
        r#"
        SELECT run_id, started_at, ended_at, status, failed_stage, message,
               movies_written, ratings_written
        FROM etl_runs
        WHERE run_id = ?
        "#,
    )
    .bind(run_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let status_str: String = row.get("status");
    let status = RunStatus::parse(&status_str).ok_or_else(|| {
        crate::Error::Internal(format!("Unknown run status in ledger: {}", status_str))
    })?;

    Ok(Some(RunRecord {
        run_id,
        started_at: parse_timestamp(row.get("started_at"))?,
        ended_at: row
            .get::<Option<String>, _>("ended_at")
            .map(parse_timestamp)
            .transpose()?,
        status,
        failed_stage: row.get("failed_stage"),
        message: row.get("message"),
        movies_written: row.get("movies_written"),
        ratings_written: row.get("ratings_written"),
    }))
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| crate::Error::Internal(format!("Invalid timestamp in ledger: {}", e)))
}
