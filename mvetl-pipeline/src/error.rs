//! Error types for the movie ETL pipeline
//!
//! Every variant records the [`Stage`] it came from so a failed run reports
//! which logical step broke and why.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Logical pipeline steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    LoadWiki,
    FilterWiki,
    ConsolidateWiki,
    ParseWikiFields,
    LoadCatalog,
    CleanCatalog,
    Merge,
    ClearTables,
    StreamRatings,
    AttachRatings,
    PersistMovies,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::LoadWiki => "load_wiki",
            Stage::FilterWiki => "filter_wiki",
            Stage::ConsolidateWiki => "consolidate_wiki",
            Stage::ParseWikiFields => "parse_wiki_fields",
            Stage::LoadCatalog => "load_catalog",
            Stage::CleanCatalog => "clean_catalog",
            Stage::Merge => "merge",
            Stage::ClearTables => "clear_tables",
            Stage::StreamRatings => "stream_ratings",
            Stage::AttachRatings => "attach_ratings",
            Stage::PersistMovies => "persist_movies",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline error
#[derive(Debug, Error)]
pub enum EtlError {
    /// Source file could not be opened or read
    #[error("[{stage}] failed to read {}: {source}", path.display())]
    Read {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source document is not in the expected container format
    #[error("[{stage}] malformed {what}: {message}")]
    Format {
        stage: Stage,
        what: &'static str,
        message: String,
    },

    /// An expected column is absent from a source table
    #[error("[{stage}] missing column '{column}' in {table}")]
    MissingColumn {
        stage: Stage,
        table: &'static str,
        column: String,
    },

    /// A value in a strictly typed column could not be converted
    #[error("[{stage}] invalid value {value:?} in column '{column}' at record {record}")]
    InvalidValue {
        stage: Stage,
        column: String,
        record: u64,
        value: String,
    },

    /// Persistence failure (not retried)
    #[error("[{stage}] database error: {source}")]
    Database {
        stage: Stage,
        #[source]
        source: mvetl_common::Error,
    },
}

impl EtlError {
    /// Stage in which the error occurred
    pub fn stage(&self) -> Stage {
        match self {
            EtlError::Read { stage, .. }
            | EtlError::Format { stage, .. }
            | EtlError::MissingColumn { stage, .. }
            | EtlError::InvalidValue { stage, .. }
            | EtlError::Database { stage, .. } => *stage,
        }
    }

    pub(crate) fn database(stage: Stage, source: impl Into<mvetl_common::Error>) -> Self {
        EtlError::Database {
            stage,
            source: source.into(),
        }
    }
}

/// Result type for pipeline stages
pub type EtlResult<T> = Result<T, EtlError>;
