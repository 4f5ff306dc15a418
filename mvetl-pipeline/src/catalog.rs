//! Catalog export (tabular movie metadata)
//!
//! Loading keeps every cell as optional text; cleaning drops adult titles
//! and types the numeric, boolean and date columns.

use crate::error::{EtlError, EtlResult, Stage};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Header columns the cleaning step depends on
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "adult",
    "video",
    "budget",
    "id",
    "popularity",
    "release_date",
    "imdb_id",
];

/// One catalog row as text; absent or empty cells are `None`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCatalogRow {
    pub adult: Option<String>,
    pub video: Option<String>,
    pub budget: Option<String>,
    pub id: Option<String>,
    pub popularity: Option<String>,
    pub release_date: Option<String>,
    pub imdb_id: Option<String>,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub tagline: Option<String>,
    pub belongs_to_collection: Option<String>,
    pub runtime: Option<String>,
    pub revenue: Option<String>,
    pub vote_average: Option<String>,
    pub vote_count: Option<String>,
    pub genres: Option<String>,
    pub original_language: Option<String>,
    pub overview: Option<String>,
    pub spoken_languages: Option<String>,
    pub production_companies: Option<String>,
    pub production_countries: Option<String>,
}

/// Cleaned catalog row
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMovie {
    pub kaggle_id: i64,
    pub imdb_id: String,
    pub video: bool,
    pub budget: i64,
    pub popularity: Option<f64>,
    pub release_date: Option<NaiveDate>,
    pub runtime: Option<f64>,
    pub revenue: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<f64>,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub tagline: Option<String>,
    pub belongs_to_collection: Option<String>,
    pub genres: Option<String>,
    pub original_language: Option<String>,
    pub overview: Option<String>,
    pub spoken_languages: Option<String>,
    pub production_companies: Option<String>,
    pub production_countries: Option<String>,
}

/// Read the catalog CSV
pub fn load_catalog(path: &Path) -> EtlResult<Vec<RawCatalogRow>> {
    let file = File::open(path).map_err(|source| EtlError::Read {
        stage: Stage::LoadCatalog,
        path: path.to_path_buf(),
        source,
    })?;
    read_catalog(file)
}

/// Read catalog rows from any reader
pub fn read_catalog<R: Read>(reader: R) -> EtlResult<Vec<RawCatalogRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().map_err(|e| format_error(&e))?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(EtlError::MissingColumn {
                stage: Stage::LoadCatalog,
                table: "catalog",
                column: column.to_string(),
            });
        }
    }

    let rows = rdr
        .deserialize()
        .collect::<Result<Vec<RawCatalogRow>, _>>()
        .map_err(|e| format_error(&e))?;

    info!(rows = rows.len(), "Loaded catalog rows");
    Ok(rows)
}

fn format_error(e: &csv::Error) -> EtlError {
    EtlError::Format {
        stage: Stage::LoadCatalog,
        what: "catalog CSV",
        message: e.to_string(),
    }
}

/// Drop adult titles and type the remaining rows
///
/// # Errors
/// `InvalidValue` when `budget`, `id`, `popularity` or `release_date` hold
/// text that is not of their type. `record` is the 1-based data row.
pub fn clean_catalog(rows: Vec<RawCatalogRow>) -> EtlResult<Vec<CatalogMovie>> {
    let total = rows.len();
    let mut adult = 0usize;
    let mut without_imdb_id = 0usize;
    let mut movies = Vec::with_capacity(total);

    for (index, row) in rows.into_iter().enumerate() {
        let record = index as u64 + 1;

        if row.adult.as_deref() != Some("False") {
            adult += 1;
            continue;
        }

        let budget = required_int("budget", record, row.budget.as_deref())?;
        let kaggle_id = required_int("id", record, row.id.as_deref())?;
        let popularity = strict_number("popularity", record, row.popularity.as_deref())?;
        let release_date = strict_date("release_date", record, row.release_date.as_deref())?;

        let Some(imdb_id) = row.imdb_id.filter(|id| !id.trim().is_empty()) else {
            debug!(record, kaggle_id, "Catalog row without imdb_id skipped");
            without_imdb_id += 1;
            continue;
        };

        movies.push(CatalogMovie {
            kaggle_id,
            imdb_id: imdb_id.trim().to_string(),
            video: row.video.as_deref() == Some("True"),
            budget,
            popularity,
            release_date,
            runtime: lenient_number(row.runtime.as_deref()),
            revenue: lenient_number(row.revenue.as_deref()),
            vote_average: lenient_number(row.vote_average.as_deref()),
            vote_count: lenient_number(row.vote_count.as_deref()),
            title: row.title,
            original_title: row.original_title,
            tagline: row.tagline,
            belongs_to_collection: row.belongs_to_collection,
            genres: row.genres,
            original_language: row.original_language,
            overview: row.overview,
            spoken_languages: row.spoken_languages,
            production_companies: row.production_companies,
            production_countries: row.production_countries,
        });
    }

    info!(
        movies = movies.len(),
        adult_or_flagged = adult,
        without_imdb_id,
        total,
        "Cleaned catalog"
    );
    Ok(movies)
}

fn invalid(column: &str, record: u64, value: Option<&str>) -> EtlError {
    EtlError::InvalidValue {
        stage: Stage::CleanCatalog,
        column: column.to_string(),
        record,
        value: value.unwrap_or_default().to_string(),
    }
}

fn required_int(column: &str, record: u64, value: Option<&str>) -> EtlResult<i64> {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or_else(|| invalid(column, record, value))
}

fn strict_number(column: &str, record: u64, value: Option<&str>) -> EtlResult<Option<f64>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(column, record, value)),
    }
}

fn strict_date(column: &str, record: u64, value: Option<&str>) -> EtlResult<Option<NaiveDate>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| invalid(column, record, value)),
    }
}

fn lenient_number(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| v.trim().parse::<f64>().ok())
}
