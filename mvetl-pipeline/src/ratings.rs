//! Ratings Aggregator
//!
//! The rating-event stream is read in bounded chunks ([`RatingChunks`]); each
//! chunk is folded into a per-movie histogram ([`RatingHistogram`]) and then
//! appended to storage before the next chunk is read. The histogram is
//! left-joined onto the merged movies once the stream is exhausted.

use crate::error::{EtlError, EtlResult, Stage};
use crate::merge::MergedMovie;
use chrono::{DateTime, Utc};
use mvetl_common::time::from_unix_seconds;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Rating value as an exact fixed-point key (thousandths)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RatingValue(u32);

impl RatingValue {
    /// Parse a non-negative decimal such as "4", "3.5" or "4.0"
    pub fn parse(text: &str) -> Option<Self> {
        let value: f64 = text.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) / 1000.0 {
            return None;
        }
        Some(RatingValue((value * 1000.0).round() as u32))
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 1000.0
    }

    /// Output column holding the count for this value (`rating_3.5`)
    pub fn column_name(self) -> String {
        format!("rating_{}", self)
    }
}

impl fmt::Display for RatingValue {
    /// Shortest decimal rendering: 5000 -> "5", 3500 -> "3.5", 250 -> "0.25"
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 1000;
        let frac = self.0 % 1000;
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            let digits = format!("{:03}", frac);
            write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
        }
    }
}

/// One rating event
#[derive(Debug, Clone, PartialEq)]
pub struct RatingEvent {
    pub user_id: Option<i64>,
    pub movie_id: i64,
    pub rating: RatingValue,
    pub timestamp: DateTime<Utc>,
}

/// Header positions of the rating columns
#[derive(Debug, Clone, Copy)]
struct RatingColumns {
    user_id: Option<usize>,
    movie_id: usize,
    rating: usize,
    timestamp: usize,
}

/// Bounded-memory iterator over the rating-event stream
///
/// Yields chunks of at most `chunk_size` events. The first error ends the
/// iteration.
pub struct RatingChunks<R: Read> {
    reader: csv::Reader<R>,
    columns: RatingColumns,
    chunk_size: usize,
    record: csv::StringRecord,
    records_read: u64,
    done: bool,
}

impl RatingChunks<File> {
    /// Open the rating-event CSV
    pub fn open(path: &Path, chunk_size: usize) -> EtlResult<Self> {
        let file = File::open(path).map_err(|source| EtlError::Read {
            stage: Stage::StreamRatings,
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, chunk_size)
    }
}

impl<R: Read> RatingChunks<R> {
    /// Wrap any reader; the header is read and checked immediately
    pub fn from_reader(reader: R, chunk_size: usize) -> EtlResult<Self> {
        let mut reader = csv::ReaderBuilder::new().from_reader(reader);
        let headers = reader.headers().map_err(|e| format_error(&e))?;

        let position = |name: &str| headers.iter().position(|h| h == name);
        let required = |name: &str| {
            position(name).ok_or_else(|| EtlError::MissingColumn {
                stage: Stage::StreamRatings,
                table: "ratings",
                column: name.to_string(),
            })
        };

        let columns = RatingColumns {
            user_id: position("userId"),
            movie_id: required("movieId")?,
            rating: required("rating")?,
            timestamp: required("timestamp")?,
        };

        Ok(Self {
            reader,
            columns,
            chunk_size: chunk_size.max(1),
            record: csv::StringRecord::new(),
            records_read: 0,
            done: false,
        })
    }

    fn parse_record(&self) -> EtlResult<RatingEvent> {
        let record = self.records_read;
        let field = |index: usize| self.record.get(index).unwrap_or("").trim();
        let invalid = |column: &str, value: &str| EtlError::InvalidValue {
            stage: Stage::StreamRatings,
            column: column.to_string(),
            record,
            value: value.to_string(),
        };

        let user_id = match self.columns.user_id.map(field) {
            None | Some("") => None,
            Some(v) => Some(v.parse::<i64>().map_err(|_| invalid("userId", v))?),
        };

        let movie_text = field(self.columns.movie_id);
        let movie_id = movie_text
            .parse::<i64>()
            .map_err(|_| invalid("movieId", movie_text))?;

        let rating_text = field(self.columns.rating);
        let rating = RatingValue::parse(rating_text).ok_or_else(|| invalid("rating", rating_text))?;

        let ts_text = field(self.columns.timestamp);
        let timestamp = ts_text
            .parse::<i64>()
            .ok()
            .and_then(from_unix_seconds)
            .ok_or_else(|| invalid("timestamp", ts_text))?;

        Ok(RatingEvent {
            user_id,
            movie_id,
            rating,
            timestamp,
        })
    }
}

impl<R: Read> Iterator for RatingChunks<R> {
    type Item = EtlResult<Vec<RatingEvent>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut chunk = Vec::with_capacity(self.chunk_size.min(64 * 1024));
        while chunk.len() < self.chunk_size {
            match self.reader.read_record(&mut self.record) {
                Ok(true) => {
                    self.records_read += 1;
                    match self.parse_record() {
                        Ok(event) => chunk.push(event),
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    }
                }
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(format_error(&e)));
                }
            }
        }

        if chunk.is_empty() {
            None
        } else {
            Some(Ok(chunk))
        }
    }
}

fn format_error(e: &csv::Error) -> EtlError {
    EtlError::Format {
        stage: Stage::StreamRatings,
        what: "ratings CSV",
        message: e.to_string(),
    }
}

/// Per-movie event counts by rating value
#[derive(Debug, Clone, Default)]
pub struct RatingHistogram {
    counts: HashMap<i64, BTreeMap<RatingValue, u64>>,
    values: BTreeSet<RatingValue>,
    events: u64,
}

impl RatingHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a chunk of events into the counts
    pub fn absorb(&mut self, events: &[RatingEvent]) {
        for event in events {
            *self
                .counts
                .entry(event.movie_id)
                .or_default()
                .entry(event.rating)
                .or_default() += 1;
            self.values.insert(event.rating);
        }
        self.events += events.len() as u64;
    }

    /// Every rating value observed, ascending
    pub fn values(&self) -> Vec<RatingValue> {
        self.values.iter().copied().collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.values.iter().map(|v| v.column_name()).collect()
    }

    /// Counts for one movie in [`values`](Self::values) order, zero-filled
    pub fn counts_for(&self, movie_id: i64) -> Vec<u64> {
        let movie = self.counts.get(&movie_id);
        self.values
            .iter()
            .map(|v| movie.and_then(|m| m.get(v)).copied().unwrap_or(0))
            .collect()
    }

    pub fn movie_count(&self) -> usize {
        self.counts.len()
    }

    pub fn event_count(&self) -> u64 {
        self.events
    }
}

/// Merged movie with its rating counts
#[derive(Debug, Clone, PartialEq)]
pub struct RatedMovie {
    pub movie: MergedMovie,
    /// Aligned with [`RatedMovieTable::rating_values`]
    pub counts: Vec<u64>,
}

/// Final movie table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatedMovieTable {
    pub rating_values: Vec<RatingValue>,
    pub rows: Vec<RatedMovie>,
}

impl RatedMovieTable {
    pub fn rating_columns(&self) -> Vec<String> {
        self.rating_values.iter().map(|v| v.column_name()).collect()
    }
}

/// Left-join the histogram onto the movies by `kaggle_id`
pub fn attach_ratings(movies: Vec<MergedMovie>, histogram: &RatingHistogram) -> RatedMovieTable {
    let rating_values = histogram.values();
    let mut rated = 0usize;

    let rows: Vec<RatedMovie> = movies
        .into_iter()
        .map(|movie| {
            let counts = histogram.counts_for(movie.kaggle_id);
            if counts.iter().any(|&c| c > 0) {
                rated += 1;
            }
            RatedMovie { movie, counts }
        })
        .collect();

    info!(
        movies = rows.len(),
        rated,
        rating_columns = rating_values.len(),
        "Attached rating counts"
    );

    RatedMovieTable {
        rating_values,
        rows,
    }
}
