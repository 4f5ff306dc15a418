// Merge Resolver - wiki movies joined with catalog movies on imdb_id
//
// Inner join in wiki order, join-anomaly filter, then field-level conflict
// resolution:
//
//   Wiki field           Catalog field          Resolution
//   -------------------------------------------------------------------------
//   title                title                  catalog
//   release date         release_date           catalog
//   Language             original_language      catalog
//   Production company   production_companies   catalog
//   running time         runtime                catalog; exact 0 filled from wiki
//   budget               budget                 catalog; exact 0 filled from wiki
//   box office           revenue                catalog; exact 0 filled from wiki

use crate::catalog::CatalogMovie;
use crate::wiki::WikiMovie;
use chrono::NaiveDate;
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Output columns of the movie table, in order, with their SQLite types
///
/// Rating-count columns follow these.
pub const MOVIE_COLUMNS: [(&str, &str); 31] = [
    ("imdb_id", "TEXT"),
    ("kaggle_id", "INTEGER"),
    ("title", "TEXT"),
    ("original_title", "TEXT"),
    ("tagline", "TEXT"),
    ("belongs_to_collection", "TEXT"),
    ("wikipedia_url", "TEXT"),
    ("imdb_link", "TEXT"),
    ("runtime", "REAL"),
    ("budget", "REAL"),
    ("revenue", "REAL"),
    ("release_date", "TEXT"),
    ("popularity", "REAL"),
    ("vote_average", "REAL"),
    ("vote_count", "REAL"),
    ("genres", "TEXT"),
    ("original_language", "TEXT"),
    ("overview", "TEXT"),
    ("spoken_languages", "TEXT"),
    ("country", "TEXT"),
    ("production_companies", "TEXT"),
    ("production_countries", "TEXT"),
    ("distributor", "TEXT"),
    ("producers", "TEXT"),
    ("director", "TEXT"),
    ("starring", "TEXT"),
    ("cinematography", "TEXT"),
    ("editors", "TEXT"),
    ("writers", "TEXT"),
    ("composers", "TEXT"),
    ("based_on", "TEXT"),
];

/// One row of the merged movie table
#[derive(Debug, Clone, PartialEq)]
pub struct MergedMovie {
    pub imdb_id: String,
    pub kaggle_id: i64,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub tagline: Option<String>,
    pub belongs_to_collection: Option<String>,
    pub wikipedia_url: Option<String>,
    pub imdb_link: Option<String>,
    pub runtime: Option<f64>,
    pub budget: Option<f64>,
    pub revenue: Option<f64>,
    pub release_date: Option<NaiveDate>,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<f64>,
    pub genres: Option<String>,
    pub original_language: Option<String>,
    pub overview: Option<String>,
    pub spoken_languages: Option<String>,
    pub country: Option<String>,
    pub production_companies: Option<String>,
    pub production_countries: Option<String>,
    pub distributor: Option<String>,
    pub producers: Option<String>,
    pub director: Option<String>,
    pub starring: Option<String>,
    pub cinematography: Option<String>,
    pub editors: Option<String>,
    pub writers: Option<String>,
    pub composers: Option<String>,
    pub based_on: Option<String>,
}

/// Cell value handed to the store
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue<'a> {
    Text(Option<Cow<'a, str>>),
    Integer(Option<i64>),
    Real(Option<f64>),
}

impl MergedMovie {
    /// Values in [`MOVIE_COLUMNS`] order
    pub fn column_values(&self) -> Vec<ColumnValue<'_>> {
        use ColumnValue::{Integer, Real, Text};

        vec![
            Text(Some(Cow::Borrowed(self.imdb_id.as_str()))),
            Integer(Some(self.kaggle_id)),
            text(&self.title),
            text(&self.original_title),
            text(&self.tagline),
            text(&self.belongs_to_collection),
            text(&self.wikipedia_url),
            text(&self.imdb_link),
            Real(self.runtime),
            Real(self.budget),
            Real(self.revenue),
            Text(
                self.release_date
                    .map(|d| Cow::Owned(d.format("%Y-%m-%d").to_string())),
            ),
            Real(self.popularity),
            Real(self.vote_average),
            Real(self.vote_count),
            text(&self.genres),
            text(&self.original_language),
            text(&self.overview),
            text(&self.spoken_languages),
            text(&self.country),
            text(&self.production_companies),
            text(&self.production_countries),
            text(&self.distributor),
            text(&self.producers),
            text(&self.director),
            text(&self.starring),
            text(&self.cinematography),
            text(&self.editors),
            text(&self.writers),
            text(&self.composers),
            text(&self.based_on),
        ]
    }
}

fn text(value: &Option<String>) -> ColumnValue<'_> {
    ColumnValue::Text(value.as_deref().map(Cow::Borrowed))
}

/// Result of the merge stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub movies: Vec<MergedMovie>,
    /// Rows dropped by the release-date heuristic
    pub anomalies: usize,
    /// Wiki movies with no catalog counterpart
    pub unmatched: usize,
    /// Catalog rows ignored because an earlier row had the same imdb_id
    pub duplicate_catalog: usize,
}

/// Join-anomaly signature: wiki date after 1996-01-01 and catalog date
/// before 1965-01-01
///
/// A missing date on either side never flags the pair.
pub fn is_join_anomaly(wiki: Option<NaiveDate>, catalog: Option<NaiveDate>) -> bool {
    match (wiki, catalog) {
        (Some(w), Some(c)) => w > anomaly_bound(1996) && c < anomaly_bound(1965),
        _ => false,
    }
}

fn anomaly_bound(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Catalog value unless it is exactly zero, in which case the wiki value
fn fill_zero(catalog: Option<f64>, wiki: Option<f64>) -> Option<f64> {
    match catalog {
        Some(v) if v == 0.0 => wiki,
        other => other,
    }
}

/// Merge wiki and catalog movies
pub fn merge(wiki: Vec<WikiMovie>, catalog: Vec<CatalogMovie>) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    let mut by_imdb_id: HashMap<String, CatalogMovie> = HashMap::with_capacity(catalog.len());
    for movie in catalog {
        if by_imdb_id.contains_key(&movie.imdb_id) {
            debug!(
                imdb_id = %movie.imdb_id,
                kaggle_id = movie.kaggle_id,
                "Duplicate catalog imdb_id ignored"
            );
            outcome.duplicate_catalog += 1;
            continue;
        }
        by_imdb_id.insert(movie.imdb_id.clone(), movie);
    }
    if outcome.duplicate_catalog > 0 {
        warn!(
            duplicates = outcome.duplicate_catalog,
            "Catalog repeats imdb_ids, first row kept"
        );
    }

    for w in wiki {
        let Some(c) = by_imdb_id.remove(w.imdb_id.as_str()) else {
            outcome.unmatched += 1;
            continue;
        };

        if is_join_anomaly(w.release_date, c.release_date) {
            warn!(
                imdb_id = %w.imdb_id,
                wiki_title = w.title.as_deref().unwrap_or(""),
                catalog_title = c.title.as_deref().unwrap_or(""),
                "Dropping join anomaly"
            );
            outcome.anomalies += 1;
            continue;
        }

        outcome.movies.push(resolve(w, c));
    }

    info!(
        movies = outcome.movies.len(),
        anomalies = outcome.anomalies,
        unmatched_wiki = outcome.unmatched,
        unmatched_catalog = by_imdb_id.len(),
        "Merged wiki and catalog movies"
    );
    outcome
}

/// Apply the conflict-resolution table to one joined pair
fn resolve(w: WikiMovie, c: CatalogMovie) -> MergedMovie {
    MergedMovie {
        imdb_id: c.imdb_id,
        kaggle_id: c.kaggle_id,
        title: c.title,
        original_title: c.original_title,
        tagline: c.tagline,
        belongs_to_collection: c.belongs_to_collection,
        wikipedia_url: w.url,
        imdb_link: w.imdb_link,
        runtime: fill_zero(c.runtime, w.running_time.map(f64::from)),
        budget: fill_zero(Some(c.budget as f64), w.budget),
        revenue: fill_zero(c.revenue, w.box_office),
        release_date: c.release_date,
        popularity: c.popularity,
        vote_average: c.vote_average,
        vote_count: c.vote_count,
        genres: c.genres,
        original_language: c.original_language,
        overview: c.overview,
        spoken_languages: c.spoken_languages,
        country: w.country,
        production_companies: c.production_companies,
        production_countries: c.production_countries,
        distributor: w.distributor,
        producers: w.producers,
        director: w.director,
        starring: w.starring,
        cinematography: w.cinematography,
        editors: w.editors,
        writers: w.writers,
        composers: w.composers,
        based_on: w.based_on,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiki::ImdbId;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn wiki(id: &str) -> WikiMovie {
        let mut w = WikiMovie::new(ImdbId::parse(id).unwrap());
        w.title = Some("Wiki Title".into());
        w.director = Some("Director".into());
        w
    }

    fn catalog(id: &str, kaggle_id: i64) -> CatalogMovie {
        CatalogMovie {
            kaggle_id,
            imdb_id: id.to_string(),
            video: false,
            budget: 1_000,
            popularity: Some(1.5),
            release_date: date(2000, 1, 1),
            runtime: Some(100.0),
            revenue: Some(5_000.0),
            vote_average: None,
            vote_count: None,
            title: Some("Catalog Title".into()),
            original_title: None,
            tagline: None,
            belongs_to_collection: None,
            genres: None,
            original_language: Some("en".into()),
            overview: None,
            spoken_languages: None,
            production_companies: None,
            production_countries: None,
        }
    }

    #[test]
    fn test_anomaly_dropped() {
        let mut w = wiki("tt0000001");
        w.release_date = date(2000, 1, 1);
        let mut c = catalog("tt0000001", 1);
        c.release_date = date(1960, 1, 1);

        let outcome = merge(vec![w], vec![c]);
        assert!(outcome.movies.is_empty());
        assert_eq!(outcome.anomalies, 1);
    }

    #[test]
    fn test_anomaly_bounds() {
        assert!(!is_join_anomaly(date(1996, 1, 1), date(1960, 1, 1)));
        assert!(!is_join_anomaly(date(2000, 1, 1), date(1965, 1, 1)));
        assert!(!is_join_anomaly(None, date(1960, 1, 1)));
        assert!(is_join_anomaly(date(1996, 1, 2), date(1964, 12, 31)));
    }

    #[test]
    fn test_zero_runtime_filled_from_wiki() {
        let mut w = wiki("tt0000001");
        w.running_time = Some(120);
        let mut c = catalog("tt0000001", 1);
        c.runtime = Some(0.0);

        let outcome = merge(vec![w], vec![c]);
        assert_eq!(outcome.movies[0].runtime, Some(120.0));
    }

    #[test]
    fn test_zero_budget_and_revenue_filled_from_wiki() {
        let mut w = wiki("tt0000001");
        w.budget = Some(11_000_000.0);
        w.box_office = None;
        let mut c = catalog("tt0000001", 1);
        c.budget = 0;
        c.revenue = Some(0.0);

        let outcome = merge(vec![w], vec![c]);
        let m = &outcome.movies[0];
        assert_eq!(m.budget, Some(11_000_000.0));
        // Zero replaced by a missing wiki value stays missing
        assert_eq!(m.revenue, None);
    }

    #[test]
    fn test_catalog_value_kept_when_nonzero() {
        let mut w = wiki("tt0000001");
        w.running_time = Some(999);
        w.budget = Some(1.0);
        let outcome = merge(vec![w], vec![catalog("tt0000001", 1)]);
        let m = &outcome.movies[0];
        assert_eq!(m.runtime, Some(100.0));
        assert_eq!(m.budget, Some(1_000.0));
        assert_eq!(m.title.as_deref(), Some("Catalog Title"));
        assert_eq!(m.director.as_deref(), Some("Director"));
        assert_eq!(m.original_language.as_deref(), Some("en"));
    }

    #[test]
    fn test_inner_join_keeps_wiki_order_and_first_catalog_row() {
        let outcome = merge(
            vec![wiki("tt0000002"), wiki("tt0000009"), wiki("tt0000001")],
            vec![
                catalog("tt0000001", 10),
                catalog("tt0000002", 20),
                catalog("tt0000002", 21),
                catalog("tt0000003", 30),
            ],
        );
        let ids: Vec<i64> = outcome.movies.iter().map(|m| m.kaggle_id).collect();
        assert_eq!(ids, vec![20, 10]);
        assert_eq!(outcome.unmatched, 1);
        assert_eq!(outcome.duplicate_catalog, 1);
    }

    #[test]
    fn test_column_values_follow_schema() {
        let mut c = catalog("tt0000001", 7);
        c.release_date = date(1995, 10, 30);
        let outcome = merge(vec![wiki("tt0000001")], vec![c]);
        let m = &outcome.movies[0];
        let values = m.column_values();
        assert_eq!(values.len(), MOVIE_COLUMNS.len());
        assert_eq!(values[1], ColumnValue::Integer(Some(7)));
        assert_eq!(MOVIE_COLUMNS[11].0, "release_date");
        assert_eq!(values[11], ColumnValue::Text(Some(Cow::Borrowed("1995-10-30"))));
    }
}
