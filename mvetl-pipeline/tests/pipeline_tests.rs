//! End-to-end pipeline tests against fixture files and a scratch database

use mvetl_common::db::{init_database, load_run, RunStatus, SchemaSync};
use mvetl_pipeline::{run, EtlError, MovieStore, PipelineConfig, Stage};
use sqlx::Row;
use std::path::Path;
use tempfile::TempDir;

const WIKI: &str = r#"[
  {
    "title": "Alpha",
    "url": "https://en.wikipedia.org/wiki/Alpha",
    "imdb_link": "https://www.imdb.com/title/tt0000001/",
    "Directed by": "Ann Director",
    "Box office": "$1.5 million",
    "Budget": "$2 million[1]",
    "Release date": ["March 1, 1999", "(United States)"],
    "Running time": "100 minutes",
    "Country": "United States",
    "Starring": ["Lead One", "Lead Two"],
    "Language": "English",
    "French": "Alpha (fr)"
  },
  {
    "title": "Beta",
    "url": "https://en.wikipedia.org/wiki/Beta",
    "imdb_link": "https://www.imdb.com/title/tt0000002/",
    "Director": "Ben Director",
    "Box office": "$4 million",
    "Budget": "$1 million",
    "Release date": "2000",
    "Running time": "90 min"
  },
  {
    "title": "Gamma",
    "url": "https://en.wikipedia.org/wiki/Gamma",
    "imdb_link": "https://www.imdb.com/title/tt0000003/",
    "Directed by": "Cat Director",
    "Box office": "$10 million",
    "Budget": "$3,500,000",
    "Release date": "2005-06-01",
    "Running time": "2 hours",
    "Country": "France"
  },
  {
    "title": "Alpha Again",
    "imdb_link": "https://www.imdb.com/title/tt0000001/",
    "Directed by": "Someone Else",
    "Budget": "$99 million"
  },
  {
    "title": "A Series",
    "imdb_link": "https://www.imdb.com/title/tt0000009/",
    "Directed by": "Show Runner",
    "No. of episodes": "22"
  }
]"#;

const CATALOG: &str = "\
adult,belongs_to_collection,budget,genres,id,imdb_id,original_language,original_title,overview,popularity,release_date,revenue,runtime,title,video,vote_average,vote_count
False,,1000,,11,tt0000001,en,Alpha,,1.5,1999-03-01,0,95,Alpha,False,7.0,10
False,,5000,,12,tt0000002,en,Beta,,2.0,1960-01-01,100,90,Beta,False,6.0,5
False,,0,,13,tt0000003,fr,Gamma,,3.0,2005-06-01,2000,0,Gamma,False,5.0,3
False,,0,,14,tt0000004,en,Delta,,1.0,2010-01-01,0,80,Delta,False,,
True,,0,,15,tt0000005,en,Adult,,1.0,2010-01-01,0,80,Adult,False,,
";

const RATINGS: &str = "\
userId,movieId,rating,timestamp
1,11,5.0,1425941529
2,11,5.0,1425941530
3,11,3.0,1425941531
1,13,4.5,1425941532
4,99,1.0,1425941533
5,12,3.0,1425941534
";

struct Fixture {
    _dir: TempDir,
    config: PipelineConfig,
    store: MovieStore,
}

async fn fixture(wiki: &str, catalog: &str, ratings: &str, chunk_size: usize) -> Fixture {
    let dir = TempDir::new().unwrap();
    let write = |name: &str, content: &str| {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    };

    let config = PipelineConfig {
        wiki_path: write("wikipedia.movies.json", wiki),
        catalog_path: write("movies_metadata.csv", catalog),
        ratings_path: write("ratings.csv", ratings),
        chunk_size,
        clear_tables: false,
    };

    let pool = init_database(&dir.path().join("movie_data.db")).await.unwrap();
    let store = MovieStore::new(pool, "movies", "ratings").unwrap();

    Fixture {
        _dir: dir,
        config,
        store,
    }
}

async fn count(store: &MovieStore, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_full_run_writes_merged_movies_and_ratings() {
    let f = fixture(WIKI, CATALOG, RATINGS, 2).await;

    let report = run(&f.config, &f.store).await.unwrap();
    assert!(report.is_complete(), "run failed: {:?}", report.failure);
    assert_eq!(report.status(), RunStatus::Completed);
    assert_eq!(report.movies_written, 2);
    assert_eq!(report.ratings_written, 6);

    // Beta is a join anomaly, Delta has no wiki record, the series is filtered
    let rows = sqlx::query(
        r#"SELECT imdb_id, kaggle_id, title, runtime, budget, revenue, release_date,
                  director, country, starring, original_language,
                  "rating_1", "rating_3", "rating_4.5", "rating_5"
           FROM movies ORDER BY kaggle_id"#,
    )
    .fetch_all(f.store.pool())
    .await
    .unwrap();
    assert_eq!(rows.len(), 2);

    let alpha = &rows[0];
    assert_eq!(alpha.get::<String, _>("imdb_id"), "tt0000001");
    assert_eq!(alpha.get::<i64, _>("kaggle_id"), 11);
    assert_eq!(alpha.get::<String, _>("title"), "Alpha");
    assert_eq!(alpha.get::<Option<f64>, _>("runtime"), Some(95.0));
    assert_eq!(alpha.get::<Option<f64>, _>("budget"), Some(1000.0));
    // Catalog revenue 0 is filled from the wiki box office
    assert_eq!(alpha.get::<Option<f64>, _>("revenue"), Some(1_500_000.0));
    assert_eq!(alpha.get::<String, _>("release_date"), "1999-03-01");
    // First wiki record wins over the duplicate
    assert_eq!(alpha.get::<String, _>("director"), "Ann Director");
    assert_eq!(alpha.get::<String, _>("starring"), r#"["Lead One","Lead Two"]"#);
    assert_eq!(alpha.get::<i64, _>("rating_5"), 2);
    assert_eq!(alpha.get::<i64, _>("rating_3"), 1);
    assert_eq!(alpha.get::<i64, _>("rating_4.5"), 0);
    assert_eq!(alpha.get::<i64, _>("rating_1"), 0);

    let gamma = &rows[1];
    assert_eq!(gamma.get::<String, _>("imdb_id"), "tt0000003");
    assert_eq!(gamma.get::<Option<f64>, _>("runtime"), Some(120.0));
    assert_eq!(gamma.get::<Option<f64>, _>("budget"), Some(3_500_000.0));
    assert_eq!(gamma.get::<Option<f64>, _>("revenue"), Some(2000.0));
    assert_eq!(gamma.get::<String, _>("country"), "France");
    assert_eq!(gamma.get::<String, _>("original_language"), "fr");
    assert_eq!(gamma.get::<i64, _>("rating_4.5"), 1);
    assert_eq!(gamma.get::<i64, _>("rating_5"), 0);

    assert_eq!(count(&f.store, "ratings").await, 6);
    let first_rating = sqlx::query("SELECT user_id, movie_id, rating, timestamp FROM ratings LIMIT 1")
        .fetch_one(f.store.pool())
        .await
        .unwrap();
    assert_eq!(first_rating.get::<Option<i64>, _>("user_id"), Some(1));
    assert_eq!(first_rating.get::<f64, _>("rating"), 5.0);
    assert_eq!(
        first_rating.get::<String, _>("timestamp"),
        "2015-03-09T22:52:09+00:00"
    );

    let ledger = load_run(f.store.pool(), report.run_id).await.unwrap().unwrap();
    assert_eq!(ledger.status, RunStatus::Completed);
    assert_eq!(ledger.movies_written, 2);
    assert_eq!(ledger.ratings_written, 6);
    assert!(ledger.failed_stage.is_none());
    assert!(ledger.ended_at.is_some());
}

#[tokio::test]
async fn test_movie_columns_follow_output_schema() {
    let f = fixture(WIKI, CATALOG, RATINGS, 1_000).await;
    run(&f.config, &f.store).await.unwrap();

    let columns = SchemaSync::column_names(f.store.pool(), "movies").await.unwrap();
    assert_eq!(&columns[..3], &["imdb_id", "kaggle_id", "title"]);
    assert_eq!(columns[30], "based_on");
    assert_eq!(
        &columns[31..],
        &["rating_1", "rating_3", "rating_4.5", "rating_5"]
    );
}

#[tokio::test]
async fn test_schema_error_stops_before_any_write() {
    // No record carries a running time, so the column never exists
    let wiki = r#"[{
        "title": "Alpha",
        "imdb_link": "https://www.imdb.com/title/tt0000001/",
        "Directed by": "Ann Director",
        "Box office": "$1 million",
        "Budget": "$1 million",
        "Release date": "1999"
    }]"#;
    let f = fixture(wiki, CATALOG, RATINGS, 2).await;

    let report = run(&f.config, &f.store).await.unwrap();
    assert_eq!(report.status(), RunStatus::Failed);
    assert_eq!(report.failed_stage(), Some(Stage::ParseWikiFields));
    assert!(matches!(
        report.failure,
        Some(EtlError::MissingColumn { ref column, .. }) if column == "Running time"
    ));
    assert!(!SchemaSync::table_exists(f.store.pool(), "ratings").await.unwrap());
    assert!(!SchemaSync::table_exists(f.store.pool(), "movies").await.unwrap());

    let ledger = load_run(f.store.pool(), report.run_id).await.unwrap().unwrap();
    assert_eq!(ledger.status, RunStatus::Failed);
    assert_eq!(ledger.failed_stage.as_deref(), Some("parse_wiki_fields"));
    assert!(ledger.message.unwrap().contains("Running time"));
}

#[tokio::test]
async fn test_bad_rating_row_is_partial_success() {
    let ratings = "\
userId,movieId,rating,timestamp
1,11,5.0,1425941529
2,11,4.0,1425941530
3,11,not-a-number,1425941531
";
    let f = fixture(WIKI, CATALOG, ratings, 2).await;

    let report = run(&f.config, &f.store).await.unwrap();
    assert_eq!(report.status(), RunStatus::Partial);
    assert_eq!(report.failed_stage(), Some(Stage::StreamRatings));
    assert_eq!(report.ratings_written, 2);
    assert_eq!(report.movies_written, 0);

    assert_eq!(count(&f.store, "ratings").await, 2);
    assert!(!SchemaSync::table_exists(f.store.pool(), "movies").await.unwrap());

    let ledger = load_run(f.store.pool(), report.run_id).await.unwrap().unwrap();
    assert_eq!(ledger.status, RunStatus::Partial);
    assert_eq!(ledger.ratings_written, 2);
}

#[tokio::test]
async fn test_rerun_appends_unless_clearing() {
    let mut f = fixture(WIKI, CATALOG, RATINGS, 4).await;

    run(&f.config, &f.store).await.unwrap();
    run(&f.config, &f.store).await.unwrap();
    assert_eq!(count(&f.store, "movies").await, 4);
    assert_eq!(count(&f.store, "ratings").await, 12);

    f.config.clear_tables = true;
    let report = run(&f.config, &f.store).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(count(&f.store, "movies").await, 2);
    assert_eq!(count(&f.store, "ratings").await, 6);
}

#[tokio::test]
async fn test_missing_ratings_file_fails_before_clearing() {
    let mut f = fixture(WIKI, CATALOG, RATINGS, 4).await;
    run(&f.config, &f.store).await.unwrap();

    f.config.clear_tables = true;
    f.config.ratings_path = Path::new("/nonexistent/ratings.csv").to_path_buf();
    let report = run(&f.config, &f.store).await.unwrap();

    assert_eq!(report.failed_stage(), Some(Stage::StreamRatings));
    assert!(matches!(report.failure, Some(EtlError::Read { .. })));
    // Existing rows survive because the stream is opened before clearing
    assert_eq!(count(&f.store, "movies").await, 2);
    assert_eq!(count(&f.store, "ratings").await, 6);
}
