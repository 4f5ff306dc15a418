//! SQLite persistence for the movie and ratings tables

use crate::merge::{ColumnValue, MOVIE_COLUMNS};
use crate::ratings::{RatedMovieTable, RatingEvent};
use mvetl_common::config::validate_table_name;
use mvetl_common::db::{quote_identifier, ColumnDefinition, SchemaSync};
use mvetl_common::Result;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Columns of the ratings table
fn ratings_columns() -> Vec<ColumnDefinition> {
    vec![
        ColumnDefinition::new("user_id", "INTEGER"),
        ColumnDefinition::new("movie_id", "INTEGER").not_null(),
        ColumnDefinition::new("rating", "REAL").not_null(),
        ColumnDefinition::new("timestamp", "TEXT").not_null(),
    ]
}

/// Movie table columns: the fixed prefix followed by one count per rating value
fn movie_columns(rating_columns: &[String]) -> Vec<ColumnDefinition> {
    let mut columns: Vec<ColumnDefinition> = MOVIE_COLUMNS
        .iter()
        .map(|(name, sql_type)| {
            let column = ColumnDefinition::new(*name, *sql_type);
            if *name == "imdb_id" || *name == "kaggle_id" {
                column.not_null()
            } else {
                column
            }
        })
        .collect();
    columns.extend(
        rating_columns
            .iter()
            .map(|name| ColumnDefinition::new(name.clone(), "INTEGER").not_null().default("0")),
    );
    columns
}

fn insert_sql(table: &str, columns: &[ColumnDefinition]) -> String {
    let names = columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        names,
        placeholders
    )
}

/// Output tables in one SQLite database
pub struct MovieStore {
    pool: SqlitePool,
    movies_table: String,
    ratings_table: String,
}

impl MovieStore {
    /// Create a store; both table names must be plain SQL identifiers
    pub fn new(
        pool: SqlitePool,
        movies_table: impl Into<String>,
        ratings_table: impl Into<String>,
    ) -> Result<Self> {
        let movies_table = movies_table.into();
        let ratings_table = ratings_table.into();
        validate_table_name(&movies_table)?;
        validate_table_name(&ratings_table)?;
        Ok(Self {
            pool,
            movies_table,
            ratings_table,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn movies_table(&self) -> &str {
        &self.movies_table
    }

    pub fn ratings_table(&self) -> &str {
        &self.ratings_table
    }

    /// Delete every row from both output tables, keeping the tables
    ///
    /// Returns (movie rows removed, rating rows removed). Tables that do not
    /// exist yet count as empty.
    pub async fn clear_tables(&self) -> Result<(u64, u64)> {
        let mut tx = self.pool.begin().await?;
        let mut removed = [0u64; 2];

        for (slot, table) in [&self.movies_table, &self.ratings_table].into_iter().enumerate() {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?)",
            )
            .bind(table.as_str())
            .fetch_one(&mut *tx)
            .await?;

            if exists {
                let result = sqlx::query(&format!("DELETE FROM {}", quote_identifier(table)))
                    .execute(&mut *tx)
                    .await?;
                removed[slot] = result.rows_affected();
            }
        }

        tx.commit().await?;
        info!(
            movies_removed = removed[0],
            ratings_removed = removed[1],
            "Cleared {} and {}",
            self.movies_table,
            self.ratings_table
        );
        Ok((removed[0], removed[1]))
    }

    /// Create the ratings table (or add columns it lacks)
    pub async fn prepare_ratings_table(&self) -> Result<()> {
        SchemaSync::sync_table(&self.pool, &self.ratings_table, &ratings_columns()).await?;
        Ok(())
    }

    /// Append one chunk of rating events in its own transaction
    pub async fn append_ratings_chunk(&self, events: &[RatingEvent]) -> Result<u64> {
        let sql = insert_sql(&self.ratings_table, &ratings_columns());
        let mut tx = self.pool.begin().await?;

        for event in events {
            sqlx::query(&sql)
                .bind(event.user_id)
                .bind(event.movie_id)
                .bind(event.rating.as_f64())
                .bind(event.timestamp.to_rfc3339())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(rows = events.len(), table = %self.ratings_table, "Appended ratings chunk");
        Ok(events.len() as u64)
    }

    /// Append the final movie table in a single transaction
    ///
    /// The table is created with the fixed column order when absent; rating
    /// columns it lacks are added first.
    pub async fn write_movies(&self, table: &RatedMovieTable) -> Result<u64> {
        let columns = movie_columns(&table.rating_columns());
        let added = SchemaSync::sync_table(&self.pool, &self.movies_table, &columns).await?;
        if added > 0 {
            info!(added, table = %self.movies_table, "Widened movie table");
        }

        let sql = insert_sql(&self.movies_table, &columns);
        let mut tx = self.pool.begin().await?;

        for rated in &table.rows {
            let values = rated.movie.column_values();
            let mut query = sqlx::query(&sql);
            for value in &values {
                query = match value {
                    ColumnValue::Text(v) => query.bind(v.as_deref()),
                    ColumnValue::Integer(v) => query.bind(*v),
                    ColumnValue::Real(v) => query.bind(*v),
                };
            }
            for count in &rated.counts {
                query = query.bind(i64::try_from(*count).unwrap_or(i64::MAX));
            }
            query.execute(&mut *tx).await?;
        }

        tx.commit().await?;
        info!(rows = table.rows.len(), table = %self.movies_table, "Wrote movie table");
        Ok(table.rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_quotes_dotted_columns() {
        let columns = movie_columns(&["rating_0.5".to_string()]);
        let sql = insert_sql("movies", &columns);
        assert!(sql.starts_with("INSERT INTO \"movies\" (\"imdb_id\", \"kaggle_id\""));
        assert!(sql.contains("\"rating_0.5\") VALUES ("));
        assert_eq!(sql.matches('?').count(), MOVIE_COLUMNS.len() + 1);
    }

    #[test]
    fn test_rating_columns_default_to_zero() {
        let columns = movie_columns(&["rating_5".to_string()]);
        let last = columns.last().unwrap();
        assert_eq!(last.to_sql(), "\"rating_5\" INTEGER NOT NULL DEFAULT 0");
    }
}
