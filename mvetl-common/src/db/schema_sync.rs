//! Automatic Schema Synchronization
//!
//! Output tables have a fixed prefix of columns plus a data-dependent tail
//! (one column per rating value seen in the event stream). Tables are created
//! with `CREATE TABLE IF NOT EXISTS` and any missing column is then added with
//! `ALTER TABLE ... ADD COLUMN`, so re-running against an existing database
//! widens the table instead of failing.
//!
//! # Usage
//!
//! ```rust,ignore
//! let columns = vec![
//!     ColumnDefinition::new("imdb_id", "TEXT").primary_key(),
//!     ColumnDefinition::new("rating_4.5", "INTEGER").not_null().default("0"),
//! ];
//! SchemaSync::sync_table(&pool, "movies", &columns).await?;
//! ```

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name (quoted when rendered, may contain '.')
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER", "REAL")
    pub sql_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY constraint
    pub primary_key: bool,
    /// DEFAULT value
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            default_value: None,
        }
    }

    /// Mark column as PRIMARY KEY
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Set DEFAULT value
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Render the column clause used in CREATE TABLE / ADD COLUMN
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_identifier(&self.name), self.sql_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        sql
    }
}

/// Quote an identifier for SQLite (`"name"`, embedded quotes doubled)
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Schema introspection and column synchronization
pub struct SchemaSync;

impl SchemaSync {
    /// Check if table exists
    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type='table' AND name = ?
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Read actual column names from database table (in cid order)
    pub async fn column_names(pool: &SqlitePool, table_name: &str) -> Result<Vec<String>> {
        let query = format!("PRAGMA table_info({})", quote_identifier(table_name));
        let rows = sqlx::query(&query).fetch_all(pool).await?;

        let mut columns: Vec<(i32, String)> = rows
            .iter()
            .map(|row| (row.get("cid"), row.get("name")))
            .collect();
        columns.sort_by_key(|(cid, _)| *cid);

        Ok(columns.into_iter().map(|(_, name)| name).collect())
    }

    /// Create the table if missing, then add any column it lacks
    ///
    /// Returns the number of columns added to a pre-existing table.
    pub async fn sync_table(
        pool: &SqlitePool,
        table_name: &str,
        columns: &[ColumnDefinition],
    ) -> Result<usize> {
        if !Self::table_exists(pool, table_name).await? {
            let body = columns
                .iter()
                .map(ColumnDefinition::to_sql)
                .collect::<Vec<_>>()
                .join(",\n    ");
            let sql = format!(
                "CREATE TABLE {} (\n    {}\n)",
                quote_identifier(table_name),
                body
            );
            sqlx::query(&sql).execute(pool).await?;
            info!(table = table_name, columns = columns.len(), "Created table");
            return Ok(0);
        }

        let existing = Self::column_names(pool, table_name).await?;
        let mut added = 0;

        for column in columns {
            if existing.iter().any(|name| name == &column.name) {
                continue;
            }
            // SQLite cannot add PRIMARY KEY columns to an existing table
            let mut addable = column.clone();
            addable.primary_key = false;
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_identifier(table_name),
                addable.to_sql()
            );
            sqlx::query(&sql).execute(pool).await?;
            info!(table = table_name, column = %column.name, "Added missing column");
            added += 1;
        }

        Ok(added)
    }
}
