//! Command-line arguments and final settings resolution
//!
//! Each setting resolves as: command line (or its `MVETL_*` environment
//! variable), then the TOML file, then the compiled default.

use crate::pipeline::PipelineConfig;
use clap::Parser;
use mvetl_common::config::{validate_table_name, CompiledDefaults, TomlConfig};
use mvetl_common::{Error, Result};
use std::path::{Path, PathBuf};

/// Command-line arguments for mvetl
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "mvetl")]
#[command(about = "Movie metadata and ratings ETL into SQLite")]
#[command(version)]
pub struct CliArgs {
    /// TOML config file (default: ~/.config/mvetl/config.toml)
    #[arg(short, long, env = "MVETL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the source files
    #[arg(long, env = "MVETL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Encyclopedia extraction (JSON array)
    #[arg(long, env = "MVETL_WIKI_FILE")]
    pub wiki_file: Option<String>,

    /// Catalog export (CSV)
    #[arg(long, env = "MVETL_CATALOG_FILE")]
    pub catalog_file: Option<String>,

    /// Rating events (CSV)
    #[arg(long, env = "MVETL_RATINGS_FILE")]
    pub ratings_file: Option<String>,

    /// SQLite database receiving the output tables
    #[arg(short, long, env = "MVETL_DATABASE")]
    pub database: Option<PathBuf>,

    #[arg(long, env = "MVETL_MOVIES_TABLE")]
    pub movies_table: Option<String>,

    #[arg(long, env = "MVETL_RATINGS_TABLE")]
    pub ratings_table: Option<String>,

    /// Rating events read and appended per chunk
    #[arg(long, env = "MVETL_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Delete existing rows from both output tables first
    #[arg(long, env = "MVETL_CLEAR_TABLES", num_args = 0..=1, default_missing_value = "true")]
    pub clear_tables: Option<bool>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, env = "MVETL_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub wiki_path: PathBuf,
    pub catalog_path: PathBuf,
    pub ratings_path: PathBuf,
    pub database_path: PathBuf,
    pub movies_table: String,
    pub ratings_table: String,
    pub chunk_size: usize,
    pub clear_tables: bool,
    pub log_level: String,
}

impl Settings {
    /// Resolve every setting against the TOML tier and compiled defaults
    ///
    /// # Errors
    /// `Config` for a zero chunk size, `InvalidInput` for a table name that
    /// is not an SQL identifier.
    pub fn resolve(cli: &CliArgs, toml: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::for_current_platform();

        let data_dir = pick(cli.data_dir.clone(), toml.data_dir.clone(), defaults.data_dir);
        let file = |cli: &Option<String>, toml: &Option<String>, default: String| {
            source_path(&data_dir, &pick(cli.clone(), toml.clone(), default))
        };

        let settings = Self {
            wiki_path: file(&cli.wiki_file, &toml.wiki_file, defaults.wiki_file),
            catalog_path: file(&cli.catalog_file, &toml.catalog_file, defaults.catalog_file),
            ratings_path: file(&cli.ratings_file, &toml.ratings_file, defaults.ratings_file),
            database_path: pick(
                cli.database.clone(),
                toml.database_path.clone(),
                defaults.database_path,
            ),
            movies_table: pick(
                cli.movies_table.clone(),
                toml.movies_table.clone(),
                defaults.movies_table,
            ),
            ratings_table: pick(
                cli.ratings_table.clone(),
                toml.ratings_table.clone(),
                defaults.ratings_table,
            ),
            chunk_size: pick(cli.chunk_size, toml.chunk_size, defaults.chunk_size),
            clear_tables: pick(cli.clear_tables, toml.clear_tables, defaults.clear_tables),
            log_level: cli
                .log_level
                .clone()
                .unwrap_or_else(|| toml.logging.level.clone()),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".to_string()));
        }
        validate_table_name(&self.movies_table)?;
        validate_table_name(&self.ratings_table)?;
        if self.movies_table == self.ratings_table {
            return Err(Error::Config(format!(
                "movies_table and ratings_table are both '{}'",
                self.movies_table
            )));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            wiki_path: self.wiki_path.clone(),
            catalog_path: self.catalog_path.clone(),
            ratings_path: self.ratings_path.clone(),
            chunk_size: self.chunk_size,
            clear_tables: self.clear_tables,
        }
    }
}

fn pick<T>(cli: Option<T>, toml: Option<T>, default: T) -> T {
    cli.or(toml).unwrap_or(default)
}

/// Source files are relative to the data directory unless absolute
fn source_path(data_dir: &Path, file: &str) -> PathBuf {
    data_dir.join(file)
}
