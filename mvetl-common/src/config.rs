//! Configuration loading and default resolution
//!
//! Each setting is resolved in priority order:
//! 1. Command-line argument (highest priority, may be fed from an `MVETL_*` env var)
//! 2. TOML config file
//! 3. Compiled default (fallback)
//!
//! The command-line tier lives in the binary; this module provides the TOML
//! tier, the compiled defaults and the validation shared by both.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default number of rating events read per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is not set (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Contents of `config.toml`
///
/// Every key is optional; absent keys fall through to compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Directory holding the three source files
    pub data_dir: Option<PathBuf>,
    /// Encyclopedia extraction (JSON array), relative to `data_dir`
    pub wiki_file: Option<String>,
    /// Catalog export (CSV), relative to `data_dir`
    pub catalog_file: Option<String>,
    /// Rating events (CSV), relative to `data_dir`
    pub ratings_file: Option<String>,
    /// SQLite database receiving the output tables
    pub database_path: Option<PathBuf>,
    pub movies_table: Option<String>,
    pub ratings_table: Option<String>,
    /// Rating events per chunk
    pub chunk_size: Option<usize>,
    /// Delete existing rows from both output tables before loading
    pub clear_tables: Option<bool>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compiled defaults used when neither CLI nor TOML provide a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_dir: PathBuf,
    pub wiki_file: String,
    pub catalog_file: String,
    pub ratings_file: String,
    pub database_path: PathBuf,
    pub movies_table: String,
    pub ratings_table: String,
    pub chunk_size: usize,
    pub clear_tables: bool,
    pub log_level: String,
}

impl CompiledDefaults {
    /// Defaults for the current platform
    pub fn for_current_platform() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            wiki_file: "wikipedia.movies.json".to_string(),
            catalog_file: "movies_metadata.csv".to_string(),
            ratings_file: "ratings.csv".to_string(),
            database_path: default_database_path(),
            movies_table: "movies".to_string(),
            ratings_table: "ratings".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            clear_tables: false,
            log_level: default_log_level(),
        }
    }
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mvetl").join("movie_data.db"))
        .unwrap_or_else(|| PathBuf::from("./movie_data.db"))
}

/// Locate the default configuration file for the platform
///
/// Linux tries `~/.config/mvetl/config.toml`, then `/etc/mvetl/config.toml`.
/// Other platforms use the user config directory only.
pub fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("mvetl").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/mvetl/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the TOML tier
///
/// An explicitly requested file must exist and parse. Without one, the
/// platform default is tried and a missing file yields an empty config
/// (all keys fall through to compiled defaults).
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        let config = load_toml_config(path)?;
        info!("Loaded config from {}", path.display());
        return Ok(config);
    }

    match locate_config_file() {
        Ok(path) => {
            let config = load_toml_config(&path)?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(_) => {
            warn!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Reject table names that are not plain SQL identifiers
///
/// Table names are interpolated into DDL/DML, so only
/// `[A-Za-z_][A-Za-z0-9_]*` is accepted.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "table name '{}' is not a valid SQL identifier",
            name
        )))
    }
}
