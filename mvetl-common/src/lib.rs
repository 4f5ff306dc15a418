//! # mvetl Common Library
//!
//! Shared code for the movie ETL workspace:
//! - Error type used by configuration and database helpers
//! - Configuration loading (TOML file + compiled defaults)
//! - SQLite initialization, column synchronization and the run ledger
//! - Timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
