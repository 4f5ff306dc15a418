//! # mvetl-pipeline
//!
//! Movie metadata ETL: an encyclopedia extraction and a catalog export are
//! normalized and merged into one movie table, and a large rating-event
//! stream is aggregated into per-movie rating counts.
//!
//! Stage order: wiki loading, film filter, consolidation, field typing,
//! catalog loading and cleaning, merge, chunked ratings streaming, rating
//! attachment, movie persistence. See [`pipeline::run`].

pub mod catalog;
pub mod error;
pub mod merge;
pub mod parsers;
pub mod pipeline;
pub mod ratings;
pub mod settings;
pub mod store;
pub mod wiki;

pub use error::{EtlError, EtlResult, Stage};
pub use pipeline::{run, PipelineConfig, RunReport};
pub use settings::{CliArgs, Settings};
pub use store::MovieStore;
