use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CsvSearchError>;

#[derive(Error, Debug)]
pub enum CsvSearchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV file not found: {0}")]
    CsvNotFound(PathBuf),

    #[error("No matching column for '{role}'; the CSV needs one of: {expected}")]
    Schema { role: String, expected: String },

    #[error("No usable rows in {0} after filtering blank records")]
    EmptyDataset(PathBuf),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl CsvSearchError {
    /// Schema resolution failure for `role`, naming every header it would
    /// have accepted.
    #[inline]
    pub fn schema(role: &str, candidates: &[&str]) -> Self {
        Self::Schema {
            role: role.to_string(),
            expected: candidates.join(", "),
        }
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod ingest;
pub mod schema;
pub mod search;
