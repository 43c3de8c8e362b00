// src/error.rs

use thiserror::Error;

/// Failure to read the facility list. Fatal for the whole run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("request to record store failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("record store returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Failure to persist a new coordinate for one facility. Recorded on that
/// facility's outcome, never fatal.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("facility {0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store rejected update with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<tokio_postgres::Error> for UpdateError {
    fn from(e: tokio_postgres::Error) -> Self {
        UpdateError::Database(e.to_string())
    }
}

/// Run-level errors surfaced to the process boundary.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to fetch facilities: {0}")]
    Fetch(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
