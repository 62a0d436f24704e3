//! Error types for curator

use thiserror::Error;

/// Errors raised by curator's storage, gateway and configuration layers.
///
/// The lifecycle manager never lets these cross its public operations;
/// they surface only from constructors, the CLI, and the store traits.
#[derive(Error, Debug)]
pub enum CuratorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Asset gateway error: {0}")]
    Gateway(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CuratorError>;
