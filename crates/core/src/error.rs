//! Error types for osrs-tracker-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hiscore API error: {0}")]
    Api(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
