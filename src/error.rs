//! Error types for the event pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("broker error: {0}")]
    Broker(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("rate quote error: {0}")]
    RateQuote(String),

    #[error("rate cache error: {0}")]
    RateCache(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("player not found: {0}")]
    PlayerNotFound(i64),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
