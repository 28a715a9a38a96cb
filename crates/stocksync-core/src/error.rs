// crates/stocksync-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export parsing failed: {0}")]
    Parser(#[from] stocksync_parser::ParserError),

    #[error("Remote request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote catalog page {page} returned HTTP {status}")]
    HttpStatus { status: u16, page: u32 },

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Imported file {0} not found")]
    NotFound(i64),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
