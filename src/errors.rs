// errors.rs

use thiserror::Error;

/// Errors from the SQLite layer.
///
/// Every store operation is a single statement, so a `StoreError` never
/// leaves a half-written listing behind.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Open DB failed: {0}")]
    Open(String),
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Database Error: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("Connection slot unavailable on this thread")]
    ThreadLocal,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error("Missing secret: {0}")]
    MissingSecret(String),
}

/// Startup faults. Any of these ends the process with exit code 1.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Telegram error: {0}")]
    Sink(#[from] crate::notifications::SinkError),
}
