// src/domain/errors.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File watch error: {0}")]
    Watch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to parse {kind} data: {source}")]
    Decode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse time {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Failed to read data root {}: {source}", .path.display())]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process file, maximum retry count reached ({attempts}): {}", .path.display())]
    RetriesExhausted { path: PathBuf, attempts: u32 },

    #[error("Shutdown requested while processing {}", .path.display())]
    Cancelled { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid InfluxDB url: {0}")]
    InvalidUrl(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("InfluxDB write failed with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Dropped batch of {points} points: {source}")]
    BatchDropped {
        points: usize,
        #[source]
        source: Box<StorageError>,
    },
}

impl StorageError {
    /// Buffered points lost along with this error
    pub fn dropped_points(&self) -> usize {
        match self {
            StorageError::BatchDropped { points, .. } => *points,
            _ => 0,
        }
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type IngestResult<T> = Result<T, IngestError>;
pub type StorageResult<T> = Result<T, StorageError>;
