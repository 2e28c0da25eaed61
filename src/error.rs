//! Error types for email parsing, persistence and configuration

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while parsing or persisting a message
#[derive(Error, Debug)]
pub enum ParseError {
    /// The raw message could not be decoded into a MIME envelope
    #[error("Failed to decode envelope: {0}")]
    Decode(String),

    /// The item did not finish within its deadline
    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Storing or loading the entity failed
    #[error("Persistence failed: {0}")]
    Persist(#[from] RepoError),

    /// The item's task panicked or was cancelled
    #[error("Item task aborted: {0}")]
    Aborted(String),

    /// A batch call was made without any input
    #[error("Batch input is empty")]
    EmptyBatch,
}

/// Errors returned by an [`EmailRepository`](crate::EmailRepository)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    /// No entity is stored under the given id
    #[error("Email not found: {0}")]
    NotFound(String),

    /// The backing store rejected the operation
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors raised while loading [`Config`](crate::Config)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Result type for parsing operations
pub type Result<T> = std::result::Result<T, ParseError>;
