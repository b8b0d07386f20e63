//! Error handling for the OSINT orchestrator
//!
//! This module provides idiomatic Rust error types using thiserror. Provider
//! failures are deliberately absent from the top-level error: the dispatcher
//! recovers them locally and folds them into the per-query statistics.

use thiserror::Error;

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum OsintError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Rejections raised before any dispatch work begins
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Empty target for {kind} lookup")]
    EmptyTarget { kind: String },

    #[error("Malformed {kind} target '{target}': {reason}")]
    MalformedTarget {
        kind: String,
        target: String,
        reason: String,
    },

    #[error("Unsupported query kind '{kind}'")]
    UnsupportedKind { kind: String },

    #[error("Unreadable image '{filename}': {reason}")]
    UnreadableImage { filename: String, reason: String },
}

/// Failures from a single provider call
///
/// These never escape the dispatcher. `NotFound` and `Fatal` are terminal for
/// the dispatch attempt; `Transient` is retried up to the provider's budget.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("target not present at this provider")]
    NotFound,

    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("provider failure: {0}")]
    Fatal(String),
}

/// History/report persistence failures
///
/// The service degrades on these: the aggregated result is still returned to
/// the caller, the failure is logged.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read history at {path}: {message}")]
    ReadFailed { path: String, message: String },

    #[error("Failed to persist history at {path}: {message}")]
    WriteFailed { path: String, message: String },
}

/// Failures surfaced only to callers of the report endpoints
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Invalid report locator '{0}'")]
    InvalidLocator(String),

    #[error("Report '{0}' not found")]
    NotFound(String),

    #[error("Failed to write report artifact: {0}")]
    WriteFailed(String),

    #[error("Failed to read report artifact: {0}")]
    ReadFailed(String),
}

/// Convenience result alias for the orchestrator
pub type Result<T> = std::result::Result<T, OsintError>;
