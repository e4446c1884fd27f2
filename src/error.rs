//! Error types for novel-dl
//!
//! This module provides the error handling for the library, including:
//! - Domain-specific error types (store, fetch, task control)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for novel-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for novel-dl
///
/// Each variant carries enough context to tell which collaborator or which
/// task the failure belongs to.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "orchestrator.batch_size")
        key: Option<String>,
    },

    /// Chapter store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Chapter content could not be fetched
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Remote sync operation failed
    #[error("remote sync error: {0}")]
    RemoteSync(String),

    /// Task control error (start rejected, unknown task)
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Chapter range expression could not be parsed
    #[error("invalid chapter range: {0}")]
    InvalidRange(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bundle export error
    #[error("export error: {0}")]
    Export(#[from] zip::result::ZipError),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Chapter store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the backing database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Stored record could not be decoded
    #[error("corrupt record for {work_id}/{chapter_id}: {reason}")]
    CorruptRecord {
        /// Work the record belongs to
        work_id: String,
        /// Chapter the record belongs to
        chapter_id: String,
        /// Why decoding failed
        reason: String,
    },
}

/// Chapter fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Upstream answered with an empty body
    #[error("{url} returned an empty body")]
    EmptyBody {
        /// Requested URL
        url: String,
    },

    /// Chapter id is not a URL and no base URL is configured for its source
    #[error("cannot resolve chapter {chapter_id} for source {source_tag}")]
    UnresolvableChapter {
        /// Chapter id that could not be resolved
        chapter_id: String,
        /// Source tag of the work
        source_tag: String,
    },

    /// Per-chapter deadline elapsed
    #[error("chapter {chapter_id} timed out after {timeout:?}")]
    Timeout {
        /// Chapter that timed out
        chapter_id: String,
        /// Configured deadline
        timeout: Duration,
    },
}

/// Task control errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// The work has no resolved chapter list
    #[error("work {work_id} has no chapters to download")]
    NoChapters {
        /// Work that was rejected
        work_id: String,
    },

    /// No task is known for this work
    #[error("no task for work {work_id}")]
    NotFound {
        /// Work that was looked up
        work_id: String,
    },
}

/// API error response format
///
/// Returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "task_not_found",
///     "message": "task error: no task for work https://example.com/novel/1",
///     "details": {
///       "work_id": "https://example.com/novel/1"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a new API error with code, message, and details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidRange(_) => 400,

            // 404 Not Found
            Error::Task(TaskError::NotFound { .. }) => 404,

            // 422 Unprocessable Entity - Semantic errors
            Error::Task(TaskError::NoChapters { .. }) => 422,

            // 500 Internal Server Error - Server-side issues
            Error::Store(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Export(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Fetch(_) => 502,
            Error::RemoteSync(_) => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Store(_) => "store_error",
            Error::Sqlx(_) => "database_error",
            Error::Fetch(e) => match e {
                FetchError::HttpStatus { .. } => "upstream_status",
                FetchError::EmptyBody { .. } => "empty_body",
                FetchError::UnresolvableChapter { .. } => "unresolvable_chapter",
                FetchError::Timeout { .. } => "chapter_timeout",
            },
            Error::RemoteSync(_) => "remote_sync_error",
            Error::Task(e) => match e {
                TaskError::NoChapters { .. } => "no_chapters",
                TaskError::NotFound { .. } => "task_not_found",
            },
            Error::InvalidRange(_) => "invalid_range",
            Error::Io(_) => "io_error",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Export(_) => "export_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Task(TaskError::NoChapters { work_id })
            | Error::Task(TaskError::NotFound { work_id }) => Some(serde_json::json!({
                "work_id": work_id,
            })),
            Error::Fetch(FetchError::HttpStatus { url, status }) => Some(serde_json::json!({
                "url": url,
                "status": status,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
