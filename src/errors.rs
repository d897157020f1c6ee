/*!
 * Error types for the doctrans application.
 *
 * This module contains custom error types for the different stages of a
 * translation run, using the thiserror crate for ergonomic error definitions.
 * Only `ExtractionError` and `PersistenceError` are fatal to a run; everything
 * raised while talking to the generation service is contained per batch.
 */

use std::time::Duration;

use thiserror::Error;

use crate::translation::prompts::PartialTranslation;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection, including timeouts
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Quota exhausted on the service side
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// Error message from the API
        message: String,
        /// Server-provided wait before the next attempt
        retry_after_secs: Option<u64>,
    },

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The service refused or cut short the generation
    #[error("Generation blocked (finish reason: {finish_reason})")]
    Blocked {
        /// Finish or block reason reported by the service
        finish_reason: String,
        /// Safety ratings or other diagnostics, if any
        details: Option<String>,
    },
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AuthenticationError(_) => false,
            Self::ApiError { status_code, .. } => {
                *status_code >= 500 || *status_code == 408 || *status_code == 429
            }
            _ => true,
        }
    }

    /// Minimum wait requested by the service before retrying
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after_secs: Some(secs), .. } => {
                Some(Duration::from_secs(*secs))
            }
            _ => None,
        }
    }
}

/// A response that arrived but cannot be accepted as-is
#[derive(Error, Debug)]
pub enum ValidationError {
    /// No JSON object could be recovered from the response text
    #[error("Response is not valid JSON: {0}")]
    Unparseable(String),

    /// JSON was recovered but does not have the expected id -> language -> text shape
    #[error("Response has an unexpected shape: {0}")]
    Malformed(String),

    /// Some text/language pairs are missing or unexpected entries are present
    #[error("Response is incomplete: {missing} missing, {unexpected} unexpected entries")]
    Incomplete {
        /// Number of requested text/language pairs without a usable translation
        missing: usize,
        /// Number of ids or languages that were not requested
        unexpected: usize,
        /// The entries that did validate, kept for the last-attempt fallback
        partial: Box<PartialTranslation>,
    },
}

/// Failure of a single translation attempt for one batch
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider answered but the response was rejected
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl TranslationError {
    /// Whether the dispatcher should try this batch again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::Validation(_) => true,
        }
    }

    /// Minimum wait requested by the service before retrying
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Provider(e) => e.retry_after(),
            Self::Validation(_) => None,
        }
    }
}

/// The source document could not be loaded
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Nothing stored under the source key
    #[error("Source document not found: {0}")]
    NotFound(String),

    /// The source bytes are not a JSON document
    #[error("Source document {key} is not valid JSON: {message}")]
    InvalidJson {
        /// Key the document was read from
        key: String,
        /// Parser error
        message: String,
    },

    /// The blob store failed while reading the source
    #[error("Failed to read source document: {0}")]
    Storage(#[from] StorageError),
}

/// Errors raised by a blob store
#[derive(Error, Debug)]
pub enum StorageError {
    /// Key rejected by the store (absolute path, parent traversal, empty)
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// Underlying I/O failure
    #[error("Storage I/O error for {key}: {message}")]
    Io {
        /// Key being read or written
        key: String,
        /// I/O error description
        message: String,
    },
}

/// Errors raised by the progress store
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The stored snapshot exists but cannot be trusted
    #[error("Progress snapshot {key} is corrupt: {message}")]
    Corrupt {
        /// Snapshot key
        key: String,
        /// What failed to check out
        message: String,
    },

    /// The snapshot could not be read
    #[error("Failed to read progress snapshot: {0}")]
    Read(StorageError),

    /// Every write attempt failed
    #[error("Failed to persist progress snapshot after {attempts} attempts: {source}")]
    Write {
        /// Number of write attempts made
        attempts: u32,
        /// Last storage error
        source: StorageError,
    },

    /// The snapshot could not be serialized
    #[error("Failed to serialize progress snapshot: {0}")]
    Serialize(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Source document problem, fatal before any remote call
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Progress could not be loaded or made durable
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Output or other storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}
