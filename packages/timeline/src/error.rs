//! Typed errors for the timeline library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Only [`StoreError`] (and therefore [`TimelineError::Store`]) is ever
//! surfaced out of a per-article curation pass. The remaining diagnostic
//! kinds are recovered where they occur and only show up in logs and
//! run reports.

use thiserror::Error;

/// Top-level errors for timeline operations.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// Document store operation failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Completion service unavailable or failed
    #[error("completion service error: {0}")]
    Completion(#[from] CompletionError),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors raised by a [`DocumentStore`](crate::traits::store::DocumentStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Document does not exist (returned by nested-field updates)
    #[error("document not found: {collection}/{doc_id}")]
    NotFound { collection: String, doc_id: String },

    /// Concurrent write contention; the caller may retry
    #[error("write conflict on {collection}/{doc_id}")]
    Conflict { collection: String, doc_id: String },

    /// Backend (network, driver) failure
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Stored data did not decode into the expected shape
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether retrying the same write may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors raised by a
/// [`TextCompletionService`](crate::traits::ai::TextCompletionService).
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Network failure or timeout
    #[error("transport error: {0}")]
    Transport(String),

    /// Credentials rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Non-2xx response, rate limit, invalid request
    #[error("API error: {0}")]
    Api(String),

    /// Missing API key or invalid settings
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider answered without any content
    #[error("empty completion")]
    Empty,
}

/// EventExtractor could not obtain usable events from an article.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("completion failed: {0}")]
    Service(#[from] CompletionError),

    #[error("unparseable extraction response: {0}")]
    Parse(String),
}

/// EventClassifier answered with a pair outside the taxonomy.
#[derive(Debug, Error)]
pub enum ClassificationRejected {
    #[error("classification call failed: {0}")]
    Service(#[from] CompletionError),

    #[error("unparseable classification response: {0}")]
    Parse(String),

    #[error("unknown main category: {main_category}")]
    UnknownMainCategory { main_category: String },

    #[error("subcategory {subcategory:?} does not belong to {main_category:?}")]
    SubcategoryMismatch {
        main_category: String,
        subcategory: String,
    },
}

/// The MERGE/ADD decision could not be honoured as given.
#[derive(Debug, Error)]
pub enum CurationDecisionError {
    #[error("decision call failed: {0}")]
    Service(#[from] CompletionError),

    #[error("unparseable decision response: {0}")]
    Parse(String),

    #[error("unknown decision: {0}")]
    UnknownDecision(String),

    #[error("merge target not found: {0}")]
    TargetNotFound(String),

    #[error("merge without updated_event_json")]
    MissingUpdate,

    #[error("updated event rejected: {0}")]
    InvalidUpdate(String),
}

/// A timeline point's date could not be reduced to a canonical granularity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DateValidationError {
    #[error("date is empty")]
    Empty,

    #[error("unrecognized date format: {0}")]
    Format(String),

    #[error("not a calendar date: {0}")]
    Calendar(String),

    #[error("relative date {0:?} needs a publication date")]
    MissingReference(String),
}

/// Result type alias for timeline operations.
pub type Result<T> = std::result::Result<T, TimelineError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for completion calls.
pub type CompletionResult<T> = std::result::Result<T, CompletionError>;
