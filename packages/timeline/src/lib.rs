//! Incremental Timeline Curation Library
//!
//! Turns crawled news articles about public figures into a curated,
//! deduplicated, categorized timeline, one article at a time.
//!
//! # Design Philosophy
//!
//! **"The LLM is a fallible oracle"**
//!
//! - Every completion call returns a tagged result, never a trusted value
//! - Classification is fail-closed against a fixed taxonomy
//! - Curation falls back to appending whenever a MERGE is unusable
//! - Articles are marked processed only after their events are persisted
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use timeline::{MemoryStore, TimelineConfig, TimelinePipeline};
//! use timeline::testing::MockCompletion;
//!
//! let store = Arc::new(MemoryStore::new());
//! let ai = Arc::new(MockCompletion::new());
//! let pipeline = TimelinePipeline::new(store, ai, TimelineConfig::default());
//!
//! pipeline.ledger().record_article("iu", &article).await?;
//! let report = pipeline.process_figure("iu").await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (TextCompletionService, DocumentStore, RawArticleSource)
//! - [`types`] - Articles, events, taxonomy, curated timeline documents
//! - [`pipeline`] - Extraction, classification, curation and the ledger
//! - [`stores`] - Storage implementations (MemoryStore, SqliteStore, TimelineStore)
//! - [`ai`] - OpenAI-compatible completion client (requires `openai` feature)
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod pipeline;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{
    ClassificationRejected, CompletionError, CurationDecisionError, DateValidationError,
    ExtractionError, Result, StoreError, TimelineError,
};
pub use traits::{
    ai::{CompletionOptions, TextCompletionService},
    source::RawArticleSource,
    store::{
        articles_collection, timeline_collection, Document, DocumentStore, FieldPath, Filter,
        SetOptions, StoredDocument, Version, VersionedDocument,
    },
};
pub use types::{
    article::{PublicationDate, RawArticle},
    config::TimelineConfig,
    event::{Event, TimelinePoint},
    taxonomy::Taxonomy,
    timeline::TimelineDocument,
};

// Re-export pipeline components
pub use pipeline::{
    is_valid_date, Classification, CurationDecision, CurationEngine, CurationOutcome,
    DateNormalizer, EventClassifier, EventExtractor, ExtractionOutcome, FigureReport, Oracle,
    ProcessingLedger, TimelinePipeline,
};

// Re-export stores
pub use stores::{timeline_to_json, MemoryStore, TimelineStore};

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;

#[cfg(feature = "openai")]
pub use ai::{OpenAICompletion, RateLimitedCompletion};

// Re-export testing utilities
pub use testing::{FlakyStore, MockCompletion};
