//! Curation pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Event extraction from raw articles
//! - Date normalization against the publication date
//! - Fail-closed taxonomy classification
//! - MERGE / ADD_AS_NEW curation into the timeline
//! - Processing ledger bookkeeping

pub mod classify;
pub mod curate;
pub mod dates;
pub mod extract;
pub mod ledger;
pub mod oracle;
pub mod prompts;
pub mod run;

pub use classify::{Classification, EventClassifier};
pub use curate::{CurationDecision, CurationEngine, CurationOutcome};
pub use dates::{is_valid_date, DateNormalizer};
pub use extract::{AIExtractionResponse, EventExtractor, ExtractionOutcome};
pub use ledger::{ProcessingLedger, PROCESSED_FIELD};
pub use oracle::{ask, parse_json_response, Oracle};
pub use prompts::{
    format_classify_prompt, format_curate_prompt, format_extract_prompt,
    format_resolve_date_prompt, PromptKind, CLASSIFY_SYSTEM, CURATE_SYSTEM, EXTRACT_SYSTEM,
    RESOLVE_DATE_SYSTEM,
};
pub use run::{FigureReport, TimelinePipeline};
