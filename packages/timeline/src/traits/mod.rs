//! Core trait abstractions for the timeline library.
//!
//! These traits define the interfaces that applications implement
//! to provide article ingestion, LLM completion and document storage.

pub mod ai;
pub mod source;
pub mod store;
