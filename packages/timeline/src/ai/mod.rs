//! Completion service implementations for the timeline library.
//!
//! This module provides a reference implementation of the
//! `TextCompletionService` trait against any OpenAI-compatible chat API,
//! plus a rate-limiting wrapper. Users can use these directly or implement
//! their own.

mod openai;
mod rate_limited;

pub use openai::OpenAICompletion;
pub use rate_limited::{CompletionExt, RateLimitedCompletion};
