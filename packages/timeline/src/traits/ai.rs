//! Completion trait for LLM operations.
//!
//! The curation pipeline only ever needs one capability from a model:
//! turn a system prompt plus a user prompt into text. Everything else
//! (schema enforcement, fallbacks) lives in [`crate::pipeline::oracle`],
//! so vendors stay interchangeable.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::CompletionResult;

/// Options for a single completion call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionOptions {
    /// Ask the provider for a JSON object (response_format / JSON mode).
    ///
    /// Providers that cannot enforce this still return text; callers
    /// validate either way.
    pub expect_json: bool,
}

impl CompletionOptions {
    /// Options requesting a JSON object.
    pub fn json() -> Self {
        Self { expect_json: true }
    }

    /// Options for free-form text.
    pub fn text() -> Self {
        Self { expect_json: false }
    }
}

/// A text completion provider (Anthropic, DeepSeek, a local model...).
///
/// Fails with a [`CompletionError`](crate::error::CompletionError) on
/// transport or auth failure. On success, returns whatever the model
/// produced, which may be malformed.
#[async_trait]
pub trait TextCompletionService: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> CompletionResult<String>;
}

#[async_trait]
impl<T: TextCompletionService + ?Sized> TextCompletionService for Arc<T> {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> CompletionResult<String> {
        (**self).complete(system_prompt, user_prompt, options).await
    }
}
