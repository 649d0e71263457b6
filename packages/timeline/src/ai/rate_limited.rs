//! Rate-limited completion wrapper.
//!
//! Wraps any `TextCompletionService` with rate limiting using the governor
//! crate, to stay under vendor request quotas.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::CompletionResult;
use crate::traits::ai::{CompletionOptions, TextCompletionService};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A completion service wrapper that enforces rate limits.
pub struct RateLimitedCompletion<A: TextCompletionService> {
    inner: A,
    limiter: Arc<DefaultRateLimiter>,
}

impl<A: TextCompletionService> RateLimitedCompletion<A> {
    /// Create a new rate-limited service. A rate of zero is treated as one
    /// request per second.
    pub fn new(inner: A, requests_per_second: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
        Self::with_quota(inner, Quota::per_second(rate))
    }

    /// Create with a custom quota.
    pub fn with_quota(inner: A, quota: Quota) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Create with burst support.
    pub fn with_burst(inner: A, requests_per_second: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
        let burst = NonZeroU32::new(burst).unwrap_or(rate);
        Self::with_quota(inner, Quota::per_second(rate).allow_burst(burst))
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: TextCompletionService> TextCompletionService for RateLimitedCompletion<A> {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> CompletionResult<String> {
        self.limiter.until_ready().await;
        self.inner.complete(system_prompt, user_prompt, options).await
    }
}

/// Extension trait for easy rate limiting.
pub trait CompletionExt: TextCompletionService + Sized {
    /// Wrap this service with rate limiting.
    fn rate_limited(self, requests_per_second: u32) -> RateLimitedCompletion<Self> {
        RateLimitedCompletion::new(self, requests_per_second)
    }
}

impl<A: TextCompletionService + Sized> CompletionExt for A {}
