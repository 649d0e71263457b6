//! Configuration for the curation pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for extraction, date handling and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Largest accepted gap (in years) between an extracted absolute year
    /// and the article's year, unless the body mentions that year.
    ///
    /// Default: 3.
    pub max_year_drift: i32,

    /// Extra attempts for a timeline write that hit a write conflict.
    ///
    /// Default: 3.
    pub write_retries: u32,

    /// Base backoff between conflicting writes; doubles per attempt.
    ///
    /// Default: 50ms.
    pub retry_backoff_ms: u64,

    /// Ask the completion service to resolve dates the rules cannot.
    ///
    /// Default: false.
    pub llm_date_fallback: bool,

    /// Article body characters sent to the extractor.
    ///
    /// Default: 12000.
    pub max_article_chars: usize,

    /// Figures curated concurrently by `process_figures`.
    ///
    /// Default: 4.
    pub figure_concurrency: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            max_year_drift: 3,
            write_retries: 3,
            retry_backoff_ms: 50,
            llm_date_fallback: false,
            max_article_chars: 12000,
            figure_concurrency: 4,
        }
    }
}

impl TimelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_year_drift(mut self, years: i32) -> Self {
        self.max_year_drift = years;
        self
    }

    pub fn with_write_retries(mut self, retries: u32) -> Self {
        self.write_retries = retries;
        self
    }

    pub fn with_retry_backoff_ms(mut self, ms: u64) -> Self {
        self.retry_backoff_ms = ms;
        self
    }

    pub fn with_llm_date_fallback(mut self, enabled: bool) -> Self {
        self.llm_date_fallback = enabled;
        self
    }

    pub fn with_max_article_chars(mut self, chars: usize) -> Self {
        self.max_article_chars = chars;
        self
    }

    pub fn with_figure_concurrency(mut self, n: usize) -> Self {
        self.figure_concurrency = n.max(1);
        self
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(10);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: TimelineConfig =
            serde_json::from_str(r#"{"max_year_drift": 5}"#).unwrap();
        assert_eq!(config.max_year_drift, 5);
        assert_eq!(config.write_retries, 3);
        assert!(!config.llm_date_fallback);
    }

    #[test]
    fn test_backoff_doubles() {
        let config = TimelineConfig::new().with_retry_backoff_ms(10);
        assert_eq!(config.backoff(1), Duration::from_millis(10));
        assert_eq!(config.backoff(3), Duration::from_millis(40));
    }
}
