use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use timeline::TimelineConfig;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub llm_requests_per_second: u32,
    pub timeline: TimelineConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let mut timeline = TimelineConfig::default();
        if let Some(drift) = parsed("TIMELINE_MAX_YEAR_DRIFT")? {
            timeline = timeline.with_max_year_drift(drift);
        }
        if let Some(n) = parsed("TIMELINE_FIGURE_CONCURRENCY")? {
            timeline = timeline.with_figure_concurrency(n);
        }
        if let Some(enabled) = parsed("TIMELINE_LLM_DATE_FALLBACK")? {
            timeline = timeline.with_llm_date_fallback(enabled);
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://timeline.db?mode=rwc".to_string()),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_base_url: non_empty("OPENAI_BASE_URL"),
            openai_model: non_empty("OPENAI_MODEL"),
            llm_requests_per_second: parsed("LLM_REQUESTS_PER_SECOND")?.unwrap_or(2),
            timeline,
        })
    }

    /// The API key, required by commands that call the model.
    pub fn require_openai_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY must be set")
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty(name)
        .map(|v| v.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("{} must be a valid value", name))
}
