//! Event extraction - one article in, zero or more candidate events out.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{DateValidationError, ExtractionError};
use crate::pipeline::dates::{is_valid_date, DateNormalizer};
use crate::pipeline::oracle::{ask, Oracle};
use crate::pipeline::prompts::{
    format_extract_prompt, format_resolve_date_prompt, EXTRACT_SYSTEM, RESOLVE_DATE_SYSTEM,
};
use crate::traits::ai::TextCompletionService;
use crate::types::{
    article::RawArticle,
    config::TimelineConfig,
    event::{Event, TimelinePoint},
};

/// Raw extraction response from the AI (before validation).
#[derive(Debug, Clone, Deserialize)]
pub struct AIExtractionResponse {
    pub events: Vec<serde_json::Value>,
}

/// One event as the AI wrote it; fields are optional so that a single
/// malformed entry does not sink the rest.
#[derive(Debug, Clone, Deserialize)]
struct AIEvent {
    event_title: Option<String>,
    #[serde(default)]
    event_summary: Option<String>,
    timeline_points: Option<Vec<AIPoint>>,
}

#[derive(Debug, Clone, Deserialize)]
struct AIPoint {
    #[serde(default)]
    date: Option<serde_json::Value>,
    #[serde(default, alias = "event")]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AIResolvedDate {
    date: Option<String>,
}

/// What one extraction call produced, with the skips that were absorbed.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub events: Vec<Event>,

    /// Set when the whole response was unusable.
    pub failure: Option<ExtractionError>,

    /// Events dropped for missing title or points.
    pub malformed_events: usize,

    /// Points dropped because their date could not be validated.
    pub dropped_points: Vec<(String, DateValidationError)>,
}

/// Turns articles into uncategorized candidate events.
pub struct EventExtractor<A: TextCompletionService> {
    ai: Arc<A>,
    config: TimelineConfig,
}

impl<A: TextCompletionService> EventExtractor<A> {
    pub fn new(ai: Arc<A>, config: TimelineConfig) -> Self {
        Self { ai, config }
    }

    /// Extract candidates from one article.
    ///
    /// Never fails: an unusable response yields an empty outcome with
    /// `failure` set, so the article can still be marked consumed.
    pub async fn extract(&self, figure_id: &str, article: &RawArticle) -> ExtractionOutcome {
        let user = format_extract_prompt(figure_id, article, self.config.max_article_chars);

        let response: AIExtractionResponse = match ask(&*self.ai, EXTRACT_SYSTEM, &user).await {
            Oracle::Parsed(response) => response,
            Oracle::ParseError { reason, .. } => {
                warn!(source_id = %article.source_id, %reason, "Unparseable extraction response");
                return ExtractionOutcome {
                    failure: Some(ExtractionError::Parse(reason)),
                    ..Default::default()
                };
            }
            Oracle::ServiceError(e) => {
                warn!(source_id = %article.source_id, error = %e, "Extraction call failed");
                return ExtractionOutcome {
                    failure: Some(ExtractionError::Service(e)),
                    ..Default::default()
                };
            }
        };

        let normalizer = DateNormalizer::new(
            article.publication_date,
            &article.body,
            self.config.max_year_drift,
        );

        let mut outcome = ExtractionOutcome::default();
        for value in response.events {
            let Ok(raw) = serde_json::from_value::<AIEvent>(value) else {
                outcome.malformed_events += 1;
                continue;
            };
            let (Some(title), Some(points)) = (raw.event_title, raw.timeline_points) else {
                outcome.malformed_events += 1;
                continue;
            };
            let title = title.trim().to_string();
            if title.is_empty() {
                outcome.malformed_events += 1;
                continue;
            }

            let mut kept = Vec::with_capacity(points.len());
            for point in points {
                let raw_date = match point.date {
                    Some(serde_json::Value::String(s)) => s,
                    Some(serde_json::Value::Number(n)) => n.to_string(),
                    _ => String::new(),
                };
                let description = point.description.unwrap_or_default();
                match self.resolve_date(&normalizer, article, &raw_date, &description).await {
                    Ok(date) => kept.push(
                        TimelinePoint::new(date, description.trim())
                            .with_source(article.source_id.clone()),
                    ),
                    Err(e) => {
                        warn!(
                            source_id = %article.source_id,
                            event = %title,
                            date = %raw_date,
                            error = %e,
                            "Dropping timeline point"
                        );
                        outcome.dropped_points.push((title.clone(), e));
                    }
                }
            }

            if kept.is_empty() {
                debug!(event = %title, "Event has no valid timeline points");
                outcome.malformed_events += 1;
                continue;
            }

            let mut event = Event::new(title, raw.event_summary.unwrap_or_default(), kept);
            event.sort_points();
            outcome.events.push(event);
        }

        debug!(
            source_id = %article.source_id,
            events = outcome.events.len(),
            malformed = outcome.malformed_events,
            dropped_points = outcome.dropped_points.len(),
            "Extracted events"
        );
        outcome
    }

    /// Deterministic rules first, then (if enabled) the model's opinion.
    async fn resolve_date(
        &self,
        normalizer: &DateNormalizer<'_>,
        article: &RawArticle,
        raw_date: &str,
        description: &str,
    ) -> Result<String, DateValidationError> {
        let err = match normalizer.normalize(raw_date) {
            Ok(date) => return Ok(date),
            Err(e) => e,
        };

        let retryable = matches!(
            err,
            DateValidationError::Format(_) | DateValidationError::MissingReference(_)
        );
        if !self.config.llm_date_fallback || !retryable {
            return Err(err);
        }

        let published = article
            .publication_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let user = format_resolve_date_prompt(raw_date, &published, description);

        match ask::<AIResolvedDate, _>(&*self.ai, RESOLVE_DATE_SYSTEM, &user).await {
            Oracle::Parsed(AIResolvedDate { date: Some(date) }) => {
                let resolved = normalizer.accept_absolute(&date)?;
                debug_assert!(is_valid_date(&resolved));
                debug!(original = %raw_date, %resolved, "Date resolved by fallback");
                Ok(resolved)
            }
            _ => Err(err),
        }
    }
}
