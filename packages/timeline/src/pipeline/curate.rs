//! MERGE vs ADD_AS_NEW curation of classified events.
//!
//! Each classified candidate is compared against the curated events of its
//! subcategory. The model either names an existing entry (by exact title)
//! and supplies the complete replacement, or asks for the candidate to be
//! appended. Anything short of a usable MERGE appends the candidate.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{CurationDecisionError, StoreResult};
use crate::pipeline::classify::Classification;
use crate::pipeline::dates::is_valid_date;
use crate::pipeline::oracle::{ask, Oracle};
use crate::pipeline::prompts::{format_curate_prompt, CURATE_SYSTEM};
use crate::stores::timeline::TimelineStore;
use crate::traits::{ai::TextCompletionService, store::DocumentStore};
use crate::types::{
    config::TimelineConfig,
    event::{Event, TimelinePoint},
};

/// Decision as the model wrote it.
#[derive(Debug, Clone, Deserialize)]
struct AIDecision {
    decision: String,
    #[serde(default)]
    target_event_title: Option<String>,
    #[serde(default)]
    updated_event_json: Option<Value>,
}

/// Replacement event as the model wrote it; points are checked one by one.
#[derive(Debug, Clone, Deserialize)]
struct AIUpdatedEvent {
    #[serde(default)]
    event_title: String,
    #[serde(default)]
    event_summary: String,
    #[serde(default)]
    timeline_points: Vec<Value>,
}

/// A validated decision, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum CurationDecision {
    Merge { target_title: String, updated: Event },
    AddAsNew,
}

/// What happened to one candidate.
#[derive(Debug)]
pub enum CurationOutcome {
    /// The candidate was folded into an existing entry.
    Merged { target_title: String },

    /// The candidate was appended. `fallback` is set when the model asked
    /// for something else that could not be honoured.
    Appended {
        fallback: Option<CurationDecisionError>,
    },
}

impl CurationOutcome {
    pub fn is_merge(&self) -> bool {
        matches!(self, Self::Merged { .. })
    }

    pub fn fallback(&self) -> Option<&CurationDecisionError> {
        match self {
            Self::Appended { fallback } => fallback.as_ref(),
            Self::Merged { .. } => None,
        }
    }
}

enum Applied {
    Merged,
    Appended,
    TargetVanished,
}

/// LLM-assisted upsert into the curated timeline.
pub struct CurationEngine<S: DocumentStore, A: TextCompletionService> {
    ai: Arc<A>,
    timeline: TimelineStore<S>,
}

impl<S: DocumentStore, A: TextCompletionService> CurationEngine<S, A> {
    pub fn new(ai: Arc<A>, store: Arc<S>, config: TimelineConfig) -> Self {
        Self {
            ai,
            timeline: TimelineStore::new(store, config),
        }
    }

    pub fn timeline(&self) -> &TimelineStore<S> {
        &self.timeline
    }

    /// Curate one classified candidate and persist the touched subcategory.
    ///
    /// Only store failures are returned; every decision problem is logged
    /// and recovered by appending the candidate.
    pub async fn curate(
        &self,
        figure_id: &str,
        classification: &Classification,
        candidate: Event,
    ) -> StoreResult<CurationOutcome> {
        let Classification {
            main_category,
            subcategory,
        } = classification;

        let mut candidate = candidate.with_category(main_category.clone(), subcategory.clone());
        candidate.refresh_years();

        let curated = self
            .timeline
            .events(figure_id, main_category, subcategory)
            .await?;

        let (decision, mut fallback) = if curated.is_empty() {
            debug!(figure_id, %subcategory, event = %candidate.title, "Empty subcategory, adding");
            (CurationDecision::AddAsNew, None)
        } else {
            match self.decide(classification, &curated, &candidate).await {
                Ok(decision) => (decision, None),
                Err(e) => {
                    warn!(
                        figure_id,
                        %subcategory,
                        event = %candidate.title,
                        error = %e,
                        "Curation decision unusable, adding as new"
                    );
                    (CurationDecision::AddAsNew, Some(e))
                }
            }
        };

        let mut applied = Applied::Appended;
        self.timeline
            .modify_subcategory(figure_id, main_category, subcategory, |events| {
                applied = apply_decision(events, &decision, &candidate);
            })
            .await?;

        let outcome = match (applied, decision) {
            (Applied::Merged, CurationDecision::Merge { target_title, .. }) => {
                debug!(figure_id, %subcategory, merge_target = %target_title, "Merged event");
                CurationOutcome::Merged { target_title }
            }
            (Applied::TargetVanished, CurationDecision::Merge { target_title, .. }) => {
                warn!(
                    figure_id,
                    %subcategory,
                    merge_target = %target_title,
                    "Merge target disappeared before write, added as new"
                );
                fallback = Some(CurationDecisionError::TargetNotFound(target_title));
                CurationOutcome::Appended { fallback }
            }
            _ => {
                debug!(figure_id, %subcategory, event = %candidate.title, "Appended event");
                CurationOutcome::Appended { fallback }
            }
        };
        Ok(outcome)
    }

    /// Ask the model and validate its answer against the curated list.
    pub async fn decide(
        &self,
        classification: &Classification,
        curated: &[Event],
        candidate: &Event,
    ) -> Result<CurationDecision, CurationDecisionError> {
        let user = format_curate_prompt(&classification.subcategory, curated, candidate);
        let answer: AIDecision = match ask(&*self.ai, CURATE_SYSTEM, &user).await {
            Oracle::Parsed(answer) => answer,
            Oracle::ParseError { reason, .. } => return Err(CurationDecisionError::Parse(reason)),
            Oracle::ServiceError(e) => return Err(e.into()),
        };

        match answer.decision.trim() {
            "ADD_AS_NEW" => Ok(CurationDecision::AddAsNew),
            "MERGE" => {
                let title = answer.target_event_title.unwrap_or_default();
                let target = curated
                    .iter()
                    .find(|e| e.title == title)
                    .ok_or_else(|| CurationDecisionError::TargetNotFound(title.clone()))?;
                let raw = match answer.updated_event_json {
                    None | Some(Value::Null) => return Err(CurationDecisionError::MissingUpdate),
                    Some(raw) => raw,
                };
                let updated = harden_update(raw, target, candidate, classification)?;
                let lost = lost_sources(target, &updated);
                if !lost.is_empty() {
                    warn!(merge_target = %title, ?lost, "Merged event no longer cites some sources");
                }
                Ok(CurationDecision::Merge {
                    target_title: title,
                    updated,
                })
            }
            other => Err(CurationDecisionError::UnknownDecision(other.to_string())),
        }
    }
}

fn apply_decision(events: &mut Vec<Event>, decision: &CurationDecision, candidate: &Event) -> Applied {
    match decision {
        CurationDecision::Merge {
            target_title,
            updated,
        } => match events.iter().position(|e| e.title == *target_title) {
            Some(index) => {
                events[index] = updated.clone();
                Applied::Merged
            }
            None => {
                events.push(candidate.clone());
                Applied::TargetVanished
            }
        },
        CurationDecision::AddAsNew => {
            events.push(candidate.clone());
            Applied::Appended
        }
    }
}

/// Enforce the event schema on a MERGE replacement without second-guessing
/// its content.
///
/// Points with invalid dates are dropped. A point with no source ids
/// inherits the candidate's, and ids recorded on the target or candidate
/// for the same moment are unioned back in.
fn harden_update(
    raw: Value,
    target: &Event,
    candidate: &Event,
    classification: &Classification,
) -> Result<Event, CurationDecisionError> {
    // Some models return the event as a JSON string
    let raw = match raw {
        Value::String(s) => serde_json::from_str(&s)
            .map_err(|e| CurationDecisionError::InvalidUpdate(e.to_string()))?,
        other => other,
    };
    let update: AIUpdatedEvent = serde_json::from_value(raw)
        .map_err(|e| CurationDecisionError::InvalidUpdate(e.to_string()))?;

    let title = update.event_title.trim();
    if title.is_empty() {
        return Err(CurationDecisionError::InvalidUpdate(
            "missing event_title".to_string(),
        ));
    }

    let candidate_ids = candidate.source_ids();
    let known: Vec<&TimelinePoint> = target.points().iter().chain(candidate.points()).collect();

    let mut points = Vec::with_capacity(update.timeline_points.len());
    for value in update.timeline_points {
        let Ok(mut point) = serde_json::from_value::<TimelinePoint>(value) else {
            continue;
        };
        point.date = point.date.trim().to_string();
        if !is_valid_date(&point.date) {
            warn!(date = %point.date, "Dropping merged point with invalid date");
            continue;
        }
        if point.source_ids.is_empty() {
            point.source_ids = candidate_ids.clone();
        }
        let inherited: Vec<String> = known
            .iter()
            .filter(|p| p.same_moment(&point))
            .flat_map(|p| p.source_ids.iter().cloned())
            .collect();
        point.source_ids.extend(inherited);
        points.push(point);
    }

    if points.is_empty() {
        return Err(CurationDecisionError::InvalidUpdate(
            "no valid timeline_points".to_string(),
        ));
    }

    let mut event = Event::new(title, update.event_summary.trim(), points).with_category(
        classification.main_category.clone(),
        classification.subcategory.clone(),
    );
    event.sort_points();
    event.refresh_years();
    Ok(event)
}

/// Source ids an update would lose relative to the target.
pub fn lost_sources(target: &Event, updated: &Event) -> BTreeSet<String> {
    let kept = updated.source_ids();
    target
        .source_ids()
        .into_iter()
        .filter(|id| !kept.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::prompts::PromptKind;
    use crate::stores::MemoryStore;
    use crate::testing::{event, FlakyStore, MockCompletion};
    use serde_json::json;

    const MAIN: &str = "Creative Works";
    const SUB: &str = "Awards & Honors";

    fn music() -> Classification {
        Classification {
            main_category: MAIN.to_string(),
            subcategory: SUB.to_string(),
        }
    }

    fn setup(ai: MockCompletion) -> (CurationEngine<MemoryStore, MockCompletion>, Arc<MockCompletion>) {
        let ai = Arc::new(ai);
        let engine = CurationEngine::new(
            ai.clone(),
            Arc::new(MemoryStore::new()),
            TimelineConfig::default().with_retry_backoff_ms(1),
        );
        (engine, ai)
    }

    fn award() -> Event {
        event("Best Female Artist award", "2022-07", "Won the award", "A1")
    }

    #[tokio::test]
    async fn test_empty_subcategory_adds_without_call() {
        let (engine, ai) = setup(MockCompletion::new());
        let outcome = engine.curate("iu", &music(), award()).await.unwrap();

        assert!(matches!(outcome, CurationOutcome::Appended { fallback: None }));
        assert!(ai.calls_of(PromptKind::Curate).is_empty());

        let events = engine.timeline().events("iu", MAIN, SUB).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subcategory.as_deref(), Some(SUB));
        assert_eq!(events[0].years(), &[2022]);
    }

    #[tokio::test]
    async fn test_merge_replaces_target_and_keeps_evidence() {
        let ai = MockCompletion::new().respond(
            PromptKind::Curate,
            json!({
                "decision": "MERGE",
                "target_event_title": "Best Female Artist award",
                "updated_event_json": {
                    "event_title": "Best Female Artist award",
                    "event_summary": "Won the award, ceremony followed",
                    "timeline_points": [
                        {"date": "2022-07", "description": "Won the award", "sourceIds": []},
                        {"date": "2022-08-01", "description": "Ceremony held"}
                    ]
                }
            }),
        );
        let (engine, ai) = setup(ai);
        engine.curate("iu", &music(), award()).await.unwrap();

        let candidate = event("Award ceremony", "2022-08-01", "Ceremony held", "A2");
        let outcome = engine.curate("iu", &music(), candidate).await.unwrap();
        assert!(outcome.is_merge());
        assert_eq!(ai.calls_of(PromptKind::Curate).len(), 1);

        let events = engine.timeline().events("iu", MAIN, SUB).await.unwrap();
        assert_eq!(events.len(), 1);
        let merged = &events[0];
        assert_eq!(merged.points().len(), 2);
        assert!(merged.points()[0].source_ids.contains("A1"));
        assert!(merged.points()[1].source_ids.contains("A2"));
        assert_eq!(merged.main_category.as_deref(), Some(MAIN));
    }

    #[tokio::test]
    async fn test_add_as_new_appends() {
        let ai = MockCompletion::new().respond(PromptKind::Curate, json!({"decision": "ADD_AS_NEW"}));
        let (engine, _) = setup(ai);
        engine.curate("iu", &music(), award()).await.unwrap();
        engine
            .curate("iu", &music(), event("Daesang", "2022-12", "Won daesang", "A3"))
            .await
            .unwrap();

        let events = engine.timeline().events("iu", MAIN, SUB).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_with_unknown_target_falls_back() {
        let ai = MockCompletion::new().respond(
            PromptKind::Curate,
            json!({
                "decision": "MERGE",
                "target_event_title": "Some other award",
                "updated_event_json": {"event_title": "x", "timeline_points": [{"date": "2022", "description": "x"}]}
            }),
        );
        let (engine, _) = setup(ai);
        engine.curate("iu", &music(), award()).await.unwrap();
        let outcome = engine
            .curate("iu", &music(), event("Daesang", "2022-12", "Won daesang", "A3"))
            .await
            .unwrap();

        assert!(matches!(
            outcome.fallback(),
            Some(CurationDecisionError::TargetNotFound(_))
        ));
        let events = engine.timeline().events("iu", MAIN, SUB).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].title, "Daesang");
    }

    #[tokio::test]
    async fn test_unusable_decisions_fall_back_to_add() {
        let cases = [
            json!({"decision": "MERGE", "target_event_title": "Best Female Artist award"}),
            json!({"decision": "SKIP"}),
            json!({
                "decision": "MERGE",
                "target_event_title": "Best Female Artist award",
                "updated_event_json": {"event_title": "x", "timeline_points": [{"date": "2022-13", "description": "bad"}]}
            }),
        ];
        for case in cases {
            let (engine, _) = setup(MockCompletion::new().respond(PromptKind::Curate, case));
            engine.curate("iu", &music(), award()).await.unwrap();
            let outcome = engine
                .curate("iu", &music(), event("Daesang", "2022-12", "Won", "A3"))
                .await
                .unwrap();
            assert!(outcome.fallback().is_some());
            assert_eq!(engine.timeline().events("iu", MAIN, SUB).await.unwrap().len(), 2);
        }

        let (engine, _) = setup(MockCompletion::new().fail_for(PromptKind::Curate, "down"));
        engine.curate("iu", &music(), award()).await.unwrap();
        let outcome = engine
            .curate("iu", &music(), event("Daesang", "2022-12", "Won", "A3"))
            .await
            .unwrap();
        assert!(matches!(
            outcome.fallback(),
            Some(CurationDecisionError::Service(_))
        ));
    }

    #[tokio::test]
    async fn test_merge_drops_points_with_non_ascii_dates() {
        let ai = MockCompletion::new().respond(
            PromptKind::Curate,
            json!({
                "decision": "MERGE",
                "target_event_title": "Best Female Artist award",
                "updated_event_json": {
                    "event_title": "Best Female Artist award",
                    "timeline_points": [
                        {"date": "2022-０７", "description": "Won the award"},
                        {"date": "2022-08-01", "description": "Ceremony held"}
                    ]
                }
            }),
        );
        let (engine, _) = setup(ai);
        engine.curate("iu", &music(), award()).await.unwrap();
        let outcome = engine
            .curate("iu", &music(), event("Award ceremony", "2022-08-01", "Ceremony held", "A2"))
            .await
            .unwrap();
        assert!(outcome.is_merge());

        let events = engine.timeline().events("iu", MAIN, SUB).await.unwrap();
        let dates: Vec<_> = events[0].points().iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2022-08-01"]);
    }

    #[tokio::test]
    async fn test_repeated_merge_is_idempotent() {
        let merged = json!({
            "decision": "MERGE",
            "target_event_title": "Best Female Artist award",
            "updated_event_json": {
                "event_title": "Best Female Artist award",
                "event_summary": "Won the award",
                "timeline_points": [{"date": "2022-07", "description": "Won the award", "sourceIds": ["A1"]}]
            }
        });
        let ai = MockCompletion::new()
            .respond(PromptKind::Curate, merged.clone())
            .respond(PromptKind::Curate, merged);
        let (engine, _) = setup(ai);

        engine.curate("iu", &music(), award()).await.unwrap();
        engine.curate("iu", &music(), award()).await.unwrap();
        let once = engine.timeline().events("iu", MAIN, SUB).await.unwrap();
        engine.curate("iu", &music(), award()).await.unwrap();
        let twice = engine.timeline().events("iu", MAIN, SUB).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
    }

    #[tokio::test]
    async fn test_update_given_as_string_is_accepted() {
        let updated = json!({
            "event_title": "Best Female Artist award",
            "timeline_points": [{"date": "2022-07", "description": "Won the award"}]
        })
        .to_string();
        let ai = MockCompletion::new().respond(
            PromptKind::Curate,
            json!({
                "decision": "MERGE",
                "target_event_title": "Best Female Artist award",
                "updated_event_json": updated
            }),
        );
        let (engine, _) = setup(ai);
        engine.curate("iu", &music(), award()).await.unwrap();
        let outcome = engine
            .curate("iu", &music(), event("Award", "2022-07", "Won the award", "A2"))
            .await
            .unwrap();
        assert!(outcome.is_merge());

        let events = engine.timeline().events("iu", MAIN, SUB).await.unwrap();
        let ids: Vec<_> = events[0].points()[0].source_ids.iter().cloned().collect();
        assert_eq!(ids, vec!["A1", "A2"]);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let flaky = Arc::new(FlakyStore::new(MemoryStore::new()));
        let engine = CurationEngine::new(
            Arc::new(MockCompletion::new()),
            flaky.clone(),
            TimelineConfig::default(),
        );
        flaky.fail_next_writes(1);
        assert!(engine.curate("iu", &music(), award()).await.is_err());
    }

    #[test]
    fn test_lost_sources() {
        let target = event("t", "2022", "d", "A1");
        let updated = event("t", "2022", "d", "A2");
        let lost: Vec<_> = lost_sources(&target, &updated).into_iter().collect();
        assert_eq!(lost, vec!["A1"]);
    }
}
