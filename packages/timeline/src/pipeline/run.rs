//! Per-figure curation pass: extract → classify → curate → mark processed.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Result, TimelineError};
use crate::pipeline::{
    classify::EventClassifier, curate::CurationEngine, extract::EventExtractor,
    ledger::ProcessingLedger,
};
use crate::stores::timeline::TimelineStore;
use crate::traits::{ai::TextCompletionService, source::RawArticleSource, store::DocumentStore};
use crate::types::{article::RawArticle, config::TimelineConfig, taxonomy::Taxonomy};

/// Result of one figure's curation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FigureReport {
    pub figure_id: String,

    /// Articles fully curated and marked processed
    pub articles_processed: usize,

    /// Article left unmarked because a store operation failed. The pass
    /// stops there so later articles wait for it.
    pub failed_articles: Vec<String>,

    /// Articles whose extraction response was unusable
    pub extraction_failures: usize,

    /// Candidate events produced by extraction
    pub events_extracted: usize,

    /// Events skipped by the fail-closed classifier
    pub classification_rejections: usize,

    /// Candidates folded into an existing entry
    pub merges: usize,

    /// Candidates appended as new entries
    pub appends: usize,

    /// Appends that happened because a MERGE could not be honoured
    pub merge_fallbacks: usize,

    /// Timeline points dropped during date validation
    pub dropped_points: usize,

    /// The pass stopped early on cancellation
    pub cancelled: bool,
}

impl FigureReport {
    pub fn new(figure_id: impl Into<String>) -> Self {
        Self {
            figure_id: figure_id.into(),
            ..Default::default()
        }
    }

    /// Check if every fetched article was consumed.
    pub fn is_success(&self) -> bool {
        self.failed_articles.is_empty() && !self.cancelled
    }
}

/// Wires the pipeline stages over one store and one completion service.
pub struct TimelinePipeline<S: DocumentStore, A: TextCompletionService> {
    ai: Arc<A>,
    extractor: EventExtractor<A>,
    classifier: EventClassifier<A>,
    curator: CurationEngine<S, A>,
    ledger: ProcessingLedger<S>,
    config: TimelineConfig,
    cancel: CancellationToken,
}

impl<S: DocumentStore, A: TextCompletionService> TimelinePipeline<S, A> {
    pub fn new(store: Arc<S>, ai: Arc<A>, config: TimelineConfig) -> Self {
        Self {
            extractor: EventExtractor::new(ai.clone(), config.clone()),
            classifier: EventClassifier::new(ai.clone(), Taxonomy::standard()),
            curator: CurationEngine::new(ai.clone(), store.clone(), config.clone()),
            ai,
            ledger: ProcessingLedger::new(store),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Classify against a different taxonomy.
    pub fn with_taxonomy(mut self, taxonomy: Taxonomy) -> Self {
        self.classifier = EventClassifier::new(self.ai.clone(), taxonomy);
        self
    }

    /// Stop between articles once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn ledger(&self) -> &ProcessingLedger<S> {
        &self.ledger
    }

    pub fn timeline(&self) -> &TimelineStore<S> {
        self.curator.timeline()
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Curate every unprocessed article of one figure, oldest first.
    ///
    /// Fails only if the unprocessed scan itself fails. An article whose
    /// events could not be persisted is reported and ends the pass; it and
    /// every later article stay unmarked, so the next run resumes there in
    /// ingestion order.
    pub async fn process_figure(&self, figure_id: &str) -> Result<FigureReport> {
        let mut report = FigureReport::new(figure_id);
        let articles = self.ledger.fetch_unconsumed(figure_id).await?;
        info!(figure_id, articles = articles.len(), "Curating figure");

        for article in &articles {
            if self.cancel.is_cancelled() {
                info!(figure_id, "Cancelled, stopping before next article");
                report.cancelled = true;
                break;
            }

            let persisted = match self.process_article(figure_id, article, &mut report).await {
                Ok(()) => self.ledger.mark_processed(figure_id, &article.source_id).await,
                Err(e) => Err(e),
            };

            match persisted {
                Ok(()) => report.articles_processed += 1,
                Err(e) => {
                    warn!(
                        figure_id,
                        source_id = %article.source_id,
                        error = %e,
                        "Article left unprocessed"
                    );
                    report.failed_articles.push(article.source_id.clone());
                    break;
                }
            }
        }

        info!(
            figure_id,
            processed = report.articles_processed,
            failed = report.failed_articles.len(),
            events = report.events_extracted,
            rejected = report.classification_rejections,
            merges = report.merges,
            appends = report.appends,
            fallbacks = report.merge_fallbacks,
            dropped_points = report.dropped_points,
            "Figure curation complete"
        );
        Ok(report)
    }

    /// Curate several figures, at most `figure_concurrency` at a time.
    pub async fn process_figures(&self, figure_ids: &[String]) -> Vec<(String, Result<FigureReport>)> {
        let semaphore = Arc::new(Semaphore::new(self.config.figure_concurrency.max(1)));

        let runs = figure_ids.iter().map(|figure_id| {
            let semaphore = semaphore.clone();
            async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => self.process_figure(figure_id).await,
                    Err(_) => Err(TimelineError::Cancelled),
                };
                (figure_id.clone(), result)
            }
        });

        join_all(runs).await
    }

    /// One article: every event is classified and curated in order.
    async fn process_article(
        &self,
        figure_id: &str,
        article: &RawArticle,
        report: &mut FigureReport,
    ) -> Result<()> {
        let extraction = self.extractor.extract(figure_id, article).await;
        if extraction.failure.is_some() {
            report.extraction_failures += 1;
        }
        report.events_extracted += extraction.events.len();
        report.dropped_points += extraction.dropped_points.len();

        for event in extraction.events {
            let Ok(classification) = self.classifier.classify(&event).await else {
                report.classification_rejections += 1;
                continue;
            };

            let outcome = self.curator.curate(figure_id, &classification, event).await?;
            if outcome.is_merge() {
                report.merges += 1;
            } else {
                report.appends += 1;
                if outcome.fallback().is_some() {
                    report.merge_fallbacks += 1;
                }
            }
        }

        info!(figure_id, source_id = %article.source_id, "Article curated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::prompts::PromptKind;
    use crate::stores::MemoryStore;
    use crate::testing::{article, FlakyStore, MockCompletion};
    use serde_json::json;

    fn classify(sub: &str) -> serde_json::Value {
        json!({"main_category": "Creative Works", "subcategory": sub})
    }

    #[tokio::test]
    async fn test_zero_event_article_is_consumed() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = TimelinePipeline::new(
            store.clone(),
            Arc::new(MockCompletion::new()),
            TimelineConfig::default(),
        );
        pipeline
            .ledger()
            .record_article("iu", &article("A1", "2022-08-15", "nothing here"))
            .await
            .unwrap();

        let report = pipeline.process_figure("iu").await.unwrap();
        assert_eq!(report.articles_processed, 1);
        assert_eq!(report.events_extracted, 0);
        assert!(pipeline.ledger().is_processed("iu", "A1").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_event_skipped_article_consumed() {
        let ai = MockCompletion::new()
            .respond(
                PromptKind::Extract,
                json!({"events": [
                    {"event_title": "Concert", "timeline_points": [{"date": "2022-07-10", "description": "concert"}]},
                    {"event_title": "Award", "timeline_points": [{"date": "2022-07", "description": "award"}]}
                ]}),
            )
            .respond(PromptKind::Classify, json!({"main_category": "Creative Works", "subcategory": "Concerts & Tours"}))
            .respond(PromptKind::Classify, classify("Awards & Honors"));
        let pipeline = TimelinePipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ai),
            TimelineConfig::default(),
        );
        pipeline
            .ledger()
            .record_article("iu", &article("A1", "2022-08-15", ""))
            .await
            .unwrap();

        let report = pipeline.process_figure("iu").await.unwrap();
        assert_eq!(report.classification_rejections, 1);
        assert_eq!(report.appends, 1);
        assert_eq!(report.articles_processed, 1);

        let docs = pipeline.timeline().load_all("iu").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].1.events("Awards & Honors").len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_leaves_article_unmarked() {
        let flaky = Arc::new(FlakyStore::new(MemoryStore::new()));
        let ai = MockCompletion::new()
            .respond(
                PromptKind::Extract,
                json!({"events": [{"event_title": "Album", "timeline_points": [{"date": "2022-03", "description": "released"}]}]}),
            )
            .respond(PromptKind::Classify, classify("Music"));
        let pipeline = TimelinePipeline::new(flaky.clone(), Arc::new(ai), TimelineConfig::default());
        pipeline
            .ledger()
            .record_article("iu", &article("A1", "2022-08-15", ""))
            .await
            .unwrap();

        pipeline
            .ledger()
            .record_article("iu", &article("A2", "2022-08-16", ""))
            .await
            .unwrap();

        flaky.fail_next_writes(1);
        let report = pipeline.process_figure("iu").await.unwrap();
        assert_eq!(report.failed_articles, vec!["A1".to_string()]);
        assert_eq!(report.articles_processed, 0);
        assert!(!report.is_success());
        assert!(!pipeline.ledger().is_processed("iu", "A1").await.unwrap());
        assert!(!pipeline.ledger().is_processed("iu", "A2").await.unwrap());

        let retry = pipeline.process_figure("iu").await.unwrap();
        assert!(retry.is_success());
        assert_eq!(retry.articles_processed, 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_article() {
        let token = CancellationToken::new();
        let pipeline = TimelinePipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockCompletion::new()),
            TimelineConfig::default(),
        )
        .with_cancellation(token.clone());
        pipeline
            .ledger()
            .record_article("iu", &article("A1", "2022-08-15", ""))
            .await
            .unwrap();

        token.cancel();
        let report = pipeline.process_figure("iu").await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.articles_processed, 0);
        assert!(!pipeline.ledger().is_processed("iu", "A1").await.unwrap());
    }

    #[tokio::test]
    async fn test_process_figures_reports_each() {
        let pipeline = TimelinePipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockCompletion::new()),
            TimelineConfig::default().with_figure_concurrency(1),
        );
        for figure in ["iu", "bts"] {
            pipeline
                .ledger()
                .record_article(figure, &article("A1", "2022-08-15", ""))
                .await
                .unwrap();
        }

        let results = pipeline
            .process_figures(&["iu".to_string(), "bts".to_string()])
            .await;
        assert_eq!(results.len(), 2);
        for (figure, result) in results {
            let report = result.unwrap();
            assert_eq!(report.figure_id, figure);
            assert_eq!(report.articles_processed, 1);
        }
    }
}
