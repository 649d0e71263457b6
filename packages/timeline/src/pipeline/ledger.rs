//! Processing ledger - which articles have been consumed by curation.
//!
//! Each article document under `figures/{figureId}/articleSummaries`
//! carries an `isProcessedForTimeline` flag. The flag flips
//! `false -> true` exactly once, after all of the article's events are
//! durably written, and never flips back. Rows ingested before the flag
//! existed have no flag at all and count as unprocessed.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::traits::source::RawArticleSource;
use crate::traits::store::{
    articles_collection, Document, DocumentStore, FieldPath, Filter, SetOptions, StoredDocument,
};
use crate::types::article::RawArticle;

/// Name of the per-article consumed flag.
pub const PROCESSED_FIELD: &str = "isProcessedForTimeline";

/// Ledger over the article collection of a [`DocumentStore`].
pub struct ProcessingLedger<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> ProcessingLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Record a crawled article with the flag unset.
    ///
    /// Articles are immutable once recorded: returns `false` and writes
    /// nothing if the source id is already present.
    pub async fn record_article(&self, figure_id: &str, article: &RawArticle) -> Result<bool> {
        let collection = articles_collection(figure_id);
        if self.store.get(&collection, &article.source_id).await?.is_some() {
            debug!(figure_id, source_id = %article.source_id, "Article already recorded");
            return Ok(false);
        }

        let mut doc: Document = match serde_json::to_value(article)? {
            Value::Object(map) => map,
            _ => Document::new(),
        };
        doc.insert(PROCESSED_FIELD.to_string(), Value::Bool(false));
        self.store
            .set(&collection, &article.source_id, doc, SetOptions::overwrite())
            .await?;
        Ok(true)
    }

    /// Articles whose flag is `false` or absent, in ingestion order.
    ///
    /// Uses two queries (flag == false, and a full scan for rows missing
    /// the flag) since stores cannot filter on a missing field.
    pub async fn fetch_unprocessed(&self, figure_id: &str) -> Result<Vec<RawArticle>> {
        let collection = articles_collection(figure_id);

        let flagged_false = self
            .store
            .query(&collection, &[Filter::eq(PROCESSED_FIELD, false)])
            .await?;
        let everything = self.store.query(&collection, &[]).await?;

        let positions: HashMap<&str, usize> = everything
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.as_str(), i))
            .collect();

        let mut seen = HashSet::new();
        let legacy = everything
            .iter()
            .filter(|d| !d.data.contains_key(PROCESSED_FIELD));
        let mut pending: Vec<(&StoredDocument, RawArticle)> = Vec::new();
        for doc in flagged_false.iter().chain(legacy) {
            if !seen.insert(doc.id.as_str()) {
                continue;
            }
            match decode_article(doc) {
                Some(article) => pending.push((doc, article)),
                None => warn!(figure_id, doc_id = %doc.id, "Skipping undecodable article"),
            }
        }

        pending.sort_by_key(|(doc, article)| {
            (
                article.ingested_at,
                positions.get(doc.id.as_str()).copied().unwrap_or(usize::MAX),
            )
        });

        Ok(pending.into_iter().map(|(_, article)| article).collect())
    }

    /// Set the flag for one article. Call only after all of its events
    /// have been persisted.
    pub async fn mark_processed(&self, figure_id: &str, source_id: &str) -> Result<()> {
        self.store
            .update(
                &articles_collection(figure_id),
                source_id,
                &FieldPath::new(PROCESSED_FIELD),
                Value::Bool(true),
            )
            .await?;
        debug!(figure_id, source_id, "Marked article processed");
        Ok(())
    }

    /// Whether the article has already been consumed.
    pub async fn is_processed(&self, figure_id: &str, source_id: &str) -> Result<bool> {
        Ok(self
            .store
            .get(&articles_collection(figure_id), source_id)
            .await?
            .and_then(|doc| doc.get(PROCESSED_FIELD).and_then(Value::as_bool))
            .unwrap_or(false))
    }
}

#[async_trait]
impl<S: DocumentStore> RawArticleSource for ProcessingLedger<S> {
    async fn fetch_unconsumed(&self, figure_id: &str) -> Result<Vec<RawArticle>> {
        self.fetch_unprocessed(figure_id).await
    }
}

/// Decode a stored row; the document id is the source id of record.
fn decode_article(doc: &StoredDocument) -> Option<RawArticle> {
    let mut data = doc.data.clone();
    data.remove(PROCESSED_FIELD);
    data.entry("sourceId".to_string())
        .or_insert_with(|| Value::String(doc.id.clone()));
    let mut article: RawArticle = serde_json::from_value(Value::Object(data)).ok()?;
    article.source_id = doc.id.clone();
    Some(article)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::article;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn ledger() -> (ProcessingLedger<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ProcessingLedger::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_recorded_articles_are_unprocessed() {
        let (ledger, _) = ledger();
        assert!(ledger.record_article("iu", &article("A1", "2022-08-15", "b")).await.unwrap());
        assert!(!ledger.record_article("iu", &article("A1", "2022-08-15", "b")).await.unwrap());

        let pending = ledger.fetch_unprocessed("iu").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].source_id, "A1");
        assert!(!ledger.is_processed("iu", "A1").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_processed_is_monotonic() {
        let (ledger, _) = ledger();
        ledger.record_article("iu", &article("A1", "2022-08-15", "")).await.unwrap();
        ledger.record_article("iu", &article("A2", "2022-08-16", "")).await.unwrap();

        ledger.mark_processed("iu", "A1").await.unwrap();
        let ids: Vec<_> = ledger
            .fetch_unprocessed("iu")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.source_id)
            .collect();
        assert_eq!(ids, vec!["A2"]);

        // Re-recording a consumed article must not reset its flag
        ledger.record_article("iu", &article("A1", "2022-08-15", "")).await.unwrap();
        assert!(ledger.is_processed("iu", "A1").await.unwrap());
        assert!(ledger
            .fetch_unprocessed("iu")
            .await
            .unwrap()
            .iter()
            .all(|a| a.source_id != "A1"));
    }

    #[tokio::test]
    async fn test_legacy_rows_without_flag_are_included() {
        let (ledger, store) = ledger();
        store
            .set(
                "figures/iu/articleSummaries",
                "OLD1",
                json!({"title": "old", "body": "legacy row"}).as_object().cloned().unwrap(),
                SetOptions::overwrite(),
            )
            .await
            .unwrap();
        ledger.record_article("iu", &article("A1", "2022-08-15", "")).await.unwrap();

        let ids: Vec<_> = ledger
            .fetch_unprocessed("iu")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.source_id)
            .collect();
        assert_eq!(ids, vec!["OLD1", "A1"]);
    }

    #[tokio::test]
    async fn test_orders_by_ingestion_time() {
        let (ledger, _) = ledger();
        let later = article("LATE", "2022-08-15", "")
            .with_ingested_at(Utc.with_ymd_and_hms(2022, 8, 16, 0, 0, 0).unwrap());
        let earlier = article("EARLY", "2022-08-15", "")
            .with_ingested_at(Utc.with_ymd_and_hms(2022, 8, 15, 0, 0, 0).unwrap());
        ledger.record_article("iu", &later).await.unwrap();
        ledger.record_article("iu", &earlier).await.unwrap();

        let ids: Vec<_> = ledger
            .fetch_unprocessed("iu")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.source_id)
            .collect();
        assert_eq!(ids, vec!["EARLY", "LATE"]);
    }

    #[tokio::test]
    async fn test_mark_unknown_article_fails() {
        let (ledger, _) = ledger();
        assert!(ledger.mark_processed("iu", "nope").await.is_err());
    }
}
