//! Curated timeline persistence on top of any [`DocumentStore`].
//!
//! Layout: `figures/{figureId}/curatedTimeline/{mainCategory}` holds a
//! `subcategory -> [Event]` map. Writes touch exactly one subcategory key
//! through a nested-field update conditioned on the version that was read,
//! so sibling subcategories and concurrent writers are never clobbered.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::traits::store::{timeline_collection, DocumentStore, FieldPath};
use crate::types::{config::TimelineConfig, event::Event, timeline::TimelineDocument};

/// Reads and writes curated timeline documents.
pub struct TimelineStore<S: DocumentStore> {
    store: Arc<S>,
    config: TimelineConfig,
}

impl<S: DocumentStore> TimelineStore<S> {
    pub fn new(store: Arc<S>, config: TimelineConfig) -> Self {
        Self { store, config }
    }

    /// Load the whole main-category document (empty if never written).
    pub async fn load(&self, figure_id: &str, main_category: &str) -> StoreResult<TimelineDocument> {
        let collection = timeline_collection(figure_id);
        match self.store.get(&collection, main_category).await? {
            Some(doc) => TimelineDocument::from_document(&doc),
            None => Ok(TimelineDocument::new()),
        }
    }

    /// Load every main-category document that exists for a figure.
    pub async fn load_all(&self, figure_id: &str) -> StoreResult<Vec<(String, TimelineDocument)>> {
        let collection = timeline_collection(figure_id);
        let docs = self.store.query(&collection, &[]).await?;
        docs.into_iter()
            .map(|d| Ok((d.id, TimelineDocument::from_document(&d.data)?)))
            .collect()
    }

    /// Curated events for one subcategory.
    pub async fn events(
        &self,
        figure_id: &str,
        main_category: &str,
        subcategory: &str,
    ) -> StoreResult<Vec<Event>> {
        Ok(self
            .load(figure_id, main_category)
            .await?
            .events(subcategory)
            .to_vec())
    }

    /// Read-modify-write one subcategory list.
    ///
    /// `mutate` is applied to a freshly read list and the write only lands
    /// if the document is unchanged since that read. On a conflict the list
    /// is re-read and `mutate` re-applied, up to `write_retries` extra
    /// attempts. Returns the list as written.
    pub async fn modify_subcategory<F>(
        &self,
        figure_id: &str,
        main_category: &str,
        subcategory: &str,
        mut mutate: F,
    ) -> StoreResult<Vec<Event>>
    where
        F: FnMut(&mut Vec<Event>) + Send,
    {
        let collection = timeline_collection(figure_id);
        let field = FieldPath::new(subcategory);
        let mut attempt = 0;
        loop {
            let current = self.store.get_versioned(&collection, main_category).await?;
            let (mut events, expected) = match current {
                Some(doc) => (
                    TimelineDocument::from_document(&doc.data)?
                        .events(subcategory)
                        .to_vec(),
                    Some(doc.version),
                ),
                None => {
                    debug!(figure_id, main_category, "Creating curated timeline document");
                    (Vec::new(), None)
                }
            };
            mutate(&mut events);
            events.iter_mut().for_each(Event::refresh_years);

            let value = serde_json::to_value(&events)?;
            match self
                .store
                .update_if(&collection, main_category, &field, value, expected)
                .await
            {
                Ok(()) => return Ok(events),
                Err(e) if e.is_conflict() && attempt < self.config.write_retries => {
                    attempt += 1;
                    warn!(
                        figure_id,
                        main_category,
                        subcategory,
                        attempt,
                        "Write conflict on curated timeline, retrying"
                    );
                    tokio::time::sleep(self.config.backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Serialize a figure's timeline for display or export.
pub fn timeline_to_json(docs: &[(String, TimelineDocument)]) -> Value {
    let map = docs
        .iter()
        .map(|(main, doc)| (main.clone(), serde_json::to_value(doc).unwrap_or(Value::Null)))
        .collect();
    Value::Object(map)
}
