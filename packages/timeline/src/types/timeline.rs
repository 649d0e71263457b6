//! Curated timeline document - one per `(figure, main category)`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::traits::store::Document;
use crate::types::event::Event;

/// `subcategory -> events` for one main category of one figure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimelineDocument {
    subcategories: IndexMap<String, Vec<Event>>,
}

impl TimelineDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stored document.
    ///
    /// Keys that are not event lists (bookkeeping fields some writers add)
    /// are skipped rather than failing the whole document.
    pub fn from_document(doc: &Document) -> StoreResult<Self> {
        let mut subcategories = IndexMap::new();
        for (key, value) in doc {
            if !value.is_array() {
                continue;
            }
            let mut events: Vec<Event> = serde_json::from_value(value.clone())?;
            events.iter_mut().for_each(Event::refresh_years);
            subcategories.insert(key.clone(), events);
        }
        Ok(Self { subcategories })
    }

    pub fn events(&self, subcategory: &str) -> &[Event] {
        self.subcategories
            .get(subcategory)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn subcategories(&self) -> impl Iterator<Item = (&str, &[Event])> {
        self.subcategories
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Total number of curated events across subcategories.
    pub fn len(&self) -> usize {
        self.subcategories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_document_skips_non_lists() {
        let doc = json!({
            "Music": [{
                "event_title": "Concert",
                "timeline_points": [{"date": "2022-07-10", "description": "d", "sourceIds": ["A1"]}]
            }],
            "updatedAt": "2024-01-01T00:00:00Z"
        });
        let timeline = TimelineDocument::from_document(doc.as_object().unwrap()).unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.events("Music")[0].years(), &[2022]);
        assert!(timeline.events("Film & TV").is_empty());
    }
}
