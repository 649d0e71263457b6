//! Document store trait.
//!
//! Models a Firestore-like database: collections of JSON documents keyed
//! by id, whole-document and merge writes, nested-field updates, and
//! simple equality queries. Collection paths are slash-separated, e.g.
//! `figures/iu/curatedTimeline`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::StoreResult;

/// A decoded document body.
pub type Document = Map<String, Value>;

/// A document together with its id, as returned by queries.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

/// Write counter of a stored document, bumped by every write.
pub type Version = i64;

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    pub data: Document,
    pub version: Version,
}

/// Options for [`DocumentStore::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Merge top-level keys into an existing document instead of replacing it.
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }

    pub fn overwrite() -> Self {
        Self { merge: false }
    }
}

/// Path to a (possibly nested) field, one segment per map level.
///
/// Segments are kept verbatim, so field names containing dots or spaces
/// (`"Film & TV"`) need no quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// A single top-level field.
    pub fn new(field: impl Into<String>) -> Self {
        Self(vec![field.into()])
    }

    /// A nested path.
    pub fn from_segments(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Read the value this path points at inside `doc`.
    pub fn lookup<'a>(&self, doc: &'a Document) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        let mut current = doc.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Write `value` at this path inside `doc`, creating intermediate maps.
    ///
    /// Non-object intermediates are replaced by maps.
    pub fn assign(&self, doc: &mut Document, value: Value) {
        let Some((last, parents)) = self.0.split_last() else {
            return;
        };
        let mut current = doc;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = match entry {
                Value::Object(map) => map,
                _ => unreachable!("entry was just made an object"),
            };
        }
        current.insert(last.clone(), value);
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Query predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field at `path` equals `value`. Documents without the field never match.
    Eq { path: FieldPath, value: Value },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            path: FieldPath::new(field),
            value: value.into(),
        }
    }

    /// Evaluate the predicate against a decoded document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq { path, value } => path.lookup(doc) == Some(value),
        }
    }
}

/// Abstract document database.
///
/// Every method is a suspension point; implementations must not hold
/// locks across awaits of their own callers.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document.
    async fn get(&self, collection: &str, doc_id: &str) -> StoreResult<Option<Document>>;

    /// Create or write a document. With `merge`, only the given top-level
    /// keys are replaced; other keys survive.
    async fn set(
        &self,
        collection: &str,
        doc_id: &str,
        data: Document,
        options: SetOptions,
    ) -> StoreResult<()>;

    /// Replace a single nested field of an existing document.
    ///
    /// Fails with [`StoreError::NotFound`](crate::error::StoreError::NotFound)
    /// when the document does not exist.
    async fn update(
        &self,
        collection: &str,
        doc_id: &str,
        field_path: &FieldPath,
        value: Value,
    ) -> StoreResult<()>;

    /// All documents in `collection` matching every filter, in store order.
    async fn query(&self, collection: &str, filters: &[Filter])
        -> StoreResult<Vec<StoredDocument>>;

    /// Fetch one document with its current version.
    async fn get_versioned(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> StoreResult<Option<VersionedDocument>>;

    /// Replace a single nested field, provided the document is still at
    /// `expected`.
    ///
    /// `expected == None` requires the document to be absent; it is then
    /// created holding only that field. Any other state, including a
    /// document deleted since it was read, fails with
    /// [`StoreError::Conflict`](crate::error::StoreError::Conflict).
    async fn update_if(
        &self,
        collection: &str,
        doc_id: &str,
        field_path: &FieldPath,
        value: Value,
        expected: Option<Version>,
    ) -> StoreResult<()>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn get(&self, collection: &str, doc_id: &str) -> StoreResult<Option<Document>> {
        (**self).get(collection, doc_id).await
    }

    async fn set(
        &self,
        collection: &str,
        doc_id: &str,
        data: Document,
        options: SetOptions,
    ) -> StoreResult<()> {
        (**self).set(collection, doc_id, data, options).await
    }

    async fn update(
        &self,
        collection: &str,
        doc_id: &str,
        field_path: &FieldPath,
        value: Value,
    ) -> StoreResult<()> {
        (**self).update(collection, doc_id, field_path, value).await
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> StoreResult<Vec<StoredDocument>> {
        (**self).query(collection, filters).await
    }

    async fn get_versioned(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> StoreResult<Option<VersionedDocument>> {
        (**self).get_versioned(collection, doc_id).await
    }

    async fn update_if(
        &self,
        collection: &str,
        doc_id: &str,
        field_path: &FieldPath,
        value: Value,
        expected: Option<Version>,
    ) -> StoreResult<()> {
        (**self)
            .update_if(collection, doc_id, field_path, value, expected)
            .await
    }
}

/// Collection holding a figure's ingested articles.
pub fn articles_collection(figure_id: &str) -> String {
    format!("figures/{}/articleSummaries", figure_id)
}

/// Collection holding a figure's curated timeline documents.
pub fn timeline_collection(figure_id: &str) -> String {
    format!("figures/{}/curatedTimeline", figure_id)
}
