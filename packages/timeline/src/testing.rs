//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the timeline library
//! without making real LLM calls or touching a real database.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{CompletionError, CompletionResult, StoreError, StoreResult};
use crate::pipeline::prompts::PromptKind;
use crate::traits::{
    ai::{CompletionOptions, TextCompletionService},
    store::{
        Document, DocumentStore, FieldPath, Filter, SetOptions, StoredDocument, Version,
        VersionedDocument,
    },
};
use crate::types::{
    article::{PublicationDate, RawArticle},
    event::{Event, TimelinePoint},
};

#[derive(Debug, Clone)]
enum Scripted {
    Answer(String),
    Fail(String),
}

/// A mock completion service for testing.
///
/// Answers are scripted per pipeline stage (recognized from the system
/// prompt) and consumed in order. A stage with nothing queued falls back
/// to the shared queue, then to a stage default:
///
/// - extraction: no events
/// - curation: `ADD_AS_NEW`
/// - date resolution: unresolved
/// - classification: service error (so forgotten scripts fail closed)
#[derive(Default)]
pub struct MockCompletion {
    /// Queued answers per stage
    scripted: Arc<RwLock<HashMap<PromptKind, VecDeque<Scripted>>>>,

    /// Queued answers for any stage
    shared: Arc<RwLock<VecDeque<Scripted>>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockCompletionCall>>>,
}

/// Record of a call made to the mock.
#[derive(Debug, Clone)]
pub struct MockCompletionCall {
    pub kind: PromptKind,
    pub system_prompt: String,
    pub user_prompt: String,
    pub expect_json: bool,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON answer for one stage.
    pub fn respond(self, kind: PromptKind, answer: Value) -> Self {
        self.push(kind, Scripted::Answer(answer.to_string()));
        self
    }

    /// Queue a verbatim answer for whichever stage calls next.
    pub fn respond_raw(self, text: impl Into<String>) -> Self {
        self.shared
            .write()
            .unwrap()
            .push_back(Scripted::Answer(text.into()));
        self
    }

    /// Queue a service failure for whichever stage calls next.
    pub fn fail_next(self, message: impl Into<String>) -> Self {
        self.shared
            .write()
            .unwrap()
            .push_back(Scripted::Fail(message.into()));
        self
    }

    /// Queue a service failure for one stage.
    pub fn fail_for(self, kind: PromptKind, message: impl Into<String>) -> Self {
        self.push(kind, Scripted::Fail(message.into()));
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockCompletionCall> {
        self.calls.read().unwrap().clone()
    }

    /// Calls made by one stage.
    pub fn calls_of(&self, kind: PromptKind) -> Vec<MockCompletionCall> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    fn push(&self, kind: PromptKind, scripted: Scripted) {
        self.scripted
            .write()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(scripted);
    }

    fn next_for(&self, kind: PromptKind) -> Option<Scripted> {
        let queued = self
            .scripted
            .write()
            .unwrap()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        queued.or_else(|| self.shared.write().unwrap().pop_front())
    }

    fn default_for(kind: PromptKind) -> CompletionResult<String> {
        match kind {
            PromptKind::Extract => Ok(r#"{"events": []}"#.to_string()),
            PromptKind::Curate => Ok(r#"{"decision": "ADD_AS_NEW"}"#.to_string()),
            PromptKind::ResolveDate => Ok(r#"{"date": null}"#.to_string()),
            PromptKind::Classify | PromptKind::Other => Err(CompletionError::Api(format!(
                "no scripted answer for {kind:?}"
            ))),
        }
    }
}

#[async_trait]
impl TextCompletionService for MockCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> CompletionResult<String> {
        let kind = PromptKind::of(system_prompt);
        self.calls.write().unwrap().push(MockCompletionCall {
            kind,
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            expect_json: options.expect_json,
        });

        match self.next_for(kind) {
            Some(Scripted::Answer(text)) => Ok(text),
            Some(Scripted::Fail(message)) => Err(CompletionError::Transport(message)),
            None => Self::default_for(kind),
        }
    }
}

/// A store wrapper that injects write failures.
///
/// Reads pass straight through. Each `set`, `update` or `update_if` consumes one
/// injected failure while any remain: conflicts first, then backend
/// errors.
pub struct FlakyStore<S: DocumentStore> {
    inner: S,
    conflicts: AtomicU32,
    failures: AtomicU32,
}

impl<S: DocumentStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            conflicts: AtomicU32::new(0),
            failures: AtomicU32::new(0),
        }
    }

    /// Fail the next `n` writes with [`StoreError::Conflict`].
    pub fn conflict_next_writes(self, n: u32) -> Self {
        self.conflicts.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the next `n` writes with [`StoreError::Backend`].
    pub fn fail_next_writes(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn injected(&self, collection: &str, doc_id: &str) -> StoreResult<()> {
        if Self::take(&self.conflicts) {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                doc_id: doc_id.to_string(),
            });
        }
        if Self::take(&self.failures) {
            return Err(StoreError::Backend("injected write failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for FlakyStore<S> {
    async fn get(&self, collection: &str, doc_id: &str) -> StoreResult<Option<Document>> {
        self.inner.get(collection, doc_id).await
    }

    async fn set(
        &self,
        collection: &str,
        doc_id: &str,
        data: Document,
        options: SetOptions,
    ) -> StoreResult<()> {
        self.injected(collection, doc_id)?;
        self.inner.set(collection, doc_id, data, options).await
    }

    async fn update(
        &self,
        collection: &str,
        doc_id: &str,
        field_path: &FieldPath,
        value: Value,
    ) -> StoreResult<()> {
        self.injected(collection, doc_id)?;
        self.inner.update(collection, doc_id, field_path, value).await
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> StoreResult<Vec<StoredDocument>> {
        self.inner.query(collection, filters).await
    }

    async fn get_versioned(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> StoreResult<Option<VersionedDocument>> {
        self.inner.get_versioned(collection, doc_id).await
    }

    async fn update_if(
        &self,
        collection: &str,
        doc_id: &str,
        field_path: &FieldPath,
        value: Value,
        expected: Option<Version>,
    ) -> StoreResult<()> {
        self.injected(collection, doc_id)?;
        self.inner
            .update_if(collection, doc_id, field_path, value, expected)
            .await
    }
}

/// Article fixture. An empty `published` leaves the date unset.
pub fn article(source_id: &str, published: &str, body: &str) -> RawArticle {
    let mut article = RawArticle::new(source_id)
        .with_title(format!("Article {source_id}"))
        .with_body(body);
    if let Some(date) = PublicationDate::parse(published) {
        article = article.with_publication_date(date);
    }
    article
}

/// Single-point event fixture.
pub fn event(title: &str, date: &str, description: &str, source_id: &str) -> Event {
    Event::new(
        title,
        format!("{title} summary"),
        vec![TimelinePoint::new(date, description).with_source(source_id)],
    )
}
