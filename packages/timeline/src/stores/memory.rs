//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{
    Document, DocumentStore, FieldPath, Filter, SetOptions, StoredDocument, Version,
    VersionedDocument,
};

type Collections = HashMap<String, IndexMap<String, Entry>>;

#[derive(Debug, Clone)]
struct Entry {
    data: Document,
    version: Version,
}

impl Entry {
    fn new(data: Document) -> Self {
        Self { data, version: 1 }
    }

    fn touch(&mut self) {
        self.version += 1;
    }
}

/// In-memory document store.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart. Documents keep insertion order within a
/// collection, so queries return them in the order they were created.
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Get the number of documents in a collection.
    pub fn document_count(&self, collection: &str) -> StoreResult<usize> {
        Ok(self.read()?.get(collection).map_or(0, IndexMap::len))
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Collections>> {
        self.collections.read().map_err(|_| Self::poisoned())
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Collections>> {
        self.collections.write().map_err(|_| Self::poisoned())
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("memory store lock poisoned".into())
    }

    fn conflict(collection: &str, doc_id: &str) -> StoreError {
        StoreError::Conflict {
            collection: collection.to_string(),
            doc_id: doc_id.to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, doc_id: &str) -> StoreResult<Option<Document>> {
        Ok(self
            .read()?
            .get(collection)
            .and_then(|docs| docs.get(doc_id))
            .map(|entry| entry.data.clone()))
    }

    async fn set(
        &self,
        collection: &str,
        doc_id: &str,
        data: Document,
        options: SetOptions,
    ) -> StoreResult<()> {
        let mut collections = self.write()?;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.get_mut(doc_id) {
            Some(existing) => {
                if options.merge {
                    existing.data.extend(data);
                } else {
                    existing.data = data;
                }
                existing.touch();
            }
            None => {
                docs.insert(doc_id.to_string(), Entry::new(data));
            }
        }
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        doc_id: &str,
        field_path: &FieldPath,
        value: Value,
    ) -> StoreResult<()> {
        let mut collections = self.write()?;
        let entry = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(doc_id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                doc_id: doc_id.to_string(),
            })?;
        field_path.assign(&mut entry.data, value);
        entry.touch();
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> StoreResult<Vec<StoredDocument>> {
        Ok(self
            .read()?
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, entry)| filters.iter().all(|f| f.matches(&entry.data)))
                    .map(|(id, entry)| StoredDocument {
                        id: id.clone(),
                        data: entry.data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_versioned(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> StoreResult<Option<VersionedDocument>> {
        Ok(self
            .read()?
            .get(collection)
            .and_then(|docs| docs.get(doc_id))
            .map(|entry| VersionedDocument {
                data: entry.data.clone(),
                version: entry.version,
            }))
    }

    async fn update_if(
        &self,
        collection: &str,
        doc_id: &str,
        field_path: &FieldPath,
        value: Value,
        expected: Option<Version>,
    ) -> StoreResult<()> {
        let mut collections = self.write()?;
        let docs = collections.entry(collection.to_string()).or_default();
        match expected {
            Some(version) => match docs.get_mut(doc_id) {
                Some(entry) if entry.version == version => {
                    field_path.assign(&mut entry.data, value);
                    entry.touch();
                    Ok(())
                }
                _ => Err(Self::conflict(collection, doc_id)),
            },
            None if docs.contains_key(doc_id) => Err(Self::conflict(collection, doc_id)),
            None => {
                let mut data = Document::new();
                field_path.assign(&mut data, value);
                docs.insert(doc_id.to_string(), Entry::new(data));
                Ok(())
            }
        }
    }
}
