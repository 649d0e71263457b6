//! SQLite storage implementation.
//!
//! A file-based document store for the `curator` binary. Good for:
//! - Local development
//! - Single-server deployments
//! - Testing with persistent data
//!
//! Every document lives in one `documents` table as a JSON object keyed by
//! `(collection, doc_id)`. Writes are compare-and-swap on a per-row
//! `version`, so a concurrent writer surfaces as [`StoreError::Conflict`].

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{
    Document, DocumentStore, FieldPath, Filter, SetOptions, StoredDocument, Version,
    VersionedDocument,
};

/// SQLite-based document store.
pub struct SqliteStore {
    pool: SqlitePool,
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(e))
}

impl SqliteStore {
    /// Create a new SQLite store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://timeline.db` - File-based database
    /// - `sqlite://timeline.db?mode=rwc` - Create if not exists
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        // Each in-memory connection would be its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(backend)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> StoreResult<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                data TEXT NOT NULL DEFAULT '{}',
                version INTEGER NOT NULL DEFAULT 0,
                UNIQUE (collection, doc_id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, seq);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn fetch_row(&self, collection: &str, doc_id: &str) -> StoreResult<Option<DocumentRow>> {
        sqlx::query_as::<_, DocumentRow>(
            "SELECT doc_id, data, version FROM documents WHERE collection = ? AND doc_id = ?",
        )
        .bind(collection)
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)
    }

    /// Replace the data of a row only if nobody wrote it since `version`.
    async fn swap(
        &self,
        collection: &str,
        doc_id: &str,
        data: &Document,
        version: i64,
    ) -> StoreResult<()> {
        let encoded = serde_json::to_string(data)?;
        let result = sqlx::query(
            r#"
            UPDATE documents SET data = ?, version = version + 1
            WHERE collection = ? AND doc_id = ? AND version = ?
            "#,
        )
        .bind(encoded)
        .bind(collection)
        .bind(doc_id)
        .bind(version)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(conflict(collection, doc_id));
        }
        Ok(())
    }

    /// Insert a new row, failing with a conflict if it already exists.
    async fn create(&self, collection: &str, doc_id: &str, data: &Document) -> StoreResult<()> {
        let encoded = serde_json::to_string(data)?;
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, doc_id, data, version)
            VALUES (?, ?, ?, 1)
            ON CONFLICT(collection, doc_id) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(doc_id)
        .bind(encoded)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(conflict(collection, doc_id));
        }
        Ok(())
    }
}

fn conflict(collection: &str, doc_id: &str) -> StoreError {
    StoreError::Conflict {
        collection: collection.to_string(),
        doc_id: doc_id.to_string(),
    }
}

// Row type for sqlx queries
#[derive(Debug, FromRow)]
struct DocumentRow {
    doc_id: String,
    data: String,
    version: i64,
}

impl DocumentRow {
    fn decode(&self) -> StoreResult<Document> {
        match serde_json::from_str(&self.data)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Document::new()),
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, collection: &str, doc_id: &str) -> StoreResult<Option<Document>> {
        match self.fetch_row(collection, doc_id).await? {
            Some(row) => Ok(Some(row.decode()?)),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        collection: &str,
        doc_id: &str,
        data: Document,
        options: SetOptions,
    ) -> StoreResult<()> {
        if options.merge {
            if let Some(row) = self.fetch_row(collection, doc_id).await? {
                let mut existing = row.decode()?;
                existing.extend(data);
                return self.swap(collection, doc_id, &existing, row.version).await;
            }
        }

        let encoded = serde_json::to_string(&data)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, doc_id, data)
            VALUES (?, ?, ?)
            ON CONFLICT(collection, doc_id) DO UPDATE SET
                data = excluded.data,
                version = documents.version + 1
            "#,
        )
        .bind(collection)
        .bind(doc_id)
        .bind(encoded)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        doc_id: &str,
        field_path: &FieldPath,
        value: Value,
    ) -> StoreResult<()> {
        let row = self
            .fetch_row(collection, doc_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                doc_id: doc_id.to_string(),
            })?;

        let mut doc = row.decode()?;
        field_path.assign(&mut doc, value);
        self.swap(collection, doc_id, &doc, row.version).await
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> StoreResult<Vec<StoredDocument>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT doc_id, data, version FROM documents WHERE collection = ? ORDER BY seq",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let data = row.decode()?;
            if filters.iter().all(|f| f.matches(&data)) {
                docs.push(StoredDocument {
                    id: row.doc_id,
                    data,
                });
            }
        }
        Ok(docs)
    }

    async fn get_versioned(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> StoreResult<Option<VersionedDocument>> {
        match self.fetch_row(collection, doc_id).await? {
            Some(row) => Ok(Some(VersionedDocument {
                data: row.decode()?,
                version: row.version,
            })),
            None => Ok(None),
        }
    }

    async fn update_if(
        &self,
        collection: &str,
        doc_id: &str,
        field_path: &FieldPath,
        value: Value,
        expected: Option<Version>,
    ) -> StoreResult<()> {
        let Some(version) = expected else {
            let mut doc = Document::new();
            field_path.assign(&mut doc, value);
            return self.create(collection, doc_id, &doc).await;
        };

        let row = self
            .fetch_row(collection, doc_id)
            .await?
            .filter(|row| row.version == version)
            .ok_or_else(|| conflict(collection, doc_id))?;

        let mut doc = row.decode()?;
        field_path.assign(&mut doc, value);
        self.swap(collection, doc_id, &doc, version).await
    }
}
