//! Document Store
//!
//! Persistent map doc_id → Document with secondary lookups by lineage,
//! doc_number, and amendment predecessor. All mutation goes through an
//! optimistic compare-and-set on the record's `version_counter`: a commit
//! computed from a stale snapshot is refused with `Conflict`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use tmf_types::{Document, DocumentId, LineageId};

/// Error type for document store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found")]
    NotFound,

    #[error("document already exists")]
    AlreadyExists,

    #[error("stale snapshot")]
    Conflict,

    #[error("storage backend: {0}")]
    Backend(String),
}

/// Abstract persistent document storage
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a fresh record; fails if the id is taken
    async fn insert(&self, doc: &Document) -> Result<(), StoreError>;

    /// Load a snapshot by id
    async fn load(&self, id: DocumentId) -> Result<Document, StoreError>;

    /// Commit an updated record. The stored `version_counter` must equal
    /// the snapshot's; the committed record is returned with the counter
    /// bumped.
    async fn update(&self, doc: &Document) -> Result<Document, StoreError>;

    /// Remove a record under the same compare-and-set discipline
    async fn remove(&self, id: DocumentId, expected_counter: u64) -> Result<Document, StoreError>;

    /// Every stored document; filtering and projection happen above
    async fn list_all(&self) -> Result<Vec<Document>, StoreError>;

    /// All versions sharing a lineage
    async fn find_by_lineage(&self, lineage: LineageId) -> Result<Vec<Document>, StoreError>;

    /// All versions sharing a document number
    async fn find_by_doc_number(&self, number: &str) -> Result<Vec<Document>, StoreError>;

    /// Documents created by amending the given predecessor
    async fn find_amendments_of(
        &self,
        predecessor: DocumentId,
    ) -> Result<Vec<Document>, StoreError>;

    /// Documents carrying a pending supersession marker (reconciler scan)
    async fn find_pending_supersessions(&self) -> Result<Vec<Document>, StoreError>;
}

#[derive(Default)]
struct Inner {
    docs: HashMap<DocumentId, Document>,
    by_lineage: HashMap<LineageId, Vec<DocumentId>>,
    by_number: HashMap<String, Vec<DocumentId>>,
}

/// In-memory document store
#[derive(Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, doc: &Document) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.docs.contains_key(&doc.doc_id) {
            return Err(StoreError::AlreadyExists);
        }
        inner
            .by_lineage
            .entry(doc.lineage_id)
            .or_default()
            .push(doc.doc_id);
        inner
            .by_number
            .entry(doc.doc_number.clone())
            .or_default()
            .push(doc.doc_id);
        inner.docs.insert(doc.doc_id, doc.clone());
        Ok(())
    }

    async fn load(&self, id: DocumentId) -> Result<Document, StoreError> {
        let inner = self.inner.read().await;
        inner.docs.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update(&self, doc: &Document) -> Result<Document, StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner.docs.get_mut(&doc.doc_id).ok_or(StoreError::NotFound)?;
        if stored.version_counter != doc.version_counter {
            return Err(StoreError::Conflict);
        }
        let mut committed = doc.clone();
        committed.version_counter += 1;
        *stored = committed.clone();
        Ok(committed)
    }

    async fn remove(&self, id: DocumentId, expected_counter: u64) -> Result<Document, StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner.docs.get(&id).ok_or(StoreError::NotFound)?;
        if stored.version_counter != expected_counter {
            return Err(StoreError::Conflict);
        }
        let doc = inner.docs.remove(&id).ok_or(StoreError::NotFound)?;
        if let Some(ids) = inner.by_lineage.get_mut(&doc.lineage_id) {
            ids.retain(|d| *d != id);
        }
        if let Some(ids) = inner.by_number.get_mut(&doc.doc_number) {
            ids.retain(|d| *d != id);
        }
        Ok(doc)
    }

    async fn list_all(&self) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.docs.values().cloned().collect())
    }

    async fn find_by_lineage(&self, lineage: LineageId) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        let ids = inner.by_lineage.get(&lineage).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| inner.docs.get(id).cloned())
            .collect())
    }

    async fn find_by_doc_number(&self, number: &str) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        let ids = inner.by_number.get(number).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| inner.docs.get(id).cloned())
            .collect())
    }

    async fn find_amendments_of(
        &self,
        predecessor: DocumentId,
    ) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .docs
            .values()
            .filter(|d| d.amended_from == Some(predecessor))
            .cloned()
            .collect())
    }

    async fn find_pending_supersessions(&self) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .docs
            .values()
            .filter(|d| d.pending_supersession.is_some())
            .cloned()
            .collect())
    }
}
