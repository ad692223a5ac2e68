//! Tail-of-life operations: withdraw, amend, obsolete, archive, delete

use tmf_types::DocumentId;
use tmf_workflow::Event;

use super::projection::{CanAmend, CreatedDocument, DocumentSummary};
use super::{ApiError, DocumentService};

impl DocumentService {
    /// Withdraw an unapproved document from the pipeline
    pub async fn withdraw(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        reason: String,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .apply_event(doc_id, &actor, Event::Withdraw { reason })
            .await?;
        Ok(self.summarize(&doc).await)
    }

    /// Create an amendment of an Approved document
    pub async fn amend(
        &self,
        bearer: &str,
        predecessor_id: DocumentId,
        content: &[u8],
        filename: &str,
        content_type: &str,
        reason: &str,
    ) -> Result<CreatedDocument, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .amend(predecessor_id, &actor, content, filename, content_type, reason)
            .await?;
        Ok(CreatedDocument {
            doc_id: doc.doc_id,
            doc_number: doc.doc_number,
        })
    }

    /// Whether an amendment may be created now, and what blocks it if not
    pub async fn can_amend(
        &self,
        bearer: &str,
        doc_id: DocumentId,
    ) -> Result<CanAmend, ApiError> {
        self.authenticate(bearer).await?;
        let (allowed, in_progress) = self.engine.can_amend(doc_id).await?;
        Ok(CanAmend {
            allowed,
            in_progress,
        })
    }

    /// Quality manager retires an Approved document
    pub async fn mark_obsolete(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        reason: String,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .apply_event(doc_id, &actor, Event::MarkObsolete { reason })
            .await?;
        Ok(self.summarize(&doc).await)
    }

    /// Archivist moves an Approved or Superseded document to the archive
    pub async fn archive(
        &self,
        bearer: &str,
        doc_id: DocumentId,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self.engine.apply_event(doc_id, &actor, Event::Archive).await?;
        Ok(self.summarize(&doc).await)
    }

    /// Hard-remove a Draft or Withdrawn document and its blobs
    pub async fn delete(&self, bearer: &str, doc_id: DocumentId) -> Result<(), ApiError> {
        let actor = self.authenticate(bearer).await?;
        self.engine.delete(doc_id, &actor).await?;
        Ok(())
    }
}
