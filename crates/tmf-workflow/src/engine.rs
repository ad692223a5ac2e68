//! Document Engine
//!
//! Wires the collaborators together: loads a snapshot, asks the state
//! machine for a decision, and commits under the per-document compare-and-
//! set. Blob writes always precede the document writes that reference
//! them. Signing happens between the precondition check and the commit;
//! amendment approvals run the two-phase supersession protocol so a crash
//! mid-flight is recoverable by the reconciler.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use tmf_types::{
    AuditAction, BlobId, Document, DocumentId, LineageId, Principal, PrincipalId, Signature,
    Status, TmfMetadata, WorkflowError,
};

use crate::blob_store::{BlobStore, BlobStoreError};
use crate::crypto::CryptoProvider;
use crate::identity::IdentityDirectory;
use crate::lifecycle;
use crate::sequence::{format_doc_number, SequenceAllocator, DOC_NUMBER_SEQUENCE};
use crate::state_machine::{self, ApprovalDecision, Event, NewRevision, SideEffect};
use crate::store::{DocumentStore, StoreError};

/// Bounded retries for commits refused on a stale snapshot
const CAS_ATTEMPTS: usize = 3;

/// The document lifecycle engine
pub struct DocumentEngine {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    directory: Arc<dyn IdentityDirectory>,
    crypto: Arc<dyn CryptoProvider>,
    sequences: Arc<dyn SequenceAllocator>,
}

impl DocumentEngine {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        directory: Arc<dyn IdentityDirectory>,
        crypto: Arc<dyn CryptoProvider>,
        sequences: Arc<dyn SequenceAllocator>,
    ) -> Self {
        Self {
            documents,
            blobs,
            directory,
            crypto,
            sequences,
        }
    }

    // ── Creation, amendment, deletion ────────────────────────────────

    /// Ingest an authored file as a fresh Draft at version 0.1
    pub async fn create_document(
        &self,
        actor: &Principal,
        content: &[u8],
        filename: &str,
        content_type: &str,
        tmf_metadata: TmfMetadata,
        comment: Option<String>,
    ) -> Result<Document, WorkflowError> {
        validate_upload(content, filename)?;

        // Write order: blob first, then the document that references it
        let blob_id = self.put_blob(content).await?;
        let sequence_value = self
            .sequences
            .next(DOC_NUMBER_SEQUENCE)
            .await
            .map_err(storage_err)?;
        let doc_number = format_doc_number(sequence_value);

        let now = Utc::now();
        let mut doc = Document::create(
            DocumentId::generate(),
            doc_number,
            LineageId::generate(),
            actor.id,
            tmf_metadata,
            tmf_types::Revision {
                blob_id,
                filename: filename.to_string(),
                content_type: content_type.to_string(),
                author_comment: comment,
                uploaded_at: now,
                uploader: actor.id,
            },
            now,
        );
        doc.record(
            AuditAction::Created,
            actor.id,
            &actor.username,
            format!("uploaded {}", filename),
            now,
        );

        self.documents.insert(&doc).await.map_err(storage_err)?;
        info!(doc_id = %doc.doc_id, doc_number = %doc.doc_number, "document created");
        Ok(doc)
    }

    /// Create an amendment of an Approved document (§4.6 uniqueness guard)
    pub async fn amend(
        &self,
        predecessor_id: DocumentId,
        actor: &Principal,
        content: &[u8],
        filename: &str,
        content_type: &str,
        reason: &str,
    ) -> Result<Document, WorkflowError> {
        validate_upload(content, filename)?;

        let predecessor = self.get(predecessor_id).await?;
        lifecycle::ensure_can_amend(&predecessor, actor)?;

        let descendants = self
            .documents
            .find_amendments_of(predecessor_id)
            .await
            .map_err(storage_err)?;
        if let Some(existing) = lifecycle::amendment_in_progress(&descendants) {
            return Err(WorkflowError::DuplicateAmendment {
                existing: existing.doc_id,
            });
        }

        let lineage = self
            .documents
            .find_by_lineage(predecessor.lineage_id)
            .await
            .map_err(storage_err)?;
        let blob_id = self.put_blob(content).await?;
        let doc = lifecycle::build_amendment(
            &predecessor,
            &lineage,
            NewRevision {
                blob_id,
                filename: filename.to_string(),
                content_type: content_type.to_string(),
                comment: None,
            },
            actor,
            reason,
            Utc::now(),
        );
        self.documents.insert(&doc).await.map_err(storage_err)?;
        info!(
            doc_id = %doc.doc_id,
            predecessor = %predecessor_id,
            "amendment created"
        );
        Ok(doc)
    }

    /// Whether an amendment of this document may be created now, and the
    /// in-progress descendant blocking it if not
    pub async fn can_amend(
        &self,
        doc_id: DocumentId,
    ) -> Result<(bool, Option<DocumentId>), WorkflowError> {
        let doc = self.get(doc_id).await?;
        if doc.status != Status::Approved {
            return Ok((false, None));
        }
        let descendants = self
            .documents
            .find_amendments_of(doc_id)
            .await
            .map_err(storage_err)?;
        match lifecycle::amendment_in_progress(&descendants) {
            Some(existing) => Ok((false, Some(existing.doc_id))),
            None => Ok((true, None)),
        }
    }

    /// Hard-remove a Draft or Withdrawn document and its revision blobs.
    /// The document record is the source of truth: blob deletion is
    /// best-effort after the record is gone.
    pub async fn delete(&self, doc_id: DocumentId, actor: &Principal) -> Result<(), WorkflowError> {
        let mut attempts = 0;
        let removed = loop {
            let doc = self.get(doc_id).await?;
            lifecycle::ensure_deletable(&doc, actor)?;
            match self.documents.remove(doc_id, doc.version_counter).await {
                Ok(removed) => break removed,
                Err(StoreError::Conflict) if attempts + 1 < CAS_ATTEMPTS => {
                    attempts += 1;
                    debug!(doc_id = %doc_id, attempts, "delete raced, retrying");
                }
                Err(StoreError::Conflict) => return Err(WorkflowError::Conflict),
                Err(e) => return Err(storage_err(e)),
            }
        };

        self.delete_blobs_best_effort(&removed).await;
        info!(doc_id = %doc_id, "document deleted");
        Ok(())
    }

    /// Blobs are content-addressed and may be shared; only digests no
    /// longer referenced by any surviving document are removed.
    async fn delete_blobs_best_effort(&self, removed: &Document) {
        let survivors = match self.documents.list_all().await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, "blob cleanup skipped, could not list documents");
                return;
            }
        };
        let still_referenced: std::collections::HashSet<&BlobId> = survivors
            .iter()
            .flat_map(|d| d.revisions.iter().map(|r| &r.blob_id))
            .collect();

        for revision in &removed.revisions {
            if still_referenced.contains(&revision.blob_id) {
                continue;
            }
            if let Err(e) = self.blobs.delete(&revision.blob_id).await {
                warn!(blob_id = %revision.blob_id, error = %e, "blob deletion failed");
            }
        }
    }

    // ── Event application ────────────────────────────────────────────

    /// Apply a state-machine event under the per-document serialization
    /// boundary. Final approval takes the signing path; everything else is
    /// a plain load → decide → commit loop.
    pub async fn apply_event(
        &self,
        doc_id: DocumentId,
        actor: &Principal,
        event: Event,
    ) -> Result<Document, WorkflowError> {
        self.validate_event_principals(&event).await?;
        if let Event::FinalApproval {
            decision: ApprovalDecision::Approved,
            comment,
            ..
        } = &event
        {
            return self.final_approve(doc_id, actor, comment.clone()).await;
        }

        for attempt in 0..CAS_ATTEMPTS {
            let doc = self.get(doc_id).await?;
            let outcome = state_machine::apply(doc, event.clone(), actor, Utc::now())?;
            match self.documents.update(&outcome.document).await {
                Ok(stored) => {
                    info!(
                        doc_id = %doc_id,
                        event = event.name(),
                        status = %stored.status,
                        "event committed"
                    );
                    return Ok(stored);
                }
                Err(StoreError::Conflict) => {
                    debug!(doc_id = %doc_id, event = event.name(), attempt, "stale snapshot, retrying");
                }
                Err(e) => return Err(storage_err(e)),
            }
        }
        Err(WorkflowError::Conflict)
    }

    /// Upload a corrected revision while Under Revision
    pub async fn upload_corrected_revision(
        &self,
        doc_id: DocumentId,
        actor: &Principal,
        content: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<Document, WorkflowError> {
        validate_upload(content, filename)?;
        let blob_id = self.put_blob(content).await?;
        self.apply_event(
            doc_id,
            actor,
            Event::UploadCorrectedRevision {
                revision: NewRevision {
                    blob_id,
                    filename: filename.to_string(),
                    content_type: content_type.to_string(),
                    comment: None,
                },
            },
        )
        .await
    }

    /// Upload a revised revision after a hard rejection; returns to Draft
    pub async fn upload_revised_revision(
        &self,
        doc_id: DocumentId,
        actor: &Principal,
        content: &[u8],
        filename: &str,
        content_type: &str,
        comment: Option<String>,
    ) -> Result<Document, WorkflowError> {
        validate_upload(content, filename)?;
        let blob_id = self.put_blob(content).await?;
        self.apply_event(
            doc_id,
            actor,
            Event::UploadRevisedRevision {
                revision: NewRevision {
                    blob_id,
                    filename: filename.to_string(),
                    content_type: content_type.to_string(),
                    comment,
                },
            },
        )
        .await
    }

    /// Final approval with signature binding (§4.5). The signature is
    /// computed over the active revision's bytes with the actor's private
    /// key; any crypto failure aborts the whole event and the document
    /// stays Pending Approval.
    async fn final_approve(
        &self,
        doc_id: DocumentId,
        actor: &Principal,
        comment: Option<String>,
    ) -> Result<Document, WorkflowError> {
        for attempt in 0..CAS_ATTEMPTS {
            let doc = self.get(doc_id).await?;
            state_machine::ensure_final_approval_allowed(&doc, actor)?;

            let revision = doc.current_revision().ok_or_else(|| {
                WorkflowError::InvalidInput("document has no revisions".to_string())
            })?;
            let bytes = self.get_blob(&revision.blob_id).await?;
            let signature_b64 = self
                .crypto
                .sign(actor.private_key_handle, &bytes)
                .await
                .map_err(|e| WorkflowError::SignatureFailed(e.to_string()))?;

            let now = Utc::now();
            let signature = Signature {
                signature_b64,
                signer_principal: actor.id,
                signer_public_key_pem: actor.public_key_pem.clone(),
                signed_at: now,
                signed_blob_id: revision.blob_id.clone(),
            };

            // Phase one of the supersession protocol: mark the predecessor
            // before the amendment flips to Approved.
            if let Some(predecessor) = doc.amended_from {
                self.mark_pending_supersession(predecessor, doc.doc_id)
                    .await?;
            }

            let outcome = state_machine::apply(
                doc,
                Event::FinalApproval {
                    decision: ApprovalDecision::Approved,
                    comment: comment.clone(),
                    signature: Some(signature),
                },
                actor,
                now,
            )?;

            match self.documents.update(&outcome.document).await {
                Ok(stored) => {
                    info!(
                        doc_id = %doc_id,
                        version = %stored.version,
                        signer = %actor.username,
                        "document approved and signed"
                    );
                    if let Some(SideEffect::SupersedePredecessor { predecessor }) = outcome.effect {
                        self.finalize_supersession(predecessor, stored.doc_id, actor)
                            .await;
                    }
                    return Ok(stored);
                }
                Err(StoreError::Conflict) => {
                    debug!(doc_id = %doc_id, attempt, "approval raced, retrying");
                }
                Err(e) => return Err(storage_err(e)),
            }
        }
        Err(WorkflowError::Conflict)
    }

    async fn mark_pending_supersession(
        &self,
        predecessor_id: DocumentId,
        successor_id: DocumentId,
    ) -> Result<(), WorkflowError> {
        for _ in 0..CAS_ATTEMPTS {
            let mut predecessor = self.get(predecessor_id).await?;
            if predecessor.pending_supersession == Some(successor_id) {
                return Ok(());
            }
            if predecessor.status != Status::Approved {
                return Err(WorkflowError::InvalidState {
                    status: predecessor.status,
                    event: "supersede",
                });
            }
            predecessor.pending_supersession = Some(successor_id);
            match self.documents.update(&predecessor).await {
                Ok(_) => return Ok(()),
                Err(StoreError::Conflict) => continue,
                Err(e) => return Err(storage_err(e)),
            }
        }
        Err(WorkflowError::Conflict)
    }

    /// Phase two: flip the predecessor to Superseded. A failure here is
    /// logged, not surfaced — the approval already committed, and the
    /// reconciler finalizes any marker left behind.
    async fn finalize_supersession(
        &self,
        predecessor_id: DocumentId,
        successor_id: DocumentId,
        actor: &Principal,
    ) {
        for _ in 0..CAS_ATTEMPTS {
            let mut predecessor = match self.get(predecessor_id).await {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(predecessor = %predecessor_id, error = %e, "supersession deferred to reconciler");
                    return;
                }
            };
            if predecessor.superseded_by == Some(successor_id) {
                return;
            }
            lifecycle::supersede(
                &mut predecessor,
                successor_id,
                actor.id,
                &actor.username,
                Utc::now(),
            );
            match self.documents.update(&predecessor).await {
                Ok(_) => {
                    info!(predecessor = %predecessor_id, successor = %successor_id, "predecessor superseded");
                    return;
                }
                Err(StoreError::Conflict) => continue,
                Err(e) => {
                    warn!(predecessor = %predecessor_id, error = %e, "supersession deferred to reconciler");
                    return;
                }
            }
        }
        warn!(predecessor = %predecessor_id, "supersession deferred to reconciler after conflicts");
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub async fn get(&self, doc_id: DocumentId) -> Result<Document, WorkflowError> {
        self.documents.load(doc_id).await.map_err(|e| match e {
            StoreError::NotFound => WorkflowError::NotFound(format!("document {}", doc_id)),
            other => storage_err(other),
        })
    }

    /// All versions of a lineage, oldest first by (major, minor)
    pub async fn lineage(&self, lineage_id: LineageId) -> Result<Vec<Document>, WorkflowError> {
        let mut docs = self
            .documents
            .find_by_lineage(lineage_id)
            .await
            .map_err(storage_err)?;
        if docs.is_empty() {
            return Err(WorkflowError::NotFound(format!("lineage {}", lineage_id)));
        }
        docs.sort_by_key(|d| d.version);
        Ok(docs)
    }

    pub async fn list_all(&self) -> Result<Vec<Document>, WorkflowError> {
        self.documents.list_all().await.map_err(storage_err)
    }

    /// Bytes and metadata of a revision; the active one when no index is
    /// given
    pub async fn revision_bytes(
        &self,
        doc_id: DocumentId,
        index: Option<usize>,
    ) -> Result<(tmf_types::Revision, Vec<u8>), WorkflowError> {
        let doc = self.get(doc_id).await?;
        let index = index.unwrap_or(doc.active_revision);
        let revision = doc.revisions.get(index).cloned().ok_or_else(|| {
            WorkflowError::NotFound(format!("revision {} of document {}", index, doc_id))
        })?;
        let bytes = self.get_blob(&revision.blob_id).await?;
        Ok((revision, bytes))
    }

    /// Verify the bound signature against the stored blob using the
    /// snapshotted public key. Read-only and idempotent.
    pub async fn verify_signature(&self, doc_id: DocumentId) -> Result<bool, WorkflowError> {
        let doc = self.get(doc_id).await?;
        let signature = doc.signature.as_ref().ok_or(WorkflowError::InvalidState {
            status: doc.status,
            event: "verify_signature",
        })?;
        let bytes = self.get_blob(&signature.signed_blob_id).await?;
        Ok(crate::crypto::verify(
            &signature.signer_public_key_pem,
            &bytes,
            &signature.signature_b64,
        ))
    }

    // ── Internal helpers ─────────────────────────────────────────────

    /// Reviewer and approver lists must name principals the directory
    /// knows
    async fn validate_event_principals(&self, event: &Event) -> Result<(), WorkflowError> {
        let ids: Vec<PrincipalId> = match event {
            Event::SubmitQc { reviewers, .. }
            | Event::SubmitReview { reviewers, .. }
            | Event::SubmitReviewDirect { reviewers, .. } => reviewers.clone(),
            Event::SubmitApproval { approver, .. } => vec![*approver],
            _ => return Ok(()),
        };
        for id in ids {
            self.directory.lookup(id).await.map_err(|_| {
                WorkflowError::InvalidInput(format!("unknown principal: {}", id))
            })?;
        }
        Ok(())
    }

    async fn put_blob(&self, content: &[u8]) -> Result<BlobId, WorkflowError> {
        self.blobs
            .put(content)
            .await
            .map_err(|e| WorkflowError::StorageFailure(e.to_string()))
    }

    async fn get_blob(&self, blob_id: &BlobId) -> Result<Vec<u8>, WorkflowError> {
        self.blobs.get(blob_id).await.map_err(|e| match e {
            BlobStoreError::NotFound(id) => WorkflowError::NotFound(format!("blob {}", id)),
            other => WorkflowError::StorageFailure(other.to_string()),
        })
    }
}

fn validate_upload(content: &[u8], filename: &str) -> Result<(), WorkflowError> {
    if filename.trim().is_empty() {
        return Err(WorkflowError::InvalidInput("no file selected".to_string()));
    }
    if content.is_empty() {
        return Err(WorkflowError::InvalidInput("empty file payload".to_string()));
    }
    Ok(())
}

fn storage_err(e: StoreError) -> WorkflowError {
    match e {
        StoreError::NotFound => WorkflowError::NotFound("document".to_string()),
        StoreError::Conflict => WorkflowError::Conflict,
        other => WorkflowError::StorageFailure(other.to_string()),
    }
}
