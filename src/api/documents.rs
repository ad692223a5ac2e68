//! Document creation and read operations

use std::collections::HashMap;

use tmf_types::{Document, DocumentId, LineageId, Principal, Status, TmfMetadata};

use super::projection::{
    BallotView, CreatedDocument, DocumentDetails, DocumentSummary, HistoryView, LineageEntry,
    ListFilter, Page, RevisionPayload, SignatureView,
};
use super::{ApiError, DocumentService};

const DEFAULT_PAGE_SIZE: usize = 10;

impl DocumentService {
    /// Ingest an authored file as a fresh Draft
    pub async fn create_document(
        &self,
        bearer: &str,
        content: &[u8],
        filename: &str,
        content_type: &str,
        tmf_metadata: TmfMetadata,
        comment: Option<String>,
    ) -> Result<CreatedDocument, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .create_document(&actor, content, filename, content_type, tmf_metadata, comment)
            .await?;
        Ok(CreatedDocument {
            doc_id: doc.doc_id,
            doc_number: doc.doc_number,
        })
    }

    /// Latest version per lineage visible to the actor, filtered and paged.
    /// Archived documents never show up here; non-admins see a lineage head
    /// only when it is Approved, authored by them, or assigned to them.
    pub async fn list_documents(
        &self,
        bearer: &str,
        filter: ListFilter,
    ) -> Result<Page<DocumentSummary>, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let all = self.engine.list_all().await?;

        // Latest per lineage by (major, minor)
        let mut heads: HashMap<LineageId, Document> = HashMap::new();
        for doc in all {
            let newer = heads
                .get(&doc.lineage_id)
                .map(|existing| doc.version > existing.version)
                .unwrap_or(true);
            if newer {
                heads.insert(doc.lineage_id, doc);
            }
        }

        let needle = filter
            .search
            .as_deref()
            .map(str::to_ascii_lowercase)
            .filter(|s| !s.is_empty());
        let mut visible: Vec<Document> = heads
            .into_values()
            .filter(|doc| doc.status != Status::Archived)
            .filter(|doc| visible_to(doc, &actor))
            .filter(|doc| match &needle {
                None => true,
                Some(needle) => matches_search(doc, needle),
            })
            .collect();
        visible.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let limit = if filter.limit == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            filter.limit
        };
        let page = filter.page.max(1);
        let total_pages = visible.len().div_ceil(limit);
        let mut items = Vec::new();
        for doc in visible.into_iter().skip((page - 1) * limit).take(limit) {
            items.push(self.summarize(&doc).await);
        }

        Ok(Page {
            items,
            total_pages,
            current_page: page,
        })
    }

    /// Full projection of one document
    pub async fn get_document(
        &self,
        bearer: &str,
        doc_id: DocumentId,
    ) -> Result<DocumentDetails, ApiError> {
        self.authenticate(bearer).await?;
        let doc = self.engine.get(doc_id).await?;
        Ok(self.project_details(&doc).await)
    }

    /// Ordered versions of a lineage, oldest first
    pub async fn get_lineage(
        &self,
        bearer: &str,
        lineage_id: LineageId,
    ) -> Result<Vec<LineageEntry>, ApiError> {
        self.authenticate(bearer).await?;
        let docs = self.engine.lineage(lineage_id).await?;
        Ok(docs
            .iter()
            .map(|doc| LineageEntry {
                id: doc.doc_id,
                version: doc.version.to_string(),
                status: doc.status,
                created_at: doc.created_at,
            })
            .collect())
    }

    /// Bytes of the active revision, for inline preview
    pub async fn preview_revision(
        &self,
        bearer: &str,
        doc_id: DocumentId,
    ) -> Result<RevisionPayload, ApiError> {
        self.download_revision(bearer, doc_id, None).await
    }

    /// Bytes of any revision by index; the active one when absent
    pub async fn download_revision(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        index: Option<usize>,
    ) -> Result<RevisionPayload, ApiError> {
        self.authenticate(bearer).await?;
        let (revision, bytes) = self.engine.revision_bytes(doc_id, index).await?;
        Ok(RevisionPayload {
            filename: revision.filename,
            content_type: revision.content_type,
            bytes,
        })
    }

    pub(crate) async fn project_details(&self, doc: &Document) -> DocumentDetails {
        let author = self.username_of(doc.author).await;
        let active = doc.current_revision();

        let mut qc_ballots = Vec::new();
        for ballot in &doc.qc_ballots {
            let name = self.username_of(ballot.principal_id).await;
            qc_ballots.push(BallotView::new(ballot, name));
        }
        let mut review_ballots = Vec::new();
        for ballot in &doc.review_ballots {
            let name = self.username_of(ballot.principal_id).await;
            review_ballots.push(BallotView::new(ballot, name));
        }
        let approver_ballot = match &doc.approver_ballot {
            Some(ballot) => {
                let name = self.username_of(ballot.principal_id).await;
                Some(BallotView::new(ballot, name))
            }
            None => None,
        };
        let signature = match &doc.signature {
            Some(sig) => Some(SignatureView {
                signature_b64: sig.signature_b64.clone(),
                signed_by: sig.signer_principal,
                signed_by_username: self.username_of(sig.signer_principal).await,
                signed_at: sig.signed_at,
            }),
            None => None,
        };

        DocumentDetails {
            id: doc.doc_id,
            doc_number: doc.doc_number.clone(),
            lineage_id: doc.lineage_id,
            filename: active.map(|r| r.filename.clone()).unwrap_or_default(),
            content_type: active.map(|r| r.content_type.clone()).unwrap_or_default(),
            status: doc.status,
            version: doc.version.to_string(),
            author_id: doc.author,
            author,
            tmf_metadata: doc.tmf_metadata.clone(),
            due_dates: doc.due_dates.clone(),
            amended_from: doc.amended_from,
            superseded_by: doc.superseded_by,
            qc_ballots,
            review_ballots,
            approver_ballot,
            signature,
            history: doc
                .history
                .iter()
                .map(|entry| HistoryView {
                    action: entry.action.to_string(),
                    user: entry.actor_name.clone(),
                    user_id: entry.actor_id,
                    timestamp: entry.timestamp,
                    details: entry.details.clone(),
                })
                .collect(),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

/// Non-admin visibility: approved heads, own documents, assigned work
fn visible_to(doc: &Document, actor: &Principal) -> bool {
    if actor.is_admin() {
        return true;
    }
    doc.status == Status::Approved
        || doc.author == actor.id
        || doc
            .qc_ballots
            .iter()
            .chain(doc.review_ballots.iter())
            .any(|b| b.principal_id == actor.id)
        || doc.designated_approver() == Some(actor.id)
}

/// Identifier and name lookups only: doc_number or filename
fn matches_search(doc: &Document, needle: &str) -> bool {
    if doc.doc_number.to_ascii_lowercase().contains(needle) {
        return true;
    }
    doc.revisions
        .iter()
        .any(|r| r.filename.to_ascii_lowercase().contains(needle))
}
