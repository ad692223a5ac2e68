//! Read-side Projections
//!
//! The shapes handed to callers. Projections are built from committed
//! documents; usernames are resolved at projection time, while history
//! entries already carry the name captured when they were appended.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tmf_types::{
    Ballot, BallotDecision, Document, DocumentId, LineageId, PrincipalId, StageDueDates, Status,
    TmfMetadata,
};

/// Outcome of document creation
#[derive(Debug, Clone, Serialize)]
pub struct CreatedDocument {
    pub doc_id: DocumentId,
    pub doc_number: String,
}

/// List filters: identifier/name search plus paging
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub search: Option<String>,
    /// 1-based page number; 0 is treated as 1
    pub page: usize,
    /// Page size; 0 falls back to 10
    pub limit: usize,
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: usize,
    pub current_page: usize,
}

/// Row-level view of a document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub doc_number: String,
    pub filename: String,
    pub content_type: String,
    pub status: Status,
    pub version: String,
    pub author_id: PrincipalId,
    pub author: String,
    /// Principals holding a ballot on the current pipeline run
    pub reviewers: Vec<PrincipalId>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentSummary {
    pub fn from_document(doc: &Document, author: String) -> Self {
        let active = doc.current_revision();
        let mut reviewers: Vec<PrincipalId> = Vec::new();
        for ballot in doc.qc_ballots.iter().chain(doc.review_ballots.iter()) {
            if !reviewers.contains(&ballot.principal_id) {
                reviewers.push(ballot.principal_id);
            }
        }
        if let Some(approver) = doc.designated_approver() {
            if !reviewers.contains(&approver) {
                reviewers.push(approver);
            }
        }

        Self {
            id: doc.doc_id,
            doc_number: doc.doc_number.clone(),
            filename: active.map(|r| r.filename.clone()).unwrap_or_default(),
            content_type: active.map(|r| r.content_type.clone()).unwrap_or_default(),
            status: doc.status,
            version: doc.version.to_string(),
            author_id: doc.author,
            author,
            reviewers,
            updated_at: doc.updated_at,
        }
    }
}

/// Ballot with its reviewer's display name
#[derive(Debug, Clone, Serialize)]
pub struct BallotView {
    pub principal_id: PrincipalId,
    pub username: String,
    pub decision: BallotDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_comment: Option<String>,
    pub admin_override: bool,
}

impl BallotView {
    pub fn new(ballot: &Ballot, username: String) -> Self {
        Self {
            principal_id: ballot.principal_id,
            username,
            decision: ballot.decision,
            decided_at: ballot.decided_at,
            comment: ballot.comment.clone(),
            previous_comment: ballot.previous_comment.clone(),
            admin_override: ballot.admin_override,
        }
    }
}

/// Signature details surfaced on signed documents
#[derive(Debug, Clone, Serialize)]
pub struct SignatureView {
    pub signature_b64: String,
    pub signed_by: PrincipalId,
    pub signed_by_username: String,
    pub signed_at: DateTime<Utc>,
}

/// History entry as shown to callers
#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub action: String,
    pub user: String,
    pub user_id: PrincipalId,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

/// Full projection of one document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetails {
    pub id: DocumentId,
    pub doc_number: String,
    pub lineage_id: LineageId,
    pub filename: String,
    pub content_type: String,
    pub status: Status,
    pub version: String,
    pub author_id: PrincipalId,
    pub author: String,
    pub tmf_metadata: TmfMetadata,
    pub due_dates: StageDueDates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amended_from: Option<DocumentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<DocumentId>,
    pub qc_ballots: Vec<BallotView>,
    pub review_ballots: Vec<BallotView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_ballot: Option<BallotView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureView>,
    pub history: Vec<HistoryView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One version within a lineage listing
#[derive(Debug, Clone, Serialize)]
pub struct LineageEntry {
    pub id: DocumentId,
    pub version: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

/// Revision bytes plus the metadata needed to serve them
#[derive(Debug, Clone)]
pub struct RevisionPayload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Amendment feasibility answer
#[derive(Debug, Clone, Serialize)]
pub struct CanAmend {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_progress: Option<DocumentId>,
}

/// Why a document landed on someone's task list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    CastQcBallot,
    CastReviewBallot,
    DecideFinalApproval,
    ReviseDraft,
}

/// A work item for the calling principal
#[derive(Debug, Clone, Serialize)]
pub struct TaskItem {
    pub task: TaskKind,
    pub document: DocumentSummary,
}
