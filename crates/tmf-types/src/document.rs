//! The Document Record
//!
//! Central entity of the engine: lineage identity, versioning, revisions,
//! reviewer ballots, the bound signature, and the append-only history.
//! A document is persisted and updated as a whole under an optimistic
//! compare-and-set on `version_counter`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audit::{self, AuditAction, AuditEntry};
use crate::ballot::Ballot;
use crate::id::{BlobId, DocumentId, LineageId, PrincipalId};
use crate::status::{Stage, Status};

/// Human-facing version pair; ordered lexicographically
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    /// First draft of a fresh lineage
    pub fn initial() -> Self {
        Self { major: 0, minor: 1 }
    }

    /// Next minor revision (corrected or revised upload, amendment start)
    pub fn next_minor(&self) -> Self {
        Self {
            major: self.major,
            minor: self.minor + 1,
        }
    }

    /// Canonical approved version for the lineage
    pub fn next_approved(&self) -> Self {
        Self {
            major: self.major + 1,
            minor: 0,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// TMF classification metadata; free-form strings validated elsewhere
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmfMetadata {
    #[serde(default)]
    pub study_id: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub site_id: String,
    #[serde(default)]
    pub tmf_zone: String,
    #[serde(default)]
    pub tmf_section: String,
    #[serde(default)]
    pub tmf_artifact: String,
}

/// One uploaded file payload within a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    pub blob_id: BlobId,
    pub filename: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_comment: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub uploader: PrincipalId,
}

/// Detached signature bound at final approval; immutable once present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// base64(PKCS#1 v1.5 RSA-2048 signature of SHA-256(blob))
    pub signature_b64: String,
    pub signer_principal: PrincipalId,
    /// Public key snapshotted at signing time, so later key rotation does
    /// not invalidate verification
    pub signer_public_key_pem: String,
    pub signed_at: DateTime<Utc>,
    pub signed_blob_id: BlobId,
}

/// Advisory per-stage deadlines; never enforced by the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageDueDates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qc: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval: Option<DateTime<Utc>>,
}

/// The document record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: DocumentId,
    /// Human-readable number, shared by every version in the lineage
    pub doc_number: String,
    pub lineage_id: LineageId,
    pub version: Version,
    pub status: Status,
    pub author: PrincipalId,
    pub tmf_metadata: TmfMetadata,
    /// Ordered revisions; first entry has index 0
    pub revisions: Vec<Revision>,
    /// Index into `revisions` of the revision currently facing reviewers
    pub active_revision: usize,
    pub qc_ballots: Vec<Ballot>,
    pub review_ballots: Vec<Ballot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver_ballot: Option<Ballot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Stage>,
    #[serde(default)]
    pub due_dates: StageDueDates,
    /// Immediate predecessor iff created via amendment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amended_from: Option<DocumentId>,
    /// Later approved version that replaced this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<DocumentId>,
    /// Two-phase supersession marker; set while an amendment approval is
    /// committing, cleared when it is finalized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_supersession: Option<DocumentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    pub history: Vec<AuditEntry>,
    /// Optimistic-concurrency counter; bumped by the store on every commit
    pub version_counter: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Fresh Draft at version 0.1 with its first revision
    pub fn create(
        doc_id: DocumentId,
        doc_number: String,
        lineage_id: LineageId,
        author: PrincipalId,
        tmf_metadata: TmfMetadata,
        first_revision: Revision,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            doc_id,
            doc_number,
            lineage_id,
            version: Version::initial(),
            status: Status::Draft,
            author,
            tmf_metadata,
            revisions: vec![first_revision],
            active_revision: 0,
            qc_ballots: Vec::new(),
            review_ballots: Vec::new(),
            approver_ballot: None,
            current_stage: None,
            due_dates: StageDueDates::default(),
            amended_from: None,
            superseded_by: None,
            pending_supersession: None,
            signature: None,
            history: Vec::new(),
            version_counter: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The revision currently facing reviewers
    pub fn current_revision(&self) -> Option<&Revision> {
        self.revisions.get(self.active_revision)
    }

    /// Append a history entry with a monotonic timestamp
    pub fn record(
        &mut self,
        action: AuditAction,
        actor_id: PrincipalId,
        actor_name: &str,
        details: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        let timestamp = audit::monotonic(&self.history, now);
        self.history.push(AuditEntry {
            action,
            actor_id,
            actor_name: actor_name.to_string(),
            timestamp,
            details: details.into(),
        });
        self.updated_at = timestamp;
    }

    /// Append a new revision and make it active
    pub fn push_revision(&mut self, revision: Revision) {
        self.revisions.push(revision);
        self.active_revision = self.revisions.len() - 1;
    }

    /// The approver designated at submit_approval time
    pub fn designated_approver(&self) -> Option<PrincipalId> {
        self.approver_ballot.as_ref().map(|b| b.principal_id)
    }

    /// Whether the given principal holds a pending ballot on the stage the
    /// document currently sits in
    pub fn has_pending_ballot(&self, principal: PrincipalId) -> bool {
        let pending = |ballots: &[Ballot]| {
            ballots
                .iter()
                .any(|b| b.principal_id == principal && b.decision.is_pending())
        };
        match self.status {
            Status::InQc => pending(&self.qc_ballots),
            Status::InReview => pending(&self.review_ballots),
            Status::PendingApproval => self
                .approver_ballot
                .as_ref()
                .map(|b| b.principal_id == principal && b.decision.is_pending())
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn revision(uploader: PrincipalId) -> Revision {
        Revision {
            blob_id: BlobId::new("aa"),
            filename: "proto.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            author_comment: None,
            uploaded_at: Utc::now(),
            uploader,
        }
    }

    fn draft() -> Document {
        let author = PrincipalId::generate();
        Document::create(
            DocumentId::generate(),
            "REG-TMF-00001".to_string(),
            LineageId::generate(),
            author,
            TmfMetadata::default(),
            revision(author),
            Utc::now(),
        )
    }

    #[test]
    fn test_create_is_first_draft() {
        let doc = draft();
        assert_eq!(doc.version, Version { major: 0, minor: 1 });
        assert_eq!(doc.status, Status::Draft);
        assert_eq!(doc.active_revision, 0);
        assert!(doc.current_revision().is_some());
        assert!(doc.signature.is_none());
        assert!(doc.history.is_empty());
    }

    #[test]
    fn test_version_progression() {
        let v = Version::initial();
        assert_eq!(v.to_string(), "0.1");
        assert_eq!(v.next_minor().to_string(), "0.2");
        assert_eq!(v.next_approved().to_string(), "1.0");
        assert_eq!(
            Version { major: 1, minor: 3 }.next_approved(),
            Version { major: 2, minor: 0 }
        );
    }

    #[test]
    fn test_push_revision_activates_latest() {
        let mut doc = draft();
        doc.push_revision(revision(doc.author));
        assert_eq!(doc.revisions.len(), 2);
        assert_eq!(doc.active_revision, 1);
    }

    #[test]
    fn test_record_is_monotonic() {
        let mut doc = draft();
        let now = Utc::now();
        doc.record(AuditAction::Created, doc.author, "u1", "first", now);
        doc.record(
            AuditAction::SubmittedForQc,
            doc.author,
            "u1",
            "second",
            now - chrono::Duration::seconds(30),
        );
        assert!(doc.history[1].timestamp >= doc.history[0].timestamp);
    }

    #[test]
    fn test_pending_ballot_lookup() {
        let mut doc = draft();
        let reviewer = PrincipalId::generate();
        doc.status = Status::InQc;
        doc.qc_ballots = vec![Ballot::pending(reviewer)];
        assert!(doc.has_pending_ballot(reviewer));
        assert!(!doc.has_pending_ballot(PrincipalId::generate()));

        // Decided ballots no longer show up as tasks
        doc.qc_ballots[0].cast(crate::BallotDecision::Pass, None, Utc::now());
        assert!(!doc.has_pending_ballot(reviewer));
    }

    proptest! {
        #[test]
        fn prop_version_order_is_lexicographic(
            a in 0u32..100, b in 0u32..100, c in 0u32..100, d in 0u32..100
        ) {
            let left = Version { major: a, minor: b };
            let right = Version { major: c, minor: d };
            prop_assert_eq!(left.cmp(&right), (a, b).cmp(&(c, d)));
        }
    }
}
