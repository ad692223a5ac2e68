//! Audit History
//!
//! Append-only per-document history. Entries are never edited or reordered;
//! timestamps are non-decreasing within a document. The history is the
//! canonical explanation of how a document reached its current status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::PrincipalId;

/// Closed set of auditable actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    SubmittedForQc,
    QcBallotCast,
    QcPassed,
    QcRejected,
    SubmittedForReview,
    ReviewBallotCast,
    ChangesRequested,
    ReviewComplete,
    RevisionUploaded,
    SubmittedForApproval,
    Approved,
    ApprovalRejected,
    Recalled,
    Withdrawn,
    AmendmentCreated,
    Superseded,
    MarkedObsolete,
    Archived,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::SubmittedForQc => "submitted_for_qc",
            Self::QcBallotCast => "qc_ballot_cast",
            Self::QcPassed => "qc_passed",
            Self::QcRejected => "qc_rejected",
            Self::SubmittedForReview => "submitted_for_review",
            Self::ReviewBallotCast => "review_ballot_cast",
            Self::ChangesRequested => "changes_requested",
            Self::ReviewComplete => "review_complete",
            Self::RevisionUploaded => "revision_uploaded",
            Self::SubmittedForApproval => "submitted_for_approval",
            Self::Approved => "approved",
            Self::ApprovalRejected => "approval_rejected",
            Self::Recalled => "recalled",
            Self::Withdrawn => "withdrawn",
            Self::AmendmentCreated => "amendment_created",
            Self::Superseded => "superseded",
            Self::MarkedObsolete => "marked_obsolete",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in a document's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub actor_id: PrincipalId,
    /// Actor username captured at append time, so history reads do not
    /// depend on the directory
    pub actor_name: String,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

/// Clamp `now` so it never runs behind the last recorded entry
pub fn monotonic(history: &[AuditEntry], now: DateTime<Utc>) -> DateTime<Utc> {
    match history.last() {
        Some(last) if last.timestamp > now => last.timestamp,
        _ => now,
    }
}
