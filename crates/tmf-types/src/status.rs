//! Document Status and Workflow Stage
//!
//! The status set drives the whole pipeline: Draft through QC, technical
//! review, and final approval, plus the tail-of-life states. Terminal-for-
//! action statuses accept no further state-machine events (reads and
//! signature verification excepted).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Draft,
    InQc,
    QcComplete,
    QcRejected,
    InReview,
    UnderRevision,
    ReviewComplete,
    PendingApproval,
    ApprovalRejected,
    Approved,
    Superseded,
    Obsolete,
    Withdrawn,
    Archived,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InQc => "in_qc",
            Self::QcComplete => "qc_complete",
            Self::QcRejected => "qc_rejected",
            Self::InReview => "in_review",
            Self::UnderRevision => "under_revision",
            Self::ReviewComplete => "review_complete",
            Self::PendingApproval => "pending_approval",
            Self::ApprovalRejected => "approval_rejected",
            Self::Approved => "approved",
            Self::Superseded => "superseded",
            Self::Obsolete => "obsolete",
            Self::Withdrawn => "withdrawn",
            Self::Archived => "archived",
        }
    }

    /// No state-machine event is accepted from these statuses
    pub fn is_terminal_for_action(&self) -> bool {
        matches!(
            self,
            Self::Superseded | Self::Obsolete | Self::Withdrawn | Self::Archived
        )
    }

    /// Statuses that count as an in-progress amendment descendant.
    /// A rejected descendant does not block a new amendment until it is
    /// revised back to Draft.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            Self::Draft
                | Self::InQc
                | Self::QcComplete
                | Self::InReview
                | Self::UnderRevision
                | Self::ReviewComplete
                | Self::PendingApproval
        )
    }

    /// Statuses from which the author may withdraw
    pub fn can_withdraw(&self) -> bool {
        matches!(
            self,
            Self::Draft
                | Self::InQc
                | Self::InReview
                | Self::PendingApproval
                | Self::QcRejected
                | Self::ApprovalRejected
                | Self::UnderRevision
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "in_qc" => Ok(Self::InQc),
            "qc_complete" => Ok(Self::QcComplete),
            "qc_rejected" => Ok(Self::QcRejected),
            "in_review" => Ok(Self::InReview),
            "under_revision" => Ok(Self::UnderRevision),
            "review_complete" => Ok(Self::ReviewComplete),
            "pending_approval" => Ok(Self::PendingApproval),
            "approval_rejected" => Ok(Self::ApprovalRejected),
            "approved" => Ok(Self::Approved),
            "superseded" => Ok(Self::Superseded),
            "obsolete" => Ok(Self::Obsolete),
            "withdrawn" => Ok(Self::Withdrawn),
            "archived" => Ok(Self::Archived),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct StatusParseError(String);

/// The review stage a document is currently parked in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Qc,
    TechnicalReview,
    FinalApproval,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qc => "qc",
            Self::TechnicalReview => "technical_review",
            Self::FinalApproval => "final_approval",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Status; 14] = [
        Status::Draft,
        Status::InQc,
        Status::QcComplete,
        Status::QcRejected,
        Status::InReview,
        Status::UnderRevision,
        Status::ReviewComplete,
        Status::PendingApproval,
        Status::ApprovalRejected,
        Status::Approved,
        Status::Superseded,
        Status::Obsolete,
        Status::Withdrawn,
        Status::Archived,
    ];

    #[test]
    fn test_status_roundtrip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("published".parse::<Status>().is_err());
    }

    #[test]
    fn test_terminal_for_action() {
        assert!(Status::Superseded.is_terminal_for_action());
        assert!(Status::Obsolete.is_terminal_for_action());
        assert!(Status::Withdrawn.is_terminal_for_action());
        assert!(Status::Archived.is_terminal_for_action());
        assert!(!Status::Approved.is_terminal_for_action());
        assert!(!Status::Draft.is_terminal_for_action());
    }

    #[test]
    fn test_in_progress_set_excludes_rejections() {
        assert!(Status::Draft.is_in_progress());
        assert!(Status::PendingApproval.is_in_progress());
        assert!(!Status::QcRejected.is_in_progress());
        assert!(!Status::ApprovalRejected.is_in_progress());
        assert!(!Status::Approved.is_in_progress());
    }

    #[test]
    fn test_withdrawable() {
        assert!(Status::Draft.can_withdraw());
        assert!(Status::QcRejected.can_withdraw());
        assert!(Status::UnderRevision.can_withdraw());
        assert!(!Status::Approved.can_withdraw());
        assert!(!Status::QcComplete.can_withdraw());
        assert!(!Status::Archived.can_withdraw());
    }
}
