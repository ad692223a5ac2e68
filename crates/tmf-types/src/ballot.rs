//! Reviewer Ballots
//!
//! One ballot per principal per stage. Casting updates the ballot in place;
//! the document history still records every cast. A ballot cast by an Admin
//! carries the `admin_override` flag and is final for its stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::id::PrincipalId;

/// Decision alphabet across both review stages.
/// QC ballots use Pass/Fail; technical-review ballots use
/// Approved/RequestChanges. The stage is responsible for rejecting
/// decisions outside its alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallotDecision {
    Pending,
    Pass,
    Fail,
    Approved,
    RequestChanges,
}

impl BallotDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Approved => "approved",
            Self::RequestChanges => "request_changes",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Valid decision for a QC ballot
    pub fn in_qc_alphabet(&self) -> bool {
        matches!(self, Self::Pass | Self::Fail)
    }

    /// Valid decision for a technical-review ballot
    pub fn in_review_alphabet(&self) -> bool {
        matches!(self, Self::Approved | Self::RequestChanges)
    }
}

impl fmt::Display for BallotDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BallotDecision {
    type Err = DecisionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            "approved" => Ok(Self::Approved),
            "request_changes" => Ok(Self::RequestChanges),
            _ => Err(DecisionParseError(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown decision: {0}")]
pub struct DecisionParseError(String);

/// A reviewer's decision record for one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    pub principal_id: PrincipalId,
    pub decision: BallotDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Comment from before the last reset, kept for traceability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_comment: Option<String>,
    /// Cast by an Admin who was not enumerated for the stage; final
    #[serde(default)]
    pub admin_override: bool,
}

impl Ballot {
    /// Fresh pending ballot for an enumerated reviewer
    pub fn pending(principal_id: PrincipalId) -> Self {
        Self {
            principal_id,
            decision: BallotDecision::Pending,
            decided_at: None,
            comment: None,
            previous_comment: None,
            admin_override: false,
        }
    }

    /// Record a decision, preserving any earlier comment for traceability
    pub fn cast(&mut self, decision: BallotDecision, comment: Option<String>, at: DateTime<Utc>) {
        if let Some(old) = self.comment.take() {
            self.previous_comment = Some(old);
        }
        self.decision = decision;
        self.comment = comment;
        self.decided_at = Some(at);
    }

    /// Return the ballot to Pending after a corrected revision, keeping the
    /// last comment under `previous_comment`
    pub fn reset(&mut self) {
        if let Some(old) = self.comment.take() {
            self.previous_comment = Some(old);
        }
        self.decision = BallotDecision::Pending;
        self.decided_at = None;
        self.admin_override = false;
    }
}

/// Aggregate outcome of a review stage, computed from its ballot set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// At least one non-final ballot is still pending
    Open,
    Passed,
    Failed,
}
