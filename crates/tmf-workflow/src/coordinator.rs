//! Workflow Coordinator
//!
//! Multi-reviewer stage bookkeeping: building ballot sets at submission,
//! recording decisions, and computing stage outcomes. QC and technical
//! review are structurally identical; only their decision alphabets differ.
//! Outcomes are computed deterministically from the committed ballot set —
//! reviewer ordering never matters.

use chrono::{DateTime, Utc};

use tmf_types::{Ballot, BallotDecision, Principal, PrincipalId, Stage, StageOutcome, WorkflowError};

/// Build a fresh pending ballot set from an enumerated reviewer list.
/// Duplicates collapse to one ballot; an empty list is invalid input.
pub fn build_ballots(reviewers: &[PrincipalId]) -> Result<Vec<Ballot>, WorkflowError> {
    if reviewers.is_empty() {
        return Err(WorkflowError::InvalidInput(
            "a non-empty reviewer list is required".to_string(),
        ));
    }
    let mut ballots: Vec<Ballot> = Vec::with_capacity(reviewers.len());
    for reviewer in reviewers {
        if !ballots.iter().any(|b| b.principal_id == *reviewer) {
            ballots.push(Ballot::pending(*reviewer));
        }
    }
    Ok(ballots)
}

/// Record a decision on a stage's ballot set.
///
/// The actor must hold an enumerated ballot, or be an Admin — an Admin who
/// was not enumerated is added on the fly with the override flag set. The
/// decision must belong to the stage's alphabet. Re-casting updates the
/// existing ballot in place.
pub fn cast(
    ballots: &mut Vec<Ballot>,
    stage: Stage,
    actor: &Principal,
    decision: BallotDecision,
    comment: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    let in_alphabet = match stage {
        Stage::Qc => decision.in_qc_alphabet(),
        Stage::TechnicalReview => decision.in_review_alphabet(),
        Stage::FinalApproval => false,
    };
    if !in_alphabet {
        return Err(WorkflowError::InvalidInput(format!(
            "decision '{}' is not valid for the {} stage",
            decision, stage
        )));
    }

    match ballots.iter_mut().find(|b| b.principal_id == actor.id) {
        Some(ballot) => {
            ballot.cast(decision, comment, now);
            Ok(())
        }
        None if actor.is_admin() => {
            let mut ballot = Ballot::pending(actor.id);
            ballot.admin_override = true;
            ballot.cast(decision, comment, now);
            ballots.push(ballot);
            Ok(())
        }
        None => Err(WorkflowError::Unauthorized(format!(
            "{} is not an assigned {} reviewer",
            actor.username, stage
        ))),
    }
}

/// Compute the aggregate outcome of a stage from its ballot set.
///
/// An Admin-override ballot is final: its decision is the outcome
/// regardless of other pending ballots. Otherwise any failing decision
/// fails the stage immediately, and the stage passes only when every
/// ballot is decided passing.
pub fn stage_outcome(ballots: &[Ballot], stage: Stage) -> StageOutcome {
    let (pass, fail) = match stage {
        Stage::Qc => (BallotDecision::Pass, BallotDecision::Fail),
        Stage::TechnicalReview => (BallotDecision::Approved, BallotDecision::RequestChanges),
        Stage::FinalApproval => return StageOutcome::Open,
    };

    if let Some(overriding) = ballots
        .iter()
        .find(|b| b.admin_override && !b.decision.is_pending())
    {
        return if overriding.decision == fail {
            StageOutcome::Failed
        } else {
            StageOutcome::Passed
        };
    }

    if ballots.iter().any(|b| b.decision == fail) {
        return StageOutcome::Failed;
    }
    if !ballots.is_empty() && ballots.iter().all(|b| b.decision == pass) {
        return StageOutcome::Passed;
    }
    StageOutcome::Open
}

/// Reset every ballot of a stage to Pending, preserving comments
pub fn reset_ballots(ballots: &mut [Ballot]) {
    for ballot in ballots.iter_mut() {
        ballot.reset();
    }
}
