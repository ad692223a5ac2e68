//! Document State Machine
//!
//! Pure decision function: (current Document, Event, actor) → new Document
//! plus audit entries, or a typed rejection. No I/O happens here — blob
//! fetches and signing are done by the engine before the event is applied,
//! and persistence happens after. Authorization is a per-event predicate,
//! not scattered interceptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tmf_types::{
    audit, AuditAction, Ballot, BallotDecision, BlobId, Document, DocumentId, Principal,
    PrincipalId, Revision, Signature, Stage, StageOutcome, Status, WorkflowError,
};

use crate::coordinator;

/// Payload of a revision upload before it becomes a `Revision`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRevision {
    pub blob_id: BlobId,
    pub filename: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Decision alphabet of the final-approval stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

/// A proposed state-machine event with its event-specific payload
#[derive(Debug, Clone)]
pub enum Event {
    SubmitQc {
        reviewers: Vec<PrincipalId>,
        due_date: Option<DateTime<Utc>>,
    },
    /// Skip-QC path: Draft straight into technical review
    SubmitReviewDirect {
        reviewers: Vec<PrincipalId>,
        due_date: Option<DateTime<Utc>>,
    },
    SubmitReview {
        reviewers: Vec<PrincipalId>,
        due_date: Option<DateTime<Utc>>,
    },
    QcBallot {
        decision: BallotDecision,
        comment: Option<String>,
    },
    ReviewBallot {
        decision: BallotDecision,
        comment: Option<String>,
    },
    UploadCorrectedRevision {
        revision: NewRevision,
    },
    UploadRevisedRevision {
        revision: NewRevision,
    },
    SubmitApproval {
        approver: PrincipalId,
        due_date: Option<DateTime<Utc>>,
    },
    /// The signature is produced by the engine before the event is applied;
    /// it must be present iff the decision is Approved.
    FinalApproval {
        decision: ApprovalDecision,
        comment: Option<String>,
        signature: Option<Signature>,
    },
    Recall {
        reason: String,
    },
    Withdraw {
        reason: String,
    },
    MarkObsolete {
        reason: String,
    },
    Archive,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubmitQc { .. } => "submit_qc",
            Self::SubmitReviewDirect { .. } => "submit_review_direct",
            Self::SubmitReview { .. } => "submit_review",
            Self::QcBallot { .. } => "qc_ballot",
            Self::ReviewBallot { .. } => "review_ballot",
            Self::UploadCorrectedRevision { .. } => "upload_corrected_revision",
            Self::UploadRevisedRevision { .. } => "upload_revised_revision",
            Self::SubmitApproval { .. } => "submit_approval",
            Self::FinalApproval { .. } => "final_approval",
            Self::Recall { .. } => "recall",
            Self::Withdraw { .. } => "withdraw",
            Self::MarkObsolete { .. } => "mark_obsolete",
            Self::Archive => "archive",
        }
    }
}

/// Cross-document mutation the engine must carry out after committing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// An approved amendment supersedes its predecessor
    SupersedePredecessor { predecessor: DocumentId },
}

/// Result of a successfully applied event
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub document: Document,
    pub effect: Option<SideEffect>,
}

/// Precondition and authorization check for final approval, used by the
/// engine before it fetches blob bytes and signs. Pure, read-only.
pub fn ensure_final_approval_allowed(
    doc: &Document,
    actor: &Principal,
) -> Result<(), WorkflowError> {
    if doc.status.is_terminal_for_action() {
        return Err(invalid_state(doc, "final_approval"));
    }
    require_status(doc, &[Status::PendingApproval], "final_approval")?;
    require_approver_or_admin(doc, actor)
}

/// Apply an event to a document snapshot.
///
/// Status precondition is checked first, then the event's authorization
/// predicate, then the transition itself. The returned document carries
/// the appended audit entries; the caller persists it atomically.
pub fn apply(
    mut doc: Document,
    event: Event,
    actor: &Principal,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, WorkflowError> {
    if doc.status.is_terminal_for_action() {
        return Err(invalid_state(&doc, event.name()));
    }
    let ts = audit::monotonic(&doc.history, now);

    match event {
        Event::SubmitQc { reviewers, due_date } => {
            require_status(&doc, &[Status::Draft], "submit_qc")?;
            require_author_or_admin(&doc, actor)?;
            doc.qc_ballots = coordinator::build_ballots(&reviewers)?;
            doc.due_dates.qc = due_date;
            doc.status = Status::InQc;
            doc.current_stage = Some(Stage::Qc);
            let details = format!("submitted to {} QC reviewer(s)", doc.qc_ballots.len());
            doc.record(AuditAction::SubmittedForQc, actor.id, &actor.username, details, ts);
            done(doc)
        }

        Event::SubmitReviewDirect { reviewers, due_date } => {
            require_status(&doc, &[Status::Draft], "submit_review_direct")?;
            require_author_or_admin(&doc, actor)?;
            doc.review_ballots = coordinator::build_ballots(&reviewers)?;
            doc.due_dates.review = due_date;
            doc.status = Status::InReview;
            doc.current_stage = Some(Stage::TechnicalReview);
            let details = format!(
                "submitted directly to {} reviewer(s), QC skipped",
                doc.review_ballots.len()
            );
            doc.record(AuditAction::SubmittedForReview, actor.id, &actor.username, details, ts);
            done(doc)
        }

        Event::SubmitReview { reviewers, due_date } => {
            require_status(&doc, &[Status::QcComplete], "submit_review")?;
            require_author_or_admin(&doc, actor)?;
            doc.review_ballots = coordinator::build_ballots(&reviewers)?;
            doc.due_dates.review = due_date;
            doc.status = Status::InReview;
            doc.current_stage = Some(Stage::TechnicalReview);
            let details = format!("submitted to {} reviewer(s)", doc.review_ballots.len());
            doc.record(AuditAction::SubmittedForReview, actor.id, &actor.username, details, ts);
            done(doc)
        }

        Event::QcBallot { decision, comment } => {
            require_status(&doc, &[Status::InQc], "qc_ballot")?;
            coordinator::cast(&mut doc.qc_ballots, Stage::Qc, actor, decision, comment.clone(), ts)?;
            doc.record(
                AuditAction::QcBallotCast,
                actor.id,
                &actor.username,
                decision_details(decision, comment.as_deref()),
                ts,
            );
            match coordinator::stage_outcome(&doc.qc_ballots, Stage::Qc) {
                StageOutcome::Failed => {
                    doc.status = Status::QcRejected;
                    doc.current_stage = None;
                    doc.record(
                        AuditAction::QcRejected,
                        actor.id,
                        &actor.username,
                        "QC stage failed",
                        ts,
                    );
                }
                StageOutcome::Passed => {
                    doc.status = Status::QcComplete;
                    doc.current_stage = None;
                    doc.record(
                        AuditAction::QcPassed,
                        actor.id,
                        &actor.username,
                        "all QC reviewers passed",
                        ts,
                    );
                }
                StageOutcome::Open => {}
            }
            done(doc)
        }

        Event::ReviewBallot { decision, comment } => {
            require_status(&doc, &[Status::InReview], "review_ballot")?;
            coordinator::cast(
                &mut doc.review_ballots,
                Stage::TechnicalReview,
                actor,
                decision,
                comment.clone(),
                ts,
            )?;
            doc.record(
                AuditAction::ReviewBallotCast,
                actor.id,
                &actor.username,
                decision_details(decision, comment.as_deref()),
                ts,
            );
            match coordinator::stage_outcome(&doc.review_ballots, Stage::TechnicalReview) {
                StageOutcome::Failed => {
                    doc.status = Status::UnderRevision;
                    doc.current_stage = None;
                    doc.record(
                        AuditAction::ChangesRequested,
                        actor.id,
                        &actor.username,
                        "changes requested by a reviewer",
                        ts,
                    );
                }
                StageOutcome::Passed => {
                    doc.status = Status::ReviewComplete;
                    doc.current_stage = None;
                    doc.record(
                        AuditAction::ReviewComplete,
                        actor.id,
                        &actor.username,
                        "all reviewers approved",
                        ts,
                    );
                }
                StageOutcome::Open => {}
            }
            done(doc)
        }

        Event::UploadCorrectedRevision { revision } => {
            require_status(&doc, &[Status::UnderRevision], "upload_corrected_revision")?;
            require_author_or_admin(&doc, actor)?;
            doc.push_revision(make_revision(revision, actor.id, ts));
            doc.version = doc.version.next_minor();
            coordinator::reset_ballots(&mut doc.review_ballots);
            doc.status = Status::InReview;
            doc.current_stage = Some(Stage::TechnicalReview);
            let details = format!(
                "corrected revision uploaded as version {}; review ballots reset",
                doc.version
            );
            doc.record(AuditAction::RevisionUploaded, actor.id, &actor.username, details, ts);
            done(doc)
        }

        Event::UploadRevisedRevision { revision } => {
            require_status(
                &doc,
                &[Status::QcRejected, Status::ApprovalRejected],
                "upload_revised_revision",
            )?;
            require_author_or_admin(&doc, actor)?;
            doc.push_revision(make_revision(revision, actor.id, ts));
            doc.version = doc.version.next_minor();
            coordinator::reset_ballots(&mut doc.qc_ballots);
            coordinator::reset_ballots(&mut doc.review_ballots);
            doc.approver_ballot = None;
            doc.status = Status::Draft;
            doc.current_stage = None;
            let details = format!(
                "revised revision uploaded as version {}; returned to draft",
                doc.version
            );
            doc.record(AuditAction::RevisionUploaded, actor.id, &actor.username, details, ts);
            done(doc)
        }

        Event::SubmitApproval { approver, due_date } => {
            require_status(&doc, &[Status::ReviewComplete], "submit_approval")?;
            require_author_or_admin(&doc, actor)?;
            doc.approver_ballot = Some(Ballot::pending(approver));
            doc.due_dates.approval = due_date;
            doc.status = Status::PendingApproval;
            doc.current_stage = Some(Stage::FinalApproval);
            doc.record(
                AuditAction::SubmittedForApproval,
                actor.id,
                &actor.username,
                "submitted for final approval",
                ts,
            );
            done(doc)
        }

        Event::FinalApproval {
            decision,
            comment,
            signature,
        } => {
            require_status(&doc, &[Status::PendingApproval], "final_approval")?;
            require_approver_or_admin(&doc, actor)?;
            match decision {
                ApprovalDecision::Rejected => {
                    set_approver_ballot(&mut doc, actor, BallotDecision::Fail, comment.clone(), ts);
                    doc.status = Status::ApprovalRejected;
                    doc.current_stage = None;
                    doc.record(
                        AuditAction::ApprovalRejected,
                        actor.id,
                        &actor.username,
                        comment.unwrap_or_default(),
                        ts,
                    );
                    done(doc)
                }
                ApprovalDecision::Approved => {
                    let signature = signature.ok_or_else(|| {
                        WorkflowError::InvalidInput(
                            "final approval requires a signature record".to_string(),
                        )
                    })?;
                    let active_blob = doc
                        .current_revision()
                        .map(|r| r.blob_id.clone())
                        .ok_or_else(|| {
                            WorkflowError::InvalidInput("document has no revisions".to_string())
                        })?;
                    if signature.signed_blob_id != active_blob {
                        return Err(WorkflowError::InvalidInput(
                            "signature does not cover the active revision".to_string(),
                        ));
                    }
                    set_approver_ballot(
                        &mut doc,
                        actor,
                        BallotDecision::Approved,
                        comment.clone(),
                        ts,
                    );
                    doc.version = doc.version.next_approved();
                    doc.status = Status::Approved;
                    doc.current_stage = None;
                    doc.signature = Some(signature);
                    let details = match comment {
                        Some(c) => format!("approved as version {}: {}", doc.version, c),
                        None => format!("approved as version {}", doc.version),
                    };
                    doc.record(AuditAction::Approved, actor.id, &actor.username, details, ts);
                    let effect = doc
                        .amended_from
                        .map(|predecessor| SideEffect::SupersedePredecessor { predecessor });
                    Ok(TransitionOutcome { document: doc, effect })
                }
            }
        }

        Event::Recall { reason } => {
            require_status(
                &doc,
                &[Status::InQc, Status::InReview, Status::PendingApproval],
                "recall",
            )?;
            require_author_or_admin(&doc, actor)?;
            match doc.status {
                Status::InQc => {
                    doc.status = Status::Draft;
                    doc.qc_ballots.clear();
                    doc.review_ballots.clear();
                    doc.approver_ballot = None;
                }
                Status::InReview => {
                    doc.status = Status::QcComplete;
                    doc.review_ballots.clear();
                    doc.approver_ballot = None;
                }
                Status::PendingApproval => {
                    doc.status = Status::ReviewComplete;
                    doc.approver_ballot = None;
                }
                _ => unreachable!("recall precondition already checked"),
            }
            doc.current_stage = None;
            doc.record(AuditAction::Recalled, actor.id, &actor.username, reason, ts);
            done(doc)
        }

        Event::Withdraw { reason } => {
            if !doc.status.can_withdraw() {
                return Err(invalid_state(&doc, "withdraw"));
            }
            require_author_or_admin(&doc, actor)?;
            doc.status = Status::Withdrawn;
            doc.current_stage = None;
            doc.record(AuditAction::Withdrawn, actor.id, &actor.username, reason, ts);
            done(doc)
        }

        Event::MarkObsolete { reason } => {
            require_status(&doc, &[Status::Approved], "mark_obsolete")?;
            if !actor.role.can_mark_obsolete() {
                return Err(WorkflowError::Unauthorized(format!(
                    "{} may not mark documents obsolete",
                    actor.username
                )));
            }
            doc.status = Status::Obsolete;
            doc.record(AuditAction::MarkedObsolete, actor.id, &actor.username, reason, ts);
            done(doc)
        }

        Event::Archive => {
            require_status(&doc, &[Status::Approved, Status::Superseded], "archive")?;
            if !actor.role.can_archive() {
                return Err(WorkflowError::Unauthorized(format!(
                    "{} may not archive documents",
                    actor.username
                )));
            }
            doc.status = Status::Archived;
            doc.record(AuditAction::Archived, actor.id, &actor.username, "", ts);
            done(doc)
        }
    }
}

fn done(doc: Document) -> Result<TransitionOutcome, WorkflowError> {
    Ok(TransitionOutcome {
        document: doc,
        effect: None,
    })
}

fn invalid_state(doc: &Document, event: &'static str) -> WorkflowError {
    WorkflowError::InvalidState {
        status: doc.status,
        event,
    }
}

fn require_status(
    doc: &Document,
    allowed: &[Status],
    event: &'static str,
) -> Result<(), WorkflowError> {
    if allowed.contains(&doc.status) {
        Ok(())
    } else {
        Err(invalid_state(doc, event))
    }
}

fn require_author_or_admin(doc: &Document, actor: &Principal) -> Result<(), WorkflowError> {
    if doc.author == actor.id || actor.is_admin() {
        Ok(())
    } else {
        Err(WorkflowError::Unauthorized(format!(
            "{} is not the document author",
            actor.username
        )))
    }
}

fn require_approver_or_admin(doc: &Document, actor: &Principal) -> Result<(), WorkflowError> {
    if doc.designated_approver() == Some(actor.id) || actor.is_admin() {
        Ok(())
    } else {
        Err(WorkflowError::Unauthorized(format!(
            "{} is not the designated approver",
            actor.username
        )))
    }
}

fn make_revision(input: NewRevision, uploader: PrincipalId, at: DateTime<Utc>) -> Revision {
    Revision {
        blob_id: input.blob_id,
        filename: input.filename,
        content_type: input.content_type,
        author_comment: input.comment,
        uploaded_at: at,
        uploader,
    }
}

/// The final-approval decision lands on the approver ballot. An Admin who
/// was not the designated approver replaces the ballot with an override.
fn set_approver_ballot(
    doc: &mut Document,
    actor: &Principal,
    decision: BallotDecision,
    comment: Option<String>,
    at: DateTime<Utc>,
) {
    match doc.approver_ballot.as_mut() {
        Some(ballot) if ballot.principal_id == actor.id => {
            ballot.cast(decision, comment, at);
        }
        _ => {
            let mut ballot = Ballot::pending(actor.id);
            ballot.admin_override = true;
            ballot.cast(decision, comment, at);
            doc.approver_ballot = Some(ballot);
        }
    }
}

fn decision_details(decision: BallotDecision, comment: Option<&str>) -> String {
    match comment {
        Some(c) if !c.is_empty() => format!("{}: {}", decision, c),
        _ => decision.to_string(),
    }
}
