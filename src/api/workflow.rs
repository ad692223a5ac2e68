//! Workflow operations: stage submissions, ballots, approval, recall

use chrono::{DateTime, Utc};

use tmf_types::{BallotDecision, DocumentId, PrincipalId, Stage, StageOutcome, Status};
use tmf_workflow::{ApprovalDecision, Event};

use super::projection::DocumentSummary;
use super::{ApiError, DocumentService};
use crate::notify::ReviewNotification;

impl DocumentService {
    /// Draft → In QC with an enumerated QC reviewer set
    pub async fn submit_qc(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        qc_reviewers: Vec<PrincipalId>,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .apply_event(
                doc_id,
                &actor,
                Event::SubmitQc {
                    reviewers: qc_reviewers.clone(),
                    due_date,
                },
            )
            .await?;
        self.notifier
            .notify(ReviewNotification::StageSubmitted {
                doc_id,
                doc_number: doc.doc_number.clone(),
                stage: Stage::Qc,
                principals: qc_reviewers,
            })
            .await;
        Ok(self.summarize(&doc).await)
    }

    /// QC reviewer decision; may close the stage either way
    pub async fn qc_ballot(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        decision: BallotDecision,
        comment: Option<String>,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .apply_event(doc_id, &actor, Event::QcBallot { decision, comment })
            .await?;
        self.notify_stage_close(&doc, Stage::Qc).await;
        Ok(self.summarize(&doc).await)
    }

    /// Skip-QC path: Draft straight into technical review
    pub async fn submit_review_direct(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        reviewers: Vec<PrincipalId>,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .apply_event(
                doc_id,
                &actor,
                Event::SubmitReviewDirect {
                    reviewers: reviewers.clone(),
                    due_date,
                },
            )
            .await?;
        self.notifier
            .notify(ReviewNotification::StageSubmitted {
                doc_id,
                doc_number: doc.doc_number.clone(),
                stage: Stage::TechnicalReview,
                principals: reviewers,
            })
            .await;
        Ok(self.summarize(&doc).await)
    }

    /// QC Complete → In Review with an enumerated reviewer set
    pub async fn submit_review(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        reviewers: Vec<PrincipalId>,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .apply_event(
                doc_id,
                &actor,
                Event::SubmitReview {
                    reviewers: reviewers.clone(),
                    due_date,
                },
            )
            .await?;
        self.notifier
            .notify(ReviewNotification::StageSubmitted {
                doc_id,
                doc_number: doc.doc_number.clone(),
                stage: Stage::TechnicalReview,
                principals: reviewers,
            })
            .await;
        Ok(self.summarize(&doc).await)
    }

    /// Technical reviewer decision; may close the stage either way
    pub async fn review_ballot(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        decision: BallotDecision,
        comment: Option<String>,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .apply_event(doc_id, &actor, Event::ReviewBallot { decision, comment })
            .await?;
        self.notify_stage_close(&doc, Stage::TechnicalReview).await;
        Ok(self.summarize(&doc).await)
    }

    /// Replace the revision while Under Revision; resets reviewer ballots
    pub async fn upload_corrected_revision(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        content: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .upload_corrected_revision(doc_id, &actor, content, filename, content_type)
            .await?;
        Ok(self.summarize(&doc).await)
    }

    /// Replace the revision after a hard rejection; returns to Draft
    pub async fn upload_revised_revision(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        content: &[u8],
        filename: &str,
        content_type: &str,
        comment: Option<String>,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .upload_revised_revision(doc_id, &actor, content, filename, content_type, comment)
            .await?;
        Ok(self.summarize(&doc).await)
    }

    /// Review Complete → Pending Approval with a designated approver
    pub async fn submit_approval(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        approver: PrincipalId,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .apply_event(doc_id, &actor, Event::SubmitApproval { approver, due_date })
            .await?;
        self.notifier
            .notify(ReviewNotification::StageSubmitted {
                doc_id,
                doc_number: doc.doc_number.clone(),
                stage: Stage::FinalApproval,
                principals: vec![approver],
            })
            .await;
        Ok(self.summarize(&doc).await)
    }

    /// Final decision. Approval binds the signature and bumps the major
    /// version; rejection parks the document in Approval Rejected.
    pub async fn final_approval(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        decision: ApprovalDecision,
        comment: Option<String>,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .apply_event(
                doc_id,
                &actor,
                Event::FinalApproval {
                    decision,
                    comment,
                    signature: None,
                },
            )
            .await?;
        self.notifier
            .notify(ReviewNotification::FinalDecision {
                doc_id,
                doc_number: doc.doc_number.clone(),
                approved: doc.status == Status::Approved,
            })
            .await;
        Ok(self.summarize(&doc).await)
    }

    /// Verify the bound signature; read-only and idempotent
    pub async fn verify_signature(
        &self,
        bearer: &str,
        doc_id: DocumentId,
    ) -> Result<bool, ApiError> {
        self.authenticate(bearer).await?;
        Ok(self.engine.verify_signature(doc_id).await?)
    }

    /// Pull an in-flight document back to its previous parked state
    pub async fn recall(
        &self,
        bearer: &str,
        doc_id: DocumentId,
        reason: String,
    ) -> Result<DocumentSummary, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let doc = self
            .engine
            .apply_event(doc_id, &actor, Event::Recall { reason })
            .await?;
        self.notifier
            .notify(ReviewNotification::Recalled {
                doc_id,
                doc_number: doc.doc_number.clone(),
            })
            .await;
        Ok(self.summarize(&doc).await)
    }

    /// Emit a stage-outcome notification when a ballot closed the stage
    async fn notify_stage_close(&self, doc: &tmf_types::Document, stage: Stage) {
        let outcome = match (stage, doc.status) {
            (Stage::Qc, Status::QcComplete) => StageOutcome::Passed,
            (Stage::Qc, Status::QcRejected) => StageOutcome::Failed,
            (Stage::TechnicalReview, Status::ReviewComplete) => StageOutcome::Passed,
            (Stage::TechnicalReview, Status::UnderRevision) => StageOutcome::Failed,
            _ => return,
        };
        self.notifier
            .notify(ReviewNotification::StageOutcome {
                doc_id: doc.doc_id,
                doc_number: doc.doc_number.clone(),
                stage,
                outcome,
            })
            .await;
    }
}
