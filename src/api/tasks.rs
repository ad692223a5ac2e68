//! Per-actor task list

use tmf_types::Status;

use super::projection::{TaskItem, TaskKind};
use super::{ApiError, DocumentService};

impl DocumentService {
    /// Documents waiting on the calling principal: a pending ballot on the
    /// current stage, or an authored document parked with the author
    /// (Draft, Under Revision, or rejected).
    pub async fn list_my_tasks(&self, bearer: &str) -> Result<Vec<TaskItem>, ApiError> {
        let actor = self.authenticate(bearer).await?;
        let mut docs = self.engine.list_all().await?;
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut tasks = Vec::new();
        for doc in docs {
            let task = if doc.has_pending_ballot(actor.id) {
                match doc.status {
                    Status::InQc => Some(TaskKind::CastQcBallot),
                    Status::InReview => Some(TaskKind::CastReviewBallot),
                    Status::PendingApproval => Some(TaskKind::DecideFinalApproval),
                    _ => None,
                }
            } else if doc.author == actor.id
                && matches!(
                    doc.status,
                    Status::Draft
                        | Status::UnderRevision
                        | Status::QcRejected
                        | Status::ApprovalRejected
                )
            {
                Some(TaskKind::ReviseDraft)
            } else {
                None
            };

            if let Some(task) = task {
                tasks.push(TaskItem {
                    task,
                    document: self.summarize(&doc).await,
                });
            }
        }
        Ok(tasks)
    }
}
