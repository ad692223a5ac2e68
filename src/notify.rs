//! Review Notifications
//!
//! Interface point for outbound notifications (email or otherwise) when
//! the pipeline creates work for someone. Delivery is out of scope for the
//! engine; the default implementation just logs.

use async_trait::async_trait;
use tracing::info;

use tmf_types::{DocumentId, PrincipalId, Stage, StageOutcome};

/// A pipeline event somebody should hear about
#[derive(Debug, Clone)]
pub enum ReviewNotification {
    /// A stage was submitted; the named principals have work to do
    StageSubmitted {
        doc_id: DocumentId,
        doc_number: String,
        stage: Stage,
        principals: Vec<PrincipalId>,
    },
    /// A stage closed with an outcome
    StageOutcome {
        doc_id: DocumentId,
        doc_number: String,
        stage: Stage,
        outcome: StageOutcome,
    },
    /// Final approval decided
    FinalDecision {
        doc_id: DocumentId,
        doc_number: String,
        approved: bool,
    },
    /// The author pulled the document back
    Recalled {
        doc_id: DocumentId,
        doc_number: String,
    },
}

#[async_trait]
pub trait ReviewNotifier: Send + Sync {
    async fn notify(&self, notification: ReviewNotification);
}

/// Default notifier: structured log lines only
pub struct LogNotifier;

#[async_trait]
impl ReviewNotifier for LogNotifier {
    async fn notify(&self, notification: ReviewNotification) {
        match notification {
            ReviewNotification::StageSubmitted {
                doc_id,
                doc_number,
                stage,
                principals,
            } => info!(
                %doc_id,
                %doc_number,
                %stage,
                recipients = principals.len(),
                "stage submitted"
            ),
            ReviewNotification::StageOutcome {
                doc_id,
                doc_number,
                stage,
                outcome,
            } => info!(%doc_id, %doc_number, %stage, ?outcome, "stage closed"),
            ReviewNotification::FinalDecision {
                doc_id,
                doc_number,
                approved,
            } => info!(%doc_id, %doc_number, approved, "final decision issued"),
            ReviewNotification::Recalled { doc_id, doc_number } => {
                info!(%doc_id, %doc_number, "document recalled")
            }
        }
    }
}
