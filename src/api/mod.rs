//! Request Surface
//!
//! One service struct, one method per external operation. Every operation
//! authenticates the bearer credential against the identity directory,
//! builds an engine event, and returns a projection. Errors come out as
//! stable user-visible codes.

mod documents;
mod lifecycle;
mod projection;
mod tasks;
mod workflow;

pub use projection::{
    BallotView, CanAmend, CreatedDocument, DocumentDetails, DocumentSummary, HistoryView,
    LineageEntry, ListFilter, Page, RevisionPayload, SignatureView, TaskItem, TaskKind,
};

use std::sync::Arc;

use tmf_types::{Document, Principal, PrincipalId, WorkflowError};
use tmf_workflow::{DocumentEngine, IdentityDirectory};

use crate::notify::ReviewNotifier;

/// User-visible error: stable code, human message, retry hint
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            retryable: e.is_retryable(),
        }
    }
}

impl ApiError {
    fn invalid_credential() -> Self {
        Self {
            code: "unauthorized",
            message: "invalid or expired credential".to_string(),
            retryable: false,
        }
    }
}

/// The request surface over the engine
pub struct DocumentService {
    engine: DocumentEngine,
    directory: Arc<dyn IdentityDirectory>,
    notifier: Arc<dyn ReviewNotifier>,
}

impl DocumentService {
    pub fn new(
        engine: DocumentEngine,
        directory: Arc<dyn IdentityDirectory>,
        notifier: Arc<dyn ReviewNotifier>,
    ) -> Self {
        Self {
            engine,
            directory,
            notifier,
        }
    }

    /// Resolve a bearer credential to its principal
    pub(crate) async fn authenticate(&self, bearer: &str) -> Result<Principal, ApiError> {
        self.directory
            .authenticate(bearer)
            .await
            .map_err(|_| ApiError::invalid_credential())
    }

    /// Username for display, tolerating principals that left the directory
    pub(crate) async fn username_of(&self, id: PrincipalId) -> String {
        match self.directory.lookup(id).await {
            Ok(principal) => principal.username,
            Err(_) => "unknown".to_string(),
        }
    }

    pub(crate) async fn summarize(&self, doc: &Document) -> DocumentSummary {
        let author = self.username_of(doc.author).await;
        DocumentSummary::from_document(doc, author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmf_types::Status;

    #[test]
    fn test_api_error_carries_engine_code() {
        let err = ApiError::from(WorkflowError::InvalidState {
            status: Status::Draft,
            event: "qc_ballot",
        });
        assert_eq!(err.code, "invalid_state");
        assert!(!err.retryable);

        let err = ApiError::from(WorkflowError::Conflict);
        assert_eq!(err.code, "conflict");
        assert!(err.retryable);
    }
}
