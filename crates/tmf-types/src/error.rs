//! Engine Error Taxonomy
//!
//! Typed outcomes for every rejected event. The request surface maps these
//! to user-visible codes; nothing is silently swallowed.

use crate::id::DocumentId;
use crate::status::Status;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Unknown doc_id, lineage, or blob
    #[error("not found: {0}")]
    NotFound(String),

    /// Actor lacks the role or ownership the event requires
    #[error("forbidden: {0}")]
    Unauthorized(String),

    /// Status precondition not satisfied
    #[error("event '{event}' not allowed while document is '{status}'")]
    InvalidState { status: Status, event: &'static str },

    /// Missing required field, empty reviewer list, unknown decision
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Another amendment of the same predecessor is still in progress
    #[error("an amendment is already in progress: {existing}")]
    DuplicateAmendment { existing: DocumentId },

    /// Stale snapshot; the caller should retry
    #[error("document was modified concurrently, retry")]
    Conflict,

    /// Crypto provider refused or the key handle could not be resolved
    #[error("signature failed: {0}")]
    SignatureFailed(String),

    /// Underlying blob or document store unavailable; retryable
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl WorkflowError {
    /// Stable machine-readable code for the request surface
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidState { .. } => "invalid_state",
            Self::InvalidInput(_) => "invalid_input",
            Self::DuplicateAmendment { .. } => "duplicate_amendment",
            Self::Conflict => "conflict",
            Self::SignatureFailed(_) => "signature_failed",
            Self::StorageFailure(_) => "storage_failure",
        }
    }

    /// Whether the caller may reasonably retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict | Self::StorageFailure(_))
    }
}
