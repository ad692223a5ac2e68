//! Shared domain types for TMF Vault
//!
//! Single source of truth for identifiers, principals, the document record,
//! ballots, audit history, and the engine error taxonomy. Every boundary
//! (engine, stores, request surface) speaks these types.

pub mod audit;
pub mod ballot;
pub mod document;
pub mod error;
pub mod id;
pub mod principal;
pub mod status;

pub use audit::{AuditAction, AuditEntry};
pub use ballot::{Ballot, BallotDecision, StageOutcome};
pub use document::{
    Document, Revision, Signature, StageDueDates, TmfMetadata, Version,
};
pub use error::WorkflowError;
pub use id::{BlobId, DocumentId, KeyHandle, LineageId, PrincipalId};
pub use principal::{Principal, Role};
pub use status::{Stage, Status};
