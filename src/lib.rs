//! TMF Vault — request surface over the document lifecycle engine
//!
//! Thin, transport-agnostic translation layer: authenticates the actor
//! against the identity directory, turns operations into engine events,
//! shapes read-side projections, and maps typed engine errors to stable
//! user-visible codes.

pub mod api;
pub mod notify;

pub use api::{
    ApiError, CanAmend, CreatedDocument, DocumentDetails, DocumentService, DocumentSummary,
    LineageEntry, ListFilter, Page, RevisionPayload, TaskItem, TaskKind,
};
pub use notify::{LogNotifier, ReviewNotification, ReviewNotifier};
