//! TMF Vault document lifecycle engine
//!
//! Takes an authored file through the deterministic QC → technical review →
//! final approval pipeline, binds approved versions to an RSA signature,
//! and preserves a tamper-evident audit trail. Collaborators (document
//! store, blob store, identity directory, crypto provider, sequence
//! allocator) are injected at construction; there is no process-global
//! state.

pub mod blob_store;
pub mod coordinator;
pub mod crypto;
pub mod engine;
pub mod identity;
pub mod lifecycle;
pub mod reconciler;
pub mod sequence;
pub mod state_machine;
pub mod store;

pub use blob_store::{BlobStore, BlobStoreError, FsBlobStore, InMemoryBlobStore};
pub use crypto::{CryptoError, CryptoProvider, RsaKeyVault};
pub use engine::DocumentEngine;
pub use identity::{DirectoryError, IdentityDirectory, InMemoryDirectory};
pub use reconciler::SupersessionReconciler;
pub use sequence::{InMemorySequenceAllocator, SequenceAllocator};
pub use state_machine::{ApprovalDecision, Event, NewRevision};
pub use store::{DocumentStore, InMemoryDocumentStore, StoreError};
