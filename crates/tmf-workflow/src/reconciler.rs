//! Supersession Reconciler
//!
//! Background sweep that finalizes the two-phase amendment-approval
//! protocol. A predecessor carrying a `pending_supersession` marker was
//! caught mid-commit: if its successor reached Approved the predecessor is
//! flipped to Superseded, otherwise the marker is cleared.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use tmf_types::{Document, WorkflowError};

use crate::identity::IdentityDirectory;
use crate::lifecycle;
use crate::store::{DocumentStore, StoreError};

/// Sweep interval between scans
const SCAN_INTERVAL_MS: u64 = 1_000;

/// Backoff after a failed scan
const ERROR_BACKOFF_MS: u64 = 5_000;

pub struct SupersessionReconciler {
    documents: Arc<dyn DocumentStore>,
    directory: Arc<dyn IdentityDirectory>,
}

impl SupersessionReconciler {
    pub fn new(documents: Arc<dyn DocumentStore>, directory: Arc<dyn IdentityDirectory>) -> Self {
        Self {
            documents,
            directory,
        }
    }

    /// Run the sweep loop until the shutdown signal flips
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("supersession reconciler started");

        loop {
            if *shutdown.borrow() {
                info!("supersession reconciler shutting down");
                break;
            }

            let wait = match self.scan_once().await {
                Ok(finalized) => {
                    if finalized > 0 {
                        info!(finalized, "supersession markers finalized");
                    }
                    SCAN_INTERVAL_MS
                }
                Err(e) => {
                    warn!(error = %e, "reconciler scan failed");
                    ERROR_BACKOFF_MS
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(wait)) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("supersession reconciler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One sweep over all marked predecessors; returns how many were
    /// resolved (finalized or cleared)
    pub async fn scan_once(&self) -> Result<usize, WorkflowError> {
        let marked = self
            .documents
            .find_pending_supersessions()
            .await
            .map_err(|e| WorkflowError::StorageFailure(e.to_string()))?;

        let mut resolved = 0;
        for predecessor in marked {
            match self.resolve(predecessor).await {
                Ok(true) => resolved += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "could not resolve supersession marker"),
            }
        }
        Ok(resolved)
    }

    async fn resolve(&self, mut predecessor: Document) -> Result<bool, WorkflowError> {
        let Some(successor_id) = predecessor.pending_supersession else {
            return Ok(false);
        };

        let successor = match self.documents.load(successor_id).await {
            Ok(doc) => Some(doc),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(WorkflowError::StorageFailure(e.to_string())),
        };

        let approved = successor
            .as_ref()
            .map(|s| s.status == tmf_types::Status::Approved)
            .unwrap_or(false);

        if approved {
            let signer = successor
                .as_ref()
                .and_then(|s| s.signature.as_ref())
                .map(|sig| sig.signer_principal)
                .unwrap_or(predecessor.author);
            let signer_name = match self.directory.lookup(signer).await {
                Ok(principal) => principal.username,
                Err(_) => "system".to_string(),
            };
            lifecycle::supersede(
                &mut predecessor,
                successor_id,
                signer,
                &signer_name,
                Utc::now(),
            );
        } else {
            // The approval never committed; drop the stale marker
            predecessor.pending_supersession = None;
        }

        match self.documents.update(&predecessor).await {
            Ok(_) => Ok(true),
            // Someone else advanced the document; next sweep re-evaluates
            Err(StoreError::Conflict) => Ok(false),
            Err(e) => Err(WorkflowError::StorageFailure(e.to_string())),
        }
    }
}
