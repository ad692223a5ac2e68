//! Identity Directory
//!
//! Read-only view of principals: id → {username, role, public key, private
//! key handle}. Credential issuance lives elsewhere; the engine only
//! resolves bearer credentials to principals and reads directory entries.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use tmf_types::{KeyHandle, Principal, PrincipalId, Role};

/// Error type for directory operations
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("principal not found")]
    UnknownPrincipal,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("directory backend: {0}")]
    Backend(String),
}

/// Abstract identity directory
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Resolve a principal by id
    async fn lookup(&self, id: PrincipalId) -> Result<Principal, DirectoryError>;

    /// Resolve a bearer credential to its principal
    async fn authenticate(&self, bearer: &str) -> Result<Principal, DirectoryError>;

    /// Enumerate principals holding a role (reviewer/approver discovery)
    async fn list_by_role(&self, role: Role) -> Result<Vec<Principal>, DirectoryError>;
}

#[derive(Default)]
struct Inner {
    principals: HashMap<PrincipalId, Principal>,
    tokens: HashMap<String, PrincipalId>,
}

/// In-memory directory
#[derive(Default)]
pub struct InMemoryDirectory {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a principal with a previously generated key pair
    pub async fn register(
        &self,
        username: impl Into<String>,
        role: Role,
        public_key_pem: impl Into<String>,
        private_key_handle: KeyHandle,
    ) -> Principal {
        let principal = Principal {
            id: PrincipalId::generate(),
            username: username.into(),
            role,
            public_key_pem: public_key_pem.into(),
            private_key_handle,
        };
        let mut inner = self.inner.write().await;
        inner.principals.insert(principal.id, principal.clone());
        principal
    }

    /// Issue an opaque bearer credential for a principal
    pub async fn issue_token(&self, id: PrincipalId) -> Result<String, DirectoryError> {
        let mut inner = self.inner.write().await;
        if !inner.principals.contains_key(&id) {
            return Err(DirectoryError::UnknownPrincipal);
        }
        let token = Uuid::new_v4().to_string();
        inner.tokens.insert(token.clone(), id);
        Ok(token)
    }

    /// Replace a principal's key pair. Signatures snapshotted earlier keep
    /// verifying against the old public key.
    pub async fn rotate_key(
        &self,
        id: PrincipalId,
        public_key_pem: impl Into<String>,
        private_key_handle: KeyHandle,
    ) -> Result<(), DirectoryError> {
        let mut inner = self.inner.write().await;
        let principal = inner
            .principals
            .get_mut(&id)
            .ok_or(DirectoryError::UnknownPrincipal)?;
        principal.public_key_pem = public_key_pem.into();
        principal.private_key_handle = private_key_handle;
        Ok(())
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn lookup(&self, id: PrincipalId) -> Result<Principal, DirectoryError> {
        let inner = self.inner.read().await;
        inner
            .principals
            .get(&id)
            .cloned()
            .ok_or(DirectoryError::UnknownPrincipal)
    }

    async fn authenticate(&self, bearer: &str) -> Result<Principal, DirectoryError> {
        let inner = self.inner.read().await;
        let id = inner
            .tokens
            .get(bearer)
            .ok_or(DirectoryError::InvalidCredential)?;
        inner
            .principals
            .get(id)
            .cloned()
            .ok_or(DirectoryError::UnknownPrincipal)
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<Principal>, DirectoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .principals
            .values()
            .filter(|p| p.role == role)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let dir = InMemoryDirectory::new();
        let p = dir
            .register("u1", Role::Contributor, "-----PEM-----", KeyHandle::generate())
            .await;

        let token = dir.issue_token(p.id).await.unwrap();
        let authed = dir.authenticate(&token).await.unwrap();
        assert_eq!(authed.id, p.id);
        assert_eq!(authed.username, "u1");

        assert!(matches!(
            dir.authenticate("bogus").await,
            Err(DirectoryError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn test_list_by_role() {
        let dir = InMemoryDirectory::new();
        dir.register("r1", Role::Reviewer, "pem", KeyHandle::generate())
            .await;
        dir.register("r2", Role::Reviewer, "pem", KeyHandle::generate())
            .await;
        dir.register("a1", Role::Approver, "pem", KeyHandle::generate())
            .await;

        assert_eq!(dir.list_by_role(Role::Reviewer).await.unwrap().len(), 2);
        assert_eq!(dir.list_by_role(Role::Approver).await.unwrap().len(), 1);
        assert!(dir.list_by_role(Role::Admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rotate_key_updates_directory_entry() {
        let dir = InMemoryDirectory::new();
        let p = dir
            .register("u4", Role::Approver, "old-pem", KeyHandle::generate())
            .await;

        let new_handle = KeyHandle::generate();
        dir.rotate_key(p.id, "new-pem", new_handle).await.unwrap();

        let refreshed = dir.lookup(p.id).await.unwrap();
        assert_eq!(refreshed.public_key_pem, "new-pem");
        assert_eq!(refreshed.private_key_handle, new_handle);
    }
}
