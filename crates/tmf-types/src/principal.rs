//! Principals and Roles
//!
//! Principals live in an external identity directory; the engine reads them
//! but never writes them. Private keys stay behind an opaque handle that
//! only the crypto provider can resolve.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::id::{KeyHandle, PrincipalId};

/// Role of a principal within the document pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Contributor,
    Qc,
    Reviewer,
    Approver,
    QualityManager,
    Archivist,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contributor => "contributor",
            Self::Qc => "qc",
            Self::Reviewer => "reviewer",
            Self::Approver => "approver",
            Self::QualityManager => "quality_manager",
            Self::Archivist => "archivist",
            Self::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// May flip an Approved document to Obsolete
    pub fn can_mark_obsolete(&self) -> bool {
        matches!(self, Self::QualityManager | Self::Admin)
    }

    /// May archive an Approved or Superseded document
    pub fn can_archive(&self) -> bool {
        matches!(self, Self::Archivist | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contributor" => Ok(Self::Contributor),
            "qc" => Ok(Self::Qc),
            "reviewer" => Ok(Self::Reviewer),
            "approver" => Ok(Self::Approver),
            "quality_manager" => Ok(Self::QualityManager),
            "archivist" => Ok(Self::Archivist),
            "admin" => Ok(Self::Admin),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct RoleParseError(String);

/// A directory entry for an authenticated actor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub username: String,
    pub role: Role,
    /// PEM-encoded (SPKI) RSA public key, snapshotted into signatures
    pub public_key_pem: String,
    /// Opaque reference the crypto provider resolves when this principal
    /// personally triggers a signing event
    pub private_key_handle: KeyHandle,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [
            Role::Contributor,
            Role::Qc,
            Role::Reviewer,
            Role::Approver,
            Role::QualityManager,
            Role::Archivist,
            Role::Admin,
        ] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_capabilities() {
        assert!(Role::Admin.can_mark_obsolete());
        assert!(Role::QualityManager.can_mark_obsolete());
        assert!(!Role::Archivist.can_mark_obsolete());

        assert!(Role::Archivist.can_archive());
        assert!(Role::Admin.can_archive());
        assert!(!Role::Reviewer.can_archive());
    }
}
