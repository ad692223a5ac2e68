//! Typed Identifiers
//!
//! Opaque newtype ids for documents, lineages, principals, blobs, and
//! private-key handles. Keeping them distinct types prevents cross-wiring
//! at the engine boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error for malformed identifier strings
#[derive(Debug, thiserror::Error)]
#[error("invalid identifier: {0}")]
pub struct IdParseError(String);

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh random identifier
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| IdParseError(s.to_string()))
            }
        }
    };
}

uuid_id! {
    /// Identifier of a single document record; stable across its lifetime
    DocumentId
}

uuid_id! {
    /// Identifier shared by every version descended from one creation
    LineageId
}

uuid_id! {
    /// Identifier of a principal in the external directory
    PrincipalId
}

uuid_id! {
    /// Opaque reference to a private key held by the crypto provider.
    /// The engine never sees key material, only this handle.
    KeyHandle
}

/// Content digest key of a stored blob (lowercase sha-256 hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
