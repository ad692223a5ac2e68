//! Crypto Primitive
//!
//! Detached RSA-2048 PKCS#1 v1.5 signatures over SHA-256 digests, base64-
//! encoded for storage, PEM (SPKI) public keys. Private keys live inside
//! the provider and are addressed by opaque handles; the engine never sees
//! key material.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tmf_types::KeyHandle;

/// Canonical key length
pub const KEY_BITS: usize = 2048;

/// Error type for signing operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("unknown key handle")]
    UnknownHandle,

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Signs payloads with a principal's private key, resolved by handle
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Detached signature over sha256(payload), base64-encoded
    async fn sign(&self, handle: KeyHandle, payload: &[u8]) -> Result<String, CryptoError>;
}

/// Verify a detached signature with a PEM public key. Malformed keys or
/// signatures verify as false rather than erroring; verification is a
/// boolean question.
pub fn verify(public_key_pem: &str, payload: &[u8], signature_b64: &str) -> bool {
    let Ok(key) = RsaPublicKey::from_public_key_pem(public_key_pem) else {
        return false;
    };
    let Ok(signature) = BASE64.decode(signature_b64) else {
        return false;
    };
    let digest = Sha256::digest(payload);
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
        .is_ok()
}

/// In-process key vault holding private keys behind handles
#[derive(Default)]
pub struct RsaKeyVault {
    keys: Arc<RwLock<HashMap<KeyHandle, RsaPrivateKey>>>,
}

impl RsaKeyVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh RSA-2048 key pair; the private key stays in the
    /// vault, the caller gets the handle and the public key PEM.
    pub fn generate_keypair(&self) -> Result<(KeyHandle, String), CryptoError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public_pem = RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        let handle = KeyHandle::generate();
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        keys.insert(handle, private_key);
        Ok((handle, public_pem))
    }
}

#[async_trait]
impl CryptoProvider for RsaKeyVault {
    async fn sign(&self, handle: KeyHandle, payload: &[u8]) -> Result<String, CryptoError> {
        let key = {
            let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
            keys.get(&handle).cloned().ok_or(CryptoError::UnknownHandle)?
        };
        let digest = Sha256::digest(payload);
        let signature = key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(BASE64.encode(signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_verify_roundtrip() {
        let vault = RsaKeyVault::new();
        let (handle, public_pem) = vault.generate_keypair().unwrap();

        let payload = b"approved protocol content";
        let signature = vault.sign(handle, payload).await.unwrap();

        assert!(verify(&public_pem, payload, &signature));
        assert!(!verify(&public_pem, b"tampered content", &signature));
    }

    #[tokio::test]
    async fn test_wrong_key_fails_verification() {
        let vault = RsaKeyVault::new();
        let (handle, _) = vault.generate_keypair().unwrap();
        let (_, other_pem) = vault.generate_keypair().unwrap();

        let signature = vault.sign(handle, b"payload").await.unwrap();
        assert!(!verify(&other_pem, b"payload", &signature));
    }

    #[tokio::test]
    async fn test_unknown_handle_is_refused() {
        let vault = RsaKeyVault::new();
        let result = vault.sign(KeyHandle::generate(), b"payload").await;
        assert!(matches!(result, Err(CryptoError::UnknownHandle)));
    }

    #[test]
    fn test_verify_tolerates_garbage_inputs() {
        assert!(!verify("not a pem", b"payload", "not base64 !!"));
        assert!(!verify("", b"", ""));
    }
}
