//! Signing contract for the transaction pipeline.
//!
//! A [`Signer`] exposes exactly two things: its address and a "sign this
//! 32-byte digest" operation returning a 65-byte `[R || S || V]` signature.
//! The private credential never leaves the implementation — the pipeline
//! only ever sees digests going in and signatures coming out.
//!
//! [`LocalSigner`] wraps an in-memory [`alloy`] secp256k1 key. Encrypted
//! key files are a concern of the host application; it decrypts the key
//! material and hands the raw hex to [`LocalSigner::from_hex`].

use alloy::primitives::{Address, B256};
use alloy::signers::Signer as AlloySigner;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

/// Errors produced by signers.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SignerError {
    /// The provided key material could not be parsed.
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// The signing operation itself failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Holds a private credential and signs 32-byte digests with it.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The address derived from the held credential.
    fn address(&self) -> Address;

    /// Sign a 32-byte digest, returning the 65-byte `[R || S || V]`
    /// signature. The recovery byte may use either the 0/1 or the legacy
    /// 27/28 convention; the transaction pipeline normalizes it.
    async fn sign_digest(&self, digest: B256) -> Result<Vec<u8>, SignerError>;
}

/// In-memory secp256k1 signer backed by [`PrivateKeySigner`].
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.inner.address())
            .finish_non_exhaustive()
    }
}

impl LocalSigner {
    /// Parse a hex-encoded private key, with or without a `0x` prefix.
    pub fn from_hex(key: &str) -> Result<Self, SignerError> {
        let key = key.strip_prefix("0x").unwrap_or(key);
        let inner = key
            .parse::<PrivateKeySigner>()
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Generate a fresh random key.
    #[must_use]
    pub fn random() -> Self {
        Self {
            inner: PrivateKeySigner::random(),
        }
    }
}

impl From<PrivateKeySigner> for LocalSigner {
    fn from(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign_digest(&self, digest: B256) -> Result<Vec<u8>, SignerError> {
        let signature = self
            .inner
            .sign_hash(&digest)
            .await
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        Ok(signature.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_hex_accepts_prefixed_and_bare_keys() {
        let key = "4c0883a69102937d6231471b5dbb6204fe512961708279feb1be6ae5538da033";
        let bare = LocalSigner::from_hex(key).unwrap();
        let prefixed = LocalSigner::from_hex(&format!("0x{key}")).unwrap();
        assert_eq!(bare.address(), prefixed.address());
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(LocalSigner::from_hex("not-a-key").is_err());
    }

    #[tokio::test]
    async fn signature_is_sixty_five_bytes() {
        let signer = LocalSigner::random();
        let sig = signer.sign_digest(B256::repeat_byte(0x42)).await.unwrap();
        assert_eq!(sig.len(), 65);
    }
}
