use thiserror::Error;

/// Errors produced by key generation and PEM parsing.
#[derive(Debug, Error)]
pub enum KeyMaterialError {
    #[error("OS entropy source unavailable: {0}")]
    CryptoRandomUnavailable(String),
    #[error("failed to generate key material: {0}")]
    KeyGenerationFailed(String),
    #[error("malformed key material: {0}")]
    KeyMalformed(String),
    #[error("key uses an unexpected algorithm")]
    KeyUnexpectedAlgorithm,
}

/// Errors produced by the symmetric and token layers.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("ciphertext shorter than the AES-GCM nonce")]
    CipherTruncated,
    #[error("AES-GCM authentication failed")]
    CipherAuthFailed,
    #[error("token is not a well-formed JWT: {0}")]
    TokenMalformed(String),
    #[error("token signature verification failed")]
    TokenSignatureInvalid,
    #[error("token has expired")]
    TokenExpired,
    #[error(transparent)]
    KeyMaterial(#[from] KeyMaterialError),
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors surfaced by a [`crate::key_store::KeyStore`] implementation.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("no active keyset")]
    NoActiveKeySet,
    #[error("key store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Errors surfaced by [`crate::holder::Holder`].
#[derive(Debug, Error)]
pub enum HolderError {
    #[error("holder revoked")]
    Revoked,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] KeyStoreError),
    #[error(transparent)]
    KeyMaterial(#[from] KeyMaterialError),
}

impl HolderError {
    /// True for errors that an external API surface should collapse to an opaque
    /// "invalid id" rather than leak the internal kind.
    pub fn is_invalid_id(&self) -> bool {
        matches!(self, HolderError::Codec(_))
    }

    /// True for errors that an external API surface should collapse to
    /// "service unavailable".
    pub fn is_service_unavailable(&self) -> bool {
        match self {
            HolderError::Revoked => true,
            HolderError::Store(KeyStoreError::StoreUnavailable(_)) => true,
            _ => false,
        }
    }
}

/// Errors surfaced by [`crate::opaque_id::OpaqueId`].
#[derive(Debug, Error)]
pub enum OpaqueIdError {
    #[error("no codec set for OpaqueId")]
    NoCodecBound,
    #[error("no stored external id within OpaqueId to decode")]
    NoExternalPayload,
    #[error(transparent)]
    Holder(#[from] HolderError),
}

impl OpaqueIdError {
    pub fn is_invalid_id(&self) -> bool {
        matches!(self, OpaqueIdError::Holder(err) if err.is_invalid_id())
    }

    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, OpaqueIdError::Holder(err) if err.is_service_unavailable())
    }
}
