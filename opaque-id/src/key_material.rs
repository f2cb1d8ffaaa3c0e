//! Pure key generation and PEM (de)serialisation helpers.
//!
//! Nothing here touches a `KeySet` or a store; callers decide what to do with
//! the generated/parsed material. Kept free of any caching so that the
//! "heat" behaviour (see [`crate::key_set`]) has one obvious place to live.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use rand_core::{OsRng, RngCore};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::spki::Error as SpkiError;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::KeyMaterialError;

/// AES-128-GCM key size in bytes.
pub const SYMMETRIC_KEY_LEN: usize = 16;

const RSA_KEY_BITS: usize = 2048;

/// Generate a fresh 16-byte AES key, base64-encoded.
pub fn generate_symmetric_key() -> Result<String, KeyMaterialError> {
    let mut bytes = [0u8; SYMMETRIC_KEY_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| KeyMaterialError::CryptoRandomUnavailable(err.to_string()))?;
    Ok(BASE64_STANDARD.encode(bytes))
}

/// Generate a fresh 2048-bit RSA key pair, returning `(private_pem, public_pem)`.
///
/// The private key is PKCS#1-serialised; the public key is PKIX-serialised,
/// matching the layout the rest of this crate expects a `KeySet` to carry.
pub fn generate_asymmetric_key_pair() -> Result<(String, String), KeyMaterialError> {
    let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
        .map_err(|err| KeyMaterialError::KeyGenerationFailed(err.to_string()))?;
    let public_key = private_key.to_public_key();

    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|err| KeyMaterialError::KeyGenerationFailed(err.to_string()))?;
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|err| KeyMaterialError::KeyGenerationFailed(err.to_string()))?;

    Ok((private_pem.to_string(), public_pem))
}

/// Parse a PKCS#1 PEM-encoded RSA private key.
pub fn parse_private(pem: &str) -> Result<RsaPrivateKey, KeyMaterialError> {
    RsaPrivateKey::from_pkcs1_pem(pem).map_err(|err| KeyMaterialError::KeyMalformed(err.to_string()))
}

/// Parse a PKIX PEM-encoded RSA public key. A well-formed SubjectPublicKeyInfo
/// carrying a non-RSA algorithm OID (e.g. an EC key) is rejected with
/// `KeyUnexpectedAlgorithm` rather than folded into `KeyMalformed`.
pub fn parse_public(pem: &str) -> Result<RsaPublicKey, KeyMaterialError> {
    RsaPublicKey::from_public_key_pem(pem).map_err(|err| match err {
        SpkiError::OidUnknown { .. } => KeyMaterialError::KeyUnexpectedAlgorithm,
        other => KeyMaterialError::KeyMalformed(other.to_string()),
    })
}

/// Decode a base64-encoded AES-128 key into its raw 16 bytes.
pub fn decode_symmetric_key(encoded: &str) -> Result<[u8; SYMMETRIC_KEY_LEN], KeyMaterialError> {
    let raw = BASE64_STANDARD
        .decode(encoded)
        .map_err(|err| KeyMaterialError::KeyMalformed(err.to_string()))?;
    if raw.len() != SYMMETRIC_KEY_LEN {
        return Err(KeyMaterialError::KeyMalformed(format!(
            "expected a {SYMMETRIC_KEY_LEN}-byte key, got {}",
            raw.len()
        )));
    }
    let mut out = [0u8; SYMMETRIC_KEY_LEN];
    out.copy_from_slice(&raw);
    Ok(out)
}
