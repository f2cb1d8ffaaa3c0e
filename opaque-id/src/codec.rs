//! AES-GCM symmetric encrypt/decrypt of short strings, and RSA-SHA-256
//! sign/verify of the JSON Web Tokens that wrap them.
//!
//! Every function here is a pure transform over a [`HeatedKeySet`]; nothing
//! here touches the `Holder`'s `current`/`chain` state.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CodecError;
use crate::key_set::HeatedKeySet;

const NONCE_LEN: usize = 12;

/// The exact claim set a token carries: `{kid, internal_id, exp}`.
/// Additional claims are ignored on decode, which `jsonwebtoken` gives us
/// for free by only deserialising the fields named here.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub kid: Uuid,
    pub internal_id: String,
    pub exp: i64,
}

/// Encrypt a single plaintext with `key`'s AES-128 key, drawing a fresh nonce.
/// Output layout: `nonce ‖ ciphertext ‖ tag`, base64-standard-encoded.
pub(crate) fn encrypt(key: &HeatedKeySet, plaintext: &str) -> Result<String, CodecError> {
    Ok(encrypt_many(key, &[plaintext])?.remove(0))
}

/// Encrypt several plaintexts, reusing a single nonce across the batch.
/// Safe only because the plaintexts within one call are disjoint; a fresh
/// call always draws a fresh nonce. See the module docs on §4.2 for the
/// rationale recorded against this choice.
pub(crate) fn encrypt_many(
    key: &HeatedKeySet,
    plaintexts: &[&str],
) -> Result<Vec<String>, CodecError> {
    let cipher = Aes128Gcm::new_from_slice(key.aes_key()).expect("aes key is always 16 bytes");

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut out = Vec::with_capacity(plaintexts.len());
    for plaintext in plaintexts {
        let mut ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CodecError::CipherAuthFailed)?;
        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.append(&mut ciphertext);
        out.push(BASE64_STANDARD.encode(blob));
    }
    Ok(out)
}

/// Decrypt a blob previously produced by [`encrypt`] or [`encrypt_many`].
pub(crate) fn decrypt(key: &HeatedKeySet, encoded: &str) -> Result<String, CodecError> {
    let raw = BASE64_STANDARD.decode(encoded)?;
    if raw.len() < NONCE_LEN {
        return Err(CodecError::CipherTruncated);
    }
    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);

    let cipher = Aes128Gcm::new_from_slice(key.aes_key()).expect("aes key is always 16 bytes");
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CodecError::CipherAuthFailed)?;

    String::from_utf8(plaintext).map_err(|err| CodecError::TokenMalformed(err.to_string()))
}

/// Sign `claims` with `key`'s cached private RSA key, producing an RS256 JWT.
/// Header is the library default `{"alg":"RS256","typ":"JWT"}`; the key id
/// travels in the claim set instead of the header, per the wire contract.
pub(crate) fn sign(key: &HeatedKeySet, claims: &Claims) -> Result<String, CodecError> {
    let header = Header::new(Algorithm::RS256);
    encode(&header, claims, key.encoding_key())
        .map_err(|err| CodecError::TokenMalformed(err.to_string()))
}

/// Verify `token`'s signature and expiry against `key`'s cached public RSA
/// key, returning the validated claims. Decryption of `internal_id` only
/// happens after this succeeds.
pub(crate) fn verify(key: &HeatedKeySet, token: &str) -> Result<Claims, CodecError> {
    let header = jsonwebtoken::decode_header(token)
        .map_err(|err| CodecError::TokenMalformed(err.to_string()))?;
    if header.alg != Algorithm::RS256 {
        return Err(CodecError::TokenMalformed(format!(
            "unexpected signing algorithm: {:?}",
            header.alg
        )));
    }

    let validation = Validation::new(Algorithm::RS256);
    let data = decode::<Claims>(token, key.decoding_key(), &validation).map_err(|err| {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => CodecError::TokenExpired,
            ErrorKind::InvalidSignature => CodecError::TokenSignatureInvalid,
            _ => CodecError::TokenMalformed(err.to_string()),
        }
    })?;

    Ok(data.claims)
}
