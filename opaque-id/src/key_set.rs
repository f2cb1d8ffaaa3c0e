//! The unit of cryptographic material a [`crate::holder::Holder`] hands out.

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey};
use uuid::Uuid;

use crate::error::KeyMaterialError;
use crate::key_material;

/// A bundle of one AES encryption key and one RSA signing key pair, sharing
/// an id and an expiry.
#[derive(Clone)]
pub struct KeySet {
    pub id: Uuid,
    pub encryption_key: String,
    pub signing_key: String,
    pub public_key: String,
    pub expiry: DateTime<Utc>,
    pub revoked: bool,
}

impl KeySet {
    /// `active ≡ !revoked ∧ now < expiry`.
    pub fn active(&self) -> bool {
        !self.revoked && Utc::now() < self.expiry
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySet")
            .field("id", &self.id)
            .field("encryption_key", &"***redacted***")
            .field("signing_key", &"***redacted***")
            .field("public_key", &self.public_key)
            .field("expiry", &self.expiry)
            .field("revoked", &self.revoked)
            .finish()
    }
}

/// A [`KeySet`] with its RSA and AES material eagerly parsed and cached
/// ("heated" — see the glossary entry). The Holder heats a KeySet exactly
/// once, the moment it adopts it, so that `Encode`/`Decode` never re-parse
/// PEM on the hot path.
#[derive(Clone)]
pub struct HeatedKeySet {
    key_set: KeySet,
    encoding_key: std::sync::Arc<EncodingKey>,
    decoding_key: std::sync::Arc<DecodingKey>,
    aes_key: [u8; key_material::SYMMETRIC_KEY_LEN],
}

impl HeatedKeySet {
    pub fn heat(key_set: KeySet) -> Result<Self, KeyMaterialError> {
        let encoding_key = EncodingKey::from_rsa_pem(key_set.signing_key.as_bytes())
            .map_err(|err| KeyMaterialError::KeyMalformed(err.to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(key_set.public_key.as_bytes())
            .map_err(|err| KeyMaterialError::KeyMalformed(err.to_string()))?;
        let aes_key = key_material::decode_symmetric_key(&key_set.encryption_key)?;

        Ok(Self {
            key_set,
            encoding_key: std::sync::Arc::new(encoding_key),
            decoding_key: std::sync::Arc::new(decoding_key),
            aes_key,
        })
    }

    pub fn id(&self) -> Uuid {
        self.key_set.id
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.key_set.expiry
    }

    pub fn active(&self) -> bool {
        self.key_set.active()
    }

    pub fn key_set(&self) -> &KeySet {
        &self.key_set
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    pub(crate) fn aes_key(&self) -> &[u8; key_material::SYMMETRIC_KEY_LEN] {
        &self.aes_key
    }
}

impl std::fmt::Debug for HeatedKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeatedKeySet")
            .field("key_set", &self.key_set)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_material;

    fn fresh_key_set(expiry: DateTime<Utc>, revoked: bool) -> KeySet {
        let encryption_key = key_material::generate_symmetric_key().expect("symmetric key");
        let (signing_key, public_key) =
            key_material::generate_asymmetric_key_pair().expect("asymmetric pair");
        KeySet {
            id: Uuid::new_v4(),
            encryption_key,
            signing_key,
            public_key,
            expiry,
            revoked,
        }
    }

    #[test]
    fn active_requires_unrevoked_and_unexpired() {
        let future = Utc::now() + chrono::Duration::days(7);
        let past = Utc::now() - chrono::Duration::seconds(1);

        assert!(fresh_key_set(future, false).active());
        assert!(!fresh_key_set(future, true).active());
        assert!(!fresh_key_set(past, false).active());
    }

    #[test]
    fn heating_caches_parsed_material() {
        let key_set = fresh_key_set(Utc::now() + chrono::Duration::days(7), false);
        let id = key_set.id;
        let heated = HeatedKeySet::heat(key_set).expect("heat");
        assert_eq!(heated.id(), id);
        assert!(heated.active());
    }
}
