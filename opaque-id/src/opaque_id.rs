//! The carrier value applications hold instead of a raw integer primary key.

use std::sync::Weak;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};

use crate::error::OpaqueIdError;
use crate::holder::IdCodec;

#[derive(Clone)]
enum Payload {
    Internal(i64),
    External(String),
}

/// Exactly one of two states: an internal integer headed outbound, or an
/// opaque external token that arrived inbound. The codec reference is a
/// non-owning weak reference — the Holder that supplies it outlives every
/// OpaqueId built against it, so OpaqueId never shares ownership of it.
#[derive(Clone)]
pub struct OpaqueId {
    payload: Payload,
    codec: Option<Weak<dyn IdCodec>>,
}

impl OpaqueId {
    /// `id` is expected to be `>= 0` (the data model's Internal invariant).
    /// Debug builds catch a violation at the call site; release builds pass
    /// it through unchecked, matching the source's own lack of enforcement
    /// here — see DESIGN.md.
    pub fn internal(id: i64) -> Self {
        debug_assert!(id >= 0, "OpaqueId::internal called with a negative id: {id}");
        Self {
            payload: Payload::Internal(id),
            codec: None,
        }
    }

    pub fn external(token: impl Into<String>) -> Self {
        Self {
            payload: Payload::External(token.into()),
            codec: None,
        }
    }

    /// Returns a value carrying the same identifier data with `codec`
    /// bound. Does not mutate `self`; the returned value is independent.
    pub fn with_codec(&self, codec: Weak<dyn IdCodec>) -> Self {
        Self {
            payload: self.payload.clone(),
            codec: Some(codec),
        }
    }

    /// Binds `codec` in place. Used by the [`crate::walker`] traversal,
    /// which mutates every reachable OpaqueId rather than rebuilding the
    /// structure around it.
    pub fn install_codec(&mut self, codec: Weak<dyn IdCodec>) {
        self.codec = Some(codec);
    }

    pub fn as_internal(&self) -> Option<i64> {
        match self.payload {
            Payload::Internal(id) => Some(id),
            Payload::External(_) => None,
        }
    }

    pub fn as_external(&self) -> Option<&str> {
        match &self.payload {
            Payload::External(ref token) => Some(token),
            Payload::Internal(_) => None,
        }
    }

    /// Resolves an External-state OpaqueId to its internal integer.
    /// Requires External state and a still-live bound codec.
    pub async fn decode(&self) -> Result<i64, OpaqueIdError> {
        let Payload::External(token) = &self.payload else {
            return Err(OpaqueIdError::NoExternalPayload);
        };
        let codec = self.live_codec()?;
        codec.decode_id(token).await.map_err(OpaqueIdError::Holder)
    }

    /// Produces the encoded external form, for the API/query-language
    /// boundary. Requires Internal state and a bound codec; an OpaqueId
    /// already in External state simply hands back its stored token.
    pub async fn serialise_json(&self) -> Result<String, OpaqueIdError> {
        self.encode_external().await
    }

    /// Same contract as [`OpaqueId::serialise_json`], named separately to
    /// mirror the two call-sites the source distinguishes (plain JSON vs.
    /// the query-language scalar marshaller).
    pub async fn serialise_ql(&self) -> Result<String, OpaqueIdError> {
        self.encode_external().await
    }

    async fn encode_external(&self) -> Result<String, OpaqueIdError> {
        match &self.payload {
            Payload::External(token) => Ok(token.clone()),
            Payload::Internal(id) => {
                let codec = self.live_codec()?;
                codec.encode_id(*id).await.map_err(OpaqueIdError::Holder)
            }
        }
    }

    fn live_codec(&self) -> Result<std::sync::Arc<dyn IdCodec>, OpaqueIdError> {
        self.codec
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(OpaqueIdError::NoCodecBound)
    }
}

/// Deserialises from a bare string at the API/query-language boundary;
/// never decrypts at parse time.
impl<'de> Deserialize<'de> for OpaqueId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        if token.is_empty() {
            return Err(D::Error::custom("OpaqueId must be a non-empty string"));
        }
        Ok(OpaqueId::external(token))
    }
}

/// Database-boundary write side: emits the raw internal integer. Never
/// round-trips through the external encoding at this boundary.
impl TryFrom<&OpaqueId> for i64 {
    type Error = OpaqueIdError;

    fn try_from(value: &OpaqueId) -> Result<Self, Self::Error> {
        value.as_internal().ok_or(OpaqueIdError::NoExternalPayload)
    }
}

/// Database-boundary read side: a 32-bit scanned integer becomes Internal.
/// Negative values pass through unchecked in release builds; see
/// [`OpaqueId::internal`].
impl From<i32> for OpaqueId {
    fn from(value: i32) -> Self {
        OpaqueId::internal(value.into())
    }
}

/// Database-boundary read side: a 64-bit scanned integer becomes Internal.
/// Negative values pass through unchecked in release builds; see
/// [`OpaqueId::internal`].
impl From<i64> for OpaqueId {
    fn from(value: i64) -> Self {
        OpaqueId::internal(value)
    }
}
