//! Installs a codec on every reachable [`OpaqueId`] in a value.
//!
//! The source walks arbitrary object graphs at runtime via reflection,
//! which Rust has no equivalent of. Instead, `InstallsCodec` is implemented
//! per-type: the blanket impls below cover the containers a domain object
//! is actually built from (`Option`, `Vec`, `Box`, `HashMap`), so a struct
//! only needs to `#[derive]`-like hand-implement it once by delegating to
//! its fields. Because none of these containers can form a reference
//! cycle without reaching for `Rc`/`RefCell`, the "no fix-point iteration"
//! requirement (§9) is satisfied by construction rather than by tracking
//! visited addresses. "MUST NOT cross into unexported fields" likewise
//! falls out for free: an `impl InstallsCodec for SomeType` can only reach
//! the fields its own module can see.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Weak;

use crate::holder::IdCodec;
use crate::opaque_id::OpaqueId;

/// Implemented by any type that knows how to install a codec on every
/// [`OpaqueId`] it (transitively) owns.
pub trait InstallsCodec {
    fn install_codec(&mut self, codec: &Weak<dyn IdCodec>);
}

/// Installs `codec` on every reachable OpaqueId in `value`, in one pass.
pub fn walk<T: InstallsCodec + ?Sized>(value: &mut T, codec: &Weak<dyn IdCodec>) {
    value.install_codec(codec);
}

impl InstallsCodec for OpaqueId {
    fn install_codec(&mut self, codec: &Weak<dyn IdCodec>) {
        OpaqueId::install_codec(self, codec.clone());
    }
}

/// Tolerant of the `None` case, standing in for the source's nil-pointer
/// tolerance requirement.
impl<T: InstallsCodec> InstallsCodec for Option<T> {
    fn install_codec(&mut self, codec: &Weak<dyn IdCodec>) {
        if let Some(inner) = self {
            inner.install_codec(codec);
        }
    }
}

impl<T: InstallsCodec> InstallsCodec for Vec<T> {
    fn install_codec(&mut self, codec: &Weak<dyn IdCodec>) {
        for item in self.iter_mut() {
            item.install_codec(codec);
        }
    }
}

impl<T: InstallsCodec + ?Sized> InstallsCodec for Box<T> {
    fn install_codec(&mut self, codec: &Weak<dyn IdCodec>) {
        (**self).install_codec(codec);
    }
}

impl<K: Eq + Hash, V: InstallsCodec> InstallsCodec for HashMap<K, V> {
    fn install_codec(&mut self, codec: &Weak<dyn IdCodec>) {
        for value in self.values_mut() {
            value.install_codec(codec);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HolderError;
    use std::sync::Arc;

    struct NoopCodec;

    #[async_trait::async_trait]
    impl IdCodec for NoopCodec {
        async fn encode_id(&self, internal_id: i64) -> Result<String, HolderError> {
            Ok(internal_id.to_string())
        }
        async fn decode_id(&self, token: &str) -> Result<i64, HolderError> {
            token
                .parse()
                .map_err(|_| HolderError::Codec(crate::error::CodecError::TokenMalformed("x".into())))
        }
    }

    struct Sub {
        id: OpaqueId, // unexported in spirit: only reachable via Outer's own impl
    }

    struct Outer {
        id: Box<OpaqueId>,
        sub: Sub,
    }

    impl InstallsCodec for Outer {
        fn install_codec(&mut self, codec: &Weak<dyn IdCodec>) {
            self.id.install_codec(codec);
            // `sub.id` is deliberately NOT walked here, mirroring the source's
            // unexported-field boundary (§8 scenario S3).
        }
    }

    async fn is_bound(id: &OpaqueId) -> bool {
        // `serialise_json` only succeeds with a bound, still-live codec.
        id.as_internal().is_some() && id.serialise_json().await.is_ok()
    }

    #[tokio::test]
    async fn walk_installs_into_option_vec_and_box() {
        let codec: Arc<dyn IdCodec> = Arc::new(NoopCodec);
        let weak = Arc::downgrade(&codec);

        let mut values: Vec<Option<OpaqueId>> =
            vec![Some(OpaqueId::internal(1)), None, Some(OpaqueId::internal(2))];
        walk(&mut values, &weak);

        assert!(is_bound(values[0].as_ref().unwrap()).await);
        assert!(values[1].is_none());
        assert!(is_bound(values[2].as_ref().unwrap()).await);
    }

    #[tokio::test]
    async fn walk_does_not_cross_into_unexported_fields() {
        let codec: Arc<dyn IdCodec> = Arc::new(NoopCodec);
        let weak = Arc::downgrade(&codec);

        let mut outer = Outer {
            id: Box::new(OpaqueId::internal(1)),
            sub: Sub {
                id: OpaqueId::internal(2),
            },
        };
        walk(&mut outer, &weak);

        assert!(is_bound(&outer.id).await);
        assert!(!is_bound(&outer.sub.id).await);
    }
}
