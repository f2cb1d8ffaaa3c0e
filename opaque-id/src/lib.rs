pub mod codec;
pub mod config;
pub mod error;
pub mod holder;
pub mod key_material;
pub mod key_set;
pub mod key_store;
pub mod opaque_id;
pub mod walker;

pub use config::HolderConfig;
pub use error::{CodecError, HolderError, KeyMaterialError, KeyStoreError, OpaqueIdError};
pub use holder::{Holder, IdCodec};
pub use key_set::{HeatedKeySet, KeySet};
pub use key_store::{KeyStore, MemoryKeyStore};
pub use opaque_id::OpaqueId;
pub use walker::{walk, InstallsCodec};
