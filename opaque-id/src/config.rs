//! Environment-driven configuration, in the shape of
//! `auth_service::config::load_auth_config`: read each variable once, fall
//! back to a sane default, never panic on a missing or malformed value.

use std::env;

use chrono::Duration;

const DEFAULT_REFRESH_INTERVAL_SECONDS: i64 = 5;
const DEFAULT_KEY_SET_TTL_SECONDS: i64 = 604_800;

/// Tunables for a [`crate::holder::Holder`].
#[derive(Debug, Clone)]
pub struct HolderConfig {
    /// How often the background refresh actor re-checks the chain.
    pub refresh_interval: Duration,
}

impl HolderConfig {
    pub fn from_env() -> Self {
        let refresh_interval = duration_seconds_from_env(
            "OPAQUE_ID_REFRESH_INTERVAL_SECONDS",
            DEFAULT_REFRESH_INTERVAL_SECONDS,
        );
        Self { refresh_interval }
    }
}

impl Default for HolderConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::seconds(DEFAULT_REFRESH_INTERVAL_SECONDS),
        }
    }
}

/// Lifetime granted to a freshly registered key set; read by key store
/// implementations that honour the ambient configuration (see
/// [`crate::key_store::MemoryKeyStore`]).
pub fn key_set_ttl_from_env() -> Duration {
    duration_seconds_from_env("OPAQUE_ID_KEY_TTL_SECONDS", DEFAULT_KEY_SET_TTL_SECONDS)
}

fn duration_seconds_from_env(key: &str, default_seconds: i64) -> Duration {
    let seconds = env::var(key)
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default_seconds);
    Duration::seconds(seconds)
}
