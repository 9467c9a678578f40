//! Authentication plugins (spec §4.4 "Auth plugin interface").
//!
//! Grounded on `sqlx_core::mysql::protocol::auth_plugin::AuthPlugin`'s
//! `scramble_sha1`/`scramble_sha256`, extended with the plugins the
//! retrieval snapshot left as `unimplemented!()`: `sha256_password`,
//! `clear_password`, and legacy `old_password`.

mod caching_sha2;
mod cleartext;
mod native;
mod old_password;
pub(crate) mod rsa_key_exchange;
mod sha256;

use crate::error::Result;

/// What a plugin wants the handshake FSM to do next, after it has produced
/// a response for the current round (spec §4.4 "chain stepping for
/// multi-round plugins").
pub(crate) enum NextAction {
    /// Authentication is complete from this plugin's point of view.
    Done,
    /// Send `cleartext_password` encrypted per the plugin's rules, which
    /// requires an encrypted channel (TLS, or RSA public-key encryption).
    SendFullAuth,
}

pub(crate) trait AuthPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this plugin refuses to run over a plaintext channel.
    fn is_ssl_required(&self) -> bool {
        false
    }

    /// Produces the first-round auth response from the password and the
    /// server-provided nonce ("salt").
    fn authenticate(&self, password: &str, nonce: &[u8]) -> Result<Vec<u8>>;
}

pub(crate) fn by_name(name: &str) -> Box<dyn AuthPlugin> {
    match name {
        "caching_sha2_password" => Box::new(caching_sha2::CachingSha2Password),
        "sha256_password" => Box::new(sha256::Sha256Password),
        "mysql_clear_password" => Box::new(cleartext::ClearPassword),
        "mysql_old_password" => Box::new(old_password::OldPassword),
        // `mysql_native_password`, and the fallback when the server omits
        // `PLUGIN_AUTH` entirely (spec §4.4 "no-auth when capability lacks
        // plugin-auth" is handled one layer up, by sending an empty response).
        _ => Box::new(native::NativePassword),
    }
}

pub(crate) use caching_sha2::{CACHING_SHA2_FAST_AUTH_SUCCESS, CACHING_SHA2_FULL_AUTH_REQUIRED};
