//! `sha256_password` (spec §4.4 "similar with public-key exchange").
//!
//! Unlike `caching_sha2_password`, this plugin has no fast path: it always
//! requires either a TLS channel (cleartext over it) or an RSA public-key
//! round-trip. No teacher file covered this plugin (the retrieval snapshot
//! recognizes the name but leaves it `unimplemented!()`); built from
//! spec §4.4 directly, reusing [`crate::auth::rsa_key_exchange`] for the
//! RSA-OAEP round-trip.

use crate::auth::AuthPlugin;
use crate::error::Result;

pub(crate) struct Sha256Password;

impl AuthPlugin for Sha256Password {
    fn name(&self) -> &'static str {
        "sha256_password"
    }

    fn is_ssl_required(&self) -> bool {
        // Not strictly required (the RSA path is available), but this
        // crate prefers the cleartext-over-TLS path whenever a secure
        // channel is already established; the handshake FSM checks the
        // active transport itself and only falls back to RSA otherwise.
        false
    }

    /// `sha256_password` never answers in the first round with a hash; the
    /// handshake FSM always follows up with AUTH_MORE_DATA-driven cleartext
    /// or RSA-encrypted password, so the initial response is empty unless
    /// the password itself is empty (which also yields an empty response).
    fn authenticate(&self, _password: &str, _nonce: &[u8]) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}
