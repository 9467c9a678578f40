//! `caching_sha2_password` (spec §4.4 "SHA-256 based fast path + full path").
//!
//! The fast-path hash construction is grounded on `scramble_sha256` in
//! `sqlx_core::mysql::protocol::auth_plugin`; the full-auth path (RSA-OAEP
//! over plaintext, or bare cleartext over TLS) is handled one layer up in
//! `handshake.rs`/[`crate::auth::rsa_key_exchange`].

use sha2::{Digest, Sha256};

use crate::auth::AuthPlugin;
use crate::error::Result;

/// The single byte the server sends back after the fast-path hash,
/// indicating the fast path succeeded (spec §4.4 "fast-success (continue)").
pub(crate) const CACHING_SHA2_FAST_AUTH_SUCCESS: u8 = 0x03;
/// ...or that a full authentication round is required (spec §4.4
/// "needs-full-auth").
pub(crate) const CACHING_SHA2_FULL_AUTH_REQUIRED: u8 = 0x04;

pub(crate) struct CachingSha2Password;

impl AuthPlugin for CachingSha2Password {
    fn name(&self) -> &'static str {
        "caching_sha2_password"
    }

    fn authenticate(&self, password: &str, nonce: &[u8]) -> Result<Vec<u8>> {
        if password.is_empty() {
            return Ok(Vec::new());
        }
        Ok(scramble(password, nonce).to_vec())
    }
}

fn scramble(password: &str, seed: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    let pw_hash = hasher.finalize_reset();

    hasher.update(pw_hash);
    let pw_hash_hash = hasher.finalize_reset();

    hasher.update(seed);
    hasher.update(pw_hash_hash);
    let pw_seed_hash_hash = hasher.finalize();

    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = pw_hash[i] ^ pw_seed_hash_hash[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scramble_is_deterministic() {
        let seed = b"01234567890123456789";
        assert_eq!(scramble("hunter2", seed), scramble("hunter2", seed));
    }
}
