//! `mysql_native_password`: `SHA1(password) XOR SHA1(salt ‖ SHA1(SHA1(password)))`.
//!
//! Grounded on `scramble_sha1` in
//! `sqlx_core::mysql::protocol::auth_plugin`, ported from the `digest`
//! 0.8-era `input`/`result` API to `digest` 0.10's `update`/`finalize`.

use sha1::{Digest, Sha1};

use crate::auth::AuthPlugin;
use crate::error::Result;

pub(crate) struct NativePassword;

impl AuthPlugin for NativePassword {
    fn name(&self) -> &'static str {
        "mysql_native_password"
    }

    fn authenticate(&self, password: &str, nonce: &[u8]) -> Result<Vec<u8>> {
        // The nonce may be NUL-terminated; trim at the first NUL, matching
        // the teacher's `memchr` handling.
        let end = memchr::memchr(0, nonce).unwrap_or(nonce.len());
        let seed = &nonce[..end];

        if password.is_empty() {
            return Ok(Vec::new());
        }

        Ok(scramble(password, seed).to_vec())
    }
}

fn scramble(password: &str, seed: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    let pw_hash = hasher.finalize_reset();

    hasher.update(pw_hash);
    let pw_hash_hash = hasher.finalize_reset();

    hasher.update(seed);
    hasher.update(pw_hash_hash);
    let pw_seed_hash_hash = hasher.finalize();

    let mut out = [0u8; 20];
    for i in 0..20 {
        out[i] = pw_hash[i] ^ pw_seed_hash_hash[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_yields_empty_response() {
        let plugin = NativePassword;
        let response = plugin.authenticate("", b"12345678901234567890").unwrap();
        assert!(response.is_empty());
    }

    #[test]
    fn scramble_is_deterministic_for_fixed_inputs() {
        let seed = b"01234567890123456789";
        let a = scramble("hunter2", seed);
        let b = scramble("hunter2", seed);
        assert_eq!(a, b);
        assert_ne!(a, scramble("different", seed));
    }
}
