//! RSA-OAEP full-authentication fallback for `caching_sha2_password` and
//! `sha256_password` over an insecure channel (spec §4.4 "RSA-OAEP-encrypted
//! over insecure"). No teacher file covers this: the retrieval snapshot's
//! `sqlx_core::mysql::protocol::auth_plugin` left the public-key round-trip
//! unimplemented, so this is built directly from spec §4.4's transition list
//! and the MySQL public-key-retrieval byte MySQL's own C client uses.

use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha1::Sha1;

use crate::error::{protocol_err, Result};

/// The single byte that asks the server for its RSA public key when the
/// client doesn't already have a cached one (spec §4.4 "needs-full-auth").
pub(crate) const PUBLIC_KEY_REQUEST: u8 = 0x02;

/// XORs `password` (NUL-terminated) against the auth nonce, then
/// RSA-OAEP-encrypts it with the server's PEM-encoded public key.
pub(crate) fn encrypt_password(password: &str, nonce: &[u8], public_key_pem: &str) -> Result<Vec<u8>> {
    let xored = xor_with_nonce(password, nonce);
    let key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| protocol_err!("invalid RSA public key from server: {e}"))?;
    let mut rng = rand::thread_rng();
    key.encrypt(&mut rng, Oaep::new::<Sha1>(), &xored)
        .map_err(|e| protocol_err!("RSA-OAEP encryption of the password failed: {e}"))
}

fn xor_with_nonce(password: &str, nonce: &[u8]) -> Vec<u8> {
    let mut bytes: Vec<u8> = password.bytes().chain(std::iter::once(0)).collect();
    for (i, b) in bytes.iter_mut().enumerate() {
        *b ^= nonce[i % nonce.len()];
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_with_nonce_is_deterministic() {
        let nonce = b"01234567890123456789";
        assert_eq!(xor_with_nonce("hunter2", nonce), xor_with_nonce("hunter2", nonce));
    }

    #[test]
    fn xor_with_nonce_appends_a_terminating_nul() {
        let nonce = b"01234567890123456789";
        let xored = xor_with_nonce("hi", nonce);
        assert_eq!(xored.len(), 3);
    }

    #[test]
    fn rejects_malformed_public_key() {
        let err = encrypt_password("hunter2", b"0123456789012345678", "not a pem key");
        assert!(err.is_err());
    }
}
