//! `mysql_old_password`: the length-limited legacy hash (spec §4.4 built-in
//! plugin list "old-password (length-limited legacy)"). Present for
//! completeness against very old servers; this crate does not attempt to
//! negotiate protocol v9 (spec §9 open question 1), so this plugin is only
//! reachable via an explicit change-auth-plugin request from a modern
//! server configured to still offer it.

use crate::auth::AuthPlugin;
use crate::error::{protocol_err, Result};

pub(crate) struct OldPassword;

impl AuthPlugin for OldPassword {
    fn name(&self) -> &'static str {
        "mysql_old_password"
    }

    fn authenticate(&self, password: &str, nonce: &[u8]) -> Result<Vec<u8>> {
        if password.is_empty() {
            return Ok(Vec::new());
        }
        if !password.is_ascii() {
            return Err(protocol_err!(
                "mysql_old_password does not support non-ASCII passwords"
            ));
        }

        Ok(scramble323(password, nonce))
    }
}

/// The pre-4.1 `PASSWORD()` scramble: two 32-bit hashes mixed with the
/// nonce through a simple LCG-style generator.
fn scramble323(password: &str, nonce: &[u8]) -> Vec<u8> {
    let (hash_pass_1, hash_pass_2) = hash_password_323(password);
    let (hash_message_1, hash_message_2) = hash_password_323(
        &nonce
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect::<String>(),
    );

    let seed1 = hash_pass_1 ^ hash_message_1;
    let seed2 = hash_pass_2 ^ hash_message_2;

    let mut rng = Rng323::new(seed1, seed2);
    let nonce_len = nonce.iter().take_while(|&&b| b != 0).count();

    let mut out = Vec::with_capacity(nonce_len + 1);
    for _ in 0..nonce_len {
        out.push((rng.next() * 31.0) as u8 + b'A');
    }
    let extra = (rng.next() * 31.0) as u8;
    for b in out.iter_mut() {
        *b ^= extra;
    }
    out
}

fn hash_password_323(s: &str) -> (u32, u32) {
    let (mut nr, mut add, mut nr2) = (1345345333u32, 7u32, 0x12345671u32);

    for &byte in s.as_bytes() {
        if byte == b' ' || byte == b'\t' {
            continue;
        }
        let tmp = byte as u32;
        nr ^= (((nr & 63).wrapping_add(add)).wrapping_mul(tmp)).wrapping_add(nr << 8);
        nr2 = nr2.wrapping_add((nr2 << 8) ^ nr);
        add = add.wrapping_add(tmp);
    }

    (nr & 0x7FFF_FFFF, nr2 & 0x7FFF_FFFF)
}

struct Rng323 {
    seed1: u32,
    seed2: u32,
}

impl Rng323 {
    fn new(seed1: u32, seed2: u32) -> Self {
        Self { seed1, seed2 }
    }

    fn next(&mut self) -> f64 {
        self.seed1 = (self.seed1.wrapping_mul(3) + self.seed2) % 0x3FFF_FFFF;
        self.seed2 = (self.seed1 + self.seed2 + 33) % 0x3FFF_FFFF;
        self.seed1 as f64 / 0x3FFF_FFFF as f64
    }
}
