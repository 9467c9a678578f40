//! `mysql_clear_password`: the password sent verbatim (spec §4.4 built-in
//! plugin list "clear-password"). Only ever used over an already-secure
//! channel; the handshake FSM refuses to select it otherwise.

use crate::auth::AuthPlugin;
use crate::error::Result;

pub(crate) struct ClearPassword;

impl AuthPlugin for ClearPassword {
    fn name(&self) -> &'static str {
        "mysql_clear_password"
    }

    fn is_ssl_required(&self) -> bool {
        true
    }

    fn authenticate(&self, password: &str, _nonce: &[u8]) -> Result<Vec<u8>> {
        let mut bytes = password.as_bytes().to_vec();
        bytes.push(0);
        Ok(bytes)
    }
}
