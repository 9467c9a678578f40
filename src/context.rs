//! Per-connection session state (spec §3 "Connection context").
//!
//! Grounded on the fields threaded through `MySqlStream` in
//! `sqlx_core::mysql::connection::mod` (`capabilities`, `collation`),
//! generalized to the full set spec §3 names; mutated only at handshake
//! completion and by OK/EOF/session-track messages (spec §3 "Lifecycle").

use crate::capabilities::Capabilities;
use crate::options::ZeroDate;
use crate::status::ServerStatus;

/// Per-connection state shared by the framing, handshake, and statement
/// layers. Lives for exactly as long as the TCP/Unix connection does.
#[derive(Debug)]
pub(crate) struct ConnectionContext {
    pub(crate) connection_id: u32,
    pub(crate) server_version: ServerVersion,
    pub(crate) capabilities: Capabilities,
    pub(crate) status: ServerStatus,
    pub(crate) client_collation: u16,
    pub(crate) server_collation: u16,
    pub(crate) connection_time_zone: TimeZonePolicy,
    pub(crate) zero_date: ZeroDate,
    pub(crate) local_infile_root: Option<std::path::PathBuf>,
    pub(crate) local_infile_buffer_size: usize,
    pub(crate) preserve_instants: bool,
    pub(crate) tiny_int1_is_bit: bool,
    /// The plugin and nonce the last successful authentication used,
    /// retained so `COM_CHANGE_USER` (spec §10) has a first-round scramble
    /// to offer before the server issues a fresh `AuthSwitchRequest`.
    pub(crate) auth_plugin_name: String,
    pub(crate) auth_nonce: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ServerVersion {
    pub(crate) major: u16,
    pub(crate) minor: u16,
    pub(crate) patch: u16,
    pub(crate) is_mariadb: bool,
}

impl ServerVersion {
    /// Parses the handshake's human-readable version string, detecting the
    /// `-MariaDB-` marker MariaDB servers splice into it.
    pub(crate) fn parse(raw: &str) -> Self {
        let is_mariadb = raw.to_ascii_lowercase().contains("mariadb");

        let version_part = raw.split(['-', ' ']).next().unwrap_or(raw);
        let mut parts = version_part.split('.');
        let major = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let minor = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let patch = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);

        ServerVersion {
            major,
            minor,
            patch,
            is_mariadb,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) enum TimeZonePolicy {
    #[default]
    Local,
    Server,
    Named(&'static str),
}

impl ConnectionContext {
    pub(crate) fn apply_status(&mut self, status: ServerStatus) {
        // Spec §3 invariant: the most recent OK/EOF status strictly
        // overrides the previous value (no merging of bits across packets).
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_mariadb_marker() {
        let v = ServerVersion::parse("10.4.7-MariaDB-1:10.4.7+maria~bionic");
        assert!(v.is_mariadb);
        assert_eq!((v.major, v.minor, v.patch), (10, 4, 7));
    }

    #[test]
    fn parses_plain_mysql_version() {
        let v = ServerVersion::parse("8.0.18");
        assert!(!v.is_mariadb);
        assert_eq!((v.major, v.minor, v.patch), (8, 0, 18));
    }
}
