//! MySQL collation ids: enough of the `information_schema.collations` table
//! to pick a sane connection default and tell binary columns (`_bin`/
//! `binary`) apart from text ones without a round-trip to the server.
//!
//! Grounded on the `COLLATE_UTF8MB4_UNICODE_CI` constant in
//! `sqlx_core::mysql::connection::mod` and MySQL's well-known collation id
//! assignments (stable across server versions).

/// The collation this crate requests in the handshake response unless the
/// caller overrides it (spec §6 connect options do not name collation
/// explicitly, so we follow the teacher's choice).
pub const COLLATION_UTF8MB4_UNICODE_CI: u16 = 224;
pub const COLLATION_UTF8MB4_GENERAL_CI: u16 = 45;
pub const COLLATION_BINARY: u16 = 63;

/// Whether a column using this collation should be treated as an opaque
/// byte string rather than text (spec §3 "binary vs. text columns").
pub(crate) fn is_binary_collation(id: u16) -> bool {
    matches!(id, COLLATION_BINARY) || charset_name(id) == "binary"
}

/// Maps a subset of collation ids to their charset name, sufficient for the
/// decision in [`is_binary_collation`] and for diagnostics; this is not a
/// complete copy of `information_schema.collations`.
pub(crate) fn charset_name(id: u16) -> &'static str {
    match id {
        63 => "binary",
        45 | 46 => "utf8mb4",
        224 | 255 => "utf8mb4",
        33 | 83 => "utf8",
        8 | 3 => "latin1",
        _ => "utf8mb4",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_collation_is_flagged_binary() {
        assert!(is_binary_collation(COLLATION_BINARY));
        assert!(!is_binary_collation(COLLATION_UTF8MB4_UNICODE_CI));
    }
}
