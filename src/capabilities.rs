//! The client/server capability negotiation bitfield (spec §4.4 "intersect
//! server capability with client-desired capability").
//!
//! Grounded on `sqlx_core::mysql::protocol::Capabilities`, re-expressed at
//! the standard MySQL capability-flag bit positions (the retrieval pack's
//! own `capabilities.rs` was not present in the snapshot; these bit values
//! are the protocol's well-known constants, consistent across server
//! implementations).

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct Capabilities: u64 {
        const LONG_PASSWORD                  = 0x0000_0001;
        const FOUND_ROWS                     = 0x0000_0002;
        const LONG_FLAG                      = 0x0000_0004;
        const CONNECT_WITH_DB                = 0x0000_0008;
        const NO_SCHEMA                       = 0x0000_0010;
        const COMPRESS                        = 0x0000_0020;
        const ODBC                            = 0x0000_0040;
        const LOCAL_FILES                     = 0x0000_0080;
        const IGNORE_SPACE                    = 0x0000_0100;
        const PROTOCOL_41                     = 0x0000_0200;
        const INTERACTIVE                     = 0x0000_0400;
        const SSL                             = 0x0000_0800;
        const IGNORE_SIGPIPE                  = 0x0000_1000;
        const TRANSACTIONS                    = 0x0000_2000;
        const RESERVED                        = 0x0000_4000;
        const SECURE_CONNECTION                = 0x0000_8000;
        const MULTI_STATEMENTS                = 0x0001_0000;
        const MULTI_RESULTS                   = 0x0002_0000;
        const PS_MULTI_RESULTS                = 0x0004_0000;
        const PLUGIN_AUTH                     = 0x0008_0000;
        const CONNECT_ATTRS                   = 0x0010_0000;
        const PLUGIN_AUTH_LENENC_CLIENT_DATA   = 0x0020_0000;
        const CAN_HANDLE_EXPIRED_PASSWORDS      = 0x0040_0000;
        const SESSION_TRACK                   = 0x0080_0000;
        const DEPRECATE_EOF                   = 0x0100_0000;
        const OPTIONAL_RESULTSET_METADATA       = 0x0200_0000;
        const ZSTD_COMPRESSION_ALGORITHM        = 0x0400_0000;
        const CLIENT_QUERY_ATTRIBUTES           = 0x0800_0000;
        const MULTI_FACTOR_AUTHENTICATION       = 0x1000_0000;
        const CAPABILITY_EXTENSION             = 0x2000_0000;
        const SSL_VERIFY_SERVER_CERT            = 0x4000_0000;
        const REMEMBER_OPTIONS                  = 0x8000_0000;
        /// MariaDB-specific extended capability bits live in a second
        /// 32-bit field gated by this bit on the MySQL side; we fold it
        /// into the same 64-bit value, matching `sqlx-core`'s treatment of
        /// `CLIENT_MYSQL` as bit 32 of an extended capability set below.
        const MARIADB_CLIENT_EXTENDED_TYPE_INFO = 0x0001_0000_0000;
        const MARIADB_CLIENT_CACHE_METADATA      = 0x0002_0000_0000;
    }
}

impl Capabilities {
    /// The full set this crate is able to participate in, before
    /// intersecting with what the server advertises.
    pub(crate) fn client_default() -> Self {
        Capabilities::LONG_PASSWORD
            | Capabilities::FOUND_ROWS
            | Capabilities::LONG_FLAG
            | Capabilities::NO_SCHEMA
            | Capabilities::ODBC
            | Capabilities::LOCAL_FILES
            | Capabilities::PROTOCOL_41
            | Capabilities::INTERACTIVE
            | Capabilities::IGNORE_SIGPIPE
            | Capabilities::TRANSACTIONS
            | Capabilities::SECURE_CONNECTION
            | Capabilities::MULTI_STATEMENTS
            | Capabilities::MULTI_RESULTS
            | Capabilities::PS_MULTI_RESULTS
            | Capabilities::PLUGIN_AUTH
            | Capabilities::CONNECT_ATTRS
            | Capabilities::PLUGIN_AUTH_LENENC_CLIENT_DATA
            | Capabilities::CAN_HANDLE_EXPIRED_PASSWORDS
            | Capabilities::SESSION_TRACK
            | Capabilities::DEPRECATE_EOF
            | Capabilities::ZSTD_COMPRESSION_ALGORITHM
    }
}
