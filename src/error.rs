//! Error and Result types.
//!
//! Mirrors the shape of `sqlx_core::error::Error`: a small enum of
//! connection-fatal and statement-scoped failure modes, plus the server-error
//! taxonomy from the spec (`ErrorKind`).

use std::fmt;
use std::io;

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All the ways an operation against a MySQL/MariaDB connection can fail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level I/O failure. Always fatal to the connection.
    #[error("{0}")]
    Io(#[from] io::Error),

    /// A framing or decode invariant was violated (bad sequence number,
    /// malformed length, an unexpected packet in the current decode
    /// context). Always fatal to the connection (spec §4.1, §4.2).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A TLS handshake/upgrade failure.
    #[error("TLS error: {0}")]
    Tls(Box<dyn std::error::Error + Send + Sync>),

    /// The connection URL could not be parsed.
    #[error("error parsing connection url: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The server responded with an ERR packet.
    #[error(transparent)]
    Database(#[from] MySqlDatabaseError),

    /// A value could not be decoded from its wire representation into the
    /// requested application type.
    #[error("error decoding column {index}: {source}")]
    ColumnDecode {
        index: ColumnIndex,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A value could not be encoded into its wire representation.
    #[error("error encoding parameter: {0}")]
    Encode(Box<dyn std::error::Error + Send + Sync>),

    /// No codec in the registry was willing to decode/encode this type.
    #[error("unsupported conversion for MySQL type {mysql_type} to/from {rust_type}")]
    TypeNotFound {
        rust_type: &'static str,
        mysql_type: String,
    },

    /// A LOCAL INFILE path escaped the configured allowed root, or no root
    /// was configured at all.
    #[error("server requested LOCAL INFILE for a path outside the allowed root: {0}")]
    LocalInfilePermissionDenied(String),

    /// The connection was closed, either deliberately (`close()`) or as the
    /// fallout of a prior fatal error.
    #[error("connection closed: {0}")]
    ConnectionClosed(CloseReason),

    /// Column was not found by name in a row.
    #[error("no column found with name {0:?}")]
    ColumnNotFound(Box<str>),

    /// Column index was out of bounds.
    #[error("column index out of bounds: there are {len} columns but the index is {index}")]
    ColumnIndexOutOfBounds { index: usize, len: usize },

    /// Handshake requires protocol v9 (or some other unsupported legacy
    /// handshake), which this crate intentionally does not implement
    /// (spec §1 non-goals, §9 open question 1).
    #[error("unsupported legacy handshake protocol version {0}")]
    UnsupportedHandshakeVersion(u8),

    /// The per-connection response buffer exceeded its bound (spec §4.5
    /// "exceeding it triggers a fatal overflow error since the
    /// single-connection protocol cannot drop frames").
    #[error("response buffer overflow: exceeded capacity of {capacity} decoded rows")]
    ResponseBufferOverflow { capacity: usize },
}

#[derive(Debug, Clone, Copy)]
pub enum ColumnIndex {
    Ordinal(usize),
    Named(&'static str),
}

impl fmt::Display for ColumnIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnIndex::Ordinal(i) => write!(f, "{i}"),
            ColumnIndex::Named(n) => write!(f, "{n:?}"),
        }
    }
}

/// Why a connection was closed; threaded through every exchange failed at
/// shutdown so callers can distinguish a deliberate close from a surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The application called `MySqlConnection::close`.
    Expected,
    /// The transport or protocol layer failed and force-closed the connection.
    Unexpected,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Expected => f.write_str("closed by caller"),
            CloseReason::Unexpected => f.write_str("closed due to a fatal error"),
        }
    }
}

impl Error {
    pub(crate) fn protocol(args: fmt::Arguments<'_>) -> Error {
        Error::Protocol(args.to_string())
    }

    pub fn as_database_error(&self) -> Option<&MySqlDatabaseError> {
        match self {
            Error::Database(e) => Some(e),
            _ => None,
        }
    }
}

macro_rules! protocol_err {
    ($($args:tt)*) => {
        $crate::error::Error::protocol(format_args!($($args)*))
    };
}
pub(crate) use protocol_err;

/// The high-level classification of a server-reported error, derived from
/// the MySQL error code first and the SQL-state class second (spec §7, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PermissionDenied,
    BadGrammar,
    DataIntegrityViolation,
    Rollback,
    Timeout,
    TransientResource,
    NonTransientResource,
}

const PERMISSION_DENIED_CODES: &[u16] = &[1044, 1045, 1095, 1142, 1143, 1227, 1370, 1698, 1873];
const BAD_GRAMMAR_CODES: &[u16] = &[1050, 1051, 1054, 1064, 1146, 1247, 1304, 1305, 1630];
const DATA_INTEGRITY_CODES: &[u16] = &[
    1022, 1048, 1062, 1169, 1215, 1216, 1217, 1364, 1451, 1452, 1557, 1859,
];
const ROLLBACK_CODES: &[u16] = &[1613];
const TIMEOUT_CODES: &[u16] = &[1205, 1907, 3024, 1969, 1968];
const TRANSIENT_CODES: &[u16] = &[1159, 1161, 1213, 1317];

fn classify(code: u16, sql_state: Option<&str>) -> ErrorKind {
    if PERMISSION_DENIED_CODES.contains(&code) {
        return ErrorKind::PermissionDenied;
    }
    if BAD_GRAMMAR_CODES.contains(&code) {
        return ErrorKind::BadGrammar;
    }
    if DATA_INTEGRITY_CODES.contains(&code) {
        return ErrorKind::DataIntegrityViolation;
    }
    if ROLLBACK_CODES.contains(&code) {
        return ErrorKind::Rollback;
    }
    if TIMEOUT_CODES.contains(&code) {
        return ErrorKind::Timeout;
    }
    if TRANSIENT_CODES.contains(&code) {
        return ErrorKind::TransientResource;
    }

    match sql_state.map(|s| &s[..2.min(s.len())]) {
        Some("42") => ErrorKind::BadGrammar,
        Some("23") => ErrorKind::DataIntegrityViolation,
        Some("40") => ErrorKind::Rollback,
        _ => ErrorKind::NonTransientResource,
    }
}

/// An error returned by the server (an ERR packet), with the SQL that
/// provoked it attached at the statement-execution boundary (spec §4.9).
#[derive(Debug, Clone)]
pub struct MySqlDatabaseError {
    pub(crate) code: u16,
    pub(crate) sql_state: Option<[u8; 5]>,
    pub(crate) message: String,
    pub(crate) statement_sql: Option<String>,
}

impl MySqlDatabaseError {
    pub(crate) fn new(code: u16, sql_state: Option<[u8; 5]>, message: String) -> Self {
        Self {
            code,
            sql_state,
            message,
            statement_sql: None,
        }
    }

    pub(crate) fn with_statement(mut self, sql: &str) -> Self {
        self.statement_sql = Some(sql.to_owned());
        self
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn sql_state(&self) -> Option<&str> {
        self.sql_state
            .as_ref()
            .map(|s| std::str::from_utf8(s).unwrap_or("?????"))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn statement(&self) -> Option<&str> {
        self.statement_sql.as_deref()
    }

    pub fn kind(&self) -> ErrorKind {
        classify(self.code, self.sql_state())
    }
}

impl fmt::Display for MySqlDatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {}", self.message, self.code)?;
        if let Some(state) = self.sql_state() {
            write!(f, ", sqlstate {state}")?;
        }
        write!(f, ")")?;
        if let Some(sql) = &self.statement_sql {
            write!(f, " while executing `{sql}`")?;
        }
        Ok(())
    }
}

impl std::error::Error for MySqlDatabaseError {}
