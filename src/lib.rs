//! A reactive, non-blocking MySQL/MariaDB wire-protocol client: framing,
//! the handshake/authentication state machine, statement execution (text,
//! client-prepared, and server-prepared with cursor fetch), and the value
//! codecs, behind one concrete [`MySqlConnection`].
//!
//! This crate deliberately has no generic `Database`/`Row`/`Arguments`/
//! `Executor`/`Pool` trait scaffolding — it is a single-database,
//! single-connection core; pooling and a database-agnostic facade are a
//! layer meant to be built on top of it, not inside it.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;

mod auth;
mod cache;
mod capabilities;
mod codec;
mod collation;
mod connection;
mod context;
mod exchange;
mod handshake;
mod io;
mod message;
mod net;
mod options;
mod query;
mod row;
mod statement;
mod status;
mod transport;
mod value;

pub use codec::MySqlValue;
pub use connection::{MySqlConnection, MySqlQueryResult, MySqlResponse};
pub use error::{ColumnIndex, Error, ErrorKind, MySqlDatabaseError, Result};
pub use options::{CompressionAlgorithmOption, MySqlConnectOptions, MySqlSslMode, ZeroDate};
pub use row::{MySqlColumn, MySqlRow};
pub use statement::MySqlArguments;
