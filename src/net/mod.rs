//! Transport: the raw socket enum and the TLS upgrade step layered on it.

pub(crate) mod socket;
pub(crate) mod tls;

pub(crate) use socket::MaybeTlsStream;
