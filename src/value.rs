//! Decoded field values (spec §3 "Field value codec", "Row messages carry
//! `FieldValue`s").
//!
//! Grounded on `sqlx_core::mysql::protocol::row::Row`, which stores each
//! column as a byte range into one shared buffer; generalized here to admit
//! the multi-envelope/chunked case spec §3 and §4.7 require for fields that
//! exceed a single envelope (the teacher's `Row` always assumes one
//! fully-assembled buffer, since its `Packet` already joined envelopes
//! before `Row::decode` runs).

use bytes::Bytes;

/// Whether a row was decoded from the text or binary protocol
/// (spec §4.6 "text and server-prepared").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MySqlValueFormat {
    Text,
    Binary,
}

/// A single field's raw wire bytes, or `None` for SQL NULL.
///
/// `Chunked` exists for LOCAL INFILE-adjacent and otherwise oversized blobs
/// whose payload spanned more than one envelope; ordinary fields always
/// decode to `Inline`, since [`crate::io::framing::EnvelopeReader`] has
/// already reassembled the logical payload by the time a row is decoded.
#[derive(Debug, Clone)]
pub(crate) enum FieldValue {
    Inline(Bytes),
    Chunked(Vec<Bytes>),
}

impl FieldValue {
    pub(crate) fn as_bytes(&self) -> std::borrow::Cow<'_, [u8]> {
        match self {
            FieldValue::Inline(b) => std::borrow::Cow::Borrowed(&b[..]),
            FieldValue::Chunked(chunks) => {
                let mut out = Vec::with_capacity(chunks.iter().map(|c| c.len()).sum());
                for chunk in chunks {
                    out.extend_from_slice(chunk);
                }
                std::borrow::Cow::Owned(out)
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            FieldValue::Inline(b) => b.len(),
            FieldValue::Chunked(chunks) => chunks.iter().map(|c| c.len()).sum(),
        }
    }
}

/// A reference to a decoded field, as handed to a [`crate::codec`] on
/// decode. Owned by the row it came from (spec §3 invariant: "Any
/// `FieldValue` obtained from a row is owned by that row and released when
/// the row is released").
pub struct MySqlValueRef<'r> {
    pub(crate) value: Option<&'r FieldValue>,
    pub(crate) format: MySqlValueFormat,
    pub(crate) type_id: u8,
    pub(crate) is_unsigned: bool,
    pub(crate) collation: u16,
}

impl<'r> MySqlValueRef<'r> {
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    pub(crate) fn as_bytes(&self) -> Option<std::borrow::Cow<'r, [u8]>> {
        self.value.map(|v| v.as_bytes())
    }

    pub(crate) fn format(&self) -> MySqlValueFormat {
        self.format
    }

    pub(crate) fn type_id(&self) -> u8 {
        self.type_id
    }

    pub(crate) fn is_unsigned(&self) -> bool {
        self.is_unsigned
    }

    pub(crate) fn collation(&self) -> u16 {
        self.collation
    }
}
