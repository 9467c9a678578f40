//! Byte-level plumbing shared by every layer above it: length-encoded
//! integer/string helpers (`buf_ext`), the envelope framing codec
//! (`framing`), and the optional compression wrapper (`compression`).

mod buf_ext;
mod buf_mut_ext;
pub(crate) mod compression;
pub(crate) mod framing;

pub(crate) use buf_ext::MySqlBufExt;
pub(crate) use buf_mut_ext::MySqlBufMutExt;
