//! Prepared statements and parameter binding (spec §4.6, §4.8).
//!
//! Grounded on `sqlx_core::mysql::protocol::statement::StmtPrepareOk`'s
//! header layout for [`decode_prepare_header`], and on
//! `sqlx_core::mysql::arguments::MySqlArguments` for the public binding
//! surface — collapsed here onto one concrete [`crate::codec::MySqlValue`]
//! instead of the teacher's generic `Encode`-trait-object list, per this
//! crate's fixed-value-enum design (spec §1 non-goals).

use std::collections::HashMap;

use bytes::Buf;

use crate::codec::{self, MySqlValue};
use crate::error::{protocol_err, Result};
use crate::io::MySqlBufExt;
use crate::message::client::EncodedParam;
use crate::message::server::ColumnDefinition;
use crate::query::{Marker, ParsedQuery};

/// A statement prepared on the server (spec §4.6 "server-prepared"),
/// resident in the connection's [`crate::cache::PreparedStatementCache`]
/// until evicted or the connection closes.
#[derive(Debug)]
pub(crate) struct PreparedStatement {
    pub(crate) statement_id: u32,
    pub(crate) param_count: u16,
    /// Placeholder column definitions for each `?`; MySQL sends these with
    /// no useful type information (every param's `type_id` is the generic
    /// string type), so nothing here drives binding — it exists purely to
    /// account for the packets on the wire.
    pub(crate) params: Vec<ColumnDefinition>,
    pub(crate) columns: Vec<ColumnDefinition>,
}

/// The fixed-size header `COM_STMT_PREPARE`'s OK response leads with,
/// before the variable number of parameter/column definition packets (spec
/// §4.6 step 2). This never collides with a normal OK packet's shape even
/// though both start with a `0x00` status byte; callers that know they are
/// awaiting a prepare response must decode it with this function instead of
/// routing through [`crate::message::server::decode`].
pub(crate) struct PrepareOkHeader {
    pub(crate) statement_id: u32,
    pub(crate) num_columns: u16,
    pub(crate) num_params: u16,
    pub(crate) warning_count: u16,
}

pub(crate) fn decode_prepare_header(mut buf: &[u8]) -> Result<PrepareOkHeader> {
    let status = buf.try_get_u8()?;
    if status != 0x00 {
        return Err(protocol_err!(
            "expected COM_STMT_PREPARE OK header (0x00); received 0x{status:02X}"
        ));
    }
    let statement_id = buf.try_get_u32_le()?;
    let num_columns = buf.try_get_u16_le()?;
    let num_params = buf.try_get_u16_le()?;
    if buf.remaining() < 1 {
        return Err(protocol_err!("truncated COM_STMT_PREPARE OK header"));
    }
    buf.advance(1); // filler
    let warning_count = if buf.remaining() >= 2 { buf.try_get_u16_le()? } else { 0 };

    Ok(PrepareOkHeader {
        statement_id,
        num_columns,
        num_params,
        warning_count,
    })
}

/// The application-facing set of bound parameters for one statement
/// execution: a positional list consumed in marker order, plus a
/// name-indexed map for `:name`/`@name` markers (spec §3 glossary
/// "Binding").
#[derive(Debug, Default, Clone)]
pub struct MySqlArguments {
    positional: Vec<MySqlValue>,
    named: HashMap<Box<str>, MySqlValue>,
}

impl MySqlArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value, bound to the next `?` marker in source order.
    pub fn add(&mut self, value: MySqlValue) -> &mut Self {
        self.positional.push(value);
        self
    }

    /// Binds a value to a named marker (`:name` or `@name`); if the same
    /// name appears more than once in the statement, every occurrence
    /// resolves to this one value.
    pub fn bind(&mut self, name: &str, value: MySqlValue) -> &mut Self {
        self.named.insert(name.into(), value);
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// The fully-resolved, ordered set of parameter values for one execute
/// (spec §3 glossary "Binding": "consumed exactly once per execute").
pub(crate) struct Binding {
    values: Vec<MySqlValue>,
}

impl Binding {
    /// Matches `query`'s markers, in source order, against `args`,
    /// producing one value per marker. Fails if a positional marker has no
    /// corresponding value left, or a named marker has no binding at all.
    pub(crate) fn resolve(query: &ParsedQuery, args: &MySqlArguments) -> Result<Self> {
        let mut values = Vec::with_capacity(query.markers.len());
        let mut positional = args.positional.iter();

        for marker in &query.markers {
            let value = match marker {
                Marker::Positional => positional
                    .next()
                    .ok_or_else(|| protocol_err!("not enough parameters bound for this statement"))?
                    .clone(),
                Marker::Named(name) => args
                    .named
                    .get(name.as_ref())
                    .ok_or_else(|| protocol_err!("no value bound for named parameter `{name}`"))?
                    .clone(),
            };
            values.push(value);
        }

        if positional.next().is_some() {
            return Err(protocol_err!(
                "more parameters bound than this statement has markers"
            ));
        }

        Ok(Binding { values })
    }

    /// Renders the client-prepared (text protocol) SQL: `query`'s literals
    /// interleaved with each bound value's escaped textual form (spec §4.6
    /// "client-side text-escaping rules").
    pub(crate) fn render_text(&self, query: &ParsedQuery, no_backslash_escapes: bool) -> String {
        let mut out = String::new();
        for (i, literal) in query.literals.iter().enumerate() {
            out.push_str(literal);
            if let Some(value) = self.values.get(i) {
                codec::encode_param_text(value, no_backslash_escapes, &mut out);
            }
        }
        out
    }

    /// Encodes every bound value for `COM_STMT_EXECUTE` (spec §4.6 step 4).
    pub(crate) fn encode_binary(&self) -> Vec<EncodedParam> {
        self.values.iter().map(codec::encode_param_binary).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_prepare_header() {
        let mut buf = vec![0x00];
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes()); // columns
        buf.extend_from_slice(&1u16.to_le_bytes()); // params
        buf.push(0); // filler
        buf.extend_from_slice(&0u16.to_le_bytes()); // warnings

        let header = decode_prepare_header(&buf).unwrap();
        assert_eq!(header.statement_id, 7);
        assert_eq!(header.num_columns, 2);
        assert_eq!(header.num_params, 1);
    }

    #[test]
    fn resolves_positional_and_named_bindings() {
        let query = ParsedQuery::parse("INSERT INTO t (a, b) VALUES (?, :name)");
        let mut args = MySqlArguments::new();
        args.add(MySqlValue::Int(1));
        args.bind("name", MySqlValue::Text("hi".into()));

        let binding = Binding::resolve(&query, &args).unwrap();
        assert_eq!(binding.len(), 2);
        assert_eq!(binding.render_text(&query, false), "INSERT INTO t (a, b) VALUES (1, 'hi')");
    }

    #[test]
    fn missing_positional_parameter_errors() {
        let query = ParsedQuery::parse("SELECT ?");
        let args = MySqlArguments::new();
        assert!(Binding::resolve(&query, &args).is_err());
    }

    #[test]
    fn missing_named_parameter_errors() {
        let query = ParsedQuery::parse("SELECT :x");
        let args = MySqlArguments::new();
        assert!(Binding::resolve(&query, &args).is_err());
    }
}
