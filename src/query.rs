//! SQL tokenization and client-side text-escaping (spec §4.6, §4.7).
//!
//! No teacher file survives retrieval filtering for the parser itself
//! (sqlx's query-macro parsing lives in the `sqlx-macros` crate, outside the
//! pack); the tokenizer here is built directly from spec §4.6's "literal
//! parts + ordered `?`/named markers" description, in the teacher's general
//! house style (plain iterator-driven scanning via `memchr`, no parser
//! combinator crate).

use memchr::memchr;

/// A SQL string split into the literal text between parameter markers and
/// the markers themselves, in source order.
#[derive(Debug, Clone)]
pub(crate) struct ParsedQuery {
    /// `literals.len() == markers.len() + 1`: the literal text before the
    /// first marker, between each pair, and after the last one.
    pub(crate) literals: Vec<Box<str>>,
    pub(crate) markers: Vec<Marker>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Marker {
    /// `?`, bound by position.
    Positional,
    /// `:name` or `@name`, bound by name; multiple markers may share a name,
    /// all resolving to the same bound value.
    Named(Box<str>),
}

impl ParsedQuery {
    pub(crate) fn parse(sql: &str) -> Self {
        let bytes = sql.as_bytes();
        let mut literals = Vec::new();
        let mut markers = Vec::new();

        let mut literal_start = 0usize;
        let mut i = 0usize;
        let mut in_single_quote = false;
        let mut in_double_quote = false;
        let mut in_backtick = false;
        let mut in_line_comment = false;
        let mut in_block_comment = false;

        while i < bytes.len() {
            let b = bytes[i];

            if in_line_comment {
                if b == b'\n' {
                    in_line_comment = false;
                }
                i += 1;
                continue;
            }
            if in_block_comment {
                if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    in_block_comment = false;
                    i += 2;
                    continue;
                }
                i += 1;
                continue;
            }

            if in_single_quote {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == b'\'' {
                    in_single_quote = false;
                }
                i += 1;
                continue;
            }
            if in_double_quote {
                if b == b'\\' {
                    i += 2;
                    continue;
                }
                if b == b'"' {
                    in_double_quote = false;
                }
                i += 1;
                continue;
            }
            if in_backtick {
                if b == b'`' {
                    in_backtick = false;
                }
                i += 1;
                continue;
            }

            match b {
                b'\'' => {
                    in_single_quote = true;
                    i += 1;
                }
                b'"' => {
                    in_double_quote = true;
                    i += 1;
                }
                b'`' => {
                    in_backtick = true;
                    i += 1;
                }
                b'-' if bytes.get(i + 1) == Some(&b'-') => {
                    in_line_comment = true;
                    i += 2;
                }
                b'#' => {
                    in_line_comment = true;
                    i += 1;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    in_block_comment = true;
                    i += 2;
                }
                b'?' => {
                    literals.push(sql[literal_start..i].into());
                    markers.push(Marker::Positional);
                    i += 1;
                    literal_start = i;
                }
                b':' | b'@' if is_name_start(bytes.get(i + 1).copied()) => {
                    let name_start = i + 1;
                    let mut j = name_start;
                    while j < bytes.len() && is_name_byte(bytes[j]) {
                        j += 1;
                    }
                    literals.push(sql[literal_start..i].into());
                    markers.push(Marker::Named(sql[name_start..j].into()));
                    i = j;
                    literal_start = i;
                }
                _ => {
                    i += 1;
                }
            }
        }

        literals.push(sql[literal_start..].into());

        ParsedQuery { literals, markers }
    }

    pub(crate) fn marker_count(&self) -> usize {
        self.markers.len()
    }
}

fn is_name_start(b: Option<u8>) -> bool {
    matches!(b, Some(b) if b.is_ascii_alphabetic() || b == b'_')
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Escapes a textual parameter value for inlining into a client-prepared
/// (text) statement (spec §4.6 "client-side text-escaping rules", §4.7).
/// Wraps the result in single quotes. When `no_backslash_escapes` is set
/// (the session's `NO_BACKSLASH_ESCAPES` status flag, spec §4.7), backslash
/// stops being special and only the quote itself needs handling, done by
/// doubling it rather than backslash-escaping it.
pub(crate) fn escape_string(value: &str, no_backslash_escapes: bool, out: &mut String) {
    out.push('\'');
    let bytes = value.as_bytes();
    let mut start = 0;

    if no_backslash_escapes {
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\'' {
                out.push_str(&value[start..i]);
                out.push_str("''");
                start = i + 1;
            }
        }
        out.push_str(&value[start..]);
        out.push('\'');
        return;
    }

    let mut i = 0;
    while i < bytes.len() {
        let escaped = match bytes[i] {
            b'\0' => Some("\\0"),
            b'\n' => Some("\\n"),
            b'\r' => Some("\\r"),
            b'\\' => Some("\\\\"),
            b'\'' => Some("\\'"),
            b'"' => Some("\\\""),
            0x1A => Some("\\Z"),
            _ => None,
        };
        if let Some(rep) = escaped {
            out.push_str(&value[start..i]);
            out.push_str(rep);
            i += 1;
            start = i;
        } else {
            i += 1;
        }
    }
    out.push_str(&value[start..]);
    out.push('\'');
}

/// Escapes a byte-string parameter the same way, for binary blobs inlined
/// as a hex literal rather than a quoted string — avoids any question of
/// what "no-backslash-escapes" mode (spec §3 `NO_BACKSLASH_ESCAPES`) does to
/// non-UTF8 bytes.
pub(crate) fn escape_bytes(value: &[u8], out: &mut String) {
    out.push_str("X'");
    for byte in value {
        out.push_str(&format!("{byte:02X}"));
    }
    out.push('\'');
}

/// Returns the byte offset of the next unescaped `term` in `buf`, used by
/// the LOCAL INFILE path-allowlist check (spec §4.6) to strip a
/// surrounding quote pair before canonicalizing.
pub(crate) fn strip_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'\'' || first == b'"') && first == last {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_positional_markers() {
        let parsed = ParsedQuery::parse("SELECT * FROM t WHERE a = ? AND b = ?");
        assert_eq!(parsed.marker_count(), 2);
        assert_eq!(parsed.markers, vec![Marker::Positional, Marker::Positional]);
        assert_eq!(parsed.literals.len(), 3);
    }

    #[test]
    fn tokenizes_named_markers() {
        let parsed = ParsedQuery::parse("SELECT * FROM t WHERE a = :foo AND b = :foo");
        assert_eq!(
            parsed.markers,
            vec![
                Marker::Named("foo".into()),
                Marker::Named("foo".into())
            ]
        );
    }

    #[test]
    fn ignores_markers_inside_string_literals() {
        let parsed = ParsedQuery::parse("SELECT '?' , a FROM t WHERE b = ?");
        assert_eq!(parsed.marker_count(), 1);
    }

    #[test]
    fn ignores_markers_inside_comments() {
        let parsed = ParsedQuery::parse("SELECT a FROM t -- what about ?\nWHERE b = ?");
        assert_eq!(parsed.marker_count(), 1);
    }

    #[test]
    fn escapes_control_characters() {
        let mut out = String::new();
        escape_string("a'b\\c\nd", false, &mut out);
        assert_eq!(out, "'a\\'b\\\\c\\nd'");
    }

    #[test]
    fn doubles_quotes_under_no_backslash_escapes() {
        let mut out = String::new();
        escape_string("a'b\\c", true, &mut out);
        assert_eq!(out, "'a''b\\c'");
    }

    #[test]
    fn strips_matching_quotes() {
        assert_eq!(strip_quotes("'/data/x.csv'"), "/data/x.csv");
        assert_eq!(strip_quotes("/data/x.csv"), "/data/x.csv");
    }

    /// Reduces a backslash-escaped, single-quoted literal the way MySQL's
    /// string-literal grammar would, so the escape round-trip property can
    /// check `escape_string` against something other than itself.
    fn reduce_literal(literal: &str) -> String {
        let inner = &literal[1..literal.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('0') => out.push('\0'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some('\'') => out.push('\''),
                Some('"') => out.push('"'),
                Some('Z') => out.push('\u{1A}'),
                Some(other) => out.push(other),
                None => {}
            }
        }
        out
    }

    /// Reduces a doubled-quote, single-quoted literal the way MySQL's
    /// grammar would under `NO_BACKSLASH_ESCAPES`.
    fn reduce_doubled_quote_literal(literal: &str) -> String {
        literal[1..literal.len() - 1].replace("''", "'")
    }

    proptest::proptest! {
        #[test]
        fn escape_round_trips_arbitrary_strings(s in ".*") {
            let mut out = String::new();
            escape_string(&s, false, &mut out);
            proptest::prop_assert_eq!(reduce_literal(&out), s);
        }

        #[test]
        fn escape_round_trips_arbitrary_strings_under_no_backslash_escapes(s in ".*") {
            let mut out = String::new();
            escape_string(&s, true, &mut out);
            proptest::prop_assert_eq!(reduce_doubled_quote_literal(&out), s);
        }
    }
}
