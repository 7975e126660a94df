//! Moniker name syntax.
//!
//! A full name is a sequence of segments, each introduced by a kind prefix:
//! - `IOR:0123abcd` → object reference
//! - `OAFIID:Demo_Viewer` (or `OAFAID:`) → activation by id
//! - `query:(repo_ids.has('IDL:Stream:1.0'))` → activation by query
//! - `new:` → object created by the parent's factory
//! - `cache:` → cached view of the parent's stream
//! - `!child` → item looked up in the parent container
//!
//! Segments are separated by `#`, except item segments whose leading `!`
//! doubles as the separator. A `\` escapes the next character, so `\!` and
//! `\#` are literal.

use crate::error::{MonikerError, MonikerResult};
use crate::moniker::MonikerKind;

/// Escape character.
pub const ESCAPE: char = '\\';

/// Prefix dispatch table, first match wins. The last field is how many
/// bytes of the matched prefix are stripped from the stored name.
const PREFIXES: &[(&str, MonikerKind, usize)] = &[
    ("!", MonikerKind::Item, 1),
    ("IOR:", MonikerKind::Ior, 4),
    ("OAFIID:", MonikerKind::Oaf, 7),
    ("OAFAID:", MonikerKind::Oaf, 7),
    ("cache:", MonikerKind::Cache, 6),
    ("new:", MonikerKind::New, 4),
    ("query:(", MonikerKind::Query, 6),
];

/// Prefix `\`, `!` and `#` with an escape.
pub fn escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, ESCAPE | '!' | '#') {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Drop escapes, keeping the escaped characters.
pub fn unescape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            match chars.next() {
                Some(escaped) => out.push(escaped),
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split off the rightmost segment.
///
/// Returns `(parent, segment)`. The parent is empty for a root segment. An
/// item segment keeps its leading `!`; a `#` separator is dropped.
pub(crate) fn split_rightmost(name: &str) -> (&str, &str) {
    let bytes = name.as_bytes();
    for i in (0..bytes.len()).rev() {
        let c = bytes[i];
        if c != b'!' && c != b'#' {
            continue;
        }

        let escapes = bytes[..i].iter().rev().take_while(|&&b| b == b'\\').count();
        if escapes % 2 == 1 {
            continue;
        }

        return if c == b'!' {
            (&name[..i], &name[i..])
        } else {
            (&name[..i], &name[i + 1..])
        };
    }
    ("", name)
}

/// Decode one segment into its kind and unescaped name.
pub(crate) fn parse_segment(segment: &str) -> MonikerResult<(MonikerKind, String)> {
    if segment.is_empty() {
        return Err(MonikerError::InvalidName {
            name: segment.to_string(),
            reason: "empty segment".to_string(),
        });
    }

    for &(prefix, kind, strip) in PREFIXES {
        let matched = segment
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matched {
            return Ok((kind, unescape(&segment[strip..])));
        }
    }

    Err(MonikerError::UnknownPrefix {
        name: segment.to_string(),
    })
}

/// Split a full name into segments, root first.
pub(crate) fn segments(name: &str) -> MonikerResult<Vec<&str>> {
    if name.is_empty() {
        return Err(MonikerError::InvalidName {
            name: String::new(),
            reason: "empty name".to_string(),
        });
    }

    let mut out = Vec::new();
    let mut rest = name;
    loop {
        let (parent, segment) = split_rightmost(rest);
        if segment.is_empty() {
            return Err(MonikerError::InvalidName {
                name: name.to_string(),
                reason: "empty segment".to_string(),
            });
        }
        out.push(segment);

        if parent.is_empty() {
            // `#cache:` has a separator but nothing to its left.
            if rest.len() != segment.len() && !segment.starts_with('!') {
                return Err(MonikerError::InvalidName {
                    name: name.to_string(),
                    reason: "separator without parent".to_string(),
                });
            }
            break;
        }
        rest = parent;
    }

    out.reverse();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_rightmost() {
        assert_eq!(split_rightmost("IOR:00#cache:"), ("IOR:00", "cache:"));
        assert_eq!(split_rightmost("IOR:00!item"), ("IOR:00", "!item"));
        assert_eq!(split_rightmost("OAFIID:x"), ("", "OAFIID:x"));
        assert_eq!(split_rightmost("!item"), ("", "!item"));
    }

    #[test]
    fn test_split_skips_escaped_separators() {
        assert_eq!(split_rightmost(r"IOR:00!a\!b"), ("IOR:00", r"!a\!b"));
        assert_eq!(split_rightmost(r"new:a\#b"), ("", r"new:a\#b"));
        // An escaped backslash does not escape the separator.
        assert_eq!(split_rightmost(r"IOR:0\\#new:"), (r"IOR:0\\", "new:"));
    }

    #[test]
    fn test_escape_roundtrip() {
        let raw = r"a!b#c\d";
        let escaped = escape(raw);
        assert_eq!(escaped, r"a\!b\#c\\d");
        assert_eq!(unescape(&escaped), raw);
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_parse_segment_prefixes() {
        assert_eq!(
            parse_segment("IOR:abc").unwrap(),
            (MonikerKind::Ior, "abc".to_string())
        );
        assert_eq!(
            parse_segment("oafaid:Demo").unwrap(),
            (MonikerKind::Oaf, "Demo".to_string())
        );
        assert_eq!(
            parse_segment("CACHE:").unwrap(),
            (MonikerKind::Cache, String::new())
        );
        assert_eq!(
            parse_segment("!child").unwrap(),
            (MonikerKind::Item, "child".to_string())
        );
        assert_eq!(
            parse_segment("query:(iid == 'x')").unwrap(),
            (MonikerKind::Query, "(iid == 'x')".to_string())
        );
    }

    #[test]
    fn test_parse_segment_errors() {
        assert!(matches!(
            parse_segment("file:/tmp/x"),
            Err(MonikerError::UnknownPrefix { .. })
        ));
        // A query must open its expression.
        assert!(matches!(
            parse_segment("query:iid"),
            Err(MonikerError::UnknownPrefix { .. })
        ));
        assert!(matches!(
            parse_segment(""),
            Err(MonikerError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_segments() {
        assert_eq!(
            segments("IOR:00#cache:!a").unwrap(),
            vec!["IOR:00", "cache:", "!a"]
        );
        assert!(matches!(segments(""), Err(MonikerError::InvalidName { .. })));
        assert!(matches!(
            segments("IOR:00#"),
            Err(MonikerError::InvalidName { .. })
        ));
        assert!(matches!(
            segments("#cache:"),
            Err(MonikerError::InvalidName { .. })
        ));
    }
}
