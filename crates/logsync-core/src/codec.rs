//! Escaping codec for comma-delimited wire lines.
//!
//! Owner ids and property values are arbitrary strings, but event and
//! descriptor lines use `,` as the field separator and `\n` as the record
//! separator. Every such field passes through [`encode`] so that the
//! encoded form contains no `,`, `\n` or `\r`.
//!
//! | raw      | encoded |
//! |----------|---------|
//! | `$`      | `$$`    |
//! | `,`      | `$k`    |
//! | `\n`     | `$n`    |
//! | `\r`     | `$r`    |
//! | (absent) | `$e`    |

use crate::error::{CoreError, Result};

/// Escape character.
pub const ESCAPE: char = '$';

/// Encoded form of an absent value.
pub const NULL_MARKER: &str = "$e";

/// Encode an optional string. `None` becomes [`NULL_MARKER`].
pub fn encode(value: Option<&str>) -> String {
    match value {
        Some(s) => encode_str(s),
        None => NULL_MARKER.to_string(),
    }
}

/// Encode a present string.
pub fn encode_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '$' => out.push_str("$$"),
            ',' => out.push_str("$k"),
            '\n' => out.push_str("$n"),
            '\r' => out.push_str("$r"),
            other => out.push(other),
        }
    }
    out
}

/// Decode a field produced by [`encode`].
///
/// Returns `None` for the null marker. Fails on a trailing `$`, an unknown
/// escape letter, or a null marker embedded in a longer field.
pub fn decode(value: &str) -> Result<Option<String>> {
    if value == NULL_MARKER {
        return Ok(None);
    }

    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('$') => out.push('$'),
            Some('k') => out.push(','),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('e') => {
                return Err(CoreError::escape(
                    value,
                    "null marker must be the whole field",
                ))
            }
            Some(other) => {
                return Err(CoreError::escape(
                    value,
                    format!("unknown escape sequence ${}", other),
                ))
            }
            None => {
                return Err(CoreError::escape(
                    value,
                    "escape character at end of input",
                ))
            }
        }
    }
    Ok(Some(out))
}

/// Decode a field that must not be the null marker.
pub fn decode_required(value: &str) -> Result<String> {
    decode(value)?.ok_or_else(|| CoreError::escape(value, "unexpected null marker"))
}
