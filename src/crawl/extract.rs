//! Pull `var = JSON.parse('...')` payloads out of raw page HTML.
//!
//! Understat ships its data as hex-escaped string literals, e.g.
//! `var teamsData = JSON.parse('\x7B\x2289\x22...')`. The escapes encode
//! UTF-8 bytes, so decoding works on a byte buffer rather than on chars.

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};

/// Find and decode the JSON assigned to `var`.
///
/// `Ok(None)` means the page has no such assignment; a present but
/// undecodable payload is a parse error.
pub fn extract_js_var(html: &str, var: &str) -> Result<Option<Value>> {
    let pattern = format!(
        r"(?s){}\s*=\s*JSON\.parse\(\s*'(.*?)'\s*\)",
        regex::escape(var)
    );
    let re = Regex::new(&pattern).map_err(|e| Error::Parse(format!("bad pattern for {var}: {e}")))?;

    let Some(caps) = re.captures(html) else {
        return Ok(None);
    };
    let payload = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    let decoded = decode_escapes(payload)?;
    let value = serde_json::from_str(&decoded)
        .map_err(|e| Error::Parse(format!("{var} payload is not valid JSON: {e}")))?;
    Ok(Some(value))
}

/// Resolve backslash escapes in a JavaScript string literal body.
///
/// `\xNN` is a raw byte, `\uNNNN` a code point (surrogate pairs joined).
/// Unknown escapes are kept verbatim.
pub fn decode_escapes(raw: &str) -> Result<String> {
    let mut out: Vec<u8> = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            push_char(&mut out, c);
            continue;
        }
        let Some(esc) = chars.next() else {
            out.push(b'\\');
            break;
        };
        match esc {
            'x' => {
                let byte = take_hex(&mut chars, 2)?;
                out.push(byte as u8);
            }
            'u' => {
                let unit = take_hex(&mut chars, 4)?;
                let ch = if (0xD800..0xDC00).contains(&unit) {
                    let low = take_low_surrogate(&mut chars)?;
                    let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                    char::from_u32(combined)
                } else {
                    char::from_u32(unit)
                };
                let ch = ch.ok_or_else(|| Error::Parse(format!("invalid code point \\u{unit:04x}")))?;
                push_char(&mut out, ch);
            }
            'n' => out.push(b'\n'),
            't' => out.push(b'\t'),
            'r' => out.push(b'\r'),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            '0' => out.push(0),
            '\\' | '\'' | '"' | '/' => push_char(&mut out, esc),
            other => {
                out.push(b'\\');
                push_char(&mut out, other);
            }
        }
    }

    String::from_utf8(out).map_err(|e| Error::Parse(format!("payload is not UTF-8: {e}")))
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

fn take_hex<I>(chars: &mut std::iter::Peekable<I>, digits: usize) -> Result<u32>
where
    I: Iterator<Item = char>,
{
    let mut value = 0u32;
    for _ in 0..digits {
        let d = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or_else(|| Error::Parse(format!("truncated {digits}-digit hex escape")))?;
        value = value * 16 + d;
    }
    Ok(value)
}

fn take_low_surrogate<I>(chars: &mut std::iter::Peekable<I>) -> Result<u32>
where
    I: Iterator<Item = char>,
{
    if chars.next() != Some('\\') || chars.next() != Some('u') {
        return Err(Error::Parse("unpaired high surrogate".to_string()));
    }
    let low = take_hex(chars, 4)?;
    if !(0xDC00..0xE000).contains(&low) {
        return Err(Error::Parse(format!("invalid low surrogate \\u{low:04x}")));
    }
    Ok(low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_decode_hex_escapes() {
        let raw = r"\x7B\x22a\x22\x3A1\x7D";
        assert_eq!(decode_escapes(raw).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_decode_utf8_bytes() {
        // "é" as two escaped UTF-8 bytes
        assert_eq!(decode_escapes(r"Pe\xC3\xA9").unwrap(), "Peé");
    }

    #[test]
    fn test_decode_unicode_escapes() {
        assert_eq!(decode_escapes(r"\u00e9").unwrap(), "\u{e9}");
        assert_eq!(decode_escapes(r"\ud83d\ude00").unwrap(), "\u{1f600}");
    }

    #[test]
    fn test_decode_keeps_plain_and_unknown() {
        assert_eq!(decode_escapes(r"N\x27Golo \q").unwrap(), r"N'Golo \q");
    }

    #[test]
    fn test_decode_truncated_hex_fails() {
        assert_eq!(decode_escapes(r"\x7").unwrap_err().kind(), ErrorKind::ParseFailure);
    }

    #[test]
    fn test_extract_var() {
        let html = r#"<script>
            var datesData = JSON.parse('\x5B\x7B\x22id\x22\x3A\x2214086\x22\x7D\x5D');
            var teamsData = JSON.parse('\x7B\x7D');
        </script>"#;
        assert_eq!(extract_js_var(html, "datesData").unwrap(), Some(json!([{"id": "14086"}])));
        assert_eq!(extract_js_var(html, "teamsData").unwrap(), Some(json!({})));
    }

    #[test]
    fn test_extract_missing_var_is_none() {
        assert_eq!(extract_js_var("<html></html>", "playersData").unwrap(), None);
    }

    #[test]
    fn test_extract_bad_json_is_parse_error() {
        let html = "var playersData = JSON.parse('\\x7Bnope');";
        assert_eq!(
            extract_js_var(html, "playersData").unwrap_err().kind(),
            ErrorKind::ParseFailure
        );
    }
}
