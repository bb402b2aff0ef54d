//! Go string and rune literal quoting

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("invalid syntax")]
    Syntax,
}

/// Quote `s` as a Go interpreted string literal.
pub fn quote(s: &str) -> String {
    quote_bytes(s.as_bytes())
}

/// Quote raw bytes as a Go interpreted string literal; invalid UTF-8 bytes
/// are written as `\x` escapes.
pub fn quote_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            push_escaped(&mut out, c, '"');
        }
        for b in chunk.invalid() {
            out.push_str(&format!("\\x{:02x}", b));
        }
    }
    out.push('"');
    out
}

fn push_escaped(out: &mut String, c: char, quote: char) {
    if c == quote || c == '\\' {
        out.push('\\');
        out.push(c);
        return;
    }
    if is_print(c) {
        out.push(c);
        return;
    }
    match c {
        '\u{7}' => out.push_str("\\a"),
        '\u{8}' => out.push_str("\\b"),
        '\u{c}' => out.push_str("\\f"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\u{b}' => out.push_str("\\v"),
        c if (c as u32) < 0x20 || c == '\u{7f}' => out.push_str(&format!("\\x{:02x}", c as u32)),
        c if (c as u32) < 0x10000 => out.push_str(&format!("\\u{:04x}", c as u32)),
        c => out.push_str(&format!("\\U{:08x}", c as u32)),
    }
}

/// Printable in the sense Go quoting uses: graphic characters and the ASCII
/// space, excluding other separators, format characters and private use.
///
/// Unassigned code points count as printable here, while Go escapes them,
/// so quoting differs from Go only for runes no Unicode version assigns.
pub fn is_print(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    if c.is_control() || c.is_whitespace() {
        return false;
    }
    !matches!(c as u32,
        0x00AD
        | 0x061C
        | 0x180E
        | 0x200B..=0x200F
        | 0x202A..=0x202E
        | 0x2060..=0x206F
        | 0xE000..=0xF8FF
        | 0xFEFF
        | 0xFFF9..=0xFFFB
        | 0xFFFE..=0xFFFF
        | 0xF0000..=0x10FFFF)
}

/// One decoded element of a quoted literal.
enum Unit {
    Char(char),
    Byte(u8),
}

/// Decode the next character or escape sequence of a literal body.
fn next_unit(s: &str, quote: char) -> Result<(Unit, &str), QuoteError> {
    let mut chars = s.chars();
    let c = chars.next().ok_or(QuoteError::Syntax)?;
    if c == quote && (quote == '\'' || quote == '"') {
        return Err(QuoteError::Syntax);
    }
    if c != '\\' {
        return Ok((Unit::Char(c), chars.as_str()));
    }
    let e = chars.next().ok_or(QuoteError::Syntax)?;
    let rest = chars.as_str();
    let simple = match e {
        'a' => Some('\u{7}'),
        'b' => Some('\u{8}'),
        'f' => Some('\u{c}'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        'v' => Some('\u{b}'),
        '\\' => Some('\\'),
        '\'' | '"' => {
            if e != quote {
                return Err(QuoteError::Syntax);
            }
            Some(e)
        }
        _ => None,
    };
    if let Some(c) = simple {
        return Ok((Unit::Char(c), rest));
    }
    match e {
        'x' | 'u' | 'U' => {
            let n = match e {
                'x' => 2,
                'u' => 4,
                _ => 8,
            };
            if rest.len() < n || !rest.is_char_boundary(n) {
                return Err(QuoteError::Syntax);
            }
            let v = u32::from_str_radix(&rest[..n], 16).map_err(|_| QuoteError::Syntax)?;
            let rest = &rest[n..];
            if e == 'x' {
                return Ok((Unit::Byte(v as u8), rest));
            }
            let c = char::from_u32(v).ok_or(QuoteError::Syntax)?;
            Ok((Unit::Char(c), rest))
        }
        '0'..='7' => {
            if rest.len() < 2 || !rest.is_char_boundary(2) {
                return Err(QuoteError::Syntax);
            }
            let digits = format!("{}{}", e, &rest[..2]);
            let v = u32::from_str_radix(&digits, 8).map_err(|_| QuoteError::Syntax)?;
            if v > 255 {
                return Err(QuoteError::Syntax);
            }
            Ok((Unit::Byte(v as u8), &rest[2..]))
        }
        _ => Err(QuoteError::Syntax),
    }
}

fn push_unit(out: &mut Vec<u8>, unit: Unit) {
    match unit {
        Unit::Byte(b) => out.push(b),
        Unit::Char(c) => {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
}

/// Interpret a Go string, raw string or rune literal, returning its bytes.
pub fn unquote_bytes(lit: &str) -> Result<Vec<u8>, QuoteError> {
    let mut chars = lit.chars();
    let quote = chars.next().ok_or(QuoteError::Syntax)?;
    if lit.len() < 2 || !lit.ends_with(quote) {
        return Err(QuoteError::Syntax);
    }
    let body = &lit[quote.len_utf8()..lit.len() - quote.len_utf8()];
    match quote {
        '`' => {
            if body.contains('`') {
                return Err(QuoteError::Syntax);
            }
            Ok(body.bytes().filter(|&b| b != b'\r').collect())
        }
        '"' | '\'' => {
            if body.contains('\n') {
                return Err(QuoteError::Syntax);
            }
            let mut out = Vec::with_capacity(body.len());
            let mut rest = body;
            let mut units = 0;
            while !rest.is_empty() {
                let (unit, tail) = next_unit(rest, quote)?;
                push_unit(&mut out, unit);
                rest = tail;
                units += 1;
            }
            if quote == '\'' && units != 1 {
                return Err(QuoteError::Syntax);
            }
            Ok(out)
        }
        _ => Err(QuoteError::Syntax),
    }
}

/// Interpret a Go literal as UTF-8 text.
pub fn unquote(lit: &str) -> Result<String, QuoteError> {
    String::from_utf8(unquote_bytes(lit)?).map_err(|_| QuoteError::Syntax)
}

/// Value of a Go rune literal such as `'a'`, `'\n'` or `'\xff'`.
pub fn unquote_rune(lit: &str) -> Result<u32, QuoteError> {
    let body = lit
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .ok_or(QuoteError::Syntax)?;
    let (unit, rest) = next_unit(body, '\'')?;
    if !rest.is_empty() {
        return Err(QuoteError::Syntax);
    }
    Ok(match unit {
        Unit::Char(c) => c as u32,
        Unit::Byte(b) => b as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("abc"), "\"abc\"");
        assert_eq!(quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
        assert_eq!(quote("tab\there\n"), "\"tab\\there\\n\"");
        assert_eq!(quote("\u{1}"), "\"\\x01\"");
        assert_eq!(quote("\u{a0}"), "\"\\u00a0\"");
        assert_eq!(quote("héllo 世界"), "\"héllo 世界\"");
    }

    #[test]
    fn test_printable_runes() {
        for c in ['a', ' ', '~', 'é', '世', '€', '\u{301}', '😀'] {
            assert!(is_print(c), "{:?}", c);
        }
        for c in ['\t', '\u{7f}', '\u{a0}', '\u{ad}', '\u{200b}', '\u{2028}', '\u{feff}', '\u{e000}', '\u{f0000}'] {
            assert!(!is_print(c), "{:?}", c);
        }
        assert_eq!(quote("\u{200b}x\u{e000}"), "\"\\u200bx\\ue000\"");
    }

    #[test]
    fn test_quote_invalid_utf8() {
        assert_eq!(quote_bytes(&[b'a', 0xff]), "\"a\\xff\"");
    }

    #[test]
    fn test_unquote_forms() {
        assert_eq!(unquote("\"a\\tb\"").unwrap(), "a\tb");
        assert_eq!(unquote("`raw\\n`").unwrap(), "raw\\n");
        assert_eq!(unquote("\"\\u00e9\"").unwrap(), "é");
        assert_eq!(unquote("'x'").unwrap(), "x");
        assert_eq!(unquote_bytes("\"\\377\"").unwrap(), vec![0xff]);
    }

    #[test]
    fn test_unquote_rejects_malformed() {
        assert!(unquote("\"abc").is_err());
        assert!(unquote("abc").is_err());
        assert!(unquote("\"\\q\"").is_err());
        assert!(unquote("'ab'").is_err());
        assert!(unquote("\"a\"b\"").is_err());
    }

    #[test]
    fn test_unquote_rune() {
        assert_eq!(unquote_rune("'a'").unwrap(), 97);
        assert_eq!(unquote_rune("'\\n'").unwrap(), 10);
        assert_eq!(unquote_rune("'\\xff'").unwrap(), 255);
        assert_eq!(unquote_rune("'世'").unwrap(), 0x4e16);
        assert!(unquote_rune("''").is_err());
    }

    proptest! {
        #[test]
        fn prop_quote_then_unquote_restores_text(s in "\\PC*") {
            prop_assert_eq!(unquote(&quote(&s)).unwrap(), s);
        }
    }
}
