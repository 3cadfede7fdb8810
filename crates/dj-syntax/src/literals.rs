//! Decoding of Java literal tokens into values.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LiteralError {
    pub message: String,
    /// Byte range within the provided literal text (not file offsets).
    pub span: Range<usize>,
}

fn err(message: impl Into<String>, span: Range<usize>) -> LiteralError {
    LiteralError {
        message: message.into(),
        span,
    }
}

/// Parses an `int` literal. Decimal literals are limited to `Integer.MAX_VALUE`; hex, octal
/// and binary literals may use all 32 bits and are read as two's complement.
pub fn parse_int_literal(text: &str) -> Result<i32, LiteralError> {
    parse_int(text, false)
}

/// Parses the operand of a unary minus, so `2147483648` is accepted and yields
/// `Integer.MIN_VALUE`.
pub fn parse_negated_int_literal(text: &str) -> Result<i32, LiteralError> {
    parse_int(text, true)
}

fn parse_int(text: &str, negated: bool) -> Result<i32, LiteralError> {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return Err(err("Empty int literal", 0..0));
    }

    let last_idx = bytes.len() - 1;
    if matches!(bytes[last_idx], b'l' | b'L') {
        return Err(err(
            "Int literal must not have `L` suffix",
            last_idx..last_idx + 1,
        ));
    }

    let end = bytes.len();
    let (base, prefix_len, is_decimal) = integer_base(bytes, end)?;
    let limit = match (is_decimal, negated) {
        (true, false) => i32::MAX as u64,
        (true, true) => i32::MAX as u64 + 1,
        (false, _) => u32::MAX as u64,
    };

    let value = parse_unsigned_integer(bytes, prefix_len, end, base, limit)?;
    let value = if is_decimal {
        value as i64 as i32
    } else {
        value as u32 as i32
    };
    Ok(if negated { value.wrapping_neg() } else { value })
}

pub fn parse_long_literal(text: &str) -> Result<i64, LiteralError> {
    parse_long(text, false)
}

/// Like [`parse_negated_int_literal`] for `long`: `9223372036854775808L` is accepted.
pub fn parse_negated_long_literal(text: &str) -> Result<i64, LiteralError> {
    parse_long(text, true)
}

fn parse_long(text: &str, negated: bool) -> Result<i64, LiteralError> {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return Err(err("Empty long literal", 0..0));
    }

    let suffix_pos = bytes.len() - 1;
    if !matches!(bytes[suffix_pos], b'l' | b'L') {
        return Err(err(
            "Long literal is missing `L` suffix",
            suffix_pos..suffix_pos + 1,
        ));
    }

    if suffix_pos == 0 {
        return Err(err("Long literal is missing digits", 0..text.len()));
    }

    if bytes[suffix_pos - 1] == b'_' {
        return Err(err(
            "Underscore is not allowed immediately before long suffix",
            suffix_pos - 1..suffix_pos,
        ));
    }

    let end = suffix_pos;
    let (base, prefix_len, is_decimal) = integer_base(bytes, end)?;
    let limit = match (is_decimal, negated) {
        (true, false) => i64::MAX as u64,
        (true, true) => i64::MAX as u64 + 1,
        (false, _) => u64::MAX,
    };

    let value = parse_unsigned_integer(bytes, prefix_len, end, base, limit)? as i64;
    Ok(if negated { value.wrapping_neg() } else { value })
}

/// Whether an integer literal token is written in decimal.
pub fn is_decimal_literal(text: &str) -> bool {
    let bytes = text.as_bytes();
    !(bytes.len() > 1 && bytes[0] == b'0' && !matches!(bytes[1], b'l' | b'L'))
}

fn integer_base(bytes: &[u8], end: usize) -> Result<(u32, usize, bool), LiteralError> {
    if end == 0 {
        return Err(err("Empty integer literal", 0..0));
    }

    if bytes[0] != b'0' {
        return Ok((10, 0, true));
    }

    if end >= 2 {
        match bytes[1] {
            b'x' | b'X' => return Ok((16, 2, false)),
            b'b' | b'B' => return Ok((2, 2, false)),
            _ => {}
        }
    }

    if end > 1 {
        return Ok((8, 1, false));
    }

    Ok((10, 0, true))
}

fn parse_unsigned_integer(
    bytes: &[u8],
    prefix_len: usize,
    end: usize,
    base: u32,
    limit: u64,
) -> Result<u64, LiteralError> {
    debug_assert!(prefix_len <= end);

    if bytes[end - 1] == b'_' {
        return Err(err(
            "Trailing underscore is not allowed in numeric literal",
            end - 1..end,
        ));
    }

    if prefix_len == 2 {
        if end == 2 {
            return Err(err(
                "Missing digits after base prefix",
                prefix_len..prefix_len,
            ));
        }
        if bytes[prefix_len] == b'_' {
            return Err(err(
                "Underscore is not allowed immediately after base prefix",
                prefix_len..prefix_len + 1,
            ));
        }
    }

    let mut value: u64 = 0;
    let mut seen_digit = false;

    for (idx, &b) in bytes[..end].iter().enumerate().skip(prefix_len) {
        if b == b'_' {
            continue;
        }

        let digit = (b as char)
            .to_digit(base)
            .ok_or_else(|| {
                let kind = match base {
                    2 => "binary",
                    8 => "octal",
                    16 => "hexadecimal",
                    _ => "decimal",
                };
                err(
                    format!("Invalid digit `{}` in {kind} literal", b as char),
                    idx..idx + 1,
                )
            })? as u64;

        seen_digit = true;
        value = value
            .checked_mul(base as u64)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| err("Integer literal is too large", 0..end))?;

        if value > limit {
            return Err(err("Integer literal is out of range", 0..end));
        }
    }

    if !seen_digit {
        return Err(err("Missing digits", prefix_len..end));
    }

    Ok(value)
}

pub fn parse_float_literal(text: &str) -> Result<f32, LiteralError> {
    let body = strip_float_suffix(text, &[b'f', b'F'])?;
    let value = if is_hex_float(body) {
        parse_hex_float(body, text)? as f32
    } else {
        body.replace('_', "")
            .parse::<f32>()
            .map_err(|_| err("Malformed floating-point literal", 0..text.len()))?
    };
    if value.is_infinite() {
        return Err(err("Floating-point literal is too large", 0..text.len()));
    }
    Ok(value)
}

pub fn parse_double_literal(text: &str) -> Result<f64, LiteralError> {
    let body = strip_float_suffix(text, &[b'd', b'D'])?;
    let value = if is_hex_float(body) {
        parse_hex_float(body, text)?
    } else {
        body.replace('_', "")
            .parse::<f64>()
            .map_err(|_| err("Malformed floating-point literal", 0..text.len()))?
    };
    if value.is_infinite() {
        return Err(err("Floating-point literal is too large", 0..text.len()));
    }
    Ok(value)
}

fn strip_float_suffix<'a>(text: &'a str, suffixes: &[u8]) -> Result<&'a str, LiteralError> {
    let bytes = text.as_bytes();
    let Some(&last) = bytes.last() else {
        return Err(err("Empty floating-point literal", 0..0));
    };
    let body = if suffixes.contains(&last) && !is_hex_digits_only(text) {
        &text[..text.len() - 1]
    } else {
        text
    };
    if body.ends_with('_') || body.starts_with('_') {
        return Err(err(
            "Underscore is not allowed at the edge of a numeric literal",
            0..text.len(),
        ));
    }
    Ok(body)
}

// `0x1F` style text has no exponent, so a trailing `f`/`d` is a hex digit rather than a
// suffix. Hex floats always carry a `p` exponent, which makes the suffix unambiguous.
fn is_hex_digits_only(text: &str) -> bool {
    is_hex_float(text) && !text.contains(['p', 'P'])
}

fn is_hex_float(text: &str) -> bool {
    text.starts_with("0x") || text.starts_with("0X")
}

fn parse_hex_float(body: &str, text: &str) -> Result<f64, LiteralError> {
    let digits = body[2..].replace('_', "");
    let (mantissa, exponent) = digits
        .split_once(['p', 'P'])
        .ok_or_else(|| err("Hexadecimal floating literal needs an exponent", 0..text.len()))?;
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(err("Missing digits", 0..text.len()));
    }

    let mut value = 0f64;
    for c in int_part.chars() {
        let d = c
            .to_digit(16)
            .ok_or_else(|| err(format!("Invalid hex digit `{c}`"), 0..text.len()))?;
        value = value * 16.0 + d as f64;
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars() {
        let d = c
            .to_digit(16)
            .ok_or_else(|| err(format!("Invalid hex digit `{c}`"), 0..text.len()))?;
        value += d as f64 * scale;
        scale /= 16.0;
    }
    let exponent: i32 = exponent
        .parse()
        .map_err(|_| err("Malformed binary exponent", 0..text.len()))?;
    Ok(value * 2f64.powi(exponent))
}

/// Decodes a quoted char literal to its UTF-16 code unit.
pub fn unescape_char_literal(text: &str) -> Result<u16, LiteralError> {
    let bytes = text.as_bytes();
    if bytes.len() < 2 || bytes.first() != Some(&b'\'') || bytes.last() != Some(&b'\'') {
        return Err(err("Invalid char literal", 0..text.len()));
    }

    let mut out = String::new();
    unescape_java_string_like(text, 1, text.len() - 1, &mut out)?;
    let mut utf16 = out.encode_utf16();
    let Some(unit) = utf16.next() else {
        return Err(err("Empty char literal", 0..text.len()));
    };
    if utf16.next().is_some() {
        return Err(err(
            "Char literal must contain exactly one character",
            0..text.len(),
        ));
    }
    Ok(unit)
}

pub fn unescape_string_literal(text: &str) -> Result<String, LiteralError> {
    let bytes = text.as_bytes();
    if bytes.len() < 2 || bytes.first() != Some(&b'"') || bytes.last() != Some(&b'"') {
        return Err(err("Invalid string literal", 0..text.len()));
    }
    let mut out = String::new();
    unescape_java_string_like(text, 1, text.len() - 1, &mut out)?;
    Ok(out)
}

fn unescape_java_string_like(
    text: &str,
    start: usize,
    end: usize,
    out: &mut String,
) -> Result<(), LiteralError> {
    let bytes = text.as_bytes();
    let mut idx = start;

    while idx < end {
        let b = bytes[idx];
        match b {
            b'\\' => {
                idx = unescape_java_escape(text, idx, end, out)?;
            }
            b'\n' | b'\r' => {
                return Err(err(
                    "Line terminator is not allowed in string/char literal",
                    idx..idx + 1,
                ))
            }
            _ => {
                let ch = text[idx..end].chars().next().unwrap_or('\u{FFFD}');
                out.push(ch);
                idx += ch.len_utf8();
            }
        }
    }

    Ok(())
}

fn unescape_java_escape(
    text: &str,
    idx: usize,
    end: usize,
    out: &mut String,
) -> Result<usize, LiteralError> {
    let bytes = text.as_bytes();
    if idx + 1 >= end {
        return Err(err("Unterminated escape sequence", idx..end));
    }

    let next = bytes[idx + 1];
    let simple = match next {
        b'b' => Some('\u{0008}'),
        b't' => Some('\t'),
        b'n' => Some('\n'),
        b'f' => Some('\u{000C}'),
        b'r' => Some('\r'),
        b'"' => Some('"'),
        b'\'' => Some('\''),
        b'\\' => Some('\\'),
        b's' => Some(' '),
        _ => None,
    };
    if let Some(ch) = simple {
        out.push(ch);
        return Ok(idx + 2);
    }

    match next {
        b'u' => {
            let mut j = idx + 2;
            while j < end && bytes[j] == b'u' {
                j += 1;
            }
            if j + 4 > end {
                return Err(err("Incomplete unicode escape", idx..end));
            }
            let mut value: u32 = 0;
            for pos in j..j + 4 {
                let digit = (bytes[pos] as char).to_digit(16).ok_or_else(|| {
                    err(
                        format!("Invalid hex digit `{}` in unicode escape", bytes[pos] as char),
                        pos..pos + 1,
                    )
                })?;
                value = (value << 4) | digit;
            }

            let ch = char::from_u32(value)
                .ok_or_else(|| err("Unicode escape is not a valid scalar value", idx..j + 4))?;
            out.push(ch);
            Ok(j + 4)
        }
        b'0'..=b'7' => {
            let max_digits = if next <= b'3' { 3 } else { 2 };
            let mut j = idx + 1;
            let mut value: u32 = 0;
            let mut count = 0;
            while count < max_digits && j < end && matches!(bytes[j], b'0'..=b'7') {
                value = value * 8 + (bytes[j] - b'0') as u32;
                j += 1;
                count += 1;
            }
            // Octal escapes top out at \377, always a valid scalar.
            out.push(char::from_u32(value).unwrap_or('\u{FFFD}'));
            Ok(j)
        }
        _ => Err(err(
            format!("Unknown escape sequence `\\{}`", next as char),
            idx..idx + 2,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_literal_boundaries() {
        assert_eq!(parse_int_literal("2147483647").unwrap(), i32::MAX);
        assert!(parse_int_literal("2147483648").is_err());
        assert_eq!(parse_negated_int_literal("2147483648").unwrap(), i32::MIN);
        assert!(parse_negated_int_literal("2147483649").is_err());
        assert_eq!(parse_int_literal("0xFFFF_FFFF").unwrap(), -1);
        assert_eq!(parse_int_literal("0x8000_0000").unwrap(), i32::MIN);
        assert!(parse_int_literal("0x1_0000_0000").is_err());
        assert_eq!(parse_int_literal("017").unwrap(), 15);
        assert_eq!(parse_int_literal("0b101").unwrap(), 5);
    }

    #[test]
    fn long_literal_boundaries() {
        assert_eq!(parse_long_literal("9223372036854775807L").unwrap(), i64::MAX);
        assert!(parse_long_literal("9223372036854775808L").is_err());
        assert_eq!(
            parse_negated_long_literal("9223372036854775808L").unwrap(),
            i64::MIN
        );
        assert!(parse_negated_long_literal("9223372036854775809L").is_err());
        assert_eq!(parse_long_literal("0xFFFF_FFFF_FFFF_FFFFL").unwrap(), -1);
    }

    #[test]
    fn decimal_detection() {
        assert!(is_decimal_literal("0"));
        assert!(is_decimal_literal("0L"));
        assert!(is_decimal_literal("123"));
        assert!(!is_decimal_literal("0x10"));
        assert!(!is_decimal_literal("017"));
    }

    #[test]
    fn float_and_double_decimal_and_hex() {
        assert_eq!(parse_float_literal("1f").unwrap(), 1.0f32);
        assert_eq!(parse_float_literal("2.5e1F").unwrap(), 25.0f32);
        assert_eq!(parse_double_literal("1.").unwrap(), 1.0f64);
        assert_eq!(parse_double_literal("1_000.5d").unwrap(), 1000.5f64);
        assert_eq!(parse_double_literal("0x1p1").unwrap(), 2.0f64);
        assert_eq!(parse_double_literal("0x1.8p1d").unwrap(), 3.0f64);
        assert!(parse_double_literal("1e999").is_err());
    }

    #[test]
    fn string_and_char_escapes() {
        assert_eq!(unescape_char_literal("'\\n'").unwrap(), b'\n' as u16);
        assert_eq!(unescape_char_literal("'\\u0041'").unwrap(), 0x41);
        assert!(unescape_char_literal("'ab'").is_err());
        assert_eq!(unescape_string_literal("\"a\\tb\"").unwrap(), "a\tb");
        assert_eq!(unescape_string_literal("\"\\141\"").unwrap(), "a");
        assert!(unescape_string_literal("\"\\q\"").is_err());
    }
}
