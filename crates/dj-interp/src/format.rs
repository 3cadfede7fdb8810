//! Java text conversions: `Double.toString`, `Float.toString` and `String.format`.

use thiserror::Error;

/// `Double.toString`: plain notation for magnitudes in `[1e-3, 1e7)`, computerized
/// scientific notation otherwise, always with at least one fractional digit.
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if d == 0.0 {
        return if d.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    layout(&format!("{d:e}"), (1e-3..1e7).contains(&d.abs()))
}

/// `Float.toString`, with the digits of the shortest `f32` representation.
pub fn format_float(f: f32) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    layout(&format!("{f:e}"), (1e-3..1e7).contains(&f.abs()))
}

/// Turns Rust's shortest scientific rendering (`-1.25e-5`) into Java's layout.
fn layout(sci: &str, plain: bool) -> String {
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    if !plain {
        let (first, rest) = digits.split_at(1);
        let rest = if rest.is_empty() { "0" } else { rest };
        return format!("{sign}{first}.{rest}E{exp}");
    }
    let point = exp + 1;
    if point <= 0 {
        let zeros = "0".repeat(point.unsigned_abs() as usize);
        return format!("{sign}0.{zeros}{digits}");
    }
    let point = point as usize;
    if point >= digits.len() {
        let zeros = "0".repeat(point - digits.len());
        format!("{sign}{digits}{zeros}.0")
    } else {
        format!("{sign}{}.{}", &digits[..point], &digits[point..])
    }
}

/// An argument of `String.format`, already reduced to what the conversions need.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatArg {
    Null,
    Bool(bool),
    Char(char),
    Int(i64),
    Float(f64),
    /// Result of `String.valueOf` for any other reference.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Format specifier '{0}'")]
    MissingArgument(String),
    #[error("Conversion = '{0}'")]
    UnknownConversion(char),
    #[error("{conversion} != {arg}")]
    Mismatch { conversion: char, arg: &'static str },
}

struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    group: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// A subset of `java.util.Formatter`: `%s %S %d %x %X %o %f %e %c %b %n %%` with the
/// `-`, `0`, `+` and `,` flags, width and precision.
pub fn java_format(pattern: &str, args: &[FormatArg]) -> Result<String, FormatError> {
    let mut out = String::new();
    let mut chars = pattern.chars().peekable();
    let mut next_arg = 0;
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = Spec {
            left: false,
            zero: false,
            plus: false,
            group: false,
            width: None,
            precision: None,
        };
        let mut raw = String::from("%");
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ',' => spec.group = true,
                _ => break,
            }
            raw.push(flag);
            chars.next();
        }
        spec.width = take_number(&mut chars, &mut raw);
        if chars.peek() == Some(&'.') {
            raw.push('.');
            chars.next();
            spec.precision = Some(take_number(&mut chars, &mut raw).unwrap_or(0));
        }
        let Some(conversion) = chars.next() else {
            return Err(FormatError::UnknownConversion('%'));
        };
        raw.push(conversion);
        let body = match conversion {
            '%' => "%".to_string(),
            'n' => "\n".to_string(),
            _ => {
                let arg = args
                    .get(next_arg)
                    .ok_or_else(|| FormatError::MissingArgument(raw.clone()))?;
                next_arg += 1;
                convert(conversion, &spec, arg)?
            }
        };
        pad(&mut out, &body, &spec);
    }
    Ok(out)
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, raw: &mut String) -> Option<usize> {
    let mut digits = String::new();
    while let Some(&d) = chars.peek() {
        if !d.is_ascii_digit() {
            break;
        }
        digits.push(d);
        raw.push(d);
        chars.next();
    }
    digits.parse().ok()
}

fn convert(conversion: char, spec: &Spec, arg: &FormatArg) -> Result<String, FormatError> {
    let mismatch = |arg: &FormatArg| FormatError::Mismatch {
        conversion,
        arg: match arg {
            FormatArg::Null => "null",
            FormatArg::Bool(_) => "java.lang.Boolean",
            FormatArg::Char(_) => "java.lang.Character",
            FormatArg::Int(_) => "java.lang.Integer",
            FormatArg::Float(_) => "java.lang.Double",
            FormatArg::Text(_) => "java.lang.String",
        },
    };
    let text = match (conversion, arg) {
        ('s' | 'S', arg) => {
            let s = match arg {
                FormatArg::Null => "null".to_string(),
                FormatArg::Bool(b) => b.to_string(),
                FormatArg::Char(c) => c.to_string(),
                FormatArg::Int(i) => i.to_string(),
                FormatArg::Float(f) => format_double(*f),
                FormatArg::Text(t) => t.clone(),
            };
            let s = match spec.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s,
            };
            if conversion == 'S' {
                s.to_uppercase()
            } else {
                s
            }
        }
        ('b' | 'B', FormatArg::Null) => "false".to_string(),
        ('b' | 'B', FormatArg::Bool(b)) => b.to_string(),
        ('b' | 'B', _) => "true".to_string(),
        ('c', FormatArg::Char(c)) => c.to_string(),
        ('c', FormatArg::Int(i)) => char::from_u32(*i as u32).map(String::from).ok_or_else(|| mismatch(arg))?,
        ('d', FormatArg::Int(i)) => {
            let digits = if spec.group {
                group_thousands(&i.unsigned_abs().to_string())
            } else {
                i.unsigned_abs().to_string()
            };
            signed(*i < 0, spec.plus, digits)
        }
        ('x', FormatArg::Int(i)) => hex(*i),
        ('X', FormatArg::Int(i)) => hex(*i).to_uppercase(),
        ('o', FormatArg::Int(i)) => format!("{:o}", *i as u64 & mask(*i)),
        ('f', FormatArg::Float(f)) => fixed(*f, spec),
        ('f', FormatArg::Int(i)) => fixed(*i as f64, spec),
        ('e', FormatArg::Float(f)) => scientific(*f, spec.precision.unwrap_or(6)),
        (_, FormatArg::Null) => "null".to_string(),
        ('c' | 'd' | 'x' | 'X' | 'o' | 'f' | 'e', other) => return Err(mismatch(other)),
        (other, _) => return Err(FormatError::UnknownConversion(other)),
    };
    Ok(text)
}

fn mask(i: i64) -> u64 {
    if i32::try_from(i).is_ok() {
        u64::from(u32::MAX)
    } else {
        u64::MAX
    }
}

fn hex(i: i64) -> String {
    format!("{:x}", i as u64 & mask(i))
}

fn signed(negative: bool, plus: bool, digits: String) -> String {
    if negative {
        format!("-{digits}")
    } else if plus {
        format!("+{digits}")
    } else {
        digits
    }
}

fn fixed(f: f64, spec: &Spec) -> String {
    if !f.is_finite() {
        return format_double(f);
    }
    let precision = spec.precision.unwrap_or(6);
    let text = format!("{:.*}", precision, f.abs());
    let text = if spec.group {
        let (int, frac) = text.split_once('.').map_or((text.as_str(), None), |(a, b)| (a, Some(b)));
        match frac {
            Some(frac) => format!("{}.{frac}", group_thousands(int)),
            None => group_thousands(int),
        }
    } else {
        text
    };
    signed(f.is_sign_negative() && f != 0.0, spec.plus, text)
}

fn scientific(f: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, f);
    let (mantissa, exp) = text.split_once('e').unwrap_or((&text, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn pad(out: &mut String, body: &str, spec: &Spec) {
    let len = body.chars().count();
    let width = spec.width.unwrap_or(0);
    if len >= width {
        out.push_str(body);
        return;
    }
    let fill = width - len;
    if spec.left {
        out.push_str(body);
        out.extend(std::iter::repeat(' ').take(fill));
    } else if spec.zero {
        let (sign, rest) = match body.strip_prefix(['-', '+']) {
            Some(rest) => (&body[..1], rest),
            None => ("", body),
        };
        out.push_str(sign);
        out.extend(std::iter::repeat('0').take(fill));
        out.push_str(rest);
    } else {
        out.extend(std::iter::repeat(' ').take(fill));
        out.push_str(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn doubles_print_like_java() {
        assert_eq!(format_double(1.0), "1.0");
        assert_eq!(format_double(0.1), "0.1");
        assert_eq!(format_double(-2.5), "-2.5");
        assert_eq!(format_double(100.0), "100.0");
        assert_eq!(format_double(0.001), "0.001");
        assert_eq!(format_double(1e7), "1.0E7");
        assert_eq!(format_double(1.25e-5), "1.25E-5");
        assert_eq!(format_double(123456789.0), "1.23456789E8");
        assert_eq!(format_double(f64::NAN), "NaN");
        assert_eq!(format_double(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_double(-0.0), "-0.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(3.0), "3.0");
    }

    #[test]
    fn format_supports_common_conversions() {
        let out = java_format(
            "%d|%5d|%-4s|%05.1f|%x|%c|%b|%,d%n%%",
            &[
                FormatArg::Int(42),
                FormatArg::Int(-7),
                FormatArg::Text("ab".into()),
                FormatArg::Float(3.14159),
                FormatArg::Int(255),
                FormatArg::Char('z'),
                FormatArg::Null,
                FormatArg::Int(1234567),
            ],
        )
        .unwrap();
        assert_eq!(out, "42|   -7|ab  |003.1|ff|z|false|1,234,567\n%");
    }

    #[test]
    fn format_reports_missing_arguments() {
        let err = java_format("%s and %s", &[FormatArg::Int(1)]).unwrap_err();
        assert_eq!(err, FormatError::MissingArgument("%s".into()));
        assert!(matches!(
            java_format("%d", &[FormatArg::Text("x".into())]),
            Err(FormatError::Mismatch { conversion: 'd', .. })
        ));
    }
}
