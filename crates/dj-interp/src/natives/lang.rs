//! `java.lang` and `java.io.PrintStream`.

use std::io::Write;

use dj_core::PrimitiveType;
use dj_types::{source_name, Type};
use regex::Regex;

use super::{canonical_f32, canonical_f64, compare_doubles, from_units, primitive_hash, units, wrapper_primitive, Args};
use crate::error::{Flow, Interrupt};
use crate::eval::Evaluator;
use crate::format::{format_double, format_float, java_format, FormatArg};
use crate::ops::convert_primitive;
use crate::value::{char_from_unit, NativeState, ObjectRef, Stream, ThrowableState, Value};

const STRING_INDEX: &str = "java.lang.StringIndexOutOfBoundsException";
const NUMBER_FORMAT: &str = "java.lang.NumberFormatException";
const ILLEGAL_ARGUMENT: &str = "java.lang.IllegalArgumentException";

fn find_units(hay: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(hay.len()));
    }
    if needle.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&i| hay[i..].starts_with(needle))
}

fn rfind_units(hay: &[u16], needle: &[u16]) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).rev().find(|&i| hay[i..].starts_with(needle))
}

/// UTF-16 encoding of a code point given as an `int`.
fn code_point_units(cp: i32) -> Vec<u16> {
    let mut buf = [0u16; 2];
    match u32::try_from(cp).ok().and_then(char::from_u32) {
        Some(c) => c.encode_utf16(&mut buf).to_vec(),
        None => vec![cp as u16],
    }
}

fn index_value(found: Option<usize>) -> Value {
    Value::Int(found.map_or(-1, |i| i as i32))
}

/// `String.hashCode`.
pub(crate) fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// `String.compareTo`: first differing code unit, else the length difference.
fn compare_strings(a: &str, b: &str) -> i32 {
    let (a, b) = (units(a), units(b));
    for (x, y) in a.iter().zip(&b) {
        if x != y {
            return i32::from(*x) - i32::from(*y);
        }
    }
    a.len() as i32 - b.len() as i32
}

fn map_char(unit: u16, upper: bool) -> u16 {
    let c = char_from_unit(unit);
    let mapped: Vec<char> = if upper {
        c.to_uppercase().collect()
    } else {
        c.to_lowercase().collect()
    };
    match mapped.as_slice() {
        [single] if single.len_utf16() == 1 => *single as u32 as u16,
        _ => unit,
    }
}

fn ordering_value(ord: std::cmp::Ordering) -> Value {
    Value::Int(ord as i32)
}

impl Evaluator<'_> {
    fn string_index(&mut self, message: String) -> Interrupt {
        self.throw_new(STRING_INDEX, Some(message))
    }

    /// A `String` argument that must not be `null`.
    fn required_string(&mut self, args: &Args, i: usize) -> Flow<String> {
        match args.value(i) {
            Value::Null => Err(self.null_pointer("Cannot invoke a method on a null String")),
            value => Ok(self.char_sequence(&value).unwrap_or_default()),
        }
    }

    fn char_array_text(&mut self, value: &Value) -> Flow<String> {
        match self.collection_items(value) {
            Some(items) => {
                let units: Vec<u16> = items
                    .iter()
                    .map(|v| if let Value::Char(c) = v { *c } else { 0 })
                    .collect();
                Ok(from_units(&units))
            }
            None => Err(self.null_pointer("Cannot read the array length because it is null")),
        }
    }

    fn substring(&mut self, text: &[u16], begin: i32, end: i32) -> Flow<Value> {
        let len = text.len() as i32;
        if begin < 0 || end > len || begin > end {
            return Err(self.string_index(format!("begin {begin}, end {end}, length {len}")));
        }
        Ok(self.new_string(from_units(&text[begin as usize..end as usize])))
    }

    fn compile_regex(&mut self, pattern: &str, anchored: bool) -> Flow<Regex> {
        let source = if anchored {
            format!("^(?:{pattern})$")
        } else {
            pattern.to_string()
        };
        Regex::new(&source).map_err(|err| self.throw_new(ILLEGAL_ARGUMENT, Some(err.to_string())))
    }

    /// `String.split`: a zero-width match at the start yields no leading empty string and
    /// trailing empty strings are removed.
    fn split(&mut self, text: &str, pattern: &str) -> Flow<Value> {
        let re = self.compile_regex(pattern, false)?;
        let mut parts: Vec<&str> = Vec::new();
        let mut last = 0;
        let mut matched = false;
        for m in re.find_iter(text) {
            if m.end() == 0 {
                continue;
            }
            matched = true;
            parts.push(&text[last..m.start()]);
            last = m.end();
        }
        parts.push(&text[last..]);
        if matched {
            while parts.last().is_some_and(|p| p.is_empty()) {
                parts.pop();
            }
        }
        let items = parts.into_iter().map(|p| self.new_string(p)).collect();
        Ok(self.new_array(Type::string(), items))
    }

    pub(super) fn string_method(&mut self, obj: &ObjectRef, sig: &str, args: &Args) -> Flow<Option<Value>> {
        let s = obj.string_value().unwrap_or_default();
        let value = match sig {
            "length()" => Value::Int(units(&s).len() as i32),
            "isEmpty()" => Value::Boolean(s.is_empty()),
            "charAt(int)" => {
                let text = units(&s);
                let i = args.int(0);
                match usize::try_from(i).ok().and_then(|i| text.get(i)) {
                    Some(c) => Value::Char(*c),
                    None => return Err(self.string_index(format!("Index {i} out of bounds for length {}", text.len()))),
                }
            }
            "substring(int)" => {
                let text = units(&s);
                self.substring(&text, args.int(0), text.len() as i32)?
            }
            "substring(int,int)" => {
                let text = units(&s);
                self.substring(&text, args.int(0), args.int(1))?
            }
            "indexOf(int)" => index_value(find_units(&units(&s), &code_point_units(args.int(0)), 0)),
            "lastIndexOf(int)" => index_value(rfind_units(&units(&s), &code_point_units(args.int(0)))),
            "indexOf(String)" => {
                let needle = self.required_string(args, 0)?;
                index_value(find_units(&units(&s), &units(&needle), 0))
            }
            "indexOf(String,int)" => {
                let needle = self.required_string(args, 0)?;
                let from = usize::try_from(args.int(1)).unwrap_or(0);
                index_value(find_units(&units(&s), &units(&needle), from))
            }
            "lastIndexOf(String)" => {
                let needle = self.required_string(args, 0)?;
                index_value(rfind_units(&units(&s), &units(&needle)))
            }
            "equals(Object)" => Value::Boolean(args.value(0).as_string().is_some_and(|other| other == s)),
            "equalsIgnoreCase(String)" => Value::Boolean(args.string(0).is_some_and(|other| {
                let (a, b) = (units(&s), units(&other));
                a.len() == b.len()
                    && a.iter().zip(&b).all(|(x, y)| {
                        x == y || map_char(*x, true) == map_char(*y, true) || map_char(*x, false) == map_char(*y, false)
                    })
            })),
            "hashCode()" => Value::Int(string_hash(&s)),
            "compareTo(String)" | "compareTo(Object)" => {
                let other = self.required_string(args, 0)?;
                Value::Int(compare_strings(&s, &other))
            }
            "toString()" => Value::Ref(obj.clone()),
            "toUpperCase()" => self.new_string(s.to_uppercase()),
            "toLowerCase()" => self.new_string(s.to_lowercase()),
            "trim()" => self.new_string(s.trim_matches(|c: char| c <= ' ')),
            "strip()" => self.new_string(s.trim()),
            "isBlank()" => Value::Boolean(s.trim().is_empty()),
            "startsWith(String)" => {
                let prefix = self.required_string(args, 0)?;
                Value::Boolean(s.starts_with(&prefix))
            }
            "endsWith(String)" => {
                let suffix = self.required_string(args, 0)?;
                Value::Boolean(s.ends_with(&suffix))
            }
            "contains(CharSequence)" => {
                let part = self.required_string(args, 0)?;
                Value::Boolean(s.contains(&part))
            }
            "replace(char,char)" => {
                let (from, to) = (args.char(0), args.char(1));
                let replaced: Vec<u16> = units(&s).into_iter().map(|u| if u == from { to } else { u }).collect();
                self.new_string(from_units(&replaced))
            }
            "replace(CharSequence,CharSequence)" => {
                let from = self.required_string(args, 0)?;
                let to = self.required_string(args, 1)?;
                let replaced = if from.is_empty() {
                    let mut out = String::from(to.as_str());
                    for c in s.chars() {
                        out.push(c);
                        out.push_str(&to);
                    }
                    out
                } else {
                    s.replace(&from, &to)
                };
                self.new_string(replaced)
            }
            "concat(String)" => {
                let tail = self.required_string(args, 0)?;
                self.new_string(format!("{s}{tail}"))
            }
            "repeat(int)" => {
                let count = args.int(0);
                match usize::try_from(count) {
                    Ok(count) => self.new_string(s.repeat(count)),
                    Err(_) => return Err(self.throw_new(ILLEGAL_ARGUMENT, Some(format!("count is negative: {count}")))),
                }
            }
            "toCharArray()" => {
                let items = units(&s).into_iter().map(Value::Char).collect();
                self.new_array(Type::CHAR, items)
            }
            "split(String)" => {
                let pattern = self.required_string(args, 0)?;
                self.split(&s, &pattern)?
            }
            "matches(String)" => {
                let pattern = self.required_string(args, 0)?;
                let re = self.compile_regex(&pattern, true)?;
                Value::Boolean(re.is_match(&s))
            }
            "replaceAll(String,String)" => {
                let pattern = self.required_string(args, 0)?;
                let replacement = self.required_string(args, 1)?;
                let re = self.compile_regex(&pattern, false)?;
                let replaced = re.replace_all(&s, replacement.as_str()).into_owned();
                self.new_string(replaced)
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    pub(super) fn string_static(&mut self, sig: &str, args: &Args) -> Flow<Option<Value>> {
        let value = match sig {
            "valueOf(char[])" => {
                let text = self.char_array_text(&args.value(0))?;
                self.new_string(text)
            }
            "format(String,Object[])" => {
                let text = self.format_values(args.string(0), &args.value(1))?;
                self.new_string(text)
            }
            "join(CharSequence,CharSequence[])" => {
                let delimiter = self.required_string(args, 0)?;
                let parts: Vec<String> = self
                    .collection_items(&args.value(1))
                    .unwrap_or_default()
                    .iter()
                    .map(|part| self.char_sequence(part).unwrap_or_else(|| "null".to_string()))
                    .collect();
                self.new_string(parts.join(&delimiter))
            }
            _ if sig.starts_with("valueOf(") => {
                let text = self.to_java_string(&args.value(0))?;
                self.new_string(text)
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// `String.format(pattern, args)` with the arguments of a varargs array.
    pub(super) fn format_values(&mut self, pattern: Option<String>, array: &Value) -> Flow<String> {
        let Some(pattern) = pattern else {
            return Err(self.null_pointer("Cannot format with a null pattern"));
        };
        let mut format_args = Vec::new();
        for item in self.collection_items(array).unwrap_or_default() {
            let arg = match self.unbox(&item) {
                Value::Null => FormatArg::Null,
                Value::Boolean(b) => FormatArg::Bool(b),
                Value::Char(c) => FormatArg::Char(char_from_unit(c)),
                v @ (Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_)) => {
                    FormatArg::Int(v.as_i64().unwrap_or(0))
                }
                v @ (Value::Float(_) | Value::Double(_)) => FormatArg::Float(v.as_f64().unwrap_or(0.0)),
                other => FormatArg::Text(self.to_java_string(&other)?),
            };
            format_args.push(arg);
        }
        java_format(&pattern, &format_args).map_err(|err| self.throw_new(ILLEGAL_ARGUMENT, Some(err.to_string())))
    }

    pub(super) fn new_string_state(&mut self, params: &str, args: &Args) -> Flow<NativeState> {
        let text = match params {
            "()" => String::new(),
            "(char[])" => self.char_array_text(&args.value(0))?,
            _ => self.required_string(args, 0)?,
        };
        Ok(NativeState::Str(text))
    }

    pub(super) fn new_builder_state(&mut self, params: &str, args: &Args) -> Flow<NativeState> {
        let text = match params {
            "()" => String::new(),
            "(int)" => {
                let capacity = args.int(0);
                if capacity < 0 {
                    return Err(self.throw_new("java.lang.NegativeArraySizeException", Some(capacity.to_string())));
                }
                String::with_capacity(capacity as usize)
            }
            _ => self.required_string(args, 0)?,
        };
        Ok(NativeState::Builder(text))
    }

    fn builder_text(obj: &ObjectRef) -> String {
        match &*obj.state() {
            NativeState::Builder(s) => s.clone(),
            _ => String::new(),
        }
    }

    fn set_builder_text(obj: &ObjectRef, text: String) {
        if let NativeState::Builder(s) = &mut *obj.state_mut() {
            *s = text;
        }
    }

    pub(super) fn builder_method(&mut self, obj: &ObjectRef, sig: &str, args: &Args) -> Flow<Option<Value>> {
        let this = Value::Ref(obj.clone());
        if sig.starts_with("append(") {
            let appended = match sig {
                "append(char[])" => self.char_array_text(&args.value(0))?,
                "append(CharSequence)" | "append(String)" => {
                    let value = args.value(0);
                    self.char_sequence(&value).unwrap_or_else(|| "null".to_string())
                }
                _ => self.to_java_string(&args.value(0))?,
            };
            if let NativeState::Builder(s) = &mut *obj.state_mut() {
                s.push_str(&appended);
            }
            return Ok(Some(this));
        }
        let text = units(&Self::builder_text(obj));
        let len = text.len();
        let value = match sig {
            "length()" => Value::Int(len as i32),
            "toString()" => self.new_string(from_units(&text)),
            "charAt(int)" => {
                let i = args.int(0);
                match usize::try_from(i).ok().and_then(|i| text.get(i)) {
                    Some(c) => Value::Char(*c),
                    None => return Err(self.string_index(format!("index {i},length {len}"))),
                }
            }
            "indexOf(String)" => {
                let needle = self.required_string(args, 0)?;
                index_value(find_units(&text, &units(&needle), 0))
            }
            "substring(int)" => self.substring(&text, args.int(0), len as i32)?,
            "substring(int,int)" => self.substring(&text, args.int(0), args.int(1))?,
            "reverse()" => {
                let reversed: String = from_units(&text).chars().rev().collect();
                Self::set_builder_text(obj, reversed);
                this
            }
            "insert(int,String)" | "insert(int,char)" => {
                let offset = args.int(0);
                let Some(at) = usize::try_from(offset).ok().filter(|at| *at <= len) else {
                    return Err(self.string_index(format!("offset {offset}, length {len}")));
                };
                let inserted = if sig == "insert(int,char)" {
                    vec![args.char(1)]
                } else {
                    units(&args.string(1).unwrap_or_else(|| "null".to_string()))
                };
                let mut edited = text;
                edited.splice(at..at, inserted);
                Self::set_builder_text(obj, from_units(&edited));
                this
            }
            "deleteCharAt(int)" => {
                let i = args.int(0);
                let Some(at) = usize::try_from(i).ok().filter(|at| *at < len) else {
                    return Err(self.string_index(format!("index {i},length {len}")));
                };
                let mut edited = text;
                edited.remove(at);
                Self::set_builder_text(obj, from_units(&edited));
                this
            }
            "delete(int,int)" => {
                let (start, end) = (args.int(0), args.int(1));
                let end = end.min(len as i32);
                if start < 0 || start > end {
                    return Err(self.string_index(format!("start {start}, end {end}, length {len}")));
                }
                let mut edited = text;
                edited.drain(start as usize..end as usize);
                Self::set_builder_text(obj, from_units(&edited));
                this
            }
            "setCharAt(int,char)" => {
                let i = args.int(0);
                let Some(at) = usize::try_from(i).ok().filter(|at| *at < len) else {
                    return Err(self.string_index(format!("index {i},length {len}")));
                };
                let mut edited = text;
                edited[at] = args.char(1);
                Self::set_builder_text(obj, from_units(&edited));
                Value::Null
            }
            "setLength(int)" => {
                let new_len = args.int(0);
                let Ok(new_len) = usize::try_from(new_len) else {
                    return Err(self.string_index(format!("String index out of range: {new_len}")));
                };
                let mut edited = text;
                edited.resize(new_len, 0);
                Self::set_builder_text(obj, from_units(&edited));
                Value::Null
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    pub(super) fn boxed_method(&mut self, obj: &ObjectRef, sig: &str, args: &Args) -> Flow<Option<Value>> {
        let inner = match &*obj.state() {
            NativeState::Boxed(v) => v.clone(),
            _ => return Ok(None),
        };
        let target = match sig {
            "intValue()" => Some(PrimitiveType::Int),
            "longValue()" => Some(PrimitiveType::Long),
            "floatValue()" => Some(PrimitiveType::Float),
            "doubleValue()" => Some(PrimitiveType::Double),
            "byteValue()" => Some(PrimitiveType::Byte),
            "shortValue()" => Some(PrimitiveType::Short),
            _ => None,
        };
        if let Some(target) = target {
            return Ok(convert_primitive(&inner, target));
        }
        let value = match sig {
            "booleanValue()" | "charValue()" => inner,
            "isNaN()" => Value::Boolean(inner.as_f64().is_some_and(f64::is_nan)),
            "hashCode()" => Value::Int(primitive_hash(&inner)),
            "toString()" => {
                let text = self.to_java_string(&inner)?;
                self.new_string(text)
            }
            "equals(Object)" => {
                let equal = match args.object(0) {
                    Some(other) if other.class_name() == obj.class_name() => {
                        let other = self.unbox(&Value::Ref(other));
                        match (&inner, &other) {
                            (Value::Double(a), Value::Double(b)) => canonical_f64(*a).to_bits() == canonical_f64(*b).to_bits(),
                            (Value::Float(a), Value::Float(b)) => canonical_f32(*a).to_bits() == canonical_f32(*b).to_bits(),
                            (a, b) => a.same(b),
                        }
                    }
                    _ => false,
                };
                Value::Boolean(equal)
            }
            _ if sig.starts_with("compareTo(") => {
                let other = self.unbox(&args.value(0));
                if other.is_null() {
                    return Err(self.null_pointer("Cannot compare with null"));
                }
                match (&inner, &other) {
                    (Value::Boolean(a), Value::Boolean(b)) => ordering_value(a.cmp(b)),
                    (Value::Char(a), Value::Char(b)) => Value::Int(i32::from(*a) - i32::from(*b)),
                    (Value::Byte(_) | Value::Short(_), _) => {
                        Value::Int((inner.as_i64().unwrap_or(0) - other.as_i64().unwrap_or(0)) as i32)
                    }
                    (Value::Float(_) | Value::Double(_), _) => {
                        ordering_value(compare_doubles(inner.as_f64().unwrap_or(0.0), other.as_f64().unwrap_or(0.0)))
                    }
                    _ => ordering_value(inner.as_i64().cmp(&other.as_i64())),
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn parse_integral(&mut self, text: Option<String>, min: i64, max: i64, narrow: bool) -> Flow<i64> {
        let Some(text) = text else {
            return Err(self.throw_new(NUMBER_FORMAT, Some("Cannot parse null string: null".to_string())));
        };
        match text.parse::<i64>() {
            Ok(v) if (min..=max).contains(&v) => Ok(v),
            Ok(_) if narrow => Err(self.throw_new(
                NUMBER_FORMAT,
                Some(format!("Value out of range. Value:\"{text}\" Radix:10")),
            )),
            _ => Err(self.throw_new(NUMBER_FORMAT, Some(format!("For input string: \"{text}\"")))),
        }
    }

    fn parse_floating(&mut self, text: Option<String>) -> Flow<f64> {
        let Some(text) = text else {
            return Err(self.null_pointer("Cannot parse a null string"));
        };
        let trimmed = text.trim_matches(|c: char| c <= ' ');
        if trimmed.is_empty() {
            return Err(self.throw_new(NUMBER_FORMAT, Some("empty String".to_string())));
        }
        let parsed = match trimmed.trim_start_matches(['+', '-']) {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(if trimmed.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY }),
            _ => {
                let body = trimmed.strip_suffix(['d', 'D', 'f', 'F']).unwrap_or(trimmed);
                let plain = body.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
                if plain {
                    body.parse::<f64>().ok()
                } else {
                    None
                }
            }
        };
        parsed.ok_or_else(|| self.throw_new(NUMBER_FORMAT, Some(format!("For input string: \"{trimmed}\""))))
    }

    pub(super) fn wrapper_static(&mut self, owner: &str, sig: &str, args: &Args) -> Flow<Option<Value>> {
        let Some(kind) = wrapper_primitive(owner) else {
            return Ok(None);
        };
        let (name, params) = sig.split_once('(').unwrap_or((sig, ""));
        let value = match (name, params) {
            ("parseInt", _) => Value::Int(self.parse_integral(args.string(0), i32::MIN.into(), i32::MAX.into(), false)? as i32),
            ("parseLong", _) => Value::Long(self.parse_integral(args.string(0), i64::MIN, i64::MAX, false)?),
            ("parseShort", _) => Value::Short(self.parse_integral(args.string(0), i16::MIN.into(), i16::MAX.into(), true)? as i16),
            ("parseByte", _) => Value::Byte(self.parse_integral(args.string(0), i8::MIN.into(), i8::MAX.into(), true)? as i8),
            ("parseDouble", _) => Value::Double(self.parse_floating(args.string(0))?),
            ("parseFloat", _) => Value::Float(self.parse_floating(args.string(0))? as f32),
            ("parseBoolean", _) => Value::Boolean(args.string(0).is_some_and(|s| s.eq_ignore_ascii_case("true"))),
            ("valueOf", "String)") => {
                let parsed = match kind {
                    PrimitiveType::Int => Value::Int(self.parse_integral(args.string(0), i32::MIN.into(), i32::MAX.into(), false)? as i32),
                    _ => return Ok(None),
                };
                self.box_value(parsed)
            }
            ("valueOf", _) => {
                let raw = convert_primitive(&args.value(0), kind).unwrap_or(Value::Null);
                self.box_value(raw)
            }
            ("toString", _) => {
                let text = match args.value(0) {
                    Value::Double(d) => format_double(d),
                    Value::Float(f) => format_float(f),
                    other => self.to_java_string(&other)?,
                };
                self.new_string(text)
            }
            ("toHexString", _) => self.new_string(format!("{:x}", args.int(0) as u32)),
            ("toBinaryString", _) => self.new_string(format!("{:b}", args.int(0) as u32)),
            ("max", _) => Value::Int(args.int(0).max(args.int(1))),
            ("min", _) => Value::Int(args.int(0).min(args.int(1))),
            ("sum", _) => Value::Int(args.int(0).wrapping_add(args.int(1))),
            ("compare", _) => match kind {
                PrimitiveType::Double | PrimitiveType::Float => ordering_value(compare_doubles(args.double(0), args.double(1))),
                _ => ordering_value(args.long(0).cmp(&args.long(1))),
            },
            ("isNaN", _) => Value::Boolean(args.double(0).is_nan()),
            ("isInfinite", _) => Value::Boolean(args.double(0).is_infinite()),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    pub(super) fn character_static(&mut self, sig: &str, args: &Args) -> Flow<Option<Value>> {
        let unit = args.char(0);
        let c = char_from_unit(unit);
        let surrogate = (0xD800..=0xDFFF).contains(&unit);
        let value = match sig {
            "isDigit(char)" => Value::Boolean(!surrogate && c.is_numeric()),
            "isLetter(char)" => Value::Boolean(!surrogate && c.is_alphabetic()),
            "isLetterOrDigit(char)" => Value::Boolean(!surrogate && c.is_alphanumeric()),
            "isWhitespace(char)" => {
                Value::Boolean(c.is_whitespace() && !matches!(c, '\u{a0}' | '\u{2007}' | '\u{202f}'))
            }
            "isUpperCase(char)" => Value::Boolean(!surrogate && c.is_uppercase()),
            "isLowerCase(char)" => Value::Boolean(!surrogate && c.is_lowercase()),
            "toUpperCase(char)" => Value::Char(map_char(unit, true)),
            "toLowerCase(char)" => Value::Char(map_char(unit, false)),
            "getNumericValue(char)" => Value::Int(c.to_digit(36).map_or(-1, |d| d as i32)),
            "valueOf(char)" => self.box_value(Value::Char(unit)),
            "toString(char)" => self.new_string(c.to_string()),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    pub(super) fn math_static(&mut self, sig: &str, args: &Args) -> Flow<Option<Value>> {
        let (x, y) = (args.double(0), args.double(1));
        let value = match sig {
            "abs(int)" => Value::Int(args.int(0).wrapping_abs()),
            "abs(long)" => Value::Long(args.long(0).wrapping_abs()),
            "abs(float)" => Value::Float(args.float(0).abs()),
            "abs(double)" => Value::Double(x.abs()),
            "max(int,int)" => Value::Int(args.int(0).max(args.int(1))),
            "min(int,int)" => Value::Int(args.int(0).min(args.int(1))),
            "max(long,long)" => Value::Long(args.long(0).max(args.long(1))),
            "min(long,long)" => Value::Long(args.long(0).min(args.long(1))),
            "max(float,float)" => Value::Float(java_max(x, y) as f32),
            "min(float,float)" => Value::Float(java_min(x, y) as f32),
            "max(double,double)" => Value::Double(java_max(x, y)),
            "min(double,double)" => Value::Double(java_min(x, y)),
            "sqrt(double)" => Value::Double(x.sqrt()),
            "cbrt(double)" => Value::Double(x.cbrt()),
            "pow(double,double)" => Value::Double(x.powf(y)),
            "floor(double)" => Value::Double(x.floor()),
            "ceil(double)" => Value::Double(x.ceil()),
            "rint(double)" => Value::Double(rint(x)),
            "round(double)" => Value::Long(round_half_up(x) as i64),
            "round(float)" => Value::Int(round_half_up(f64::from(args.float(0))) as i32),
            "random()" => Value::Double(self.rt.next_random()),
            "sin(double)" => Value::Double(x.sin()),
            "cos(double)" => Value::Double(x.cos()),
            "tan(double)" => Value::Double(x.tan()),
            "atan2(double,double)" => Value::Double(x.atan2(y)),
            "log(double)" => Value::Double(x.ln()),
            "log10(double)" => Value::Double(x.log10()),
            "exp(double)" => Value::Double(x.exp()),
            "hypot(double,double)" => Value::Double(x.hypot(y)),
            "floorDiv(int,int)" | "floorMod(int,int)" => {
                let (a, b) = (args.int(0), args.int(1));
                if b == 0 {
                    return Err(self.throw_new("java.lang.ArithmeticException", Some("/ by zero".to_string())));
                }
                let mut q = a.wrapping_div(b);
                if a.wrapping_rem(b) != 0 && ((a ^ b) < 0) {
                    q -= 1;
                }
                if sig.starts_with("floorDiv") {
                    Value::Int(q)
                } else {
                    Value::Int(a.wrapping_sub(q.wrapping_mul(b)))
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    pub(super) fn system_static(&mut self, sig: &str, args: &Args) -> Flow<Option<Value>> {
        let value = match sig {
            "currentTimeMillis()" => {
                let millis = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map_or(0, |d| d.as_millis());
                Value::Long(i64::try_from(millis).unwrap_or(i64::MAX))
            }
            "nanoTime()" => Value::Long(self.rt.elapsed_nanos()),
            "lineSeparator()" => self.new_string("\n"),
            "identityHashCode(Object)" => Value::Int(args.object(0).map_or(0, |o| o.identity())),
            "arraycopy(Object,int,Object,int,int)" => {
                self.arraycopy(args)?;
                Value::Null
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn arraycopy(&mut self, args: &Args) -> Flow<()> {
        let (Some(src), Some(dest)) = (args.object(0), args.object(2)) else {
            return Err(self.null_pointer("arraycopy: null array"));
        };
        let (src_pos, dest_pos, length) = (args.int(1), args.int(3), args.int(4));
        let (items, src_elem) = match &*src.state() {
            NativeState::Array { items, elem } => (items.clone(), elem.clone()),
            _ => (Vec::new(), Type::Unknown),
        };
        let dest_info = match &*dest.state() {
            NativeState::Array { items, elem } => Some((items.len(), elem.clone())),
            _ => None,
        };
        let (Some((dest_len, dest_elem)), true) = (dest_info, src.is_array()) else {
            return Err(self.throw_new("java.lang.ArrayStoreException", Some("arraycopy: argument type mismatch".to_string())));
        };
        if src_elem.is_primitive() != dest_elem.is_primitive() || (src_elem.is_primitive() && src_elem != dest_elem) {
            return Err(self.throw_new("java.lang.ArrayStoreException", Some("arraycopy: type mismatch".to_string())));
        }
        if src_pos < 0 || dest_pos < 0 || length < 0 {
            return Err(self.index_out_of_bounds("java.lang.ArrayIndexOutOfBoundsException", i64::from(src_pos.min(dest_pos).min(length)), items.len()));
        }
        let (src_pos, dest_pos, length) = (src_pos as usize, dest_pos as usize, length as usize);
        if src_pos + length > items.len() {
            return Err(self.throw_new(
                "java.lang.ArrayIndexOutOfBoundsException",
                Some(format!("arraycopy: last source index {} out of bounds for length {}", src_pos + length, items.len())),
            ));
        }
        if dest_pos + length > dest_len {
            return Err(self.throw_new(
                "java.lang.ArrayIndexOutOfBoundsException",
                Some(format!("arraycopy: last destination index {} out of bounds for length {dest_len}", dest_pos + length)),
            ));
        }
        let copied = &items[src_pos..src_pos + length];
        if !dest_elem.is_primitive() {
            if let Some(bad) = copied.iter().find(|v| !v.is_null() && !self.instance_of(v, &dest_elem)) {
                let class = bad.as_object().map_or_else(String::new, |o| o.class_name().to_string());
                return Err(self.throw_new("java.lang.ArrayStoreException", Some(format!("arraycopy: element type mismatch: {class}"))));
            }
        }
        if let NativeState::Array { items: target, .. } = &mut *dest.state_mut() {
            target[dest_pos..dest_pos + length].clone_from_slice(copied);
        }
        Ok(())
    }

    pub(super) fn new_throwable_state(&mut self, owner: &str, params: &str, args: &Args) -> Flow<Option<NativeState>> {
        let (message, cause) = match params {
            "()" => (None, None),
            "(String)" => (args.string(0), None),
            "(String,Throwable)" => (args.string(0), args.object(1)),
            "(Throwable)" => {
                let cause = args.object(0);
                let message = match &cause {
                    Some(cause) => Some(self.to_java_string(&Value::Ref(cause.clone()))?),
                    None => None,
                };
                (message, cause)
            }
            "(Object)" => {
                let detail = args.value(0);
                let cause = detail
                    .as_object()
                    .filter(|o| matches!(&*o.state(), NativeState::Throwable(_)))
                    .cloned();
                (Some(self.to_java_string(&detail)?), cause)
            }
            "(int)" => {
                let index = args.int(0);
                let message = match owner {
                    "java.lang.ArrayIndexOutOfBoundsException" => format!("Array index out of range: {index}"),
                    "java.lang.StringIndexOutOfBoundsException" => format!("String index out of range: {index}"),
                    _ => format!("Index out of range: {index}"),
                };
                (Some(message), None)
            }
            _ => return Ok(None),
        };
        Ok(Some(NativeState::Throwable(ThrowableState {
            message,
            cause,
            trace: self.capture_trace(),
        })))
    }

    pub(super) fn throwable_method(&mut self, obj: &ObjectRef, sig: &str) -> Flow<Option<Value>> {
        let (message, cause, trace) = match &*obj.state() {
            NativeState::Throwable(state) => (state.message.clone(), state.cause.clone(), state.trace.clone()),
            _ => return Ok(None),
        };
        let value = match sig {
            "getMessage()" => match message {
                Some(message) => self.new_string(message),
                None => Value::Null,
            },
            "getLocalizedMessage()" => self.call_method(obj, dj_types::names::THROWABLE, "getMessage", Vec::new())?,
            "getCause()" => cause.map_or(Value::Null, Value::Ref),
            "toString()" => {
                let text = self.throwable_text(obj)?;
                self.new_string(text)
            }
            "printStackTrace()" => {
                let mut text = self.throwable_text(obj)?;
                for frame in trace {
                    text.push_str("\n\t");
                    text.push_str(&frame);
                }
                text.push('\n');
                self.write_stream(Stream::Err, &text);
                Value::Null
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// `Throwable.toString`: the class name and the localized message, if any.
    fn throwable_text(&mut self, obj: &ObjectRef) -> Flow<String> {
        let name = source_name(obj.class_name());
        let message = self.call_method(obj, dj_types::names::THROWABLE, "getLocalizedMessage", Vec::new())?;
        Ok(match message.as_string() {
            Some(message) => format!("{name}: {message}"),
            None => name,
        })
    }

    pub(crate) fn write_stream(&mut self, stream: Stream, text: &str) {
        let out = match stream {
            Stream::Out => &mut self.rt.out,
            Stream::Err => &mut self.rt.err,
        };
        if let Err(err) = out.write_all(text.as_bytes()) {
            tracing::warn!(target: "dj.interp", ?stream, %err, "failed to write guest output");
        }
    }

    pub(super) fn stream_method(&mut self, obj: &ObjectRef, sig: &str, args: &Args) -> Flow<Option<Value>> {
        let stream = match &*obj.state() {
            NativeState::Stream(stream) => *stream,
            _ => return Ok(None),
        };
        let (name, params) = sig.split_once('(').unwrap_or((sig, ""));
        let value = match (name, params) {
            ("println", ")") => {
                self.write_stream(stream, "\n");
                Value::Null
            }
            ("println" | "print", _) => {
                let mut text = if params == "char[])" {
                    self.char_array_text(&args.value(0))?
                } else {
                    self.to_java_string(&args.value(0))?
                };
                if name == "println" {
                    text.push('\n');
                }
                self.write_stream(stream, &text);
                Value::Null
            }
            ("printf", _) => {
                let text = self.format_values(args.string(0), &args.value(1))?;
                self.write_stream(stream, &text);
                Value::Ref(obj.clone())
            }
            ("flush", _) => {
                let out = match stream {
                    Stream::Out => &mut self.rt.out,
                    Stream::Err => &mut self.rt.err,
                };
                if let Err(err) = out.flush() {
                    tracing::warn!(target: "dj.interp", ?stream, %err, "failed to flush guest output");
                }
                Value::Null
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

/// `Math.max` on doubles: NaN wins and `0.0` is greater than `-0.0`.
fn java_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_negative() {
            b
        } else {
            a
        }
    } else {
        a.max(b)
    }
}

fn java_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_negative() {
            a
        } else {
            b
        }
    } else {
        a.min(b)
    }
}

/// Round half to even.
fn rint(x: f64) -> f64 {
    let r = x.round();
    if (r - x).abs() == 0.5 && r % 2.0 != 0.0 {
        r - x.signum()
    } else {
        r
    }
}

/// `Math.round`: the closest integer, ties toward positive infinity.
fn round_half_up(x: f64) -> f64 {
    let floor = x.floor();
    if x - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn string_hash_and_compare_follow_java() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("hello"), 99_162_322);
        assert_eq!(compare_strings("apple", "banana"), -1);
        assert_eq!(compare_strings("ab", "abc"), -1);
        assert_eq!(compare_strings("b", "a"), 1);
    }

    #[test]
    fn unit_search_handles_edges() {
        let hay = units("banana");
        assert_eq!(find_units(&hay, &units("an"), 0), Some(1));
        assert_eq!(find_units(&hay, &units("an"), 2), Some(3));
        assert_eq!(rfind_units(&hay, &units("an")), Some(3));
        assert_eq!(find_units(&hay, &units(""), 10), Some(6));
        assert_eq!(find_units(&hay, &units("bananas"), 0), None);
    }

    #[test]
    fn rounding_matches_math() {
        assert_eq!(rint(2.5), 2.0);
        assert_eq!(rint(-2.5), -2.0);
        assert_eq!(rint(3.5), 4.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(0.49999999999999994), 0.0);
        assert_eq!(java_max(-0.0, 0.0).to_bits(), 0.0f64.to_bits());
        assert!(java_min(1.0, f64::NAN).is_nan());
    }
}
