//! Built-in behaviour of the JDK classes the interpreter knows.
//!
//! Natives are looked up by declaring class and member signature. Receivers are classified
//! by their [`NativeState`], so a source class extending `ArrayList` or `RuntimeException`
//! keeps the behaviour of its native superclass.

mod lang;
mod util;

use std::rc::Rc;

use dj_check::ErrorKind;
use dj_core::PrimitiveType;
use dj_types::system::is_subtype;
use dj_types::{names, simple_name, source_name, MethodRef, Type};

use crate::error::Flow;
use crate::eval::{Evaluator, Site};
use crate::value::{NativeState, ObjectRef, Stream, Value};

/// Arguments of a native call, already converted to the parameter types.
pub(crate) struct Args(Vec<Value>);

impl Args {
    pub(crate) fn value(&self, i: usize) -> Value {
        self.0.get(i).cloned().unwrap_or(Value::Null)
    }

    pub(crate) fn int(&self, i: usize) -> i32 {
        self.0.get(i).and_then(Value::as_int).unwrap_or(0)
    }

    pub(crate) fn long(&self, i: usize) -> i64 {
        self.0.get(i).and_then(Value::as_i64).unwrap_or(0)
    }

    pub(crate) fn double(&self, i: usize) -> f64 {
        self.0.get(i).and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub(crate) fn float(&self, i: usize) -> f32 {
        match self.0.get(i) {
            Some(Value::Float(f)) => *f,
            other => other.and_then(Value::as_f64).unwrap_or(0.0) as f32,
        }
    }

    pub(crate) fn char(&self, i: usize) -> u16 {
        match self.0.get(i) {
            Some(Value::Char(c)) => *c,
            other => other.and_then(Value::as_i64).unwrap_or(0) as u16,
        }
    }

    /// Contents of a `String` argument; `None` for `null`.
    pub(crate) fn string(&self, i: usize) -> Option<String> {
        self.0.get(i).and_then(Value::as_string)
    }

    pub(crate) fn object(&self, i: usize) -> Option<ObjectRef> {
        self.0.get(i).and_then(Value::as_object).cloned()
    }
}

/// `name(Simple,int[])`: the signature with simple class names, as natives are keyed.
fn short_signature(method: &MethodRef) -> String {
    let params: Vec<String> = method
        .erased_params
        .iter()
        .map(|p| simple_name(&p.signature_name()).to_string())
        .collect();
    format!("{}({})", method.name, params.join(","))
}

/// JVM descriptor of an array class, as shown by `Object.toString`: `[I`, `[Ljava.lang.String;`.
pub(crate) fn array_descriptor(elem: &Type) -> String {
    match elem {
        Type::Primitive(p) => format!("[{}", p.descriptor()),
        Type::Array(inner) => format!("[{}", array_descriptor(inner)),
        other => format!("[L{};", other.class_name().unwrap_or(names::OBJECT)),
    }
}

/// UTF-16 code units of a string.
pub(crate) fn units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

pub(crate) fn from_units(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

impl Evaluator<'_> {
    pub(crate) fn invoke_native(
        &mut self,
        method: &MethodRef,
        this: Option<ObjectRef>,
        args: Vec<Value>,
        site: Site,
    ) -> Flow<Value> {
        self.enter(&method.owner, &method.name, true)?;
        let result = self.run_native(method, this, Args(args));
        self.leave();
        match result? {
            Some(value) => Ok(value),
            None => Err(self.fail(
                ErrorKind::NativeUnavailable,
                format!("{}.{} is not implemented", simple_name(&method.owner), method.signature()),
                site,
            )),
        }
    }

    fn run_native(&mut self, method: &MethodRef, this: Option<ObjectRef>, args: Args) -> Flow<Option<Value>> {
        let sig = short_signature(method);
        tracing::trace!(target: "dj.interp", owner = %method.owner, %sig, "native call");
        if method.is_constructor() {
            return self.construct_native(&method.owner, &sig, this, &args);
        }
        if method.is_static() {
            return match method.owner.as_str() {
                names::STRING => self.string_static(&sig, &args),
                "java.lang.Integer" | "java.lang.Long" | "java.lang.Short" | "java.lang.Byte" | "java.lang.Double"
                | "java.lang.Float" | "java.lang.Boolean" => self.wrapper_static(&method.owner, &sig, &args),
                "java.lang.Character" => self.character_static(&sig, &args),
                "java.lang.Math" => self.math_static(&sig, &args),
                "java.lang.System" => self.system_static(&sig, &args),
                "java.util.Arrays" => self.arrays_static(&sig, &args),
                "java.util.Objects" => self.objects_static(&sig, &args),
                _ => Ok(None),
            };
        }
        let Some(obj) = this else {
            return Ok(None);
        };
        let handled = match StateKind::of(&obj) {
            StateKind::Str => self.string_method(&obj, &sig, &args)?,
            StateKind::Builder => self.builder_method(&obj, &sig, &args)?,
            StateKind::Boxed => self.boxed_method(&obj, &sig, &args)?,
            StateKind::List => self.list_method(&obj, &sig, &args)?,
            StateKind::Iter => self.iterator_method(&obj, &sig)?,
            StateKind::Stream => self.stream_method(&obj, &sig, &args)?,
            StateKind::Throwable => self.throwable_method(&obj, &sig)?,
            StateKind::Other => None,
        };
        match handled {
            Some(value) => Ok(Some(value)),
            None => self.object_method(&obj, &sig, &args),
        }
    }

    /// `java.lang.Object` behaviour shared by every receiver.
    fn object_method(&mut self, obj: &ObjectRef, sig: &str, args: &Args) -> Flow<Option<Value>> {
        Ok(Some(match sig {
            "equals(Object)" => Value::Boolean(args.object(0).is_some_and(|other| Rc::ptr_eq(obj, &other))),
            "hashCode()" => Value::Int(obj.identity()),
            "toString()" => {
                let class = match &*obj.state() {
                    NativeState::Array { elem, .. } => array_descriptor(elem),
                    _ => source_name(obj.class_name()),
                };
                self.new_string(format!("{class}@{:x}", obj.identity()))
            }
            _ => return Ok(None),
        }))
    }

    fn construct_native(
        &mut self,
        owner: &str,
        sig: &str,
        this: Option<ObjectRef>,
        args: &Args,
    ) -> Flow<Option<Value>> {
        let params = sig.strip_prefix("<init>").unwrap_or(sig);
        let state = match owner {
            names::OBJECT | names::NUMBER => None,
            names::STRING => Some(self.new_string_state(params, args)?),
            names::STRING_BUILDER => Some(self.new_builder_state(params, args)?),
            "java.util.ArrayList" => Some(self.new_list_state(params, args)?),
            "java.lang.Integer" | "java.lang.Long" | "java.lang.Short" | "java.lang.Byte" | "java.lang.Double"
            | "java.lang.Float" | "java.lang.Boolean" | "java.lang.Character" => Some(NativeState::Boxed(args.value(0))),
            _ if self.is_throwable(owner) => match self.new_throwable_state(owner, params, args)? {
                Some(state) => Some(state),
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
        let obj = match this {
            Some(obj) => obj,
            None => self.alloc(owner, NativeState::None),
        };
        if let Some(state) = state {
            obj.set_state(state);
        }
        Ok(Some(Value::Ref(obj)))
    }

    fn is_throwable(&self, class: &str) -> bool {
        is_subtype(
            self.env,
            &Type::class(class, Vec::new()),
            &Type::class(names::THROWABLE, Vec::new()),
        )
    }

    /// Static fields of built-in classes.
    pub(crate) fn native_static_field(&mut self, owner: &str, name: &str) -> Option<Value> {
        let value = match (owner, name) {
            ("java.lang.System", "out") => return Some(self.stream(Stream::Out)),
            ("java.lang.System", "err") => return Some(self.stream(Stream::Err)),
            ("java.lang.Integer", "MAX_VALUE") => Value::Int(i32::MAX),
            ("java.lang.Integer", "MIN_VALUE") => Value::Int(i32::MIN),
            ("java.lang.Long", "MAX_VALUE") => Value::Long(i64::MAX),
            ("java.lang.Long", "MIN_VALUE") => Value::Long(i64::MIN),
            ("java.lang.Short", "MAX_VALUE") => Value::Short(i16::MAX),
            ("java.lang.Short", "MIN_VALUE") => Value::Short(i16::MIN),
            ("java.lang.Byte", "MAX_VALUE") => Value::Byte(i8::MAX),
            ("java.lang.Byte", "MIN_VALUE") => Value::Byte(i8::MIN),
            ("java.lang.Character", "MAX_VALUE") => Value::Char(u16::MAX),
            ("java.lang.Character", "MIN_VALUE") => Value::Char(0),
            ("java.lang.Double", "MAX_VALUE") => Value::Double(f64::MAX),
            ("java.lang.Double", "MIN_VALUE") => Value::Double(f64::from_bits(1)),
            ("java.lang.Double", "POSITIVE_INFINITY") => Value::Double(f64::INFINITY),
            ("java.lang.Double", "NEGATIVE_INFINITY") => Value::Double(f64::NEG_INFINITY),
            ("java.lang.Double", "NaN") => Value::Double(f64::NAN),
            ("java.lang.Float", "MAX_VALUE") => Value::Float(f32::MAX),
            ("java.lang.Float", "MIN_VALUE") => Value::Float(f32::from_bits(1)),
            ("java.lang.Boolean", "TRUE") => return Some(self.box_value(Value::Boolean(true))),
            ("java.lang.Boolean", "FALSE") => return Some(self.box_value(Value::Boolean(false))),
            ("java.lang.Math", "PI") => Value::Double(std::f64::consts::PI),
            ("java.lang.Math", "E") => Value::Double(std::f64::consts::E),
            _ => return None,
        };
        Some(value)
    }

    /// `a.equals(b)` with the receiver's own `equals`.
    pub(crate) fn java_equals(&mut self, a: &Value, b: &Value) -> Flow<bool> {
        let a = match a {
            Value::Null => return Ok(b.is_null()),
            Value::Ref(obj) => Rc::clone(obj),
            primitive => match self.box_value(primitive.clone()) {
                Value::Ref(obj) => obj,
                _ => return Ok(false),
            },
        };
        let b = self.coerce(b.clone(), &Type::object());
        let result = self.call_method(&a, names::OBJECT, "equals", vec![b])?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub(crate) fn java_hash(&mut self, value: &Value) -> Flow<i32> {
        let obj = match value {
            Value::Null => return Ok(0),
            Value::Ref(obj) => Rc::clone(obj),
            primitive => return Ok(primitive_hash(primitive)),
        };
        let result = self.call_method(&obj, names::OBJECT, "hashCode", Vec::new())?;
        Ok(result.as_int().unwrap_or(0))
    }

    /// Text of a `String` or `StringBuilder`; `None` for anything else.
    pub(crate) fn char_sequence(&self, value: &Value) -> Option<String> {
        let obj = value.as_object()?;
        let text = match &*obj.state() {
            NativeState::Str(s) | NativeState::Builder(s) => s.clone(),
            _ => return None,
        };
        Some(text)
    }

    /// Elements of an `ArrayList` or of an array.
    pub(crate) fn collection_items(&self, value: &Value) -> Option<Vec<Value>> {
        let obj = value.as_object()?;
        let items = match &*obj.state() {
            NativeState::List(items) | NativeState::Array { items, .. } => items.clone(),
            _ => return None,
        };
        Some(items)
    }

    pub(crate) fn index_out_of_bounds(&mut self, class: &str, index: i64, len: usize) -> crate::error::Interrupt {
        self.throw_new(class, Some(format!("Index {index} out of bounds for length {len}")))
    }
}

/// `hashCode()` of the wrapper of a primitive.
pub(crate) fn primitive_hash(value: &Value) -> i32 {
    match *value {
        Value::Boolean(b) => {
            if b {
                1231
            } else {
                1237
            }
        }
        Value::Byte(v) => i32::from(v),
        Value::Short(v) => i32::from(v),
        Value::Char(v) => i32::from(v),
        Value::Int(v) => v,
        Value::Long(v) => (v ^ ((v as u64) >> 32) as i64) as i32,
        Value::Float(v) => canonical_f32(v).to_bits() as i32,
        Value::Double(v) => {
            let bits = canonical_f64(v).to_bits();
            (bits ^ (bits >> 32)) as i32
        }
        Value::Null | Value::Ref(_) => 0,
    }
}

/// All NaNs collapse to one, as `Double.doubleToLongBits` does.
pub(crate) fn canonical_f64(v: f64) -> f64 {
    if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

pub(crate) fn canonical_f32(v: f32) -> f32 {
    if v.is_nan() {
        f32::NAN
    } else {
        v
    }
}

/// `Double.compare`: `-0.0` sorts before `0.0` and NaN after everything.
pub(crate) fn compare_doubles(a: f64, b: f64) -> std::cmp::Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// Primitive kind a wrapper class holds.
pub(crate) fn wrapper_primitive(class: &str) -> Option<PrimitiveType> {
    Some(match class {
        "java.lang.Boolean" => PrimitiveType::Boolean,
        "java.lang.Byte" => PrimitiveType::Byte,
        "java.lang.Short" => PrimitiveType::Short,
        "java.lang.Character" => PrimitiveType::Char,
        "java.lang.Integer" => PrimitiveType::Int,
        "java.lang.Long" => PrimitiveType::Long,
        "java.lang.Float" => PrimitiveType::Float,
        "java.lang.Double" => PrimitiveType::Double,
        _ => return None,
    })
}

enum StateKind {
    Str,
    Builder,
    Boxed,
    List,
    Iter,
    Stream,
    Throwable,
    Other,
}

impl StateKind {
    fn of(obj: &ObjectRef) -> Self {
        match &*obj.state() {
            NativeState::Str(_) => StateKind::Str,
            NativeState::Builder(_) => StateKind::Builder,
            NativeState::Boxed(_) => StateKind::Boxed,
            NativeState::List(_) => StateKind::List,
            NativeState::Iter { .. } => StateKind::Iter,
            NativeState::Stream(_) => StateKind::Stream,
            NativeState::Throwable(_) => StateKind::Throwable,
            NativeState::None | NativeState::Array { .. } => StateKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn array_descriptors_follow_the_jvm() {
        assert_eq!(array_descriptor(&Type::INT), "[I");
        assert_eq!(array_descriptor(&Type::string()), "[Ljava.lang.String;");
        assert_eq!(array_descriptor(&Type::array(Type::DOUBLE)), "[[D");
    }

    #[test]
    fn wrapper_hashes_match_java() {
        assert_eq!(primitive_hash(&Value::Boolean(true)), 1231);
        assert_eq!(primitive_hash(&Value::Long(1 << 32)), 1);
        assert_eq!(primitive_hash(&Value::Double(1.0)), 1_072_693_248);
        assert_eq!(compare_doubles(-0.0, 0.0), std::cmp::Ordering::Less);
        assert_eq!(compare_doubles(f64::NAN, f64::INFINITY), std::cmp::Ordering::Greater);
    }
}
