//! Runtime values and heap objects.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use dj_core::PrimitiveType;
use dj_types::Type;

pub type ObjectRef = Rc<Object>;

/// A Java value. References compare by identity.
#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    /// UTF-16 code unit.
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Ref(ObjectRef),
}

impl Value {
    /// Zero value of a field or array element of type `ty`.
    pub fn default_for(ty: &Type) -> Value {
        match ty {
            Type::Primitive(p) => match p {
                PrimitiveType::Boolean => Value::Boolean(false),
                PrimitiveType::Byte => Value::Byte(0),
                PrimitiveType::Short => Value::Short(0),
                PrimitiveType::Char => Value::Char(0),
                PrimitiveType::Int => Value::Int(0),
                PrimitiveType::Long => Value::Long(0),
                PrimitiveType::Float => Value::Float(0.0),
                PrimitiveType::Double => Value::Double(0.0),
            },
            _ => Value::Null,
        }
    }

    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        Some(match self {
            Value::Boolean(_) => PrimitiveType::Boolean,
            Value::Byte(_) => PrimitiveType::Byte,
            Value::Short(_) => PrimitiveType::Short,
            Value::Char(_) => PrimitiveType::Char,
            Value::Int(_) => PrimitiveType::Int,
            Value::Long(_) => PrimitiveType::Long,
            Value::Float(_) => PrimitiveType::Float,
            Value::Double(_) => PrimitiveType::Double,
            Value::Null | Value::Ref(_) => return None,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Ref(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral value widened to `i64`; `char` counts as integral.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Byte(v) => Some(i64::from(v)),
            Value::Short(v) => Some(i64::from(v)),
            Value::Char(v) => Some(i64::from(v)),
            Value::Int(v) => Some(i64::from(v)),
            Value::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(f64::from(v)),
            Value::Double(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// The `int` value of an `int`-or-narrower operand.
    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Value::Byte(v) => Some(i32::from(v)),
            Value::Short(v) => Some(i32::from(v)),
            Value::Char(v) => Some(i32::from(v)),
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Contents of a `java.lang.String` reference.
    pub fn as_string(&self) -> Option<String> {
        self.as_object().and_then(|obj| obj.string_value())
    }

    /// Identity for references, value equality for primitives.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Ref(a), Value::Ref(b)) => Rc::ptr_eq(a, b),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            _ => false,
        }
    }

    /// Dynamic type of the value, as seen by casts and `instanceof`.
    pub fn runtime_type(&self) -> Type {
        match self {
            Value::Null => Type::Null,
            Value::Ref(obj) => obj.runtime_type(),
            other => other
                .primitive_type()
                .map_or(Type::Unknown, Type::Primitive),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "(byte) {v}"),
            Value::Short(v) => write!(f, "(short) {v}"),
            Value::Char(v) => write!(f, "'{}'", char_from_unit(*v)),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}L"),
            Value::Float(v) => write!(f, "{v}f"),
            Value::Double(v) => write!(f, "{v}d"),
            Value::Ref(obj) => write!(f, "{obj:?}"),
        }
    }
}

pub(crate) fn char_from_unit(unit: u16) -> char {
    char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Java streams a `PrintStream` object writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Out,
    Err,
}

/// State of objects whose behaviour is implemented natively.
#[derive(Debug)]
pub enum NativeState {
    /// Plain instance of a source class.
    None,
    Str(String),
    Array { elem: Type, items: Vec<Value> },
    Boxed(Value),
    Builder(String),
    List(Vec<Value>),
    Iter { list: ObjectRef, cursor: usize },
    Stream(Stream),
    Throwable(ThrowableState),
}

#[derive(Debug, Clone, Default)]
pub struct ThrowableState {
    pub message: Option<String>,
    pub cause: Option<ObjectRef>,
    /// `Class.method` frames captured when the throwable was created, innermost first.
    pub trace: Vec<String>,
}

/// A heap object: a class name, source-declared fields and native state.
pub struct Object {
    class: String,
    id: u32,
    fields: RefCell<HashMap<String, Value>>,
    state: RefCell<NativeState>,
}

impl Object {
    pub(crate) fn new(class: impl Into<String>, id: u32, state: NativeState) -> Self {
        Self {
            class: class.into(),
            id,
            fields: RefCell::new(HashMap::new()),
            state: RefCell::new(state),
        }
    }

    /// Binary name of the runtime class.
    pub fn class_name(&self) -> &str {
        &self.class
    }

    /// Identity hash code.
    pub fn identity(&self) -> i32 {
        (self.id.wrapping_mul(0x9E37_79B9) >> 1) as i32
    }

    pub fn state(&self) -> Ref<'_, NativeState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, NativeState> {
        self.state.borrow_mut()
    }

    pub(crate) fn set_state(&self, state: NativeState) {
        *self.state.borrow_mut() = state;
    }

    pub fn field(&self, owner: &str, name: &str) -> Option<Value> {
        self.fields.borrow().get(&field_key(owner, name)).cloned()
    }

    pub fn set_field(&self, owner: &str, name: &str, value: Value) {
        self.fields.borrow_mut().insert(field_key(owner, name), value);
    }

    pub fn string_value(&self) -> Option<String> {
        match &*self.state.borrow() {
            NativeState::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(&*self.state.borrow(), NativeState::Array { .. })
    }

    pub fn array_len(&self) -> Option<usize> {
        match &*self.state.borrow() {
            NativeState::Array { items, .. } => Some(items.len()),
            _ => None,
        }
    }

    pub fn runtime_type(&self) -> Type {
        match &*self.state.borrow() {
            NativeState::Array { elem, .. } => Type::array(elem.clone()),
            _ => Type::class(self.class.clone(), Vec::new()),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.borrow() {
            NativeState::Str(s) => write!(f, "{s:?}"),
            NativeState::Boxed(v) => write!(f, "{}({v:?})", dj_types::simple_name(&self.class)),
            NativeState::Array { elem, items } => write!(f, "{elem}[{}]", items.len()),
            _ => write!(f, "{}@{:x}", dj_types::source_name(&self.class), self.identity()),
        }
    }
}

fn field_key(owner: &str, name: &str) -> String {
    format!("{owner}#{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dj_types::names;

    #[test]
    fn references_compare_by_identity() {
        let a = Value::Ref(Rc::new(Object::new(names::STRING, 1, NativeState::Str("x".into()))));
        let b = Value::Ref(Rc::new(Object::new(names::STRING, 2, NativeState::Str("x".into()))));
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert_eq!(a.as_string().as_deref(), Some("x"));
    }

    #[test]
    fn defaults_follow_the_declared_type() {
        assert_eq!(Value::default_for(&Type::INT), Value::Int(0));
        assert_eq!(Value::default_for(&Type::BOOLEAN), Value::Boolean(false));
        assert_eq!(Value::default_for(&Type::string()), Value::Null);
        assert!(Value::Char(65).as_int() == Some(65));
    }
}
