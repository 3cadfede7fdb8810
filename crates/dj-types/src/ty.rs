use std::collections::HashMap;
use std::fmt;

use dj_core::PrimitiveType;
use serde::Serialize;

pub mod names {
    pub const OBJECT: &str = "java.lang.Object";
    pub const STRING: &str = "java.lang.String";
    pub const CLONEABLE: &str = "java.lang.Cloneable";
    pub const SERIALIZABLE: &str = "java.io.Serializable";
    pub const ITERABLE: &str = "java.lang.Iterable";
    pub const ITERATOR: &str = "java.util.Iterator";
    pub const THROWABLE: &str = "java.lang.Throwable";
    pub const EXCEPTION: &str = "java.lang.Exception";
    pub const RUNTIME_EXCEPTION: &str = "java.lang.RuntimeException";
    pub const ERROR: &str = "java.lang.Error";
    pub const NUMBER: &str = "java.lang.Number";
    pub const COMPARABLE: &str = "java.lang.Comparable";
    pub const STRING_BUILDER: &str = "java.lang.StringBuilder";
}

/// A Java type as seen by the checker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    Primitive(PrimitiveType),
    Void,
    /// The type of the `null` literal.
    Null,
    Class(ClassType),
    Array(Box<Type>),
    TypeVar(TypeVar),
    Wildcard(WildcardBound),
    /// Produced after an error so one mistake does not cascade.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ClassType {
    /// Binary name, e.g. `java.util.Map$Entry`.
    pub name: String,
    /// Type arguments; empty for non-generic and raw uses.
    pub args: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TypeVar {
    pub name: String,
    /// First declared bound, or `Object`.
    pub bound: Box<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum WildcardBound {
    Unbounded,
    Extends(Box<Type>),
    Super(Box<Type>),
}

impl Type {
    pub fn class(name: impl Into<String>, args: Vec<Type>) -> Type {
        Type::Class(ClassType {
            name: name.into(),
            args,
        })
    }

    pub fn object() -> Type {
        Type::class(names::OBJECT, Vec::new())
    }

    pub fn string() -> Type {
        Type::class(names::STRING, Vec::new())
    }

    pub fn array(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn type_var(name: impl Into<String>, bound: Type) -> Type {
        Type::TypeVar(TypeVar {
            name: name.into(),
            bound: Box::new(bound),
        })
    }

    pub const INT: Type = Type::Primitive(PrimitiveType::Int);
    pub const LONG: Type = Type::Primitive(PrimitiveType::Long);
    pub const FLOAT: Type = Type::Primitive(PrimitiveType::Float);
    pub const DOUBLE: Type = Type::Primitive(PrimitiveType::Double);
    pub const BOOLEAN: Type = Type::Primitive(PrimitiveType::Boolean);
    pub const CHAR: Type = Type::Primitive(PrimitiveType::Char);

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Primitive(_))
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            Type::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Type::Class(_) | Type::Array(_) | Type::TypeVar(_) | Type::Null
        )
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveType::Boolean))
    }

    pub fn is_class(&self, name: &str) -> bool {
        matches!(self, Type::Class(c) if c.name == name)
    }

    pub fn is_string(&self) -> bool {
        self.is_class(names::STRING)
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Class(c) => Some(&c.name),
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Replaces type variables with their bounds and drops type arguments.
    pub fn erasure(&self) -> Type {
        match self {
            Type::Class(c) => Type::class(c.name.clone(), Vec::new()),
            Type::Array(elem) => Type::array(elem.erasure()),
            Type::TypeVar(tv) => tv.bound.erasure(),
            Type::Wildcard(WildcardBound::Extends(bound)) => bound.erasure(),
            Type::Wildcard(_) => Type::object(),
            other => other.clone(),
        }
    }

    /// The class a member lookup on this type should start from.
    pub fn lookup_class(&self) -> Option<ClassType> {
        match self {
            Type::Class(c) => Some(c.clone()),
            Type::TypeVar(tv) => tv.bound.lookup_class(),
            Type::Wildcard(WildcardBound::Extends(bound)) => bound.lookup_class(),
            Type::Wildcard(_) => Some(ClassType {
                name: names::OBJECT.to_string(),
                args: Vec::new(),
            }),
            Type::Array(_) => Some(ClassType {
                name: names::OBJECT.to_string(),
                args: Vec::new(),
            }),
            _ => None,
        }
    }

    /// Replaces type variables named in `map`.
    pub fn substitute(&self, map: &HashMap<String, Type>) -> Type {
        if map.is_empty() {
            return self.clone();
        }
        match self {
            Type::TypeVar(tv) => map.get(&tv.name).cloned().unwrap_or_else(|| self.clone()),
            Type::Class(c) => Type::class(
                c.name.clone(),
                c.args.iter().map(|a| a.substitute(map)).collect(),
            ),
            Type::Array(elem) => Type::array(elem.substitute(map)),
            Type::Wildcard(WildcardBound::Extends(b)) => {
                Type::Wildcard(WildcardBound::Extends(Box::new(b.substitute(map))))
            }
            Type::Wildcard(WildcardBound::Super(b)) => {
                Type::Wildcard(WildcardBound::Super(Box::new(b.substitute(map))))
            }
            other => other.clone(),
        }
    }

    pub fn has_type_vars(&self) -> bool {
        match self {
            Type::TypeVar(_) => true,
            Type::Class(c) => c.args.iter().any(Type::has_type_vars),
            Type::Array(elem) => elem.has_type_vars(),
            Type::Wildcard(WildcardBound::Extends(b) | WildcardBound::Super(b)) => {
                b.has_type_vars()
            }
            _ => false,
        }
    }

    /// Erased source name used in member signatures, e.g. `java.lang.String[]`.
    pub fn signature_name(&self) -> String {
        match self.erasure() {
            Type::Primitive(p) => p.keyword().to_string(),
            Type::Class(c) => c.name,
            Type::Array(elem) => format!("{}[]", elem.signature_name()),
            Type::Void => "void".to_string(),
            _ => names::OBJECT.to_string(),
        }
    }

    /// Type used to read a value of a wildcard-typed expression.
    pub fn upper_bound(&self) -> Type {
        match self {
            Type::Wildcard(WildcardBound::Extends(b)) => (**b).clone(),
            Type::Wildcard(_) => Type::object(),
            other => other.clone(),
        }
    }
}

/// Binary class name as written in source: `java.util.Map$Entry` becomes `java.util.Map.Entry`.
pub fn source_name(binary: &str) -> String {
    binary.replace('$', ".")
}

/// Simple name of a binary class name.
pub fn simple_name(binary: &str) -> &str {
    let start = binary.rfind(['.', '$']).map_or(0, |i| i + 1);
    &binary[start..]
}

/// Package of a binary class name; empty for the default package.
pub fn package_of(binary: &str) -> &str {
    binary.rfind('.').map_or("", |i| &binary[..i])
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{p}"),
            Type::Void => f.write_str("void"),
            Type::Null => f.write_str("null"),
            Type::Class(c) => {
                f.write_str(&source_name(&c.name))?;
                if !c.args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in c.args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            Type::Array(elem) => write!(f, "{elem}[]"),
            Type::TypeVar(tv) => f.write_str(&tv.name),
            Type::Wildcard(WildcardBound::Unbounded) => f.write_str("?"),
            Type::Wildcard(WildcardBound::Extends(b)) => write!(f, "? extends {b}"),
            Type::Wildcard(WildcardBound::Super(b)) => write!(f, "? super {b}"),
            Type::Unknown => f.write_str("<unknown>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_and_erasure() {
        let list = Type::class(
            "java.util.List",
            vec![Type::Wildcard(WildcardBound::Extends(Box::new(
                Type::type_var("T", Type::object()),
            )))],
        );
        assert_eq!(list.to_string(), "java.util.List<? extends T>");
        assert_eq!(list.erasure(), Type::class("java.util.List", Vec::new()));
        assert_eq!(Type::array(Type::INT).signature_name(), "int[]");
        assert_eq!(
            Type::class("java.util.Map$Entry", Vec::new()).to_string(),
            "java.util.Map.Entry"
        );
    }

    #[test]
    fn substitution_replaces_named_vars() {
        let t = Type::type_var("E", Type::object());
        let map = HashMap::from([("E".to_string(), Type::string())]);
        assert_eq!(Type::array(t).substitute(&map), Type::array(Type::string()));
    }

    #[test]
    fn name_helpers() {
        assert_eq!(simple_name("java.util.Map$Entry"), "Entry");
        assert_eq!(package_of("java.util.Map$Entry"), "java.util");
        assert_eq!(package_of("Foo"), "");
    }
}
