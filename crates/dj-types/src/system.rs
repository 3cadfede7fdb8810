//! Subtyping, conversions and numeric promotion.
//!
//! Every query takes the library it should resolve class names against, so the same rules
//! serve source classes, classpath classes and built-in JDK signatures alike.

use std::collections::{HashSet, VecDeque};

use dj_core::PrimitiveType;

use crate::library::Library;
use crate::ty::{names, ClassType, Type, WildcardBound};

/// Direct supertypes of `ty` with type arguments substituted. Raw types see erased
/// supertypes. Every type except `Object` itself has at least `Object` above it.
pub fn direct_supertypes(env: &dyn Library, ty: &ClassType) -> Vec<ClassType> {
    let mut out = Vec::new();
    let Some(def) = env.lookup_class(&ty.name) else {
        return out;
    };
    let raw = ty.args.is_empty() && !def.type_params.is_empty();
    let subst = def.substitution(&ty.args);
    let instantiate = |t: &Type| {
        let t = if raw { t.erasure() } else { t.substitute(&subst) };
        match t {
            Type::Class(c) => Some(c),
            _ => None,
        }
    };
    if let Some(sup) = def.super_class.as_ref().and_then(instantiate) {
        out.push(sup);
    }
    out.extend(def.interfaces.iter().filter_map(instantiate));
    if def.super_class.is_none() && def.name != names::OBJECT {
        out.push(ClassType {
            name: names::OBJECT.to_string(),
            args: Vec::new(),
        });
    }
    out
}

/// All supertypes of `ty`, including `ty`, nearest first.
pub fn supertypes(env: &dyn Library, ty: &ClassType) -> Vec<ClassType> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([ty.clone()]);
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.name.clone()) {
            continue;
        }
        queue.extend(direct_supertypes(env, &current));
        out.push(current);
    }
    out
}

/// Views `ty` as an instance of the class or interface `target`, e.g. `ArrayList<String>` as
/// `Iterable<String>`.
pub fn as_super(env: &dyn Library, ty: &ClassType, target: &str) -> Option<ClassType> {
    if ty.name == target {
        return Some(ty.clone());
    }
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([ty.clone()]);
    while let Some(current) = queue.pop_front() {
        if current.name == target {
            return Some(current);
        }
        if !seen.insert(current.name.clone()) {
            continue;
        }
        queue.extend(direct_supertypes(env, &current));
    }
    None
}

pub fn is_subtype(env: &dyn Library, sub: &Type, sup: &Type) -> bool {
    if sub == sup || sub.is_unknown() || sup.is_unknown() {
        return true;
    }
    match (sub, sup) {
        (Type::Null, sup) => sup.is_reference(),
        (sub, Type::Class(c)) if c.name == names::OBJECT && c.args.is_empty() => {
            sub.is_reference()
        }
        (Type::TypeVar(a), Type::TypeVar(b)) if a.name == b.name => true,
        (Type::TypeVar(tv), sup) => is_subtype(env, &tv.bound, sup),
        (Type::Array(a), Type::Array(b)) => {
            if a.is_primitive() || b.is_primitive() {
                a == b
            } else {
                is_subtype(env, a, b)
            }
        }
        (Type::Array(_), Type::Class(c)) => {
            c.name == names::CLONEABLE || c.name == names::SERIALIZABLE
        }
        (Type::Class(a), Type::Class(b)) => {
            let Some(inst) = as_super(env, a, &b.name) else {
                return false;
            };
            if b.args.is_empty() || inst.args.is_empty() {
                return true;
            }
            inst.args.len() == b.args.len()
                && inst
                    .args
                    .iter()
                    .zip(&b.args)
                    .all(|(arg, pattern)| contains(env, arg, pattern))
        }
        _ => false,
    }
}

/// Type argument containment: does `pattern` admit `arg`?
fn contains(env: &dyn Library, arg: &Type, pattern: &Type) -> bool {
    match pattern {
        Type::Wildcard(WildcardBound::Unbounded) => true,
        Type::Wildcard(WildcardBound::Extends(bound)) => {
            is_subtype(env, &arg.upper_bound(), bound)
        }
        Type::Wildcard(WildcardBound::Super(bound)) => match arg {
            Type::Wildcard(WildcardBound::Super(lower)) => is_subtype(env, bound, lower),
            Type::Wildcard(_) => false,
            arg => is_subtype(env, bound, arg),
        },
        pattern => arg == pattern || arg.is_unknown() || pattern.is_unknown(),
    }
}

pub fn boxed(p: PrimitiveType) -> Type {
    Type::class(p.box_class(), Vec::new())
}

/// The primitive a wrapper type unboxes to.
pub fn unboxed(ty: &Type) -> Option<PrimitiveType> {
    match ty {
        Type::Class(c) => PrimitiveType::from_box_class(&c.name),
        Type::TypeVar(tv) => unboxed(&tv.bound),
        _ => None,
    }
}

/// Assignment conversion without constant narrowing. `allow_boxing` gates boxing and
/// unboxing conversions.
pub fn is_assignable(env: &dyn Library, from: &Type, to: &Type, allow_boxing: bool) -> bool {
    if from == to || from.is_unknown() || to.is_unknown() {
        return true;
    }
    match (from, to) {
        (Type::Void, _) | (_, Type::Void) => false,
        (Type::Primitive(a), Type::Primitive(b)) => a.widens_to(*b),
        (Type::Primitive(a), to) => allow_boxing && is_subtype(env, &boxed(*a), to),
        (from, Type::Primitive(b)) => {
            allow_boxing && unboxed(from).is_some_and(|p| p.widens_to(*b))
        }
        _ => is_subtype(env, from, to),
    }
}

/// Whether the `int` constant `value` may be assigned to `to` by narrowing (JLS 5.2).
pub fn constant_fits(value: i64, to: &Type, allow_boxing: bool) -> bool {
    let fits = |p: PrimitiveType| match p {
        PrimitiveType::Byte => i8::try_from(value).is_ok(),
        PrimitiveType::Short => i16::try_from(value).is_ok(),
        PrimitiveType::Char => u16::try_from(value).is_ok(),
        _ => false,
    };
    match to {
        Type::Primitive(p) => fits(*p),
        Type::Class(c) if allow_boxing => PrimitiveType::from_box_class(&c.name).is_some_and(fits),
        _ => false,
    }
}

/// The numeric primitive behind `ty`, unboxing when allowed.
pub fn numeric_operand(ty: &Type, allow_boxing: bool) -> Option<PrimitiveType> {
    let p = match ty {
        Type::Primitive(p) => *p,
        other if allow_boxing => unboxed(other)?,
        _ => return None,
    };
    p.is_numeric().then_some(p)
}

pub fn unary_numeric_promotion(p: PrimitiveType) -> Option<PrimitiveType> {
    match p {
        PrimitiveType::Byte | PrimitiveType::Short | PrimitiveType::Char | PrimitiveType::Int => {
            Some(PrimitiveType::Int)
        }
        PrimitiveType::Long | PrimitiveType::Float | PrimitiveType::Double => Some(p),
        PrimitiveType::Boolean => None,
    }
}

/// double > float > long > int.
pub fn binary_numeric_promotion(a: PrimitiveType, b: PrimitiveType) -> Option<PrimitiveType> {
    if !a.is_numeric() || !b.is_numeric() {
        return None;
    }
    let promoted = if a == PrimitiveType::Double || b == PrimitiveType::Double {
        PrimitiveType::Double
    } else if a == PrimitiveType::Float || b == PrimitiveType::Float {
        PrimitiveType::Float
    } else if a == PrimitiveType::Long || b == PrimitiveType::Long {
        PrimitiveType::Long
    } else {
        PrimitiveType::Int
    };
    Some(promoted)
}

/// Casting conversion (JLS 5.5), checked on erasures.
pub fn is_castable(env: &dyn Library, from: &Type, to: &Type) -> bool {
    if from == to || from.is_unknown() || to.is_unknown() {
        return true;
    }
    match (from, to) {
        (Type::Void, _) | (_, Type::Void) => false,
        (Type::Primitive(a), Type::Primitive(b)) => {
            (a.is_numeric() && b.is_numeric()) || (a == b)
        }
        (Type::Primitive(a), to) => is_subtype(env, &boxed(*a), to),
        (from, Type::Primitive(b)) => match unboxed(from) {
            Some(p) => p.widens_to(*b),
            None => is_subtype(env, &boxed(*b), from),
        },
        (Type::Null, to) => to.is_reference(),
        (from, to) => reference_castable(env, &from.erasure(), &to.erasure()),
    }
}

fn reference_castable(env: &dyn Library, from: &Type, to: &Type) -> bool {
    if is_subtype(env, from, to) || is_subtype(env, to, from) {
        return true;
    }
    match (from, to) {
        (Type::Array(a), Type::Array(b)) => {
            !a.is_primitive() && !b.is_primitive() && reference_castable(env, a, b)
        }
        (Type::Class(a), Type::Class(b)) => {
            let (Some(a), Some(b)) = (env.lookup_class(&a.name), env.lookup_class(&b.name))
            else {
                return false;
            };
            match (a.is_interface(), b.is_interface()) {
                (true, true) => true,
                (true, false) => !b.modifiers.is_final(),
                (false, true) => !a.modifiers.is_final(),
                (false, false) => false,
            }
        }
        _ => false,
    }
}

/// A cast whose target cannot be verified at run time because of erasure.
pub fn is_unchecked_cast(env: &dyn Library, from: &Type, to: &Type) -> bool {
    if is_subtype(env, from, to) {
        return false;
    }
    match to {
        Type::TypeVar(_) => true,
        Type::Class(c) => c
            .args
            .iter()
            .any(|a| !matches!(a, Type::Wildcard(WildcardBound::Unbounded))),
        Type::Array(elem) => match from {
            Type::Array(from_elem) => is_unchecked_cast(env, from_elem, elem),
            _ => is_unchecked_cast(env, &Type::object(), elem),
        },
        _ => false,
    }
}

/// Element type produced by iterating `ty` in a foreach loop.
pub fn iteration_element(env: &dyn Library, ty: &Type) -> Option<Type> {
    match ty {
        Type::Array(elem) => Some((**elem).clone()),
        other => {
            let class = other.lookup_class()?;
            let iterable = as_super(env, &class, names::ITERABLE)?;
            Some(
                iterable
                    .args
                    .first()
                    .map(Type::upper_bound)
                    .unwrap_or_else(Type::object),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::ClassLibrary;
    use pretty_assertions::assert_eq;

    fn list_of(arg: Type) -> Type {
        Type::class("java.util.List", vec![arg])
    }

    #[test]
    fn generic_supertypes_substitute_arguments() {
        let env = ClassLibrary::jdk();
        let ty = ClassType {
            name: "java.util.ArrayList".into(),
            args: vec![Type::string()],
        };
        let iterable = as_super(&env, &ty, names::ITERABLE).unwrap();
        assert_eq!(iterable.args, vec![Type::string()]);
        assert_eq!(
            iteration_element(&env, &Type::Class(ty)),
            Some(Type::string())
        );
    }

    #[test]
    fn subtyping_respects_wildcards_and_raw_types() {
        let env = ClassLibrary::jdk();
        let integer = Type::class("java.lang.Integer", Vec::new());
        let number = Type::class(names::NUMBER, Vec::new());
        let extends_number = Type::Wildcard(WildcardBound::Extends(Box::new(number.clone())));

        assert!(is_subtype(&env, &list_of(integer.clone()), &list_of(extends_number)));
        assert!(!is_subtype(&env, &list_of(integer.clone()), &list_of(number.clone())));
        assert!(is_subtype(
            &env,
            &Type::class("java.util.ArrayList", Vec::new()),
            &list_of(Type::string())
        ));
        assert!(is_subtype(&env, &Type::Null, &Type::string()));
        assert!(is_subtype(&env, &Type::array(Type::string()), &Type::array(Type::object())));
        assert!(!is_subtype(&env, &Type::array(Type::INT), &Type::array(Type::LONG)));
    }

    #[test]
    fn assignment_conversions() {
        let env = ClassLibrary::jdk();
        let integer = Type::class("java.lang.Integer", Vec::new());
        assert!(is_assignable(&env, &Type::INT, &Type::DOUBLE, false));
        assert!(!is_assignable(&env, &Type::DOUBLE, &Type::INT, true));
        assert!(is_assignable(&env, &Type::INT, &integer, true));
        assert!(!is_assignable(&env, &Type::INT, &integer, false));
        assert!(is_assignable(&env, &integer, &Type::LONG, true));
        assert!(is_assignable(&env, &Type::INT, &Type::object(), true));
        assert!(constant_fits(127, &Type::Primitive(PrimitiveType::Byte), false));
        assert!(!constant_fits(128, &Type::Primitive(PrimitiveType::Byte), false));
        assert!(constant_fits(65, &Type::class("java.lang.Character", Vec::new()), true));
    }

    #[test]
    fn numeric_promotion_ladder() {
        use PrimitiveType::*;
        assert_eq!(binary_numeric_promotion(Int, Double), Some(Double));
        assert_eq!(binary_numeric_promotion(Float, Long), Some(Float));
        assert_eq!(binary_numeric_promotion(Long, Char), Some(Long));
        assert_eq!(binary_numeric_promotion(Byte, Short), Some(Int));
        assert_eq!(binary_numeric_promotion(Boolean, Int), None);
        assert_eq!(unary_numeric_promotion(Char), Some(Int));
        let integer = Type::class("java.lang.Integer", Vec::new());
        assert_eq!(numeric_operand(&integer, true), Some(Int));
        assert_eq!(numeric_operand(&integer, false), None);
        assert_eq!(numeric_operand(&Type::BOOLEAN, true), None);
    }

    #[test]
    fn casts() {
        let env = ClassLibrary::jdk();
        let string = Type::string();
        let number = Type::class(names::NUMBER, Vec::new());
        let char_seq = Type::class("java.lang.CharSequence", Vec::new());
        assert!(is_castable(&env, &Type::DOUBLE, &Type::INT));
        assert!(!is_castable(&env, &Type::BOOLEAN, &Type::INT));
        assert!(is_castable(&env, &Type::object(), &string));
        assert!(is_castable(&env, &Type::object(), &Type::INT));
        assert!(is_castable(&env, &char_seq, &number));
        // String is final and unrelated to Number.
        assert!(!is_castable(&env, &string, &number));
        assert!(is_unchecked_cast(&env, &Type::object(), &list_of(Type::string())));
        assert!(!is_unchecked_cast(&env, &Type::object(), &string));
    }
}
