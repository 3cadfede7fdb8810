//! Field lookup and method/constructor overload resolution.

use std::collections::HashMap;

use thiserror::Error;

use crate::class::{ClassDef, FieldRef, MethodDef, MethodRef};
use crate::library::Library;
use crate::system::{boxed, is_assignable, is_subtype, supertypes};
use crate::ty::{ClassType, Type};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no applicable member")]
    NotFound,
    #[error("ambiguous reference, {} candidates", .0.len())]
    Ambiguous(Vec<MethodRef>),
}

/// Finds the field `name` visible through `receiver`, nearest declaration first.
pub fn find_field(env: &dyn Library, receiver: &Type, name: &str) -> Option<FieldRef> {
    let start = receiver.lookup_class()?;
    for ty in supertypes(env, &start) {
        let Some(def) = env.lookup_class(&ty.name) else {
            continue;
        };
        if let Some(field) = def.field(name) {
            let subst = def.substitution(&ty.args);
            return Some(FieldRef {
                owner: def.name.clone(),
                name: field.name.clone(),
                ty: field.ty.substitute(&subst),
                modifiers: field.modifiers,
                decl: field.decl,
            });
        }
    }
    None
}

fn method_ref(def: &ClassDef, ty: &ClassType, method: &MethodDef) -> MethodRef {
    let raw = ty.args.is_empty() && !def.type_params.is_empty();
    let subst = def.substitution(&ty.args);
    let instantiate = |t: &Type| if raw { t.erasure() } else { t.substitute(&subst) };
    MethodRef {
        owner: def.name.clone(),
        owner_kind: def.kind,
        name: method.name.clone(),
        erased_params: method.params.iter().map(Type::erasure).collect(),
        params: method.params.iter().map(instantiate).collect(),
        return_ty: instantiate(&method.return_ty),
        modifiers: method.modifiers,
        decl: method.decl,
        origin: def.origin,
        var_args_call: false,
    }
}

/// Every method named `name` visible through `receiver`, instantiated for it. Methods
/// overridden lower in the hierarchy hide the ones they override.
pub fn candidate_methods(env: &dyn Library, receiver: &Type, name: &str) -> Vec<MethodRef> {
    let Some(start) = receiver.lookup_class() else {
        return Vec::new();
    };
    let mut out: Vec<MethodRef> = Vec::new();
    for ty in supertypes(env, &start) {
        let Some(def) = env.lookup_class(&ty.name) else {
            continue;
        };
        for method in def.methods_named(name) {
            let candidate = method_ref(&def, &ty, method);
            let sig = candidate.signature();
            let hidden_by = out
                .iter_mut()
                .find(|m| m.signature() == sig || m.params == candidate.params);
            match hidden_by {
                // An abstract declaration seen first gives way to an inherited implementation.
                Some(existing) if existing.is_abstract() && !candidate.is_abstract() => {
                    let owner_is_class = !def.is_interface();
                    if owner_is_class {
                        *existing = candidate;
                    }
                }
                Some(_) => {}
                None => out.push(candidate),
            }
        }
    }
    out
}

/// Resolves `receiver.name(args)`.
pub fn resolve_method(
    env: &dyn Library,
    receiver: &Type,
    name: &str,
    args: &[Type],
    allow_boxing: bool,
) -> Result<MethodRef, LookupError> {
    let candidates = candidate_methods(env, receiver, name);
    tracing::trace!(
        target: "dj.types",
        method = name,
        candidates = candidates.len(),
        "resolving method"
    );
    select_overload(env, candidates, args, allow_boxing)
}

/// Resolves `new C(args)` against the constructors declared by `class`.
pub fn resolve_constructor(
    env: &dyn Library,
    class: &ClassType,
    args: &[Type],
    allow_boxing: bool,
) -> Result<MethodRef, LookupError> {
    let Some(def) = env.lookup_class(&class.name) else {
        return Err(LookupError::NotFound);
    };
    let candidates = def
        .constructors
        .iter()
        .map(|ctor| method_ref(&def, class, ctor))
        .collect();
    select_overload(env, candidates, args, allow_boxing)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Strict,
    Loose,
    VarArgs,
}

/// Parameter types a call with `arity` arguments sees, expanding a trailing varargs array.
fn expanded_params(method: &MethodRef, arity: usize, phase: Phase) -> Option<Vec<Type>> {
    if phase != Phase::VarArgs {
        return (method.params.len() == arity).then(|| method.params.clone());
    }
    let (last, fixed) = method.params.split_last()?;
    let elem = last.element_type()?;
    if !method.is_var_args() || arity < fixed.len() {
        return None;
    }
    let mut params = fixed.to_vec();
    params.resize(arity, elem.clone());
    Some(params)
}

fn applicable(
    env: &dyn Library,
    method: &MethodRef,
    args: &[Type],
    phase: Phase,
    allow_boxing: bool,
) -> bool {
    let Some(params) = expanded_params(method, args.len(), phase) else {
        return false;
    };
    let boxing = allow_boxing && phase != Phase::Strict;
    args.iter()
        .zip(&params)
        .all(|(arg, param)| is_assignable(env, arg, &param_target(param), boxing))
}

/// Type variables left in a parameter belong to the method or to an unknown instantiation;
/// arguments are checked against the erasure.
fn param_target(param: &Type) -> Type {
    if param.has_type_vars() {
        param.erasure()
    } else {
        param.upper_bound()
    }
}

fn more_specific(
    env: &dyn Library,
    a: &MethodRef,
    b: &MethodRef,
    arity: usize,
    phase: Phase,
) -> bool {
    let (Some(pa), Some(pb)) = (
        expanded_params(a, arity, phase),
        expanded_params(b, arity, phase),
    ) else {
        return false;
    };
    pa.iter()
        .zip(&pb)
        .all(|(x, y)| is_assignable(env, x, y, false))
}

/// Chooses among `candidates` in three phases: exact/widening, then boxing (when allowed),
/// then variable arity. Within a phase the most specific method wins.
pub fn select_overload(
    env: &dyn Library,
    candidates: Vec<MethodRef>,
    args: &[Type],
    allow_boxing: bool,
) -> Result<MethodRef, LookupError> {
    let phases: &[Phase] = if allow_boxing {
        &[Phase::Strict, Phase::Loose, Phase::VarArgs]
    } else {
        &[Phase::Strict, Phase::VarArgs]
    };
    for &phase in phases {
        let matching: Vec<&MethodRef> = candidates
            .iter()
            .filter(|m| applicable(env, m, args, phase, allow_boxing))
            .collect();
        if matching.is_empty() {
            continue;
        }
        let maximal: Vec<&MethodRef> = matching
            .iter()
            .copied()
            .filter(|m| {
                matching.iter().all(|other| {
                    std::ptr::eq(*m, *other) || more_specific(env, m, other, args.len(), phase)
                })
            })
            .collect();
        let chosen = match maximal.as_slice() {
            [single] => *single,
            [] => {
                return Err(LookupError::Ambiguous(
                    matching.into_iter().cloned().collect(),
                ))
            }
            several => pick_among_equivalent(env, several).ok_or_else(|| {
                LookupError::Ambiguous(several.iter().map(|m| (*m).clone()).collect())
            })?,
        };
        let mut chosen = infer_method_type_args(chosen.clone(), args);
        chosen.var_args_call = phase == Phase::VarArgs;
        return Ok(chosen);
    }
    Err(LookupError::NotFound)
}

/// Several maximally specific methods with the same signature: prefer a concrete one, then
/// the one declared lowest in the hierarchy.
fn pick_among_equivalent<'a>(env: &dyn Library, several: &[&'a MethodRef]) -> Option<&'a MethodRef> {
    let sig = several[0].erased_params.clone();
    if several.iter().any(|m| m.erased_params != sig) {
        return None;
    }
    let concrete: Vec<&MethodRef> = several.iter().copied().filter(|m| !m.is_abstract()).collect();
    let pool = if concrete.is_empty() { several.to_vec() } else { concrete };
    pool.iter()
        .copied()
        .find(|m| {
            let owner = Type::class(m.owner.clone(), Vec::new());
            pool.iter().all(|other| {
                is_subtype(env, &owner, &Type::class(other.owner.clone(), Vec::new()))
            })
        })
        .or_else(|| pool.first().copied())
}

/// Infers a method type variable from the first argument passed for a parameter of exactly
/// that type; other type variables fall back to their bounds.
fn infer_method_type_args(mut method: MethodRef, args: &[Type]) -> MethodRef {
    let mut inferred: HashMap<String, Type> = HashMap::new();
    for (param, arg) in method.params.iter().zip(args) {
        if let Type::TypeVar(tv) = param {
            if !inferred.contains_key(&tv.name) && !arg.is_unknown() {
                let arg = match arg {
                    Type::Primitive(p) => boxed(*p),
                    Type::Null => (*tv.bound).clone(),
                    other => other.clone(),
                };
                inferred.insert(tv.name.clone(), arg);
            }
        }
    }
    if !inferred.is_empty() {
        method.return_ty = method.return_ty.substitute(&inferred);
    }
    method
}

/// Finds the implementation of `method` that an instance of `runtime_class` runs. A method
/// with the same erased signature wins; failing that, one with the same name and arity
/// (a generic interface method implemented with concrete parameter types).
pub fn find_override(
    env: &dyn Library,
    runtime_class: &str,
    method: &MethodRef,
) -> Option<MethodRef> {
    let start = ClassType {
        name: runtime_class.to_string(),
        args: Vec::new(),
    };
    let sig = method.signature();
    let chain = supertypes(env, &start);
    let mut bridged = None;
    for ty in &chain {
        let Some(def) = env.lookup_class(&ty.name) else {
            continue;
        };
        let concrete = || def.methods_named(&method.name).filter(|m| !m.modifiers.is_abstract());
        if let Some(found) = concrete().find(|m| m.signature() == sig) {
            return Some(method_ref(&def, ty, found));
        }
        if bridged.is_none() {
            bridged = concrete()
                .find(|m| m.params.len() == method.erased_params.len())
                .map(|m| method_ref(&def, ty, m));
        }
    }
    bridged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::ClassLibrary;
    use crate::ty::names;
    use pretty_assertions::assert_eq;

    #[test]
    fn string_value_of_prefers_exact_primitive() {
        let env = ClassLibrary::jdk();
        let string = Type::string();
        let m = resolve_method(&env, &string, "valueOf", &[Type::CHAR], true).unwrap();
        assert_eq!(m.params, vec![Type::CHAR]);
        let m = resolve_method(&env, &string, "valueOf", &[Type::Primitive(dj_core::PrimitiveType::Short)], true)
            .unwrap();
        assert_eq!(m.params, vec![Type::INT]);
    }

    #[test]
    fn list_get_is_instantiated_for_the_receiver() {
        let env = ClassLibrary::jdk();
        let list = Type::class("java.util.ArrayList", vec![Type::string()]);
        let m = resolve_method(&env, &list, "get", &[Type::INT], true).unwrap();
        assert_eq!(m.return_ty, Type::string());
        assert!(!m.is_abstract());

        let raw = Type::class("java.util.List", Vec::new());
        let m = resolve_method(&env, &raw, "get", &[Type::INT], true).unwrap();
        assert_eq!(m.return_ty, Type::object());
    }

    #[test]
    fn boxing_phase_only_when_needed() {
        let env = ClassLibrary::jdk();
        let list = Type::class("java.util.ArrayList", vec![Type::class("java.lang.Integer", Vec::new())]);
        // remove(int) is chosen in the strict phase over remove(Object).
        let m = resolve_method(&env, &list, "remove", &[Type::INT], true).unwrap();
        assert_eq!(m.erased_params, vec![Type::INT]);
        let m = resolve_method(&env, &list, "add", &[Type::INT], true).unwrap();
        assert_eq!(m.params.len(), 1);
        assert_eq!(
            resolve_method(&env, &list, "add", &[Type::INT], false),
            Err(LookupError::NotFound)
        );
    }

    #[test]
    fn varargs_phase_packs_arguments() {
        let env = ClassLibrary::jdk();
        let string = Type::string();
        let m = resolve_method(
            &env,
            &string,
            "format",
            &[Type::string(), Type::INT, Type::DOUBLE],
            true,
        )
        .unwrap();
        assert!(m.var_args_call);
        let m = resolve_method(
            &env,
            &string,
            "format",
            &[Type::string(), Type::array(Type::object())],
            true,
        )
        .unwrap();
        assert!(!m.var_args_call);
    }

    #[test]
    fn fields_and_overrides() {
        let env = ClassLibrary::jdk();
        let system = Type::class("java.lang.System", Vec::new());
        let out = find_field(&env, &system, "out").unwrap();
        assert!(out.is_static());
        assert_eq!(out.ty, Type::class("java.io.PrintStream", Vec::new()));

        let object = Type::object();
        let to_string = resolve_method(&env, &object, "toString", &[], true).unwrap();
        let ov = find_override(&env, "java.lang.Integer", &to_string).unwrap();
        assert_eq!(ov.owner, "java.lang.Integer");
        let ov = find_override(&env, names::EXCEPTION, &to_string).unwrap();
        assert_eq!(ov.owner, names::THROWABLE);
    }

    #[test]
    fn constructors() {
        let env = ClassLibrary::jdk();
        let sb = ClassType {
            name: names::STRING_BUILDER.into(),
            args: Vec::new(),
        };
        let ctor = resolve_constructor(&env, &sb, &[Type::string()], true).unwrap();
        assert!(ctor.is_constructor());
        assert_eq!(ctor.erased_params, vec![Type::string()]);
        assert!(resolve_constructor(&env, &sb, &[Type::BOOLEAN], true).is_err());
    }
}
