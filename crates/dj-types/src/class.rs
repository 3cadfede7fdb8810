use std::collections::HashMap;

use dj_core::{Modifiers, NodeId};
use serde::Serialize;

use crate::ty::{package_of, simple_name, ClassType, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClassKind {
    Class,
    Interface,
}

/// Where a class descriptor came from; decides how its members are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Origin {
    /// Built-in JDK signature backed by Rust implementations.
    Native,
    /// Read from a `.class` file on the user classpath.
    Classpath,
    /// Declared in source checked in this session.
    Tree,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeParamDef {
    pub name: String,
    pub bounds: Vec<Type>,
}

impl TypeParamDef {
    pub fn as_type_var(&self) -> Type {
        Type::type_var(
            self.name.clone(),
            self.bounds.first().cloned().unwrap_or_else(Type::object),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: Type,
    pub modifiers: Modifiers,
    pub decl: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDef {
    /// `<init>` for constructors.
    pub name: String,
    pub type_params: Vec<TypeParamDef>,
    pub params: Vec<Type>,
    pub return_ty: Type,
    pub modifiers: Modifiers,
    pub decl: Option<NodeId>,
}

impl MethodDef {
    pub fn is_var_args(&self) -> bool {
        self.modifiers.contains(Modifiers::VARARGS)
    }

    /// Erased signature, e.g. `indexOf(java.lang.String,int)`.
    pub fn signature(&self) -> String {
        signature(&self.name, &self.params)
    }
}

pub fn signature(name: &str, params: &[Type]) -> String {
    let params: Vec<String> = params.iter().map(Type::signature_name).collect();
    format!("{name}({})", params.join(","))
}

/// The checker's descriptor for a class or interface, whatever its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassDef {
    /// Binary name, e.g. `pkg.Outer$Inner`.
    pub name: String,
    pub kind: ClassKind,
    pub modifiers: Modifiers,
    pub type_params: Vec<TypeParamDef>,
    pub super_class: Option<Type>,
    pub interfaces: Vec<Type>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
    pub constructors: Vec<MethodDef>,
    pub origin: Origin,
    /// Declaration node for source classes.
    pub decl: Option<NodeId>,
    /// Binary name of the enclosing class for member types.
    pub outer: Option<String>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, kind: ClassKind, origin: Origin) -> Self {
        ClassDef {
            name: name.into(),
            kind,
            modifiers: Modifiers::PUBLIC,
            type_params: Vec::new(),
            super_class: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            origin,
            decl: None,
            outer: None,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    pub fn package(&self) -> &str {
        package_of(&self.name)
    }

    /// The generic self type, `C<T1..Tn>`.
    pub fn this_type(&self) -> Type {
        Type::Class(ClassType {
            name: self.name.clone(),
            args: self.type_params.iter().map(TypeParamDef::as_type_var).collect(),
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDef> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }

    /// Substitution from this class's type parameters to the arguments of `ty`. Raw uses map
    /// each parameter to its erased bound.
    pub fn substitution(&self, args: &[Type]) -> HashMap<String, Type> {
        self.type_params
            .iter()
            .enumerate()
            .map(|(i, tp)| {
                let arg = match args.get(i) {
                    Some(arg) if args.len() == self.type_params.len() => arg.upper_bound(),
                    _ => tp.as_type_var().erasure(),
                };
                (tp.name.clone(), arg)
            })
            .collect()
    }
}

/// A field chosen by member lookup, with its type instantiated for the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRef {
    pub owner: String,
    pub name: String,
    pub ty: Type,
    pub modifiers: Modifiers,
    pub decl: Option<NodeId>,
}

impl FieldRef {
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }
}

/// A method or constructor chosen by overload resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodRef {
    pub owner: String,
    pub owner_kind: ClassKind,
    pub name: String,
    /// Declared parameter types, erased. Used for dispatch and native lookup.
    pub erased_params: Vec<Type>,
    /// Parameter types instantiated for the receiver.
    pub params: Vec<Type>,
    pub return_ty: Type,
    pub modifiers: Modifiers,
    pub decl: Option<NodeId>,
    pub origin: Origin,
    /// Resolution needed variable-arity invocation, so trailing arguments are packed.
    pub var_args_call: bool,
}

impl MethodRef {
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract()
    }

    pub fn is_var_args(&self) -> bool {
        self.modifiers.contains(Modifiers::VARARGS)
    }

    pub fn signature(&self) -> String {
        signature(&self.name, &self.erased_params)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }
}
