//! Checking-time scopes.
//!
//! A [`TypeContext`] is a node of an immutable chain: every `enter_*`/`declare_*` operation
//! returns a new context whose parent is the receiver. Queries walk the chain from the
//! innermost scope outwards, so shadowing falls out of the walk order.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use dj_core::Options;
use dj_syntax::ast::ImportDecl;
use dj_types::members::{candidate_methods, find_field};
use dj_types::{simple_name, ClassDef, FieldRef, Library, LibraryContext, Type, TypeParamDef};

/// A local variable, parameter or interactive session variable.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    pub ty: Type,
    pub is_final: bool,
    /// Declared with an initializer (or a parameter); a `final` one can no longer change.
    pub initialized: bool,
}

impl LocalVar {
    pub fn new(ty: Type, is_final: bool, initialized: bool) -> Self {
        Self {
            ty,
            is_final,
            initialized,
        }
    }
}

/// What a simple name denotes as a variable.
#[derive(Debug, Clone, PartialEq)]
pub enum VarBinding {
    Local(LocalVar),
    Field {
        field: FieldRef,
        /// An instance field reached from a static context.
        from_static: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Constructor,
    /// A field initializer or an initializer block.
    Initializer,
}

/// Imports of one compilation unit or interactive session, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Imports {
    single: Vec<String>,
    on_demand: Vec<String>,
    static_single: Vec<(String, String)>,
    static_on_demand: Vec<String>,
}

impl Imports {
    pub fn from_decls<'a>(decls: impl IntoIterator<Item = &'a ImportDecl>) -> Self {
        let mut imports = Imports::default();
        for decl in decls {
            imports.add(decl);
        }
        imports
    }

    pub fn add(&mut self, decl: &ImportDecl) {
        match (decl.is_static, decl.is_star) {
            (false, false) => self.single.push(decl.path.clone()),
            (false, true) => self.on_demand.push(decl.path.clone()),
            (true, false) => {
                if let Some((class, member)) = decl.path.rsplit_once('.') {
                    self.static_single.push((member.to_string(), class.to_string()));
                }
            }
            (true, true) => self.static_on_demand.push(decl.path.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.single.is_empty()
            && self.on_demand.is_empty()
            && self.static_single.is_empty()
            && self.static_on_demand.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Scope {
    Root,
    Package(String),
    Imports(Imports),
    Interactions {
        vars: Rc<HashMap<String, LocalVar>>,
        repl_class: String,
    },
    ClassSignature {
        class: String,
        type_params: Vec<TypeParamDef>,
    },
    Class {
        class: String,
    },
    Method {
        return_ty: Type,
        is_static: bool,
        kind: MethodKind,
        type_params: Vec<TypeParamDef>,
    },
    Local {
        name: String,
        var: LocalVar,
    },
    Jump {
        label: Option<String>,
        is_loop: bool,
    },
}

#[derive(Debug)]
struct Shared {
    env: LibraryContext,
    options: Options,
}

#[derive(Debug, Clone)]
pub struct TypeContext {
    scope: Scope,
    parent: Option<Rc<TypeContext>>,
    shared: Rc<Shared>,
}

/// Where an unqualified method call looks for candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodHost {
    pub receiver: Type,
    /// Reached through a static context: instance methods are not callable.
    pub from_static: bool,
}

impl TypeContext {
    pub fn root(env: LibraryContext, options: Options) -> Rc<Self> {
        Rc::new(Self {
            scope: Scope::Root,
            parent: None,
            shared: Rc::new(Shared { env, options }),
        })
    }

    fn derive(self: &Rc<Self>, scope: Scope) -> Rc<Self> {
        Rc::new(Self {
            scope,
            parent: Some(Rc::clone(self)),
            shared: Rc::clone(&self.shared),
        })
    }

    fn chain(&self) -> impl Iterator<Item = &TypeContext> {
        std::iter::successors(Some(self), |ctx| ctx.parent.as_deref())
    }

    pub fn env(&self) -> &LibraryContext {
        &self.shared.env
    }

    pub fn options(&self) -> &Options {
        &self.shared.options
    }

    pub fn set_package(self: &Rc<Self>, package: impl Into<String>) -> Rc<Self> {
        self.derive(Scope::Package(package.into()))
    }

    pub fn with_imports(self: &Rc<Self>, imports: Imports) -> Rc<Self> {
        self.derive(Scope::Imports(imports))
    }

    /// Session scope of the interactive evaluator. Unqualified calls also see the methods of
    /// `repl_class`.
    pub fn enter_interactions(
        self: &Rc<Self>,
        vars: HashMap<String, LocalVar>,
        repl_class: impl Into<String>,
    ) -> Rc<Self> {
        self.derive(Scope::Interactions {
            vars: Rc::new(vars),
            repl_class: repl_class.into(),
        })
    }

    pub fn enter_class_signature(
        self: &Rc<Self>,
        class: impl Into<String>,
        type_params: Vec<TypeParamDef>,
    ) -> Rc<Self> {
        self.derive(Scope::ClassSignature {
            class: class.into(),
            type_params,
        })
    }

    pub fn enter_class(self: &Rc<Self>, class: impl Into<String>) -> Rc<Self> {
        self.derive(Scope::Class {
            class: class.into(),
        })
    }

    pub fn enter_method(
        self: &Rc<Self>,
        return_ty: Type,
        is_static: bool,
        kind: MethodKind,
        type_params: Vec<TypeParamDef>,
    ) -> Rc<Self> {
        self.derive(Scope::Method {
            return_ty,
            is_static,
            kind,
            type_params,
        })
    }

    pub fn declare_local(self: &Rc<Self>, name: impl Into<String>, var: LocalVar) -> Rc<Self> {
        self.derive(Scope::Local {
            name: name.into(),
            var,
        })
    }

    pub fn enter_jump_target(self: &Rc<Self>, label: Option<String>, is_loop: bool) -> Rc<Self> {
        self.derive(Scope::Jump { label, is_loop })
    }

    pub fn package(&self) -> &str {
        self.chain()
            .find_map(|ctx| match &ctx.scope {
                Scope::Package(p) => Some(p.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }

    /// Innermost enclosing class, if any.
    pub fn current_class(&self) -> Option<&str> {
        self.chain().find_map(|ctx| match &ctx.scope {
            Scope::Class { class } => Some(class.as_str()),
            _ => None,
        })
    }

    pub fn current_class_def(&self) -> Option<Rc<ClassDef>> {
        self.env().lookup_class(self.current_class()?)
    }

    /// Whether code here runs without a `this`.
    pub fn is_static(&self) -> bool {
        for ctx in self.chain() {
            match &ctx.scope {
                Scope::Method { is_static, .. } => return *is_static,
                Scope::Class { .. } | Scope::Interactions { .. } => return true,
                _ => {}
            }
        }
        true
    }

    /// Return type and kind of the enclosing method; `None` at interactive top level.
    pub fn method(&self) -> Option<(&Type, MethodKind)> {
        for ctx in self.chain() {
            match &ctx.scope {
                Scope::Method {
                    return_ty, kind, ..
                } => return Some((return_ty, *kind)),
                Scope::Class { .. } => return None,
                _ => {}
            }
        }
        None
    }

    /// Whether this is the top level of an interactive entry (not inside a method body).
    pub fn is_interactive_top_level(&self) -> bool {
        for ctx in self.chain() {
            match &ctx.scope {
                Scope::Interactions { .. } => return true,
                Scope::Method { .. } | Scope::Class { .. } => return false,
                _ => {}
            }
        }
        false
    }

    /// Finds a variable named `name`, innermost first.
    pub fn lookup_var(&self, name: &str) -> Option<VarBinding> {
        let mut from_static = false;
        for ctx in self.chain() {
            match &ctx.scope {
                Scope::Local { name: n, var } if n == name => {
                    return Some(VarBinding::Local(var.clone()));
                }
                Scope::Method { is_static, .. } => from_static |= *is_static,
                Scope::Class { class } => {
                    let this = self.class_type(class);
                    if let Some(field) = find_field(self.env(), &this, name) {
                        let from_static = from_static && !field.is_static();
                        return Some(VarBinding::Field { field, from_static });
                    }
                    // Member classes never capture an enclosing instance.
                    from_static = true;
                }
                Scope::Interactions { vars, .. } => {
                    if let Some(var) = vars.get(name) {
                        return Some(VarBinding::Local(var.clone()));
                    }
                }
                Scope::Imports(imports) => {
                    for (member, class) in &imports.static_single {
                        if member == name {
                            if let Some(field) = self.static_import_field(class, name) {
                                return Some(VarBinding::Field {
                                    field,
                                    from_static: false,
                                });
                            }
                        }
                    }
                    for class in &imports.static_on_demand {
                        if let Some(field) = self.static_import_field(class, name) {
                            return Some(VarBinding::Field {
                                field,
                                from_static: false,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn static_import_field(&self, class: &str, name: &str) -> Option<FieldRef> {
        let binary = self.resolve_qualified(class)?;
        let field = find_field(self.env(), &Type::class(binary, Vec::new()), name)?;
        field.is_static().then_some(field)
    }

    /// Static type of the variable `name`.
    pub fn type_of(&self, name: &str) -> Option<Type> {
        match self.lookup_var(name)? {
            VarBinding::Local(var) => Some(var.ty),
            VarBinding::Field { field, .. } => Some(field.ty),
        }
    }

    /// Whether `name` is already declared as a local of the current method or entry.
    pub fn is_local_declared(&self, name: &str) -> bool {
        for ctx in self.chain() {
            match &ctx.scope {
                Scope::Local { name: n, .. } if n == name => return true,
                Scope::Method { .. } | Scope::Class { .. } | Scope::Interactions { .. } => {
                    return false
                }
                _ => {}
            }
        }
        false
    }

    /// Locals declared directly at interactive top level, oldest first.
    pub fn interactive_locals(&self) -> Vec<(String, LocalVar)> {
        let mut out = Vec::new();
        for ctx in self.chain() {
            match &ctx.scope {
                Scope::Local { name, var } => out.push((name.clone(), var.clone())),
                Scope::Interactions { .. } => break,
                _ => {}
            }
        }
        out.reverse();
        out
    }

    /// Finds the innermost class (or the interactive method holder) that declares a method
    /// named `name`, then static imports.
    pub fn method_host(&self, name: &str) -> Option<MethodHost> {
        let mut from_static = false;
        for ctx in self.chain() {
            match &ctx.scope {
                Scope::Method { is_static, .. } => from_static |= *is_static,
                Scope::Class { class } => {
                    let receiver = self.class_type(class);
                    if !candidate_methods(self.env(), &receiver, name).is_empty() {
                        return Some(MethodHost {
                            receiver,
                            from_static,
                        });
                    }
                    from_static = true;
                }
                Scope::Interactions { repl_class, .. } => {
                    let receiver = Type::class(repl_class.clone(), Vec::new());
                    if !candidate_methods(self.env(), &receiver, name).is_empty() {
                        return Some(MethodHost {
                            receiver,
                            from_static: true,
                        });
                    }
                }
                Scope::Imports(imports) => {
                    let classes = imports
                        .static_single
                        .iter()
                        .filter(|(member, _)| member == name)
                        .map(|(_, class)| class)
                        .chain(&imports.static_on_demand);
                    for class in classes {
                        let Some(binary) = self.resolve_qualified(class) else {
                            continue;
                        };
                        let receiver = Type::class(binary, Vec::new());
                        let has_static = candidate_methods(self.env(), &receiver, name)
                            .iter()
                            .any(|m| m.is_static());
                        if has_static {
                            return Some(MethodHost {
                                receiver,
                                from_static: true,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Finds the jump target of `break`/`continue`.
    pub fn find_jump_target(&self, label: Option<&str>, is_continue: bool) -> JumpLookup {
        for ctx in self.chain() {
            match &ctx.scope {
                Scope::Jump { label: l, is_loop } => match label {
                    Some(wanted) if l.as_deref() == Some(wanted) => {
                        return if is_continue && !is_loop {
                            JumpLookup::NotALoop
                        } else {
                            JumpLookup::Found
                        };
                    }
                    None if l.is_none() && (*is_loop || !is_continue) => return JumpLookup::Found,
                    _ => {}
                },
                Scope::Method { .. } | Scope::Class { .. } | Scope::Interactions { .. } => break,
                _ => {}
            }
        }
        if label.is_some() {
            JumpLookup::UndefinedLabel
        } else {
            JumpLookup::Missing
        }
    }

    /// Names of type variables in scope.
    pub fn type_var_in_scope(&self, name: &str) -> bool {
        self.lookup_type_param(name).is_some()
    }

    fn lookup_type_param(&self, name: &str) -> Option<Type> {
        self.chain().find_map(|ctx| {
            let params = match &ctx.scope {
                Scope::ClassSignature { type_params, .. } => type_params,
                Scope::Method { type_params, .. } => type_params,
                _ => return None,
            };
            params
                .iter()
                .find(|p| p.name == name)
                .map(TypeParamDef::as_type_var)
        })
    }

    fn class_type(&self, class: &str) -> Type {
        match self.env().lookup_class(class) {
            Some(def) => def.this_type(),
            None => Type::class(class, Vec::new()),
        }
    }

    /// Resolves a possibly qualified type name (`List`, `Map.Entry`, `java.util.List`) to a
    /// type variable or a binary class name.
    pub fn resolve_type_name(&self, name: &str) -> Option<Type> {
        let (first, rest) = match name.split_once('.') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };
        if rest.is_none() {
            if let Some(tv) = self.lookup_type_param(name) {
                return Some(tv);
            }
        }
        let found = self
            .resolve_simple(first)
            .and_then(|outer| match rest {
                Some(rest) => self.member_path(&outer, rest),
                None => Some(outer),
            })
            .or_else(|| rest.and_then(|_| self.resolve_qualified(name)))?;
        Some(Type::class(found, Vec::new()))
    }

    /// Binary name of a class named by a simple identifier.
    pub fn resolve_simple(&self, name: &str) -> Option<String> {
        let env = self.env();
        let mut on_demand: Vec<&str> = Vec::new();
        let mut package_seen = false;
        for ctx in self.chain() {
            match &ctx.scope {
                Scope::ClassSignature { class, .. } => {
                    if simple_name(class) == name {
                        return Some(class.clone());
                    }
                    if let Some(found) = self.member_type(class, name) {
                        return Some(found);
                    }
                }
                Scope::Imports(imports) => {
                    if let Some(path) = imports
                        .single
                        .iter()
                        .find(|path| path.rsplit('.').next() == Some(name))
                    {
                        if let Some(found) = self.resolve_qualified(path) {
                            return Some(found);
                        }
                    }
                    on_demand.extend(imports.on_demand.iter().map(String::as_str));
                }
                Scope::Package(package) if !package_seen => {
                    package_seen = true;
                    let candidate = qualify(package, name);
                    if env.type_exists(&candidate) {
                        return Some(candidate);
                    }
                }
                _ => {}
            }
        }
        if !package_seen && env.type_exists(name) {
            return Some(name.to_string());
        }
        for prefix in on_demand {
            if let Some(outer) = self.resolve_qualified(prefix) {
                if let Some(found) = self.member_type(&outer, name) {
                    return Some(found);
                }
            }
            let candidate = qualify(prefix, name);
            if env.type_exists(&candidate) {
                return Some(candidate);
            }
        }
        let lang = format!("java.lang.{name}");
        env.type_exists(&lang).then_some(lang)
    }

    /// Resolves a fully qualified name where the package prefix is followed by a class and
    /// possibly member classes (`java.util.Map.Entry` is `java.util.Map$Entry`).
    pub fn resolve_qualified(&self, name: &str) -> Option<String> {
        let env = self.env();
        if env.type_exists(name) {
            return Some(name.to_string());
        }
        let segments: Vec<&str> = name.split('.').collect();
        for split in (1..segments.len()).rev() {
            let class = segments[..split].join(".");
            if env.type_exists(&class) {
                return self.member_path(&class, &segments[split..].join("."));
            }
        }
        None
    }

    fn member_path(&self, outer: &str, path: &str) -> Option<String> {
        path.split('.')
            .try_fold(outer.to_string(), |outer, segment| {
                self.member_type(&outer, segment)
            })
    }

    /// A member class `outer$name`, declared in `outer` or inherited from a supertype.
    pub fn member_type(&self, outer: &str, name: &str) -> Option<String> {
        let env = self.env();
        let mut current = Some(outer.to_string());
        let mut seen = HashSet::new();
        while let Some(class) = current {
            let candidate = format!("{class}${name}");
            if env.type_exists(&candidate) {
                return Some(candidate);
            }
            if !seen.insert(class.clone()) {
                break;
            }
            current = env
                .lookup_class(&class)
                .and_then(|def| def.super_class.as_ref().and_then(|s| s.class_name().map(str::to_string)));
        }
        None
    }
}

/// Outcome of looking up a `break`/`continue` target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpLookup {
    Found,
    Missing,
    UndefinedLabel,
    NotALoop,
}

fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}
