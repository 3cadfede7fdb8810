//! Class declarations: header registration, signatures and bodies.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use dj_core::{Modifiers, NodeId, Span};
use dj_syntax::ast::{ConstructorDecl, MemberDecl, MethodDecl, Param, StmtKind, TypeDecl, TypeKind, TypeParam, TypeRef};
use dj_types::members::{candidate_methods, find_override, resolve_constructor};
use dj_types::{
    names, signature, source_name, ClassDef, ClassKind, FieldDef, Library, MethodDef, Origin, Type,
    TypeParamDef,
};

use crate::checker::Checker;
use crate::context::{LocalVar, MethodKind, TypeContext};
use crate::error::ErrorKind;
use crate::stmt::block_can_complete;
use crate::table::Resolution;

/// A class registered in phase 0 and waiting for its signature and body checks.
#[derive(Debug, Clone)]
pub struct PendingClass {
    pub name: String,
    pub decl: Rc<TypeDecl>,
    /// Package and imports of the declaring unit or entry.
    pub unit: Rc<TypeContext>,
    pub outer: Option<String>,
}

impl Checker {
    /// Checks a batch of class declarations that share `unit` (package and imports) and
    /// returns the binary names of the classes whose signatures were accepted.
    pub fn check_type_decls(&mut self, unit: &Rc<TypeContext>, decls: &[Rc<TypeDecl>]) -> Vec<String> {
        let mut pending = Vec::new();
        let mut declared = HashSet::new();
        for decl in decls {
            self.declare_header(unit, decl, None, &mut declared, &mut pending);
        }
        self.check_pending(pending)
    }

    /// Phases 1 and 2 for classes registered with [`Checker::declare_header`].
    pub(crate) fn check_pending(&mut self, pending: Vec<PendingClass>) -> Vec<String> {
        let mut signature_ctx: HashMap<String, Rc<TypeContext>> = HashMap::new();
        let mut accepted = Vec::new();
        for class in &pending {
            let parent = class
                .outer
                .as_ref()
                .and_then(|outer| signature_ctx.get(outer).cloned())
                .unwrap_or_else(|| Rc::clone(&class.unit));
            let (ctx, ok) = self.check_signature(&parent, class);
            signature_ctx.insert(class.name.clone(), ctx);
            if ok {
                accepted.push(class.name.clone());
            }
        }
        self.reject_cycles(&mut accepted, &pending);
        accepted.retain(|name| self.check_implementations(name, &pending));

        for class in &pending {
            if !accepted.contains(&class.name) {
                continue;
            }
            if let Some(ctx) = signature_ctx.get(&class.name) {
                let ctx = ctx.enter_class(class.name.clone());
                self.check_class_body(&ctx, class);
            }
        }
        self.set_anchor(None);
        accepted
    }

    /// Phase 0: registers a header-only descriptor for `decl` and its member types.
    pub(crate) fn declare_header(
        &mut self,
        unit: &Rc<TypeContext>,
        decl: &Rc<TypeDecl>,
        outer: Option<&str>,
        declared: &mut HashSet<String>,
        pending: &mut Vec<PendingClass>,
    ) {
        let name = match outer {
            Some(outer) => format!("{outer}${}", decl.name),
            None if unit.package().is_empty() => decl.name.clone(),
            None => format!("{}.{}", unit.package(), decl.name),
        };
        if !declared.insert(name.clone()) {
            self.report(
                ErrorKind::DuplicateDeclaration,
                format!("duplicate class: {}", source_name(&name)),
                decl.id,
                decl.name_span,
            );
            return;
        }
        let kind = match decl.kind {
            TypeKind::Class => ClassKind::Class,
            TypeKind::Interface => ClassKind::Interface,
        };
        let mut def = ClassDef::new(name.clone(), kind, Origin::Tree);
        def.modifiers = decl.modifiers;
        if kind == ClassKind::Interface {
            def.modifiers.insert(Modifiers::INTERFACE.union(Modifiers::ABSTRACT));
        }
        def.type_params = decl
            .type_params
            .iter()
            .map(|p| TypeParamDef {
                name: p.name.clone(),
                bounds: Vec::new(),
            })
            .collect();
        if kind == ClassKind::Class && name != names::OBJECT {
            def.super_class = Some(Type::object());
        }
        def.decl = Some(decl.id);
        def.outer = outer.map(str::to_string);
        self.tree().define(def, Some(Rc::clone(decl)));
        tracing::debug!(target: "dj.check", class = %name, "registered class header");

        pending.push(PendingClass {
            name: name.clone(),
            decl: Rc::clone(decl),
            unit: Rc::clone(unit),
            outer: outer.map(str::to_string),
        });
        for member in &decl.members {
            if let MemberDecl::Type(member) = member {
                self.declare_header(unit, &Rc::new(member.clone()), Some(&name), declared, pending);
            }
        }
    }

    fn type_params(&mut self, parent: &Rc<TypeContext>, params: &[TypeParam], class: Option<&str>) -> (Rc<TypeContext>, Vec<TypeParamDef>) {
        let unbounded: Vec<TypeParamDef> = params
            .iter()
            .map(|p| TypeParamDef {
                name: p.name.clone(),
                bounds: Vec::new(),
            })
            .collect();
        let scope = |defs: Vec<TypeParamDef>| match class {
            Some(class) => parent.enter_class_signature(class, defs),
            None => parent.enter_method(Type::Void, false, MethodKind::Method, defs),
        };
        let provisional = scope(unbounded);
        let defs: Vec<TypeParamDef> = params
            .iter()
            .map(|p| TypeParamDef {
                name: p.name.clone(),
                bounds: p
                    .bounds
                    .iter()
                    .map(|b| self.resolve_type_ref(&provisional, b))
                    .filter(|t| !t.is_unknown())
                    .collect(),
            })
            .collect();
        (scope(defs.clone()), defs)
    }

    /// Phase 1: supertypes and member signatures. Returns the signature context of the
    /// class and whether it was accepted.
    fn check_signature(&mut self, parent: &Rc<TypeContext>, class: &PendingClass) -> (Rc<TypeContext>, bool) {
        self.set_anchor(Some(class.decl.id));
        let before = self.error_count();
        let decl = &class.decl;
        let (ctx, type_params) = self.type_params(parent, &decl.type_params, Some(&class.name));
        let Some(header) = self.env().lookup_class(&class.name) else {
            return (ctx, false);
        };
        let mut def = (*header).clone();
        def.type_params = type_params;

        if decl.is_interface() {
            for ty_ref in &decl.extends {
                if let Some(ty) = self.supertype(&ctx, ty_ref, true) {
                    def.interfaces.push(ty);
                }
            }
        } else {
            if let Some(ty_ref) = decl.extends.first() {
                if let Some(ty) = self.supertype(&ctx, ty_ref, false) {
                    def.super_class = Some(ty);
                }
            }
            for ty_ref in &decl.implements {
                if let Some(ty) = self.supertype(&ctx, ty_ref, true) {
                    def.interfaces.push(ty);
                }
            }
        }

        for member in &decl.members {
            match member {
                MemberDecl::Field(field) => {
                    let ty = self.resolve_type_ref(&ctx, &field.ty);
                    if def.field(&field.name).is_some() {
                        self.report(
                            ErrorKind::DuplicateDeclaration,
                            format!("variable {} is already defined in {}", field.name, source_name(&def.name)),
                            field.id,
                            field.name_span,
                        );
                        continue;
                    }
                    def.fields.push(FieldDef {
                        name: field.name.clone(),
                        ty,
                        modifiers: field.modifiers,
                        decl: Some(field.id),
                    });
                }
                MemberDecl::Method(method) => {
                    let sig = self.method_signature(&ctx, method);
                    if def.methods.iter().any(|m| m.signature() == sig.signature()) {
                        self.report(
                            ErrorKind::DuplicateDeclaration,
                            format!("method {} is already defined in {}", sig.signature(), source_name(&def.name)),
                            method.id,
                            method.name_span,
                        );
                        continue;
                    }
                    let abstract_in_class = sig.modifiers.is_abstract() && !decl.is_interface() && !decl.modifiers.is_abstract();
                    if abstract_in_class {
                        self.report(
                            ErrorKind::AbstractMethod,
                            format!(
                                "{} is not abstract and declares abstract method {}",
                                source_name(&def.name),
                                sig.signature()
                            ),
                            method.id,
                            method.name_span,
                        );
                    }
                    if method.body.is_some() && sig.modifiers.is_abstract() {
                        self.report(ErrorKind::AbstractMethod, "abstract methods cannot have a body", method.id, method.name_span);
                    }
                    if method.body.is_none() && !sig.modifiers.is_abstract() && !sig.modifiers.contains(Modifiers::NATIVE) {
                        self.report(ErrorKind::AbstractMethod, "missing method body, or declare abstract", method.id, method.name_span);
                    }
                    def.methods.push(sig);
                }
                MemberDecl::Constructor(ctor) => {
                    if ctor.name != decl.name {
                        self.report(
                            ErrorKind::DuplicateDeclaration,
                            format!("invalid method declaration; return type required for {}", ctor.name),
                            ctor.id,
                            ctor.name_span,
                        );
                        continue;
                    }
                    let sig = self.constructor_signature(&ctx, ctor);
                    if def.constructors.iter().any(|m| m.signature() == sig.signature()) {
                        self.report(
                            ErrorKind::DuplicateDeclaration,
                            format!("constructor {} is already defined", sig.signature()),
                            ctor.id,
                            ctor.name_span,
                        );
                        continue;
                    }
                    def.constructors.push(sig);
                }
                MemberDecl::Initializer(_) | MemberDecl::Type(_) => {}
            }
        }
        if !decl.is_interface() && def.constructors.is_empty() {
            let access = def.modifiers.0 & (Modifiers::PUBLIC.0 | Modifiers::PROTECTED.0 | Modifiers::PRIVATE.0);
            def.constructors.push(MethodDef {
                name: "<init>".to_string(),
                type_params: Vec::new(),
                params: Vec::new(),
                return_ty: Type::Void,
                modifiers: Modifiers(access),
                decl: None,
            });
        }
        self.tree().update(def);
        (ctx, self.error_count() == before)
    }

    /// Resolves a supertype reference; `interface` selects whether an interface is required.
    fn supertype(&mut self, ctx: &TypeContext, ty_ref: &TypeRef, interface: bool) -> Option<Type> {
        let ty = self.resolve_type_ref(ctx, ty_ref);
        let Type::Class(class) = &ty else {
            if !ty.is_unknown() {
                self.report_at(ErrorKind::ClassExpected, format!("unexpected type {ty}"), ty_ref.span);
            }
            return None;
        };
        let def = self.env().lookup_class(&class.name)?;
        if interface && !def.is_interface() {
            self.report_at(
                ErrorKind::InterfaceExpected,
                format!("interface expected here, found {}", source_name(&def.name)),
                ty_ref.span,
            );
            return None;
        }
        if !interface && def.is_interface() {
            self.report_at(
                ErrorKind::ClassExpected,
                format!("no interface expected here, found {}", source_name(&def.name)),
                ty_ref.span,
            );
            return None;
        }
        if !interface && def.modifiers.is_final() {
            self.report_at(
                ErrorKind::FinalSuperclass,
                format!("cannot inherit from final {}", source_name(&def.name)),
                ty_ref.span,
            );
            return None;
        }
        Some(ty)
    }

    fn params(&mut self, ctx: &TypeContext, params: &[Param]) -> Vec<Type> {
        let count = params.len();
        params
            .iter()
            .enumerate()
            .map(|(i, param)| {
                if param.var_args && i + 1 != count {
                    self.report(
                        ErrorKind::DuplicateDeclaration,
                        "varargs parameter must be the last parameter",
                        param.id,
                        param.name_span,
                    );
                }
                let ty = self.resolve_type_ref(ctx, &param.ty);
                self.table.set_type(param.id, ty.clone());
                ty
            })
            .collect()
    }

    /// Signature of a method declared in a class body or at interactive top level.
    pub fn method_signature(&mut self, ctx: &Rc<TypeContext>, method: &MethodDecl) -> MethodDef {
        let (method_ctx, type_params) = self.type_params(ctx, &method.type_params, None);
        let params = self.params(&method_ctx, &method.params);
        let return_ty = self.resolve_type_ref(&method_ctx, &method.return_ty);
        MethodDef {
            name: method.name.clone(),
            type_params,
            params,
            return_ty,
            modifiers: method.modifiers,
            decl: Some(method.id),
        }
    }

    fn constructor_signature(&mut self, ctx: &TypeContext, ctor: &ConstructorDecl) -> MethodDef {
        let params = self.params(ctx, &ctor.params);
        let mut modifiers = ctor.modifiers;
        if ctor.is_var_args() {
            modifiers.insert(Modifiers::VARARGS);
        }
        MethodDef {
            name: "<init>".to_string(),
            type_params: Vec::new(),
            params,
            return_ty: Type::Void,
            modifiers,
            decl: Some(ctor.id),
        }
    }

    /// Rejects classes that inherit from themselves and cuts each cycle so later lookups
    /// terminate.
    fn reject_cycles(&mut self, accepted: &mut Vec<String>, pending: &[PendingClass]) {
        let cyclic: Vec<String> = accepted
            .iter()
            .filter(|name| self.inherits_from_itself(name))
            .cloned()
            .collect();
        for name in &cyclic {
            if let Some(class) = pending.iter().find(|c| &c.name == name) {
                self.report(
                    ErrorKind::CyclicInheritance,
                    format!("cyclic inheritance involving {}", source_name(name)),
                    class.decl.id,
                    class.decl.name_span,
                );
            }
            if let Some(def) = self.env().lookup_class(name) {
                let mut broken = (*def).clone();
                broken.super_class = (!broken.is_interface()).then(Type::object);
                broken.interfaces.clear();
                self.tree().update(broken);
            }
        }
        accepted.retain(|name| !cyclic.contains(name));
    }

    fn inherits_from_itself(&self, name: &str) -> bool {
        let Some(def) = self.env().lookup_class(name) else {
            return false;
        };
        let mut stack = direct_super_names(&def);
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == name {
                return true;
            }
            if seen.insert(current.clone()) {
                if let Some(next) = self.env().lookup_class(&current) {
                    stack.extend(direct_super_names(&next));
                }
            }
        }
        false
    }

    /// A concrete class must implement every abstract method it inherits.
    fn check_implementations(&mut self, name: &str, pending: &[PendingClass]) -> bool {
        let Some(def) = self.env().lookup_class(name) else {
            return false;
        };
        if def.is_interface() || def.modifiers.is_abstract() {
            return true;
        }
        let Some(class) = pending.iter().find(|c| c.name == name) else {
            return true;
        };
        let this = def.this_type();
        let Some(start) = this.lookup_class() else {
            return true;
        };
        let mut abstract_names: Vec<String> = Vec::new();
        for ty in dj_types::system::supertypes(self.env(), &start) {
            if let Some(sup) = self.env().lookup_class(&ty.name) {
                for m in sup.methods.iter().filter(|m| m.modifiers.is_abstract()) {
                    if !abstract_names.contains(&m.name) {
                        abstract_names.push(m.name.clone());
                    }
                }
            }
        }
        let mut ok = true;
        for method_name in abstract_names {
            for candidate in candidate_methods(self.env(), &this, &method_name) {
                if !candidate.is_abstract() {
                    continue;
                }
                if find_override(self.env(), name, &candidate).is_none() {
                    self.report(
                        ErrorKind::MissingImplementation,
                        format!(
                            "{} is not abstract and does not override abstract method {} in {}",
                            source_name(name),
                            candidate.signature(),
                            source_name(&candidate.owner)
                        ),
                        class.decl.id,
                        class.decl.name_span,
                    );
                    ok = false;
                }
            }
        }
        ok
    }

    /// Phase 2: field initializers, initializer blocks, methods and constructors.
    fn check_class_body(&mut self, ctx: &Rc<TypeContext>, class: &PendingClass) {
        self.set_anchor(Some(class.decl.id));
        let Some(def) = self.env().lookup_class(&class.name) else {
            return;
        };
        let has_ctor = class.decl.constructors().next().is_some();
        if !def.is_interface() && !has_ctor {
            self.check_implicit_super(&def, class.decl.id, class.decl.name_span);
        }
        for member in &class.decl.members {
            match member {
                MemberDecl::Field(field) => {
                    let Some(init) = &field.init else {
                        continue;
                    };
                    let ty = def.field(&field.name).map_or(Type::Unknown, |f| f.ty.clone());
                    let init_ctx = ctx.enter_method(Type::Void, field.modifiers.is_static(), MethodKind::Initializer, Vec::new());
                    self.check_initializer(&init_ctx, init, &ty);
                }
                MemberDecl::Initializer(init) => {
                    let init_ctx = ctx.enter_method(Type::Void, init.is_static, MethodKind::Initializer, Vec::new());
                    self.check_block(&init_ctx, &init.body);
                }
                MemberDecl::Method(method) => {
                    let Some(sig) = def.methods.iter().find(|m| m.decl == Some(method.id)) else {
                        continue;
                    };
                    let sig = sig.clone();
                    self.check_method_body(ctx, method, &sig);
                }
                MemberDecl::Constructor(ctor) => {
                    let Some(sig) = def.constructors.iter().find(|m| m.decl == Some(ctor.id)) else {
                        continue;
                    };
                    let params = sig.params.clone();
                    let mut body_ctx = ctx.enter_method(Type::Void, false, MethodKind::Constructor, Vec::new());
                    for (param, ty) in ctor.params.iter().zip(params) {
                        body_ctx = body_ctx.declare_local(param.name.clone(), LocalVar::new(ty, param.is_final, true));
                    }
                    self.check_constructor_body(&body_ctx, &def, ctor);
                }
                MemberDecl::Type(_) => {}
            }
        }
    }

    /// Checks the body of a method whose signature is `sig`, in the class context `ctx`.
    pub fn check_method_body(&mut self, ctx: &Rc<TypeContext>, method: &MethodDecl, sig: &MethodDef) {
        let Some(body) = &method.body else {
            return;
        };
        let mut body_ctx = ctx.enter_method(
            sig.return_ty.clone(),
            sig.modifiers.is_static(),
            MethodKind::Method,
            sig.type_params.clone(),
        );
        for (param, ty) in method.params.iter().zip(&sig.params) {
            body_ctx = body_ctx.declare_local(param.name.clone(), LocalVar::new(ty.clone(), param.is_final, true));
        }
        self.check_block(&body_ctx, body);
        if !sig.return_ty.is_void() && !sig.return_ty.is_unknown() && block_can_complete(body) {
            self.report(
                ErrorKind::AssignmentTypes,
                format!("missing return statement in {}", sig.signature()),
                method.id,
                method.name_span,
            );
        }
    }

    fn check_constructor_body(&mut self, ctx: &Rc<TypeContext>, def: &ClassDef, ctor: &ConstructorDecl) {
        let body = &ctor.body;
        let mut stmts = body.stmts.iter();
        let mut inner = Rc::clone(ctx);
        match body.stmts.first() {
            Some(first) => {
                if let StmtKind::ConstructorCall { is_super, args } = &first.kind {
                    stmts.next();
                    let arg_ctx = ctx.enter_method(Type::Void, true, MethodKind::Constructor, Vec::new());
                    let target = if *is_super {
                        def.super_class.clone()
                    } else {
                        Some(def.this_type())
                    };
                    let mut arg_types = Vec::new();
                    for arg in args {
                        arg_types.push(self.check_expr(&arg_ctx, arg));
                    }
                    if let Some(Type::Class(target)) = target {
                        if !arg_types.iter().any(Type::is_unknown) {
                            match resolve_constructor(self.env(), &target, &arg_types, self.allow_boxing()) {
                                Ok(ctor) => self.table.resolve(first.id, Resolution::Constructor(ctor)),
                                Err(_) => self.report(
                                    ErrorKind::NoSuchConstructor,
                                    format!(
                                        "no applicable constructor {}",
                                        signature(dj_types::simple_name(&target.name), &arg_types)
                                    ),
                                    first.id,
                                    first.span,
                                ),
                            }
                        }
                    }
                } else {
                    self.check_implicit_super(def, ctor.id, ctor.name_span);
                }
            }
            None => self.check_implicit_super(def, ctor.id, ctor.name_span),
        }
        for stmt in stmts {
            inner = self.check_stmt(&inner, stmt);
        }
    }

    /// A constructor without `this(..)`/`super(..)` calls the superclass' no-arg constructor.
    fn check_implicit_super(&mut self, def: &ClassDef, node: NodeId, span: Span) {
        let Some(Type::Class(sup)) = &def.super_class else {
            return;
        };
        if resolve_constructor(self.env(), sup, &[], self.allow_boxing()).is_err() {
            self.report(
                ErrorKind::NoSuchConstructor,
                format!(
                    "constructor {} cannot be applied to given types; implicit super() in {}",
                    dj_types::simple_name(&sup.name),
                    source_name(&def.name)
                ),
                node,
                span,
            );
        }
    }
}

fn direct_super_names(def: &ClassDef) -> Vec<String> {
    def.super_class
        .iter()
        .chain(&def.interfaces)
        .filter_map(|t| t.class_name().map(str::to_string))
        .collect()
}
