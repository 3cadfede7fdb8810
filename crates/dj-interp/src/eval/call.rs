use std::rc::Rc;

use dj_check::{ErrorKind, Resolution};
use dj_core::{NodeId, Span};
use dj_syntax::ast::{ConstructorDecl, Expr, MemberDecl, MethodDecl, Param, StmtKind};
use dj_types::members::{candidate_methods, find_override, resolve_constructor};
use dj_types::{simple_name, ClassType, Library, MethodRef, Origin, Type};

use crate::error::Flow;
use crate::eval::{Completion, Evaluator, Site};
use crate::value::{ObjectRef, Value};

/// Site of calls the evaluator makes on its own behalf (`toString`, iteration).
fn internal_site() -> Site {
    Site::new(NodeId::DUMMY, Span::default())
}

impl Evaluator<'_> {
    pub(crate) fn eval_call(&mut self, expr: &Expr, receiver: Option<&Expr>, args: &[Expr]) -> Flow<Value> {
        let site = Site::of(expr);
        let table = self.table;
        match table.resolution(expr.id) {
            Some(Resolution::Method(method)) if method.is_static() => {
                if let Some(receiver) = receiver {
                    if self.is_value_expr(receiver) {
                        self.eval_expr(receiver)?;
                    }
                }
                let args = self.eval_args(method, args)?;
                self.ensure_initialized(&method.owner, site)?;
                self.invoke(method, None, args, site)
            }
            Some(Resolution::Method(method)) => {
                let target = match receiver {
                    Some(receiver) => self.eval_receiver(receiver)?,
                    None => Value::Ref(self.this_object(site)?),
                };
                let args = self.eval_args(method, args)?;
                let Value::Ref(obj) = target else {
                    return Err(self.null_pointer(format!(
                        "Cannot invoke \"{}.{}()\" because value is null",
                        simple_name(&method.owner),
                        method.name
                    )));
                };
                let method = self.dispatch(method, &obj);
                self.invoke(&method, Some(obj), args, site)
            }
            Some(Resolution::SuperMethod(method)) => {
                let this = self.this_object(site)?;
                let args = self.eval_args(method, args)?;
                self.invoke(method, Some(this), args, site)
            }
            _ => Err(self.fail(ErrorKind::NoSuchMethod, "unresolved method call", site)),
        }
    }

    /// Evaluates arguments left to right and converts them to the parameter types, packing
    /// trailing arguments of a variable-arity call into an array.
    fn eval_args(&mut self, method: &MethodRef, args: &[Expr]) -> Flow<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg)?);
        }
        let params = &method.erased_params;
        if method.var_args_call && !params.is_empty() {
            let fixed = params.len() - 1;
            let elem = params[fixed].element_type().cloned().unwrap_or_else(Type::object);
            let rest: Vec<Value> = values
                .split_off(fixed.min(values.len()))
                .into_iter()
                .map(|v| self.coerce(v, &elem))
                .collect();
            values.push(self.new_array(elem, rest));
        }
        Ok(values
            .into_iter()
            .enumerate()
            .map(|(i, v)| match params.get(i) {
                Some(ty) => self.coerce(v, ty),
                None => v,
            })
            .collect())
    }

    /// The implementation of `method` that `obj` runs.
    pub(crate) fn dispatch(&self, method: &MethodRef, obj: &ObjectRef) -> MethodRef {
        if method.is_static() || method.modifiers.is_private() || method.is_constructor() {
            return method.clone();
        }
        if obj.class_name() == method.owner && !method.is_abstract() {
            return method.clone();
        }
        find_override(self.env, obj.class_name(), method).unwrap_or_else(|| method.clone())
    }

    pub(crate) fn invoke(
        &mut self,
        method: &MethodRef,
        this: Option<ObjectRef>,
        args: Vec<Value>,
        site: Site,
    ) -> Flow<Value> {
        match method.origin {
            Origin::Tree => self.invoke_source(method, this, args, site),
            Origin::Native | Origin::Classpath => self.invoke_native(method, this, args, site),
        }
    }

    fn invoke_source(
        &mut self,
        method: &MethodRef,
        this: Option<ObjectRef>,
        args: Vec<Value>,
        site: Site,
    ) -> Flow<Value> {
        let Some(decl) = self.method_decl(method) else {
            return Err(self.fail(
                ErrorKind::NoSuchMethod,
                format!("no body for {}.{}", simple_name(&method.owner), method.signature()),
                site,
            ));
        };
        let Some(body) = &decl.body else {
            return Err(self.fail(
                ErrorKind::AbstractMethod,
                format!("{}.{} is abstract", simple_name(&method.owner), method.signature()),
                site,
            ));
        };
        self.enter(&method.owner, &method.name, false)?;
        self.rt.context.push_frame(this, method.return_ty.erasure());
        self.bind_params(&decl.params, args);
        let result = self.exec_block(body);
        self.rt.context.pop_frame();
        self.leave();
        match result? {
            Completion::Return(Some(value)) => Ok(value),
            _ => Ok(Value::Null),
        }
    }

    fn bind_params(&mut self, params: &[Param], args: Vec<Value>) {
        for (param, value) in params.iter().zip(args) {
            let ty = self.static_type(param.id);
            if param.is_final {
                self.rt.context.define_constant(param.name.clone(), ty, value);
            } else {
                self.rt.context.define(param.name.clone(), ty, value);
            }
        }
    }

    fn method_decl(&mut self, method: &MethodRef) -> Option<Rc<MethodDecl>> {
        let id = method.decl?;
        if let Some(found) = self.rt.methods.get(&id) {
            return Some(Rc::clone(found));
        }
        let class = self.tree.decl(&method.owner)?;
        let decl = Rc::new(class.methods().find(|m| m.id == id)?.clone());
        self.rt.methods.insert(id, Rc::clone(&decl));
        Some(decl)
    }

    fn constructor_decl(&mut self, ctor: &MethodRef) -> Option<Rc<ConstructorDecl>> {
        let id = ctor.decl?;
        if let Some(found) = self.rt.ctors.get(&id) {
            return Some(Rc::clone(found));
        }
        let class = self.tree.decl(&ctor.owner)?;
        let decl = Rc::new(class.constructors().find(|c| c.id == id)?.clone());
        self.rt.ctors.insert(id, Rc::clone(&decl));
        Some(decl)
    }

    pub(crate) fn eval_new(&mut self, expr: &Expr, args: &[Expr]) -> Flow<Value> {
        let site = Site::of(expr);
        let table = self.table;
        let Some(Resolution::Constructor(ctor)) = table.resolution(expr.id) else {
            return Err(self.fail(ErrorKind::NoSuchConstructor, "unresolved constructor", site));
        };
        self.ensure_initialized(&ctor.owner, site)?;
        let args = self.eval_args(ctor, args)?;
        self.instantiate(ctor, args, site)
    }

    /// Allocates an instance of the constructor's class and runs the constructor chain.
    pub(crate) fn instantiate(&mut self, ctor: &MethodRef, args: Vec<Value>, site: Site) -> Flow<Value> {
        if !self.is_tree_class(&ctor.owner) {
            return self.invoke_native(ctor, None, args, site);
        }
        let obj = self.alloc(&ctor.owner, crate::value::NativeState::None);
        self.construct(ctor, &obj, args, site)?;
        Ok(Value::Ref(obj))
    }

    fn construct(&mut self, ctor: &MethodRef, obj: &ObjectRef, args: Vec<Value>, site: Site) -> Flow<()> {
        if !self.is_tree_class(&ctor.owner) {
            return self.invoke_native(ctor, Some(Rc::clone(obj)), args, site).map(|_| ());
        }
        self.enter(&ctor.owner, "<init>", false)?;
        self.rt.context.push_frame(Some(Rc::clone(obj)), Type::Void);
        let result = self.run_constructor(ctor, obj, args, site);
        self.rt.context.pop_frame();
        self.leave();
        result
    }

    fn run_constructor(&mut self, ctor: &MethodRef, obj: &ObjectRef, args: Vec<Value>, site: Site) -> Flow<()> {
        let Some(decl) = self.constructor_decl(ctor) else {
            self.implicit_super(&ctor.owner, obj, site)?;
            return self.run_instance_initializers(&ctor.owner, obj);
        };
        self.bind_params(&decl.params, args);
        let stmts = &decl.body.stmts;
        let explicit = stmts.first().and_then(|first| match &first.kind {
            StmtKind::ConstructorCall { is_super, args } => Some((first, *is_super, args)),
            _ => None,
        });
        let rest = match explicit {
            Some((first, is_super, args)) => {
                let table = self.table;
                match table.resolution(first.id) {
                    Some(Resolution::Constructor(target)) => {
                        let values = self.eval_args(target, args)?;
                        self.construct(target, obj, values, Site::stmt(first))?;
                    }
                    _ if is_super => self.implicit_super(&ctor.owner, obj, site)?,
                    _ => {}
                }
                if is_super {
                    self.run_instance_initializers(&ctor.owner, obj)?;
                }
                &stmts[1..]
            }
            None => {
                self.implicit_super(&ctor.owner, obj, site)?;
                self.run_instance_initializers(&ctor.owner, obj)?;
                &stmts[..]
            }
        };
        self.rt.context.push_scope();
        let result = self.exec_stmts(rest);
        self.rt.context.pop_scope();
        result.map(|_| ())
    }

    /// `super()` with no arguments, as inserted into constructors that do not start with an
    /// explicit constructor call.
    fn implicit_super(&mut self, class: &str, obj: &ObjectRef, site: Site) -> Flow<()> {
        let Some(def) = self.env.lookup_class(class) else {
            return Ok(());
        };
        let Some(Type::Class(sup)) = &def.super_class else {
            return Ok(());
        };
        let sup = ClassType {
            name: sup.name.clone(),
            args: Vec::new(),
        };
        match resolve_constructor(self.env, &sup, &[], true) {
            Ok(target) => self.construct(&target, obj, Vec::new(), site),
            Err(_) => Ok(()),
        }
    }

    fn run_instance_initializers(&mut self, class: &str, obj: &ObjectRef) -> Flow<()> {
        let Some(decl) = self.tree.decl(class) else {
            return Ok(());
        };
        let def = self.env.lookup_class(class);
        for member in &decl.members {
            match member {
                MemberDecl::Field(field) => {
                    let Some(init) = &field.init else { continue };
                    let Some(def_field) = def.as_ref().and_then(|d| d.field(&field.name).cloned()) else {
                        continue;
                    };
                    if def_field.modifiers.is_static() {
                        continue;
                    }
                    let value = self.eval_initializer(init, &def_field.ty)?;
                    obj.set_field(class, &field.name, value);
                }
                MemberDecl::Initializer(init) if !init.is_static => {
                    self.exec_block(&init.body)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Calls the instance method `name` on `obj`, the way `String.valueOf` or an enhanced
    /// `for` loop do. `owner` declares the method when `obj`'s class does not.
    pub(crate) fn call_method(&mut self, obj: &ObjectRef, owner: &str, name: &str, args: Vec<Value>) -> Flow<Value> {
        let arity = args.len();
        let find = |candidates: Vec<MethodRef>| {
            candidates
                .into_iter()
                .find(|m| !m.is_static() && m.erased_params.len() == arity)
        };
        let method = find(candidate_methods(self.env, &obj.runtime_type(), name))
            .or_else(|| find(candidate_methods(self.env, &Type::class(owner, Vec::new()), name)));
        let site = internal_site();
        let Some(method) = method else {
            return Err(self.fail(
                ErrorKind::NoSuchMethod,
                format!("{}.{name} is not available", simple_name(owner)),
                site,
            ));
        };
        let method = self.dispatch(&method, obj);
        let args = args
            .into_iter()
            .zip(&method.erased_params)
            .map(|(v, ty)| self.coerce(v, ty))
            .collect();
        self.invoke(&method, Some(Rc::clone(obj)), args, site)
    }
}
