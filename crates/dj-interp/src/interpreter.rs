//! The interactive session: parse an entry, check it against everything entered so far,
//! then run it.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::rc::Rc;

use dj_check::{Checker, CompositeError, Imports, LocalVar, TypeContext};
use dj_core::{Modifiers, NodeIdGen, Options};
use dj_syntax::ast::{Entry, MethodDecl, TypeDecl};
use dj_syntax::parse_entries;
use dj_types::{source_name, ClassDef, ClassKind, ClassLibrary, Library, LibraryContext, MethodDef, Origin, Type};

use crate::error::{Interrupt, InterpretError, ThrownException};
use crate::eval::{Evaluator, Runtime};
use crate::value::{char_from_unit, NativeState, ObjectRef, Value};

/// Holder of the methods declared at top level. Its name cannot be written in source.
pub(crate) const REPL_CLASS: &str = "$Repl";

type TreeSnapshot = Vec<(Rc<ClassDef>, Option<Rc<TypeDecl>>)>;

/// A REPL session.
///
/// Every call to [`Interpreter::interpret`] handles one entry. The entry is checked as a
/// whole before anything runs; an entry with check errors leaves the session untouched.
pub struct Interpreter {
    checker: Checker,
    ids: NodeIdGen,
    package: String,
    imports: Imports,
    /// Static view of the session variables.
    vars: HashMap<String, LocalVar>,
    repl: ClassDef,
    runtime: Runtime,
}

impl Interpreter {
    pub fn new(env: LibraryContext, options: Options) -> Self {
        let checker = Checker::new(env, options);
        let mut repl = ClassDef::new(REPL_CLASS, ClassKind::Class, Origin::Tree);
        repl.super_class = Some(Type::object());
        checker.tree().define(repl.clone(), None);
        Self {
            checker,
            ids: NodeIdGen::new(),
            package: String::new(),
            imports: Imports::default(),
            vars: HashMap::new(),
            repl,
            runtime: Runtime::new(),
        }
    }

    /// A session that only knows the built-in JDK classes.
    pub fn with_jdk(options: Options) -> Self {
        let jdk: Rc<dyn Library> = Rc::new(ClassLibrary::jdk());
        Self::new(LibraryContext::new(vec![jdk]), options)
    }

    /// Redirects `System.out`.
    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.runtime.out = out;
    }

    /// Redirects `System.err`.
    pub fn set_error_output(&mut self, err: Box<dyn Write>) {
        self.runtime.err = err;
    }

    /// Guest call depth at which `StackOverflowError` is thrown.
    pub fn set_max_depth(&mut self, depth: usize) {
        self.runtime.max_depth = depth;
    }

    pub fn options(&self) -> &Options {
        self.checker.options()
    }

    pub fn checker(&self) -> &Checker {
        &self.checker
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Session variables and their current values, sorted by name. Declared but
    /// unassigned variables have no value.
    pub fn variables(&self) -> Vec<(String, Type, Option<Value>)> {
        self.runtime
            .context
            .session_bindings()
            .into_iter()
            .map(|(name, binding)| (name.to_string(), binding.ty.clone(), binding.value.clone()))
            .collect()
    }

    /// Parses, checks and runs one entry. Returns the value of a trailing expression written
    /// without `;`, or `None` when there is none or it is `void`.
    pub fn interpret(&mut self, source: &str) -> Result<Option<Value>, InterpretError> {
        let options = *self.checker.options();
        let entries = parse_entries(source, &options, &mut self.ids)?;
        let _span = tracing::debug_span!(target: "dj.interp", "interpret", entries = entries.len()).entered();

        let declared = self.check(&entries)?;
        let result = self.run(&entries);
        self.commit_vars(declared);
        result
    }

    /// Renders a value the way the REPL echoes it: strings and chars are quoted, objects
    /// use their `toString`.
    pub fn display(&mut self, value: &Value) -> String {
        match value {
            Value::Char(unit) => return format!("'{}'", char_from_unit(*unit)),
            Value::Ref(obj) => {
                if let Some(text) = obj.string_value() {
                    return format!("\"{text}\"");
                }
            }
            _ => {}
        }
        let checker = &self.checker;
        let mut eval = Evaluator::new(checker.env(), checker.table(), checker.tree(), &mut self.runtime);
        match eval.to_java_string(value) {
            Ok(text) => text,
            Err(_) => {
                self.runtime.unwind();
                match value {
                    Value::Ref(obj) => format!("{}@{:x}", source_name(obj.class_name()), obj.identity()),
                    _ => String::new(),
                }
            }
        }
    }

    /// Checks every part of an entry. Returns the variables the entry declares at top level.
    fn check(&mut self, entries: &[Entry]) -> Result<Vec<(String, LocalVar)>, InterpretError> {
        let snapshot = self.snapshot_tree();
        let saved_repl = self.repl.clone();
        let saved_package = self.package.clone();
        let saved_imports = self.imports.clone();

        for entry in entries {
            match entry {
                Entry::Package(decl) => self.package = decl.name.clone(),
                Entry::Import(decl) => self.imports.add(decl),
                _ => {}
            }
        }
        let unit = self
            .checker
            .root_context()
            .set_package(self.package.clone())
            .with_imports(self.imports.clone());

        let existing: HashSet<String> = self.checker.tree().class_names().into_iter().collect();
        let decls: Vec<Rc<TypeDecl>> = entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Type(decl) => Some(Rc::new(decl.clone())),
                _ => None,
            })
            .collect();
        let accepted = if decls.is_empty() {
            Vec::new()
        } else {
            self.checker.check_type_decls(&unit, &decls)
        };

        let session = unit.enter_interactions(self.vars.clone(), REPL_CLASS);
        let methods: Vec<&MethodDecl> = entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::Method(decl) => Some(decl),
                _ => None,
            })
            .collect();
        if !methods.is_empty() {
            self.check_methods(&session, &methods);
        }

        let mut ctx = Rc::clone(&session);
        for entry in entries {
            ctx = match entry {
                Entry::Stmt(stmt) => self.checker.check_stmt(&ctx, stmt),
                Entry::Expr(expr) => self.checker.check_expr_stmt(&ctx, expr),
                _ => ctx,
            };
        }

        let errors = self.checker.take_errors();
        if !errors.is_empty() {
            tracing::debug!(target: "dj.interp", errors = errors.len(), "entry rejected");
            self.restore_tree(snapshot);
            self.repl = saved_repl;
            self.package = saved_package;
            self.imports = saved_imports;
            return Err(CompositeError::new(errors).into());
        }

        for name in accepted.iter().filter(|name| existing.contains(*name)) {
            tracing::debug!(target: "dj.interp", class = %name, "class redefined");
            self.runtime.forget_class(name);
        }
        for method in methods {
            self.runtime.methods.insert(method.id, Rc::new(method.clone()));
        }
        Ok(ctx.interactive_locals())
    }

    /// Declares top-level methods on the session class. A method replaces an earlier one
    /// with the same name and parameter types.
    fn check_methods(&mut self, session: &Rc<TypeContext>, methods: &[&MethodDecl]) {
        let class_ctx = session.enter_class(REPL_CLASS);
        let mut signatures = Vec::with_capacity(methods.len());
        for method in methods {
            let mut sig = self.checker.method_signature(&class_ctx, method);
            sig.modifiers.insert(Modifiers::STATIC);
            self.repl.methods.retain(|old| !same_signature(old, &sig));
            self.repl.methods.push(sig.clone());
            signatures.push(sig);
        }
        self.checker.tree().update(self.repl.clone());
        for (method, sig) in methods.iter().zip(&signatures) {
            self.checker.check_method_body(&class_ctx, method, sig);
        }
    }

    fn run(&mut self, entries: &[Entry]) -> Result<Option<Value>, InterpretError> {
        let checker = &self.checker;
        let table = checker.table();
        let mut eval = Evaluator::new(checker.env(), table, checker.tree(), &mut self.runtime);
        let mut result = None;
        for entry in entries {
            let outcome = match entry {
                Entry::Stmt(stmt) => eval.exec_stmt(stmt).map(|_| None),
                Entry::Expr(expr) if table.is_implicit_decl(expr.id) => eval.declare_implicit(expr).map(Some),
                Entry::Expr(expr) => match eval.static_type(expr.id) {
                    Type::Void => eval.eval_expr(expr).map(|_| None),
                    ty => eval.eval_expr(expr).map(|value| Some(eval.coerce(value, &ty))),
                },
                _ => continue,
            };
            match outcome {
                Ok(value) => result = value,
                Err(interrupt) => {
                    eval.rt.unwind();
                    return Err(uncaught(interrupt));
                }
            }
        }
        eval.rt.context.reset();
        Ok(result)
    }

    /// Records the variables an entry declared, as far as the entry got to declare them.
    fn commit_vars(&mut self, declared: Vec<(String, LocalVar)>) {
        for (name, var) in declared {
            let Some(binding) = self.runtime.context.binding(&name) else {
                continue;
            };
            if binding.ty == var.ty {
                self.vars.insert(name, var);
            }
        }
    }

    fn snapshot_tree(&self) -> TreeSnapshot {
        let tree = self.checker.tree();
        tree.class_names()
            .into_iter()
            .filter_map(|name| Some((tree.lookup_class(&name)?, tree.decl(&name))))
            .collect()
    }

    fn restore_tree(&self, snapshot: TreeSnapshot) {
        let tree = self.checker.tree();
        for name in tree.class_names() {
            tree.remove(&name);
        }
        for (def, decl) in snapshot {
            tree.define((*def).clone(), decl);
        }
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("package", &self.package)
            .field("vars", &self.vars.len())
            .field("runtime", &self.runtime)
            .finish()
    }
}

fn same_signature(a: &MethodDef, b: &MethodDef) -> bool {
    a.name == b.name
        && a.params.len() == b.params.len()
        && a.params.iter().zip(&b.params).all(|(x, y)| x.erasure() == y.erasure())
}

fn uncaught(interrupt: Interrupt) -> InterpretError {
    match interrupt {
        Interrupt::Error(err) => InterpretError::Execution(err),
        Interrupt::Throw(obj) => InterpretError::Thrown(thrown(obj)),
    }
}

fn thrown(obj: ObjectRef) -> ThrownException {
    let (message, stack_trace) = match &*obj.state() {
        NativeState::Throwable(state) => (state.message.clone(), state.trace.clone()),
        _ => (None, Vec::new()),
    };
    tracing::debug!(target: "dj.interp", class = obj.class_name(), "uncaught exception");
    ThrownException {
        class: obj.class_name().to_string(),
        message,
        stack_trace,
        exception: Value::Ref(obj),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn method(name: &str, params: Vec<Type>) -> MethodDef {
        MethodDef {
            name: name.to_string(),
            type_params: Vec::new(),
            params,
            return_ty: Type::Void,
            modifiers: Modifiers::STATIC,
            decl: None,
        }
    }

    #[test]
    fn redeclared_methods_match_on_erased_parameters() {
        let a = method("f", vec![Type::INT]);
        assert!(same_signature(&a, &method("f", vec![Type::INT])));
        assert!(!same_signature(&a, &method("f", vec![Type::LONG])));
        assert!(!same_signature(&a, &method("g", vec![Type::INT])));
        assert!(!same_signature(&a, &method("f", Vec::new())));
    }

    #[test]
    fn uncaught_throwables_keep_message_and_class() {
        let obj = Rc::new(crate::value::Object::new(
            "java.lang.IllegalStateException",
            7,
            NativeState::Throwable(crate::value::ThrowableState {
                message: Some("bad".into()),
                cause: None,
                trace: vec!["at $Repl.f".into()],
            }),
        ));
        let err = thrown(obj);
        assert_eq!(err.summary(), "java.lang.IllegalStateException: bad");
        assert_eq!(err.stack_trace, vec!["at $Repl.f".to_string()]);
    }
}
