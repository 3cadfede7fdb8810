//! Tree-walking evaluation.
//!
//! The evaluator never re-derives static information: names, overloads and static types
//! come from the checker's [`TypeTable`], keyed by node id. Runtime state that outlives a
//! single entry (session variables, class statics, interned strings, output streams) lives
//! in [`Runtime`]; an [`Evaluator`] borrows it together with the checker's tables for the
//! duration of one run.

mod call;
mod expr;
mod stmt;

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::time::Instant;

use dj_check::{ErrorKind, ExecutionError, TreeLibrary, TypeTable};
use dj_core::{NodeId, Span};
use dj_syntax::ast::{ConstructorDecl, Expr, MethodDecl, MemberDecl, Stmt};
use dj_types::system::{is_subtype, unboxed};
use dj_types::{names, simple_name, source_name, ClassDef, FieldRef, Library, LibraryContext, Origin, Type};

use crate::context::Context;
use crate::error::{Flow, Interrupt, StackFrame};
use crate::modifier::PendingWrite;
use crate::ops::convert_primitive;
use crate::value::{NativeState, Object, ObjectRef, Stream, ThrowableState, Value};

pub(crate) use stmt::Completion;

/// Guest call depth at which `StackOverflowError` is thrown.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Source location of the node being evaluated, attached to runtime errors.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Site {
    pub node: NodeId,
    pub span: Span,
}

impl Site {
    pub(crate) fn of(expr: &Expr) -> Self {
        Self {
            node: expr.id,
            span: expr.span,
        }
    }

    pub(crate) fn stmt(stmt: &Stmt) -> Self {
        Self {
            node: stmt.id,
            span: stmt.span,
        }
    }

    pub(crate) fn new(node: NodeId, span: Span) -> Self {
        Self { node, span }
    }
}

/// Statics of a source class whose initialization has started.
#[derive(Debug)]
struct ClassState {
    statics: HashMap<String, Value>,
    /// Initialization completed abruptly.
    failed: bool,
}

/// Interpreter state that persists across entries.
pub struct Runtime {
    pub(crate) context: Context,
    classes: HashMap<String, ClassState>,
    pub(crate) pending: Vec<PendingWrite>,
    stack: Vec<StackFrame>,
    strings: HashMap<String, ObjectRef>,
    boxes: HashMap<(&'static str, i64), ObjectRef>,
    streams: HashMap<Stream, ObjectRef>,
    next_id: u32,
    pub(crate) out: Box<dyn Write>,
    pub(crate) err: Box<dyn Write>,
    /// Bodies of interactively declared methods, and a cache of class method bodies.
    pub(crate) methods: HashMap<NodeId, Rc<MethodDecl>>,
    ctors: HashMap<NodeId, Rc<ConstructorDecl>>,
    pub(crate) max_depth: usize,
    started: Instant,
    seed: u64,
}

impl Runtime {
    pub fn new() -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0x2545_F491_4F6C_DD1D, |d| d.as_nanos() as u64)
            | 1;
        Self {
            context: Context::new(),
            classes: HashMap::new(),
            pending: Vec::new(),
            stack: Vec::new(),
            strings: HashMap::new(),
            boxes: HashMap::new(),
            streams: HashMap::new(),
            next_id: 0,
            out: Box::new(std::io::stdout()),
            err: Box::new(std::io::stderr()),
            methods: HashMap::new(),
            ctors: HashMap::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            started: Instant::now(),
            seed,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Drops the statics of a class that is being redefined.
    pub(crate) fn forget_class(&mut self, name: &str) {
        self.classes.remove(name);
    }

    /// Clears everything an aborted entry may have left behind.
    pub(crate) fn unwind(&mut self) {
        self.context.reset();
        self.pending.clear();
        self.stack.clear();
    }

    pub(crate) fn elapsed_nanos(&self) -> i64 {
        i64::try_from(self.started.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }

    /// xorshift64*, enough for `Math.random`.
    pub(crate) fn next_random(&mut self) -> f64 {
        let mut x = self.seed;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.seed = x;
        let bits = x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11;
        bits as f64 / (1u64 << 53) as f64
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("context", &self.context)
            .field("classes", &self.classes.len())
            .field("objects", &self.next_id)
            .finish()
    }
}

pub(crate) struct Evaluator<'a> {
    pub(crate) env: &'a LibraryContext,
    pub(crate) table: &'a TypeTable,
    pub(crate) tree: &'a TreeLibrary,
    pub(crate) rt: &'a mut Runtime,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        env: &'a LibraryContext,
        table: &'a TypeTable,
        tree: &'a TreeLibrary,
        rt: &'a mut Runtime,
    ) -> Self {
        Self { env, table, tree, rt }
    }

    pub(crate) fn static_type(&self, node: NodeId) -> Type {
        self.table.type_of(node).cloned().unwrap_or(Type::Unknown)
    }

    pub(crate) fn fail(&self, kind: ErrorKind, message: impl Into<String>, site: Site) -> Interrupt {
        Interrupt::Error(ExecutionError::at(kind, message, site.node, site.span))
    }

    pub(crate) fn alloc(&mut self, class: &str, state: NativeState) -> ObjectRef {
        self.rt.next_id += 1;
        Rc::new(Object::new(class, self.rt.next_id, state))
    }

    pub(crate) fn new_string(&mut self, s: impl Into<String>) -> Value {
        Value::Ref(self.alloc(names::STRING, NativeState::Str(s.into())))
    }

    /// String literals with equal contents are the same object.
    pub(crate) fn intern(&mut self, s: &str) -> Value {
        if let Some(found) = self.rt.strings.get(s) {
            return Value::Ref(Rc::clone(found));
        }
        let obj = self.alloc(names::STRING, NativeState::Str(s.to_string()));
        self.rt.strings.insert(s.to_string(), Rc::clone(&obj));
        Value::Ref(obj)
    }

    pub(crate) fn new_array(&mut self, elem: Type, items: Vec<Value>) -> Value {
        Value::Ref(self.alloc(names::OBJECT, NativeState::Array { elem, items }))
    }

    /// The `PrintStream` behind `System.out` or `System.err`.
    pub(crate) fn stream(&mut self, stream: Stream) -> Value {
        if let Some(found) = self.rt.streams.get(&stream) {
            return Value::Ref(Rc::clone(found));
        }
        let obj = self.alloc("java.io.PrintStream", NativeState::Stream(stream));
        self.rt.streams.insert(stream, Rc::clone(&obj));
        Value::Ref(obj)
    }

    /// Boxes a primitive into its wrapper class. Small values come from a cache, so `==`
    /// between them holds as it does on a JVM.
    pub(crate) fn box_value(&mut self, value: Value) -> Value {
        let Some(kind) = value.primitive_type() else {
            return value;
        };
        let class = kind.box_class();
        let key = match &value {
            Value::Boolean(b) => Some(i64::from(*b)),
            Value::Char(c) if *c <= 127 => Some(i64::from(*c)),
            Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_) => {
                value.as_i64().filter(|v| (-128..=127).contains(v))
            }
            _ => None,
        };
        if let Some(key) = key {
            if let Some(found) = self.rt.boxes.get(&(class, key)) {
                return Value::Ref(Rc::clone(found));
            }
            let obj = self.alloc(class, NativeState::Boxed(value));
            self.rt.boxes.insert((class, key), Rc::clone(&obj));
            return Value::Ref(obj);
        }
        Value::Ref(self.alloc(class, NativeState::Boxed(value)))
    }

    /// The primitive inside a wrapper object; any other value is returned unchanged.
    pub(crate) fn unbox(&self, value: &Value) -> Value {
        if let Value::Ref(obj) = value {
            if let NativeState::Boxed(inner) = &*obj.state() {
                return inner.clone();
            }
        }
        value.clone()
    }

    /// Assignment conversion of an already type-checked value to `ty`: primitive widening
    /// and constant narrowing, boxing and unboxing.
    pub(crate) fn coerce(&mut self, value: Value, ty: &Type) -> Value {
        match ty {
            Type::Primitive(p) => {
                let inner = self.unbox(&value);
                convert_primitive(&inner, *p).unwrap_or(inner)
            }
            Type::Unknown | Type::Void | Type::Null => value,
            _ => match value.primitive_type() {
                Some(kind) => {
                    let target = unboxed(ty).unwrap_or(kind);
                    let converted = convert_primitive(&value, target).unwrap_or(value);
                    self.box_value(converted)
                }
                None => value,
            },
        }
    }

    pub(crate) fn instance_of(&self, value: &Value, ty: &Type) -> bool {
        match value {
            Value::Ref(obj) => {
                let target = ty.erasure();
                target.is_unknown() || is_subtype(self.env, &obj.runtime_type(), &target)
            }
            _ => false,
        }
    }

    /// Creates a guest exception and starts unwinding with it.
    pub(crate) fn throw_new(&mut self, class: &str, message: impl Into<Option<String>>) -> Interrupt {
        let state = ThrowableState {
            message: message.into(),
            cause: None,
            trace: self.capture_trace(),
        };
        Interrupt::Throw(self.alloc(class, NativeState::Throwable(state)))
    }

    pub(crate) fn null_pointer(&mut self, what: impl Into<String>) -> Interrupt {
        self.throw_new("java.lang.NullPointerException", Some(what.into()))
    }

    /// Source frames of the current guest stack, innermost first. Constructor frames of the
    /// throwable being created are left out.
    pub(crate) fn capture_trace(&self) -> Vec<String> {
        let throwable = Type::class(names::THROWABLE, Vec::new());
        self.rt
            .stack
            .iter()
            .rev()
            .skip_while(|frame| {
                frame.method == "<init>"
                    && is_subtype(self.env, &Type::class(frame.class.clone(), Vec::new()), &throwable)
            })
            .filter(|frame| !frame.native)
            .map(ToString::to_string)
            .collect()
    }

    /// Pushes a guest frame, throwing `StackOverflowError` past the depth limit.
    pub(crate) fn enter(&mut self, class: &str, method: &str, native: bool) -> Flow<()> {
        if self.rt.stack.len() >= self.rt.max_depth {
            return Err(self.throw_new("java.lang.StackOverflowError", None));
        }
        self.rt.stack.push(StackFrame {
            class: class.to_string(),
            method: method.to_string(),
            native,
        });
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.rt.stack.pop();
    }

    fn is_tree_class(&self, class: &str) -> bool {
        self.env
            .lookup_class(class)
            .is_some_and(|def| def.origin == Origin::Tree)
    }

    /// Runs the static initialization of a source class (superclass first) unless it has
    /// started already. A failed initialization is not retried: the access that triggered
    /// it fails with `caught.exception` and later accesses throw `NoClassDefFoundError`.
    pub(crate) fn ensure_initialized(&mut self, class: &str, site: Site) -> Flow<()> {
        if let Some(state) = self.rt.classes.get(class) {
            if state.failed {
                let message = format!("Could not initialize class {}", source_name(class));
                return Err(self.throw_new("java.lang.NoClassDefFoundError", Some(message)));
            }
            return Ok(());
        }
        let Some(def) = self.env.lookup_class(class) else {
            return Ok(());
        };
        if def.origin != Origin::Tree {
            return Ok(());
        }
        let statics = def
            .fields
            .iter()
            .filter(|f| f.modifiers.is_static())
            .map(|f| (f.name.clone(), Value::default_for(&f.ty)))
            .collect();
        self.rt.classes.insert(
            class.to_string(),
            ClassState {
                statics,
                failed: false,
            },
        );
        let result = self.initialize(&def, site);
        if result.is_err() {
            if let Some(state) = self.rt.classes.get_mut(class) {
                state.failed = true;
            }
        }
        result.map_err(|err| self.initializer_failure(class, err, site))
    }

    fn initialize(&mut self, def: &ClassDef, site: Site) -> Flow<()> {
        if let Some(Type::Class(sup)) = &def.super_class {
            self.ensure_initialized(&sup.name, site)?;
        }
        let class = def.name.as_str();
        tracing::debug!(target: "dj.interp", class, "initializing class");
        if let Some(decl) = self.tree.decl(class) {
            self.enter(class, "<clinit>", false)?;
            self.rt.context.push_frame(None, Type::Void);
            let result = self.run_static_initializers(class, &decl.members);
            self.rt.context.pop_frame();
            self.leave();
            result?;
        }
        Ok(())
    }

    /// A guest exception escaping a static initializer becomes a failure of the access.
    fn initializer_failure(&self, class: &str, err: Interrupt, site: Site) -> Interrupt {
        match err {
            Interrupt::Throw(exception) => {
                let message = format!(
                    "exception in static initializer of {}: {}",
                    simple_name(class),
                    simple_name(exception.class_name())
                );
                tracing::debug!(target: "dj.interp", class, "static initialization failed");
                self.fail(ErrorKind::CaughtException, message, site)
            }
            other => other,
        }
    }

    fn run_static_initializers(&mut self, class: &str, members: &[MemberDecl]) -> Flow<()> {
        let def = self.env.lookup_class(class);
        for member in members {
            match member {
                MemberDecl::Field(field) => {
                    let Some(def_field) = def.as_ref().and_then(|d| d.field(&field.name).cloned()) else {
                        continue;
                    };
                    if !def_field.modifiers.is_static() {
                        continue;
                    }
                    if let Some(init) = &field.init {
                        let value = self.eval_initializer(init, &def_field.ty)?;
                        self.put_static(class, &field.name, value);
                    }
                }
                MemberDecl::Initializer(init) if init.is_static => {
                    self.exec_block(&init.body)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn put_static(&mut self, class: &str, name: &str, value: Value) {
        if let Some(state) = self.rt.classes.get_mut(class) {
            state.statics.insert(name.to_string(), value);
        }
    }

    pub(crate) fn static_get(&mut self, field: &FieldRef, site: Site) -> Flow<Value> {
        if self.is_tree_class(&field.owner) {
            self.ensure_initialized(&field.owner, site)?;
            let value = self
                .rt
                .classes
                .get(&field.owner)
                .and_then(|state| state.statics.get(&field.name).cloned());
            return Ok(value.unwrap_or_else(|| Value::default_for(&field.ty)));
        }
        match self.native_static_field(&field.owner, &field.name) {
            Some(value) => Ok(value),
            None => Err(self.fail(
                ErrorKind::NativeUnavailable,
                format!("field {}.{} is not available", simple_name(&field.owner), field.name),
                site,
            )),
        }
    }

    pub(crate) fn static_set(&mut self, field: &FieldRef, value: Value, site: Site) -> Flow<()> {
        if !self.is_tree_class(&field.owner) {
            return Err(self.fail(
                ErrorKind::CannotModify,
                format!("cannot assign a value to {}.{}", simple_name(&field.owner), field.name),
                site,
            ));
        }
        self.ensure_initialized(&field.owner, site)?;
        self.put_static(&field.owner, &field.name, value);
        Ok(())
    }

    pub(crate) fn instance_get(&self, obj: &Object, field: &FieldRef) -> Value {
        obj.field(&field.owner, &field.name)
            .unwrap_or_else(|| Value::default_for(&field.ty))
    }

    /// The `this` of the running method.
    pub(crate) fn this_object(&self, site: Site) -> Flow<ObjectRef> {
        self.rt
            .context
            .this()
            .cloned()
            .ok_or_else(|| self.fail(ErrorKind::StaticContext, "no enclosing instance", site))
    }
}
