use std::rc::Rc;

use dj_core::{Modifiers, NodeId, Options, PrimitiveType, Span};
use dj_syntax::ast::{BinaryOp, Expr, ExprKind, Literal, TypeArg, TypeRef, TypeRefKind, UnaryOp, WildcardKind};
use dj_types::system::{constant_fits, is_assignable, is_subtype};
use dj_types::{package_of, Library, LibraryContext, Type, WildcardBound};

use crate::context::TypeContext;
use crate::error::{ErrorKind, ExecutionError};
use crate::table::TypeTable;
use crate::tree::TreeLibrary;

/// Static checker state shared by declarations, statements and expressions.
///
/// One checker lives for a whole session: the side table and the tree library keep growing
/// as batches (files or interactive entries) are checked, while errors are drained per batch.
#[derive(Debug)]
pub struct Checker {
    env: LibraryContext,
    tree: Rc<TreeLibrary>,
    options: Options,
    pub(crate) table: TypeTable,
    errors: Vec<ExecutionError>,
    /// Declaration being checked; span-only reports are attributed to it.
    anchor: Option<NodeId>,
}

impl Checker {
    /// Creates a checker whose source classes shadow everything in `base`.
    pub fn new(base: LibraryContext, options: Options) -> Self {
        let tree = Rc::new(TreeLibrary::new());
        let mut env = base;
        env.push_front(tree.clone());
        Self {
            env,
            tree,
            options,
            table: TypeTable::new(),
            errors: Vec::new(),
            anchor: None,
        }
    }

    pub fn env(&self) -> &LibraryContext {
        &self.env
    }

    pub fn tree(&self) -> &Rc<TreeLibrary> {
        &self.tree
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn table(&self) -> &TypeTable {
        &self.table
    }

    /// Outermost context for a new compilation unit or session.
    pub fn root_context(&self) -> Rc<TypeContext> {
        TypeContext::root(self.env.clone(), self.options)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub(crate) fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Drains the errors collected since the last call.
    pub fn take_errors(&mut self) -> Vec<ExecutionError> {
        std::mem::take(&mut self.errors)
    }

    pub(crate) fn report(&mut self, kind: ErrorKind, message: impl Into<String>, node: NodeId, span: Span) {
        let err = ExecutionError::at(kind, message, node, span);
        tracing::debug!(target: "dj.check", key = err.key(), message = %err.message, "check error");
        self.errors.push(err);
    }

    pub(crate) fn report_at(&mut self, kind: ErrorKind, message: impl Into<String>, span: Span) {
        let err = match self.anchor {
            Some(node) => ExecutionError::at(kind, message, node, span),
            None => ExecutionError::new(kind, message, span),
        };
        tracing::debug!(target: "dj.check", key = err.key(), message = %err.message, "check error");
        self.errors.push(err);
    }

    pub(crate) fn set_anchor(&mut self, node: Option<NodeId>) {
        self.anchor = node;
    }

    pub(crate) fn allow_boxing(&self) -> bool {
        !self.options.prohibit_boxing
    }

    /// Resolves a written type. Unknown names are reported and yield [`Type::Unknown`].
    pub fn resolve_type_ref(&mut self, ctx: &TypeContext, ty: &TypeRef) -> Type {
        match &ty.kind {
            TypeRefKind::Primitive(p) => Type::Primitive(*p),
            TypeRefKind::Void => Type::Void,
            TypeRefKind::Array(elem) => match self.resolve_type_ref(ctx, elem) {
                Type::Unknown => Type::Unknown,
                Type::Void => {
                    self.report_at(ErrorKind::AssignmentTypes, "illegal array of void", ty.span);
                    Type::Unknown
                }
                elem => Type::array(elem),
            },
            TypeRefKind::Named { name, args } => {
                let Some(base) = ctx.resolve_type_name(name) else {
                    self.report_at(
                        ErrorKind::UndefinedClass,
                        format!("cannot find class {name}"),
                        ty.span,
                    );
                    return Type::Unknown;
                };
                let Type::Class(class) = base else {
                    return base;
                };
                if args.is_empty() {
                    return Type::Class(class);
                }
                let arity = self
                    .env
                    .lookup_class(&class.name)
                    .map_or(0, |def| def.type_params.len());
                if arity != args.len() {
                    self.report_at(
                        ErrorKind::UndefinedClass,
                        format!(
                            "wrong number of type arguments for {name}; required {arity}"
                        ),
                        ty.span,
                    );
                    return Type::class(class.name, Vec::new());
                }
                let args = args.iter().map(|arg| self.resolve_type_arg(ctx, arg)).collect();
                Type::class(class.name, args)
            }
        }
    }

    fn resolve_type_arg(&mut self, ctx: &TypeContext, arg: &TypeArg) -> Type {
        match arg {
            TypeArg::Type(ty) => {
                let resolved = self.resolve_type_ref(ctx, ty);
                if resolved.is_primitive() {
                    self.report_at(
                        ErrorKind::UndefinedClass,
                        "type arguments must be reference types",
                        ty.span,
                    );
                    return Type::Unknown;
                }
                resolved
            }
            TypeArg::Wildcard { bound: None, .. } => Type::Wildcard(WildcardBound::Unbounded),
            TypeArg::Wildcard {
                bound: Some((kind, ty)),
                ..
            } => {
                let bound = Box::new(self.resolve_type_ref(ctx, ty));
                Type::Wildcard(match kind {
                    WildcardKind::Extends => WildcardBound::Extends(bound),
                    WildcardKind::Super => WildcardBound::Super(bound),
                })
            }
        }
    }

    /// Assignment conversion of `value` (already checked, of type `from`) to `to`, with
    /// narrowing of small integer constants.
    pub(crate) fn check_assignable(&mut self, value: &Expr, from: &Type, to: &Type) -> bool {
        if from.is_void() {
            self.report(
                ErrorKind::VoidExpression,
                "'void' type not allowed here",
                value.id,
                value.span,
            );
            return false;
        }
        let boxing = self.allow_boxing();
        if is_assignable(&self.env, from, to, boxing) {
            return true;
        }
        if let Some(constant) = self.int_constant(value) {
            if constant_fits(constant, to, boxing) {
                return true;
            }
        }
        if !boxing && is_assignable(&self.env, from, to, true) {
            self.report(
                ErrorKind::BoxingProhibited,
                format!("boxing conversion from {from} to {to} is prohibited"),
                value.id,
                value.span,
            );
        } else {
            self.report(
                ErrorKind::AssignmentTypes,
                format!("incompatible types: {from} cannot be converted to {to}"),
                value.id,
                value.span,
            );
        }
        false
    }

    /// Reports access to a member of `owner` that the current context may not see.
    pub(crate) fn check_access(
        &mut self,
        ctx: &TypeContext,
        owner: &str,
        modifiers: Modifiers,
        what: &str,
        node: NodeId,
        span: Span,
    ) {
        let options = ctx.options();
        let current = ctx.current_class();
        let denied = if modifiers.is_private() {
            options.enforces_private_access()
                && current.map(top_level) != Some(top_level(owner))
        } else if !options.enforce_all_access || modifiers.is_public() {
            false
        } else {
            let same_package = package_of(owner) == ctx.package();
            let subclass = current.is_some_and(|c| {
                is_subtype(
                    &self.env,
                    &Type::class(c, Vec::new()),
                    &Type::class(owner, Vec::new()),
                )
            });
            !(same_package || (modifiers.is_protected() && subclass))
        };
        if denied {
            let access = if modifiers.is_private() {
                "private"
            } else if modifiers.is_protected() {
                "protected"
            } else {
                "package-private"
            };
            self.report(
                ErrorKind::IllegalAccess,
                format!("{what} has {access} access in {}", dj_types::source_name(owner)),
                node,
                span,
            );
        }
    }

    /// Value of an `int`-typed compile-time constant expression.
    pub(crate) fn int_constant(&self, expr: &Expr) -> Option<i64> {
        let value = self.fold_int(expr)?;
        match self.table.type_of(expr.id) {
            Some(Type::Primitive(
                PrimitiveType::Int | PrimitiveType::Short | PrimitiveType::Char | PrimitiveType::Byte,
            )) => Some(i64::from(value)),
            _ => None,
        }
    }

    fn fold_int(&self, expr: &Expr) -> Option<i32> {
        match &expr.kind {
            ExprKind::Literal(Literal::Int(v)) => Some(*v),
            ExprKind::Literal(Literal::Char(c)) => Some(i32::from(*c)),
            ExprKind::Unary { op, operand } => {
                let v = self.fold_int(operand)?;
                match op {
                    UnaryOp::Plus => Some(v),
                    UnaryOp::Minus => Some(v.wrapping_neg()),
                    UnaryOp::BitNot => Some(!v),
                    _ => None,
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let (a, b) = (self.fold_int(lhs)?, self.fold_int(rhs)?);
                match op {
                    BinaryOp::Add => Some(a.wrapping_add(b)),
                    BinaryOp::Sub => Some(a.wrapping_sub(b)),
                    BinaryOp::Mul => Some(a.wrapping_mul(b)),
                    BinaryOp::Div if b != 0 => Some(a.wrapping_div(b)),
                    BinaryOp::Rem if b != 0 => Some(a.wrapping_rem(b)),
                    BinaryOp::Shl => Some(a.wrapping_shl(b as u32 & 31)),
                    BinaryOp::Shr => Some(a.wrapping_shr(b as u32 & 31)),
                    BinaryOp::UShr => Some(((a as u32) >> (b as u32 & 31)) as i32),
                    BinaryOp::BitAnd => Some(a & b),
                    BinaryOp::BitOr => Some(a | b),
                    BinaryOp::BitXor => Some(a ^ b),
                    _ => None,
                }
            }
            ExprKind::Cast { expr: inner, .. } => {
                let v = self.fold_int(inner)?;
                match self.table.type_of(expr.id)? {
                    Type::Primitive(PrimitiveType::Int) => Some(v),
                    Type::Primitive(PrimitiveType::Short) => Some(i32::from(v as i16)),
                    Type::Primitive(PrimitiveType::Char) => Some(i32::from(v as u16)),
                    Type::Primitive(PrimitiveType::Byte) => Some(i32::from(v as i8)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Erases a type mentioning type variables that are not in scope here (uninferred method
    /// type parameters of a callee).
    pub(crate) fn normalize_foreign_type_vars(&self, ctx: &TypeContext, ty: Type) -> Type {
        fn foreign(ctx: &TypeContext, ty: &Type) -> bool {
            match ty {
                Type::TypeVar(tv) => !ctx.type_var_in_scope(&tv.name),
                Type::Class(c) => c.args.iter().any(|a| foreign(ctx, a)),
                Type::Array(elem) => foreign(ctx, elem),
                Type::Wildcard(WildcardBound::Extends(b) | WildcardBound::Super(b)) => {
                    foreign(ctx, b)
                }
                _ => false,
            }
        }
        if foreign(ctx, &ty) {
            ty.erasure()
        } else {
            ty
        }
    }
}

/// Outermost class of a binary name: `p.A$B` is nested in `p.A`.
pub(crate) fn top_level(name: &str) -> &str {
    name.split('$').next().unwrap_or(name)
}
