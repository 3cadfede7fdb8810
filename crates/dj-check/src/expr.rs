//! Expression typing.

use dj_core::PrimitiveType;
use dj_syntax::ast::{BinaryOp, Expr, ExprKind, Literal, TypeRef, UnaryOp};
use dj_types::members::{find_field, resolve_constructor, resolve_method, LookupError};
use dj_types::system::{
    binary_numeric_promotion, boxed, is_castable, is_subtype, is_unchecked_cast,
    numeric_operand, unary_numeric_promotion, unboxed,
};
use dj_types::{names, source_name, FieldRef, Library, MethodRef, Type};

use crate::checker::Checker;
use crate::context::{MethodKind, TypeContext, VarBinding};
use crate::error::ErrorKind;
use crate::table::Resolution;

/// How a name or qualified name is classified before it is used.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Classified {
    Value(Type),
    Type(Type),
    Package(String),
}

impl Checker {
    /// Types `expr`, records the result in the side table and returns it. Failures are
    /// reported and yield [`Type::Unknown`], which later checks accept silently.
    pub fn check_expr(&mut self, ctx: &TypeContext, expr: &Expr) -> Type {
        let ty = self.expr_type(ctx, expr);
        self.table.set_type(expr.id, ty.clone());
        ty
    }

    /// Types an initializer against its target, allowing a bare `{..}` array initializer.
    pub fn check_initializer(&mut self, ctx: &TypeContext, expr: &Expr, target: &Type) -> Type {
        if let ExprKind::ArrayInit(elems) = &expr.kind {
            return self.check_array_init(ctx, expr, elems, target);
        }
        let ty = self.check_expr(ctx, expr);
        if !ty.is_unknown() && !target.is_unknown() {
            self.check_assignable(expr, &ty, target);
        }
        ty
    }

    fn check_array_init(&mut self, ctx: &TypeContext, expr: &Expr, elems: &[Expr], target: &Type) -> Type {
        let Some(elem_ty) = target.element_type().cloned() else {
            if !target.is_unknown() {
                self.report(
                    ErrorKind::AssignmentTypes,
                    format!("illegal initializer for {target}"),
                    expr.id,
                    expr.span,
                );
            }
            for elem in elems {
                self.check_initializer(ctx, elem, &Type::Unknown);
            }
            self.table.set_type(expr.id, Type::Unknown);
            return Type::Unknown;
        };
        for elem in elems {
            self.check_initializer(ctx, elem, &elem_ty);
        }
        self.table.set_type(expr.id, target.clone());
        target.clone()
    }

    fn expr_type(&mut self, ctx: &TypeContext, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::Literal(lit) => literal_type(lit),
            ExprKind::Name(_) | ExprKind::FieldAccess { .. } => {
                match self.classify(ctx, expr) {
                    Some(Classified::Value(ty)) => ty,
                    Some(Classified::Type(ty)) => {
                        self.report(
                            ErrorKind::UndefinedName,
                            format!("cannot find symbol: variable {}", simple_display(&ty)),
                            expr.id,
                            expr.span,
                        );
                        Type::Unknown
                    }
                    Some(Classified::Package(name)) => {
                        self.report(
                            ErrorKind::UndefinedName,
                            format!("cannot find symbol: {name}"),
                            expr.id,
                            expr.span,
                        );
                        Type::Unknown
                    }
                    None => Type::Unknown,
                }
            }
            ExprKind::ArrayAccess { array, index } => {
                let array_ty = self.check_expr(ctx, array);
                let index_ty = self.check_expr(ctx, index);
                self.expect_int_index(index, &index_ty);
                match array_ty {
                    Type::Unknown => Type::Unknown,
                    Type::Array(elem) => *elem,
                    other => {
                        self.report(
                            ErrorKind::ArrayExpected,
                            format!("array required, but {other} found"),
                            expr.id,
                            expr.span,
                        );
                        Type::Unknown
                    }
                }
            }
            ExprKind::MethodCall {
                receiver,
                name,
                args,
                ..
            } => self.check_call(ctx, expr, receiver.as_deref(), name, args),
            ExprKind::This => self.this_type(ctx, expr),
            ExprKind::Super => {
                self.report(
                    ErrorKind::VariableExpected,
                    "'super' is only allowed as a member receiver",
                    expr.id,
                    expr.span,
                );
                Type::Unknown
            }
            ExprKind::New { ty, args } => self.check_new(ctx, expr, ty, args),
            ExprKind::NewArray {
                elem,
                dims,
                extra_dims,
                init,
            } => {
                let elem_ty = self.resolve_type_ref(ctx, elem);
                for dim in dims {
                    let dim_ty = self.check_expr(ctx, dim);
                    self.expect_int_index(dim, &dim_ty);
                }
                if elem_ty.is_unknown() {
                    return Type::Unknown;
                }
                let ty = (0..dims.len() + extra_dims).fold(elem_ty, |t, _| Type::array(t));
                if let Some(init) = init {
                    self.check_initializer(ctx, init, &ty);
                }
                ty
            }
            ExprKind::ArrayInit(elems) => {
                self.report(
                    ErrorKind::AssignmentTypes,
                    "array initializer is only allowed with a declared array type",
                    expr.id,
                    expr.span,
                );
                for elem in elems {
                    self.check_expr(ctx, elem);
                }
                Type::Unknown
            }
            ExprKind::Unary { op, operand } => self.check_unary(ctx, expr, *op, operand),
            ExprKind::Binary { op, lhs, rhs } => {
                let a = self.check_expr(ctx, lhs);
                let b = self.check_expr(ctx, rhs);
                self.binary_result(expr, *op, &a, &b)
            }
            ExprKind::Assign { op, target, value } => {
                self.check_assign(ctx, expr, *op, target, value)
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.check_condition(ctx, cond);
                let a = self.check_expr(ctx, then_expr);
                let b = self.check_expr(ctx, else_expr);
                self.conditional_type(expr, &a, &b)
            }
            ExprKind::Cast { ty, expr: inner } => {
                let to = self.resolve_type_ref(ctx, ty);
                let from = self.check_expr(ctx, inner);
                self.check_cast(expr, &from, &to);
                to
            }
            ExprKind::InstanceOf { expr: inner, ty } => {
                let to = self.resolve_type_ref(ctx, ty);
                let from = self.check_expr(ctx, inner);
                if from.is_unknown() || to.is_unknown() {
                    return Type::BOOLEAN;
                }
                if !from.is_reference() || !to.is_reference() {
                    self.report(
                        ErrorKind::OperandTypes,
                        format!("unexpected type for instanceof: {from} and {to}"),
                        expr.id,
                        expr.span,
                    );
                } else if !is_castable(self.env(), &from, &to) {
                    self.report(
                        ErrorKind::CastTypes,
                        format!("incompatible types: {from} cannot be converted to {to}"),
                        expr.id,
                        expr.span,
                    );
                }
                self.table.resolve(expr.id, Resolution::Type(to));
                Type::BOOLEAN
            }
        }
    }

    /// A condition of `if`, a loop or `?:`.
    pub(crate) fn check_condition(&mut self, ctx: &TypeContext, cond: &Expr) {
        let ty = self.check_expr(ctx, cond);
        if !ty.is_unknown() && !self.is_boolean_operand(&ty) {
            self.report(
                ErrorKind::ConditionType,
                format!("incompatible types: {ty} cannot be converted to boolean"),
                cond.id,
                cond.span,
            );
        }
    }

    fn is_boolean_operand(&self, ty: &Type) -> bool {
        ty.is_boolean() || (self.allow_boxing() && unboxed(ty) == Some(PrimitiveType::Boolean))
    }

    fn expect_int_index(&mut self, expr: &Expr, ty: &Type) {
        if ty.is_unknown() {
            return;
        }
        let promoted = numeric_operand(ty, self.allow_boxing()).and_then(unary_numeric_promotion);
        if promoted != Some(PrimitiveType::Int) {
            self.report(
                ErrorKind::IntegralExpected,
                format!("incompatible types: {ty} cannot be converted to int"),
                expr.id,
                expr.span,
            );
        }
    }

    fn this_type(&mut self, ctx: &TypeContext, expr: &Expr) -> Type {
        let Some(def) = ctx.current_class_def() else {
            self.report(
                ErrorKind::UndefinedName,
                "'this' is only allowed inside a class",
                expr.id,
                expr.span,
            );
            return Type::Unknown;
        };
        if ctx.is_static() {
            self.report(
                ErrorKind::StaticContext,
                "non-static variable this cannot be referenced from a static context",
                expr.id,
                expr.span,
            );
        }
        def.this_type()
    }

    /// Static type of `super` as a receiver.
    fn super_type(&mut self, ctx: &TypeContext, expr: &Expr) -> Type {
        let Some(def) = ctx.current_class_def() else {
            self.report(
                ErrorKind::UndefinedName,
                "'super' is only allowed inside a class",
                expr.id,
                expr.span,
            );
            return Type::Unknown;
        };
        if ctx.is_static() {
            self.report(
                ErrorKind::StaticContext,
                "non-static variable super cannot be referenced from a static context",
                expr.id,
                expr.span,
            );
        }
        let ty = def.super_class.clone().unwrap_or_else(Type::object);
        self.table.set_type(expr.id, ty.clone());
        ty
    }

    /// Classifies a simple or qualified name as a value, a type or a package prefix.
    pub(crate) fn classify(&mut self, ctx: &TypeContext, expr: &Expr) -> Option<Classified> {
        match &expr.kind {
            ExprKind::Name(name) => {
                if let Some(binding) = ctx.lookup_var(name) {
                    return Some(Classified::Value(self.bind_var(ctx, expr, name, binding)));
                }
                if let Some(binary) = ctx.resolve_simple(name) {
                    let ty = Type::class(binary, Vec::new());
                    self.table.resolve(expr.id, Resolution::Type(ty.clone()));
                    self.table.set_type(expr.id, ty.clone());
                    return Some(Classified::Type(ty));
                }
                if ctx.type_var_in_scope(name) {
                    self.report(
                        ErrorKind::UndefinedName,
                        format!("type variable {name} cannot be used here"),
                        expr.id,
                        expr.span,
                    );
                    return None;
                }
                self.table.resolve(expr.id, Resolution::Package(name.clone()));
                Some(Classified::Package(name.clone()))
            }
            ExprKind::FieldAccess { receiver, name, .. } => {
                let outer = if matches!(receiver.kind, ExprKind::Super) {
                    Classified::Value(self.super_type(ctx, receiver))
                } else if matches!(receiver.kind, ExprKind::Name(_) | ExprKind::FieldAccess { .. }) {
                    self.classify(ctx, receiver)?
                } else {
                    Classified::Value(self.check_expr(ctx, receiver))
                };
                match outer {
                    Classified::Value(ty) => {
                        if !matches!(receiver.kind, ExprKind::Super) {
                            self.table.set_type(receiver.id, ty.clone());
                        }
                        self.member_field(ctx, expr, &ty, name).map(Classified::Value)
                    }
                    Classified::Type(ty) => self.static_member(ctx, expr, &ty, name),
                    Classified::Package(package) => {
                        let qualified = format!("{package}.{name}");
                        if self.env().type_exists(&qualified) {
                            let ty = Type::class(qualified, Vec::new());
                            self.table.resolve(expr.id, Resolution::Type(ty.clone()));
                            self.table.set_type(expr.id, ty.clone());
                            Some(Classified::Type(ty))
                        } else if matches!(receiver.kind, ExprKind::Name(_))
                            && !self.env().package_exists(&package)
                            && !self.env().package_exists(&qualified)
                        {
                            self.report(
                                ErrorKind::UndefinedName,
                                format!("cannot find symbol: {package}"),
                                receiver.id,
                                receiver.span,
                            );
                            None
                        } else {
                            self.table.resolve(expr.id, Resolution::Package(qualified.clone()));
                            Some(Classified::Package(qualified))
                        }
                    }
                }
            }
            _ => Some(Classified::Value(self.check_expr(ctx, expr))),
        }
    }

    fn bind_var(&mut self, ctx: &TypeContext, expr: &Expr, name: &str, binding: VarBinding) -> Type {
        match binding {
            VarBinding::Local(var) => {
                self.table.resolve(expr.id, Resolution::Local(name.to_string()));
                var.ty
            }
            VarBinding::Field { field, from_static } => {
                if from_static {
                    self.report(
                        ErrorKind::StaticContext,
                        format!(
                            "non-static variable {name} cannot be referenced from a static context"
                        ),
                        expr.id,
                        expr.span,
                    );
                }
                self.check_access(ctx, &field.owner, field.modifiers, name, expr.id, expr.span);
                let ty = field.ty.clone();
                self.table.resolve(expr.id, Resolution::Field(field));
                ty
            }
        }
    }

    /// `value.name`: an instance or static field, or an array's `length`.
    fn member_field(&mut self, ctx: &TypeContext, expr: &Expr, receiver: &Type, name: &str) -> Option<Type> {
        if receiver.is_unknown() {
            return Some(Type::Unknown);
        }
        if matches!(receiver, Type::Array(_)) && name == "length" {
            self.table.resolve(expr.id, Resolution::ArrayLength);
            return Some(Type::INT);
        }
        let found = if receiver.is_primitive() || matches!(receiver, Type::Null | Type::Void) {
            None
        } else {
            find_field(self.env(), receiver, name)
        };
        let Some(field) = found else {
            self.report(
                ErrorKind::NoSuchField,
                format!("cannot find field {name} in {receiver}"),
                expr.id,
                expr.span,
            );
            return None;
        };
        Some(self.use_field(ctx, expr, field))
    }

    fn use_field(&mut self, ctx: &TypeContext, expr: &Expr, field: FieldRef) -> Type {
        self.check_access(ctx, &field.owner, field.modifiers, &field.name, expr.id, expr.span);
        let ty = field.ty.clone();
        self.table.resolve(expr.id, Resolution::Field(field));
        ty
    }

    /// `Type.name`: a static field or a member class.
    fn static_member(&mut self, ctx: &TypeContext, expr: &Expr, owner: &Type, name: &str) -> Option<Classified> {
        if let Some(field) = find_field(self.env(), owner, name) {
            if !field.is_static() {
                self.report(
                    ErrorKind::StaticContext,
                    format!("non-static variable {name} cannot be referenced from a static context"),
                    expr.id,
                    expr.span,
                );
            }
            return Some(Classified::Value(self.use_field(ctx, expr, field)));
        }
        let owner_name = owner.class_name()?;
        if let Some(member) = ctx.member_type(owner_name, name) {
            let ty = Type::class(member, Vec::new());
            self.table.resolve(expr.id, Resolution::Type(ty.clone()));
            self.table.set_type(expr.id, ty.clone());
            return Some(Classified::Type(ty));
        }
        self.report(
            ErrorKind::NoSuchField,
            format!("cannot find field {name} in {}", source_name(owner_name)),
            expr.id,
            expr.span,
        );
        None
    }

    fn check_args(&mut self, ctx: &TypeContext, args: &[Expr]) -> Option<Vec<Type>> {
        let types: Vec<Type> = args.iter().map(|arg| self.check_expr(ctx, arg)).collect();
        for (arg, ty) in args.iter().zip(&types) {
            if ty.is_void() {
                self.report(ErrorKind::VoidExpression, "'void' type not allowed here", arg.id, arg.span);
                return None;
            }
        }
        if types.iter().any(Type::is_unknown) {
            None
        } else {
            Some(types)
        }
    }

    fn check_call(
        &mut self,
        ctx: &TypeContext,
        expr: &Expr,
        receiver: Option<&Expr>,
        name: &str,
        args: &[Expr],
    ) -> Type {
        enum Target {
            Unqualified { from_static: bool },
            Super,
            Value,
            Static,
        }
        let (receiver_ty, target) = match receiver {
            None => {
                let Some(host) = ctx.method_host(name) else {
                    self.check_args(ctx, args);
                    self.report(
                        ErrorKind::NoSuchMethod,
                        format!("cannot find method {name}"),
                        expr.id,
                        expr.span,
                    );
                    return Type::Unknown;
                };
                (host.receiver, Target::Unqualified { from_static: host.from_static })
            }
            Some(r) if matches!(r.kind, ExprKind::Super) => (self.super_type(ctx, r), Target::Super),
            Some(r) => match self.classify(ctx, r) {
                Some(Classified::Value(ty)) => {
                    self.table.set_type(r.id, ty.clone());
                    (ty, Target::Value)
                }
                Some(Classified::Type(ty)) => (ty, Target::Static),
                Some(Classified::Package(package)) => {
                    self.report(
                        ErrorKind::UndefinedName,
                        format!("cannot find symbol: {package}"),
                        r.id,
                        r.span,
                    );
                    self.check_args(ctx, args);
                    return Type::Unknown;
                }
                None => {
                    self.check_args(ctx, args);
                    return Type::Unknown;
                }
            },
        };
        let Some(arg_types) = self.check_args(ctx, args) else {
            return Type::Unknown;
        };
        if receiver_ty.is_unknown() {
            return Type::Unknown;
        }
        if receiver_ty.is_primitive() || matches!(receiver_ty, Type::Null | Type::Void) {
            self.report(
                ErrorKind::NoSuchMethod,
                format!("{receiver_ty} cannot be dereferenced"),
                expr.id,
                expr.span,
            );
            return Type::Unknown;
        }
        let method = match resolve_method(self.env(), &receiver_ty, name, &arg_types, self.allow_boxing()) {
            Ok(method) => method,
            Err(err) => {
                self.report_lookup_error(err, expr, name, &receiver_ty, &arg_types);
                return Type::Unknown;
            }
        };
        match target {
            Target::Unqualified { from_static } if from_static && !method.is_static() => {
                self.report(
                    ErrorKind::StaticContext,
                    format!(
                        "non-static method {} cannot be referenced from a static context",
                        method.signature()
                    ),
                    expr.id,
                    expr.span,
                );
            }
            Target::Static if !method.is_static() => {
                self.report(
                    ErrorKind::StaticContext,
                    format!(
                        "non-static method {} cannot be referenced from a static context",
                        method.signature()
                    ),
                    expr.id,
                    expr.span,
                );
            }
            Target::Super if method.is_abstract() => {
                self.report(
                    ErrorKind::AbstractMethod,
                    format!("abstract method {} cannot be accessed directly", method.signature()),
                    expr.id,
                    expr.span,
                );
            }
            _ => {}
        }
        self.check_access(ctx, &method.owner, method.modifiers, &method.signature(), expr.id, expr.span);
        let ret = self.normalize_foreign_type_vars(ctx, method.return_ty.clone());
        let resolution = match target {
            Target::Super => Resolution::SuperMethod(method),
            _ => Resolution::Method(method),
        };
        self.table.resolve(expr.id, resolution);
        ret
    }

    fn report_lookup_error(&mut self, err: LookupError, expr: &Expr, name: &str, owner: &Type, args: &[Type]) {
        let args_display = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        match err {
            LookupError::NotFound => {
                let kind = if name == "<init>" {
                    ErrorKind::NoSuchConstructor
                } else {
                    ErrorKind::NoSuchMethod
                };
                let shown = if name == "<init>" {
                    owner.class_name().map(dj_types::simple_name).unwrap_or("?").to_string()
                } else {
                    name.to_string()
                };
                self.report(
                    kind,
                    format!("no applicable {}({args_display}) in {owner}", shown),
                    expr.id,
                    expr.span,
                );
            }
            LookupError::Ambiguous(candidates) => {
                let sigs: Vec<String> = candidates.iter().map(MethodRef::signature).collect();
                self.report(
                    ErrorKind::AmbiguousMethod,
                    format!("reference to {name} is ambiguous: {}", sigs.join(" and ")),
                    expr.id,
                    expr.span,
                );
            }
        }
    }

    fn check_new(&mut self, ctx: &TypeContext, expr: &Expr, ty: &TypeRef, args: &[Expr]) -> Type {
        let class_ty = self.resolve_type_ref(ctx, ty);
        let arg_types = self.check_args(ctx, args);
        let Type::Class(class) = &class_ty else {
            if !class_ty.is_unknown() {
                self.report(
                    ErrorKind::ClassExpected,
                    format!("cannot instantiate {class_ty}"),
                    expr.id,
                    expr.span,
                );
            }
            return Type::Unknown;
        };
        let Some(def) = self.env().lookup_class(&class.name) else {
            return Type::Unknown;
        };
        if def.is_interface() || def.modifiers.is_abstract() {
            self.report(
                ErrorKind::AbstractInstantiation,
                format!("{} is abstract; cannot be instantiated", source_name(&def.name)),
                expr.id,
                expr.span,
            );
            return class_ty;
        }
        let Some(arg_types) = arg_types else {
            return class_ty;
        };
        match resolve_constructor(self.env(), class, &arg_types, self.allow_boxing()) {
            Ok(ctor) => {
                self.check_access(ctx, &ctor.owner, ctor.modifiers, def.simple_name(), expr.id, expr.span);
                self.table.resolve(expr.id, Resolution::Constructor(ctor));
            }
            Err(err) => self.report_lookup_error(err, expr, "<init>", &class_ty, &arg_types),
        }
        class_ty
    }

    fn check_unary(&mut self, ctx: &TypeContext, expr: &Expr, op: UnaryOp, operand: &Expr) -> Type {
        let ty = if op.is_increment() {
            self.check_target(ctx, operand, true)
        } else {
            self.check_expr(ctx, operand)
        };
        if ty.is_unknown() {
            return Type::Unknown;
        }
        let boxing = self.allow_boxing();
        let bad = |kind: ErrorKind, this: &mut Self| {
            this.report(
                kind,
                format!("bad operand type {ty} for unary operator"),
                expr.id,
                expr.span,
            );
            Type::Unknown
        };
        match op {
            UnaryOp::Plus | UnaryOp::Minus => match numeric_operand(&ty, boxing).and_then(unary_numeric_promotion) {
                Some(p) => Type::Primitive(p),
                None => bad(ErrorKind::NumericExpected, self),
            },
            UnaryOp::BitNot => match numeric_operand(&ty, boxing)
                .filter(|p| p.is_integral())
                .and_then(unary_numeric_promotion)
            {
                Some(p) => Type::Primitive(p),
                None => bad(ErrorKind::IntegralExpected, self),
            },
            UnaryOp::Not => {
                if self.is_boolean_operand(&ty) {
                    Type::BOOLEAN
                } else {
                    bad(ErrorKind::OperandTypes, self)
                }
            }
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                if numeric_operand(&ty, boxing).is_some() {
                    ty.clone()
                } else {
                    bad(ErrorKind::NumericExpected, self)
                }
            }
        }
    }

    /// Result type of `a op b`, reporting incompatible operands.
    pub(crate) fn binary_result(&mut self, expr: &Expr, op: BinaryOp, a: &Type, b: &Type) -> Type {
        if a.is_unknown() || b.is_unknown() {
            return Type::Unknown;
        }
        let boxing = self.allow_boxing();
        let numeric = || {
            let (x, y) = (numeric_operand(a, boxing)?, numeric_operand(b, boxing)?);
            binary_numeric_promotion(x, y)
        };
        let result = match op {
            BinaryOp::Add if (a.is_string() || b.is_string()) && !a.is_void() && !b.is_void() => {
                Some(Type::string())
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                numeric().map(Type::Primitive)
            }
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => {
                let lhs = numeric_operand(a, boxing).filter(|p| p.is_integral());
                let rhs = numeric_operand(b, boxing).filter(|p| p.is_integral());
                match (lhs, rhs) {
                    (Some(l), Some(_)) => unary_numeric_promotion(l).map(Type::Primitive),
                    _ => None,
                }
            }
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => numeric().map(|_| Type::BOOLEAN),
            BinaryOp::Eq | BinaryOp::Ne => {
                let references = (a.is_reference() || matches!(a, Type::Null))
                    && (b.is_reference() || matches!(b, Type::Null));
                let ok = if references {
                    is_castable(self.env(), a, b)
                } else {
                    numeric().is_some()
                        || (self.is_boolean_operand(a) && self.is_boolean_operand(b))
                };
                ok.then_some(Type::BOOLEAN)
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                if self.is_boolean_operand(a) && self.is_boolean_operand(b) {
                    Some(Type::BOOLEAN)
                } else {
                    numeric()
                        .filter(|p| p.is_integral())
                        .map(Type::Primitive)
                }
            }
            BinaryOp::And | BinaryOp::Or => {
                (self.is_boolean_operand(a) && self.is_boolean_operand(b)).then_some(Type::BOOLEAN)
            }
        };
        match result {
            Some(ty) => ty,
            None => {
                let kind = match op {
                    BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem | BinaryOp::Sub | BinaryOp::Add
                    | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
                        ErrorKind::NumericExpected
                    }
                    BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => ErrorKind::IntegralExpected,
                    _ => ErrorKind::OperandTypes,
                };
                self.report(
                    kind,
                    format!("bad operand types for {}: {a} and {b}", op.symbol()),
                    expr.id,
                    expr.span,
                );
                Type::Unknown
            }
        }
    }

    /// Checks an assignable location and returns its type.
    pub(crate) fn check_target(&mut self, ctx: &TypeContext, target: &Expr, compound: bool) -> Type {
        match &target.kind {
            ExprKind::Name(name) => {
                let ty = match ctx.lookup_var(name) {
                    Some(VarBinding::Local(var)) => {
                        if var.is_final && (var.initialized || compound) {
                            self.report(
                                ErrorKind::CannotModify,
                                format!("cannot assign a value to final variable {name}"),
                                target.id,
                                target.span,
                            );
                        }
                        self.table.resolve(target.id, Resolution::Local(name.clone()));
                        var.ty
                    }
                    Some(binding @ VarBinding::Field { .. }) => {
                        let ty = self.bind_var(ctx, target, name, binding);
                        self.check_final_field(ctx, target);
                        ty
                    }
                    None => {
                        self.report(
                            ErrorKind::UndefinedName,
                            format!("cannot find symbol: variable {name}"),
                            target.id,
                            target.span,
                        );
                        Type::Unknown
                    }
                };
                self.table.set_type(target.id, ty.clone());
                ty
            }
            ExprKind::FieldAccess { .. } => {
                let ty = self.check_expr(ctx, target);
                if matches!(self.table.resolution(target.id), Some(Resolution::ArrayLength)) {
                    self.report(
                        ErrorKind::CannotModify,
                        "cannot assign a value to final variable length",
                        target.id,
                        target.span,
                    );
                }
                self.check_final_field(ctx, target);
                ty
            }
            ExprKind::ArrayAccess { .. } => self.check_expr(ctx, target),
            _ => {
                self.check_expr(ctx, target);
                self.report(
                    ErrorKind::VariableExpected,
                    "unexpected type: required variable, found value",
                    target.id,
                    target.span,
                );
                Type::Unknown
            }
        }
    }

    /// A final field may only be set by the constructors and initializers of its class.
    fn check_final_field(&mut self, ctx: &TypeContext, target: &Expr) {
        let Some(Resolution::Field(field)) = self.table.resolution(target.id) else {
            return;
        };
        if !field.modifiers.is_final() {
            return;
        }
        let in_initializer = matches!(
            ctx.method(),
            Some((_, MethodKind::Constructor | MethodKind::Initializer))
        );
        if in_initializer && ctx.current_class() == Some(field.owner.as_str()) {
            return;
        }
        let message = format!("cannot assign a value to final variable {}", field.name);
        self.report(ErrorKind::CannotModify, message, target.id, target.span);
    }

    fn check_assign(
        &mut self,
        ctx: &TypeContext,
        expr: &Expr,
        op: Option<BinaryOp>,
        target: &Expr,
        value: &Expr,
    ) -> Type {
        let target_ty = self.check_target(ctx, target, op.is_some());
        let Some(op) = op else {
            self.check_initializer(ctx, value, &target_ty);
            return target_ty;
        };
        let value_ty = self.check_expr(ctx, value);
        if target_ty.is_unknown() || value_ty.is_unknown() {
            return target_ty;
        }
        if op == BinaryOp::Add && target_ty.is_string() {
            if value_ty.is_void() {
                self.report(ErrorKind::VoidExpression, "'void' type not allowed here", value.id, value.span);
            }
            return target_ty;
        }
        let result = self.binary_result(expr, op, &target_ty, &value_ty);
        if !result.is_unknown() && !is_castable(self.env(), &result, &target_ty) {
            self.report(
                ErrorKind::AssignmentTypes,
                format!("incompatible types: {result} cannot be converted to {target_ty}"),
                expr.id,
                expr.span,
            );
        }
        target_ty
    }

    fn conditional_type(&mut self, expr: &Expr, a: &Type, b: &Type) -> Type {
        if a.is_unknown() || b.is_unknown() {
            return Type::Unknown;
        }
        if a == b {
            return a.clone();
        }
        let boxing = self.allow_boxing();
        if a.is_primitive() || b.is_primitive() {
            if let (Some(x), Some(y)) = (numeric_operand(a, boxing), numeric_operand(b, boxing)) {
                if x == y {
                    return Type::Primitive(x);
                }
                if let Some(p) = binary_numeric_promotion(x, y) {
                    return Type::Primitive(p);
                }
            }
            if self.is_boolean_operand(a) && self.is_boolean_operand(b) {
                return Type::BOOLEAN;
            }
            match (a, b) {
                (Type::Primitive(p), Type::Null) | (Type::Null, Type::Primitive(p)) if boxing => {
                    return boxed(*p);
                }
                _ => {}
            }
        } else {
            if matches!(a, Type::Null) {
                return b.clone();
            }
            if matches!(b, Type::Null) {
                return a.clone();
            }
            if is_subtype(self.env(), a, b) {
                return b.clone();
            }
            if is_subtype(self.env(), b, a) {
                return a.clone();
            }
            if a.is_reference() && b.is_reference() {
                return Type::object();
            }
        }
        self.report(
            ErrorKind::OperandTypes,
            format!("incompatible types in conditional expression: {a} and {b}"),
            expr.id,
            expr.span,
        );
        Type::Unknown
    }

    fn check_cast(&mut self, expr: &Expr, from: &Type, to: &Type) {
        if from.is_unknown() || to.is_unknown() {
            return;
        }
        if from.is_void() {
            self.report(ErrorKind::VoidExpression, "'void' type not allowed here", expr.id, expr.span);
            return;
        }
        if !is_castable(self.env(), from, to) {
            self.report(
                ErrorKind::CastTypes,
                format!("incompatible types: {from} cannot be converted to {to}"),
                expr.id,
                expr.span,
            );
            return;
        }
        let converts_boxing = from.is_primitive() != to.is_primitive() && !matches!(from, Type::Null);
        if converts_boxing && !self.allow_boxing() {
            self.report(
                ErrorKind::BoxingProhibited,
                format!("boxing conversion from {from} to {to} is prohibited"),
                expr.id,
                expr.span,
            );
            return;
        }
        if self.options().prohibit_unchecked_casts && is_unchecked_cast(self.env(), from, to) {
            self.report(
                ErrorKind::UncheckedCast,
                format!("unchecked cast from {from} to {to}"),
                expr.id,
                expr.span,
            );
        }
    }
}

pub(crate) fn literal_type(lit: &Literal) -> Type {
    match lit {
        Literal::Int(_) => Type::INT,
        Literal::Long(_) => Type::LONG,
        Literal::Float(_) => Type::FLOAT,
        Literal::Double(_) => Type::DOUBLE,
        Literal::Char(_) => Type::CHAR,
        Literal::String(_) => Type::string(),
        Literal::Boolean(_) => Type::BOOLEAN,
        Literal::Null => Type::Null,
    }
}

fn simple_display(ty: &Type) -> String {
    match ty.class_name() {
        Some(name) => source_name(name),
        None => ty.to_string(),
    }
}

/// Whether `ty` can be thrown.
pub(crate) fn is_throwable(env: &dyn Library, ty: &Type) -> bool {
    matches!(ty, Type::Null) || is_subtype(env, ty, &Type::class(names::THROWABLE, Vec::new()))
}
