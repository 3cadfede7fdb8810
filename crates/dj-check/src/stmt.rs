//! Statement checking and reachability.

use std::collections::HashSet;
use std::rc::Rc;

use dj_core::PrimitiveType;
use dj_syntax::ast::{Block, Expr, ExprKind, Literal, Stmt, StmtKind, SwitchCase};
use dj_types::system::{is_assignable, is_subtype, iteration_element, supertypes, unboxed};
use dj_types::{names, Type};

use crate::checker::Checker;
use crate::context::{JumpLookup, LocalVar, MethodKind, TypeContext};
use crate::error::ErrorKind;
use crate::expr::is_throwable;
use crate::table::Resolution;

impl Checker {
    pub fn check_block(&mut self, ctx: &Rc<TypeContext>, block: &Block) {
        let mut inner = Rc::clone(ctx);
        for stmt in &block.stmts {
            inner = self.check_stmt(&inner, stmt);
        }
    }

    /// Checks `stmt` and returns the context for the statements that follow it, which
    /// includes any locals it declared.
    pub fn check_stmt(&mut self, ctx: &Rc<TypeContext>, stmt: &Stmt) -> Rc<TypeContext> {
        match &stmt.kind {
            StmtKind::LocalVar {
                is_final,
                declarators,
            } => {
                let mut ctx = Rc::clone(ctx);
                for decl in declarators {
                    let ty = self.resolve_type_ref(&ctx, &decl.ty);
                    if ty.is_void() {
                        self.report(
                            ErrorKind::AssignmentTypes,
                            format!("illegal type void for variable {}", decl.name),
                            decl.id,
                            decl.name_span,
                        );
                    }
                    if ctx.is_local_declared(&decl.name) {
                        self.report(
                            ErrorKind::DuplicateVariable,
                            format!("variable {} is already defined", decl.name),
                            decl.id,
                            decl.name_span,
                        );
                    }
                    if let Some(init) = &decl.init {
                        self.check_initializer(&ctx, init, &ty);
                    }
                    self.table.set_type(decl.id, ty.clone());
                    ctx = ctx.declare_local(
                        decl.name.clone(),
                        LocalVar::new(ty, *is_final, decl.init.is_some()),
                    );
                }
                ctx
            }
            StmtKind::Expr(expr) => self.check_expr_stmt(ctx, expr),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_condition(ctx, cond);
                self.check_stmt(ctx, then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(ctx, else_branch);
                }
                Rc::clone(ctx)
            }
            StmtKind::While { cond, body } => {
                self.check_condition(ctx, cond);
                let loop_ctx = ctx.enter_jump_target(None, true);
                self.check_stmt(&loop_ctx, body);
                Rc::clone(ctx)
            }
            StmtKind::DoWhile { body, cond } => {
                let loop_ctx = ctx.enter_jump_target(None, true);
                self.check_stmt(&loop_ctx, body);
                self.check_condition(ctx, cond);
                Rc::clone(ctx)
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let mut inner = Rc::clone(ctx);
                for stmt in init {
                    inner = self.check_stmt(&inner, stmt);
                }
                if let Some(cond) = cond {
                    self.check_condition(&inner, cond);
                }
                for expr in update {
                    self.check_expr(&inner, expr);
                }
                let loop_ctx = inner.enter_jump_target(None, true);
                self.check_stmt(&loop_ctx, body);
                Rc::clone(ctx)
            }
            StmtKind::ForEach {
                is_final,
                var,
                iterable,
                body,
            } => {
                let iterable_ty = self.check_expr(ctx, iterable);
                let var_ty = self.resolve_type_ref(ctx, &var.ty);
                if !iterable_ty.is_unknown() {
                    match iteration_element(self.env(), &iterable_ty) {
                        Some(elem) if !var_ty.is_unknown() => {
                            if !is_assignable(self.env(), &elem, &var_ty, self.allow_boxing()) {
                                self.report(
                                    ErrorKind::AssignmentTypes,
                                    format!("incompatible types: {elem} cannot be converted to {var_ty}"),
                                    var.id,
                                    var.name_span,
                                );
                            }
                        }
                        Some(_) => {}
                        None => self.report(
                            ErrorKind::ForeachType,
                            format!("for-each not applicable to expression type {iterable_ty}"),
                            iterable.id,
                            iterable.span,
                        ),
                    }
                }
                if ctx.is_local_declared(&var.name) {
                    self.report(
                        ErrorKind::DuplicateVariable,
                        format!("variable {} is already defined", var.name),
                        var.id,
                        var.name_span,
                    );
                }
                self.table.set_type(var.id, var_ty.clone());
                let body_ctx = ctx
                    .enter_jump_target(None, true)
                    .declare_local(var.name.clone(), LocalVar::new(var_ty, *is_final, true));
                self.check_stmt(&body_ctx, body);
                Rc::clone(ctx)
            }
            StmtKind::Labeled { label, body } => {
                let is_loop = is_loop(body);
                let labeled = ctx.enter_jump_target(Some(label.clone()), is_loop);
                self.check_stmt(&labeled, body);
                Rc::clone(ctx)
            }
            StmtKind::Break(label) => {
                self.check_jump(ctx, stmt, label.as_deref(), false);
                Rc::clone(ctx)
            }
            StmtKind::Continue(label) => {
                self.check_jump(ctx, stmt, label.as_deref(), true);
                Rc::clone(ctx)
            }
            StmtKind::Return(value) => {
                self.check_return(ctx, stmt, value.as_ref());
                Rc::clone(ctx)
            }
            StmtKind::Throw(expr) => {
                let ty = self.check_expr(ctx, expr);
                if !ty.is_unknown() && !is_throwable(self.env(), &ty) {
                    self.report(
                        ErrorKind::ThrowableExpected,
                        format!("incompatible types: {ty} cannot be converted to Throwable"),
                        expr.id,
                        expr.span,
                    );
                }
                Rc::clone(ctx)
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => {
                self.check_block(ctx, body);
                for catch in catches {
                    let mut alternatives = Vec::new();
                    for ty_ref in &catch.types {
                        let ty = self.resolve_type_ref(ctx, ty_ref);
                        if !ty.is_unknown() && !is_throwable(self.env(), &ty) {
                            self.report_at(
                                ErrorKind::ThrowableExpected,
                                format!("incompatible types: {ty} cannot be converted to Throwable"),
                                ty_ref.span,
                            );
                        }
                        alternatives.push(ty);
                    }
                    let ty = self.common_catch_type(&alternatives);
                    self.table.set_type(catch.id, ty.clone());
                    self.table.set_catch_types(catch.id, alternatives);
                    let catch_ctx = ctx.declare_local(catch.name.clone(), LocalVar::new(ty, false, true));
                    self.check_block(&catch_ctx, &catch.body);
                }
                if let Some(finally) = finally {
                    self.check_block(ctx, finally);
                }
                Rc::clone(ctx)
            }
            StmtKind::Switch { selector, cases } => {
                self.check_switch(ctx, selector, cases);
                Rc::clone(ctx)
            }
            StmtKind::Block(block) => {
                self.check_block(ctx, block);
                Rc::clone(ctx)
            }
            StmtKind::ConstructorCall { args, .. } => {
                for arg in args {
                    self.check_expr(ctx, arg);
                }
                self.report(
                    ErrorKind::MisplacedConstructorCall,
                    "call to this or super must be the first statement in a constructor",
                    stmt.id,
                    stmt.span,
                );
                Rc::clone(ctx)
            }
            StmtKind::Empty => Rc::clone(ctx),
        }
    }

    /// An expression statement. At interactive top level `x = value` declares `x` when it
    /// is unknown and variable types are optional.
    pub fn check_expr_stmt(&mut self, ctx: &Rc<TypeContext>, expr: &Expr) -> Rc<TypeContext> {
        if let Some((name, value)) = self.implicit_declaration(ctx, expr) {
            let value_ty = self.check_expr(ctx, value);
            let ty = match value_ty {
                Type::Null => Type::object(),
                Type::Void => {
                    self.report(ErrorKind::VoidExpression, "'void' type not allowed here", value.id, value.span);
                    Type::Unknown
                }
                other => other,
            };
            if let ExprKind::Assign { target, .. } = &expr.kind {
                self.table.resolve(target.id, Resolution::Local(name.to_string()));
                self.table.set_type(target.id, ty.clone());
            }
            self.table.set_type(expr.id, ty.clone());
            self.table.mark_implicit_decl(expr.id);
            return ctx.declare_local(name.to_string(), LocalVar::new(ty, false, true));
        }
        self.check_expr(ctx, expr);
        Rc::clone(ctx)
    }

    fn implicit_declaration<'e>(&self, ctx: &TypeContext, expr: &'e Expr) -> Option<(&'e str, &'e Expr)> {
        if self.options().require_variable_type || !ctx.is_interactive_top_level() {
            return None;
        }
        let ExprKind::Assign {
            op: None,
            target,
            value,
        } = &expr.kind
        else {
            return None;
        };
        let ExprKind::Name(name) = &target.kind else {
            return None;
        };
        if ctx.lookup_var(name).is_some() || matches!(value.kind, ExprKind::ArrayInit(_)) {
            return None;
        }
        Some((name.as_str(), value.as_ref()))
    }

    fn check_jump(&mut self, ctx: &TypeContext, stmt: &Stmt, label: Option<&str>, is_continue: bool) {
        let keyword = if is_continue { "continue" } else { "break" };
        match ctx.find_jump_target(label, is_continue) {
            JumpLookup::Found => {}
            JumpLookup::Missing => self.report(
                ErrorKind::MisplacedJump,
                format!("{keyword} outside of loop"),
                stmt.id,
                stmt.span,
            ),
            JumpLookup::NotALoop => self.report(
                ErrorKind::MisplacedJump,
                format!("not a loop label: {}", label.unwrap_or_default()),
                stmt.id,
                stmt.span,
            ),
            JumpLookup::UndefinedLabel => self.report(
                ErrorKind::UndefinedLabel,
                format!("undefined label: {}", label.unwrap_or_default()),
                stmt.id,
                stmt.span,
            ),
        }
    }

    fn check_return(&mut self, ctx: &TypeContext, stmt: &Stmt, value: Option<&Expr>) {
        let method = ctx.method().map(|(ty, kind)| (ty.clone(), kind));
        let return_ty = match method {
            Some((ty, MethodKind::Method)) => ty,
            Some((_, MethodKind::Constructor)) => Type::Void,
            Some((_, MethodKind::Initializer)) | None => {
                if let Some(value) = value {
                    self.check_expr(ctx, value);
                }
                self.report(
                    ErrorKind::MisplacedReturn,
                    "return outside method",
                    stmt.id,
                    stmt.span,
                );
                return;
            }
        };
        match value {
            Some(value) if return_ty.is_void() => {
                self.check_expr(ctx, value);
                self.report(
                    ErrorKind::AssignmentTypes,
                    "incompatible types: unexpected return value",
                    value.id,
                    value.span,
                );
            }
            Some(value) => {
                self.check_initializer(ctx, value, &return_ty);
            }
            None if !return_ty.is_void() => self.report(
                ErrorKind::AssignmentTypes,
                format!("missing return value of type {return_ty}"),
                stmt.id,
                stmt.span,
            ),
            None => {}
        }
    }

    fn check_switch(&mut self, ctx: &Rc<TypeContext>, selector: &Expr, cases: &[SwitchCase]) {
        let selector_ty = self.check_expr(ctx, selector);
        let is_string = selector_ty.is_string();
        let int_like = match selector_ty.as_primitive().or_else(|| {
            if self.allow_boxing() {
                unboxed(&selector_ty)
            } else {
                None
            }
        }) {
            Some(p) => matches!(
                p,
                PrimitiveType::Int | PrimitiveType::Short | PrimitiveType::Char | PrimitiveType::Byte
            ),
            None => false,
        };
        let selector_ok = selector_ty.is_unknown() || is_string || int_like;
        if !selector_ok {
            self.report(
                ErrorKind::SwitchType,
                format!("patterns in switch are not supported; cannot switch on {selector_ty}"),
                selector.id,
                selector.span,
            );
        }
        let label_target = selector_ty
            .as_primitive()
            .map(Type::Primitive)
            .or_else(|| unboxed(&selector_ty).map(Type::Primitive))
            .unwrap_or_else(|| selector_ty.clone());

        let mut seen_ints = HashSet::new();
        let mut seen_strings = HashSet::new();
        let mut has_default = false;
        let mut inner = ctx.enter_jump_target(None, false);
        for case in cases {
            if case.is_default {
                if has_default {
                    self.report_at(ErrorKind::DuplicateDeclaration, "duplicate default label", case.span);
                }
                has_default = true;
            }
            for label in &case.labels {
                let label_ty = self.check_expr(&inner, label);
                if label_ty.is_unknown() || !selector_ok || selector_ty.is_unknown() {
                    continue;
                }
                if is_string {
                    match &label.kind {
                        ExprKind::Literal(Literal::String(s)) => {
                            if !seen_strings.insert(s.clone()) {
                                self.report(ErrorKind::DuplicateDeclaration, "duplicate case label", label.id, label.span);
                            }
                        }
                        _ => self.report(
                            ErrorKind::SwitchType,
                            "constant string expression required",
                            label.id,
                            label.span,
                        ),
                    }
                    continue;
                }
                match self.int_constant(label) {
                    Some(value) => {
                        self.check_assignable(label, &label_ty, &label_target);
                        if !seen_ints.insert(value) {
                            self.report(ErrorKind::DuplicateDeclaration, "duplicate case label", label.id, label.span);
                        }
                    }
                    None => self.report(
                        ErrorKind::SwitchType,
                        "constant expression required",
                        label.id,
                        label.span,
                    ),
                }
            }
            for stmt in &case.body {
                inner = self.check_stmt(&inner, stmt);
            }
        }
    }

    /// Static type of a catch parameter: the single alternative, or the nearest common
    /// superclass of a multi-catch.
    fn common_catch_type(&self, alternatives: &[Type]) -> Type {
        match alternatives {
            [] => Type::Unknown,
            [single] => single.clone(),
            [first, rest @ ..] => {
                if alternatives.iter().any(Type::is_unknown) {
                    return Type::Unknown;
                }
                let Some(class) = first.lookup_class() else {
                    return Type::class(names::THROWABLE, Vec::new());
                };
                supertypes(self.env(), &class)
                    .into_iter()
                    .map(Type::Class)
                    .find(|candidate| rest.iter().all(|alt| is_subtype(self.env(), alt, candidate)))
                    .unwrap_or_else(|| Type::class(names::THROWABLE, Vec::new()))
            }
        }
    }
}

fn is_loop(stmt: &Stmt) -> bool {
    matches!(
        stmt.kind,
        StmtKind::While { .. } | StmtKind::DoWhile { .. } | StmtKind::For { .. } | StmtKind::ForEach { .. }
    )
}

fn is_constant_true(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Literal(Literal::Boolean(true)))
}

/// Whether execution can fall off the end of `block` (a simplified JLS 14.22).
pub fn block_can_complete(block: &Block) -> bool {
    block.stmts.iter().all(can_complete)
}

pub fn can_complete(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) | StmtKind::Throw(_) | StmtKind::Break(_) | StmtKind::Continue(_) => false,
        StmtKind::Block(block) => block_can_complete(block),
        StmtKind::If {
            then_branch,
            else_branch: Some(else_branch),
            ..
        } => can_complete(then_branch) || can_complete(else_branch),
        StmtKind::If { .. } => true,
        StmtKind::While { cond, body } => !is_constant_true(cond) || breaks_out(body, None, false),
        StmtKind::DoWhile { body, cond } => !is_constant_true(cond) || breaks_out(body, None, false),
        StmtKind::For { cond, body, .. } => {
            cond.as_ref().is_some_and(|c| !is_constant_true(c)) || breaks_out(body, None, false)
        }
        StmtKind::Labeled { label, body } => can_complete(body) || breaks_out(body, Some(label), false),
        StmtKind::Switch { cases, .. } => {
            let has_default = cases.iter().any(|c| c.is_default);
            let last_completes = cases.last().map_or(true, |c| c.body.iter().all(can_complete));
            !has_default
                || last_completes
                || cases.iter().any(|c| c.body.iter().any(|s| breaks_out(s, None, false)))
        }
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            let finally_completes = finally.as_ref().map_or(true, block_can_complete);
            finally_completes
                && (block_can_complete(body) || catches.iter().any(|c| block_can_complete(&c.body)))
        }
        _ => true,
    }
}

/// Whether `stmt` contains a `break` leaving the enclosing statement: an unlabeled one not
/// captured by a nested loop or switch (`nested`), or one naming `label`.
fn breaks_out(stmt: &Stmt, label: Option<&str>, nested: bool) -> bool {
    let block_breaks = |block: &Block, nested: bool| block.stmts.iter().any(|s| breaks_out(s, label, nested));
    match &stmt.kind {
        StmtKind::Break(None) => !nested && label.is_none(),
        StmtKind::Break(Some(l)) => label == Some(l.as_str()),
        StmtKind::Block(block) => block_breaks(block, nested),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            breaks_out(then_branch, label, nested)
                || else_branch.as_ref().is_some_and(|e| breaks_out(e, label, nested))
        }
        StmtKind::While { body, .. }
        | StmtKind::DoWhile { body, .. }
        | StmtKind::For { body, .. }
        | StmtKind::ForEach { body, .. } => breaks_out(body, label, true),
        StmtKind::Labeled { body, .. } => breaks_out(body, label, nested),
        StmtKind::Switch { cases, .. } => cases
            .iter()
            .any(|c| c.body.iter().any(|s| breaks_out(s, label, true))),
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            block_breaks(body, nested)
                || catches.iter().any(|c| block_breaks(&c.body, nested))
                || finally.as_ref().is_some_and(|f| block_breaks(f, nested))
        }
        _ => false,
    }
}
