use dj_check::ErrorKind;
use dj_syntax::ast::{Block, CatchClause, Expr, ExprKind, Stmt, StmtKind, SwitchCase, VarDeclarator};
use dj_types::{names, Type};

use crate::error::{Flow, Interrupt};
use crate::eval::{Evaluator, Site};
use crate::value::{NativeState, ObjectRef, Value};

/// How a statement finished when it did not throw.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Completion {
    Normal,
    Break(Option<String>),
    Continue(Option<String>),
    Return(Option<Value>),
}

/// What a loop does after its body completed.
enum LoopStep {
    Next,
    Exit,
    Propagate(Completion),
}

fn loop_step(completion: Completion, label: Option<&str>) -> LoopStep {
    match completion {
        Completion::Normal => LoopStep::Next,
        Completion::Continue(None) => LoopStep::Next,
        Completion::Continue(Some(target)) if Some(target.as_str()) == label => LoopStep::Next,
        Completion::Break(None) => LoopStep::Exit,
        Completion::Break(Some(target)) if Some(target.as_str()) == label => LoopStep::Exit,
        other => LoopStep::Propagate(other),
    }
}

impl Evaluator<'_> {
    pub(crate) fn exec_block(&mut self, block: &Block) -> Flow<Completion> {
        self.rt.context.push_scope();
        let result = self.exec_stmts(&block.stmts);
        self.rt.context.pop_scope();
        result
    }

    /// Runs statements in the current scope.
    pub(crate) fn exec_stmts(&mut self, stmts: &[Stmt]) -> Flow<Completion> {
        for stmt in stmts {
            let completion = self.exec_stmt(stmt)?;
            if completion != Completion::Normal {
                return Ok(completion);
            }
        }
        Ok(Completion::Normal)
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt) -> Flow<Completion> {
        self.exec_labeled(stmt, None)
    }

    /// Runs `stmt`; `label` names it when it is the body of a labeled statement, so a
    /// labeled `continue` reaches the loop.
    fn exec_labeled(&mut self, stmt: &Stmt, label: Option<&str>) -> Flow<Completion> {
        match &stmt.kind {
            StmtKind::LocalVar { is_final, declarators } => {
                for var in declarators {
                    self.declare_var(var, *is_final)?;
                }
                Ok(Completion::Normal)
            }
            StmtKind::Expr(expr) => {
                if self.table.is_implicit_decl(expr.id) {
                    self.declare_implicit(expr)?;
                } else {
                    self.eval_expr(expr)?;
                }
                Ok(Completion::Normal)
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_bool(cond)? {
                    self.exec_stmt(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(else_branch)
                } else {
                    Ok(Completion::Normal)
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval_bool(cond)? {
                    match loop_step(self.exec_stmt(body)?, label) {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(other) => return Ok(other),
                    }
                }
                Ok(Completion::Normal)
            }
            StmtKind::DoWhile { body, cond } => {
                loop {
                    match loop_step(self.exec_stmt(body)?, label) {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(other) => return Ok(other),
                    }
                    if !self.eval_bool(cond)? {
                        break;
                    }
                }
                Ok(Completion::Normal)
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                self.rt.context.push_scope();
                let result = self.exec_for(init, cond.as_ref(), update, body, label);
                self.rt.context.pop_scope();
                result
            }
            StmtKind::ForEach {
                is_final,
                var,
                iterable,
                body,
            } => self.exec_foreach(*is_final, var, iterable, body, label),
            StmtKind::Labeled { label: name, body } => match self.exec_labeled(body, Some(name.as_str()))? {
                Completion::Break(Some(target)) if target == *name => Ok(Completion::Normal),
                other => Ok(other),
            },
            StmtKind::Break(target) => Ok(Completion::Break(target.clone())),
            StmtKind::Continue(target) => Ok(Completion::Continue(target.clone())),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => {
                        let value = self.eval_expr(expr)?;
                        let ty = self.rt.context.return_type().clone();
                        Some(self.coerce(value, &ty))
                    }
                    None => None,
                };
                Ok(Completion::Return(value))
            }
            StmtKind::Throw(expr) => match self.eval_expr(expr)? {
                Value::Ref(exception) => Err(Interrupt::Throw(exception)),
                _ => Err(self.null_pointer("Cannot throw exception because the value is null")),
            },
            StmtKind::Try { body, catches, finally } => self.exec_try(body, catches, finally.as_ref()),
            StmtKind::Switch { selector, cases } => {
                self.rt.context.push_scope();
                let result = self.exec_switch(selector, cases);
                self.rt.context.pop_scope();
                result
            }
            StmtKind::Block(block) => self.exec_block(block),
            StmtKind::ConstructorCall { .. } => Err(self.fail(
                ErrorKind::MisplacedConstructorCall,
                "call to this or super must be first statement in constructor",
                Site::stmt(stmt),
            )),
            StmtKind::Empty => Ok(Completion::Normal),
        }
    }

    fn declare_var(&mut self, var: &VarDeclarator, is_final: bool) -> Flow<()> {
        let ty = self.static_type(var.id);
        match &var.init {
            Some(init) => {
                let value = self.eval_initializer(init, &ty)?;
                if is_final {
                    self.rt.context.define_constant(var.name.clone(), ty, value);
                } else {
                    self.rt.context.define(var.name.clone(), ty, value);
                }
            }
            None if is_final => self.rt.context.declare_final(var.name.clone(), ty),
            None => self.rt.context.declare(var.name.clone(), ty),
        }
        Ok(())
    }

    /// `x = value` at the top level where `x` is new: declares `x` with the value's type.
    pub(crate) fn declare_implicit(&mut self, expr: &Expr) -> Flow<Value> {
        let ExprKind::Assign { target, value, .. } = &expr.kind else {
            return self.eval_expr(expr);
        };
        let ExprKind::Name(name) = &target.kind else {
            return self.eval_expr(expr);
        };
        let ty = self.static_type(expr.id);
        let value = self.eval_expr(value)?;
        let value = self.coerce(value, &ty);
        self.rt.context.define(name.clone(), ty, value.clone());
        Ok(value)
    }

    fn exec_for(
        &mut self,
        init: &[Stmt],
        cond: Option<&Expr>,
        update: &[Expr],
        body: &Stmt,
        label: Option<&str>,
    ) -> Flow<Completion> {
        for stmt in init {
            self.exec_stmt(stmt)?;
        }
        loop {
            if let Some(cond) = cond {
                if !self.eval_bool(cond)? {
                    break;
                }
            }
            match loop_step(self.exec_stmt(body)?, label) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Propagate(other) => return Ok(other),
            }
            for expr in update {
                self.eval_expr(expr)?;
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_foreach(
        &mut self,
        is_final: bool,
        var: &VarDeclarator,
        iterable: &Expr,
        body: &Stmt,
        label: Option<&str>,
    ) -> Flow<Completion> {
        let ty = self.static_type(var.id);
        let source = match self.eval_expr(iterable)? {
            Value::Ref(obj) => obj,
            _ => return Err(self.null_pointer("Cannot iterate over null")),
        };
        if source.is_array() {
            let mut index = 0;
            loop {
                let item = match &*source.state() {
                    NativeState::Array { items, .. } => items.get(index).cloned(),
                    _ => None,
                };
                let Some(item) = item else { break };
                index += 1;
                match loop_step(self.foreach_body(is_final, var, &ty, item, body)?, label) {
                    LoopStep::Next => {}
                    LoopStep::Exit => break,
                    LoopStep::Propagate(other) => return Ok(other),
                }
            }
            return Ok(Completion::Normal);
        }
        let iterator = match self.call_method(&source, names::ITERABLE, "iterator", Vec::new())? {
            Value::Ref(iterator) => iterator,
            _ => return Err(self.null_pointer("iterator() returned null")),
        };
        while self.has_next(&iterator)? {
            let item = self.call_method(&iterator, names::ITERATOR, "next", Vec::new())?;
            match loop_step(self.foreach_body(is_final, var, &ty, item, body)?, label) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Propagate(other) => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn has_next(&mut self, iterator: &ObjectRef) -> Flow<bool> {
        let next = self.call_method(iterator, names::ITERATOR, "hasNext", Vec::new())?;
        Ok(self.unbox(&next).as_bool().unwrap_or(false))
    }

    fn foreach_body(&mut self, is_final: bool, var: &VarDeclarator, ty: &Type, item: Value, body: &Stmt) -> Flow<Completion> {
        let item = self.coerce(item, ty);
        self.rt.context.push_scope();
        if is_final {
            self.rt.context.define_constant(var.name.clone(), ty.clone(), item);
        } else {
            self.rt.context.define(var.name.clone(), ty.clone(), item);
        }
        let result = self.exec_stmt(body);
        self.rt.context.pop_scope();
        result
    }

    fn exec_try(&mut self, body: &Block, catches: &[CatchClause], finally: Option<&Block>) -> Flow<Completion> {
        let mut result = self.exec_block(body);
        if let Err(Interrupt::Throw(exception)) = &result {
            let exception = exception.clone();
            if let Some(catch) = catches.iter().find(|c| self.catches(c, &exception)) {
                let ty = self.static_type(catch.id);
                self.rt.context.push_scope();
                self.rt.context.define(catch.name.clone(), ty, Value::Ref(exception));
                result = self.exec_block(&catch.body);
                self.rt.context.pop_scope();
            }
        }
        let Some(finally) = finally else {
            return result;
        };
        if matches!(result, Err(Interrupt::Error(_))) {
            return result;
        }
        match self.exec_block(finally)? {
            Completion::Normal => result,
            abrupt => Ok(abrupt),
        }
    }

    fn catches(&self, catch: &CatchClause, exception: &ObjectRef) -> bool {
        let value = Value::Ref(exception.clone());
        let types = self.table.catch_types(catch.id);
        if types.is_empty() {
            return self.instance_of(&value, &self.static_type(catch.id));
        }
        types.iter().any(|ty| self.instance_of(&value, ty))
    }

    fn exec_switch(&mut self, selector: &Expr, cases: &[SwitchCase]) -> Flow<Completion> {
        let value = self.eval_expr(selector)?;
        let value = self.unbox(&value);
        if value.is_null() {
            return Err(self.null_pointer("Cannot switch on a null value"));
        }
        let mut start = None;
        'cases: for (i, case) in cases.iter().enumerate() {
            for label in &case.labels {
                let label = self.eval_expr(label)?;
                if switch_matches(&value, &self.unbox(&label)) {
                    start = Some(i);
                    break 'cases;
                }
            }
        }
        let Some(start) = start.or_else(|| cases.iter().position(|c| c.is_default)) else {
            return Ok(Completion::Normal);
        };
        for case in &cases[start..] {
            match self.exec_stmts(&case.body)? {
                Completion::Normal => {}
                Completion::Break(None) => return Ok(Completion::Normal),
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }
}

fn switch_matches(selector: &Value, label: &Value) -> bool {
    match (selector, label) {
        (Value::Ref(a), Value::Ref(b)) => match (a.string_value(), b.string_value()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        (a, b) => matches!((a.as_i64(), b.as_i64()), (Some(x), Some(y)) if x == y),
    }
}
