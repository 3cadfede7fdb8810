//! Runtime variable scopes.
//!
//! The bottom frame is the interactive session: its first scope persists across entries.
//! Every method or constructor invocation pushes a frame of its own; name lookup searches
//! the current frame innermost first and then falls back to the session scope.

use std::collections::HashMap;

use dj_types::Type;

use crate::value::{ObjectRef, Value};

/// A variable slot.
#[derive(Debug, Clone)]
pub struct Binding {
    pub ty: Type,
    /// `None` until the variable is first assigned.
    pub value: Option<Value>,
    pub is_final: bool,
}

#[derive(Debug)]
struct Frame {
    scopes: Vec<HashMap<String, Binding>>,
    this: Option<ObjectRef>,
    return_ty: Type,
}

impl Frame {
    fn new(this: Option<ObjectRef>, return_ty: Type) -> Self {
        Self {
            scopes: vec![HashMap::new()],
            this,
            return_ty,
        }
    }
}

#[derive(Debug)]
pub struct Context {
    frames: Vec<Frame>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(None, Type::Void)],
        }
    }

    /// Number of active invocation frames above the session.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn push_frame(&mut self, this: Option<ObjectRef>, return_ty: Type) {
        self.frames.push(Frame::new(this, return_ty));
    }

    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn push_scope(&mut self) {
        self.top_mut().scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        let top = self.top_mut();
        if top.scopes.len() > 1 {
            top.scopes.pop();
        }
    }

    /// Drops every frame and scope above the session scope.
    pub fn reset(&mut self) {
        self.frames.truncate(1);
        self.frames[0].scopes.truncate(1);
    }

    pub fn this(&self) -> Option<&ObjectRef> {
        self.top().this.as_ref()
    }

    /// Declared return type of the running method; `void` at top level.
    pub fn return_type(&self) -> &Type {
        &self.top().return_ty
    }

    /// Declares a variable with an initial value in the innermost scope.
    pub fn define(&mut self, name: impl Into<String>, ty: Type, value: Value) {
        self.insert(name.into(), ty, Some(value), false);
    }

    /// Declares a variable that has no value yet.
    pub fn declare(&mut self, name: impl Into<String>, ty: Type) {
        self.insert(name.into(), ty, None, false);
    }

    /// Declares a `final` variable that is initialized here and never changes.
    pub fn define_constant(&mut self, name: impl Into<String>, ty: Type, value: Value) {
        self.insert(name.into(), ty, Some(value), true);
    }

    /// Declares a `final` variable that may be assigned exactly once.
    pub fn declare_final(&mut self, name: impl Into<String>, ty: Type) {
        self.insert(name.into(), ty, None, true);
    }

    fn insert(&mut self, name: String, ty: Type, value: Option<Value>, is_final: bool) {
        if let Some(scope) = self.top_mut().scopes.last_mut() {
            scope.insert(
                name,
                Binding {
                    ty,
                    value,
                    is_final,
                },
            );
        }
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        let top = self.top();
        top.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.frames[0].scopes[0].get(name))
    }

    fn binding_mut(&mut self, name: &str) -> Option<&mut Binding> {
        let last = self.frames.len() - 1;
        let in_frame = self.frames[last]
            .scopes
            .iter()
            .rposition(|scope| scope.contains_key(name));
        match in_frame {
            Some(i) => self.frames[last].scopes[i].get_mut(name),
            None => self.frames[0].scopes[0].get_mut(name),
        }
    }

    /// Current value of `name`; `None` when it is unknown or unassigned.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.binding(name)?.value.as_ref()
    }

    /// Overwrites the value of an existing variable. Returns `false` when `name` is unknown.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.binding_mut(name) {
            Some(binding) => {
                binding.value = Some(value);
                true
            }
            None => false,
        }
    }

    /// Variables of the session scope, sorted by name.
    pub fn session_bindings(&self) -> Vec<(&str, &Binding)> {
        let mut out: Vec<(&str, &Binding)> = self.frames[0].scopes[0]
            .iter()
            .map(|(name, binding)| (name.as_str(), binding))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    fn top(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn frames_see_the_session_but_not_each_other() {
        let mut ctx = Context::new();
        ctx.define("total", Type::INT, Value::Int(1));
        ctx.push_frame(None, Type::INT);
        ctx.define("local", Type::INT, Value::Int(2));
        assert_eq!(ctx.get("total"), Some(&Value::Int(1)));
        ctx.push_frame(None, Type::Void);
        assert!(ctx.get("local").is_none());
        assert!(ctx.set("total", Value::Int(5)));
        ctx.pop_frame();
        ctx.pop_frame();
        assert_eq!(ctx.get("total"), Some(&Value::Int(5)));
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn inner_scopes_shadow_and_disappear() {
        let mut ctx = Context::new();
        ctx.define("x", Type::INT, Value::Int(1));
        ctx.push_scope();
        ctx.define("x", Type::INT, Value::Int(2));
        assert_eq!(ctx.get("x"), Some(&Value::Int(2)));
        ctx.pop_scope();
        assert_eq!(ctx.get("x"), Some(&Value::Int(1)));
        ctx.declare_final("y", Type::INT);
        assert!(ctx.get("y").is_none());
        assert!(ctx.binding("y").is_some_and(|b| b.is_final));
    }
}
