use std::collections::{HashMap, HashSet};

use dj_core::NodeId;
use dj_types::{FieldRef, MethodRef, Type};

/// What a name, field access or call resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Local(String),
    Field(FieldRef),
    Method(MethodRef),
    /// `super.m(..)`: dispatched without a virtual lookup.
    SuperMethod(MethodRef),
    Constructor(MethodRef),
    /// The node names a type: a static member receiver, or the type tested by `instanceof`.
    Type(Type),
    Package(String),
    ArrayLength,
}

/// Side table filled by the checker and read by the evaluator.
#[derive(Debug, Default, Clone)]
pub struct TypeTable {
    types: HashMap<NodeId, Type>,
    resolutions: HashMap<NodeId, Resolution>,
    /// Assignments that introduce an interactive variable.
    implicit_decls: HashSet<NodeId>,
    /// Alternatives of each catch clause, in source order.
    catch_types: HashMap<NodeId, Vec<Type>>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_type(&mut self, node: NodeId, ty: Type) {
        self.types.insert(node, ty);
    }

    /// Static type of an expression, or the declared type of a variable declaration node.
    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.types.get(&node)
    }

    pub fn resolve(&mut self, node: NodeId, resolution: Resolution) {
        self.resolutions.insert(node, resolution);
    }

    pub fn resolution(&self, node: NodeId) -> Option<&Resolution> {
        self.resolutions.get(&node)
    }

    pub fn mark_implicit_decl(&mut self, node: NodeId) {
        self.implicit_decls.insert(node);
    }

    pub fn is_implicit_decl(&self, node: NodeId) -> bool {
        self.implicit_decls.contains(&node)
    }

    pub fn set_catch_types(&mut self, node: NodeId, types: Vec<Type>) {
        self.catch_types.insert(node, types);
    }

    pub fn catch_types(&self, node: NodeId) -> &[Type] {
        self.catch_types.get(&node).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.resolutions.is_empty()
    }
}
