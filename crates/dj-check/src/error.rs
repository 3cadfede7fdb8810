use std::fmt;

use dj_core::{NodeId, Span};
use serde::Serialize;
use thiserror::Error;

/// Kinds of checking and evaluation failures. Each has a stable key used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UndefinedName,
    UndefinedClass,
    NoSuchField,
    NoSuchMethod,
    NoSuchConstructor,
    AmbiguousMethod,
    AssignmentTypes,
    IllegalAccess,
    StaticContext,
    CannotModify,
    NumericExpected,
    IntegralExpected,
    ConditionType,
    OperandTypes,
    CastTypes,
    UncheckedCast,
    BoxingProhibited,
    VoidExpression,
    ArrayExpected,
    DuplicateVariable,
    DuplicateDeclaration,
    UndefinedLabel,
    MisplacedJump,
    MisplacedReturn,
    MisplacedConstructorCall,
    AbstractInstantiation,
    AbstractMethod,
    MissingImplementation,
    ForeachType,
    SwitchType,
    ThrowableExpected,
    CyclicInheritance,
    FinalSuperclass,
    InterfaceExpected,
    ClassExpected,
    VariableExpected,
    /// A failure raised while running static initialisation or a native member.
    CaughtException,
    NativeUnavailable,
}

impl ErrorKind {
    pub fn key(self) -> &'static str {
        match self {
            ErrorKind::UndefinedName => "undefined.name",
            ErrorKind::UndefinedClass => "undefined.class",
            ErrorKind::NoSuchField => "no.such.field",
            ErrorKind::NoSuchMethod => "no.such.method",
            ErrorKind::NoSuchConstructor => "no.such.constructor",
            ErrorKind::AmbiguousMethod => "ambiguous.method",
            ErrorKind::AssignmentTypes => "assignment.types",
            ErrorKind::IllegalAccess => "illegal.access",
            ErrorKind::StaticContext => "static.context",
            ErrorKind::CannotModify => "cannot.modify",
            ErrorKind::NumericExpected => "numeric.expected",
            ErrorKind::IntegralExpected => "integral.expected",
            ErrorKind::ConditionType => "condition.type",
            ErrorKind::OperandTypes => "operand.types",
            ErrorKind::CastTypes => "cast.types",
            ErrorKind::UncheckedCast => "unchecked.cast",
            ErrorKind::BoxingProhibited => "boxing.prohibited",
            ErrorKind::VoidExpression => "void.expression",
            ErrorKind::ArrayExpected => "array.expected",
            ErrorKind::DuplicateVariable => "duplicate.variable",
            ErrorKind::DuplicateDeclaration => "duplicate.declaration",
            ErrorKind::UndefinedLabel => "undefined.label",
            ErrorKind::MisplacedJump => "misplaced.jump",
            ErrorKind::MisplacedReturn => "misplaced.return",
            ErrorKind::MisplacedConstructorCall => "misplaced.constructor.call",
            ErrorKind::AbstractInstantiation => "abstract.instantiation",
            ErrorKind::AbstractMethod => "abstract.method",
            ErrorKind::MissingImplementation => "missing.implementation",
            ErrorKind::ForeachType => "foreach.type",
            ErrorKind::SwitchType => "switch.type",
            ErrorKind::ThrowableExpected => "throwable.expected",
            ErrorKind::CyclicInheritance => "cyclic.inheritance",
            ErrorKind::FinalSuperclass => "final.superclass",
            ErrorKind::InterfaceExpected => "interface.expected",
            ErrorKind::ClassExpected => "class.expected",
            ErrorKind::VariableExpected => "variable.expected",
            ErrorKind::CaughtException => "caught.exception",
            ErrorKind::NativeUnavailable => "native.unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A structured checking or evaluation failure tied to the node that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("[{kind}] {message}")]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    pub node: Option<NodeId>,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            node: None,
        }
    }

    pub fn at(kind: ErrorKind, message: impl Into<String>, node: NodeId, span: Span) -> Self {
        Self {
            node: Some(node),
            ..Self::new(kind, message, span)
        }
    }

    pub fn key(&self) -> &'static str {
        self.kind.key()
    }
}

/// Every failure of one checked batch, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error, Serialize)]
pub struct CompositeError {
    pub errors: Vec<ExecutionError>,
}

impl CompositeError {
    pub fn new(errors: Vec<ExecutionError>) -> Self {
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn first(&self) -> Option<&ExecutionError> {
        self.errors.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExecutionError> {
        self.errors.iter()
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.errors.iter().map(ExecutionError::key).collect()
    }
}

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a CompositeError {
    type Item = &'a ExecutionError;
    type IntoIter = std::slice::Iter<'a, ExecutionError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_display_lists_every_error() {
        let composite = CompositeError::new(vec![
            ExecutionError::new(ErrorKind::UndefinedName, "x", Span::new(0, 1)),
            ExecutionError::new(ErrorKind::AssignmentTypes, "int vs String", Span::new(2, 3)),
        ]);
        assert_eq!(
            composite.to_string(),
            "[undefined.name] x\n[assignment.types] int vs String"
        );
        assert_eq!(composite.keys(), vec!["undefined.name", "assignment.types"]);
    }
}
