use std::fmt;

use dj_check::{CompositeError, ExecutionError};
use dj_syntax::ParseError;
use dj_types::source_name;
use thiserror::Error;

use crate::interpreter::REPL_CLASS;
use crate::value::{ObjectRef, Value};

/// Abrupt completion of an expression or statement that is not a jump.
#[derive(Debug)]
pub(crate) enum Interrupt {
    /// A guest exception on its way to a `catch`.
    Throw(ObjectRef),
    Error(ExecutionError),
}

impl From<ExecutionError> for Interrupt {
    fn from(err: ExecutionError) -> Self {
        Interrupt::Error(err)
    }
}

pub(crate) type Flow<T> = Result<T, Interrupt>;

/// One guest frame of a stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub class: String,
    pub method: String,
    /// Frame of a built-in JDK method rather than of source code.
    pub native: bool,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class == REPL_CLASS {
            return write!(f, "at {}", self.method);
        }
        write!(f, "at {}.{}", source_name(&self.class), self.method)
    }
}

/// A guest exception nobody caught.
#[derive(Debug, Clone, Error)]
#[error("{}", self.summary())]
pub struct ThrownException {
    pub exception: Value,
    /// Binary name of the exception class.
    pub class: String,
    pub message: Option<String>,
    /// Source frames at the point the exception was created, innermost first.
    pub stack_trace: Vec<String>,
}

impl ThrownException {
    /// `java.lang.ArithmeticException: / by zero`
    pub fn summary(&self) -> String {
        match &self.message {
            Some(message) => format!("{}: {message}", source_name(&self.class)),
            None => source_name(&self.class),
        }
    }

    /// The user-facing report printed by the REPL.
    pub fn report(&self) -> String {
        let mut out = format!("Uncaught exception {}", self.summary());
        for frame in &self.stack_trace {
            out.push_str("\n\t");
            out.push_str(frame);
        }
        out
    }
}

#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("[{key}] {0}", key = .0.key())]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Check(#[from] CompositeError),
    #[error("{0}")]
    Execution(#[from] ExecutionError),
    #[error("{0}")]
    Thrown(#[from] ThrownException),
}

impl InterpretError {
    /// Whether more input could complete the entry.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, InterpretError::Parse(err) if err.incomplete)
    }

    /// Stable keys of the reported failures, for tests and JSON output.
    pub fn keys(&self) -> Vec<&'static str> {
        match self {
            InterpretError::Parse(err) => vec![err.key()],
            InterpretError::Check(errors) => errors.keys(),
            InterpretError::Execution(err) => vec![err.key()],
            InterpretError::Thrown(_) => vec!["thrown.exception"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_print_source_names() {
        let frame = |class: &str, method: &str| StackFrame {
            class: class.to_string(),
            method: method.to_string(),
            native: false,
        };
        assert_eq!(frame("demo.Outer$Inner", "run").to_string(), "at demo.Outer.Inner.run");
        assert_eq!(frame(REPL_CLASS, "boom").to_string(), "at boom");
    }
}
