//! Lexer and recursive-descent parser for the Java dialect accepted by the interpreter.
//!
//! Two entry modes are supported: whole compilation units (source files) and interactive
//! entries, where statements, imports, classes and methods may be mixed at top level.

pub mod ast;
mod lexer;
pub mod literals;
mod parser;

use dj_core::Span;

pub use parser::{parse_compilation_unit, parse_entries, parse_expression, MAX_NESTING};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    Syntax,
    /// An integer literal outside the range of its type.
    NumberFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub span: Span,
    /// The input ended before the construct was complete; more text may fix it.
    pub incomplete: bool,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::Syntax,
            message: message.into(),
            span,
            incomplete: false,
        }
    }

    pub fn incomplete(message: impl Into<String>, span: Span) -> Self {
        Self {
            incomplete: true,
            ..Self::new(message, span)
        }
    }

    pub fn number_format(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::NumberFormat,
            ..Self::new(message, span)
        }
    }

    /// Stable key used in diagnostics.
    pub fn key(&self) -> &'static str {
        match self.kind {
            ParseErrorKind::Syntax => "syntax.error",
            ParseErrorKind::NumberFormat => "number.format",
        }
    }
}
