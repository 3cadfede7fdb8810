//! Evaluation of checked DynamicJava code.
//!
//! [`Interpreter`] is the REPL session: it owns the checker, the runtime heap and the
//! session variables, and turns each entry into a value, a guest exception or a list of
//! errors. Built-in JDK classes (`String`, `StringBuilder`, the boxes, `Math`, `System`,
//! `ArrayList` and a few more) are implemented natively.

mod context;
mod error;
mod eval;
mod format;
mod interpreter;
mod modifier;
mod natives;
mod ops;
mod value;

pub use context::{Binding, Context};
pub use error::{InterpretError, StackFrame, ThrownException};
pub use eval::{Runtime, DEFAULT_MAX_DEPTH};
pub use format::{format_double, format_float, java_format, FormatArg, FormatError};
pub use interpreter::Interpreter;
pub use value::{NativeState, Object, ObjectRef, Stream, ThrowableState, Value};
