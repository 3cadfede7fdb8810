//! Static checking of DynamicJava source.
//!
//! The checker resolves names and overloads, assigns a static type to every expression and
//! records both in a [`TypeTable`] keyed by node id. Classes declared in source are kept in a
//! [`TreeLibrary`] that shadows the JDK and classpath libraries.

mod checker;
mod context;
mod decl;
mod error;
mod expr;
mod stmt;
mod table;
mod tree;
mod unit;

pub use checker::Checker;
pub use context::{Imports, JumpLookup, LocalVar, MethodHost, MethodKind, TypeContext, VarBinding};
pub use decl::PendingClass;
pub use error::{CompositeError, ErrorKind, ExecutionError};
pub use stmt::{block_can_complete, can_complete};
pub use table::{Resolution, TypeTable};
pub use tree::TreeLibrary;
pub use unit::CompilationUnitChecker;
