//! Java type model shared by the checker and the interpreter.
//!
//! [`Type`] describes static types, [`ClassDef`] describes classes regardless of whether they
//! come from source, the classpath or the built-in JDK table, and [`Library`] implementations
//! answer "what is class X". The free functions in [`system`] and [`members`] implement the
//! Java rules on top of any library.

mod class;
mod jdk;
mod library;
pub mod members;
pub mod system;
mod ty;

pub use class::{
    signature, ClassDef, ClassKind, FieldDef, FieldRef, MethodDef, MethodRef, Origin,
    TypeParamDef,
};
pub use jdk::JdkLoader;
pub use library::{ClassLibrary, ClassLoader, Library, LibraryContext};
pub use members::LookupError;
pub use ty::{names, package_of, simple_name, source_name, ClassType, Type, TypeVar, WildcardBound};
