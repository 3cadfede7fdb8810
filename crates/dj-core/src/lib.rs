//! Core shared types for the DynamicJava crates.
//!
//! This crate is intentionally small: source spans and line lookup, node ids, primitive
//! types, Java modifier flags, and the immutable [`Options`] value that is threaded through
//! parsing, checking and evaluation.

mod ids;
mod modifiers;
mod options;
mod primitive;
mod text;

pub use ids::{NodeId, NodeIdGen};
pub use modifiers::Modifiers;
pub use options::Options;
pub use primitive::PrimitiveType;
pub use text::{LineCol, LineIndex, Span};
