//! Unresolved input tree.
//!
//! The shape a parser would hand to the compiler: names are still strings and
//! nothing is typed. Resolution consumes these nodes and builds a fresh
//! [`Node`](crate::node::Node) tree; the AST itself is never mutated.

mod builder;
mod expr;
mod ops;
mod stmt;

pub use builder::AstBuilder;
pub use expr::*;
pub use ops::{AssignOp, BinaryOp, PostfixOp, UnaryOp};
pub use stmt::*;
