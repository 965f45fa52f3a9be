//! Shared leaf types for the sharplower workspace.
//!
//! Everything here is independent of the lowering pipeline itself:
//!
//! - [`Span`] - source locations attached to every node and diagnostic
//! - [`TypeHash`] - deterministic identity for types, functions and members
//! - [`CompilationError`] - user-facing diagnostics
//! - [`CodegenFault`] - internal consistency faults raised during emission
//! - [`Diagnostics`] - the accumulating diagnostic reporter

pub mod diagnostics;
pub mod error;
pub mod span;
pub mod type_hash;

pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use error::{CodegenFault, CompilationError};
pub use span::Span;
pub use type_hash::{TypeHash, hash_constants, primitives};
