//! Sharplower Compiler
//!
//! Semantic lowering of C#-style member bodies to stack bytecode.
//!
//! ## Architecture
//!
//! - **Resolution**: type check the AST and build a resolved [`node::Node`]
//!   tree, reporting every user error into [`sharplower_core::Diagnostics`]
//! - **Lowering**: walk the resolved tree once and drive the
//!   [`emit::BytecodeEmitter`]; failures here are internal faults
//!
//! Assignments, nullable wrappers and lifted operators are all expanded
//! during resolution into a small set of node shapes, so lowering never has
//! to re-derive types.
//!
//! ## Modules
//!
//! - [`ast`]: Source-level syntax tree and a builder for it
//! - [`bytecode`]: Bytecode types (OpCode, BytecodeChunk, ConstantPool)
//! - [`conversion`]: Built-in and user-defined conversion lookup
//! - [`emit`]: Bytecode emitter with labels and the temporary slot pool
//! - [`function_compiler`]: One member body from AST to bytecode
//! - [`lower`]: Resolved trees to bytecode
//! - [`node`]: Resolved tree shapes
//! - [`operators`]: Primitive operator tables
//! - [`options`]: Compiler switches
//! - [`registry`]: Types, members and nullable instantiations
//! - [`resolve`]: AST to resolved trees
//! - [`scope`]: Local variable scopes

pub mod ast;
pub mod bytecode;
pub mod conversion;
pub mod emit;
pub mod function_compiler;
pub mod lower;
pub mod node;
pub mod operators;
pub mod options;
pub mod registry;
pub mod resolve;
pub mod scope;

pub use conversion::{Conversion, ConversionKind, find_conversion, find_implicit};
pub use emit::{BytecodeEmitter, EmittedBody, Label, TempSlot};
pub use function_compiler::{CompiledFunction, FunctionCompiler, FunctionDecl};
pub use lower::Lowerer;
pub use options::CompilerOptions;
pub use registry::{NullableInfo, NullableMethod, TypeRegistry};
pub use resolve::Resolver;
pub use scope::{LocalScope, LocalVar};

// Re-export the error types from core for convenience
pub use sharplower_core::{CodegenFault, CompilationError};
