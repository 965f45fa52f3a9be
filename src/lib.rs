//! # sharplower
//!
//! Semantic lowering for a C#-style language: resolved assignment, nullable
//! value types and lifted operators, turned into stack bytecode.
//!
//! The work happens in [`sharplower_compiler`]; this crate re-exports it and
//! adds [`Compilation`], which compiles several member bodies against one
//! registry into a [`CompiledModule`] sharing a single constant pool.
//!
//! ```
//! use bumpalo::Bump;
//! use sharplower::prelude::*;
//!
//! let registry = TypeRegistry::with_primitives();
//! let nullable_int = registry.nullable_of(primitives::INT32).unwrap();
//!
//! let arena = Bump::new();
//! let ast = AstBuilder::new(&arena);
//! // int? add(int? a, int b) { return a + b; }
//! let body = [ast.ret(Some(ast.binary(ast.ident("a"), BinaryOp::Add, ast.ident("b"))))];
//! let decl = FunctionDecl::new("add", nullable_int)
//!     .param("a", nullable_int)
//!     .param("b", primitives::INT32);
//!
//! let mut compilation = Compilation::new(&registry);
//! assert!(compilation.compile(&decl, &body));
//! let result = compilation.finish();
//! assert!(result.diagnostics.is_empty());
//! assert!(result.module.function("add").is_some());
//! ```

pub use sharplower_compiler;
pub use sharplower_core;

use log::info;
use sharplower_compiler::ast::Stmt;
use sharplower_compiler::bytecode::ConstantPool;
use sharplower_compiler::{CompiledFunction, CompilerOptions, FunctionCompiler, FunctionDecl, TypeRegistry};
use sharplower_core::Diagnostics;

pub mod prelude {
    pub use sharplower_compiler::ast::{AssignOp, AstBuilder, BinaryOp, PostfixOp, UnaryOp};
    pub use sharplower_compiler::bytecode::{BytecodeChunk, ConstantPool, OpCode};
    pub use sharplower_compiler::{CompiledFunction, CompilerOptions, FunctionDecl, TypeRegistry};
    pub use sharplower_core::{DiagnosticCode, Diagnostics, Severity, Span, TypeHash, primitives};

    pub use crate::{Compilation, CompilationResult, CompiledModule};
}

/// Compiled member bodies and the constant pool they index into.
#[derive(Debug, Default)]
pub struct CompiledModule {
    pub functions: Vec<CompiledFunction>,
    pub constants: ConstantPool,
}

impl CompiledModule {
    pub fn function(&self, name: &str) -> Option<&CompiledFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// Result of a [`Compilation`].
#[derive(Debug)]
pub struct CompilationResult {
    pub module: CompiledModule,
    /// Errors, warnings and internal faults from every member.
    pub diagnostics: Diagnostics,
}

impl CompilationResult {
    pub fn is_success(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// Compiles member bodies one at a time against a shared registry.
///
/// A member that fails leaves nothing in the module; the others are
/// unaffected.
pub struct Compilation<'r> {
    registry: &'r TypeRegistry,
    options: CompilerOptions,
    module: CompiledModule,
    diagnostics: Diagnostics,
}

impl<'r> Compilation<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            options: CompilerOptions::default(),
            module: CompiledModule::default(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Compile one member. Returns whether a body was produced.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(&mut self, decl: &FunctionDecl, body: &[Stmt<'_>]) -> bool {
        let compiled = FunctionCompiler::new(
            self.registry,
            &mut self.module.constants,
            &mut self.diagnostics,
            self.options,
        )
        .compile(decl, body);

        match compiled {
            Some(function) => {
                self.module.functions.push(function);
                true
            }
            None => false,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn finish(self) -> CompilationResult {
        info!(
            "compiled {} member(s), {} error(s), {} warning(s)",
            self.module.functions.len(),
            self.diagnostics.error_count(),
            self.diagnostics.warning_count()
        );
        CompilationResult {
            module: self.module,
            diagnostics: self.diagnostics,
        }
    }
}
