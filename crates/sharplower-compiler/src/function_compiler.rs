//! Member-level compilation.
//!
//! [`FunctionCompiler`] takes one member body from AST to bytecode:
//!
//! - declare the parameters as the first locals
//! - resolve every statement, collecting all user errors
//! - lower the resolved statements, unless resolution failed
//! - append an implicit `ReturnVoid` when the body falls off the end
//!
//! A [`CodegenFault`] during lowering aborts only this member. It is reported
//! as a single internal-error diagnostic and no body is produced.
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use sharplower_compiler::ast::AstBuilder;
//! use sharplower_compiler::bytecode::ConstantPool;
//! use sharplower_compiler::{CompilerOptions, FunctionCompiler, FunctionDecl, TypeRegistry};
//! use sharplower_core::{Diagnostics, primitives};
//!
//! let arena = Bump::new();
//! let ast = AstBuilder::new(&arena);
//! let body = [ast.ret(Some(ast.binary(ast.ident("a"), sharplower_compiler::ast::BinaryOp::Add, ast.int(1))))];
//!
//! let registry = TypeRegistry::with_primitives();
//! let mut constants = ConstantPool::new();
//! let mut diagnostics = Diagnostics::new();
//! let decl = FunctionDecl::new("inc", primitives::INT32).param("a", primitives::INT32);
//!
//! let compiled = FunctionCompiler::new(&registry, &mut constants, &mut diagnostics, CompilerOptions::default())
//!     .compile(&decl, &body)
//!     .unwrap();
//! assert_eq!(compiled.param_count, 1);
//! assert!(diagnostics.is_empty());
//! ```

use log::{debug, error};
use sharplower_core::{CodegenFault, Diagnostics, Span, TypeHash};

use crate::ast::Stmt;
use crate::bytecode::{BytecodeChunk, ConstantPool};
use crate::emit::BytecodeEmitter;
use crate::lower::Lowerer;
use crate::node::Statement;
use crate::options::CompilerOptions;
use crate::registry::TypeRegistry;
use crate::resolve::Resolver;
use crate::scope::LocalScope;

/// Signature of the member being compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<(String, TypeHash)>,
    pub return_type: TypeHash,
    /// Declared inside a generic type or method.
    pub is_generic: bool,
    pub span: Span,
}

impl FunctionDecl {
    pub fn new(name: &str, return_type: TypeHash) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            return_type,
            is_generic: false,
            span: Span::default(),
        }
    }

    pub fn param(mut self, name: &str, ty: TypeHash) -> Self {
        self.params.push((name.to_string(), ty));
        self
    }

    pub fn generic(mut self) -> Self {
        self.is_generic = true;
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// A compiled member body.
#[derive(Debug)]
pub struct CompiledFunction {
    pub name: String,
    pub chunk: BytecodeChunk,
    /// Parameters first, then declared locals, then temporaries.
    pub local_types: Vec<TypeHash>,
    pub param_count: usize,
}

pub struct FunctionCompiler<'a, 'pool> {
    registry: &'a TypeRegistry,
    constants: &'pool mut ConstantPool,
    diagnostics: &'a mut Diagnostics,
    options: CompilerOptions,
}

impl<'a, 'pool> FunctionCompiler<'a, 'pool> {
    pub fn new(
        registry: &'a TypeRegistry,
        constants: &'pool mut ConstantPool,
        diagnostics: &'a mut Diagnostics,
        options: CompilerOptions,
    ) -> Self {
        Self {
            registry,
            constants,
            diagnostics,
            options,
        }
    }

    /// Compile one body. `None` when it had errors; they are in the
    /// diagnostics.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(&mut self, decl: &FunctionDecl, body: &[Stmt<'_>]) -> Option<CompiledFunction> {
        debug!("compiling '{}'", decl.name);
        let errors_before = self.diagnostics.error_count();

        let mut scope = LocalScope::new();
        for (name, ty) in &decl.params {
            if let Err(err) = scope.declare(name, *ty, decl.span) {
                self.diagnostics.error(err);
            }
        }

        let statements = self.resolve_body(decl, &mut scope, body);
        if self.diagnostics.error_count() > errors_before {
            debug!(
                "'{}' has {} error(s); skipping lowering",
                decl.name,
                self.diagnostics.error_count() - errors_before
            );
            return None;
        }

        let mut emitter = BytecodeEmitter::new(self.constants);
        for ty in scope.slot_types() {
            emitter.declare_local(*ty);
        }

        let lowered = lower_body(&mut emitter, self.registry, &statements, self.options.emit_line_info)
            .and_then(|()| emitter.finish().map_err(|fault| (fault, decl.span)));

        match lowered {
            Ok(body) => {
                debug!(
                    "'{}' compiled: {} bytes, {} locals",
                    decl.name,
                    body.chunk.len(),
                    body.local_types.len()
                );
                Some(CompiledFunction {
                    name: decl.name.clone(),
                    chunk: body.chunk,
                    local_types: body.local_types,
                    param_count: decl.params.len(),
                })
            }
            Err((fault, span)) => {
                error!("internal fault compiling '{}' at {span}: {fault}", decl.name);
                self.diagnostics.internal(&fault, span);
                None
            }
        }
    }

    fn resolve_body(
        &mut self,
        decl: &FunctionDecl,
        scope: &mut LocalScope,
        body: &[Stmt<'_>],
    ) -> Vec<(Statement, Span)> {
        let mut resolver = Resolver::new(self.registry, scope, self.diagnostics, self.options)
            .with_return_type(decl.return_type)
            .in_generic_context(decl.is_generic);

        body.iter()
            .filter_map(|stmt| {
                resolver
                    .resolve_statement(stmt)
                    .map(|statement| (statement, stmt.span()))
            })
            .collect()
    }
}

#[cfg_attr(feature = "profiling", profiling::function)]
fn lower_body(
    emitter: &mut BytecodeEmitter<'_>,
    registry: &TypeRegistry,
    statements: &[(Statement, Span)],
    line_info: bool,
) -> Result<(), (CodegenFault, Span)> {
    let mut lowerer = Lowerer::new(emitter, registry);
    for (statement, span) in statements {
        if line_info {
            lowerer.emitter().set_line(span.line);
        }
        lowerer
            .lower_statement(statement)
            .map_err(|fault| (fault, *span))?;
    }
    if !matches!(statements.last(), Some((Statement::Return(..), _))) {
        lowerer.emitter().emit_return_void();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AssignOp, AstBuilder, BinaryOp};
    use crate::bytecode::OpCode;
    use bumpalo::Bump;
    use sharplower_core::{DiagnosticCode, primitives};

    fn compile(
        registry: &TypeRegistry,
        decl: &FunctionDecl,
        body: &[Stmt<'_>],
    ) -> (Option<CompiledFunction>, Diagnostics) {
        let mut constants = ConstantPool::new();
        let mut diagnostics = Diagnostics::new();
        let compiled = FunctionCompiler::new(registry, &mut constants, &mut diagnostics, CompilerOptions::default())
            .compile(decl, body);
        (compiled, diagnostics)
    }

    #[test]
    fn void_body_gets_implicit_return() {
        let arena = Bump::new();
        let ast = AstBuilder::new(&arena);
        let registry = TypeRegistry::with_primitives();
        let decl = FunctionDecl::new("f", primitives::VOID).param("x", primitives::INT32);
        let body = [ast.expr_stmt(ast.assign(ast.ident("x"), AssignOp::Assign, ast.int(3)))];

        let (compiled, diagnostics) = compile(&registry, &decl, &body);
        assert!(diagnostics.is_empty());
        compiled
            .unwrap()
            .chunk
            .assert_opcodes(&[OpCode::Constant, OpCode::SetLocal, OpCode::ReturnVoid]);
    }

    #[test]
    fn errors_in_every_statement_are_reported() {
        let arena = Bump::new();
        let ast = AstBuilder::new(&arena);
        let registry = TypeRegistry::with_primitives();
        let decl = FunctionDecl::new("f", primitives::VOID);
        let body = [
            ast.expr_stmt(ast.ident("missing")),
            ast.expr_stmt(ast.binary(ast.bool(true), BinaryOp::Add, ast.int(1))),
        ];

        let (compiled, diagnostics) = compile(&registry, &decl, &body);
        assert!(compiled.is_none());
        assert_eq!(diagnostics.error_count(), 2);
        assert!(diagnostics.contains(DiagnosticCode::UNKNOWN_NAME));
        assert!(diagnostics.contains(DiagnosticCode::OPERATOR_NOT_APPLICABLE));
    }

    #[test]
    fn lowering_fault_skips_only_that_member() {
        let arena = Bump::new();
        let ast = AstBuilder::new(&arena);
        let mut registry = TypeRegistry::with_primitives();
        registry.add_function("wide", &[primitives::INT32; 256], primitives::VOID);

        // Resolves fine, but no call instruction can carry 256 arguments.
        let args: Vec<_> = (0..256).map(|i| ast.int(i)).collect();
        let first = ast.var("int", "x", Some(ast.int(1)));
        ast.newline();
        let call = ast.expr_stmt(ast.call("wide", &args));
        let broken = [first, call];
        let fine = [ast.ret(Some(ast.int(2)))];

        let mut constants = ConstantPool::new();
        let mut diagnostics = Diagnostics::new();
        let mut compiler =
            FunctionCompiler::new(&registry, &mut constants, &mut diagnostics, CompilerOptions::default());
        let skipped = compiler.compile(&FunctionDecl::new("f", primitives::VOID), &broken);
        let sibling = compiler.compile(&FunctionDecl::new("g", primitives::INT32), &fine);

        assert!(skipped.is_none());
        assert!(sibling.is_some());
        assert_eq!(diagnostics.error_count(), 1);
        let internal = diagnostics.errors().next().unwrap();
        assert_eq!(internal.code, DiagnosticCode::INTERNAL_ERROR);
        assert!(internal.message.contains("256 arguments"), "{}", internal.message);
        // Reported at the statement that failed, not the member.
        assert_eq!(internal.span.line, 2);
    }

    #[test]
    fn parameters_come_first_in_local_table() {
        let arena = Bump::new();
        let ast = AstBuilder::new(&arena);
        let registry = TypeRegistry::with_primitives();
        let decl = FunctionDecl::new("f", primitives::INT32)
            .param("a", primitives::INT32)
            .param("b", primitives::DOUBLE);
        let body = [
            ast.var("long", "c", Some(ast.ident("a"))),
            ast.ret(Some(ast.ident("a"))),
        ];

        let (compiled, _) = compile(&registry, &decl, &body);
        let compiled = compiled.unwrap();
        assert_eq!(compiled.param_count, 2);
        assert_eq!(
            compiled.local_types,
            vec![primitives::INT32, primitives::DOUBLE, primitives::INT64]
        );
        assert_eq!(compiled.chunk.opcodes().last(), Some(&OpCode::Return));
    }
}
