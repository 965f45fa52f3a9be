//! Arena-backed construction helpers.
//!
//! There is no parser in this workspace; bodies are built programmatically.
//! Every node gets a distinct span on the current line so diagnostics can be
//! told apart.
//!
//! ```
//! use bumpalo::Bump;
//! use sharplower_compiler::ast::{AstBuilder, BinaryOp};
//!
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena);
//! let sum = b.binary(b.ident("a"), BinaryOp::Add, b.int(1));
//! assert_ne!(sum.span(), b.ident("a").span());
//! ```

use std::cell::Cell;

use bumpalo::Bump;
use sharplower_core::Span;

use super::*;

pub struct AstBuilder<'ast> {
    arena: &'ast Bump,
    line: Cell<u32>,
    col: Cell<u32>,
}

impl<'ast> AstBuilder<'ast> {
    pub fn new(arena: &'ast Bump) -> Self {
        Self {
            arena,
            line: Cell::new(1),
            col: Cell::new(1),
        }
    }

    /// Move to the next source line.
    pub fn newline(&self) {
        self.line.set(self.line.get() + 1);
        self.col.set(1);
    }

    fn span(&self) -> Span {
        let col = self.col.get();
        self.col.set(col + 1);
        Span::new(self.line.get(), col, 1)
    }

    fn alloc(&self, expr: Expr<'ast>) -> &'ast Expr<'ast> {
        self.arena.alloc(expr)
    }

    fn args(&self, args: &[&'ast Expr<'ast>]) -> &'ast [&'ast Expr<'ast>] {
        self.arena.alloc_slice_copy(args)
    }

    // ==========================================================================
    // Literals
    // ==========================================================================

    fn literal(&self, kind: LiteralKind<'ast>) -> &'ast Expr<'ast> {
        self.alloc(Expr::Literal(LiteralExpr {
            kind,
            span: self.span(),
        }))
    }

    pub fn int(&self, value: i64) -> &'ast Expr<'ast> {
        self.literal(LiteralKind::Int(value))
    }

    pub fn float(&self, value: f32) -> &'ast Expr<'ast> {
        self.literal(LiteralKind::Float(value))
    }

    pub fn double(&self, value: f64) -> &'ast Expr<'ast> {
        self.literal(LiteralKind::Double(value))
    }

    pub fn bool(&self, value: bool) -> &'ast Expr<'ast> {
        self.literal(LiteralKind::Bool(value))
    }

    pub fn string(&self, value: &str) -> &'ast Expr<'ast> {
        let value = self.arena.alloc_str(value);
        self.literal(LiteralKind::String(value))
    }

    pub fn null(&self) -> &'ast Expr<'ast> {
        self.literal(LiteralKind::Null)
    }

    // ==========================================================================
    // Names and members
    // ==========================================================================

    pub fn ident(&self, name: &str) -> &'ast Expr<'ast> {
        let name = self.arena.alloc_str(name);
        self.alloc(Expr::Ident(IdentExpr {
            name,
            span: self.span(),
        }))
    }

    pub fn member(&self, object: &'ast Expr<'ast>, member: &str) -> &'ast Expr<'ast> {
        let member = self.arena.alloc_str(member);
        let node = self.arena.alloc(MemberExpr {
            object,
            member,
            span: self.span(),
        });
        self.alloc(Expr::Member(node))
    }

    pub fn index(&self, object: &'ast Expr<'ast>, index: &'ast Expr<'ast>) -> &'ast Expr<'ast> {
        let node = self.arena.alloc(IndexExpr {
            object,
            index,
            span: self.span(),
        });
        self.alloc(Expr::Index(node))
    }

    /// Call of a global function.
    pub fn call(&self, function: &str, args: &[&'ast Expr<'ast>]) -> &'ast Expr<'ast> {
        let callee = self.ident(function);
        self.call_expr(callee, args)
    }

    /// Call of a method on `object`.
    pub fn method_call(
        &self,
        object: &'ast Expr<'ast>,
        method: &str,
        args: &[&'ast Expr<'ast>],
    ) -> &'ast Expr<'ast> {
        let callee = self.member(object, method);
        self.call_expr(callee, args)
    }

    fn call_expr(&self, callee: &'ast Expr<'ast>, args: &[&'ast Expr<'ast>]) -> &'ast Expr<'ast> {
        let node = self.arena.alloc(CallExpr {
            callee,
            args: self.args(args),
            span: self.span(),
        });
        self.alloc(Expr::Call(node))
    }

    pub fn new_object(&self, type_name: &str, args: &[&'ast Expr<'ast>]) -> &'ast Expr<'ast> {
        let type_name = self.arena.alloc_str(type_name);
        let node = self.arena.alloc(NewExpr {
            type_name,
            args: self.args(args),
            span: self.span(),
        });
        self.alloc(Expr::New(node))
    }

    // ==========================================================================
    // Operators
    // ==========================================================================

    pub fn unary(&self, op: UnaryOp, operand: &'ast Expr<'ast>) -> &'ast Expr<'ast> {
        let node = self.arena.alloc(UnaryExpr {
            op,
            operand,
            span: self.span(),
        });
        self.alloc(Expr::Unary(node))
    }

    pub fn binary(
        &self,
        left: &'ast Expr<'ast>,
        op: BinaryOp,
        right: &'ast Expr<'ast>,
    ) -> &'ast Expr<'ast> {
        let node = self.arena.alloc(BinaryExpr {
            left,
            op,
            right,
            span: self.span(),
        });
        self.alloc(Expr::Binary(node))
    }

    pub fn coalesce(&self, left: &'ast Expr<'ast>, right: &'ast Expr<'ast>) -> &'ast Expr<'ast> {
        self.binary(left, BinaryOp::NullCoalesce, right)
    }

    pub fn postfix(&self, operand: &'ast Expr<'ast>, op: PostfixOp) -> &'ast Expr<'ast> {
        let node = self.arena.alloc(PostfixExpr {
            operand,
            op,
            span: self.span(),
        });
        self.alloc(Expr::Postfix(node))
    }

    pub fn cast(&self, type_name: &str, expr: &'ast Expr<'ast>) -> &'ast Expr<'ast> {
        let type_name = self.arena.alloc_str(type_name);
        let node = self.arena.alloc(CastExpr {
            type_name,
            expr,
            span: self.span(),
        });
        self.alloc(Expr::Cast(node))
    }

    pub fn assign(
        &self,
        target: &'ast Expr<'ast>,
        op: AssignOp,
        value: &'ast Expr<'ast>,
    ) -> &'ast Expr<'ast> {
        let node = self.arena.alloc(AssignExpr {
            target,
            op,
            value,
            span: self.span(),
        });
        self.alloc(Expr::Assign(node))
    }

    // ==========================================================================
    // Statements
    // ==========================================================================

    pub fn var(
        &self,
        type_name: &str,
        name: &str,
        init: Option<&'ast Expr<'ast>>,
    ) -> Stmt<'ast> {
        let node = self.arena.alloc(VarDeclStmt {
            name: self.arena.alloc_str(name),
            type_name: self.arena.alloc_str(type_name),
            init,
            span: self.span(),
        });
        Stmt::VarDecl(node)
    }

    pub fn expr_stmt(&self, expr: &'ast Expr<'ast>) -> Stmt<'ast> {
        Stmt::Expr(ExprStmt {
            expr,
            span: expr.span(),
        })
    }

    pub fn ret(&self, value: Option<&'ast Expr<'ast>>) -> Stmt<'ast> {
        Stmt::Return(ReturnStmt {
            value,
            span: self.span(),
        })
    }
}
