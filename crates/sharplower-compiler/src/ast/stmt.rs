//! Statement nodes.
//!
//! Only the statements a member body needs to exercise expression lowering:
//! local declarations, expression statements and `return`.

use sharplower_core::Span;

use super::Expr;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stmt<'ast> {
    /// `T name = init;`
    VarDecl(&'ast VarDeclStmt<'ast>),
    Expr(ExprStmt<'ast>),
    Return(ReturnStmt<'ast>),
}

impl<'ast> Stmt<'ast> {
    pub fn span(&self) -> Span {
        match self {
            Self::VarDecl(s) => s.span,
            Self::Expr(s) => s.span,
            Self::Return(s) => s.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarDeclStmt<'ast> {
    pub name: &'ast str,
    pub type_name: &'ast str,
    pub init: Option<&'ast Expr<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExprStmt<'ast> {
    pub expr: &'ast Expr<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnStmt<'ast> {
    pub value: Option<&'ast Expr<'ast>>,
    pub span: Span,
}
