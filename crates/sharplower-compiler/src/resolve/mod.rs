//! Resolution: AST in, typed [`Node`] tree out.
//!
//! The resolver never mutates its input. Each `resolve_*` consumes a borrowed
//! AST node and returns a freshly built [`Node`], so resolving the same
//! expression twice gives two independent trees.
//!
//! ## Error recovery
//!
//! User errors are `CompilationError`s propagated with `?` up to the
//! statement, where they are reported. Where an expression has independent
//! children (both operands of a binary operator, every call argument) each
//! child is resolved even if a sibling failed, and all but the last error are
//! reported on the spot, so one pass surfaces every independent mistake.
//!
//! ## Submodules
//!
//! - `assign`: simple and compound assignment, `++`/`--`, events
//! - `lifted`: operators, conversions and `??` over nullable operands

mod assign;
mod lifted;

use bitflags::bitflags;
use log::debug;
use sharplower_core::{CompilationError, DiagnosticCode, Diagnostics, Span, TypeHash, primitives};

use crate::ast::{
    BinaryExpr, BinaryOp, CallExpr, CastExpr, Expr, IdentExpr, IndexExpr, LiteralExpr, LiteralKind,
    MemberExpr, NewExpr, PostfixOp, Stmt, UnaryExpr, UnaryOp,
};
use crate::conversion::{Conversion, ConversionKind, find_conversion, integral_range, is_integral};
use crate::node::{ConstValue, HandleAccess, HandleId, Lifted, Node, NodeKind, NullableHandle, Statement};
use crate::operators::{primitive_binary, primitive_unary};
use crate::options::CompilerOptions;
use crate::registry::{NullableInfo, TypeKind, TypeRegistry};
use crate::scope::LocalScope;

type Result<T> = std::result::Result<T, CompilationError>;

bitflags! {
    /// How an expression is about to be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResolveFlags: u8 {
        /// Written to.
        const ASSIGN_TARGET = 1 << 0;
        /// Read and then written (`op=`, `++`, `--`).
        const COMPOUND = 1 << 1;
    }
}

/// Per-member resolution context.
pub struct Resolver<'a> {
    registry: &'a TypeRegistry,
    scope: &'a mut LocalScope,
    diagnostics: &'a mut Diagnostics,
    options: CompilerOptions,
    return_type: TypeHash,
    /// Inside a generic context the value-type null comparison folds silently.
    is_generic: bool,
    next_handle: u32,
}

impl<'a> Resolver<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        scope: &'a mut LocalScope,
        diagnostics: &'a mut Diagnostics,
        options: CompilerOptions,
    ) -> Self {
        Self {
            registry,
            scope,
            diagnostics,
            options,
            return_type: primitives::VOID,
            is_generic: false,
            next_handle: 0,
        }
    }

    pub fn with_return_type(mut self, return_type: TypeHash) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn in_generic_context(mut self, is_generic: bool) -> Self {
        self.is_generic = is_generic;
        self
    }

    // ==========================================================================
    // Statements
    // ==========================================================================

    /// Resolve one statement, reporting any errors. `None` when the statement
    /// failed or produces no code.
    pub fn resolve_statement(&mut self, stmt: &Stmt<'_>) -> Option<Statement> {
        let result = match stmt {
            Stmt::VarDecl(decl) => self.resolve_var_decl(decl.name, decl.type_name, decl.init, decl.span),
            Stmt::Expr(expr) => self.resolve_expr(expr.expr).map(|node| Some(Statement::Expr(node))),
            Stmt::Return(ret) => self.resolve_return(ret.value, ret.span).map(Some),
        };
        match result {
            Ok(statement) => statement,
            Err(err) => {
                self.diagnostics.error(err);
                None
            }
        }
    }

    fn resolve_var_decl(
        &mut self,
        name: &str,
        type_name: &str,
        init: Option<&Expr<'_>>,
        span: Span,
    ) -> Result<Option<Statement>> {
        let ty = self.lookup_type(type_name, span)?;
        let init = init.map(|expr| self.resolve_expr(expr)).transpose();
        let slot = self.scope.declare(name, ty, span)?;
        let Some(init) = init? else {
            return Ok(None);
        };

        let target = Node::new(NodeKind::Local(slot), ty, span);
        let assign = self.assign_to(target, init, span)?;
        Ok(Some(Statement::Expr(assign)))
    }

    fn resolve_return(&mut self, value: Option<&Expr<'_>>, span: Span) -> Result<Statement> {
        match value {
            Some(expr) => {
                let node = self.resolve_expr(expr)?;
                if self.return_type == primitives::VOID {
                    return Err(CompilationError::CannotConvert {
                        from: self.type_name(node.ty),
                        to: "void".to_string(),
                        span: node.span,
                    });
                }
                let node = self.convert_implicit(node, self.return_type)?;
                Ok(Statement::Return(Some(node), span))
            }
            None => Ok(Statement::Return(None, span)),
        }
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    /// Resolve an expression whose value is used.
    pub fn resolve_expr(&mut self, expr: &Expr<'_>) -> Result<Node> {
        match expr {
            Expr::Literal(lit) => Ok(self.resolve_literal(lit)),
            Expr::Ident(ident) => self.resolve_ident(ident),
            Expr::Member(member) => {
                let receiver = self.resolve_expr(member.object)?;
                self.resolve_member_on(receiver, member, ResolveFlags::empty())
            }
            Expr::Index(index) => self.resolve_index(index),
            Expr::Call(call) => self.resolve_call(call),
            Expr::New(new) => self.resolve_new(new),
            Expr::Unary(unary) => match unary.op {
                UnaryOp::PreInc | UnaryOp::PreDec => {
                    self.resolve_mutator(unary.operand, unary.op == UnaryOp::PreInc, false, unary.span)
                }
                _ => self.resolve_unary(unary),
            },
            Expr::Binary(binary) => self.resolve_binary(binary),
            Expr::Postfix(postfix) => self.resolve_mutator(
                postfix.operand,
                postfix.op == PostfixOp::PostInc,
                true,
                postfix.span,
            ),
            Expr::Cast(cast) => self.resolve_cast(cast),
            Expr::Assign(assign) => self.resolve_assign(assign),
        }
    }

    /// Resolve two independent operands, reporting the first error if both fail.
    fn resolve_pair(&mut self, left: &Expr<'_>, right: &Expr<'_>) -> Result<(Node, Node)> {
        let left = self.resolve_expr(left);
        let right = self.resolve_expr(right);
        self.join(left, right)
    }

    fn join<A, B>(&mut self, left: Result<A>, right: Result<B>) -> Result<(A, B)> {
        match (left, right) {
            (Ok(left), Ok(right)) => Ok((left, right)),
            (Err(err), Ok(_)) | (Ok(_), Err(err)) => Err(err),
            (Err(first), Err(second)) => {
                self.diagnostics.error(first);
                Err(second)
            }
        }
    }

    /// Resolve every argument, reporting all but the last failure.
    fn resolve_args(&mut self, args: &[&Expr<'_>]) -> Result<Vec<Node>> {
        let mut nodes = Vec::with_capacity(args.len());
        let mut pending: Option<CompilationError> = None;
        for arg in args {
            match self.resolve_expr(arg) {
                Ok(node) => nodes.push(node),
                Err(err) => {
                    if let Some(previous) = pending.replace(err) {
                        self.diagnostics.error(previous);
                    }
                }
            }
        }
        match pending {
            Some(err) => Err(err),
            None => Ok(nodes),
        }
    }

    fn resolve_literal(&mut self, lit: &LiteralExpr<'_>) -> Node {
        let span = lit.span;
        match lit.kind {
            LiteralKind::Int(value) => {
                let ty = if i32::try_from(value).is_ok() {
                    primitives::INT32
                } else {
                    primitives::INT64
                };
                Node::constant(ConstValue::Int(value), ty, span)
            }
            LiteralKind::Float(value) => Node::constant(ConstValue::Float(value), primitives::FLOAT, span),
            LiteralKind::Double(value) => {
                Node::constant(ConstValue::Double(value), primitives::DOUBLE, span)
            }
            LiteralKind::Bool(value) => Node::bool(value, span),
            LiteralKind::String(value) => {
                Node::constant(ConstValue::Str(value.to_string()), primitives::STRING, span)
            }
            LiteralKind::Null => Node::new(NodeKind::Null, primitives::NULL, span),
        }
    }

    fn resolve_ident(&mut self, ident: &IdentExpr<'_>) -> Result<Node> {
        if let Some(local) = self.scope.lookup(ident.name) {
            return Ok(Node::new(NodeKind::Local(local.slot), local.ty, ident.span));
        }
        if let Some(global) = self.registry.global(ident.name) {
            return Ok(Node::new(NodeKind::Global(global.hash), global.ty, ident.span));
        }
        if self.registry.function(ident.name).is_some() {
            return Err(CompilationError::MethodGroupValue {
                name: ident.name.to_string(),
                span: ident.span,
            });
        }
        Err(CompilationError::UnknownIdentifier {
            name: ident.name.to_string(),
            span: ident.span,
        })
    }

    /// Member access on an already resolved receiver.
    fn resolve_member_on(
        &mut self,
        receiver: Node,
        member: &MemberExpr<'_>,
        flags: ResolveFlags,
    ) -> Result<Node> {
        let owner = receiver.ty;
        let name = member.member;
        let span = member.span;
        let writing = flags.contains(ResolveFlags::ASSIGN_TARGET);
        let reading = !writing || flags.contains(ResolveFlags::COMPOUND);

        if let Some(info) = self.registry.nullable_info(owner) {
            return self.resolve_nullable_member(receiver, info, name, span, writing);
        }

        if let Some((index, field)) = self.registry.field(owner, name) {
            let ty = field.ty;
            if writing && field.readonly {
                return Err(CompilationError::ReadOnly {
                    name: name.to_string(),
                    span,
                });
            }
            let receiver = if writing {
                self.writable_receiver(receiver, span)?
            } else {
                receiver
            };
            let kind = NodeKind::Field {
                receiver: Box::new(receiver),
                index,
            };
            return Ok(Node::new(kind, ty, span));
        }

        if let Some(property) = self.registry.property(owner, name) {
            let (ty, getter, setter) = (property.ty, property.getter, property.setter);
            if reading && getter.is_none() {
                return Err(CompilationError::WriteOnly {
                    name: name.to_string(),
                    span,
                });
            }
            if writing && setter.is_none() {
                return Err(CompilationError::ReadOnly {
                    name: name.to_string(),
                    span,
                });
            }
            let receiver = if writing {
                self.writable_receiver(receiver, span)?
            } else {
                receiver
            };
            let kind = NodeKind::Property {
                receiver: Box::new(receiver),
                getter,
                setter,
            };
            return Ok(Node::new(kind, ty, span));
        }

        if self.registry.event(owner, name).is_some() {
            return Err(CompilationError::EventMisuse {
                name: name.to_string(),
                span,
            });
        }

        if self.registry.has_method(owner, name) {
            return Err(if writing {
                CompilationError::MethodGroupAssignment {
                    name: name.to_string(),
                    span,
                }
            } else {
                CompilationError::MethodGroupValue {
                    name: name.to_string(),
                    span,
                }
            });
        }

        Err(CompilationError::UnknownMember {
            owner: self.type_name(owner),
            name: name.to_string(),
            span,
        })
    }

    /// `.HasValue` and `.Value` on a nullable; both read-only.
    fn resolve_nullable_member(
        &mut self,
        receiver: Node,
        info: NullableInfo,
        name: &str,
        span: Span,
        writing: bool,
    ) -> Result<Node> {
        if writing && (name == "HasValue" || name == "Value") {
            return Err(CompilationError::ReadOnly {
                name: name.to_string(),
                span,
            });
        }
        match name {
            "HasValue" => {
                let handle = self.bind(receiver, info);
                Ok(Node::new(
                    NodeKind::HasValue {
                        handle,
                        negate: false,
                    },
                    primitives::BOOL,
                    span,
                ))
            }
            "Value" => {
                let handle = self.bind(receiver, info);
                Ok(Node::new(NodeKind::UnwrapValue(handle), info.underlying, span))
            }
            _ => Err(CompilationError::UnknownMember {
                owner: self.type_name(info.nullable),
                name: name.to_string(),
                span,
            }),
        }
    }

    /// Members of a value type can only be written through a local's address.
    fn writable_receiver(&self, receiver: Node, span: Span) -> Result<Node> {
        if !self.registry.is_value_type(receiver.ty) {
            return Ok(receiver);
        }
        match receiver.kind {
            NodeKind::Local(slot) => Ok(Node::new(NodeKind::LocalAddress(slot), receiver.ty, receiver.span)),
            _ => Err(CompilationError::NotAssignable { span }),
        }
    }

    fn resolve_index(&mut self, index: &IndexExpr<'_>) -> Result<Node> {
        let (array, position) = self.resolve_pair(index.object, index.index)?;
        let Some(element) = self.registry.array_element(array.ty) else {
            return Err(CompilationError::CannotApplyIndexing {
                ty: self.type_name(array.ty),
                span: index.span,
            });
        };
        let position = self.convert_implicit(position, primitives::INT32)?;
        let kind = NodeKind::Element {
            array: Box::new(array),
            index: Box::new(position),
        };
        Ok(Node::new(kind, element, index.span))
    }

    fn resolve_call(&mut self, call: &CallExpr<'_>) -> Result<Node> {
        match call.callee {
            Expr::Ident(ident) => {
                let args = self.resolve_args(call.args);
                let function = self.registry.function(ident.name).ok_or_else(|| {
                    CompilationError::UnknownFunction {
                        name: ident.name.to_string(),
                        span: ident.span,
                    }
                });
                let (function, args) = self.join(function, args)?;
                let args = self.convert_args(&function.name, &function.params, args, call.span)?;
                let kind = NodeKind::Call {
                    function: function.hash,
                    args,
                };
                Ok(Node::new(kind, function.return_type, call.span))
            }
            Expr::Member(member) => {
                let receiver = self.resolve_expr(member.object);
                let args = self.resolve_args(call.args);
                let (receiver, args) = self.join(receiver, args)?;
                let Some(method) = self.registry.method(receiver.ty, member.member) else {
                    return Err(CompilationError::UnknownMember {
                        owner: self.type_name(receiver.ty),
                        name: member.member.to_string(),
                        span: member.span,
                    });
                };
                let args = self.convert_args(&method.name, &method.params, args, call.span)?;
                let kind = NodeKind::MethodCall {
                    receiver: Box::new(receiver),
                    method: method.hash,
                    args,
                };
                Ok(Node::new(kind, method.return_type, call.span))
            }
            other => Err(CompilationError::UnknownFunction {
                name: "<expression>".to_string(),
                span: other.span(),
            }),
        }
    }

    fn convert_args(
        &mut self,
        name: &str,
        params: &[TypeHash],
        args: Vec<Node>,
        span: Span,
    ) -> Result<Vec<Node>> {
        if params.len() != args.len() {
            return Err(CompilationError::ArgumentCount {
                name: name.to_string(),
                expected: params.len(),
                found: args.len(),
                span,
            });
        }
        args.into_iter()
            .zip(params)
            .map(|(arg, &param)| self.convert_implicit(arg, param))
            .collect()
    }

    fn resolve_new(&mut self, new: &NewExpr<'_>) -> Result<Node> {
        let ty = self.lookup_type(new.type_name, new.span);
        let args = self.resolve_args(new.args);
        let (ty, args) = self.join(ty, args)?;

        match self.registry.constructor(ty, args.len()) {
            Some(ctor) => {
                let (hash, params) = (ctor.hash, ctor.params.clone());
                let args = self.convert_args(new.type_name, &params, args, new.span)?;
                let kind = NodeKind::New {
                    constructor: Some(hash),
                    args,
                };
                Ok(Node::new(kind, ty, new.span))
            }
            // Value types always have the zero-initializing form.
            None if args.is_empty() && self.registry.is_value_type(ty) => {
                let kind = NodeKind::New {
                    constructor: None,
                    args,
                };
                Ok(Node::new(kind, ty, new.span))
            }
            None => Err(CompilationError::ArgumentCount {
                name: new.type_name.to_string(),
                expected: self
                    .registry
                    .get(ty)
                    .and_then(|def| def.constructors.first())
                    .and_then(|hash| self.registry.function_by_hash(*hash))
                    .map_or(0, |ctor| ctor.params.len()),
                found: args.len(),
                span: new.span,
            }),
        }
    }

    fn resolve_unary(&mut self, unary: &UnaryExpr<'_>) -> Result<Node> {
        let operand = self.resolve_expr(unary.operand)?;
        let span = unary.span;

        if let Some(info) = self.registry.nullable_info(operand.ty) {
            return self.resolve_lifted_unary(unary.op, operand, info, span);
        }

        let Some(resolved) = primitive_unary(unary.op, operand.ty) else {
            return Err(self.unary_not_applicable(&unary.op.to_string(), operand.ty, span));
        };
        let operand = self.convert_implicit(operand, resolved.operand)?;

        if unary.op == UnaryOp::Neg {
            if let Some(folded) = negate_constant(operand.const_value()) {
                return Ok(Node::constant(folded, resolved.result, span));
            }
        }

        Ok(match resolved.opcode {
            Some(opcode) => Node::new(
                NodeKind::Unary {
                    opcode: Some(opcode),
                    operand: Box::new(operand),
                },
                resolved.result,
                span,
            ),
            None => Node { span, ..operand },
        })
    }

    fn resolve_binary(&mut self, binary: &BinaryExpr<'_>) -> Result<Node> {
        match binary.op {
            BinaryOp::NullCoalesce => self.resolve_coalesce(binary),
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => self.resolve_logical(binary),
            op => {
                let (left, right) = self.resolve_pair(binary.left, binary.right)?;
                self.resolve_binary_nodes(op, left, right, binary.span)
            }
        }
    }

    /// `&&` / `||`: plain booleans only.
    fn resolve_logical(&mut self, binary: &BinaryExpr<'_>) -> Result<Node> {
        let (left, right) = self.resolve_pair(binary.left, binary.right)?;
        for operand in [&left, &right] {
            if self.registry.is_nullable(operand.ty) {
                return Err(CompilationError::NullableLogicalOperator {
                    op: binary.op.to_string(),
                    ty: self.type_name(operand.ty),
                    span: binary.span,
                });
            }
        }
        if left.ty != primitives::BOOL || right.ty != primitives::BOOL {
            return Err(self.not_applicable(binary.op, left.ty, right.ty, binary.span));
        }
        let kind = NodeKind::ShortCircuit {
            is_and: binary.op == BinaryOp::LogicalAnd,
            left: Box::new(left),
            right: Box::new(right),
        };
        Ok(Node::new(kind, primitives::BOOL, binary.span))
    }

    /// Resolve an operator over two resolved operands. Shared with compound
    /// assignment, whose left operand is the target placeholder.
    fn resolve_binary_nodes(&mut self, op: BinaryOp, left: Node, right: Node, span: Span) -> Result<Node> {
        if self.needs_lifting(&left, &right) {
            return self.resolve_lifted_binary(op, left, right, span);
        }

        if op.is_equality() && self.is_reference_comparison(&left, &right) {
            let kind = NodeKind::Binary {
                opcode: crate::bytecode::OpCode::EqRef,
                negate: op == BinaryOp::NotEqual,
                left: Box::new(left),
                right: Box::new(right),
            };
            return Ok(Node::new(kind, primitives::BOOL, span));
        }

        let Some(resolved) = primitive_binary(op, left.ty, right.ty) else {
            return Err(self.not_applicable(op, left.ty, right.ty, span));
        };
        let left = self.convert_implicit(left, resolved.left)?;
        let right = self.convert_implicit(right, resolved.right)?;
        let kind = NodeKind::Binary {
            opcode: resolved.opcode,
            negate: resolved.negate,
            left: Box::new(left),
            right: Box::new(right),
        };
        Ok(Node::new(kind, resolved.result, span))
    }

    fn is_reference_comparison(&self, left: &Node, right: &Node) -> bool {
        let reference = |node: &Node| node.is_null_literal() || self.registry.is_reference_type(node.ty);
        reference(left)
            && reference(right)
            && (left.ty == right.ty || left.is_null_literal() || right.is_null_literal())
    }

    fn resolve_cast(&mut self, cast: &CastExpr<'_>) -> Result<Node> {
        let ty = self.lookup_type(cast.type_name, cast.span);
        let operand = self.resolve_expr(cast.expr);
        let (ty, operand) = self.join(ty, operand)?;
        let node = self.convert_explicit(operand, ty)?;
        Ok(Node {
            span: cast.span,
            ..node
        })
    }

    // ==========================================================================
    // Conversions
    // ==========================================================================

    /// Whether `node` converts implicitly to `to`, including integer
    /// constants that fit the target's range.
    fn implicitly_convertible(&self, node: &Node, to: TypeHash) -> bool {
        match find_conversion(self.registry, node.ty, to) {
            Some(conv) => conv.is_implicit || constant_fits(node, &conv),
            None => false,
        }
    }

    pub(crate) fn convert_implicit(&mut self, node: Node, to: TypeHash) -> Result<Node> {
        if node.ty == to {
            return Ok(node);
        }
        let Some(conv) = find_conversion(self.registry, node.ty, to) else {
            return Err(CompilationError::CannotConvert {
                from: self.type_name(node.ty),
                to: self.type_name(to),
                span: node.span,
            });
        };
        if !conv.is_implicit && !constant_fits(&node, &conv) {
            return Err(CompilationError::CannotImplicitlyConvert {
                from: self.type_name(node.ty),
                to: self.type_name(to),
                span: node.span,
            });
        }
        self.apply_conversion(node, &conv, to)
    }

    fn convert_explicit(&mut self, node: Node, to: TypeHash) -> Result<Node> {
        if node.ty == to {
            return Ok(node);
        }
        let Some(conv) = find_conversion(self.registry, node.ty, to) else {
            return Err(CompilationError::CannotConvert {
                from: self.type_name(node.ty),
                to: self.type_name(to),
                span: node.span,
            });
        };
        self.apply_conversion(node, &conv, to)
    }

    fn apply_conversion(&mut self, node: Node, conv: &Conversion, to: TypeHash) -> Result<Node> {
        let span = node.span;
        Ok(match &conv.kind {
            ConversionKind::Identity => node,
            ConversionKind::Primitive { from, to } => match fold_numeric(node.const_value(), *to) {
                Some(value) => Node::constant(value, *to, span),
                None => {
                    let ops = crate::conversion::primitive_conversion_ops(*from, *to);
                    if ops.is_empty() {
                        Node { ty: *to, ..node }
                    } else {
                        let kind = NodeKind::Convert {
                            ops,
                            operand: Box::new(node),
                        };
                        Node::new(kind, *to, span)
                    }
                }
            },
            ConversionKind::NullToReference => Node::new(NodeKind::Null, to, span),
            ConversionKind::NullToNullable { info } => {
                Node::new(NodeKind::LiftedNull(*info), info.nullable, span)
            }
            ConversionKind::Wrap { info, inner } => {
                let operand = match inner {
                    Some(inner) => self.apply_conversion(node, inner, info.underlying)?,
                    None => node,
                };
                let kind = NodeKind::Wrap {
                    operand: Box::new(operand),
                    info: *info,
                };
                Node::new(kind, info.nullable, span)
            }
            ConversionKind::Unwrap { info, inner } => {
                let handle = self.bind(node, *info);
                let value = Node::new(NodeKind::UnwrapValue(handle), info.underlying, span);
                match inner {
                    Some(inner) => self.apply_conversion(value, inner, to)?,
                    None => value,
                }
            }
            ConversionKind::Lifted { from, to: target, inner } => {
                let handle = self.bind(node, *from);
                let read = Node::read(handle.id, HandleAccess::ValueOrDefault, from.underlying, span);
                let underlying = self.apply_conversion(read, inner, target.underlying)?;
                debug!("lifted conversion {} -> {}", self.type_name(from.nullable), self.type_name(target.nullable));
                let lifted = Lifted::Conversion {
                    operand: handle,
                    underlying,
                    result: *target,
                };
                Node::new(NodeKind::Lifted(Box::new(lifted)), target.nullable, span)
            }
            ConversionKind::UserDefined { function } => {
                let kind = NodeKind::UserConversion {
                    function: *function,
                    operand: Box::new(node),
                };
                Node::new(kind, to, span)
            }
        })
    }

    // ==========================================================================
    // Helpers
    // ==========================================================================

    fn fresh_handle(&mut self) -> HandleId {
        let id = HandleId(self.next_handle);
        self.next_handle += 1;
        id
    }

    /// Bind a nullable operand for single evaluation.
    fn bind(&mut self, source: Node, info: NullableInfo) -> NullableHandle {
        NullableHandle {
            id: self.fresh_handle(),
            source: Box::new(source),
            info,
        }
    }

    fn lookup_type(&self, name: &str, span: Span) -> Result<TypeHash> {
        self.registry
            .lookup_type(name)
            .filter(|ty| self.registry.kind(*ty) != Some(TypeKind::Null))
            .ok_or_else(|| CompilationError::UnknownType {
                name: name.to_string(),
                span,
            })
    }

    fn type_name(&self, ty: TypeHash) -> String {
        self.registry.type_name(ty)
    }

    fn not_applicable(&self, op: BinaryOp, left: TypeHash, right: TypeHash, span: Span) -> CompilationError {
        CompilationError::OperatorNotApplicable {
            op: op.to_string(),
            left: self.type_name(left),
            right: self.type_name(right),
            span,
        }
    }

    fn unary_not_applicable(&self, op: &str, operand: TypeHash, span: Span) -> CompilationError {
        CompilationError::OperatorNotApplicable {
            op: op.to_string(),
            left: self.type_name(operand),
            right: String::new(),
            span,
        }
    }

    /// Report a warning if the configured level admits it.
    fn warn(&mut self, code: DiagnosticCode, level: u8, span: Span, message: String) {
        if self.options.reports_warning(level) {
            self.diagnostics.warning(code, span, message);
        }
    }
}

/// An integer constant converting to an integral type it fits, directly or
/// under a nullable wrap.
fn constant_fits(node: &Node, conv: &Conversion) -> bool {
    let Some(ConstValue::Int(value)) = node.const_value() else {
        return false;
    };
    let target = match &conv.kind {
        ConversionKind::Primitive { to, .. } => *to,
        ConversionKind::Wrap {
            inner: Some(inner), ..
        } => match inner.kind {
            ConversionKind::Primitive { to, .. } => to,
            _ => return false,
        },
        _ => return false,
    };
    if !is_integral(target) {
        return false;
    }
    integral_range(target).is_some_and(|(min, max)| (min..=max).contains(value))
}

/// Fold a numeric constant into `to`, with the truncation the runtime applies.
fn fold_numeric(value: Option<&ConstValue>, to: TypeHash) -> Option<ConstValue> {
    let as_int = |v: i64| -> ConstValue {
        ConstValue::Int(match to {
            t if t == primitives::INT8 => v as i8 as i64,
            t if t == primitives::UINT8 => v as u8 as i64,
            t if t == primitives::INT16 => v as i16 as i64,
            t if t == primitives::INT32 => v as i32 as i64,
            _ => v,
        })
    };
    let folded = match value? {
        ConstValue::Int(v) if is_integral(to) => as_int(*v),
        ConstValue::Int(v) if to == primitives::FLOAT => ConstValue::Float(*v as f32),
        ConstValue::Int(v) if to == primitives::DOUBLE => ConstValue::Double(*v as f64),
        ConstValue::Float(v) if to == primitives::DOUBLE => ConstValue::Double(*v as f64),
        ConstValue::Float(v) if is_integral(to) => as_int(*v as i64),
        ConstValue::Double(v) if to == primitives::FLOAT => ConstValue::Float(*v as f32),
        ConstValue::Double(v) if is_integral(to) => as_int(*v as i64),
        _ => return None,
    };
    Some(folded)
}

fn negate_constant(value: Option<&ConstValue>) -> Option<ConstValue> {
    match value? {
        ConstValue::Int(v) => Some(ConstValue::Int(v.wrapping_neg())),
        ConstValue::Float(v) => Some(ConstValue::Float(-v)),
        ConstValue::Double(v) => Some(ConstValue::Double(-v)),
        _ => None,
    }
}
