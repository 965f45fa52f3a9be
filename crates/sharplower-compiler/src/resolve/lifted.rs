//! Lifted operators over nullable operands.
//!
//! An operator applied to `T?` operands is the operator over `T` guarded by
//! has-value checks. Each nullable operand is bound to a handle so it is
//! evaluated exactly once; the unlifted operator reads the handles back.
//!
//! A `null` literal operand never reaches the general shape. Against a
//! nullable it becomes a has-value test or a constant, and against a plain
//! value type the comparison folds with a warning.

use log::debug;
use sharplower_core::{DiagnosticCode, Span, TypeHash, primitives};

use super::assign::one;
use super::{Resolver, Result};
use crate::ast::{BinaryExpr, BinaryOp, UnaryOp};
use crate::conversion::{find_implicit, is_numeric};
use crate::node::{
    CoalesceKind, HandleAccess, Lifted, LiftOperand, LiftedBinary, LiftedShape, Node, NodeKind,
    Spill,
};
use crate::operators::{primitive_binary, primitive_unary};
use crate::registry::NullableInfo;

/// Warning level of the constant null comparison diagnostics.
const NULL_COMPARISON_LEVEL: u8 = 2;

impl<'a> Resolver<'a> {
    /// Either operand is nullable, or one is `null` and the other a value type.
    pub(super) fn needs_lifting(&self, left: &Node, right: &Node) -> bool {
        let registry = self.registry;
        registry.is_nullable(left.ty)
            || registry.is_nullable(right.ty)
            || (left.is_null_literal() && registry.is_value_type(right.ty))
            || (right.is_null_literal() && registry.is_value_type(left.ty))
    }

    pub(super) fn resolve_lifted_binary(
        &mut self,
        op: BinaryOp,
        left: Node,
        right: Node,
        span: Span,
    ) -> Result<Node> {
        if left.is_null_literal() {
            return self.resolve_null_operand(op, right, true, span);
        }
        if right.is_null_literal() {
            return self.resolve_null_operand(op, left, false, span);
        }

        let left_info = self.registry.nullable_info(left.ty);
        let right_info = self.registry.nullable_info(right.ty);
        let left_underlying = left_info.map_or(left.ty, |info| info.underlying);
        let right_underlying = right_info.map_or(right.ty, |info| info.underlying);

        if matches!(op, BinaryOp::BitwiseAnd | BinaryOp::BitwiseOr)
            && left_underlying == primitives::BOOL
            && right_underlying == primitives::BOOL
        {
            return self.resolve_three_valued(op, left, right, span);
        }

        let Some(resolved) = primitive_binary(op, left_underlying, right_underlying) else {
            return Err(self.not_applicable(op, left.ty, right.ty, span));
        };

        let (shape, ty) = if op.is_equality() {
            (
                LiftedShape::Equality {
                    negate: resolved.negate,
                },
                primitives::BOOL,
            )
        } else if op.is_ordering() {
            (LiftedShape::Comparison, primitives::BOOL)
        } else {
            let Some(result) = self.nullable_info_of(resolved.result) else {
                return Err(self.not_applicable(op, left.ty, right.ty, span));
            };
            (LiftedShape::Arithmetic { result }, result.nullable)
        };

        let (left, left_read) = self.lift_operand(left, left_info, resolved.left)?;
        let (right, right_read) = self.lift_operand(right, right_info, resolved.right)?;
        let underlying = Node::new(
            NodeKind::Binary {
                opcode: resolved.opcode,
                negate: resolved.negate,
                left: Box::new(left_read),
                right: Box::new(right_read),
            },
            resolved.result,
            span,
        );

        debug!("lifted {op} over {}", self.type_name(ty));
        let lifted = Lifted::Binary(LiftedBinary {
            op,
            shape,
            left,
            right,
            underlying,
        });
        Ok(Node::new(NodeKind::Lifted(Box::new(lifted)), ty, span))
    }

    /// Bind one operand of a lifted operator and build its read, converted
    /// to the type the unlifted operator takes.
    fn lift_operand(
        &mut self,
        node: Node,
        info: Option<NullableInfo>,
        operand_ty: TypeHash,
    ) -> Result<(LiftOperand, Node)> {
        let span = node.span;
        match info {
            Some(info) => {
                let handle = self.bind(node, info);
                let read = Node::read(handle.id, HandleAccess::ValueOrDefault, info.underlying, span);
                let read = self.convert_implicit(read, operand_ty)?;
                Ok((LiftOperand::Nullable(handle), read))
            }
            None if matches!(node.kind, NodeKind::Constant(_)) => {
                let read = self.convert_implicit(node, operand_ty)?;
                Ok((LiftOperand::Inline, read))
            }
            None => {
                let id = self.fresh_handle();
                let read = Node::read(id, HandleAccess::Raw, node.ty, span);
                let read = self.convert_implicit(read, operand_ty)?;
                let spill = Spill {
                    id,
                    source: Box::new(node),
                };
                Ok((LiftOperand::Spilled(spill), read))
            }
        }
    }

    /// `&` / `|` over `bool?`: a known operand can decide the result even
    /// when the other has no value.
    fn resolve_three_valued(&mut self, op: BinaryOp, left: Node, right: Node, span: Span) -> Result<Node> {
        let Some(info) = self.nullable_info_of(primitives::BOOL) else {
            return Err(self.not_applicable(op, left.ty, right.ty, span));
        };
        let left = self.as_nullable(left, info);
        let right = self.as_nullable(right, info);
        let left = self.bind(left, info);
        let right = self.bind(right, info);
        let lifted = Lifted::Boolean {
            is_and: op == BinaryOp::BitwiseAnd,
            left,
            right,
            result: info,
        };
        Ok(Node::new(NodeKind::Lifted(Box::new(lifted)), info.nullable, span))
    }

    fn as_nullable(&self, node: Node, info: NullableInfo) -> Node {
        if node.ty == info.nullable {
            return node;
        }
        let span = node.span;
        Node::new(
            NodeKind::Wrap {
                operand: Box::new(node),
                info,
            },
            info.nullable,
            span,
        )
    }

    /// One operand is the `null` literal; `other` is the remaining operand.
    fn resolve_null_operand(
        &mut self,
        op: BinaryOp,
        other: Node,
        null_on_left: bool,
        span: Span,
    ) -> Result<Node> {
        let (left_ty, right_ty) = if null_on_left {
            (primitives::NULL, other.ty)
        } else {
            (other.ty, primitives::NULL)
        };

        if let Some(info) = self.registry.nullable_info(other.ty) {
            if op.is_equality() {
                let handle = self.bind(other, info);
                let kind = NodeKind::HasValue {
                    handle,
                    negate: op == BinaryOp::Equal,
                };
                return Ok(Node::new(kind, primitives::BOOL, span));
            }
            if op.is_ordering() {
                let message = format!(
                    "comparing with null of type '{}' always produces 'false'",
                    self.type_name(info.nullable)
                );
                self.warn(DiagnosticCode::NULL_COMPARISON_ALWAYS_FALSE, NULL_COMPARISON_LEVEL, span, message);
                return Ok(with_effect(other, Node::bool(false, span), span));
            }
            if matches!(op, BinaryOp::BitwiseAnd | BinaryOp::BitwiseOr) && info.underlying == primitives::BOOL {
                let null = Node::new(NodeKind::LiftedNull(info), info.nullable, span);
                let (left, right) = if null_on_left { (null, other) } else { (other, null) };
                return self.resolve_three_valued(op, left, right, span);
            }
            return self.null_arithmetic(op, other, info.underlying, left_ty, right_ty, span);
        }

        if !self.registry.is_value_type(other.ty) {
            return Err(self.not_applicable(op, left_ty, right_ty, span));
        }

        if op.is_comparison() {
            if !self.options.fold_value_type_null_comparisons {
                return Err(self.not_applicable(op, left_ty, right_ty, span));
            }
            let value = op == BinaryOp::NotEqual;
            if !self.is_generic {
                let ty = self.type_name(other.ty);
                let (code, message) = if op.is_equality() {
                    (
                        DiagnosticCode::VALUE_TYPE_NULL_COMPARISON,
                        format!(
                            "the result of the expression is always '{value}' since a value of type '{ty}' is never equal to 'null'"
                        ),
                    )
                } else {
                    (
                        DiagnosticCode::NULL_COMPARISON_ALWAYS_FALSE,
                        format!("comparing with null of type '{ty}?' always produces 'false'"),
                    )
                };
                self.warn(code, NULL_COMPARISON_LEVEL, span, message);
            }
            return Ok(with_effect(other, Node::bool(value, span), span));
        }

        let underlying = other.ty;
        self.null_arithmetic(op, other, underlying, left_ty, right_ty, span)
    }

    /// Arithmetic with a `null` operand: evaluate the other side, produce the
    /// empty result.
    fn null_arithmetic(
        &mut self,
        op: BinaryOp,
        other: Node,
        underlying: TypeHash,
        left_ty: TypeHash,
        right_ty: TypeHash,
        span: Span,
    ) -> Result<Node> {
        let count = if op.is_shift() { primitives::INT32 } else { underlying };
        let result = primitive_binary(op, underlying, count)
            .filter(|resolved| resolved.result != primitives::BOOL)
            .and_then(|resolved| self.nullable_info_of(resolved.result));
        let Some(result) = result else {
            return Err(self.not_applicable(op, left_ty, right_ty, span));
        };
        let null = Node::new(NodeKind::LiftedNull(result), result.nullable, span);
        Ok(with_effect(other, null, span))
    }

    pub(super) fn resolve_lifted_unary(
        &mut self,
        op: UnaryOp,
        operand: Node,
        info: NullableInfo,
        span: Span,
    ) -> Result<Node> {
        let resolved = primitive_unary(op, info.underlying)
            .ok_or_else(|| self.unary_not_applicable(&op.to_string(), operand.ty, span))?;
        let Some(result) = self.nullable_info_of(resolved.result) else {
            return Err(self.unary_not_applicable(&op.to_string(), operand.ty, span));
        };

        let handle = self.bind(operand, info);
        let read = Node::read(handle.id, HandleAccess::ValueOrDefault, info.underlying, span);
        let read = self.convert_implicit(read, resolved.operand)?;
        let underlying = match resolved.opcode {
            Some(opcode) => Node::new(
                NodeKind::Unary {
                    opcode: Some(opcode),
                    operand: Box::new(read),
                },
                resolved.result,
                span,
            ),
            None => read,
        };
        let lifted = Lifted::Unary {
            operand: handle,
            underlying,
            result,
        };
        Ok(Node::new(NodeKind::Lifted(Box::new(lifted)), result.nullable, span))
    }

    // ==========================================================================
    // Null coalescing
    // ==========================================================================

    pub(super) fn resolve_coalesce(&mut self, binary: &BinaryExpr<'_>) -> Result<Node> {
        let (left, right) = self.resolve_pair(binary.left, binary.right)?;
        let span = binary.span;
        let left_ty = left.ty;

        if let Some(info) = self.registry.nullable_info(left_ty) {
            let (value_access, value_ty, result_ty) = if self.implicitly_convertible(&right, info.underlying) {
                (HandleAccess::ValueOrDefault, info.underlying, info.underlying)
            } else if self.implicitly_convertible(&right, left_ty) {
                (HandleAccess::Raw, left_ty, left_ty)
            } else if find_implicit(self.registry, info.underlying, right.ty).is_some() {
                (HandleAccess::ValueOrDefault, info.underlying, right.ty)
            } else {
                return Err(self.not_applicable(BinaryOp::NullCoalesce, left_ty, right.ty, span));
            };

            let right = self.convert_implicit(right, result_ty)?;
            let handle = self.bind(left, info);
            let value = Node::read(handle.id, value_access, value_ty, span);
            let value = self.convert_implicit(value, result_ty)?;
            let lifted = Lifted::Coalesce {
                kind: CoalesceKind::Nullable { handle, value },
                right,
            };
            return Ok(Node::new(NodeKind::Lifted(Box::new(lifted)), result_ty, span));
        }

        if left.is_null_literal() {
            return Ok(right);
        }

        if self.registry.is_reference_type(left_ty) {
            let right = self.convert_implicit(right, left_ty)?;
            let lifted = Lifted::Coalesce {
                kind: CoalesceKind::Reference { left },
                right,
            };
            return Ok(Node::new(NodeKind::Lifted(Box::new(lifted)), left_ty, span));
        }

        Err(self.not_applicable(BinaryOp::NullCoalesce, left_ty, right.ty, span))
    }

    // ==========================================================================
    // Increment and decrement
    // ==========================================================================

    /// `++` / `--` on a nullable target: no value stays no value.
    pub(super) fn resolve_lifted_mutator(
        &mut self,
        target: Node,
        info: NullableInfo,
        increment: bool,
        postfix: bool,
        span: Span,
    ) -> Result<Node> {
        let op_name = if increment { "++" } else { "--" };
        if !is_numeric(info.underlying) {
            return Err(self.unary_not_applicable(op_name, target.ty, span));
        }

        let op = if increment { BinaryOp::Add } else { BinaryOp::Sub };
        let Some(resolved) = primitive_binary(op, info.underlying, primitives::INT32) else {
            return Err(self.unary_not_applicable(op_name, target.ty, span));
        };

        let handle = self.fresh_handle();
        let read = Node::read(handle, HandleAccess::ValueOrDefault, info.underlying, span);
        let read = self.convert_implicit(read, resolved.left)?;
        let one = self.convert_implicit(one(span), resolved.right)?;
        let sum = Node::new(
            NodeKind::Binary {
                opcode: resolved.opcode,
                negate: false,
                left: Box::new(read),
                right: Box::new(one),
            },
            resolved.result,
            span,
        );
        let value = self.convert_explicit(sum, info.underlying)?;
        let updated = Node::new(
            NodeKind::Wrap {
                operand: Box::new(value),
                info,
            },
            info.nullable,
            span,
        );

        let ty = target.ty;
        let lifted = Lifted::Mutator {
            target,
            handle,
            info,
            updated,
            postfix,
        };
        Ok(Node::new(NodeKind::Lifted(Box::new(lifted)), ty, span))
    }

    fn nullable_info_of(&self, underlying: TypeHash) -> Option<NullableInfo> {
        self.registry
            .nullable_of(underlying)
            .and_then(|nullable| self.registry.nullable_info(nullable))
    }
}

/// `value`, after evaluating `effect` unless it has no side effects.
fn with_effect(effect: Node, value: Node, span: Span) -> Node {
    if effect.is_pure() {
        return value;
    }
    let ty = value.ty;
    Node::new(
        NodeKind::Comma {
            effect: Box::new(effect),
            value: Box::new(value),
        },
        ty,
        span,
    )
}
