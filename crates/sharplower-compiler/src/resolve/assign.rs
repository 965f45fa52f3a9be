//! Assignment resolution.
//!
//! Simple assignment converts the source to the target type, except when a
//! value-type local is initialized with `new`: that constructs in place.
//!
//! Compound assignment `t op= s` is resolved as `t = (T)(t op s)` with the
//! target evaluated once. Event targets divert to the add/remove accessors
//! first, and `++`/`--` reuse the compound path with a constant `1`.

use log::trace;
use sharplower_core::{CompilationError, Span, primitives};

use super::{ResolveFlags, Resolver, Result};
use crate::ast::{AssignExpr, BinaryOp, Expr, MemberExpr};
use crate::conversion::{find_conversion, is_integral, is_numeric};
use crate::node::{Assignment, ConstValue, Node, NodeKind};

impl<'a> Resolver<'a> {
    pub(super) fn resolve_assign(&mut self, assign: &AssignExpr<'_>) -> Result<Node> {
        match assign.op.binary_op() {
            None => self.resolve_simple_assign(assign),
            Some(op) => self.resolve_compound_assign(op, assign),
        }
    }

    fn resolve_simple_assign(&mut self, assign: &AssignExpr<'_>) -> Result<Node> {
        // The source is resolved first; the target must not see its effects.
        let source = self.resolve_expr(assign.value);
        let target = self.resolve_target(assign.target, ResolveFlags::ASSIGN_TARGET);
        let (source, target) = self.join(source, target)?;
        self.assign_to(target, source, assign.span)
    }

    /// Build `target = source` for an already resolved target.
    pub(super) fn assign_to(&mut self, target: Node, source: Node, span: Span) -> Result<Node> {
        let ty = target.ty;

        if let Some(slot) = self.direct_construction_slot(&target, &source) {
            if let NodeKind::New { constructor, args } = source.kind {
                trace!("constructing into local {slot}");
                return Ok(Node::new(
                    NodeKind::ConstructInto {
                        slot,
                        constructor,
                        args,
                    },
                    ty,
                    span,
                ));
            }
            return Err(CompilationError::NotAssignable { span });
        }

        let source = self.convert_implicit(source, ty)?;
        Ok(Node::new(
            NodeKind::Assign(Box::new(Assignment {
                target,
                source,
                compound: false,
            })),
            ty,
            span,
        ))
    }

    /// `local = new T(...)` for a value type `T` writes straight into the local.
    fn direct_construction_slot(&self, target: &Node, source: &Node) -> Option<u32> {
        match (&target.kind, &source.kind) {
            (NodeKind::Local(slot), NodeKind::New { .. })
                if source.ty == target.ty && self.registry.is_value_type(target.ty) =>
            {
                Some(*slot)
            }
            _ => None,
        }
    }

    /// Resolve an expression that will be written to.
    pub(super) fn resolve_target(&mut self, expr: &Expr<'_>, flags: ResolveFlags) -> Result<Node> {
        let node = match expr {
            Expr::Ident(ident) => {
                if let Some(local) = self.scope.lookup(ident.name) {
                    Node::new(NodeKind::Local(local.slot), local.ty, ident.span)
                } else if let Some(global) = self.registry.global(ident.name) {
                    Node::new(NodeKind::Global(global.hash), global.ty, ident.span)
                } else if self.registry.function(ident.name).is_some() {
                    return Err(CompilationError::MethodGroupAssignment {
                        name: ident.name.to_string(),
                        span: ident.span,
                    });
                } else {
                    return Err(CompilationError::UnknownIdentifier {
                        name: ident.name.to_string(),
                        span: ident.span,
                    });
                }
            }
            Expr::Member(member) => {
                let receiver = self.resolve_expr(member.object)?;
                self.resolve_member_on(receiver, member, flags)?
            }
            Expr::Index(index) => self.resolve_index(index)?,
            other => {
                return Err(CompilationError::NotAssignable { span: other.span() });
            }
        };

        match node.kind {
            NodeKind::Local(_)
            | NodeKind::Global(_)
            | NodeKind::Field { .. }
            | NodeKind::Property { .. }
            | NodeKind::Element { .. } => Ok(node),
            _ => Err(CompilationError::NotAssignable { span: expr.span() }),
        }
    }

    // ==========================================================================
    // Compound assignment
    // ==========================================================================

    fn resolve_compound_assign(&mut self, op: BinaryOp, assign: &AssignExpr<'_>) -> Result<Node> {
        let target = match assign.target {
            Expr::Member(member) => {
                let receiver = self.resolve_expr(member.object)?;
                if self.registry.event(receiver.ty, member.member).is_some() {
                    return self.resolve_event_accessor(op, receiver, member, assign);
                }
                let source = self.resolve_expr(assign.value);
                let flags = ResolveFlags::ASSIGN_TARGET | ResolveFlags::COMPOUND;
                let target = self.resolve_member_on(receiver, member, flags);
                let (source, target) = self.join(source, target)?;
                return self.compound_assign(op, target, source, assign.span, false);
            }
            target => target,
        };

        let source = self.resolve_expr(assign.value);
        let target = self.resolve_target(target, ResolveFlags::ASSIGN_TARGET | ResolveFlags::COMPOUND);
        let (source, target) = self.join(source, target)?;
        self.compound_assign(op, target, source, assign.span, false)
    }

    /// `e += h` / `e -= h` on an event calls its add/remove accessor.
    fn resolve_event_accessor(
        &mut self,
        op: BinaryOp,
        receiver: Node,
        member: &MemberExpr<'_>,
        assign: &AssignExpr<'_>,
    ) -> Result<Node> {
        let Some(event) = self.registry.event(receiver.ty, member.member) else {
            return Err(CompilationError::EventMisuse {
                name: member.member.to_string(),
                span: member.span,
            });
        };
        let accessor = match op {
            BinaryOp::Add => event.add,
            BinaryOp::Sub => event.remove,
            _ => {
                return Err(CompilationError::EventMisuse {
                    name: member.member.to_string(),
                    span: member.span,
                });
            }
        };
        let handler_ty = event.handler;
        let handler = self.resolve_expr(assign.value)?;
        let handler = self.convert_implicit(handler, handler_ty)?;
        Ok(Node::new(
            NodeKind::EventAccessor {
                receiver: Box::new(receiver),
                accessor,
                handler: Box::new(handler),
            },
            primitives::VOID,
            assign.span,
        ))
    }

    /// Build `target = (T)(target op source)` over a resolved target.
    ///
    /// The result is converted back implicitly when possible. Otherwise the
    /// explicit conversion is inserted, provided the source alone converts
    /// implicitly to the target (or its underlying type); shifts skip that
    /// check since their count never flows into the result.
    pub(super) fn compound_assign(
        &mut self,
        op: BinaryOp,
        target: Node,
        source: Node,
        span: Span,
        leave_copy: bool,
    ) -> Result<Node> {
        let ty = target.ty;
        let check_ty = self
            .registry
            .nullable_info(ty)
            .map_or(ty, |info| info.underlying);
        let source_fits = self.implicitly_convertible(&source, check_ty);
        let source_ty = source.ty;

        let current = Node::new(NodeKind::CurrentValue { leave_copy }, ty, target.span);
        let result = self.resolve_binary_nodes(op, current, source, span)?;

        let source = if result.ty == ty || self.implicitly_convertible(&result, ty) {
            self.convert_implicit(result, ty)?
        } else {
            if find_conversion(self.registry, result.ty, ty).is_none() {
                return Err(CompilationError::CannotConvert {
                    from: self.type_name(result.ty),
                    to: self.type_name(ty),
                    span,
                });
            }
            let shift = op.is_shift() && is_integral(check_ty);
            if !shift && !source_fits {
                return Err(CompilationError::CannotImplicitlyConvert {
                    from: self.type_name(source_ty),
                    to: self.type_name(ty),
                    span,
                });
            }
            self.convert_explicit(result, ty)?
        };

        Ok(Node::new(
            NodeKind::Assign(Box::new(Assignment {
                target,
                source,
                compound: true,
            })),
            ty,
            span,
        ))
    }

    // ==========================================================================
    // Increment and decrement
    // ==========================================================================

    pub(super) fn resolve_mutator(
        &mut self,
        operand: &Expr<'_>,
        increment: bool,
        postfix: bool,
        span: Span,
    ) -> Result<Node> {
        let flags = ResolveFlags::ASSIGN_TARGET | ResolveFlags::COMPOUND;
        let target = self.resolve_target(operand, flags)?;
        let op_name = if increment { "++" } else { "--" };

        if let Some(info) = self.registry.nullable_info(target.ty) {
            return self.resolve_lifted_mutator(target, info, increment, postfix, span);
        }
        if !is_numeric(target.ty) {
            return Err(self.unary_not_applicable(op_name, target.ty, span));
        }

        let one = one(span);
        let op = if increment { BinaryOp::Add } else { BinaryOp::Sub };
        self.compound_assign(op, target, one, span, postfix)
    }
}

pub(super) fn one(span: Span) -> Node {
    Node::constant(ConstValue::Int(1), primitives::INT32, span)
}

