//! Lifted operator shapes.
//!
//! Every shape materializes its operands first, in lexical order, then
//! branches on has-value tests. Each branch leaves exactly one value on the
//! stack (none for a mutator used as a statement) so all paths meet at the
//! end label with the same stack depth.

use log::debug;
use sharplower_core::CodegenFault;

use super::{Lowerer, Result};
use crate::bytecode::OpCode;
use crate::emit::Label;
use crate::node::{
    CoalesceKind, HandleAccess, HandleId, Lifted, LiftOperand, LiftedBinary, LiftedShape, Node,
    NullableHandle,
};
use crate::registry::NullableInfo;

impl<'e, 'pool> Lowerer<'e, 'pool> {
    pub(super) fn emit_lifted(&mut self, lifted: &Lifted, want_value: bool) -> Result<()> {
        match lifted {
            Lifted::Unary {
                operand,
                underlying,
                result,
            }
            | Lifted::Conversion {
                operand,
                underlying,
                result,
            } => self.emit_lifted_unary(operand, underlying, *result),
            Lifted::Binary(binary) => self.emit_lifted_binary(binary),
            Lifted::Boolean {
                is_and,
                left,
                right,
                result,
            } => self.emit_three_valued(*is_and, left, right, *result),
            Lifted::Coalesce { kind, right } => self.emit_coalesce(kind, right),
            Lifted::Mutator {
                target,
                handle,
                info,
                updated,
                postfix,
            } => self.emit_lifted_mutator(target, *handle, *info, updated, *postfix, want_value),
        }
    }

    fn branch(&mut self, op: OpCode, label: Label) -> Result<()> {
        self.emitter.emit_branch(op, label)
    }

    fn has_value(&mut self, handle: &NullableHandle) -> Result<()> {
        self.read_handle(handle.id, HandleAccess::HasValue)
    }

    fn value_or_default(&mut self, handle: &NullableHandle) -> Result<()> {
        self.read_handle(handle.id, HandleAccess::ValueOrDefault)
    }

    /// Wrap the stack top into `info`'s nullable type.
    fn wrap(&mut self, info: NullableInfo) {
        self.emitter.emit_new(info.constructor, 1);
    }

    // ==========================================================================
    // Unary and conversion
    // ==========================================================================

    fn emit_lifted_unary(
        &mut self,
        operand: &NullableHandle,
        underlying: &Node,
        result: NullableInfo,
    ) -> Result<()> {
        let empty = self.emitter.define_label();
        let end = self.emitter.define_label();

        self.materialize(operand)?;
        self.has_value(operand)?;
        self.branch(OpCode::JumpIfFalse, empty)?;
        self.emit_value(underlying)?;
        self.wrap(result);
        self.branch(OpCode::Jump, end)?;

        self.emitter.mark_label(empty)?;
        self.emit_default_value(result.nullable)?;

        self.emitter.mark_label(end)?;
        self.close_handle(operand.id)
    }

    // ==========================================================================
    // Binary
    // ==========================================================================

    fn emit_lifted_binary(&mut self, binary: &LiftedBinary) -> Result<()> {
        for operand in [&binary.left, &binary.right] {
            match operand {
                LiftOperand::Nullable(handle) => self.materialize(handle)?,
                LiftOperand::Spilled(spill) => self.spill(spill)?,
                LiftOperand::Inline => {}
            }
        }

        let left = binary.left.handle();
        let right = binary.right.handle();
        // One has-value test covers both sides when they read the same thing.
        let same = match (left, right) {
            (Some(l), Some(r)) => l.source.is_pure() && l.source.structurally_eq(&r.source),
            _ => false,
        };
        let right = if same { None } else { right };
        debug!("lifted {} (shared check: {same})", binary.op);

        match binary.shape {
            LiftedShape::Arithmetic { result } => {
                self.emit_guarded(left, right, &binary.underlying, Some(result))?
            }
            LiftedShape::Comparison => self.emit_guarded(left, right, &binary.underlying, None)?,
            LiftedShape::Equality { negate } => {
                self.emit_lifted_equality(left, right, same, &binary.underlying, negate)?
            }
        }

        for operand in [&binary.right, &binary.left] {
            match operand {
                LiftOperand::Nullable(handle) => self.close_handle(handle.id)?,
                LiftOperand::Spilled(spill) => self.close_handle(spill.id)?,
                LiftOperand::Inline => {}
            }
        }
        Ok(())
    }

    /// `l.HasValue && r.HasValue ? underlying : empty`, where `empty` is the
    /// empty `result` for arithmetic and `false` for ordering.
    fn emit_guarded(
        &mut self,
        left: Option<&NullableHandle>,
        right: Option<&NullableHandle>,
        underlying: &Node,
        result: Option<NullableInfo>,
    ) -> Result<()> {
        let no_value = self.emitter.define_label();
        let end = self.emitter.define_label();

        for handle in [left, right].into_iter().flatten() {
            self.has_value(handle)?;
            self.branch(OpCode::JumpIfFalse, no_value)?;
        }
        self.emit_value(underlying)?;
        if let Some(info) = result {
            self.wrap(info);
        }
        self.branch(OpCode::Jump, end)?;

        self.emitter.mark_label(no_value)?;
        match result {
            Some(info) => self.emit_default_value(info.nullable)?,
            None => self.emitter.emit_bool(false),
        }
        self.emitter.mark_label(end)
    }

    /// Two empty operands are equal; one empty operand is unequal.
    fn emit_lifted_equality(
        &mut self,
        left: Option<&NullableHandle>,
        right: Option<&NullableHandle>,
        same: bool,
        underlying: &Node,
        negate: bool,
    ) -> Result<()> {
        let end = self.emitter.define_label();

        match (left, right) {
            (Some(left), Some(right)) => {
                let left_empty = self.emitter.define_label();
                let differ = self.emitter.define_label();

                self.has_value(left)?;
                self.branch(OpCode::JumpIfFalse, left_empty)?;
                self.has_value(right)?;
                self.branch(OpCode::JumpIfFalse, differ)?;
                self.emit_value(underlying)?;
                self.branch(OpCode::Jump, end)?;

                // Left empty: equal exactly when right is empty too.
                self.emitter.mark_label(left_empty)?;
                self.has_value(right)?;
                self.branch(OpCode::JumpIfTrue, differ)?;
                self.emitter.emit_bool(!negate);
                self.branch(OpCode::Jump, end)?;

                self.emitter.mark_label(differ)?;
                self.emitter.emit_bool(negate);
            }
            (Some(handle), None) | (None, Some(handle)) => {
                let empty = self.emitter.define_label();

                self.has_value(handle)?;
                self.branch(OpCode::JumpIfFalse, empty)?;
                self.emit_value(underlying)?;
                self.branch(OpCode::Jump, end)?;

                self.emitter.mark_label(empty)?;
                // An empty operand equals itself; against a plain value it differs.
                self.emitter.emit_bool(if same { !negate } else { negate });
            }
            (None, None) => self.emit_value(underlying)?,
        }

        self.emitter.mark_label(end)
    }

    // ==========================================================================
    // Three-valued `&` / `|`
    // ==========================================================================

    fn emit_three_valued(
        &mut self,
        is_and: bool,
        left: &NullableHandle,
        right: &NullableHandle,
        result: NullableInfo,
    ) -> Result<()> {
        self.materialize(left)?;
        self.materialize(right)?;

        let yes = self.emitter.define_label();
        let no = self.emitter.define_label();
        let empty = self.emitter.define_label();
        let end = self.emitter.define_label();

        if is_and {
            let left_not_true = self.emitter.define_label();

            // Left true: the result is right.
            self.value_or_default(left)?;
            self.branch(OpCode::JumpIfFalse, left_not_true)?;
            self.value_or_default(right)?;
            self.branch(OpCode::JumpIfTrue, yes)?;
            self.has_value(right)?;
            self.branch(OpCode::JumpIfTrue, no)?;
            self.branch(OpCode::Jump, empty)?;

            // Left false decides; left empty defers to a false right.
            self.emitter.mark_label(left_not_true)?;
            self.has_value(left)?;
            self.branch(OpCode::JumpIfTrue, no)?;
            self.value_or_default(right)?;
            self.branch(OpCode::JumpIfTrue, empty)?;
            self.has_value(right)?;
            self.branch(OpCode::JumpIfTrue, no)?;
        } else {
            let left_empty = self.emitter.define_label();

            // Left true decides.
            self.value_or_default(left)?;
            self.branch(OpCode::JumpIfTrue, yes)?;
            self.has_value(left)?;
            self.branch(OpCode::JumpIfFalse, left_empty)?;

            // Left false: the result is right.
            self.value_or_default(right)?;
            self.branch(OpCode::JumpIfTrue, yes)?;
            self.has_value(right)?;
            self.branch(OpCode::JumpIfTrue, no)?;
            self.branch(OpCode::Jump, empty)?;

            // Left empty: only a true right decides.
            self.emitter.mark_label(left_empty)?;
            self.value_or_default(right)?;
            self.branch(OpCode::JumpIfTrue, yes)?;
        }

        self.emitter.mark_label(empty)?;
        self.emit_default_value(result.nullable)?;
        self.branch(OpCode::Jump, end)?;

        self.emitter.mark_label(yes)?;
        self.emitter.emit_bool(true);
        self.wrap(result);
        self.branch(OpCode::Jump, end)?;

        self.emitter.mark_label(no)?;
        self.emitter.emit_bool(false);
        self.wrap(result);

        self.emitter.mark_label(end)?;
        self.close_handle(right.id)?;
        self.close_handle(left.id)
    }

    // ==========================================================================
    // Null coalescing
    // ==========================================================================

    fn emit_coalesce(&mut self, kind: &CoalesceKind, right: &Node) -> Result<()> {
        let end = self.emitter.define_label();
        match kind {
            CoalesceKind::Nullable { handle, value } => {
                let fallback = self.emitter.define_label();
                self.materialize(handle)?;
                self.has_value(handle)?;
                self.branch(OpCode::JumpIfFalse, fallback)?;
                self.emit_value(value)?;
                self.branch(OpCode::Jump, end)?;

                self.emitter.mark_label(fallback)?;
                self.emit_value(right)?;
                self.emitter.mark_label(end)?;
                self.close_handle(handle.id)
            }
            CoalesceKind::Reference { left } => {
                self.emit_value(left)?;
                self.emitter.emit_dup();
                self.branch(OpCode::JumpIfNotNull, end)?;
                // Stack: [null]
                self.emitter.emit_pop();
                self.emit_value(right)?;
                self.emitter.mark_label(end)
            }
        }
    }

    // ==========================================================================
    // Increment and decrement
    // ==========================================================================

    fn emit_lifted_mutator(
        &mut self,
        target: &Node,
        handle: HandleId,
        info: NullableInfo,
        updated: &Node,
        postfix: bool,
        want_value: bool,
    ) -> Result<()> {
        if target.ty != info.nullable {
            return Err(CodegenFault::invalid("mutator target is not the handle's nullable type"));
        }
        let empty = self.emitter.define_label();
        let end = self.emitter.define_label();

        let access = self.emit_receiver(target)?;
        self.dup_receivers(&access);
        self.emit_load(&access)?;
        let temp = self.emitter.acquire_temp(info.nullable);
        self.emitter.store_temp(&temp)?;
        self.adopt(handle, temp, info)?;
        // Stack: [receivers..]

        self.read_handle(handle, HandleAccess::HasValue)?;
        self.branch(OpCode::JumpIfFalse, empty)?;
        self.emit_value(updated)?;
        match (want_value, postfix) {
            (false, _) => self.emit_store(&access)?,
            (true, true) => {
                self.emit_store(&access)?;
                self.read_handle(handle, HandleAccess::Raw)?;
            }
            (true, false) => self.emit_store_keeping_value(&access, info.nullable)?,
        }
        self.branch(OpCode::Jump, end)?;

        // No value: nothing is stored.
        self.emitter.mark_label(empty)?;
        for _ in 0..access.arity() {
            self.emitter.emit_pop();
        }
        if want_value {
            self.emit_default_value(info.nullable)?;
        }

        self.emitter.mark_label(end)?;
        debug!("lifted mutator on {}", self.registry.type_name(info.nullable));
        self.close_handle(handle)
    }
}
