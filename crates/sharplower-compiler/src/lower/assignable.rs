//! The assignable protocol.
//!
//! Every target is reached the same way: push its receivers, then either
//! load through them or store through them.
//!
//! ```text
//! target      receivers     load               store
//! local       -             GetLocal           SetLocal
//! global      -             GetGlobal          SetGlobal
//! field       object        GetField           SetField
//! property    object        CallMethod get     CallMethod set
//! element     array, index  GetElement         SetElement
//! ```
//!
//! A compound assignment prepares the target for load: the receivers are
//! pushed once, the source's `CurrentValue` placeholder duplicates them to read
//! the old value, and the store consumes the originals. Receivers are
//! therefore evaluated exactly once however often the source mentions the
//! target.

use log::trace;
use sharplower_core::{CodegenFault, TypeHash};

use super::{Lowerer, Result};
use crate::bytecode::OpCode;
use crate::emit::TempSlot;
use crate::node::{Node, NodeKind};

/// How a target is read and written once its receivers are on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Access {
    Local(u32),
    Global(TypeHash),
    Field(u16),
    Property {
        getter: Option<TypeHash>,
        setter: Option<TypeHash>,
    },
    Element,
}

impl Access {
    /// Number of receiver values the access consumes.
    pub(super) fn arity(self) -> u8 {
        match self {
            Access::Local(_) | Access::Global(_) => 0,
            Access::Field(_) | Access::Property { .. } => 1,
            Access::Element => 2,
        }
    }
}

/// A target whose receivers are on the stack while its source is emitted.
#[derive(Debug)]
pub(super) struct PreparedTarget {
    access: Access,
    ty: TypeHash,
    /// The caller keeps the assignment's value.
    want_copy: bool,
    consumed: bool,
    /// The pre-assignment value kept by a postfix placeholder.
    stash: Option<TempSlot>,
}

impl<'e, 'pool> Lowerer<'e, 'pool> {
    /// Push the receivers of `target`, returning how to reach it through them.
    pub(super) fn emit_receiver(&mut self, target: &Node) -> Result<Access> {
        match &target.kind {
            NodeKind::Local(slot) => Ok(Access::Local(*slot)),
            NodeKind::Global(global) => Ok(Access::Global(*global)),
            NodeKind::Field { receiver, index } => {
                self.emit_value(receiver)?;
                Ok(Access::Field(*index))
            }
            NodeKind::Property {
                receiver,
                getter,
                setter,
            } => {
                self.emit_value(receiver)?;
                Ok(Access::Property {
                    getter: *getter,
                    setter: *setter,
                })
            }
            NodeKind::Element { array, index } => {
                self.emit_value(array)?;
                self.emit_value(index)?;
                Ok(Access::Element)
            }
            _ => Err(CodegenFault::invalid("target is not assignable")),
        }
    }

    /// Receivers on the stack, value pushed in their place.
    pub(super) fn emit_load(&mut self, access: &Access) -> Result<()> {
        match *access {
            Access::Local(slot) => self.emitter.emit_get_local(slot),
            Access::Global(global) => self.emitter.emit_get_global(global),
            Access::Field(index) => self.emitter.emit_get_field(index),
            Access::Property { getter, .. } => {
                let getter = getter.ok_or_else(|| CodegenFault::invalid("property has no getter"))?;
                self.emitter.emit_call_method(getter, 0);
            }
            Access::Element => self.emitter.emit(OpCode::GetElement),
        }
        Ok(())
    }

    /// Receivers and value on the stack, all consumed.
    pub(super) fn emit_store(&mut self, access: &Access) -> Result<()> {
        match *access {
            Access::Local(slot) => self.emitter.emit_set_local(slot),
            Access::Global(global) => self.emitter.emit_set_global(global),
            Access::Field(index) => self.emitter.emit_set_field(index),
            Access::Property { setter, .. } => {
                let setter = setter.ok_or_else(|| CodegenFault::invalid("property has no setter"))?;
                self.emitter.emit_call_method(setter, 1);
            }
            Access::Element => self.emitter.emit(OpCode::SetElement),
        }
        Ok(())
    }

    /// Copy the receivers so a load leaves the originals for the store.
    pub(super) fn dup_receivers(&mut self, access: &Access) {
        match access.arity() {
            0 => {}
            1 => self.emitter.emit_dup(),
            _ => {
                // Stack: [array, index] -> [array, index, array, index]
                self.emitter.emit_pick(1);
                self.emitter.emit_pick(1);
            }
        }
    }

    /// Assign `source` to `target`.
    ///
    /// With `leave_copy` the assigned value (or, for a postfix placeholder,
    /// the target's old value) stays on the stack. With `prepare_for_load`
    /// the source must read the target exactly once through `CurrentValue`.
    pub(super) fn emit_assign(
        &mut self,
        target: &Node,
        source: &Node,
        leave_copy: bool,
        prepare_for_load: bool,
    ) -> Result<()> {
        let access = self.emit_receiver(target)?;

        if prepare_for_load {
            self.prepared.push(PreparedTarget {
                access,
                ty: target.ty,
                want_copy: leave_copy,
                consumed: false,
                stash: None,
            });
        }

        self.emit_value(source)?;
        // Stack: [receivers.., value]

        let stash = if prepare_for_load {
            let frame = self
                .prepared
                .pop()
                .ok_or_else(|| CodegenFault::invalid("prepared target stack underflow"))?;
            if !frame.consumed {
                return Err(CodegenFault::UnconsumedPreparedTarget);
            }
            frame.stash
        } else {
            None
        };

        if !leave_copy {
            return self.emit_store(&access);
        }

        match stash {
            Some(stash) => {
                self.emit_store(&access)?;
                self.emitter.load_temp(&stash)?;
                self.emitter.release_temp(stash)
            }
            None => self.emit_store_keeping_value(&access, target.ty),
        }
    }

    /// Store the stack top through `access`, leaving a copy of it behind.
    pub(super) fn emit_store_keeping_value(&mut self, access: &Access, ty: TypeHash) -> Result<()> {
        if access.arity() == 0 {
            self.emitter.emit_dup();
            return self.emit_store(access);
        }
        // The copy cannot sit under the receivers, so it waits in a temporary.
        self.emitter.emit_dup();
        let temp = self.emitter.acquire_temp(ty);
        self.emitter.store_temp(&temp)?;
        self.emit_store(access)?;
        self.emitter.load_temp(&temp)?;
        self.emitter.release_temp(temp)
    }

    /// The `CurrentValue` placeholder: load the prepared target through copies
    /// of its receivers.
    pub(super) fn emit_current_value(&mut self, leave_copy: bool) -> Result<()> {
        let (access, ty, want_copy) = match self.prepared.last() {
            Some(frame) if frame.consumed => {
                return Err(CodegenFault::invalid("prepared target read twice"));
            }
            Some(frame) => (frame.access, frame.ty, frame.want_copy),
            None => {
                return Err(CodegenFault::invalid("current value outside compound assignment"));
            }
        };

        self.dup_receivers(&access);
        self.emit_load(&access)?;

        let stash = if leave_copy && want_copy {
            trace!("stashing pre-assignment value");
            self.emitter.emit_dup();
            let temp = self.emitter.acquire_temp(ty);
            self.emitter.store_temp(&temp)?;
            Some(temp)
        } else {
            None
        };

        if let Some(frame) = self.prepared.last_mut() {
            frame.consumed = true;
            frame.stash = stash;
        }
        Ok(())
    }
}
