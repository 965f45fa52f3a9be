//! Nullable handles.
//!
//! A handle's source is evaluated once, when the owning node materializes it,
//! and parked in a temporary. Reads go through the temporary's address for the
//! wrapper's accessors, load it whole for `Raw`, or push the bare address for
//! `Address`. When the owner finishes it closes the handle, releasing the
//! temporary; a read after that is a [`CodegenFault::StaleHandle`].

use log::trace;
use sharplower_core::CodegenFault;

use super::{Lowerer, Result};
use crate::emit::TempSlot;
use crate::node::{HandleAccess, HandleId, Node, NullableHandle, Spill};
use crate::registry::NullableInfo;

#[derive(Debug)]
pub(super) struct HandleState {
    slot: Option<TempSlot>,
    /// `None` for spilled plain operands.
    info: Option<NullableInfo>,
}

impl<'e, 'pool> Lowerer<'e, 'pool> {
    /// Evaluate the handle's source into a fresh temporary.
    pub(super) fn materialize(&mut self, handle: &NullableHandle) -> Result<()> {
        self.bind_source(handle.id, &handle.source, Some(handle.info))
    }

    /// Evaluate a spilled plain operand into a fresh temporary.
    pub(super) fn spill(&mut self, spill: &Spill) -> Result<()> {
        self.bind_source(spill.id, &spill.source, None)
    }

    fn bind_source(
        &mut self,
        id: HandleId,
        source: &Node,
        info: Option<NullableInfo>,
    ) -> Result<()> {
        if self.handles.contains_key(&id) {
            return Err(CodegenFault::invalid(format!("handle {} bound twice", id.0)));
        }
        self.emit_value(source)?;
        // Stack: [value]
        let temp = self.emitter.acquire_temp(source.ty);
        self.emitter.store_temp(&temp)?;
        trace!("handle {} -> temporary {}", id.0, temp.slot());
        self.handles.insert(
            id,
            HandleState {
                slot: Some(temp),
                info,
            },
        );
        Ok(())
    }

    /// Bind a handle to a value already stored in `temp`.
    pub(super) fn adopt(&mut self, id: HandleId, temp: TempSlot, info: NullableInfo) -> Result<()> {
        if self.handles.contains_key(&id) {
            return Err(CodegenFault::invalid(format!("handle {} bound twice", id.0)));
        }
        self.handles.insert(
            id,
            HandleState {
                slot: Some(temp),
                info: Some(info),
            },
        );
        Ok(())
    }

    pub(super) fn read_handle(&mut self, id: HandleId, access: HandleAccess) -> Result<()> {
        let state = self
            .handles
            .get(&id)
            .ok_or(CodegenFault::UnmaterializedHandle { handle: id.0 })?;
        let temp = state
            .slot
            .as_ref()
            .ok_or(CodegenFault::StaleHandle { handle: id.0 })?;

        let method = match (access, state.info) {
            (HandleAccess::Raw, _) => {
                return self.emitter.load_temp(temp);
            }
            (HandleAccess::Address, _) => {
                return self.emitter.temp_address(temp);
            }
            (HandleAccess::HasValue, Some(info)) => info.has_value,
            (HandleAccess::Value, Some(info)) => info.value,
            (HandleAccess::ValueOrDefault, Some(info)) => info.get_value_or_default,
            (_, None) => {
                return Err(CodegenFault::invalid(format!(
                    "{access:?} read of spilled operand {}",
                    id.0
                )));
            }
        };
        self.emitter.temp_address(temp)?;
        self.emitter.emit_call_method(method, 0);
        Ok(())
    }

    /// Release the handle's temporary. Later reads are stale.
    pub(super) fn close_handle(&mut self, id: HandleId) -> Result<()> {
        let state = self
            .handles
            .get_mut(&id)
            .ok_or(CodegenFault::UnmaterializedHandle { handle: id.0 })?;
        match state.slot.take() {
            Some(temp) => self.emitter.release_temp(temp),
            None => Err(CodegenFault::StaleHandle { handle: id.0 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{ConstantPool, OpCode};
    use crate::emit::BytecodeEmitter;
    use crate::node::NodeKind;
    use crate::registry::TypeRegistry;
    use sharplower_core::{Span, primitives};

    fn int_handle(registry: &TypeRegistry, id: u32) -> NullableHandle {
        let nullable = registry.nullable_of(primitives::INT32).unwrap();
        let info = registry.nullable_info(nullable).unwrap();
        NullableHandle {
            id: HandleId(id),
            source: Box::new(Node::new(NodeKind::Local(0), nullable, Span::default())),
            info,
        }
    }

    #[test]
    fn source_is_evaluated_once() {
        let registry = TypeRegistry::with_primitives();
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);
        emitter.declare_local(registry.nullable_of(primitives::INT32).unwrap());
        let mut lowerer = Lowerer::new(&mut emitter, &registry);

        let handle = int_handle(&registry, 0);
        lowerer.materialize(&handle).unwrap();
        lowerer.read_handle(handle.id, HandleAccess::HasValue).unwrap();
        lowerer.emitter().emit_pop();
        lowerer.read_handle(handle.id, HandleAccess::ValueOrDefault).unwrap();
        lowerer.emitter().emit_pop();
        lowerer.close_handle(handle.id).unwrap();

        let body = emitter.finish().unwrap();
        assert_eq!(body.chunk.count_op(OpCode::GetLocal), 1);
        assert_eq!(body.chunk.count_op(OpCode::CallMethod), 2);
    }

    #[test]
    fn address_read_reuses_the_temporary() {
        let registry = TypeRegistry::with_primitives();
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);
        emitter.declare_local(registry.nullable_of(primitives::INT32).unwrap());
        let mut lowerer = Lowerer::new(&mut emitter, &registry);

        let handle = int_handle(&registry, 1);
        lowerer.materialize(&handle).unwrap();
        lowerer.read_handle(handle.id, HandleAccess::Address).unwrap();
        lowerer.emitter().emit_pop();
        lowerer.read_handle(handle.id, HandleAccess::Value).unwrap();
        lowerer.emitter().emit_pop();
        lowerer.close_handle(handle.id).unwrap();
        assert_eq!(
            lowerer.read_handle(handle.id, HandleAccess::Address),
            Err(CodegenFault::StaleHandle { handle: 1 })
        );

        let body = emitter.finish().unwrap();
        body.chunk.assert_opcodes(&[
            OpCode::GetLocal,
            OpCode::SetLocal,
            OpCode::LocalAddress,
            OpCode::Pop,
            OpCode::LocalAddress,
            OpCode::CallMethod,
            OpCode::Pop,
        ]);
    }

    #[test]
    fn read_after_close_is_stale() {
        let registry = TypeRegistry::with_primitives();
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);
        emitter.declare_local(registry.nullable_of(primitives::INT32).unwrap());
        let mut lowerer = Lowerer::new(&mut emitter, &registry);

        let handle = int_handle(&registry, 3);
        lowerer.materialize(&handle).unwrap();
        lowerer.close_handle(handle.id).unwrap();
        assert_eq!(
            lowerer.read_handle(handle.id, HandleAccess::Value),
            Err(CodegenFault::StaleHandle { handle: 3 })
        );
    }

    #[test]
    fn read_before_materialize_fails() {
        let registry = TypeRegistry::with_primitives();
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);
        let mut lowerer = Lowerer::new(&mut emitter, &registry);
        assert_eq!(
            lowerer.read_handle(HandleId(9), HandleAccess::Raw),
            Err(CodegenFault::UnmaterializedHandle { handle: 9 })
        );
    }
}
