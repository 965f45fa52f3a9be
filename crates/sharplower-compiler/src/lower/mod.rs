//! Lowering: resolved [`Node`] trees to stack bytecode.
//!
//! One [`Lowerer`] per member body. It walks each tree exactly once, depth
//! first, driving a [`BytecodeEmitter`]. Every failure here is a
//! [`CodegenFault`]: user errors were all reported during resolution, so
//! anything that goes wrong now is a defect in the compiler itself.
//!
//! ## Submodules
//!
//! - `assignable`: the load/store protocol for assignment targets
//! - `nullable`: handle materialization and the wrapper primitives
//! - `lifted`: the lifted operator shapes

mod assignable;
mod lifted;
mod nullable;

use log::trace;
use rustc_hash::FxHashMap;
use sharplower_core::{CodegenFault, TypeHash, primitives};

use crate::bytecode::OpCode;
use crate::emit::BytecodeEmitter;
use crate::node::{ConstValue, HandleAccess, HandleId, Lifted, Node, NodeKind, Statement};
use crate::registry::TypeRegistry;

use assignable::PreparedTarget;
use nullable::HandleState;

type Result<T> = std::result::Result<T, CodegenFault>;

pub struct Lowerer<'e, 'pool> {
    emitter: &'e mut BytecodeEmitter<'pool>,
    registry: &'e TypeRegistry,
    /// Handles bound by nodes currently being emitted, plus closed ones so a
    /// late read is reported as stale rather than unknown.
    handles: FxHashMap<HandleId, HandleState>,
    /// Compound assignment targets whose receivers are on the stack.
    prepared: Vec<PreparedTarget>,
}

impl<'e, 'pool> Lowerer<'e, 'pool> {
    pub fn new(emitter: &'e mut BytecodeEmitter<'pool>, registry: &'e TypeRegistry) -> Self {
        Self {
            emitter,
            registry,
            handles: FxHashMap::default(),
            prepared: Vec::new(),
        }
    }

    pub fn emitter(&mut self) -> &mut BytecodeEmitter<'pool> {
        self.emitter
    }

    // ==========================================================================
    // Statements
    // ==========================================================================

    pub fn lower_statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Expr(node) => self.emit_discarded(node),
            Statement::Return(Some(value), _) => {
                self.emit_value(value)?;
                self.emitter.emit_return();
                Ok(())
            }
            Statement::Return(None, _) => {
                self.emitter.emit_return_void();
                Ok(())
            }
        }
    }

    /// Emit `node` for its side effects only; nothing is left on the stack.
    pub fn emit_discarded(&mut self, node: &Node) -> Result<()> {
        match &node.kind {
            NodeKind::Assign(assign) => {
                self.emit_assign(&assign.target, &assign.source, false, assign.compound)
            }
            NodeKind::ConstructInto {
                slot,
                constructor,
                args,
            } => self.emit_construct_into(*slot, *constructor, args, node.ty),
            NodeKind::Lifted(lifted) if matches!(**lifted, Lifted::Mutator { .. }) => {
                self.emit_lifted(lifted, false)
            }
            _ => {
                self.emit_value(node)?;
                if node.ty != primitives::VOID {
                    self.emitter.emit_pop();
                }
                Ok(())
            }
        }
    }

    // ==========================================================================
    // Values
    // ==========================================================================

    /// Push the value of `node`.
    pub fn emit_value(&mut self, node: &Node) -> Result<()> {
        match &node.kind {
            NodeKind::Constant(value) => {
                self.emit_constant(value);
                Ok(())
            }
            NodeKind::Null => {
                self.emitter.emit_null();
                Ok(())
            }
            NodeKind::Local(slot) => {
                self.emitter.emit_get_local(*slot);
                Ok(())
            }
            NodeKind::LocalAddress(slot) => {
                self.emitter.emit_local_address(*slot);
                Ok(())
            }
            NodeKind::Global(_)
            | NodeKind::Field { .. }
            | NodeKind::Property { .. }
            | NodeKind::Element { .. } => {
                let access = self.emit_receiver(node)?;
                self.emit_load(&access)
            }
            NodeKind::Call { function, args } => {
                let argc = self.emit_args(args)?;
                self.emitter.emit_call(*function, argc);
                Ok(())
            }
            NodeKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                self.emit_value(receiver)?;
                let argc = self.emit_args(args)?;
                self.emitter.emit_call_method(*method, argc);
                Ok(())
            }
            NodeKind::New {
                constructor: Some(constructor),
                args,
            } => {
                let argc = self.emit_args(args)?;
                self.emitter.emit_new(*constructor, argc);
                Ok(())
            }
            NodeKind::New {
                constructor: None, ..
            } => self.emit_default_value(node.ty),
            NodeKind::ConstructInto {
                slot,
                constructor,
                args,
            } => {
                self.emit_construct_into(*slot, *constructor, args, node.ty)?;
                self.emitter.emit_get_local(*slot);
                Ok(())
            }
            NodeKind::Binary {
                opcode,
                negate,
                left,
                right,
            } => {
                self.emit_value(left)?;
                self.emit_value(right)?;
                self.emitter.emit(*opcode);
                if *negate {
                    self.emitter.emit(OpCode::Not);
                }
                Ok(())
            }
            NodeKind::ShortCircuit {
                is_and,
                left,
                right,
            } => {
                let end = self.emitter.define_label();
                self.emit_value(left)?;
                self.emitter.emit_dup();
                let skip = if *is_and {
                    OpCode::JumpIfFalse
                } else {
                    OpCode::JumpIfTrue
                };
                self.emitter.emit_branch(skip, end)?;
                self.emitter.emit_pop();
                self.emit_value(right)?;
                self.emitter.mark_label(end)
            }
            NodeKind::Unary { opcode, operand } => {
                self.emit_value(operand)?;
                if let Some(opcode) = opcode {
                    self.emitter.emit(*opcode);
                }
                Ok(())
            }
            NodeKind::Convert { ops, operand } => {
                self.emit_value(operand)?;
                for op in ops {
                    self.emitter.emit(*op);
                }
                Ok(())
            }
            NodeKind::UserConversion { function, operand } => {
                self.emit_value(operand)?;
                self.emitter.emit_call(*function, 1);
                Ok(())
            }
            NodeKind::Comma { effect, value } => {
                self.emit_discarded(effect)?;
                self.emit_value(value)
            }
            NodeKind::Assign(assign) => {
                self.emit_assign(&assign.target, &assign.source, true, assign.compound)
            }
            NodeKind::CurrentValue { leave_copy } => self.emit_current_value(*leave_copy),
            NodeKind::EventAccessor {
                receiver,
                accessor,
                handler,
            } => {
                self.emit_value(receiver)?;
                self.emit_value(handler)?;
                self.emitter.emit_call_method(*accessor, 1);
                Ok(())
            }
            NodeKind::Wrap { operand, info } => {
                self.emit_value(operand)?;
                self.emitter.emit_new(info.constructor, 1);
                Ok(())
            }
            NodeKind::LiftedNull(info) => self.emit_default_value(info.nullable),
            NodeKind::HasValue { handle, negate } => {
                self.materialize(handle)?;
                self.read_handle(handle.id, HandleAccess::HasValue)?;
                if *negate {
                    self.emitter.emit(OpCode::Not);
                }
                self.close_handle(handle.id)
            }
            NodeKind::UnwrapValue(handle) => {
                self.materialize(handle)?;
                self.read_handle(handle.id, HandleAccess::Value)?;
                self.close_handle(handle.id)
            }
            NodeKind::Read { handle, access } => self.read_handle(*handle, *access),
            NodeKind::Lifted(lifted) => self.emit_lifted(lifted, true),
        }
    }

    fn emit_constant(&mut self, value: &ConstValue) {
        match value {
            ConstValue::Bool(value) => self.emitter.emit_bool(*value),
            ConstValue::Int(value) => self.emitter.emit_int(*value),
            ConstValue::Float(value) => self.emitter.emit_f32(*value),
            ConstValue::Double(value) => self.emitter.emit_f64(*value),
            ConstValue::Str(value) => self.emitter.emit_string(value),
        }
    }

    fn emit_args(&mut self, args: &[Node]) -> Result<u8> {
        for arg in args {
            self.emit_value(arg)?;
        }
        u8::try_from(args.len())
            .map_err(|_| CodegenFault::invalid(format!("{} arguments exceed the call limit", args.len())))
    }

    /// Zero-initialized value of a value type, staged through a temporary.
    fn emit_default_value(&mut self, ty: TypeHash) -> Result<()> {
        let temp = self.emitter.acquire_temp(ty);
        self.emitter.init_temp(&temp)?;
        self.emitter.load_temp(&temp)?;
        self.emitter.release_temp(temp)
    }

    /// Construct a value type directly in a local's storage.
    fn emit_construct_into(
        &mut self,
        slot: u32,
        constructor: Option<TypeHash>,
        args: &[Node],
        ty: TypeHash,
    ) -> Result<()> {
        trace!("construct into local {slot}");
        self.emitter.emit_local_address(slot);
        match constructor {
            Some(constructor) => {
                let argc = self.emit_args(args)?;
                self.emitter.emit_call_constructor(constructor, argc);
            }
            None => self.emitter.emit_init_object(ty),
        }
        Ok(())
    }
}
