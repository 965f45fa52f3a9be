//! Instruction-stream emitter.
//!
//! [`BytecodeEmitter`] is the backend surface lowering talks to: emit an
//! opcode, define and mark branch targets, declare temporaries and take their
//! address. It owns the chunk for one member body together with that body's
//! [`TemporaryPool`], so pools are never shared between bodies.
//!
//! ```
//! use sharplower_compiler::bytecode::{ConstantPool, OpCode};
//! use sharplower_compiler::emit::BytecodeEmitter;
//!
//! let mut constants = ConstantPool::new();
//! let mut emitter = BytecodeEmitter::new(&mut constants);
//! let skip = emitter.define_label();
//! emitter.emit_bool(true);
//! emitter.emit_branch(OpCode::JumpIfTrue, skip).unwrap();
//! emitter.emit_int(7);
//! emitter.emit_pop();
//! emitter.mark_label(skip).unwrap();
//! let body = emitter.finish().unwrap();
//! body.chunk.assert_opcodes(&[OpCode::PushTrue, OpCode::JumpIfTrue, OpCode::Constant, OpCode::Pop]);
//! ```

mod labels;
mod temps;

use log::trace;
use sharplower_core::{CodegenFault, TypeHash};

use crate::bytecode::{BytecodeChunk, Constant, ConstantPool, OpCode};

pub use labels::{Label, LabelTable};
pub use temps::{TempSlot, TemporaryPool};

/// Output of a finished emitter.
#[derive(Debug)]
pub struct EmittedBody {
    pub chunk: BytecodeChunk,
    /// Type of every local slot, parameters and temporaries included.
    pub local_types: Vec<TypeHash>,
}

pub struct BytecodeEmitter<'pool> {
    chunk: BytecodeChunk,
    /// Shared module-level pool.
    constants: &'pool mut ConstantPool,
    labels: LabelTable,
    temps: TemporaryPool,
    local_types: Vec<TypeHash>,
    current_line: u32,
}

impl<'pool> BytecodeEmitter<'pool> {
    pub fn new(constants: &'pool mut ConstantPool) -> Self {
        Self {
            chunk: BytecodeChunk::new(),
            constants,
            labels: LabelTable::new(),
            temps: TemporaryPool::new(),
            local_types: Vec::new(),
            current_line: 0,
        }
    }

    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    pub fn chunk(&self) -> &BytecodeChunk {
        &self.chunk
    }

    pub fn constants(&self) -> &ConstantPool {
        self.constants
    }

    // ==========================================================================
    // Basic emission
    // ==========================================================================

    pub fn emit(&mut self, op: OpCode) {
        self.chunk.write_op(op, self.current_line);
    }

    pub fn emit_byte(&mut self, op: OpCode, byte: u8) {
        self.chunk.write_op(op, self.current_line);
        self.chunk.write_byte(byte, self.current_line);
    }

    pub fn emit_u16(&mut self, op: OpCode, value: u16) {
        self.chunk.write_op(op, self.current_line);
        self.chunk.write_u16(value, self.current_line);
    }

    fn emit_u16_u8(&mut self, op: OpCode, value: u16, byte: u8) {
        self.emit_u16(op, value);
        self.chunk.write_byte(byte, self.current_line);
    }

    /// Narrow or wide constant load depending on the pool index.
    pub fn emit_constant(&mut self, constant: Constant) {
        let index = self.constants.add(constant);
        if index < 256 {
            self.emit_byte(OpCode::Constant, index as u8);
        } else {
            self.emit_u16(OpCode::ConstantWide, index as u16);
        }
    }

    fn hash_index(&mut self, hash: TypeHash) -> u16 {
        self.constants.add_hash(hash) as u16
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    pub fn emit_int(&mut self, value: i64) {
        match value {
            0 => self.emit(OpCode::PushZero),
            1 => self.emit(OpCode::PushOne),
            _ => self.emit_constant(Constant::Int(value)),
        }
    }

    pub fn emit_f32(&mut self, value: f32) {
        self.emit_constant(Constant::Float32(value));
    }

    pub fn emit_f64(&mut self, value: f64) {
        self.emit_constant(Constant::Float64(value));
    }

    pub fn emit_string(&mut self, value: &str) {
        self.emit_constant(Constant::String(value.to_string()));
    }

    pub fn emit_bool(&mut self, value: bool) {
        self.emit(if value {
            OpCode::PushTrue
        } else {
            OpCode::PushFalse
        });
    }

    pub fn emit_null(&mut self) {
        self.emit(OpCode::PushNull);
    }

    // ==========================================================================
    // Stack
    // ==========================================================================

    pub fn emit_pop(&mut self) {
        self.emit(OpCode::Pop);
    }

    pub fn emit_dup(&mut self) {
        self.emit(OpCode::Dup);
    }

    pub fn emit_pick(&mut self, depth: u8) {
        self.emit_byte(OpCode::Pick, depth);
    }

    pub fn emit_swap(&mut self) {
        self.emit(OpCode::Swap);
    }

    // ==========================================================================
    // Locals
    // ==========================================================================

    /// Allocate the next local slot.
    pub fn declare_local(&mut self, ty: TypeHash) -> u32 {
        self.local_types.push(ty);
        self.local_types.len() as u32 - 1
    }

    pub fn local_count(&self) -> usize {
        self.local_types.len()
    }

    pub fn emit_get_local(&mut self, slot: u32) {
        if slot < 256 {
            self.emit_byte(OpCode::GetLocal, slot as u8);
        } else {
            self.emit_u16(OpCode::GetLocalWide, slot as u16);
        }
    }

    pub fn emit_set_local(&mut self, slot: u32) {
        if slot < 256 {
            self.emit_byte(OpCode::SetLocal, slot as u8);
        } else {
            self.emit_u16(OpCode::SetLocalWide, slot as u16);
        }
    }

    pub fn emit_local_address(&mut self, slot: u32) {
        self.emit_u16(OpCode::LocalAddress, slot as u16);
    }

    // ==========================================================================
    // Temporaries
    // ==========================================================================

    pub fn acquire_temp(&mut self, ty: TypeHash) -> TempSlot {
        let local_types = &mut self.local_types;
        self.temps.acquire(ty, || {
            local_types.push(ty);
            local_types.len() as u32 - 1
        })
    }

    /// Pop the stack top into `temp`.
    pub fn store_temp(&mut self, temp: &TempSlot) -> Result<(), CodegenFault> {
        self.temps.mark_stored(temp)?;
        self.emit_set_local(temp.slot());
        Ok(())
    }

    pub fn load_temp(&mut self, temp: &TempSlot) -> Result<(), CodegenFault> {
        self.temps.check_loadable(temp)?;
        self.emit_get_local(temp.slot());
        Ok(())
    }

    /// Address of a stored temporary, for calling methods on it in place.
    pub fn temp_address(&mut self, temp: &TempSlot) -> Result<(), CodegenFault> {
        self.temps.check_loadable(temp)?;
        self.emit_local_address(temp.slot());
        Ok(())
    }

    /// Zero-initialize `temp` in place; counts as a store.
    pub fn init_temp(&mut self, temp: &TempSlot) -> Result<(), CodegenFault> {
        self.temps.mark_stored(temp)?;
        self.emit_local_address(temp.slot());
        self.emit_init_object(temp.ty());
        Ok(())
    }

    pub fn release_temp(&mut self, temp: TempSlot) -> Result<(), CodegenFault> {
        self.temps.release(temp)
    }

    pub fn live_temps(&self) -> usize {
        self.temps.live_count()
    }

    // ==========================================================================
    // Globals, fields, elements
    // ==========================================================================

    pub fn emit_get_global(&mut self, global: TypeHash) {
        let index = self.hash_index(global);
        self.emit_u16(OpCode::GetGlobal, index);
    }

    pub fn emit_set_global(&mut self, global: TypeHash) {
        let index = self.hash_index(global);
        self.emit_u16(OpCode::SetGlobal, index);
    }

    pub fn emit_get_field(&mut self, index: u16) {
        self.emit_u16(OpCode::GetField, index);
    }

    pub fn emit_set_field(&mut self, index: u16) {
        self.emit_u16(OpCode::SetField, index);
    }

    // ==========================================================================
    // Calls and construction
    // ==========================================================================

    pub fn emit_call(&mut self, function: TypeHash, arg_count: u8) {
        let index = self.hash_index(function);
        self.emit_u16_u8(OpCode::Call, index, arg_count);
    }

    /// Receiver (value or address) below the arguments.
    pub fn emit_call_method(&mut self, method: TypeHash, arg_count: u8) {
        let index = self.hash_index(method);
        self.emit_u16_u8(OpCode::CallMethod, index, arg_count);
    }

    pub fn emit_new(&mut self, constructor: TypeHash, arg_count: u8) {
        let index = self.hash_index(constructor);
        self.emit_u16_u8(OpCode::New, index, arg_count);
    }

    /// Construct into the address below the arguments.
    pub fn emit_call_constructor(&mut self, constructor: TypeHash, arg_count: u8) {
        let index = self.hash_index(constructor);
        self.emit_u16_u8(OpCode::CallConstructor, index, arg_count);
    }

    pub fn emit_init_object(&mut self, ty: TypeHash) {
        let index = self.hash_index(ty);
        self.emit_u16(OpCode::InitObject, index);
    }

    pub fn emit_return(&mut self) {
        self.emit(OpCode::Return);
    }

    pub fn emit_return_void(&mut self) {
        self.emit(OpCode::ReturnVoid);
    }

    // ==========================================================================
    // Branches
    // ==========================================================================

    pub fn define_label(&mut self) -> Label {
        self.labels.define()
    }

    /// Emit a forward branch to `label`; the operand is patched on `mark_label`.
    pub fn emit_branch(&mut self, op: OpCode, label: Label) -> Result<(), CodegenFault> {
        if !op.is_branch() {
            return Err(CodegenFault::invalid(format!(
                "{} is not a branch",
                op.name()
            )));
        }
        self.emit_u16(op, 0);
        let operand = self.chunk.current_offset() - 2;
        self.labels.add_fixup(label, operand)
    }

    /// Bind `label` to the next instruction.
    pub fn mark_label(&mut self, label: Label) -> Result<(), CodegenFault> {
        let target = self.chunk.current_offset();
        trace!("label {} -> {target:04}", label.index());
        for operand in self.labels.mark(label, target)? {
            let distance = target - (operand + 2);
            let distance = u16::try_from(distance)
                .map_err(|_| CodegenFault::BranchTooFar { distance })?;
            self.chunk.patch_u16(operand, distance);
        }
        Ok(())
    }

    // ==========================================================================
    // Completion
    // ==========================================================================

    /// Verify labels and temporaries, then hand back the chunk.
    pub fn finish(self) -> Result<EmittedBody, CodegenFault> {
        self.labels.verify()?;
        match self.temps.live_count() {
            0 => Ok(EmittedBody {
                chunk: self.chunk,
                local_types: self.local_types,
            }),
            count => Err(CodegenFault::LeakedTemporaries { count }),
        }
    }
}
