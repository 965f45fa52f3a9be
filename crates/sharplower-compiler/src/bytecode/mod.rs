//! Bytecode model.
//!
//! - [`OpCode`] - the instruction set
//! - [`BytecodeChunk`] - code for one member body
//! - [`Constant`] and [`ConstantPool`] - module-level constants

mod chunk;
mod constant;
mod opcode;

pub use chunk::BytecodeChunk;
pub use constant::{Constant, ConstantPool};
pub use opcode::OpCode;
