//! Instruction set.
//!
//! A stack machine. Each opcode is one byte followed by its inline operands
//! (big-endian). Conditional branches pop the value they test.

use num_enum::TryFromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Operand: u8 constant index
    Constant = 0,
    /// Operand: u16 constant index
    ConstantWide,
    PushNull,
    PushTrue,
    PushFalse,
    /// Push int 0.
    PushZero,
    /// Push int 1.
    PushOne,

    // =========================================================================
    // Stack
    // =========================================================================
    Pop,
    Dup,
    /// Copy the value `n` below the top to the top.
    /// Operand: u8 n (0 = top)
    Pick,
    Swap,

    // =========================================================================
    // Locals and temporaries
    // =========================================================================
    /// Operand: u8 slot
    GetLocal,
    /// Pops the stored value. Operand: u8 slot
    SetLocal,
    /// Operand: u16 slot
    GetLocalWide,
    /// Operand: u16 slot
    SetLocalWide,
    /// Push the address of a local slot. Operand: u16 slot
    LocalAddress,

    // =========================================================================
    // Globals, fields, elements
    // =========================================================================
    /// Operand: u16 constant index of the global's hash
    GetGlobal,
    /// Operand: u16 constant index of the global's hash
    SetGlobal,
    /// [obj] -> [value]. Operand: u16 field index
    GetField,
    /// [obj, value] -> []. Operand: u16 field index
    SetField,
    /// [array, index] -> [value]
    GetElement,
    /// [array, index, value] -> []
    SetElement,

    // =========================================================================
    // Arithmetic
    // =========================================================================
    AddI32,
    SubI32,
    MulI32,
    DivI32,
    ModI32,
    NegI32,
    AddI64,
    SubI64,
    MulI64,
    DivI64,
    ModI64,
    NegI64,
    AddF32,
    SubF32,
    MulF32,
    DivF32,
    ModF32,
    NegF32,
    AddF64,
    SubF64,
    MulF64,
    DivF64,
    ModF64,
    NegF64,

    // =========================================================================
    // Bitwise and logical
    // =========================================================================
    /// Integers and bools.
    BitAnd,
    /// Integers and bools.
    BitOr,
    /// Integers and bools.
    BitXor,
    BitNot,
    ShlI32,
    ShrI32,
    ShlI64,
    ShrI64,
    Not,

    // =========================================================================
    // Comparison
    // =========================================================================
    EqI32,
    LtI32,
    LeI32,
    GtI32,
    GeI32,
    EqI64,
    LtI64,
    LeI64,
    GtI64,
    GeI64,
    EqF32,
    LtF32,
    LeF32,
    GtF32,
    GeF32,
    EqF64,
    LtF64,
    LeF64,
    GtF64,
    GeF64,
    EqBool,
    /// Reference equality; strings compare by value.
    EqRef,

    // =========================================================================
    // Conversions
    // =========================================================================
    I32toI8,
    I32toI16,
    I32toU8,
    I32toI64,
    I64toI32,
    I32toF32,
    I32toF64,
    I64toF32,
    I64toF64,
    F32toF64,
    F64toF32,
    F32toI32,
    F64toI32,
    F32toI64,
    F64toI64,

    // =========================================================================
    // Control flow
    // =========================================================================
    /// Operand: u16 forward offset
    Jump,
    /// Operand: u16 forward offset
    JumpIfFalse,
    /// Operand: u16 forward offset
    JumpIfTrue,
    /// Operand: u16 forward offset
    JumpIfNotNull,

    // =========================================================================
    // Calls and construction
    // =========================================================================
    /// [args] -> [result?]. Operands: u16 constant index of function hash, u8 argc
    Call,
    /// [receiver, args] -> [result?]. Operands: u16 method hash constant, u8 argc
    CallMethod,
    /// [args] -> [object]. Operands: u16 constructor hash constant, u8 argc
    New,
    /// Construct into storage: [address, args] -> [].
    /// Operands: u16 constructor hash constant, u8 argc
    CallConstructor,
    /// Zero-initialize storage: [address] -> []. Operand: u16 type hash constant
    InitObject,
    Return,
    ReturnVoid,
}

impl OpCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Size of the inline operands, excluding the opcode byte.
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::Constant | OpCode::Pick | OpCode::GetLocal | OpCode::SetLocal => 1,

            OpCode::ConstantWide
            | OpCode::GetLocalWide
            | OpCode::SetLocalWide
            | OpCode::LocalAddress
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::GetField
            | OpCode::SetField
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfTrue
            | OpCode::JumpIfNotNull
            | OpCode::InitObject => 2,

            OpCode::Call | OpCode::CallMethod | OpCode::New | OpCode::CallConstructor => 3,

            _ => 0,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpIfTrue | OpCode::JumpIfNotNull
        )
    }

    /// Mnemonic used in disassembly and test failure output.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::ConstantWide => "CONSTANT_WIDE",
            OpCode::PushNull => "PUSH_NULL",
            OpCode::PushTrue => "PUSH_TRUE",
            OpCode::PushFalse => "PUSH_FALSE",
            OpCode::PushZero => "PUSH_ZERO",
            OpCode::PushOne => "PUSH_ONE",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::Pick => "PICK",
            OpCode::Swap => "SWAP",
            OpCode::GetLocal => "GET_LOCAL",
            OpCode::SetLocal => "SET_LOCAL",
            OpCode::GetLocalWide => "GET_LOCAL_WIDE",
            OpCode::SetLocalWide => "SET_LOCAL_WIDE",
            OpCode::LocalAddress => "LOCAL_ADDRESS",
            OpCode::GetGlobal => "GET_GLOBAL",
            OpCode::SetGlobal => "SET_GLOBAL",
            OpCode::GetField => "GET_FIELD",
            OpCode::SetField => "SET_FIELD",
            OpCode::GetElement => "GET_ELEMENT",
            OpCode::SetElement => "SET_ELEMENT",
            OpCode::AddI32 => "ADD_I32",
            OpCode::SubI32 => "SUB_I32",
            OpCode::MulI32 => "MUL_I32",
            OpCode::DivI32 => "DIV_I32",
            OpCode::ModI32 => "MOD_I32",
            OpCode::NegI32 => "NEG_I32",
            OpCode::AddI64 => "ADD_I64",
            OpCode::SubI64 => "SUB_I64",
            OpCode::MulI64 => "MUL_I64",
            OpCode::DivI64 => "DIV_I64",
            OpCode::ModI64 => "MOD_I64",
            OpCode::NegI64 => "NEG_I64",
            OpCode::AddF32 => "ADD_F32",
            OpCode::SubF32 => "SUB_F32",
            OpCode::MulF32 => "MUL_F32",
            OpCode::DivF32 => "DIV_F32",
            OpCode::ModF32 => "MOD_F32",
            OpCode::NegF32 => "NEG_F32",
            OpCode::AddF64 => "ADD_F64",
            OpCode::SubF64 => "SUB_F64",
            OpCode::MulF64 => "MUL_F64",
            OpCode::DivF64 => "DIV_F64",
            OpCode::ModF64 => "MOD_F64",
            OpCode::NegF64 => "NEG_F64",
            OpCode::BitAnd => "BIT_AND",
            OpCode::BitOr => "BIT_OR",
            OpCode::BitXor => "BIT_XOR",
            OpCode::BitNot => "BIT_NOT",
            OpCode::ShlI32 => "SHL_I32",
            OpCode::ShrI32 => "SHR_I32",
            OpCode::ShlI64 => "SHL_I64",
            OpCode::ShrI64 => "SHR_I64",
            OpCode::Not => "NOT",
            OpCode::EqI32 => "EQ_I32",
            OpCode::LtI32 => "LT_I32",
            OpCode::LeI32 => "LE_I32",
            OpCode::GtI32 => "GT_I32",
            OpCode::GeI32 => "GE_I32",
            OpCode::EqI64 => "EQ_I64",
            OpCode::LtI64 => "LT_I64",
            OpCode::LeI64 => "LE_I64",
            OpCode::GtI64 => "GT_I64",
            OpCode::GeI64 => "GE_I64",
            OpCode::EqF32 => "EQ_F32",
            OpCode::LtF32 => "LT_F32",
            OpCode::LeF32 => "LE_F32",
            OpCode::GtF32 => "GT_F32",
            OpCode::GeF32 => "GE_F32",
            OpCode::EqF64 => "EQ_F64",
            OpCode::LtF64 => "LT_F64",
            OpCode::LeF64 => "LE_F64",
            OpCode::GtF64 => "GT_F64",
            OpCode::GeF64 => "GE_F64",
            OpCode::EqBool => "EQ_BOOL",
            OpCode::EqRef => "EQ_REF",
            OpCode::I32toI8 => "I32_TO_I8",
            OpCode::I32toI16 => "I32_TO_I16",
            OpCode::I32toU8 => "I32_TO_U8",
            OpCode::I32toI64 => "I32_TO_I64",
            OpCode::I64toI32 => "I64_TO_I32",
            OpCode::I32toF32 => "I32_TO_F32",
            OpCode::I32toF64 => "I32_TO_F64",
            OpCode::I64toF32 => "I64_TO_F32",
            OpCode::I64toF64 => "I64_TO_F64",
            OpCode::F32toF64 => "F32_TO_F64",
            OpCode::F64toF32 => "F64_TO_F32",
            OpCode::F32toI32 => "F32_TO_I32",
            OpCode::F64toI32 => "F64_TO_I32",
            OpCode::F32toI64 => "F32_TO_I64",
            OpCode::F64toI64 => "F64_TO_I64",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfTrue => "JUMP_IF_TRUE",
            OpCode::JumpIfNotNull => "JUMP_IF_NOT_NULL",
            OpCode::Call => "CALL",
            OpCode::CallMethod => "CALL_METHOD",
            OpCode::New => "NEW",
            OpCode::CallConstructor => "CALL_CONSTRUCTOR",
            OpCode::InitObject => "INIT_OBJECT",
            OpCode::Return => "RETURN",
            OpCode::ReturnVoid => "RETURN_VOID",
        }
    }
}
