//! Primitive operator table.
//!
//! Maps an operator and its (unlifted) operand types to the opcode that
//! implements it, the types both operands must be converted to first, and the
//! result type. Lifting over nullable operands is layered on top of this table
//! by the resolver; nothing here knows about nullables.

use sharplower_core::{TypeHash, primitives};

use crate::ast::{BinaryOp, UnaryOp};
use crate::bytecode::OpCode;
use crate::conversion::{is_implicit_numeric, is_integral, is_numeric};

/// Resolution of a binary operator over primitive operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveBinary {
    pub opcode: OpCode,
    /// Apply `Not` to the result (`!=` is `==` negated).
    pub negate: bool,
    /// Type the left operand is converted to.
    pub left: TypeHash,
    /// Type the right operand is converted to.
    pub right: TypeHash,
    pub result: TypeHash,
}

/// Resolution of a unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveUnary {
    /// `None` for unary plus.
    pub opcode: Option<OpCode>,
    pub operand: TypeHash,
    pub result: TypeHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    I32,
    I64,
    F32,
    F64,
}

/// Binary numeric promotion.
fn promote(left: TypeHash, right: TypeHash) -> Option<TypeHash> {
    if !is_numeric(left) || !is_numeric(right) {
        return None;
    }
    Some(if left == primitives::DOUBLE || right == primitives::DOUBLE {
        primitives::DOUBLE
    } else if left == primitives::FLOAT || right == primitives::FLOAT {
        primitives::FLOAT
    } else if left == primitives::INT64 || right == primitives::INT64 {
        primitives::INT64
    } else {
        primitives::INT32
    })
}

/// Unary numeric promotion: small integers widen to `int`.
fn promote_unary(ty: TypeHash) -> Option<TypeHash> {
    promote(ty, ty)
}

fn width(ty: TypeHash) -> Width {
    match ty {
        t if t == primitives::INT64 => Width::I64,
        t if t == primitives::FLOAT => Width::F32,
        t if t == primitives::DOUBLE => Width::F64,
        _ => Width::I32,
    }
}

/// Resolve `left op right` for primitive operand types.
///
/// Logical and null-coalescing operators are never primitive.
pub fn primitive_binary(op: BinaryOp, left: TypeHash, right: TypeHash) -> Option<PrimitiveBinary> {
    use BinaryOp::*;

    if left == primitives::BOOL && right == primitives::BOOL {
        return bool_binary(op);
    }
    if left == primitives::STRING && right == primitives::STRING && op.is_equality() {
        return Some(PrimitiveBinary {
            opcode: OpCode::EqRef,
            negate: op == NotEqual,
            left,
            right,
            result: primitives::BOOL,
        });
    }

    match op {
        Add | Sub | Mul | Div | Mod => {
            let ty = promote(left, right)?;
            Some(same(arith_opcode(op, width(ty)), ty, ty))
        }
        BitwiseAnd | BitwiseOr | BitwiseXor => {
            if !is_integral(left) || !is_integral(right) {
                return None;
            }
            let ty = promote(left, right)?;
            let opcode = match op {
                BitwiseAnd => OpCode::BitAnd,
                BitwiseOr => OpCode::BitOr,
                _ => OpCode::BitXor,
            };
            Some(same(opcode, ty, ty))
        }
        ShiftLeft | ShiftRight => {
            // The count is always an int; the value keeps its promoted width.
            if !is_integral(left) || !shift_count(right) {
                return None;
            }
            let ty = promote_unary(left)?;
            let opcode = match (op, width(ty)) {
                (ShiftLeft, Width::I64) => OpCode::ShlI64,
                (ShiftRight, Width::I64) => OpCode::ShrI64,
                (ShiftLeft, _) => OpCode::ShlI32,
                _ => OpCode::ShrI32,
            };
            Some(PrimitiveBinary {
                opcode,
                negate: false,
                left: ty,
                right: primitives::INT32,
                result: ty,
            })
        }
        Equal | NotEqual | Less | LessEqual | Greater | GreaterEqual => {
            let ty = promote(left, right)?;
            let (opcode, negate) = compare_opcode(op, width(ty));
            Some(PrimitiveBinary {
                opcode,
                negate,
                left: ty,
                right: ty,
                result: primitives::BOOL,
            })
        }
        NullCoalesce | LogicalAnd | LogicalOr => None,
    }
}

fn same(opcode: OpCode, operand: TypeHash, result: TypeHash) -> PrimitiveBinary {
    PrimitiveBinary {
        opcode,
        negate: false,
        left: operand,
        right: operand,
        result,
    }
}

fn shift_count(ty: TypeHash) -> bool {
    ty == primitives::INT32 || is_implicit_numeric(ty, primitives::INT32)
}

fn bool_binary(op: BinaryOp) -> Option<PrimitiveBinary> {
    let (opcode, negate) = match op {
        BinaryOp::BitwiseAnd => (OpCode::BitAnd, false),
        BinaryOp::BitwiseOr => (OpCode::BitOr, false),
        BinaryOp::BitwiseXor => (OpCode::BitXor, false),
        BinaryOp::Equal => (OpCode::EqBool, false),
        BinaryOp::NotEqual => (OpCode::EqBool, true),
        _ => return None,
    };
    Some(PrimitiveBinary {
        opcode,
        negate,
        left: primitives::BOOL,
        right: primitives::BOOL,
        result: primitives::BOOL,
    })
}

fn arith_opcode(op: BinaryOp, width: Width) -> OpCode {
    use OpCode::*;
    let table = match width {
        Width::I32 => [AddI32, SubI32, MulI32, DivI32, ModI32],
        Width::I64 => [AddI64, SubI64, MulI64, DivI64, ModI64],
        Width::F32 => [AddF32, SubF32, MulF32, DivF32, ModF32],
        Width::F64 => [AddF64, SubF64, MulF64, DivF64, ModF64],
    };
    match op {
        BinaryOp::Add => table[0],
        BinaryOp::Sub => table[1],
        BinaryOp::Mul => table[2],
        BinaryOp::Div => table[3],
        _ => table[4],
    }
}

fn compare_opcode(op: BinaryOp, width: Width) -> (OpCode, bool) {
    use OpCode::*;
    let [eq, lt, le, gt, ge] = match width {
        Width::I32 => [EqI32, LtI32, LeI32, GtI32, GeI32],
        Width::I64 => [EqI64, LtI64, LeI64, GtI64, GeI64],
        Width::F32 => [EqF32, LtF32, LeF32, GtF32, GeF32],
        Width::F64 => [EqF64, LtF64, LeF64, GtF64, GeF64],
    };
    match op {
        BinaryOp::Equal => (eq, false),
        BinaryOp::NotEqual => (eq, true),
        BinaryOp::Less => (lt, false),
        BinaryOp::LessEqual => (le, false),
        BinaryOp::Greater => (gt, false),
        _ => (ge, false),
    }
}

/// Resolve a prefix operator. Increment and decrement are not primitive
/// operators; they lower through compound assignment.
pub fn primitive_unary(op: UnaryOp, operand: TypeHash) -> Option<PrimitiveUnary> {
    match op {
        UnaryOp::Neg => {
            let ty = promote_unary(operand)?;
            let opcode = match width(ty) {
                Width::I32 => OpCode::NegI32,
                Width::I64 => OpCode::NegI64,
                Width::F32 => OpCode::NegF32,
                Width::F64 => OpCode::NegF64,
            };
            Some(PrimitiveUnary {
                opcode: Some(opcode),
                operand: ty,
                result: ty,
            })
        }
        UnaryOp::Plus => {
            let ty = promote_unary(operand)?;
            Some(PrimitiveUnary {
                opcode: None,
                operand: ty,
                result: ty,
            })
        }
        UnaryOp::BitwiseNot if is_integral(operand) => {
            let ty = promote_unary(operand)?;
            Some(PrimitiveUnary {
                opcode: Some(OpCode::BitNot),
                operand: ty,
                result: ty,
            })
        }
        UnaryOp::LogicalNot if operand == primitives::BOOL => Some(PrimitiveUnary {
            opcode: Some(OpCode::Not),
            operand,
            result: operand,
        }),
        _ => None,
    }
}
