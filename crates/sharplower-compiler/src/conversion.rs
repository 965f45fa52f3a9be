//! Conversion lookup.
//!
//! Determines whether a value of one type converts to another and how. The
//! result describes the conversion; applying it (and folding constants) is the
//! resolver's job.
//!
//! ## Lookup order
//!
//! 1. Identity
//! 2. `null` to a reference or nullable type
//! 3. Built-in numeric conversions
//! 4. User-defined conversion operators
//! 5. Nullable forms: wrap (`T -> U?`), lifted (`T? -> U?`), unwrap (`T? -> U`, explicit)

use sharplower_core::{TypeHash, primitives};

use crate::bytecode::OpCode;
use crate::registry::{NullableInfo, TypeRegistry};

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub kind: ConversionKind,
    /// Whether this conversion can be applied without a cast.
    pub is_implicit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversionKind {
    Identity,

    /// Built-in numeric conversion.
    Primitive { from: TypeHash, to: TypeHash },

    /// `null` to a class, array, delegate or `string`.
    NullToReference,

    /// `null` to the empty instance of a nullable type.
    NullToNullable { info: NullableInfo },

    /// `T -> T?`, optionally after converting `T` to the underlying type.
    Wrap {
        info: NullableInfo,
        inner: Option<Box<Conversion>>,
    },

    /// `T? -> U` through the value accessor. Always explicit.
    Unwrap {
        info: NullableInfo,
        inner: Option<Box<Conversion>>,
    },

    /// `T? -> U?`: unwrap, convert, re-wrap, propagating no-value.
    Lifted {
        from: NullableInfo,
        to: NullableInfo,
        inner: Box<Conversion>,
    },

    /// Call a one-argument conversion function.
    UserDefined { function: TypeHash },
}

impl Conversion {
    pub fn identity() -> Self {
        Self {
            kind: ConversionKind::Identity,
            is_implicit: true,
        }
    }

    fn new(kind: ConversionKind, is_implicit: bool) -> Self {
        Self { kind, is_implicit }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.kind, ConversionKind::Identity)
    }
}

/// Find a conversion from `from` to `to`, implicit or explicit.
pub fn find_conversion(registry: &TypeRegistry, from: TypeHash, to: TypeHash) -> Option<Conversion> {
    if from == to {
        return Some(Conversion::identity());
    }

    if from == primitives::NULL {
        if registry.is_reference_type(to) {
            return Some(Conversion::new(ConversionKind::NullToReference, true));
        }
        return registry
            .nullable_info(to)
            .map(|info| Conversion::new(ConversionKind::NullToNullable { info }, true));
    }

    if is_numeric(from) && is_numeric(to) {
        return Some(Conversion::new(
            ConversionKind::Primitive { from, to },
            is_implicit_numeric(from, to),
        ));
    }

    if let Some(user) = registry.user_conversion(from, to) {
        return Some(Conversion::new(
            ConversionKind::UserDefined {
                function: user.function,
            },
            user.implicit,
        ));
    }

    match (registry.nullable_info(from), registry.nullable_info(to)) {
        (Some(source), Some(target)) => {
            let inner = find_conversion(registry, source.underlying, target.underlying)?;
            let is_implicit = inner.is_implicit;
            Some(Conversion::new(
                ConversionKind::Lifted {
                    from: source,
                    to: target,
                    inner: Box::new(inner),
                },
                is_implicit,
            ))
        }
        (None, Some(target)) => {
            let inner = nested(registry, from, target.underlying)?;
            let is_implicit = inner.as_ref().is_none_or(|c| c.is_implicit);
            Some(Conversion::new(
                ConversionKind::Wrap {
                    info: target,
                    inner: inner.map(Box::new),
                },
                is_implicit,
            ))
        }
        (Some(source), None) => {
            let inner = nested(registry, source.underlying, to)?;
            Some(Conversion::new(
                ConversionKind::Unwrap {
                    info: source,
                    inner: inner.map(Box::new),
                },
                false,
            ))
        }
        (None, None) => None,
    }
}

/// `Some(None)` when no inner step is needed.
fn nested(registry: &TypeRegistry, from: TypeHash, to: TypeHash) -> Option<Option<Conversion>> {
    if from == to {
        return Some(None);
    }
    find_conversion(registry, from, to).map(Some)
}

/// Find an implicit conversion only.
pub fn find_implicit(registry: &TypeRegistry, from: TypeHash, to: TypeHash) -> Option<Conversion> {
    find_conversion(registry, from, to).filter(|c| c.is_implicit)
}

// =============================================================================
// Numeric types
// =============================================================================

pub fn is_integral(ty: TypeHash) -> bool {
    ty == primitives::INT8
        || ty == primitives::INT16
        || ty == primitives::INT32
        || ty == primitives::INT64
        || ty == primitives::UINT8
}

pub fn is_floating(ty: TypeHash) -> bool {
    ty == primitives::FLOAT || ty == primitives::DOUBLE
}

pub fn is_numeric(ty: TypeHash) -> bool {
    is_integral(ty) || is_floating(ty)
}

/// Inclusive value range of an integral type.
pub fn integral_range(ty: TypeHash) -> Option<(i64, i64)> {
    match ty {
        t if t == primitives::INT8 => Some((i8::MIN as i64, i8::MAX as i64)),
        t if t == primitives::UINT8 => Some((0, u8::MAX as i64)),
        t if t == primitives::INT16 => Some((i16::MIN as i64, i16::MAX as i64)),
        t if t == primitives::INT32 => Some((i32::MIN as i64, i32::MAX as i64)),
        t if t == primitives::INT64 => Some((i64::MIN, i64::MAX)),
        _ => None,
    }
}

/// Widening conversions that never lose magnitude.
pub fn is_implicit_numeric(from: TypeHash, to: TypeHash) -> bool {
    use primitives::{DOUBLE, FLOAT, INT8, INT16, INT32, INT64, UINT8};

    let targets: &[TypeHash] = match from {
        f if f == INT8 || f == UINT8 => &[INT16, INT32, INT64, FLOAT, DOUBLE],
        f if f == INT16 => &[INT32, INT64, FLOAT, DOUBLE],
        f if f == INT32 => &[INT64, FLOAT, DOUBLE],
        f if f == INT64 => &[FLOAT, DOUBLE],
        f if f == FLOAT => &[DOUBLE],
        _ => &[],
    };
    targets.contains(&to)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repr {
    I32,
    I64,
    F32,
    F64,
}

/// Small integers share the 32-bit representation.
fn repr(ty: TypeHash) -> Option<Repr> {
    match ty {
        t if is_integral(t) && t != primitives::INT64 => Some(Repr::I32),
        t if t == primitives::INT64 => Some(Repr::I64),
        t if t == primitives::FLOAT => Some(Repr::F32),
        t if t == primitives::DOUBLE => Some(Repr::F64),
        _ => None,
    }
}

/// Opcodes converting a numeric value of type `from` to type `to`.
pub fn primitive_conversion_ops(from: TypeHash, to: TypeHash) -> Vec<OpCode> {
    let (Some(source), Some(target)) = (repr(from), repr(to)) else {
        return Vec::new();
    };

    let mut ops = Vec::new();
    let change = match (source, target) {
        (Repr::I32, Repr::I64) => Some(OpCode::I32toI64),
        (Repr::I32, Repr::F32) => Some(OpCode::I32toF32),
        (Repr::I32, Repr::F64) => Some(OpCode::I32toF64),
        (Repr::I64, Repr::I32) => Some(OpCode::I64toI32),
        (Repr::I64, Repr::F32) => Some(OpCode::I64toF32),
        (Repr::I64, Repr::F64) => Some(OpCode::I64toF64),
        (Repr::F32, Repr::I32) => Some(OpCode::F32toI32),
        (Repr::F32, Repr::I64) => Some(OpCode::F32toI64),
        (Repr::F32, Repr::F64) => Some(OpCode::F32toF64),
        (Repr::F64, Repr::I32) => Some(OpCode::F64toI32),
        (Repr::F64, Repr::I64) => Some(OpCode::F64toI64),
        (Repr::F64, Repr::F32) => Some(OpCode::F64toF32),
        _ => None,
    };
    ops.extend(change);

    if from != to && !is_implicit_numeric(from, to) {
        let narrow = match to {
            t if t == primitives::INT8 => Some(OpCode::I32toI8),
            t if t == primitives::INT16 => Some(OpCode::I32toI16),
            t if t == primitives::UINT8 => Some(OpCode::I32toU8),
            _ => None,
        };
        ops.extend(narrow);
    }
    ops
}
