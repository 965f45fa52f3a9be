//! Deterministic hash-based identity for types and members.
//!
//! [`TypeHash`] is a 64-bit XXHash64 of a name (types, globals) or of an
//! owner + name + parameter list (functions, methods, constructors). Equal
//! inputs always give equal hashes, so a type's identity is a plain value that
//! can be used as a map key, compared, and computed before the type is
//! registered.
//!
//! ```
//! use sharplower_core::{TypeHash, primitives};
//!
//! assert_eq!(TypeHash::from_name("int"), primitives::INT32);
//! let nullable_int = TypeHash::nullable_of(primitives::INT32);
//! assert_ne!(nullable_int, primitives::INT32);
//! ```

use std::fmt;

use xxhash_rust::const_xxh64::xxh64;

/// Domain mixing constants, so a method and a type with the same spelling
/// never collide.
pub mod hash_constants {
    /// Separator for multi-part hashes.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;
    pub const FUNCTION: u64 = 0x5ea77ffbcdf5f302;
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;
    pub const CONSTRUCTOR: u64 = 0x9a7f3d5e2b8c4601;
    pub const GLOBAL: u64 = 0x1a095090689d4647;
    pub const NULLABLE: u64 = 0x3e9f5d2a8c7b1403;

    /// Per-position markers so that parameter order matters.
    pub const PARAM_MARKERS: [u64; 8] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
    ];
}

/// A deterministic 64-bit hash identifying a type, function or member.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Hash of a (qualified) type name.
    #[inline]
    pub const fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Hash of a global variable name.
    #[inline]
    pub const fn from_global(name: &str) -> Self {
        TypeHash(hash_constants::GLOBAL ^ xxh64(name.as_bytes(), 0))
    }

    /// Hash of a global function; overloads differ by parameter types.
    pub fn from_function(name: &str, params: &[TypeHash]) -> Self {
        mix_params(hash_constants::FUNCTION ^ xxh64(name.as_bytes(), 0), params)
    }

    /// Hash of an instance method (including property and event accessors).
    pub fn from_method(owner: TypeHash, name: &str, params: &[TypeHash]) -> Self {
        mix_params(
            hash_constants::METHOD ^ owner.0 ^ xxh64(name.as_bytes(), 0),
            params,
        )
    }

    /// Hash of a constructor of `owner`.
    pub fn from_constructor(owner: TypeHash, params: &[TypeHash]) -> Self {
        mix_params(hash_constants::CONSTRUCTOR ^ owner.0, params)
    }

    /// Hash of the nullable wrapper instantiated over `underlying`.
    pub fn nullable_of(underlying: TypeHash) -> Self {
        mix_params(hash_constants::NULLABLE, &[underlying])
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

fn mix_params(seed: u64, params: &[TypeHash]) -> TypeHash {
    let mut hash = seed;
    for (i, param) in params.iter().enumerate() {
        let marker = hash_constants::PARAM_MARKERS
            .get(i)
            .copied()
            .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
        hash = hash
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(marker ^ param.0);
    }
    TypeHash(hash)
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Hashes of the built-in types.
pub mod primitives {
    use super::TypeHash;

    pub const VOID: TypeHash = TypeHash::from_name("void");
    pub const BOOL: TypeHash = TypeHash::from_name("bool");
    pub const INT8: TypeHash = TypeHash::from_name("sbyte");
    pub const INT16: TypeHash = TypeHash::from_name("short");
    pub const INT32: TypeHash = TypeHash::from_name("int");
    pub const INT64: TypeHash = TypeHash::from_name("long");
    pub const UINT8: TypeHash = TypeHash::from_name("byte");
    pub const FLOAT: TypeHash = TypeHash::from_name("float");
    pub const DOUBLE: TypeHash = TypeHash::from_name("double");
    /// `string` is a reference type, not a value type.
    pub const STRING: TypeHash = TypeHash::from_name("string");
    /// Type of the `null` literal before conversion.
    pub const NULL: TypeHash = TypeHash::from_name("<null>");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_hash_deterministically() {
        assert_eq!(TypeHash::from_name("Point"), TypeHash::from_name("Point"));
        assert_ne!(TypeHash::from_name("Point"), TypeHash::from_name("point"));
        assert_eq!(TypeHash::from_name("int"), primitives::INT32);
    }

    #[test]
    fn globals_and_types_do_not_collide() {
        assert_ne!(TypeHash::from_global("int"), TypeHash::from_name("int"));
    }

    #[test]
    fn parameter_order_matters() {
        let a = TypeHash::from_function("f", &[primitives::INT32, primitives::BOOL]);
        let b = TypeHash::from_function("f", &[primitives::BOOL, primitives::INT32]);
        assert_ne!(a, b);
    }

    #[test]
    fn methods_are_scoped_by_owner() {
        let point = TypeHash::from_name("Point");
        let size = TypeHash::from_name("Size");
        assert_ne!(
            TypeHash::from_method(point, "get_X", &[]),
            TypeHash::from_method(size, "get_X", &[])
        );
        assert_ne!(
            TypeHash::from_method(point, "get_X", &[]),
            TypeHash::from_function("get_X", &[])
        );
    }

    #[test]
    fn nullable_instances_are_distinct_per_argument() {
        let a = TypeHash::nullable_of(primitives::INT32);
        let b = TypeHash::nullable_of(primitives::INT64);
        assert_ne!(a, b);
        assert_eq!(a, TypeHash::nullable_of(primitives::INT32));
        assert_ne!(a, primitives::INT32);
    }
}
