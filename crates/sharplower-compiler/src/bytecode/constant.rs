//! Module-level constant pool.

use rustc_hash::FxHashMap;
use sharplower_core::TypeHash;

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    /// Function, method, constructor, global or type identity.
    Hash(TypeHash),
}

/// Constants referenced by index from bytecode, deduplicated.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    index: FxHashMap<ConstantKey, u32>,
}

/// Hashable mirror of [`Constant`]; floats compare by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Int(i64),
    Float32(u32),
    Float64(u64),
    String(String),
    Hash(TypeHash),
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `constant`, or return the index of an identical one.
    pub fn add(&mut self, constant: Constant) -> u32 {
        let key = Self::to_key(&constant);
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }

        let idx = self.constants.len() as u32;
        self.constants.push(constant);
        self.index.insert(key, idx);
        idx
    }

    pub fn add_int(&mut self, value: i64) -> u32 {
        self.add(Constant::Int(value))
    }

    pub fn add_f32(&mut self, value: f32) -> u32 {
        self.add(Constant::Float32(value))
    }

    pub fn add_f64(&mut self, value: f64) -> u32 {
        self.add(Constant::Float64(value))
    }

    pub fn add_string(&mut self, value: &str) -> u32 {
        self.add(Constant::String(value.to_string()))
    }

    pub fn add_hash(&mut self, hash: TypeHash) -> u32 {
        self.add(Constant::Hash(hash))
    }

    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    /// The hash stored at `index`, if that constant is a hash.
    pub fn hash_at(&self, index: u32) -> Option<TypeHash> {
        match self.get(index) {
            Some(Constant::Hash(hash)) => Some(*hash),
            _ => None,
        }
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    fn to_key(constant: &Constant) -> ConstantKey {
        match constant {
            Constant::Int(v) => ConstantKey::Int(*v),
            Constant::Float32(v) => ConstantKey::Float32(v.to_bits()),
            Constant::Float64(v) => ConstantKey::Float64(v.to_bits()),
            Constant::String(s) => ConstantKey::String(s.clone()),
            Constant::Hash(h) => ConstantKey::Hash(*h),
        }
    }
}
