//! A small stack interpreter for compiled member bodies.
//!
//! Only what the lowering emits is supported. Natives are closures keyed by
//! function or method hash; methods receive their receiver as the first
//! argument. Nullable operations are built in.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use sharplower::sharplower_compiler::bytecode::{BytecodeChunk, Constant, ConstantPool, OpCode};
use sharplower::sharplower_compiler::registry::{NullableMethod, TypeKind};
use sharplower::sharplower_compiler::{CompiledFunction, TypeRegistry};
use sharplower::sharplower_core::{TypeHash, primitives};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    Str(Rc<str>),
    /// `T?`; `None` when empty.
    Nullable(Option<Box<Value>>),
    /// Value-type instance, copied on load.
    Struct(Vec<Value>),
    /// Class instance or array, shared.
    Object(Rc<RefCell<Vec<Value>>>),
    /// Address of a local slot.
    Address(usize),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn some(value: Value) -> Self {
        Value::Nullable(Some(Box::new(value)))
    }

    pub fn none() -> Self {
        Value::Nullable(None)
    }

    pub fn object(fields: Vec<Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(fields)))
    }

    /// Nullable from an option of plain values.
    pub fn from_option(value: Option<Value>) -> Self {
        Value::Nullable(value.map(Box::new))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    #[error("nullable object must have a value")]
    NoValue,
    #[error("stack underflow at {0:04}")]
    StackUnderflow(usize),
    #[error("type mismatch at {offset:04}: {message}")]
    TypeMismatch { offset: usize, message: String },
    #[error("no native bound for {0}")]
    UnboundNative(TypeHash),
    #[error("malformed bytecode at {0:04}")]
    BadCode(usize),
    #[error("index {0} out of range")]
    IndexOutOfRange(i64),
    #[error("division by zero")]
    DivideByZero,
}

type Result<T> = std::result::Result<T, VmError>;

type Native = Box<dyn FnMut(&[Value]) -> Value>;

pub struct Vm<'a> {
    registry: &'a TypeRegistry,
    constants: &'a ConstantPool,
    natives: FxHashMap<TypeHash, Native>,
    globals: FxHashMap<TypeHash, Value>,
}

/// Execution state of one call.
struct Frame<'c> {
    chunk: &'c BytecodeChunk,
    locals: Vec<Value>,
    stack: Vec<Value>,
    /// Offset of the instruction being executed.
    offset: usize,
}

impl Frame<'_> {
    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(VmError::StackUnderflow(self.offset))
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        if self.stack.len() < n {
            return Err(VmError::StackUnderflow(self.offset));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn mismatch(&self, message: impl Into<String>) -> VmError {
        VmError::TypeMismatch {
            offset: self.offset,
            message: message.into(),
        }
    }

    fn pop_int(&mut self) -> Result<i64> {
        match self.pop()? {
            Value::Int(v) => Ok(v),
            other => Err(self.mismatch(format!("expected int, found {other:?}"))),
        }
    }

    fn pop_bool(&mut self) -> Result<bool> {
        match self.pop()? {
            Value::Bool(v) => Ok(v),
            other => Err(self.mismatch(format!("expected bool, found {other:?}"))),
        }
    }

    fn pop_float(&mut self) -> Result<f32> {
        match self.pop()? {
            Value::Float(v) => Ok(v),
            other => Err(self.mismatch(format!("expected float, found {other:?}"))),
        }
    }

    fn pop_double(&mut self) -> Result<f64> {
        match self.pop()? {
            Value::Double(v) => Ok(v),
            other => Err(self.mismatch(format!("expected double, found {other:?}"))),
        }
    }

    fn u8_at(&self, offset: usize) -> Result<u8> {
        self.chunk.read_byte(offset).ok_or(VmError::BadCode(offset))
    }

    fn u16_at(&self, offset: usize) -> Result<u16> {
        self.chunk.read_u16(offset).ok_or(VmError::BadCode(offset))
    }

    fn local(&self, slot: usize) -> Result<&Value> {
        self.locals.get(slot).ok_or(VmError::BadCode(self.offset))
    }

    fn local_mut(&mut self, slot: usize) -> Result<&mut Value> {
        let offset = self.offset;
        self.locals.get_mut(slot).ok_or(VmError::BadCode(offset))
    }

    /// Follow an address to the value it names.
    fn deref(&self, value: Value) -> Result<Value> {
        match value {
            Value::Address(slot) => self.local(slot).cloned(),
            other => Ok(other),
        }
    }

    fn pop_address(&mut self) -> Result<usize> {
        match self.pop()? {
            Value::Address(slot) => Ok(slot),
            other => Err(self.mismatch(format!("expected address, found {other:?}"))),
        }
    }
}

macro_rules! int_binary {
    ($frame:expr, $narrow:ty, |$a:ident, $b:ident| $body:expr) => {{
        let $b = $frame.pop_int()? as $narrow;
        let $a = $frame.pop_int()? as $narrow;
        $frame.push(Value::Int($body as i64));
    }};
}

macro_rules! compare {
    ($frame:expr, $pop:ident, $op:tt) => {{
        let b = $frame.$pop()?;
        let a = $frame.$pop()?;
        $frame.push(Value::Bool(a $op b));
    }};
}

macro_rules! float_binary {
    ($frame:expr, $pop:ident, $variant:ident, $op:tt) => {{
        let b = $frame.$pop()?;
        let a = $frame.$pop()?;
        $frame.push(Value::$variant(a $op b));
    }};
}

impl<'a> Vm<'a> {
    pub fn new(registry: &'a TypeRegistry, constants: &'a ConstantPool) -> Self {
        Self {
            registry,
            constants,
            natives: FxHashMap::default(),
            globals: FxHashMap::default(),
        }
    }

    /// Bind a native function, method, accessor or conversion.
    pub fn bind(&mut self, hash: TypeHash, native: impl FnMut(&[Value]) -> Value + 'static) -> &mut Self {
        self.natives.insert(hash, Box::new(native));
        self
    }

    pub fn set_global(&mut self, hash: TypeHash, value: Value) {
        self.globals.insert(hash, value);
    }

    pub fn global(&self, hash: TypeHash) -> Option<&Value> {
        self.globals.get(&hash)
    }

    /// The zero value of `ty`.
    pub fn default_of(&self, ty: TypeHash) -> Value {
        match self.registry.kind(ty) {
            Some(TypeKind::Nullable) => Value::none(),
            Some(TypeKind::Value) => {
                let fields = self
                    .registry
                    .get(ty)
                    .map(|def| def.fields.iter().map(|f| self.default_of(f.ty)).collect())
                    .unwrap_or_default();
                Value::Struct(fields)
            }
            Some(TypeKind::Primitive) => match ty {
                primitives::BOOL => Value::Bool(false),
                primitives::FLOAT => Value::Float(0.0),
                primitives::DOUBLE => Value::Double(0.0),
                primitives::VOID => Value::Null,
                _ => Value::Int(0),
            },
            _ => Value::Null,
        }
    }

    /// Run `function` with `args` bound to its parameters.
    pub fn run(&mut self, function: &CompiledFunction, args: &[Value]) -> Result<Option<Value>> {
        let mut locals: Vec<Value> = args.to_vec();
        for ty in function.local_types.iter().skip(args.len()) {
            locals.push(self.default_of(*ty));
        }
        let mut frame = Frame {
            chunk: &function.chunk,
            locals,
            stack: Vec::new(),
            offset: 0,
        };

        let mut ip = 0;
        while ip < frame.chunk.len() {
            frame.offset = ip;
            let op = frame.chunk.read_op(ip).ok_or(VmError::BadCode(ip))?;
            let operand = ip + 1;
            ip = operand + op.operand_size();

            match op {
                OpCode::Constant => {
                    let index = frame.u8_at(operand)? as u32;
                    let value = self.constant(index, &frame)?;
                    frame.push(value);
                }
                OpCode::ConstantWide => {
                    let index = frame.u16_at(operand)? as u32;
                    let value = self.constant(index, &frame)?;
                    frame.push(value);
                }
                OpCode::PushNull => frame.push(Value::Null),
                OpCode::PushTrue => frame.push(Value::Bool(true)),
                OpCode::PushFalse => frame.push(Value::Bool(false)),
                OpCode::PushZero => frame.push(Value::Int(0)),
                OpCode::PushOne => frame.push(Value::Int(1)),

                OpCode::Pop => {
                    frame.pop()?;
                }
                OpCode::Dup => {
                    let top = frame.pop()?;
                    frame.push(top.clone());
                    frame.push(top);
                }
                OpCode::Pick => {
                    let depth = frame.u8_at(operand)? as usize;
                    let index = frame
                        .stack
                        .len()
                        .checked_sub(depth + 1)
                        .ok_or(VmError::StackUnderflow(frame.offset))?;
                    let value = frame.stack[index].clone();
                    frame.push(value);
                }
                OpCode::Swap => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    frame.push(b);
                    frame.push(a);
                }

                OpCode::GetLocal | OpCode::GetLocalWide => {
                    let slot = if op == OpCode::GetLocal {
                        frame.u8_at(operand)? as usize
                    } else {
                        frame.u16_at(operand)? as usize
                    };
                    let value = frame.local(slot)?.clone();
                    frame.push(value);
                }
                OpCode::SetLocal | OpCode::SetLocalWide => {
                    let slot = if op == OpCode::SetLocal {
                        frame.u8_at(operand)? as usize
                    } else {
                        frame.u16_at(operand)? as usize
                    };
                    let value = frame.pop()?;
                    *frame.local_mut(slot)? = value;
                }
                OpCode::LocalAddress => {
                    let slot = frame.u16_at(operand)? as usize;
                    frame.push(Value::Address(slot));
                }

                OpCode::GetGlobal => {
                    let hash = self.hash(frame.u16_at(operand)?, &frame)?;
                    let value = self.globals.get(&hash).cloned().unwrap_or(Value::Null);
                    frame.push(value);
                }
                OpCode::SetGlobal => {
                    let hash = self.hash(frame.u16_at(operand)?, &frame)?;
                    let value = frame.pop()?;
                    self.globals.insert(hash, value);
                }
                OpCode::GetField => {
                    let index = frame.u16_at(operand)? as usize;
                    let receiver = frame.pop()?;
                    let receiver = frame.deref(receiver)?;
                    let value = match receiver {
                        Value::Struct(fields) => fields.get(index).cloned(),
                        Value::Object(object) => {
                            let fields = object.borrow();
                            fields.get(index).cloned()
                        }
                        other => return Err(frame.mismatch(format!("field read on {other:?}"))),
                    };
                    let value = value.ok_or(VmError::BadCode(frame.offset))?;
                    frame.push(value);
                }
                OpCode::SetField => {
                    let index = frame.u16_at(operand)? as usize;
                    let value = frame.pop()?;
                    match frame.pop()? {
                        Value::Address(slot) => {
                            let mismatch = frame.mismatch("field write through bad address");
                            match frame.local_mut(slot)? {
                                Value::Struct(fields) if index < fields.len() => fields[index] = value,
                                _ => return Err(mismatch),
                            }
                        }
                        Value::Object(object) => {
                            let mut fields = object.borrow_mut();
                            match fields.get_mut(index) {
                                Some(field) => *field = value,
                                None => return Err(VmError::BadCode(frame.offset)),
                            }
                        }
                        other => return Err(frame.mismatch(format!("field write on {other:?}"))),
                    }
                }
                OpCode::GetElement => {
                    let index = frame.pop_int()?;
                    let Value::Object(array) = frame.pop()? else {
                        return Err(frame.mismatch("element read on non-array"));
                    };
                    let elements = array.borrow();
                    let value = usize::try_from(index)
                        .ok()
                        .and_then(|i| elements.get(i).cloned())
                        .ok_or(VmError::IndexOutOfRange(index))?;
                    drop(elements);
                    frame.push(value);
                }
                OpCode::SetElement => {
                    let value = frame.pop()?;
                    let index = frame.pop_int()?;
                    let Value::Object(array) = frame.pop()? else {
                        return Err(frame.mismatch("element write on non-array"));
                    };
                    let mut elements = array.borrow_mut();
                    let Some(slot) = usize::try_from(index).ok().filter(|&i| i < elements.len()) else {
                        return Err(VmError::IndexOutOfRange(index));
                    };
                    elements[slot] = value;
                }

                OpCode::AddI32 => int_binary!(frame, i32, |a, b| a.wrapping_add(b)),
                OpCode::SubI32 => int_binary!(frame, i32, |a, b| a.wrapping_sub(b)),
                OpCode::MulI32 => int_binary!(frame, i32, |a, b| a.wrapping_mul(b)),
                OpCode::DivI32 | OpCode::ModI32 => {
                    let b = frame.pop_int()? as i32;
                    let a = frame.pop_int()? as i32;
                    if b == 0 {
                        return Err(VmError::DivideByZero);
                    }
                    let r = if op == OpCode::DivI32 {
                        a.wrapping_div(b)
                    } else {
                        a.wrapping_rem(b)
                    };
                    frame.push(Value::Int(r as i64));
                }
                OpCode::NegI32 => {
                    let a = frame.pop_int()? as i32;
                    frame.push(Value::Int(a.wrapping_neg() as i64));
                }
                OpCode::AddI64 => int_binary!(frame, i64, |a, b| a.wrapping_add(b)),
                OpCode::SubI64 => int_binary!(frame, i64, |a, b| a.wrapping_sub(b)),
                OpCode::MulI64 => int_binary!(frame, i64, |a, b| a.wrapping_mul(b)),
                OpCode::DivI64 | OpCode::ModI64 => {
                    let b = frame.pop_int()?;
                    let a = frame.pop_int()?;
                    if b == 0 {
                        return Err(VmError::DivideByZero);
                    }
                    let r = if op == OpCode::DivI64 {
                        a.wrapping_div(b)
                    } else {
                        a.wrapping_rem(b)
                    };
                    frame.push(Value::Int(r));
                }
                OpCode::NegI64 => {
                    let a = frame.pop_int()?;
                    frame.push(Value::Int(a.wrapping_neg()));
                }
                OpCode::AddF32 => float_binary!(frame, pop_float, Float, +),
                OpCode::SubF32 => float_binary!(frame, pop_float, Float, -),
                OpCode::MulF32 => float_binary!(frame, pop_float, Float, *),
                OpCode::DivF32 => float_binary!(frame, pop_float, Float, /),
                OpCode::ModF32 => float_binary!(frame, pop_float, Float, %),
                OpCode::NegF32 => {
                    let a = frame.pop_float()?;
                    frame.push(Value::Float(-a));
                }
                OpCode::AddF64 => float_binary!(frame, pop_double, Double, +),
                OpCode::SubF64 => float_binary!(frame, pop_double, Double, -),
                OpCode::MulF64 => float_binary!(frame, pop_double, Double, *),
                OpCode::DivF64 => float_binary!(frame, pop_double, Double, /),
                OpCode::ModF64 => float_binary!(frame, pop_double, Double, %),
                OpCode::NegF64 => {
                    let a = frame.pop_double()?;
                    frame.push(Value::Double(-a));
                }

                OpCode::BitAnd | OpCode::BitOr | OpCode::BitXor => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let value = match (a, b) {
                        (Value::Bool(a), Value::Bool(b)) => Value::Bool(match op {
                            OpCode::BitAnd => a & b,
                            OpCode::BitOr => a | b,
                            _ => a ^ b,
                        }),
                        (Value::Int(a), Value::Int(b)) => Value::Int(match op {
                            OpCode::BitAnd => a & b,
                            OpCode::BitOr => a | b,
                            _ => a ^ b,
                        }),
                        (a, b) => return Err(frame.mismatch(format!("bitwise op on {a:?}, {b:?}"))),
                    };
                    frame.push(value);
                }
                OpCode::BitNot => {
                    let a = frame.pop_int()?;
                    frame.push(Value::Int(!a));
                }
                OpCode::ShlI32 => int_binary!(frame, i32, |a, b| a.wrapping_shl(b as u32)),
                OpCode::ShrI32 => int_binary!(frame, i32, |a, b| a.wrapping_shr(b as u32)),
                OpCode::ShlI64 => int_binary!(frame, i64, |a, b| a.wrapping_shl(b as u32)),
                OpCode::ShrI64 => int_binary!(frame, i64, |a, b| a.wrapping_shr(b as u32)),
                OpCode::Not => {
                    let a = frame.pop_bool()?;
                    frame.push(Value::Bool(!a));
                }

                OpCode::EqI32 | OpCode::EqI64 => compare!(frame, pop_int, ==),
                OpCode::LtI32 | OpCode::LtI64 => compare!(frame, pop_int, <),
                OpCode::LeI32 | OpCode::LeI64 => compare!(frame, pop_int, <=),
                OpCode::GtI32 | OpCode::GtI64 => compare!(frame, pop_int, >),
                OpCode::GeI32 | OpCode::GeI64 => compare!(frame, pop_int, >=),
                OpCode::EqF32 => compare!(frame, pop_float, ==),
                OpCode::LtF32 => compare!(frame, pop_float, <),
                OpCode::LeF32 => compare!(frame, pop_float, <=),
                OpCode::GtF32 => compare!(frame, pop_float, >),
                OpCode::GeF32 => compare!(frame, pop_float, >=),
                OpCode::EqF64 => compare!(frame, pop_double, ==),
                OpCode::LtF64 => compare!(frame, pop_double, <),
                OpCode::LeF64 => compare!(frame, pop_double, <=),
                OpCode::GtF64 => compare!(frame, pop_double, >),
                OpCode::GeF64 => compare!(frame, pop_double, >=),
                OpCode::EqBool => compare!(frame, pop_bool, ==),
                OpCode::EqRef => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let equal = match (&a, &b) {
                        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
                        _ => a == b,
                    };
                    frame.push(Value::Bool(equal));
                }

                OpCode::I32toI8 => {
                    let a = frame.pop_int()?;
                    frame.push(Value::Int(a as i8 as i64));
                }
                OpCode::I32toI16 => {
                    let a = frame.pop_int()?;
                    frame.push(Value::Int(a as i16 as i64));
                }
                OpCode::I32toU8 => {
                    let a = frame.pop_int()?;
                    frame.push(Value::Int(a as u8 as i64));
                }
                OpCode::I32toI64 => {}
                OpCode::I64toI32 => {
                    let a = frame.pop_int()?;
                    frame.push(Value::Int(a as i32 as i64));
                }
                OpCode::I32toF32 | OpCode::I64toF32 => {
                    let a = frame.pop_int()?;
                    frame.push(Value::Float(a as f32));
                }
                OpCode::I32toF64 | OpCode::I64toF64 => {
                    let a = frame.pop_int()?;
                    frame.push(Value::Double(a as f64));
                }
                OpCode::F32toF64 => {
                    let a = frame.pop_float()?;
                    frame.push(Value::Double(a as f64));
                }
                OpCode::F64toF32 => {
                    let a = frame.pop_double()?;
                    frame.push(Value::Float(a as f32));
                }
                OpCode::F32toI32 => {
                    let a = frame.pop_float()?;
                    frame.push(Value::Int(a as i32 as i64));
                }
                OpCode::F64toI32 => {
                    let a = frame.pop_double()?;
                    frame.push(Value::Int(a as i32 as i64));
                }
                OpCode::F32toI64 => {
                    let a = frame.pop_float()?;
                    frame.push(Value::Int(a as i64));
                }
                OpCode::F64toI64 => {
                    let a = frame.pop_double()?;
                    frame.push(Value::Int(a as i64));
                }

                OpCode::Jump => {
                    ip += frame.u16_at(operand)? as usize;
                }
                OpCode::JumpIfFalse => {
                    if !frame.pop_bool()? {
                        ip += frame.u16_at(operand)? as usize;
                    }
                }
                OpCode::JumpIfTrue => {
                    if frame.pop_bool()? {
                        ip += frame.u16_at(operand)? as usize;
                    }
                }
                OpCode::JumpIfNotNull => {
                    if frame.pop()? != Value::Null {
                        ip += frame.u16_at(operand)? as usize;
                    }
                }

                OpCode::Call => {
                    let hash = self.hash(frame.u16_at(operand)?, &frame)?;
                    let argc = frame.u8_at(operand + 2)? as usize;
                    let args = frame.pop_n(argc)?;
                    let result = self.call_native(hash, &args)?;
                    if self.returns_value(hash) {
                        frame.push(result);
                    }
                }
                OpCode::CallMethod => {
                    let hash = self.hash(frame.u16_at(operand)?, &frame)?;
                    let argc = frame.u8_at(operand + 2)? as usize;
                    let args = frame.pop_n(argc)?;
                    let receiver = frame.pop()?;
                    let receiver = frame.deref(receiver)?;

                    if let Some((method, info)) = self.registry.nullable_method(hash) {
                        let Value::Nullable(inner) = receiver else {
                            return Err(frame.mismatch("nullable method on non-nullable"));
                        };
                        let result = match method {
                            NullableMethod::HasValue => Value::Bool(inner.is_some()),
                            NullableMethod::Value => *inner.ok_or(VmError::NoValue)?,
                            NullableMethod::GetValueOrDefault => {
                                inner.map_or_else(|| self.default_of(info.underlying), |v| *v)
                            }
                            NullableMethod::Construct => {
                                return Err(frame.mismatch("constructor called as method"));
                            }
                        };
                        frame.push(result);
                        continue;
                    }

                    let mut all = Vec::with_capacity(argc + 1);
                    all.push(receiver);
                    all.extend(args);
                    let result = self.call_native(hash, &all)?;
                    if self.returns_value(hash) {
                        frame.push(result);
                    }
                }
                OpCode::New => {
                    let hash = self.hash(frame.u16_at(operand)?, &frame)?;
                    let argc = frame.u8_at(operand + 2)? as usize;
                    let args = frame.pop_n(argc)?;
                    let value = self.construct(hash, args, &frame)?;
                    frame.push(value);
                }
                OpCode::CallConstructor => {
                    let hash = self.hash(frame.u16_at(operand)?, &frame)?;
                    let argc = frame.u8_at(operand + 2)? as usize;
                    let args = frame.pop_n(argc)?;
                    let slot = frame.pop_address()?;
                    let value = self.construct(hash, args, &frame)?;
                    *frame.local_mut(slot)? = value;
                }
                OpCode::InitObject => {
                    let ty = self.hash(frame.u16_at(operand)?, &frame)?;
                    let slot = frame.pop_address()?;
                    let value = self.default_of(ty);
                    *frame.local_mut(slot)? = value;
                }
                OpCode::Return => return frame.pop().map(Some),
                OpCode::ReturnVoid => return Ok(None),
            }
        }
        Ok(None)
    }

    fn constant(&self, index: u32, frame: &Frame<'_>) -> Result<Value> {
        match self.constants.get(index) {
            Some(Constant::Int(v)) => Ok(Value::Int(*v)),
            Some(Constant::Float32(v)) => Ok(Value::Float(*v)),
            Some(Constant::Float64(v)) => Ok(Value::Double(*v)),
            Some(Constant::String(s)) => Ok(Value::str(s)),
            _ => Err(VmError::BadCode(frame.offset)),
        }
    }

    fn hash(&self, index: u16, frame: &Frame<'_>) -> Result<TypeHash> {
        self.constants
            .hash_at(index as u32)
            .ok_or(VmError::BadCode(frame.offset))
    }

    fn returns_value(&self, hash: TypeHash) -> bool {
        self.registry
            .function_by_hash(hash)
            .is_some_and(|f| f.return_type != primitives::VOID)
    }

    fn call_native(&mut self, hash: TypeHash, args: &[Value]) -> Result<Value> {
        let native = self
            .natives
            .get_mut(&hash)
            .ok_or(VmError::UnboundNative(hash))?;
        Ok(native(args))
    }

    /// A bound native wins; otherwise arguments fill fields in order.
    fn construct(&mut self, constructor: TypeHash, args: Vec<Value>, frame: &Frame<'_>) -> Result<Value> {
        if let Some((NullableMethod::Construct, _)) = self.registry.nullable_method(constructor) {
            let value = args
                .into_iter()
                .next()
                .ok_or(VmError::StackUnderflow(frame.offset))?;
            return Ok(Value::some(value));
        }
        if self.natives.contains_key(&constructor) {
            return self.call_native(constructor, &args);
        }

        let owner = self
            .registry
            .function_by_hash(constructor)
            .and_then(|f| f.owner)
            .ok_or(VmError::UnboundNative(constructor))?;
        let mut fields = match self.default_of(owner) {
            Value::Struct(fields) => fields,
            _ => self
                .registry
                .get(owner)
                .map(|def| def.fields.iter().map(|f| self.default_of(f.ty)).collect())
                .unwrap_or_default(),
        };
        for (field, arg) in fields.iter_mut().zip(args) {
            *field = arg;
        }
        Ok(match self.registry.kind(owner) {
            Some(TypeKind::Value) => Value::Struct(fields),
            _ => Value::object(fields),
        })
    }
}
