//! Resolved expression tree.
//!
//! Resolution consumes an [`ast::Expr`](crate::ast::Expr) and builds a fresh
//! [`Node`]: every name bound, every type known, every implicit conversion
//! explicit. Lowering walks this tree exactly once.
//!
//! Nullable operands are bound to a [`NullableHandle`] by the node that owns
//! them. The handle's source is evaluated once when the owner starts emitting;
//! nodes inside the owner read it back through [`NodeKind::Read`] by
//! [`HandleId`].

use sharplower_core::{Span, TypeHash, primitives};

use crate::ast::BinaryOp;
use crate::bytecode::OpCode;
use crate::registry::NullableInfo;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub ty: TypeHash,
    pub span: Span,
}

/// Identity of a bound handle within one member body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    /// Any integral type; the node's type says which.
    Int(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

/// How a [`NodeKind::Read`] accesses its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleAccess {
    /// `get_HasValue`
    HasValue,
    /// `get_Value`; fails on an empty nullable.
    Value,
    /// `GetValueOrDefault`; no check.
    ValueOrDefault,
    /// The stored value itself.
    Raw,
    /// Address of the temporary holding the value.
    Address,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Constant(ConstValue),
    /// The `null` literal, or `null` converted to a reference type.
    Null,

    // Storage
    Local(u32),
    /// Address of a local, used as the receiver of a value-type member.
    LocalAddress(u32),
    Global(TypeHash),
    Field {
        receiver: Box<Node>,
        index: u16,
    },
    Property {
        receiver: Box<Node>,
        getter: Option<TypeHash>,
        setter: Option<TypeHash>,
    },
    Element {
        array: Box<Node>,
        index: Box<Node>,
    },

    // Calls and construction
    Call {
        function: TypeHash,
        args: Vec<Node>,
    },
    MethodCall {
        receiver: Box<Node>,
        method: TypeHash,
        args: Vec<Node>,
    },
    /// `None` zero-initializes a value type.
    New {
        constructor: Option<TypeHash>,
        args: Vec<Node>,
    },
    /// Construct directly into a local's storage.
    ConstructInto {
        slot: u32,
        constructor: Option<TypeHash>,
        args: Vec<Node>,
    },

    // Operators
    Binary {
        opcode: OpCode,
        negate: bool,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// `&&` / `||` over plain booleans.
    ShortCircuit {
        is_and: bool,
        left: Box<Node>,
        right: Box<Node>,
    },
    Unary {
        opcode: Option<OpCode>,
        operand: Box<Node>,
    },
    Convert {
        ops: Vec<OpCode>,
        operand: Box<Node>,
    },
    UserConversion {
        function: TypeHash,
        operand: Box<Node>,
    },
    /// Evaluate `effect` for its side effects, then produce `value`.
    Comma {
        effect: Box<Node>,
        value: Box<Node>,
    },

    // Assignment
    Assign(Box<Assignment>),
    /// Placeholder for the target's pre-assignment value inside a compound
    /// assignment's source. `leave_copy` keeps that value as the result
    /// (postfix `++`/`--`).
    CurrentValue {
        leave_copy: bool,
    },
    /// `obj.Event += handler` / `-=`.
    EventAccessor {
        receiver: Box<Node>,
        accessor: TypeHash,
        handler: Box<Node>,
    },

    // Nullable wrapper
    /// `new T?(operand)`
    Wrap {
        operand: Box<Node>,
        info: NullableInfo,
    },
    /// The empty instance of a nullable type.
    LiftedNull(NullableInfo),
    /// `handle.HasValue`, negated for `x == null`.
    HasValue {
        handle: NullableHandle,
        negate: bool,
    },
    /// `handle.Value`
    UnwrapValue(NullableHandle),
    /// Read a handle bound by an enclosing node.
    Read {
        handle: HandleId,
        access: HandleAccess,
    },
    Lifted(Box<Lifted>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Node,
    pub source: Node,
    /// Source reads the target through `CurrentValue`.
    pub compound: bool,
}

/// A nullable operand bound for single evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct NullableHandle {
    pub id: HandleId,
    pub source: Box<Node>,
    pub info: NullableInfo,
}

/// A plain operand of a lifted operator evaluated up front.
#[derive(Debug, Clone, PartialEq)]
pub struct Spill {
    pub id: HandleId,
    pub source: Box<Node>,
}

/// One operand of a lifted binary operator.
#[derive(Debug, Clone, PartialEq)]
pub enum LiftOperand {
    Nullable(NullableHandle),
    Spilled(Spill),
    /// Constants are read in place.
    Inline,
}

impl LiftOperand {
    pub fn handle(&self) -> Option<&NullableHandle> {
        match self {
            LiftOperand::Nullable(handle) => Some(handle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiftedShape {
    /// Result wraps into `result`; no value propagates as null.
    Arithmetic { result: NullableInfo },
    /// `==` / `!=`: two empty operands are equal.
    Equality { negate: bool },
    /// Ordering: any empty operand gives `false`.
    Comparison,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiftedBinary {
    pub op: BinaryOp,
    pub shape: LiftedShape,
    pub left: LiftOperand,
    pub right: LiftOperand,
    /// The unlifted operator over handle reads.
    pub underlying: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoalesceKind {
    /// `a` is nullable; `value` reads the handle when it has a value.
    Nullable { handle: NullableHandle, value: Node },
    /// `a` is a reference.
    Reference { left: Node },
}

/// Operators applied to nullable operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Lifted {
    Unary {
        operand: NullableHandle,
        underlying: Node,
        result: NullableInfo,
    },
    Conversion {
        operand: NullableHandle,
        underlying: Node,
        result: NullableInfo,
    },
    Binary(LiftedBinary),
    /// Three-valued `&` / `|` over `bool?`.
    Boolean {
        is_and: bool,
        left: NullableHandle,
        right: NullableHandle,
        result: NullableInfo,
    },
    Coalesce {
        kind: CoalesceKind,
        right: Node,
    },
    /// `++` / `--` on a nullable target. `updated` wraps the incremented
    /// value read through `handle`.
    Mutator {
        target: Node,
        handle: HandleId,
        info: NullableInfo,
        updated: Node,
        postfix: bool,
    },
}

impl Node {
    pub fn new(kind: NodeKind, ty: TypeHash, span: Span) -> Self {
        Self { kind, ty, span }
    }

    pub fn constant(value: ConstValue, ty: TypeHash, span: Span) -> Self {
        Self::new(NodeKind::Constant(value), ty, span)
    }

    pub fn bool(value: bool, span: Span) -> Self {
        Self::constant(ConstValue::Bool(value), primitives::BOOL, span)
    }

    pub fn read(handle: HandleId, access: HandleAccess, ty: TypeHash, span: Span) -> Self {
        Self::new(NodeKind::Read { handle, access }, ty, span)
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Null) && self.ty == primitives::NULL
    }

    pub fn const_value(&self) -> Option<&ConstValue> {
        match &self.kind {
            NodeKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Reading the node has no side effects and always gives the same value
    /// within one expression.
    pub fn is_pure(&self) -> bool {
        match &self.kind {
            NodeKind::Constant(_)
            | NodeKind::Null
            | NodeKind::Local(_)
            | NodeKind::Global(_)
            | NodeKind::Read { .. } => true,
            NodeKind::Field { receiver, .. } => receiver.is_pure(),
            NodeKind::Convert { operand, .. } => operand.is_pure(),
            _ => false,
        }
    }

    /// Structural equality of two pure expressions, ignoring spans.
    ///
    /// Calls, construction and anything else with side effects are never
    /// equal, even to themselves: two evaluations may differ.
    pub fn structurally_eq(&self, other: &Node) -> bool {
        if self.ty != other.ty {
            return false;
        }
        match (&self.kind, &other.kind) {
            (NodeKind::Constant(a), NodeKind::Constant(b)) => a == b,
            (NodeKind::Null, NodeKind::Null) => true,
            (NodeKind::Local(a), NodeKind::Local(b)) => a == b,
            (NodeKind::Global(a), NodeKind::Global(b)) => a == b,
            (
                NodeKind::Field {
                    receiver: ra,
                    index: ia,
                },
                NodeKind::Field {
                    receiver: rb,
                    index: ib,
                },
            ) => ia == ib && ra.structurally_eq(rb),
            (
                NodeKind::Element {
                    array: aa,
                    index: ia,
                },
                NodeKind::Element {
                    array: ab,
                    index: ib,
                },
            ) => aa.structurally_eq(ab) && ia.structurally_eq(ib),
            (
                NodeKind::Read {
                    handle: ha,
                    access: aa,
                },
                NodeKind::Read {
                    handle: hb,
                    access: ab,
                },
            ) => ha == hb && aa == ab,
            _ => false,
        }
    }
}

/// A resolved statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expr(Node),
    Return(Option<Node>, Span),
}
