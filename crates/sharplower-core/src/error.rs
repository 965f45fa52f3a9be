//! Error types.
//!
//! Two families with different propagation rules:
//!
//! ```text
//! CompilationError  - user-facing, recoverable; accumulated in `Diagnostics`
//! CodegenFault      - internal consistency fault; aborts the current member
//! ```
//!
//! A `CompilationError` means the input is wrong. A `CodegenFault` means the
//! lowering itself is wrong (a temporary read before it was written, a label
//! never marked). Faults are never shown as ordinary errors; the member-level
//! caller turns them into a single internal-error diagnostic and drops the
//! member's body.

use thiserror::Error;

use crate::Span;
use crate::diagnostics::DiagnosticCode;

// ============================================================================
// User diagnostics
// ============================================================================

/// Errors reported against the user's source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilationError {
    /// No operator accepts the operand types. `right` is empty for unary operators.
    #[error("at {span}: operator '{op}' cannot be applied to {}", operand_list(.left, .right))]
    OperatorNotApplicable {
        op: String,
        left: String,
        right: String,
        span: Span,
    },

    /// No conversion exists at all, even explicitly.
    #[error("at {span}: cannot convert type '{from}' to '{to}'")]
    CannotConvert { from: String, to: String, span: Span },

    /// Only an explicit conversion exists.
    #[error("at {span}: cannot implicitly convert type '{from}' to '{to}'; an explicit conversion exists")]
    CannotImplicitlyConvert { from: String, to: String, span: Span },

    #[error(
        "at {span}: the left-hand side of an assignment must be a variable, a property or an indexer"
    )]
    NotAssignable { span: Span },

    #[error("at {span}: cannot assign to '{name}' because it is a method group")]
    MethodGroupAssignment { name: String, span: Span },

    /// A method name used where a value is required.
    #[error("at {span}: '{name}' is a method but is used like a value")]
    MethodGroupValue { name: String, span: Span },

    #[error("at {span}: the event '{name}' can only appear on the left hand side of += or -=")]
    EventMisuse { name: String, span: Span },

    /// `&&` or `||` with a nullable operand.
    #[error("at {span}: operator '{op}' cannot be applied to nullable operands of type '{ty}'")]
    NullableLogicalOperator { op: String, ty: String, span: Span },

    #[error("at {span}: the name '{name}' does not exist in the current context")]
    UnknownIdentifier { name: String, span: Span },

    #[error("at {span}: '{owner}' does not contain a definition for '{name}'")]
    UnknownMember {
        owner: String,
        name: String,
        span: Span,
    },

    #[error("at {span}: the type '{name}' could not be found")]
    UnknownType { name: String, span: Span },

    #[error("at {span}: the function '{name}' could not be found")]
    UnknownFunction { name: String, span: Span },

    #[error("at {span}: '{name}' takes {expected} argument(s) but {found} were supplied")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("at {span}: '{name}' cannot be assigned to because it is read only")]
    ReadOnly { name: String, span: Span },

    #[error("at {span}: the property '{name}' cannot be read because it lacks a getter")]
    WriteOnly { name: String, span: Span },

    #[error("at {span}: cannot apply indexing to an expression of type '{ty}'")]
    CannotApplyIndexing { ty: String, span: Span },

    #[error("at {span}: a local variable named '{name}' is already defined in this scope")]
    VariableRedeclaration { name: String, span: Span },
}

fn operand_list(left: &str, right: &str) -> String {
    if right.is_empty() {
        format!("operand of type '{left}'")
    } else {
        format!("operands of type '{left}' and '{right}'")
    }
}

impl CompilationError {
    pub fn span(&self) -> Span {
        match self {
            CompilationError::OperatorNotApplicable { span, .. } => *span,
            CompilationError::CannotConvert { span, .. } => *span,
            CompilationError::CannotImplicitlyConvert { span, .. } => *span,
            CompilationError::NotAssignable { span } => *span,
            CompilationError::MethodGroupAssignment { span, .. } => *span,
            CompilationError::MethodGroupValue { span, .. } => *span,
            CompilationError::EventMisuse { span, .. } => *span,
            CompilationError::NullableLogicalOperator { span, .. } => *span,
            CompilationError::UnknownIdentifier { span, .. } => *span,
            CompilationError::UnknownMember { span, .. } => *span,
            CompilationError::UnknownType { span, .. } => *span,
            CompilationError::UnknownFunction { span, .. } => *span,
            CompilationError::ArgumentCount { span, .. } => *span,
            CompilationError::ReadOnly { span, .. } => *span,
            CompilationError::WriteOnly { span, .. } => *span,
            CompilationError::CannotApplyIndexing { span, .. } => *span,
            CompilationError::VariableRedeclaration { span, .. } => *span,
        }
    }

    /// Stable diagnostic code for this error.
    pub fn code(&self) -> DiagnosticCode {
        match self {
            CompilationError::OperatorNotApplicable { right, .. } if right.is_empty() => {
                DiagnosticCode::UNARY_OPERATOR_NOT_APPLICABLE
            }
            CompilationError::OperatorNotApplicable { .. } => {
                DiagnosticCode::OPERATOR_NOT_APPLICABLE
            }
            CompilationError::CannotConvert { .. } => DiagnosticCode::CANNOT_CONVERT,
            CompilationError::CannotImplicitlyConvert { .. } => {
                DiagnosticCode::CANNOT_IMPLICITLY_CONVERT
            }
            CompilationError::NotAssignable { .. } => DiagnosticCode::NOT_ASSIGNABLE,
            CompilationError::MethodGroupAssignment { .. } => DiagnosticCode::METHOD_GROUP_ASSIGN,
            CompilationError::MethodGroupValue { .. } => DiagnosticCode::METHOD_GROUP_VALUE,
            CompilationError::EventMisuse { .. } => DiagnosticCode::EVENT_MISUSE,
            CompilationError::NullableLogicalOperator { .. } => {
                DiagnosticCode::NULLABLE_LOGICAL_OPERATOR
            }
            CompilationError::UnknownIdentifier { .. } => DiagnosticCode::UNKNOWN_NAME,
            CompilationError::UnknownMember { .. } => DiagnosticCode::UNKNOWN_MEMBER,
            CompilationError::UnknownType { .. } => DiagnosticCode::UNKNOWN_TYPE,
            CompilationError::UnknownFunction { .. } => DiagnosticCode::UNKNOWN_NAME,
            CompilationError::ArgumentCount { .. } => DiagnosticCode::ARGUMENT_COUNT,
            CompilationError::ReadOnly { .. } => DiagnosticCode::READ_ONLY,
            CompilationError::WriteOnly { .. } => DiagnosticCode::WRITE_ONLY,
            CompilationError::CannotApplyIndexing { .. } => DiagnosticCode::CANNOT_INDEX,
            CompilationError::VariableRedeclaration { .. } => DiagnosticCode::REDECLARATION,
        }
    }
}

// ============================================================================
// Internal faults
// ============================================================================

/// An internal consistency fault raised while emitting code.
///
/// Every variant indicates a defect in lowering rather than bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenFault {
    #[error("temporary slot {slot} loaded before it was stored")]
    UnstoredTemporary { slot: u32 },

    #[error("temporary slot {slot} released twice")]
    DoubleRelease { slot: u32 },

    #[error("temporary slot {slot} used after release")]
    ReleasedTemporary { slot: u32 },

    #[error("{count} temporary slot(s) still live at end of body")]
    LeakedTemporaries { count: usize },

    #[error("nullable handle #{handle} used after its owning node finished emitting")]
    StaleHandle { handle: u32 },

    #[error("nullable handle #{handle} read before it was materialized")]
    UnmaterializedHandle { handle: u32 },

    #[error("label {label} referenced but never marked")]
    UnmarkedLabel { label: u32 },

    #[error("label {label} marked twice")]
    LabelMarkedTwice { label: u32 },

    #[error("branch to label {label} goes backwards")]
    BackwardBranch { label: u32 },

    #[error("branch distance {distance} exceeds 65535 bytes")]
    BranchTooFar { distance: usize },

    #[error("prepared assignment target was never read by its source")]
    UnconsumedPreparedTarget,

    #[error("invalid lowering state: {message}")]
    InvalidState { message: String },
}

impl CodegenFault {
    pub fn invalid(message: impl Into<String>) -> Self {
        CodegenFault::InvalidState {
            message: message.into(),
        }
    }
}
