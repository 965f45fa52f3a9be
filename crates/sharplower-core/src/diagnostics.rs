//! Accumulating diagnostic reporter.
//!
//! User diagnostics never abort compilation on their own: resolution reports
//! into a shared [`Diagnostics`] and keeps going, so one pass surfaces every
//! independent error. Each entry is the tuple `(code, severity, span, message)`.

use std::fmt;

use crate::error::{CodegenFault, CompilationError};
use crate::Span;

/// Numeric code identifying a kind of diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiagnosticCode(pub u16);

impl DiagnosticCode {
    pub const OPERATOR_NOT_APPLICABLE: DiagnosticCode = DiagnosticCode(19);
    pub const CANNOT_INDEX: DiagnosticCode = DiagnosticCode(21);
    pub const UNARY_OPERATOR_NOT_APPLICABLE: DiagnosticCode = DiagnosticCode(23);
    pub const CANNOT_IMPLICITLY_CONVERT: DiagnosticCode = DiagnosticCode(29);
    pub const CANNOT_CONVERT: DiagnosticCode = DiagnosticCode(30);
    pub const EVENT_MISUSE: DiagnosticCode = DiagnosticCode(70);
    pub const UNKNOWN_NAME: DiagnosticCode = DiagnosticCode(103);
    pub const UNKNOWN_MEMBER: DiagnosticCode = DiagnosticCode(117);
    pub const REDECLARATION: DiagnosticCode = DiagnosticCode(128);
    pub const NOT_ASSIGNABLE: DiagnosticCode = DiagnosticCode(131);
    pub const WRITE_ONLY: DiagnosticCode = DiagnosticCode(154);
    pub const READ_ONLY: DiagnosticCode = DiagnosticCode(191);
    pub const NULLABLE_LOGICAL_OPERATOR: DiagnosticCode = DiagnosticCode(217);
    pub const UNKNOWN_TYPE: DiagnosticCode = DiagnosticCode(246);
    /// Ordering comparison against `null` is always false.
    pub const NULL_COMPARISON_ALWAYS_FALSE: DiagnosticCode = DiagnosticCode(464);
    /// Value type compared with `null` folds to a constant.
    pub const VALUE_TYPE_NULL_COMPARISON: DiagnosticCode = DiagnosticCode(472);
    pub const METHOD_GROUP_VALUE: DiagnosticCode = DiagnosticCode(428);
    pub const INTERNAL_ERROR: DiagnosticCode = DiagnosticCode(584);
    pub const ARGUMENT_COUNT: DiagnosticCode = DiagnosticCode(1501);
    pub const METHOD_GROUP_ASSIGN: DiagnosticCode = DiagnosticCode(1656);
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SL{:04}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

/// A single reported message.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub span: Span,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {}: {}",
            self.span, self.severity, self.code, self.message
        )
    }
}

/// Shared reporter for a compilation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    error_count: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.error_count += 1;
        }
        self.entries.push(diagnostic);
    }

    /// Report a user error.
    pub fn error(&mut self, error: CompilationError) {
        self.report(Diagnostic {
            code: error.code(),
            severity: Severity::Error,
            span: error.span(),
            message: error.to_string(),
        });
    }

    pub fn warning(&mut self, code: DiagnosticCode, span: Span, message: impl Into<String>) {
        self.report(Diagnostic {
            code,
            severity: Severity::Warning,
            span,
            message: message.into(),
        });
    }

    /// Report an internal fault against the member at `span`.
    pub fn internal(&mut self, fault: &CodegenFault, span: Span) {
        self.report(Diagnostic {
            code: DiagnosticCode::INTERNAL_ERROR,
            severity: Severity::Error,
            span,
            message: format!("internal compiler error: {fault}"),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Whether any diagnostic carries `code`.
    pub fn contains(&self, code: DiagnosticCode) -> bool {
        self.entries.iter().any(|d| d.code == code)
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.entries {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_counted_and_warnings_are_not() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warning(
            DiagnosticCode::VALUE_TYPE_NULL_COMPARISON,
            Span::point(1, 1),
            "always false",
        );
        assert!(!diagnostics.has_errors());

        diagnostics.error(CompilationError::NotAssignable {
            span: Span::point(2, 3),
        });
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(diagnostics.warning_count(), 1);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.contains(DiagnosticCode::NOT_ASSIGNABLE));
    }

    #[test]
    fn internal_faults_become_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.internal(&CodegenFault::UnmarkedLabel { label: 2 }, Span::point(7, 1));

        let reported = diagnostics.errors().next().unwrap();
        assert_eq!(reported.code, DiagnosticCode::INTERNAL_ERROR);
        assert!(reported.message.starts_with("internal compiler error"));
    }

    #[test]
    fn display_lists_every_entry() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warning(DiagnosticCode(464), Span::point(3, 8), "always false");
        assert_eq!(
            diagnostics.to_string(),
            "3:8: warning SL0464: always false\n"
        );
    }
}
