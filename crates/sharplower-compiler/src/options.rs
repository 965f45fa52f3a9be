//! Compiler configuration.

/// Knobs that change what the compiler accepts or reports.
///
/// ```
/// use sharplower_compiler::CompilerOptions;
///
/// let options = CompilerOptions::default().with_warning_level(1);
/// assert!(options.fold_value_type_null_comparisons);
/// assert!(!options.reports_warning(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Comparing a non-nullable value type with `null` folds to a constant
    /// with a warning. When off, the comparison is an error.
    pub fold_value_type_null_comparisons: bool,
    /// Warnings above this level are not reported.
    pub warning_level: u8,
    /// Record source lines in the chunk's line table.
    pub emit_line_info: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            fold_value_type_null_comparisons: true,
            warning_level: 4,
            emit_line_info: true,
        }
    }
}

impl CompilerOptions {
    pub fn with_null_comparison_folding(mut self, enabled: bool) -> Self {
        self.fold_value_type_null_comparisons = enabled;
        self
    }

    pub fn with_warning_level(mut self, level: u8) -> Self {
        self.warning_level = level;
        self
    }

    pub fn with_line_info(mut self, enabled: bool) -> Self {
        self.emit_line_info = enabled;
        self
    }

    pub fn reports_warning(&self, level: u8) -> bool {
        level <= self.warning_level
    }
}
