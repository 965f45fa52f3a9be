//! Local scope management for function compilation.
//!
//! `LocalScope` tracks the locals of one member body: declaration with slot
//! allocation, nested block scopes, and shadowing with restoration on exit.
//! Slots are never reused, so the slot count after resolution is the size of
//! the body's local table; temporaries are allocated after it.

use rustc_hash::FxHashMap;
use sharplower_core::{CompilationError, Span, TypeHash};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct LocalVar {
    pub name: String,
    pub ty: TypeHash,
    pub slot: u32,
    /// Scope depth where declared
    pub depth: u32,
    pub span: Span,
}

// ============================================================================
// LocalScope
// ============================================================================

#[derive(Debug, Default)]
pub struct LocalScope {
    /// Variables by name in current scope chain
    variables: FxHashMap<String, LocalVar>,
    /// Current scope depth (0 = function scope)
    depth: u32,
    /// `(shadowing_depth, name, old_var)`
    shadowed: Vec<(u32, String, LocalVar)>,
    /// Type of every slot handed out, in slot order
    slots: Vec<TypeHash>,
}

impl LocalScope {
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Scope Management
    // ==========================================================================

    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Exit the current scope, removing variables declared in it.
    pub fn pop_scope(&mut self) {
        let depth = self.depth;
        self.variables.retain(|_, var| var.depth < depth);

        while self
            .shadowed
            .last()
            .is_some_and(|(shadowing_depth, _, _)| *shadowing_depth == depth)
        {
            if let Some((_, name, var)) = self.shadowed.pop() {
                self.variables.insert(name, var);
            }
        }

        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    // ==========================================================================
    // Variables
    // ==========================================================================

    /// Declare a local, returning its slot.
    pub fn declare(&mut self, name: &str, ty: TypeHash, span: Span) -> Result<u32, CompilationError> {
        if let Some(existing) = self.variables.get(name) {
            if existing.depth == self.depth {
                return Err(CompilationError::VariableRedeclaration {
                    name: name.to_string(),
                    span,
                });
            }
            self.shadowed
                .push((self.depth, name.to_string(), existing.clone()));
        }

        let slot = self.slots.len() as u32;
        self.slots.push(ty);
        self.variables.insert(
            name.to_string(),
            LocalVar {
                name: name.to_string(),
                ty,
                slot,
                depth: self.depth,
                span,
            },
        );
        Ok(slot)
    }

    pub fn lookup(&self, name: &str) -> Option<&LocalVar> {
        self.variables.get(name)
    }

    /// Types of all slots declared so far, in slot order.
    pub fn slot_types(&self) -> &[TypeHash] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharplower_core::primitives;

    #[test]
    fn slots_are_allocated_in_order() {
        let mut scope = LocalScope::new();
        assert_eq!(scope.declare("a", primitives::INT32, Span::default()), Ok(0));
        assert_eq!(scope.declare("b", primitives::BOOL, Span::default()), Ok(1));
        assert_eq!(scope.lookup("b").unwrap().ty, primitives::BOOL);
        assert_eq!(scope.slot_types(), &[primitives::INT32, primitives::BOOL]);
    }

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let mut scope = LocalScope::new();
        scope.declare("x", primitives::INT32, Span::default()).unwrap();
        let err = scope
            .declare("x", primitives::INT32, Span::point(2, 1))
            .unwrap_err();
        assert!(matches!(err, CompilationError::VariableRedeclaration { .. }));
    }

    #[test]
    fn shadowing_is_restored_on_exit() {
        let mut scope = LocalScope::new();
        scope.declare("x", primitives::INT32, Span::default()).unwrap();
        scope.push_scope();
        let inner = scope.declare("x", primitives::DOUBLE, Span::default()).unwrap();
        assert_eq!(scope.lookup("x").unwrap().slot, inner);
        scope.pop_scope();

        let outer = scope.lookup("x").unwrap();
        assert_eq!(outer.slot, 0);
        assert_eq!(outer.ty, primitives::INT32);
        assert_eq!(scope.slot_types().len(), 2);
    }
}
