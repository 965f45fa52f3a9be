//! Branch targets.
//!
//! Lowering only branches forward: a label is defined, branched to any number
//! of times, then marked once at the instruction it names. Every branch
//! operand is recorded as a fixup and patched when the label is marked.

use sharplower_core::CodegenFault;

/// A branch target handed out by [`LabelTable::define`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) u32);

impl Label {
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Default)]
struct LabelState {
    target: Option<usize>,
    /// Offsets of u16 operands waiting for this label.
    fixups: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct LabelTable {
    labels: Vec<LabelState>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self) -> Label {
        self.labels.push(LabelState::default());
        Label(self.labels.len() as u32 - 1)
    }

    /// Record a branch operand at `operand_offset` that targets `label`.
    pub fn add_fixup(&mut self, label: Label, operand_offset: usize) -> Result<(), CodegenFault> {
        let state = self.state_mut(label)?;
        if state.target.is_some() {
            return Err(CodegenFault::BackwardBranch { label: label.0 });
        }
        state.fixups.push(operand_offset);
        Ok(())
    }

    /// Mark `label` at `offset`, returning the operands to patch.
    pub fn mark(&mut self, label: Label, offset: usize) -> Result<Vec<usize>, CodegenFault> {
        let state = self.state_mut(label)?;
        if state.target.is_some() {
            return Err(CodegenFault::LabelMarkedTwice { label: label.0 });
        }
        state.target = Some(offset);
        Ok(std::mem::take(&mut state.fixups))
    }

    pub fn target(&self, label: Label) -> Option<usize> {
        self.labels.get(label.0 as usize).and_then(|s| s.target)
    }

    /// Fails on the first label that was branched to but never marked.
    pub fn verify(&self) -> Result<(), CodegenFault> {
        match self
            .labels
            .iter()
            .position(|s| s.target.is_none() && !s.fixups.is_empty())
        {
            Some(index) => Err(CodegenFault::UnmarkedLabel {
                label: index as u32,
            }),
            None => Ok(()),
        }
    }

    fn state_mut(&mut self, label: Label) -> Result<&mut LabelState, CodegenFault> {
        self.labels
            .get_mut(label.0 as usize)
            .ok_or_else(|| CodegenFault::invalid(format!("unknown label {}", label.0)))
    }
}
