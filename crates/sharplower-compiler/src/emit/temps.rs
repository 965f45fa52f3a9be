//! Temporary slot pool.
//!
//! Scratch locals for staging intermediate values. Released slots go onto a
//! per-type stack and are handed out again (LIFO) before any fresh slot is
//! allocated, so the number of temporaries tracks nesting depth rather than
//! body size.
//!
//! [`TempSlot`] is deliberately neither `Clone` nor `Copy`: releasing consumes
//! it, so a released slot cannot be used again through the same handle. The
//! pool additionally tracks per-slot state to catch loads before the first
//! store and double releases.

use log::debug;
use rustc_hash::FxHashMap;
use sharplower_core::{CodegenFault, TypeHash};

/// An acquired temporary. Must be handed back with `release`.
#[derive(Debug, PartialEq, Eq)]
pub struct TempSlot {
    slot: u32,
    ty: TypeHash,
}

impl TempSlot {
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn ty(&self) -> TypeHash {
        self.ty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Live { stored: bool },
    Free,
}

#[derive(Debug, Default)]
pub struct TemporaryPool {
    free: FxHashMap<TypeHash, Vec<u32>>,
    states: FxHashMap<u32, SlotState>,
    live: usize,
}

impl TemporaryPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse a released slot of `ty`, or take a fresh one from `allocate`.
    pub fn acquire(&mut self, ty: TypeHash, allocate: impl FnOnce() -> u32) -> TempSlot {
        let slot = match self.free.get_mut(&ty).and_then(Vec::pop) {
            Some(slot) => {
                debug!("reusing temporary slot {slot} for {ty}");
                slot
            }
            None => {
                let slot = allocate();
                debug!("allocated temporary slot {slot} for {ty}");
                slot
            }
        };
        self.states.insert(slot, SlotState::Live { stored: false });
        self.live += 1;
        TempSlot { slot, ty }
    }

    pub fn mark_stored(&mut self, temp: &TempSlot) -> Result<(), CodegenFault> {
        match self.states.get_mut(&temp.slot) {
            Some(SlotState::Live { stored }) => {
                *stored = true;
                Ok(())
            }
            _ => Err(CodegenFault::ReleasedTemporary { slot: temp.slot }),
        }
    }

    /// Fails unless the slot is live and has been stored into.
    pub fn check_loadable(&self, temp: &TempSlot) -> Result<(), CodegenFault> {
        match self.states.get(&temp.slot) {
            Some(SlotState::Live { stored: true }) => Ok(()),
            Some(SlotState::Live { stored: false }) => {
                Err(CodegenFault::UnstoredTemporary { slot: temp.slot })
            }
            _ => Err(CodegenFault::ReleasedTemporary { slot: temp.slot }),
        }
    }

    pub fn release(&mut self, temp: TempSlot) -> Result<(), CodegenFault> {
        self.release_slot(temp.slot, temp.ty)
    }

    fn release_slot(&mut self, slot: u32, ty: TypeHash) -> Result<(), CodegenFault> {
        match self.states.get_mut(&slot) {
            Some(state) if matches!(state, SlotState::Live { .. }) => {
                *state = SlotState::Free;
                self.live -= 1;
                self.free.entry(ty).or_default().push(slot);
                Ok(())
            }
            _ => Err(CodegenFault::DoubleRelease { slot }),
        }
    }

    /// Slots acquired and not yet released.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Distinct slots ever handed out.
    pub fn allocated_count(&self) -> usize {
        self.states.len()
    }
}
