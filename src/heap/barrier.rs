//! Incremental marking state
//!
//! While an incremental mark is in progress the mutator must report any
//! reference it hands out, otherwise the collector could miss an edge from
//! an already scanned cell. The barrier marks the referent and queues it so
//! the collector scans its children when the mark finishes.

use super::cell::CellId;

/// Phase of the (simulated) incremental collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GcPhase {
    #[default]
    Idle,
    /// Incremental marking in progress; reference barriers are required
    Marking,
}

/// Barrier bookkeeping owned by the heap
#[derive(Debug, Default)]
pub struct IncrementalState {
    phase: GcPhase,
    /// Cells marked by a barrier whose children are not yet scanned
    mark_stack: Vec<CellId>,
    barriers_fired: usize,
}

impl IncrementalState {
    #[inline]
    pub fn phase(&self) -> GcPhase {
        self.phase
    }

    #[inline]
    pub fn is_marking(&self) -> bool {
        self.phase == GcPhase::Marking
    }

    pub(crate) fn begin(&mut self) {
        self.phase = GcPhase::Marking;
        self.mark_stack.clear();
    }

    pub(crate) fn end(&mut self) {
        self.phase = GcPhase::Idle;
    }

    /// Count a barrier invocation; `newly_marked` cells still need scanning
    pub(crate) fn record_barrier(&mut self, cell: CellId, newly_marked: bool) {
        self.barriers_fired += 1;
        if newly_marked {
            self.mark_stack.push(cell);
        }
    }

    pub(crate) fn pop_marked(&mut self) -> Option<CellId> {
        self.mark_stack.pop()
    }

    #[inline]
    pub fn barriers_fired(&self) -> usize {
        self.barriers_fired
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.mark_stack.len()
    }
}
