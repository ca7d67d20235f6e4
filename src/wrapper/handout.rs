//! Ok-to-hand-out predicate for heavyweight wrappers

use crate::heap::{CellId, Heap, Private};
use crate::native::{CcState, NativeObject};

/// Decides whether a cached heavyweight wrapper may be returned
///
/// Owned by the native object model. Lightweight wrappers and wrappers in a
/// DOM-binding cache never consult it.
pub trait HandOutPolicy {
    fn ok_to_hand_out(&self, heap: &Heap, native: &NativeObject, wrapper: CellId) -> bool;
}

/// Hands out a heavyweight wrapper while its record is live and the native
/// is not being unlinked by the cycle collector
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandOutPolicy;

impl HandOutPolicy for DefaultHandOutPolicy {
    fn ok_to_hand_out(&self, heap: &Heap, native: &NativeObject, wrapper: CellId) -> bool {
        let record_live = matches!(
            heap.get(wrapper).map(|cell| cell.private()),
            Some(Private::Record(record)) if record.is_valid()
        );
        record_live && native.cc_state() != CcState::Unlinked
    }
}

impl<F> HandOutPolicy for F
where
    F: Fn(&Heap, &NativeObject, CellId) -> bool,
{
    fn ok_to_hand_out(&self, heap: &Heap, native: &NativeObject, wrapper: CellId) -> bool {
        self(heap, native, wrapper)
    }
}
