//! Natives holding managed-heap things
//!
//! Holders the cycle collector already proved live can skip graph building:
//! everything they hold is unmarked up front so it never shows up gray.

use super::{unmark_gray, GrayMarking};
use crate::heap::GcThing;
use crate::logging::debug;
use crate::native::{CcState, NativeId, NativeRef};
use dashmap::DashMap;
use smallvec::SmallVec;

/// A native and the managed things it keeps alive
#[derive(Debug)]
pub struct Holder {
    pub native: NativeRef,
    pub things: SmallVec<[GcThing; 4]>,
}

/// Registry of holders, keyed by native identity
#[derive(Debug, Default)]
pub struct HolderRegistry {
    holders: DashMap<NativeId, Holder>,
}

impl HolderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `native` holds `thing`
    pub fn hold(&self, native: &NativeRef, thing: GcThing) {
        self.holders
            .entry(native.id())
            .or_insert_with(|| Holder {
                native: native.clone(),
                things: SmallVec::new(),
            })
            .things
            .push(thing);
    }

    /// Forget everything `native` holds
    pub fn release(&self, native: NativeId) -> bool {
        self.holders.remove(&native).is_some()
    }

    pub fn things_held_by(&self, native: NativeId) -> usize {
        self.holders.get(&native).map_or(0, |holder| holder.things.len())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Unmark everything held by holders known to be live
    ///
    /// Returns how many holders were skipped this way.
    pub fn unmark_skippable_holders<G>(&self, heap: &mut G) -> usize
    where
        G: GrayMarking + ?Sized,
    {
        let mut skipped = 0;
        for holder in self.holders.iter() {
            if holder.native.cc_state() != CcState::KnownLive {
                continue;
            }
            for &thing in &holder.things {
                unmark_gray(heap, Some(thing));
            }
            skipped += 1;
        }
        debug!(target: "gray", skipped, total = self.holders.len(), "skippable holders unmarked");
        skipped
    }
}
