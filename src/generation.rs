//! Variant generation tagging
//!
//! The cycle collector stamps every variant it visits with the generation of
//! the current pass. Generations are compared, never subtracted, and the
//! counter is owned by the collection driver rather than shared globally.

use crate::gray::mark_reachable_in_generation;
use crate::heap::Heap;
use crate::logging::{log_pass_begin, trace};
use crate::native::NativeRef;
use core::num::NonZeroU64;

/// Collection pass number, strictly increasing within a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(NonZeroU64);

impl Generation {
    /// First generation handed out by a fresh counter
    pub const FIRST: Self = Self(NonZeroU64::MIN);

    /// Generation from a raw pass number; zero is not a valid generation
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw pass number read back from a variant; never zero
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl core::fmt::Display for Generation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Source of generations for one collection driver
#[derive(Debug, Default)]
pub struct GenerationCounter {
    last: u64,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new pass
    ///
    /// Saturates at `u64::MAX` instead of wrapping; a counter that reached
    /// the ceiling keeps returning it.
    pub fn next_pass(&mut self) -> Generation {
        self.last = self.last.saturating_add(1);
        let generation = Generation::from_raw(self.last);
        log_pass_begin(generation.get());
        generation
    }

    /// Generation of the most recent pass, if any pass began
    pub fn current(&self) -> Option<Generation> {
        Generation::new(self.last)
    }
}

/// Stamp `holder` with `generation` if it is a variant, unmarking the object
/// it carries; other natives are left alone
pub fn mark_in_generation(heap: &mut Heap, holder: &NativeRef, generation: Generation) {
    if let Some(variant) = holder.as_variant() {
        mark_reachable_in_generation(heap, variant, generation);
    }
}

/// Driver state for one cycle-collection pass
#[derive(Debug, Clone, Copy)]
pub struct CollectionPass {
    generation: Generation,
}

impl CollectionPass {
    pub fn begin(counter: &mut GenerationCounter) -> Self {
        Self {
            generation: counter.next_pass(),
        }
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Account for `holder` in this pass
    ///
    /// Returns false when a variant holder was already stamped with this
    /// pass's generation. Non-variant holders are always reported as new.
    pub fn visit_holder(&self, heap: &mut Heap, holder: &NativeRef) -> bool {
        let seen = holder
            .as_variant()
            .and_then(|variant| variant.generation())
            .is_some_and(|stamped| stamped == self.generation);
        if seen {
            trace!(target: "generation", native = %holder.id(), "holder already visited");
            return false;
        }
        mark_in_generation(heap, holder, self.generation);
        true
    }
}
