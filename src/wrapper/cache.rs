//! Per-native wrapper cache and lookup

use super::classify::{classify, WrapperKind};
use super::handout::{DefaultHandOutPolicy, HandOutPolicy};
use crate::heap::{CellId, DomainId, Heap};
use crate::logging::{log_cache_miss, trace};
use crate::native::NativeRef;
use smallvec::SmallVec;

/// Weak reference from a native to its wrapper in one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub domain: DomainId,
    pub wrapper: CellId,
}

/// Wrapper cache owned by a native object
///
/// Entries are weak: a reclaimed wrapper reads as empty through its stale
/// `CellId` until finalization removes the entry.
#[derive(Debug, Default)]
pub struct WrapperCache {
    entries: SmallVec<[CacheEntry; 2]>,
    dom_binding: bool,
}

impl WrapperCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_dom_binding(&mut self, dom_binding: bool) {
        self.dom_binding = dom_binding;
    }

    /// DOM-binding caches never hold lightweight wrappers
    #[inline]
    pub fn is_dom_binding(&self) -> bool {
        self.dom_binding
    }

    pub fn get(&self, domain: DomainId) -> Option<CellId> {
        self.entries
            .iter()
            .find(|entry| entry.domain == domain)
            .map(|entry| entry.wrapper)
    }

    /// Record `wrapper` as the wrapper for `domain`, replacing any entry
    pub(crate) fn record(&mut self, domain: DomainId, wrapper: CellId) {
        match self.entries.iter_mut().find(|entry| entry.domain == domain) {
            Some(entry) => entry.wrapper = wrapper,
            None => self.entries.push(CacheEntry { domain, wrapper }),
        }
    }

    /// Remove the entry for `domain` if it still names `wrapper`
    pub(crate) fn forget(&mut self, domain: DomainId, wrapper: CellId) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !(entry.domain == domain && entry.wrapper == wrapper));
        self.entries.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }
}

/// Cached wrapper of `native` in `domain` that is safe to hand out
pub fn lookup(heap: &Heap, native: &NativeRef, domain: DomainId) -> Option<CellId> {
    lookup_with(heap, native, domain, &DefaultHandOutPolicy)
}

/// `lookup` with an explicit ok-to-hand-out policy
///
/// Never creates a wrapper, changes a color or stamps a generation. The
/// cache lock is released before the policy runs.
pub fn lookup_with(
    heap: &Heap,
    native: &NativeRef,
    domain: DomainId,
    policy: &dyn HandOutPolicy,
) -> Option<CellId> {
    let (cached, dom_binding) = {
        let cache = native.wrapper_cache();
        (cache.get(domain), cache.is_dom_binding())
    };

    let Some(wrapper) = cached else {
        log_cache_miss(native.id(), domain, "no wrapper cached");
        return None;
    };

    let Some(cell) = heap.get(wrapper) else {
        log_cache_miss(native.id(), domain, "wrapper reclaimed");
        return None;
    };

    if cell.domain() != domain {
        log_cache_miss(native.id(), domain, "wrapper lives in another domain");
        return None;
    }

    if !cell.class().is_wrapper_class() {
        log_cache_miss(native.id(), domain, "cached cell is not a wrapper");
        return None;
    }

    match classify(heap, wrapper) {
        WrapperKind::Lightweight => {}
        WrapperKind::Heavyweight => {
            if !dom_binding && !policy.ok_to_hand_out(heap, native, wrapper) {
                log_cache_miss(native.id(), domain, "heavyweight wrapper not ok to hand out");
                return None;
            }
        }
    }

    trace!(target: "cache", native = %native.id(), domain = %domain, wrapper = %wrapper, "cache hit");
    Some(wrapper)
}
