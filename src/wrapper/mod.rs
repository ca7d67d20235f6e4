//! Wrappers - managed-heap proxies for native objects
//!
//! Two representations share one layout and are told apart only by the
//! wrapper multislot:
//! - Lightweight: the slot holds a number (the native's class tag) and the
//!   private slot holds the native itself
//! - Heavyweight: the slot holds the prototype record and the private slot
//!   holds a `WrappedNativeRecord`
//!
//! Every consumer goes through the classifier in `classify`; the cache in
//! `cache` keeps at most one wrapper per (native, domain) pair.

mod cache;
mod classify;
mod create;
mod handout;

#[cfg(test)]
mod tests;

pub use cache::{lookup, lookup_with, CacheEntry, WrapperCache};
pub use classify::{
    classify, decode, is_heavyweight_wrapper, is_heavyweight_wrapper_object,
    is_lightweight_wrapper, is_lightweight_wrapper_object, is_wrapper_class, WrapperKind,
    WrapperRepr,
};
pub use create::{expire_wrapper, get_or_wrap, wrap_native};
pub use handout::{DefaultHandOutPolicy, HandOutPolicy};

use crate::heap::{CellId, Heap, Private};
use crate::native::{InterfaceSet, NativeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordState {
    Live,
    /// Torn down by the native side; the wrapper must not be handed out
    Expired,
}

/// Intermediate record behind a heavyweight wrapper
#[derive(Debug)]
pub struct WrappedNativeRecord {
    native: NativeRef,
    proto: CellId,
    interfaces: InterfaceSet,
    state: RecordState,
}

impl WrappedNativeRecord {
    pub(crate) fn new(native: NativeRef, proto: CellId) -> Self {
        let interfaces = native.interfaces().clone();
        Self {
            native,
            proto,
            interfaces,
            state: RecordState::Live,
        }
    }

    #[inline]
    pub fn native(&self) -> &NativeRef {
        &self.native
    }

    /// Prototype record cell
    #[inline]
    pub fn proto(&self) -> CellId {
        self.proto
    }

    #[inline]
    pub fn interfaces(&self) -> &InterfaceSet {
        &self.interfaces
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.state == RecordState::Live
    }

    pub(crate) fn expire(&mut self) {
        self.state = RecordState::Expired;
    }

    pub(crate) fn set_proto(&mut self, proto: CellId) {
        self.proto = proto;
    }

    pub(crate) fn into_native(self: Box<Self>) -> NativeRef {
        self.native
    }
}

/// Native behind a wrapper handle, following forwarders and outer proxies
pub fn native_of(heap: &Heap, handle: CellId) -> Option<&NativeRef> {
    let target = heap.resolve(handle)?;
    match decode(heap, target)? {
        WrapperRepr::Lightweight { native } => Some(native),
        WrapperRepr::Heavyweight { record, .. } => Some(record.native()),
    }
}

/// Interfaces a wrapper handle exposes, following forwarders and outer proxies
///
/// Heavyweight wrappers expose what their prototype record carries, which
/// lives in the wrapper's own domain.
pub fn interfaces_of(heap: &Heap, handle: CellId) -> Option<&InterfaceSet> {
    let target = heap.resolve(handle)?;
    match decode(heap, target)? {
        WrapperRepr::Lightweight { native } => Some(native.interfaces()),
        WrapperRepr::Heavyweight { proto, record } => match heap.get(proto).map(|c| c.private()) {
            Some(Private::Interfaces(set)) => Some(set),
            _ => Some(record.interfaces()),
        },
    }
}
