//! Native object model - reference-counted objects on the other side of the bridge
//!
//! Natives have stable identity, an interface set, a cycle-collector
//! participation state and a wrapper cache holding weak references to
//! their wrappers, one per isolation domain. Lifetime is governed by
//! `NativeRef`, an atomically reference-counted handle.

mod refcount;
mod variant;


pub use refcount::NativeRef;
pub use variant::{Variant, VariantValue};

use crate::heap::CellId;
use crate::wrapper::WrapperCache;
use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

static NEXT_NATIVE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a native object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeId(pub u64);

impl core::fmt::Display for NativeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "native#{}", self.0)
    }
}

/// Interface implemented by a native object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(pub &'static str);

/// Sorted, duplicate-free set of interfaces
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InterfaceSet(SmallVec<[InterfaceId; 4]>);

impl InterfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, iface: InterfaceId) -> bool {
        match self.0.binary_search(&iface) {
            Ok(_) => false,
            Err(pos) => {
                self.0.insert(pos, iface);
                true
            }
        }
    }

    #[inline]
    pub fn contains(&self, iface: InterfaceId) -> bool {
        self.0.binary_search(&iface).is_ok()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = InterfaceId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<InterfaceId> for InterfaceSet {
    fn from_iter<I: IntoIterator<Item = InterfaceId>>(iter: I) -> Self {
        let mut set = Self::new();
        for iface in iter {
            set.insert(iface);
        }
        set
    }
}

impl<const N: usize> From<[&'static str; N]> for InterfaceSet {
    fn from(names: [&'static str; N]) -> Self {
        names.into_iter().map(InterfaceId).collect()
    }
}

/// What the native side's cycle collector currently knows about a native
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CcState {
    /// Not yet examined in the current collection
    Unknown = 0,
    /// Proven reachable from outside any garbage cycle
    KnownLive = 1,
    /// Being torn down; its wrappers must not be handed out
    Unlinked = 2,
}

impl CcState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::KnownLive,
            2 => Self::Unlinked,
            _ => Self::Unknown,
        }
    }
}

/// Native kinds the bridge needs to tell apart
#[derive(Debug)]
pub enum NativeKind {
    Plain,
    /// Cross-boundary value carrier
    Variant(Variant),
    /// Native-side wrapper around a managed-heap object
    WrappedObject(CellId),
}

/// Payload behind a `NativeRef`
#[derive(Debug)]
pub struct NativeObject {
    id: NativeId,
    class_name: String,
    class_tag: u32,
    interfaces: InterfaceSet,
    kind: NativeKind,
    is_global: bool,
    cc_state: AtomicU8,
    cache: Mutex<WrapperCache>,
}

impl NativeObject {
    pub fn new(class_name: impl Into<String>, interfaces: InterfaceSet) -> Self {
        let class_name = class_name.into();
        Self {
            id: NativeId(NEXT_NATIVE_ID.fetch_add(1, Ordering::Relaxed)),
            class_tag: fnv1a(class_name.as_bytes()),
            class_name,
            interfaces,
            kind: NativeKind::Plain,
            is_global: false,
            cc_state: AtomicU8::new(CcState::Unknown as u8),
            cache: Mutex::new(WrapperCache::new()),
        }
    }

    /// Native carrying a cross-boundary value
    pub fn variant(value: VariantValue) -> Self {
        Self::new("Variant", InterfaceSet::new()).with_kind(NativeKind::Variant(Variant::new(value)))
    }

    /// Native standing in for a managed-heap object
    pub fn wrapping_object(object: CellId, interfaces: InterfaceSet) -> Self {
        Self::new("WrappedObject", interfaces).with_kind(NativeKind::WrappedObject(object))
    }

    pub fn with_kind(mut self, kind: NativeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Wrappers of this native are globals
    pub fn as_global(mut self) -> Self {
        self.is_global = true;
        self
    }

    /// Use a DOM-binding wrapper cache
    pub fn with_dom_binding(self) -> Self {
        self.cache.lock().set_dom_binding(true);
        self
    }

    #[inline]
    pub fn id(&self) -> NativeId {
        self.id
    }

    #[inline]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Numeric class tag stored in lightweight wrappers
    #[inline]
    pub fn class_tag(&self) -> u32 {
        self.class_tag
    }

    #[inline]
    pub fn interfaces(&self) -> &InterfaceSet {
        &self.interfaces
    }

    #[inline]
    pub fn kind(&self) -> &NativeKind {
        &self.kind
    }

    #[inline]
    pub fn as_variant(&self) -> Option<&Variant> {
        match &self.kind {
            NativeKind::Variant(variant) => Some(variant),
            _ => None,
        }
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.is_global
    }

    #[inline]
    pub fn cc_state(&self) -> CcState {
        CcState::from_u8(self.cc_state.load(Ordering::Acquire))
    }

    pub fn set_cc_state(&self, state: CcState) {
        self.cc_state.store(state as u8, Ordering::Release);
    }

    /// Lock the wrapper cache
    ///
    /// Do not hold the guard across calls that may release this native.
    #[inline]
    pub fn wrapper_cache(&self) -> MutexGuard<'_, WrapperCache> {
        self.cache.lock()
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5u32, |hash, &b| {
        (hash ^ b as u32).wrapping_mul(0x0100_0193)
    })
}
