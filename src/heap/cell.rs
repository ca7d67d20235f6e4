//! Cell layout - the unit the managed-heap collector colors and traces

use crate::native::{InterfaceSet, NativeRef};
use crate::wrapper::WrappedNativeRecord;
use smallvec::SmallVec;

/// Handle to a heap cell
///
/// The version distinguishes a reclaimed cell from a later one reusing the
/// same index, so a stale handle acts as a weak reference that reads empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    pub(crate) index: u32,
    pub(crate) version: u32,
}

impl CellId {
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }
}

impl core::fmt::Display for CellId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "cell#{}v{}", self.index, self.version)
    }
}

/// Isolation domain (compartment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainId(pub u32);

impl core::fmt::Display for DomainId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "domain#{}", self.0)
    }
}

/// Tri-color marking state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Color {
    /// Subject to reclamation
    #[default]
    White = 0,
    /// Reachable only through a cross-boundary edge
    Gray = 1,
    /// Confirmed live
    Black = 2,
}

/// What the collector knows a cell to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceKind {
    Object,
    /// Compiled script unit
    Script,
    /// Leaf cell the cycle collector never looks at
    String,
}

/// A traceable thing: a cell plus the kind the caller believes it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcThing {
    pub cell: CellId,
    pub kind: TraceKind,
}

impl GcThing {
    #[inline]
    pub fn object(cell: CellId) -> Self {
        Self { cell, kind: TraceKind::Object }
    }

    #[inline]
    pub fn script(cell: CellId) -> Self {
        Self { cell, kind: TraceKind::Script }
    }
}

/// Number of reserved slots the engine keeps for itself on every global.
///
/// Wrapper classes put their marker in slot 0, but on globals slot 0 belongs
/// to the engine. Global wrapper classes therefore place the marker in the
/// first slot past this range; see `ObjectClass::wrapper_multislot`.
pub const GLOBAL_ENGINE_SLOTS: usize = 3;

/// Runtime class tag of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Plain,
    Global,
    /// Proxy for a native object
    WrappedNative,
    /// Proxy for a native object that is itself a global
    WrappedNativeGlobal,
    /// Auxiliary prototype record of a heavyweight wrapper
    WrappedNativeProto,
    /// Stand-in left behind by a transplant; slot 0 holds the new object
    Forwarder,
    /// Outer (window) proxy; slot 0 holds the inner object
    OuterProxy,
    Script,
    String,
}

impl ObjectClass {
    /// Cheap class check that must pass before a cell is classified
    #[inline]
    pub const fn is_wrapper_class(self) -> bool {
        matches!(self, Self::WrappedNative | Self::WrappedNativeGlobal)
    }

    #[inline]
    pub const fn is_global(self) -> bool {
        matches!(self, Self::Global | Self::WrappedNativeGlobal)
    }

    /// Index of the reserved slot that discriminates wrapper kinds
    #[inline]
    pub const fn wrapper_multislot(self) -> usize {
        if self.is_global() {
            GLOBAL_ENGINE_SLOTS
        } else {
            0
        }
    }

    pub const fn reserved_slots(self) -> usize {
        match self {
            Self::Global => GLOBAL_ENGINE_SLOTS,
            Self::WrappedNativeGlobal => GLOBAL_ENGINE_SLOTS + 1,
            Self::WrappedNative | Self::Forwarder | Self::OuterProxy => 1,
            Self::Plain | Self::WrappedNativeProto | Self::Script | Self::String => 0,
        }
    }

    pub const fn trace_kind(self) -> TraceKind {
        match self {
            Self::Script => TraceKind::Script,
            Self::String => TraceKind::String,
            _ => TraceKind::Object,
        }
    }
}

/// Contents of a reserved slot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SlotValue {
    #[default]
    Undefined,
    /// Raw numeric payload, never traced
    Number(f64),
    Object(CellId),
}

impl SlotValue {
    #[inline]
    pub fn as_object(self) -> Option<CellId> {
        match self {
            Self::Object(id) => Some(id),
            _ => None,
        }
    }

    #[inline]
    pub fn is_number(self) -> bool {
        matches!(self, Self::Number(_))
    }
}

/// Private slot payload
#[derive(Default)]
pub enum Private {
    #[default]
    None,
    /// Lightweight wrapper: the native itself
    Native(NativeRef),
    /// Heavyweight wrapper: the intermediate wrapping record
    Record(Box<WrappedNativeRecord>),
    /// Prototype record: interfaces exposed through it
    Interfaces(InterfaceSet),
}

impl Private {
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl core::fmt::Debug for Private {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Native(native) => write!(f, "Native({})", native.id()),
            Self::Record(record) => write!(f, "Record({})", record.native().id()),
            Self::Interfaces(set) => write!(f, "Interfaces({})", set.len()),
        }
    }
}

/// Heap cell
#[derive(Debug)]
pub struct Cell {
    pub(crate) class: ObjectClass,
    pub(crate) domain: DomainId,
    pub(crate) color: Color,
    pub(crate) slots: SmallVec<[SlotValue; 4]>,
    pub(crate) private: Private,
    /// Ordinary outgoing references (properties, script constants)
    pub(crate) edges: SmallVec<[CellId; 4]>,
}

impl Cell {
    pub(crate) fn new(class: ObjectClass, domain: DomainId) -> Self {
        Self {
            class,
            domain,
            color: Color::White,
            slots: SmallVec::from_elem(SlotValue::Undefined, class.reserved_slots()),
            private: Private::None,
            edges: SmallVec::new(),
        }
    }

    #[inline]
    pub fn class(&self) -> ObjectClass {
        self.class
    }

    #[inline]
    pub fn domain(&self) -> DomainId {
        self.domain
    }

    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }

    #[inline]
    pub fn kind(&self) -> TraceKind {
        self.class.trace_kind()
    }

    #[inline]
    pub fn slot(&self, index: usize) -> SlotValue {
        self.slots.get(index).copied().unwrap_or_default()
    }

    #[inline]
    pub fn private(&self) -> &Private {
        &self.private
    }

    #[inline]
    pub fn edges(&self) -> &[CellId] {
        &self.edges
    }

    /// Visit every outgoing reference of this cell
    pub(crate) fn for_each_child(&self, mut f: impl FnMut(CellId)) {
        for slot in &self.slots {
            if let Some(id) = slot.as_object() {
                f(id);
            }
        }
        for &id in &self.edges {
            f(id);
        }
        if let Private::Record(record) = &self.private {
            f(record.proto());
        }
    }

    /// Nothing in the slots, private or edges
    pub(crate) fn is_blank(&self) -> bool {
        self.private.is_none()
            && self.edges.is_empty()
            && self.slots.iter().all(|s| *s == SlotValue::Undefined)
    }
}
