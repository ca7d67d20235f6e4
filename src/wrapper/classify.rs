//! Wrapper classifier
//!
//! Classification reads one reserved slot and nothing else. It is only
//! meaningful for cells whose class is a wrapper class; callers must check
//! that first (`is_wrapper_class`), and classifying anything else is a
//! contract violation that panics.

use super::WrappedNativeRecord;
use crate::heap::{Cell, CellId, Heap, ObjectClass, Private};
use crate::native::NativeRef;

/// Wrapper representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapperKind {
    Lightweight,
    Heavyweight,
}

impl WrapperKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lightweight => "lightweight",
            Self::Heavyweight => "heavyweight",
        }
    }
}

/// Typed view of a wrapper's payload
#[derive(Debug, Clone, Copy)]
pub enum WrapperRepr<'h> {
    Lightweight {
        native: &'h NativeRef,
    },
    Heavyweight {
        proto: CellId,
        record: &'h WrappedNativeRecord,
    },
}

impl WrapperRepr<'_> {
    #[inline]
    pub fn kind(&self) -> WrapperKind {
        match self {
            Self::Lightweight { .. } => WrapperKind::Lightweight,
            Self::Heavyweight { .. } => WrapperKind::Heavyweight,
        }
    }
}

/// Cheap class check that gates every classification
#[inline]
pub fn is_wrapper_class(class: ObjectClass) -> bool {
    class.is_wrapper_class()
}

fn wrapper_cell(heap: &Heap, obj: CellId) -> &Cell {
    match heap.get(obj) {
        Some(cell) if cell.class().is_wrapper_class() => cell,
        Some(cell) => panic!(
            "classified {} of class {:?}, which is not a wrapper class",
            obj,
            cell.class()
        ),
        None => panic!("classified {}, which is not a live cell", obj),
    }
}

#[inline]
fn kind_of(cell: &Cell) -> WrapperKind {
    if cell.slot(cell.class().wrapper_multislot()).is_number() {
        WrapperKind::Lightweight
    } else {
        WrapperKind::Heavyweight
    }
}

/// Classify a wrapper
///
/// # Panics
/// If `obj` is not a live cell of a wrapper class.
pub fn classify(heap: &Heap, obj: CellId) -> WrapperKind {
    kind_of(wrapper_cell(heap, obj))
}

/// # Panics
/// If `obj` is not a live cell of a wrapper class.
#[inline]
pub fn is_heavyweight_wrapper_object(heap: &Heap, obj: CellId) -> bool {
    classify(heap, obj) == WrapperKind::Heavyweight
}

/// # Panics
/// If `obj` is not a live cell of a wrapper class.
#[inline]
pub fn is_lightweight_wrapper_object(heap: &Heap, obj: CellId) -> bool {
    classify(heap, obj) == WrapperKind::Lightweight
}

/// Heavyweight wrapper check that is safe on any handle
pub fn is_heavyweight_wrapper(heap: &Heap, obj: CellId) -> bool {
    heap.class_of(obj).is_some_and(is_wrapper_class) && is_heavyweight_wrapper_object(heap, obj)
}

/// Lightweight wrapper check that is safe on any handle
pub fn is_lightweight_wrapper(heap: &Heap, obj: CellId) -> bool {
    heap.class_of(obj).is_some_and(is_wrapper_class) && is_lightweight_wrapper_object(heap, obj)
}

/// Decode a wrapper into its typed view
///
/// Returns `None` for non-wrappers and for wrappers whose private slot does
/// not match the representation the multislot names.
pub fn decode(heap: &Heap, obj: CellId) -> Option<WrapperRepr<'_>> {
    let cell = heap.get(obj).filter(|c| c.class().is_wrapper_class())?;
    match (kind_of(cell), cell.private()) {
        (WrapperKind::Lightweight, Private::Native(native)) => {
            Some(WrapperRepr::Lightweight { native })
        }
        (WrapperKind::Heavyweight, Private::Record(record)) => {
            let proto = cell.slot(cell.class().wrapper_multislot()).as_object()?;
            Some(WrapperRepr::Heavyweight { proto, record })
        }
        _ => None,
    }
}
