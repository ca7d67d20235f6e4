//! Cross-boundary value carrier

use crate::generation::Generation;
use crate::heap::CellId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Value held by a variant
#[derive(Debug, Clone, PartialEq)]
pub enum VariantValue {
    Void,
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
    /// Reference into the managed heap
    Object(CellId),
}

/// A value crossing the boundary, stamped with the collection pass that last
/// visited it
#[derive(Debug)]
pub struct Variant {
    value: VariantValue,
    /// 0 means never stamped; real generations start at 1
    generation: AtomicU64,
}

impl Variant {
    pub fn new(value: VariantValue) -> Self {
        Self {
            value,
            generation: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn value(&self) -> &VariantValue {
        &self.value
    }

    /// Managed object carried by this variant, if any
    #[inline]
    pub fn object(&self) -> Option<CellId> {
        match self.value {
            VariantValue::Object(cell) => Some(cell),
            _ => None,
        }
    }

    pub fn generation(&self) -> Option<Generation> {
        match self.generation.load(Ordering::Acquire) {
            0 => None,
            raw => Some(Generation::from_raw(raw)),
        }
    }

    /// Record `generation`, replacing any earlier stamp
    pub fn stamp(&self, generation: Generation) {
        self.generation.store(generation.get(), Ordering::Release);
    }
}
