//! Reference counted handle to a native object
//!
//! Hot path operations are always inlined. Counts are atomic so natives
//! may be released from any thread; wrapper caches are only touched under
//! the native's cache lock.

use super::NativeObject;
use crate::heap::{CellId, DomainId};
use crate::logging::trace;
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::NonNull;
use std::sync::atomic::{self, AtomicU32, Ordering};

/// Allocation behind a `NativeRef`; the object is the first field so a
/// pointer to it is a pointer to the box
#[repr(C)]
struct NativeBox {
    object: NativeObject,
    refcount: AtomicU32,
}

/// Strong reference to a native object
///
/// - Cloning increments the count
/// - The last drop destroys the native and its wrapper cache
pub struct NativeRef {
    ptr: NonNull<NativeBox>,
    _marker: PhantomData<NativeBox>,
}

impl NativeRef {
    pub fn new(object: NativeObject) -> Self {
        let id = object.id();
        let boxed = Box::new(NativeBox {
            object,
            refcount: AtomicU32::new(1),
        });

        trace!(event = "refcount_new", native = %id, count = 1);

        Self {
            ptr: NonNull::from(Box::leak(boxed)),
            _marker: PhantomData,
        }
    }

    #[inline(always)]
    fn inner(&self) -> &NativeBox {
        // Safety: the box stays allocated while any NativeRef exists
        unsafe { self.ptr.as_ref() }
    }

    /// Current reference count (for debugging)
    #[inline]
    pub fn count(&self) -> u32 {
        self.inner().refcount.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }

    /// Drop the wrapper cache entry for `wrapper` and release this reference
    ///
    /// Used when a wrapper is finalized. The entry is removed under the cache
    /// lock before the count is decremented, so a lookup never sees an entry
    /// whose native is being destroyed.
    pub fn release_wrapper(self, domain: DomainId, wrapper: CellId) {
        let forgotten = self.wrapper_cache().forget(domain, wrapper);
        trace!(
            native = %self.id(),
            wrapper = %wrapper,
            forgotten,
            "wrapper released"
        );
        drop(self);
    }

    /// Convert to raw pointer, consuming self without decrementing
    #[inline]
    pub fn into_raw(self) -> *const NativeObject {
        let ptr = self.ptr.as_ptr() as *const NativeObject;
        core::mem::forget(self);
        ptr
    }

    /// Rebuild a reference from `into_raw` without incrementing
    ///
    /// # Safety
    /// `ptr` must come from `into_raw` and be passed back exactly once.
    #[inline]
    pub unsafe fn from_raw(ptr: *const NativeObject) -> Self {
        Self {
            ptr: NonNull::new_unchecked(ptr as *mut NativeBox),
            _marker: PhantomData,
        }
    }

    /// Destroy the native (cold path)
    #[cold]
    #[inline(never)]
    unsafe fn destroy(&mut self) {
        let boxed = Box::from_raw(self.ptr.as_ptr());
        let id = boxed.object.id();

        let stale = {
            let mut cache = boxed.object.wrapper_cache();
            let stale = cache.len();
            cache.clear();
            stale
        };

        trace!(event = "refcount_destroy", native = %id, stale_entries = stale);
        drop(boxed);
    }
}

impl Clone for NativeRef {
    #[inline]
    fn clone(&self) -> Self {
        let old = self.inner().refcount.fetch_add(1, Ordering::Relaxed);
        debug_assert!(old < u32::MAX, "refcount overflow");
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl Drop for NativeRef {
    #[inline]
    fn drop(&mut self) {
        let old = self.inner().refcount.fetch_sub(1, Ordering::Release);
        debug_assert!(old > 0, "refcount underflow");

        if old == 1 {
            // Synchronize with all previous decrements
            atomic::fence(Ordering::Acquire);
            unsafe { self.destroy() };
        }
    }
}

impl Deref for NativeRef {
    type Target = NativeObject;

    #[inline]
    fn deref(&self) -> &NativeObject {
        &self.inner().object
    }
}

impl core::fmt::Debug for NativeRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NativeRef")
            .field("id", &self.id())
            .field("class", &self.class_name())
            .field("count", &self.count())
            .finish()
    }
}

impl PartialEq for NativeRef {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for NativeRef {}

// NativeObject is Send + Sync and the count is atomic
unsafe impl Send for NativeRef {}
unsafe impl Sync for NativeRef {}
