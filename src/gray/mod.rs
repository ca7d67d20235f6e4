//! Gray-color synchronization
//!
//! The managed-heap collector colors a cell gray when the only things keeping
//! it alive are native-side references. Before the native side hands such a
//! cell out or traces through it, the cell and everything gray reachable from
//! it must be unmarked, or the collector could reclaim memory the native side
//! still points into. Cells that are not gray get the incremental reference
//! barrier instead whenever the collector is mid-mark.
//!
//! Nothing in this module fails. Every entry point is idempotent.

mod holders;
mod walk;


pub use holders::{Holder, HolderRegistry};
pub use walk::unmark_gray_recursive;

use crate::generation::Generation;
use crate::heap::{CellId, ExecutionContext, GcThing, TraceKind};
use crate::logging::trace;
use crate::native::{NativeKind, NativeObject, Variant};

/// What the synchronizer needs from the managed heap
pub trait GrayMarking {
    fn is_gray(&self, thing: GcThing) -> bool;

    /// Clear gray on one cell; no-op for anything not gray
    fn unmark_gray_cell(&mut self, thing: GcThing);

    /// Whether the incremental collector needs to hear about `thing`
    fn is_barrier_needed(&self, thing: GcThing) -> bool;

    fn reference_barrier(&mut self, thing: GcThing);

    /// Visit the outgoing references of `thing`
    fn for_each_child(&self, thing: GcThing, f: &mut dyn FnMut(GcThing));

    /// Dense index of `thing`, below `index_bound`
    fn thing_index(&self, thing: GcThing) -> usize;

    fn index_bound(&self) -> usize;

    fn worklist_capacity_hint(&self) -> usize {
        64
    }

    /// Whether a reentrant request scope is active
    fn in_request(&self) -> bool;
}

/// Unmark `thing` if gray, otherwise fire the barrier if one is needed
///
/// Returns its argument so calls can be chained.
pub fn unmark_gray<G>(heap: &mut G, thing: Option<GcThing>) -> Option<GcThing>
where
    G: GrayMarking + ?Sized,
{
    let target = thing?;
    if heap.is_gray(target) {
        unmark_gray_recursive(heap, target);
    } else if heap.is_barrier_needed(target) {
        heap.reference_barrier(target);
    }
    thing
}

#[inline]
pub fn unmark_gray_object<G>(heap: &mut G, obj: Option<CellId>) -> Option<CellId>
where
    G: GrayMarking + ?Sized,
{
    unmark_gray(heap, obj.map(GcThing::object));
    obj
}

#[inline]
pub fn unmark_gray_script<G>(heap: &mut G, script: Option<CellId>) -> Option<CellId>
where
    G: GrayMarking + ?Sized,
{
    unmark_gray(heap, script.map(GcThing::script));
    script
}

/// Unmark a context's global and, inside a request, the global of the scope
/// currently running on it when that differs
pub fn unmark_gray_context<'cx, G>(
    heap: &mut G,
    cx: Option<&'cx ExecutionContext>,
) -> Option<&'cx ExecutionContext>
where
    G: GrayMarking + ?Sized,
{
    let context = cx?;
    let global = context.global();
    unmark_gray_object(heap, global);

    if heap.in_request() {
        if let Some(scope_global) = context.scope_global().filter(|g| Some(*g) != global) {
            unmark_gray_object(heap, Some(scope_global));
        }
    }
    cx
}

#[inline]
pub fn is_gray_gc_thing<G>(heap: &G, thing: GcThing) -> bool
where
    G: GrayMarking + ?Sized,
{
    heap.is_gray(thing)
}

/// Gray and of a kind the cycle collector traverses
#[inline]
pub fn gc_thing_is_gray_cc_thing<G>(heap: &G, thing: GcThing) -> bool
where
    G: GrayMarking + ?Sized,
{
    thing.kind != TraceKind::String && heap.is_gray(thing)
}

/// Stamp `variant` with `generation` and unmark the object it carries
pub fn mark_reachable_in_generation<G>(heap: &mut G, variant: &Variant, generation: Generation)
where
    G: GrayMarking + ?Sized,
{
    variant.stamp(generation);
    if let Some(obj) = variant.object() {
        trace!(target: "gray", cell = %obj, generation = generation.get(), "variant object unmarked");
        unmark_gray_object(heap, Some(obj));
    }
}

/// Unmark the managed object behind a native that wraps one
///
/// Returns false, touching nothing, for every other native.
pub fn try_unmark_wrapped_gray_object<G>(heap: &mut G, native: &NativeObject) -> bool
where
    G: GrayMarking + ?Sized,
{
    match native.kind() {
        NativeKind::WrappedObject(obj) => {
            unmark_gray_object(heap, Some(*obj));
            true
        }
        _ => false,
    }
}
