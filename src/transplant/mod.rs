//! Cross-domain transplant
//!
//! A transplant moves an object's payload into a cell of another domain and
//! turns the original cell, in place, into a forwarder pointing at the new
//! one. Holders of the old handle keep working through the forwarder.
//!
//! All checks and allocations happen before the first mutation. Once the
//! payload starts moving nothing can fail, so a refused transplant leaves the
//! heap and every wrapper cache exactly as they were.

#[cfg(test)]
mod tests;

use crate::error::TransplantError;
use crate::heap::{Cell, CellId, DomainId, Heap, ObjectClass, Private, SlotValue, TraceKind};
use crate::logging::{log_transplant, log_transplant_failed};
use crate::wrapper::{native_of, WrapperKind};
use core::mem;

/// What a validated transplant needs to allocate
struct Plan {
    class: ObjectClass,
    /// Heavyweight wrappers get a new prototype record in the target domain
    needs_proto: bool,
}

impl Plan {
    fn cells(&self) -> usize {
        1 + self.needs_proto as usize
    }
}

/// Move `orig` into `target`, returning the new object
///
/// On success the original handle resolves to the returned object. On
/// failure nothing changed.
pub fn transplant(heap: &mut Heap, orig: CellId, target: DomainId) -> Result<CellId, TransplantError> {
    let result = plan_transplant(heap, orig, target).and_then(|plan| {
        heap.ensure_capacity(plan.cells())
            .map_err(|_| TransplantError::AllocationFailed)?;
        let dest = heap
            .try_allocate(plan.class, target)
            .map_err(|_| TransplantError::AllocationFailed)?;
        let proto = allocate_proto(heap, &plan, target)?;
        transplant_into(heap, orig, dest, proto);
        Ok(dest)
    });

    if let Err(err) = &result {
        log_transplant_failed(orig.index(), err);
    }
    result
}

/// Transplant `orig_obj` into the caller-supplied blank `target_obj`, and
/// forward the outer proxy `orig_wrapper` to `target_wrapper`
///
/// Both outer handles must be outer proxies around their objects, each pair
/// must share a domain, and the two domains must differ. Returns
/// `target_wrapper`, which the old outer handle now resolves through.
pub fn transplant_with_wrapper(
    heap: &mut Heap,
    orig_obj: CellId,
    orig_wrapper: CellId,
    target_obj: CellId,
    target_wrapper: CellId,
) -> Result<CellId, TransplantError> {
    let result = plan_with_wrapper(heap, orig_obj, orig_wrapper, target_obj, target_wrapper)
        .and_then(|plan| {
            let domain = heap
                .domain_of(target_obj)
                .ok_or(TransplantError::DeadObject)?;
            heap.ensure_capacity(plan.cells() - 1)
                .map_err(|_| TransplantError::AllocationFailed)?;
            let proto = allocate_proto(heap, &plan, domain)?;

            transplant_into(heap, orig_obj, target_obj, proto);
            forward(heap, orig_wrapper, target_wrapper);
            Ok(target_wrapper)
        });

    if let Err(err) = &result {
        log_transplant_failed(orig_obj.index(), err);
    }
    result
}

fn plan_transplant(heap: &Heap, orig: CellId, target: DomainId) -> Result<Plan, TransplantError> {
    let cell = movable_cell(heap, orig)?;
    if !heap.has_domain(target) {
        return Err(TransplantError::UnknownDomain);
    }
    if cell.domain() == target {
        return Err(TransplantError::SameDomain);
    }
    check_cache(heap, orig, target)?;

    Ok(Plan {
        class: cell.class(),
        needs_proto: is_heavyweight(heap, orig),
    })
}

fn plan_with_wrapper(
    heap: &Heap,
    orig_obj: CellId,
    orig_wrapper: CellId,
    target_obj: CellId,
    target_wrapper: CellId,
) -> Result<Plan, TransplantError> {
    let orig = movable_cell(heap, orig_obj)?;
    let target = heap.get(target_obj).ok_or(TransplantError::DeadObject)?;
    let orig_outer = heap.get(orig_wrapper).ok_or(TransplantError::DeadObject)?;
    let target_outer = heap.get(target_wrapper).ok_or(TransplantError::DeadObject)?;

    if !is_outer_proxy_for(orig_outer, orig_obj) || !is_outer_proxy_for(target_outer, target_obj) {
        return Err(TransplantError::NotAnOuterProxy);
    }
    if orig.domain() != orig_outer.domain() || target.domain() != target_outer.domain() {
        return Err(TransplantError::DomainMismatch);
    }
    if orig.domain() == target.domain() {
        return Err(TransplantError::SameDomain);
    }
    if target.class() != orig.class() {
        return Err(TransplantError::ClassMismatch);
    }
    if !target.is_blank() {
        return Err(TransplantError::TargetNotBlank);
    }
    check_cache(heap, orig_obj, target.domain())?;

    Ok(Plan {
        class: orig.class(),
        needs_proto: is_heavyweight(heap, orig_obj),
    })
}

/// Live object that is not already a forwarder
fn movable_cell(heap: &Heap, obj: CellId) -> Result<&Cell, TransplantError> {
    let cell = heap.get(obj).ok_or(TransplantError::DeadObject)?;
    if cell.kind() != TraceKind::Object {
        return Err(TransplantError::NotAnObject);
    }
    if cell.class() == ObjectClass::Forwarder {
        return Err(TransplantError::AlreadyForwarded);
    }
    Ok(cell)
}

fn is_outer_proxy_for(outer: &Cell, inner: CellId) -> bool {
    outer.class() == ObjectClass::OuterProxy && outer.slot(0).as_object() == Some(inner)
}

fn is_heavyweight(heap: &Heap, obj: CellId) -> bool {
    crate::wrapper::decode(heap, obj).is_some_and(|repr| repr.kind() == WrapperKind::Heavyweight)
}

/// A wrapper may only move into a domain where its native has no live wrapper
fn check_cache(heap: &Heap, obj: CellId, target: DomainId) -> Result<(), TransplantError> {
    let Some(native) = native_of(heap, obj) else {
        return Ok(());
    };
    let cached = native.wrapper_cache().get(target);
    match cached {
        Some(existing) if heap.is_live(existing) => Err(TransplantError::CacheConflict),
        _ => Ok(()),
    }
}

fn allocate_proto(
    heap: &mut Heap,
    plan: &Plan,
    domain: DomainId,
) -> Result<Option<CellId>, TransplantError> {
    if !plan.needs_proto {
        return Ok(None);
    }
    heap.try_allocate(ObjectClass::WrappedNativeProto, domain)
        .map(Some)
        .map_err(|_| TransplantError::AllocationFailed)
}

/// Move the payload of `orig` into `dest` and leave a forwarder behind
///
/// Infallible: every allocation it relies on was made by the caller.
fn transplant_into(heap: &mut Heap, orig: CellId, dest: CellId, proto: Option<CellId>) {
    let Some(cell) = heap.get_mut(orig) else { return };
    let from = cell.domain;
    let color = cell.color;
    let slots = mem::take(&mut cell.slots);
    let private = mem::take(&mut cell.private);
    let edges = mem::take(&mut cell.edges);
    cell.class = ObjectClass::Forwarder;
    cell.slots.push(SlotValue::Object(dest));

    let Some(dest_cell) = heap.get_mut(dest) else { return };
    let to = dest_cell.domain;
    dest_cell.slots = slots;
    dest_cell.private = private;
    dest_cell.edges = edges;
    dest_cell.color = color;

    if let Some(proto) = proto {
        rehome_proto(heap, dest, proto);
        heap.set_color(proto, color);
    }

    for forwarder in heap.cells_of_class(ObjectClass::Forwarder) {
        if forwarder != orig && heap.slot(forwarder, 0) == SlotValue::Object(orig) {
            heap.set_slot(forwarder, 0, SlotValue::Object(dest));
        }
    }

    if let Some(native) = native_of(heap, dest).cloned() {
        let mut cache = native.wrapper_cache();
        cache.forget(from, orig);
        cache.record(to, dest);
    }

    log_transplant(orig.index(), dest.index(), to);
}

/// Point a heavyweight wrapper at a prototype record in its new domain
fn rehome_proto(heap: &mut Heap, wrapper: CellId, proto: CellId) {
    let (old_proto, fallback) = match heap.get(wrapper).map(Cell::private) {
        Some(Private::Record(record)) => (record.proto(), record.interfaces().clone()),
        _ => return,
    };
    let interfaces = match heap.get(old_proto).map(Cell::private) {
        Some(Private::Interfaces(set)) => set.clone(),
        _ => fallback,
    };
    heap.set_private(proto, Private::Interfaces(interfaces));

    if let Some(multislot) = heap.class_of(wrapper).map(ObjectClass::wrapper_multislot) {
        heap.set_slot(wrapper, multislot, SlotValue::Object(proto));
    }
    if let Some(Private::Record(record)) = heap.get_mut(wrapper).map(|cell| &mut cell.private) {
        record.set_proto(proto);
    }
}

/// Turn `outer` into a forwarder to `target`, moving its own edges along
fn forward(heap: &mut Heap, outer: CellId, target: CellId) {
    let Some(cell) = heap.get_mut(outer) else { return };
    let edges = mem::take(&mut cell.edges);
    cell.class = ObjectClass::Forwarder;
    cell.slots.clear();
    cell.slots.push(SlotValue::Object(target));

    if let Some(target_cell) = heap.get_mut(target) {
        target_cell.edges.extend(edges);
    }
}
