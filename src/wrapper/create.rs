//! Wrapper creation and lifecycle helpers

use super::cache::lookup;
use super::classify::WrapperKind;
use super::WrappedNativeRecord;
use crate::error::BridgeError;
use crate::heap::{CellId, DomainId, Heap, ObjectClass, Private, SlotValue};
use crate::logging::{error, log_wrapper_created};
use crate::native::NativeRef;

/// Create the wrapper of `native` in `domain`
///
/// A second live wrapper for the same (native, domain) pair is a bridge bug:
/// it panics when `cache.fatal_on_duplicate` is set and is returned as
/// `DuplicateWrapper` otherwise. The existing entry is never handed back.
pub fn wrap_native(
    heap: &mut Heap,
    native: &NativeRef,
    domain: DomainId,
    kind: WrapperKind,
) -> Result<CellId, BridgeError> {
    if !heap.has_domain(domain) {
        return Err(BridgeError::UnknownDomain(domain));
    }

    let (existing, dom_binding) = {
        let cache = native.wrapper_cache();
        (cache.get(domain), cache.is_dom_binding())
    };

    if let Some(existing) = existing.filter(|w| heap.is_live(*w)) {
        error!(
            target: "wrapper",
            native = %native.id(),
            domain = %domain,
            existing = %existing,
            "second wrapper requested for a cached pair"
        );
        if heap.config().cache.fatal_on_duplicate {
            panic!(
                "native {} already has live wrapper {} in {}",
                native.id(),
                existing,
                domain
            );
        }
        return Err(BridgeError::DuplicateWrapper {
            native: native.id(),
            domain,
        });
    }

    if dom_binding && kind == WrapperKind::Lightweight {
        return Err(BridgeError::LightweightDomBinding { native: native.id() });
    }

    let class = if native.is_global() {
        ObjectClass::WrappedNativeGlobal
    } else {
        ObjectClass::WrappedNative
    };
    let multislot = class.wrapper_multislot();

    let wrapper = match kind {
        WrapperKind::Lightweight => {
            let wrapper = heap.try_allocate(class, domain)?;
            heap.set_slot(wrapper, multislot, SlotValue::Number(native.class_tag() as f64));
            heap.set_private(wrapper, Private::Native(native.clone()));
            wrapper
        }
        WrapperKind::Heavyweight => {
            heap.ensure_capacity(2)?;
            let proto = new_proto(heap, native, domain)?;
            let wrapper = heap.try_allocate(class, domain)?;
            heap.set_slot(wrapper, multislot, SlotValue::Object(proto));
            heap.set_private(
                wrapper,
                Private::Record(Box::new(WrappedNativeRecord::new(native.clone(), proto))),
            );
            wrapper
        }
    };

    native.wrapper_cache().record(domain, wrapper);
    log_wrapper_created(native.id(), domain, kind.as_str());
    Ok(wrapper)
}

/// Prototype record exposing the native's interfaces in `domain`
pub(crate) fn new_proto(
    heap: &mut Heap,
    native: &NativeRef,
    domain: DomainId,
) -> Result<CellId, BridgeError> {
    let proto = heap.try_allocate(ObjectClass::WrappedNativeProto, domain)?;
    heap.set_private(proto, Private::Interfaces(native.interfaces().clone()));
    Ok(proto)
}

/// Cached wrapper if one may be handed out, else a new one
///
/// A live cached wrapper that fails the hand-out check is not replaced; the
/// call then fails the same way `wrap_native` does for a duplicate.
pub fn get_or_wrap(
    heap: &mut Heap,
    native: &NativeRef,
    domain: DomainId,
    kind: WrapperKind,
) -> Result<CellId, BridgeError> {
    match lookup(heap, native, domain) {
        Some(wrapper) => Ok(wrapper),
        None => wrap_native(heap, native, domain, kind),
    }
}

/// Mark a heavyweight wrapper's record as torn down
///
/// Returns false for lightweight wrappers and dead handles.
pub fn expire_wrapper(heap: &mut Heap, wrapper: CellId) -> bool {
    match heap.get_mut(wrapper).map(|cell| &mut cell.private) {
        Some(Private::Record(record)) => {
            record.expire();
            true
        }
        _ => false,
    }
}
