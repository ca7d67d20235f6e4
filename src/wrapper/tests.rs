//! Tests for the classifier, the wrapper cache and wrapper creation

use super::*;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::heap::{Color, DomainId, ObjectClass, SlotValue, GLOBAL_ENGINE_SLOTS};
use crate::native::{CcState, NativeObject};
use proptest::prelude::*;

fn test_native() -> NativeRef {
    NativeRef::new(NativeObject::new("nsTestWidget", InterfaceSet::from(["nsIWidget"])))
}

fn lenient_heap() -> Heap {
    let mut config = BridgeConfig::default();
    config.cache.fatal_on_duplicate = false;
    Heap::with_config(config)
}

#[cfg(test)]
mod classify_tests {
    use super::*;

    #[test]
    fn test_lightweight_wrapper_classification() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Lightweight).unwrap();

        assert_eq!(classify(&heap, wrapper), WrapperKind::Lightweight);
        assert!(is_lightweight_wrapper_object(&heap, wrapper));
        assert!(!is_heavyweight_wrapper_object(&heap, wrapper));
        assert_eq!(heap.slot(wrapper, 0), SlotValue::Number(native.class_tag() as f64));

        match decode(&heap, wrapper) {
            Some(WrapperRepr::Lightweight { native: n }) => assert!(NativeRef::ptr_eq(n, &native)),
            other => panic!("unexpected repr {:?}", other),
        }
    }

    #[test]
    fn test_heavyweight_wrapper_classification() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Heavyweight).unwrap();

        assert_eq!(classify(&heap, wrapper), WrapperKind::Heavyweight);
        assert!(is_heavyweight_wrapper_object(&heap, wrapper));

        match decode(&heap, wrapper) {
            Some(WrapperRepr::Heavyweight { proto, record }) => {
                assert_eq!(heap.class_of(proto), Some(ObjectClass::WrappedNativeProto));
                assert_eq!(heap.domain_of(proto), Some(domain));
                assert_eq!(record.proto(), proto);
                assert!(record.is_valid());
                assert!(NativeRef::ptr_eq(record.native(), &native));
            }
            other => panic!("unexpected repr {:?}", other),
        }
    }

    #[test]
    fn test_safe_predicates_accept_any_handle() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let plain = heap.new_object(domain).unwrap();

        assert!(!is_heavyweight_wrapper(&heap, plain));
        assert!(!is_lightweight_wrapper(&heap, plain));
        assert!(decode(&heap, plain).is_none());

        heap.sweep();
        assert!(!is_heavyweight_wrapper(&heap, plain));
    }

    #[test]
    #[should_panic(expected = "not a wrapper class")]
    fn test_classify_non_wrapper_panics() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let plain = heap.new_object(domain).unwrap();
        classify(&heap, plain);
    }

    #[test]
    #[should_panic(expected = "not a live cell")]
    fn test_classify_dead_cell_panics() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let cell = heap.try_allocate(ObjectClass::WrappedNative, domain).unwrap();
        heap.sweep();
        classify(&heap, cell);
    }

    #[test]
    fn test_global_slot_collision_regression() {
        // The engine owns slots 0..GLOBAL_ENGINE_SLOTS of every global and may
        // store an object in slot 0. A lightweight global wrapper must still
        // classify as lightweight.
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = NativeRef::new(NativeObject::new("Window", InterfaceSet::new()).as_global());
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Lightweight).unwrap();
        let engine_data = heap.new_object(domain).unwrap();

        assert_eq!(heap.class_of(wrapper), Some(ObjectClass::WrappedNativeGlobal));
        heap.set_slot(wrapper, 0, SlotValue::Object(engine_data));

        assert_eq!(classify(&heap, wrapper), WrapperKind::Lightweight);
        assert!(heap.slot(wrapper, GLOBAL_ENGINE_SLOTS).is_number());
        assert!(matches!(
            decode(&heap, wrapper),
            Some(WrapperRepr::Lightweight { .. })
        ));
    }

    #[test]
    fn test_heavyweight_global_wrapper_marker_slot() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = NativeRef::new(NativeObject::new("Window", InterfaceSet::new()).as_global());
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Heavyweight).unwrap();
        heap.set_slot(wrapper, 0, SlotValue::Number(1.0));

        assert_eq!(classify(&heap, wrapper), WrapperKind::Heavyweight);
        assert!(heap.slot(wrapper, GLOBAL_ENGINE_SLOTS).as_object().is_some());
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;

    #[test]
    fn test_lookup_empty_cache() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        assert_eq!(lookup(&heap, &test_native(), domain), None);
    }

    #[test]
    fn test_lookup_returns_cached_wrapper() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Heavyweight).unwrap();

        assert_eq!(lookup(&heap, &native, domain), Some(wrapper));
        assert_eq!(lookup(&heap, &native, domain), Some(wrapper));
    }

    #[test]
    fn test_lookup_never_crosses_domains() {
        let mut heap = Heap::new();
        let d1 = heap.create_domain("d1");
        let d2 = heap.create_domain("d2");
        let native = test_native();
        wrap_native(&mut heap, &native, d1, WrapperKind::Lightweight).unwrap();

        assert_eq!(lookup(&heap, &native, d2), None);
    }

    #[test]
    fn test_lookup_has_no_side_effects() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Heavyweight).unwrap();
        heap.set_color(wrapper, Color::Gray);
        let live = heap.live_count();

        lookup(&heap, &native, domain);

        assert_eq!(heap.color(wrapper), Some(Color::Gray));
        assert_eq!(heap.live_count(), live);
        assert_eq!(native.wrapper_cache().len(), 1);
    }

    #[test]
    fn test_lookup_after_reclaim_is_empty() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Lightweight).unwrap();
        assert_eq!(native.count(), 2);

        heap.sweep();

        assert!(!heap.is_live(wrapper));
        assert_eq!(lookup(&heap, &native, domain), None);
        assert!(native.wrapper_cache().is_empty());
        assert_eq!(native.count(), 1);
    }

    #[test]
    fn test_stale_weak_entry_reads_empty() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let stale = heap.try_allocate(ObjectClass::WrappedNative, domain).unwrap();
        native.wrapper_cache().record(domain, stale);
        heap.sweep();

        assert_eq!(native.wrapper_cache().get(domain), Some(stale));
        assert_eq!(lookup(&heap, &native, domain), None);
    }

    #[test]
    fn test_lightweight_skips_hand_out_policy() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Lightweight).unwrap();

        let never = |_: &Heap, _: &NativeObject, _: CellId| false;
        assert_eq!(lookup_with(&heap, &native, domain, &never), Some(wrapper));
    }

    #[test]
    fn test_heavyweight_consults_hand_out_policy() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Heavyweight).unwrap();

        let never = |_: &Heap, _: &NativeObject, _: CellId| false;
        let always = |_: &Heap, _: &NativeObject, _: CellId| true;
        assert_eq!(lookup_with(&heap, &native, domain, &never), None);
        assert_eq!(lookup_with(&heap, &native, domain, &always), Some(wrapper));
    }

    #[test]
    fn test_unlinked_native_is_not_handed_out() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Heavyweight).unwrap();

        native.set_cc_state(CcState::Unlinked);
        assert_eq!(lookup(&heap, &native, domain), None);

        native.set_cc_state(CcState::KnownLive);
        assert_eq!(lookup(&heap, &native, domain), Some(wrapper));
    }

    #[test]
    fn test_expired_record_is_not_handed_out() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Heavyweight).unwrap();

        assert!(expire_wrapper(&mut heap, wrapper));
        assert_eq!(lookup(&heap, &native, domain), None);
    }

    #[test]
    fn test_expire_lightweight_is_noop() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Lightweight).unwrap();
        assert!(!expire_wrapper(&mut heap, wrapper));
    }

    #[test]
    fn test_dom_binding_bypasses_hand_out_policy() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = NativeRef::new(
            NativeObject::new("HTMLDivElement", InterfaceSet::new()).with_dom_binding(),
        );
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Heavyweight).unwrap();
        expire_wrapper(&mut heap, wrapper);

        assert_eq!(lookup(&heap, &native, domain), Some(wrapper));
    }

    #[test]
    fn test_cache_record_replaces_and_forget_matches() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let a = heap.new_object(domain).unwrap();
        let b = heap.new_object(domain).unwrap();

        let mut cache = WrapperCache::new();
        cache.record(domain, a);
        cache.record(domain, b);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(domain), Some(b));

        assert!(!cache.forget(domain, a));
        assert!(cache.forget(domain, b));
        assert!(cache.is_empty());
    }
}

#[cfg(test)]
mod create_tests {
    use super::*;

    #[test]
    fn test_duplicate_wrapper_is_rejected() {
        let mut heap = lenient_heap();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let first = wrap_native(&mut heap, &native, domain, WrapperKind::Heavyweight).unwrap();

        let err = wrap_native(&mut heap, &native, domain, WrapperKind::Lightweight).unwrap_err();

        assert_eq!(
            err,
            BridgeError::DuplicateWrapper {
                native: native.id(),
                domain
            }
        );
        assert_eq!(native.wrapper_cache().get(domain), Some(first));
    }

    #[test]
    #[should_panic(expected = "already has live wrapper")]
    fn test_duplicate_wrapper_is_fatal_when_configured() {
        let mut config = BridgeConfig::default();
        config.cache.fatal_on_duplicate = true;
        let mut heap = Heap::with_config(config);
        let domain = heap.create_domain("d1");
        let native = test_native();
        wrap_native(&mut heap, &native, domain, WrapperKind::Lightweight).unwrap();
        let _ = wrap_native(&mut heap, &native, domain, WrapperKind::Lightweight);
    }

    #[test]
    fn test_rewrap_after_reclaim() {
        let mut heap = lenient_heap();
        let domain = heap.create_domain("d1");
        let native = test_native();
        let first = wrap_native(&mut heap, &native, domain, WrapperKind::Lightweight).unwrap();
        heap.sweep();

        let second = wrap_native(&mut heap, &native, domain, WrapperKind::Lightweight).unwrap();
        assert_ne!(first, second);
        assert_eq!(lookup(&heap, &native, domain), Some(second));
    }

    #[test]
    fn test_one_wrapper_per_domain() {
        let mut heap = lenient_heap();
        let d1 = heap.create_domain("d1");
        let d2 = heap.create_domain("d2");
        let native = test_native();

        let w1 = wrap_native(&mut heap, &native, d1, WrapperKind::Lightweight).unwrap();
        let w2 = wrap_native(&mut heap, &native, d2, WrapperKind::Heavyweight).unwrap();

        assert_ne!(w1, w2);
        assert_eq!(native.wrapper_cache().len(), 2);
        assert_eq!(lookup(&heap, &native, d1), Some(w1));
        assert_eq!(lookup(&heap, &native, d2), Some(w2));
    }

    #[test]
    fn test_dom_binding_rejects_lightweight() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = NativeRef::new(
            NativeObject::new("HTMLSpanElement", InterfaceSet::new()).with_dom_binding(),
        );

        assert_eq!(
            wrap_native(&mut heap, &native, domain, WrapperKind::Lightweight),
            Err(BridgeError::LightweightDomBinding { native: native.id() })
        );
        assert!(native.wrapper_cache().is_empty());
    }

    #[test]
    fn test_unknown_domain() {
        let mut heap = Heap::new();
        assert_eq!(
            wrap_native(&mut heap, &test_native(), DomainId(4), WrapperKind::Lightweight),
            Err(BridgeError::UnknownDomain(DomainId(4)))
        );
    }

    #[test]
    fn test_heavyweight_allocation_failure_allocates_nothing() {
        let mut heap = Heap::with_config(BridgeConfig::default().with_max_cells(1));
        let domain = heap.create_domain("d1");
        let native = test_native();

        assert!(matches!(
            wrap_native(&mut heap, &native, domain, WrapperKind::Heavyweight),
            Err(BridgeError::AllocationFailed { requested: 2, limit: 1 })
        ));
        assert_eq!(heap.live_count(), 0);
        assert!(native.wrapper_cache().is_empty());
    }

    #[test]
    fn test_get_or_wrap_reuses() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = test_native();

        let first = get_or_wrap(&mut heap, &native, domain, WrapperKind::Heavyweight).unwrap();
        let again = get_or_wrap(&mut heap, &native, domain, WrapperKind::Heavyweight).unwrap();
        assert_eq!(first, again);
        assert_eq!(heap.live_count(), 2);
    }

    #[test]
    fn test_native_and_interfaces_of() {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let native = NativeRef::new(NativeObject::new("nsMulti", InterfaceSet::from(["nsIA", "nsIB"])));
        let wrapper = wrap_native(&mut heap, &native, domain, WrapperKind::Heavyweight).unwrap();
        let outer = heap.new_outer_proxy(wrapper).unwrap();

        assert!(NativeRef::ptr_eq(native_of(&heap, outer).unwrap(), &native));
        assert_eq!(interfaces_of(&heap, outer), Some(native.interfaces()));
        let plain = heap.new_object(domain).unwrap();
        assert_eq!(native_of(&heap, plain), None);
    }
}

proptest! {
    #[test]
    fn prop_classification_is_pure(kinds in prop::collection::vec(any::<bool>(), 1..20), repeats in 1usize..5) {
        let mut heap = Heap::new();
        let domain = heap.create_domain("d1");
        let natives: Vec<_> = kinds.iter().map(|_| test_native()).collect();

        let wrappers: Vec<_> = natives
            .iter()
            .zip(&kinds)
            .map(|(native, &heavy)| {
                let kind = if heavy { WrapperKind::Heavyweight } else { WrapperKind::Lightweight };
                (wrap_native(&mut heap, native, domain, kind).unwrap(), kind)
            })
            .collect();

        for _ in 0..repeats {
            for &(wrapper, kind) in &wrappers {
                prop_assert_eq!(classify(&heap, wrapper), kind);
                prop_assert_ne!(
                    is_heavyweight_wrapper(&heap, wrapper),
                    is_lightweight_wrapper(&heap, wrapper)
                );
            }
        }
    }
}
