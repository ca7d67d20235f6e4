//! Tests for cross-domain transplant

use super::*;
use crate::config::BridgeConfig;
use crate::heap::Color;
use crate::native::{InterfaceSet, NativeObject, NativeRef};
use crate::wrapper::{classify, interfaces_of, lookup, wrap_native};

fn two_domains(heap: &mut Heap) -> (DomainId, DomainId) {
    (heap.create_domain("d1"), heap.create_domain("d2"))
}

fn test_native() -> NativeRef {
    NativeRef::new(NativeObject::new("nsTransplanted", InterfaceSet::from(["nsIFoo", "nsIBar"])))
}

#[cfg(test)]
mod transplant_tests {
    use super::*;

    #[test]
    fn test_plain_object_forwards_to_new_cell() {
        let mut heap = Heap::new();
        let (d1, d2) = two_domains(&mut heap);
        let obj = heap.new_object(d1).unwrap();
        let prop = heap.new_object(d1).unwrap();
        heap.add_edge(obj, prop);

        let new = transplant(&mut heap, obj, d2).unwrap();

        assert_eq!(heap.class_of(obj), Some(ObjectClass::Forwarder));
        assert_eq!(heap.domain_of(obj), Some(d1));
        assert_eq!(heap.domain_of(new), Some(d2));
        assert_eq!(heap.resolve(obj), Some(new));
        assert_eq!(heap.get(new).unwrap().edges(), &[prop]);
    }

    #[test]
    fn test_heavyweight_wrapper_keeps_identity() {
        let mut heap = Heap::new();
        let (d1, d2) = two_domains(&mut heap);
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, d1, WrapperKind::Heavyweight).unwrap();

        let new = transplant(&mut heap, wrapper, d2).unwrap();

        assert!(NativeRef::ptr_eq(native_of(&heap, wrapper).unwrap(), &native));
        assert_eq!(interfaces_of(&heap, wrapper), Some(native.interfaces()));
        assert_eq!(classify(&heap, new), WrapperKind::Heavyweight);

        let proto = heap.slot(new, 0).as_object().unwrap();
        assert_eq!(heap.domain_of(proto), Some(d2));
    }

    #[test]
    fn test_cache_follows_transplant() {
        let mut heap = Heap::new();
        let (d1, d2) = two_domains(&mut heap);
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, d1, WrapperKind::Lightweight).unwrap();

        let new = transplant(&mut heap, wrapper, d2).unwrap();

        assert_eq!(lookup(&heap, &native, d1), None);
        assert_eq!(lookup(&heap, &native, d2), Some(new));
        assert_eq!(native.wrapper_cache().len(), 1);
    }

    #[test]
    fn test_color_moves_with_payload() {
        let mut heap = Heap::new();
        let (d1, d2) = two_domains(&mut heap);
        let obj = heap.new_object(d1).unwrap();
        heap.set_color(obj, Color::Gray);

        let new = transplant(&mut heap, obj, d2).unwrap();
        assert_eq!(heap.color(new), Some(Color::Gray));
    }

    #[test]
    fn test_existing_forwarders_are_repointed() {
        let mut heap = Heap::new();
        let d1 = heap.create_domain("d1");
        let d2 = heap.create_domain("d2");
        let d3 = heap.create_domain("d3");
        let obj = heap.new_object(d1).unwrap();

        let first = transplant(&mut heap, obj, d2).unwrap();
        let second = transplant(&mut heap, first, d3).unwrap();

        assert_eq!(heap.slot(obj, 0), SlotValue::Object(second));
        assert_eq!(heap.resolve(obj), Some(second));
    }

    #[test]
    fn test_refusals() {
        let mut heap = Heap::new();
        let (d1, d2) = two_domains(&mut heap);
        let obj = heap.new_object(d1).unwrap();
        let script = heap.new_script(d1).unwrap();

        assert_eq!(transplant(&mut heap, obj, d1), Err(TransplantError::SameDomain));
        assert_eq!(
            transplant(&mut heap, obj, DomainId(99)),
            Err(TransplantError::UnknownDomain)
        );
        assert_eq!(transplant(&mut heap, script, d2), Err(TransplantError::NotAnObject));

        transplant(&mut heap, obj, d2).unwrap();
        assert_eq!(transplant(&mut heap, obj, d2), Err(TransplantError::AlreadyForwarded));
    }

    #[test]
    fn test_dead_object_is_refused() {
        let mut heap = Heap::new();
        let (d1, d2) = two_domains(&mut heap);
        let obj = heap.new_object(d1).unwrap();
        heap.sweep();
        assert_eq!(transplant(&mut heap, obj, d2), Err(TransplantError::DeadObject));
    }

    #[test]
    fn test_cache_conflict_is_refused() {
        let mut heap = Heap::new();
        let (d1, d2) = two_domains(&mut heap);
        let native = test_native();
        let w1 = wrap_native(&mut heap, &native, d1, WrapperKind::Lightweight).unwrap();
        wrap_native(&mut heap, &native, d2, WrapperKind::Lightweight).unwrap();

        assert_eq!(transplant(&mut heap, w1, d2), Err(TransplantError::CacheConflict));
        assert_eq!(classify(&heap, w1), WrapperKind::Lightweight);
    }

    #[test]
    fn test_allocation_failure_leaves_original_intact() {
        let mut heap = Heap::with_config(BridgeConfig::default().with_max_cells(3));
        let (d1, d2) = two_domains(&mut heap);
        let native = test_native();
        let wrapper = wrap_native(&mut heap, &native, d1, WrapperKind::Heavyweight).unwrap();
        let filler = heap.new_object(d1).unwrap();
        assert_eq!(heap.live_count(), 3);

        assert_eq!(
            transplant(&mut heap, wrapper, d2),
            Err(TransplantError::AllocationFailed)
        );

        assert_eq!(heap.live_count(), 3);
        assert_eq!(heap.class_of(wrapper), Some(ObjectClass::WrappedNative));
        assert_eq!(lookup(&heap, &native, d1), Some(wrapper));
        assert!(heap.is_live(filler));
    }
}

#[cfg(test)]
mod with_wrapper_tests {
    use super::*;

    struct Setup {
        heap: Heap,
        native: NativeRef,
        orig_obj: CellId,
        orig_outer: CellId,
        target_obj: CellId,
        target_outer: CellId,
        d2: DomainId,
    }

    fn setup() -> Setup {
        let mut heap = Heap::new();
        let (d1, d2) = two_domains(&mut heap);
        let native = test_native();
        let orig_obj = wrap_native(&mut heap, &native, d1, WrapperKind::Heavyweight).unwrap();
        let orig_outer = heap.new_outer_proxy(orig_obj).unwrap();
        let target_obj = heap.try_allocate(ObjectClass::WrappedNative, d2).unwrap();
        let target_outer = heap.new_outer_proxy(target_obj).unwrap();
        Setup {
            heap,
            native,
            orig_obj,
            orig_outer,
            target_obj,
            target_outer,
            d2,
        }
    }

    #[test]
    fn test_outer_handle_resolves_into_target_domain() {
        let mut s = setup();

        let result = transplant_with_wrapper(
            &mut s.heap,
            s.orig_obj,
            s.orig_outer,
            s.target_obj,
            s.target_outer,
        )
        .unwrap();

        assert_eq!(result, s.target_outer);
        assert_eq!(s.heap.resolve(s.orig_outer), Some(s.target_obj));
        assert_eq!(s.heap.resolve(s.orig_obj), Some(s.target_obj));
        assert_eq!(interfaces_of(&s.heap, s.orig_outer), Some(s.native.interfaces()));
        assert_eq!(lookup(&s.heap, &s.native, s.d2), Some(s.target_obj));
    }

    #[test]
    fn test_outer_edges_move_to_target_outer() {
        let mut s = setup();
        let expando = s.heap.new_object(s.heap.domain_of(s.orig_outer).unwrap()).unwrap();
        s.heap.add_edge(s.orig_outer, expando);

        transplant_with_wrapper(&mut s.heap, s.orig_obj, s.orig_outer, s.target_obj, s.target_outer)
            .unwrap();

        assert!(s.heap.get(s.target_outer).unwrap().edges().contains(&expando));
    }

    #[test]
    fn test_non_outer_proxy_is_refused() {
        let mut s = setup();
        assert_eq!(
            transplant_with_wrapper(&mut s.heap, s.orig_obj, s.orig_obj, s.target_obj, s.target_outer),
            Err(TransplantError::NotAnOuterProxy)
        );
        assert_eq!(
            transplant_with_wrapper(&mut s.heap, s.orig_obj, s.target_outer, s.target_obj, s.target_outer),
            Err(TransplantError::NotAnOuterProxy)
        );
    }

    #[test]
    fn test_non_blank_target_is_refused() {
        let mut s = setup();
        let prop = s.heap.new_object(s.d2).unwrap();
        s.heap.add_edge(s.target_obj, prop);

        assert_eq!(
            transplant_with_wrapper(&mut s.heap, s.orig_obj, s.orig_outer, s.target_obj, s.target_outer),
            Err(TransplantError::TargetNotBlank)
        );
        assert_eq!(s.heap.class_of(s.orig_outer), Some(ObjectClass::OuterProxy));
        assert_eq!(s.heap.resolve(s.orig_outer), Some(s.orig_obj));
    }

    #[test]
    fn test_class_mismatch_is_refused() {
        let mut s = setup();
        let plain = s.heap.new_object(s.d2).unwrap();
        let plain_outer = s.heap.new_outer_proxy(plain).unwrap();

        assert_eq!(
            transplant_with_wrapper(&mut s.heap, s.orig_obj, s.orig_outer, plain, plain_outer),
            Err(TransplantError::ClassMismatch)
        );
    }

    #[test]
    fn test_same_domain_is_refused() {
        let mut s = setup();
        let d1 = s.heap.domain_of(s.orig_obj).unwrap();
        let other = s.heap.try_allocate(ObjectClass::WrappedNative, d1).unwrap();
        let other_outer = s.heap.new_outer_proxy(other).unwrap();

        assert_eq!(
            transplant_with_wrapper(&mut s.heap, s.orig_obj, s.orig_outer, other, other_outer),
            Err(TransplantError::SameDomain)
        );
    }
}
