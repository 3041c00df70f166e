use super::*;
use crate::introspect::Value;
use crate::test_helpers::*;

// =============================================================================
// Workflow
// =============================================================================

#[test]
fn no_source_object_is_build() {
    let resolver = CapabilityResolver::new();
    let target = object(&build_target(true));
    assert_eq!(classify_workflow(&resolver, &target).unwrap(), Workflow::Build);
}

#[test]
fn unrelated_object_member_is_still_build() {
    let resolver = CapabilityResolver::new();
    let target = object(&mapped_build_target(true));
    assert_eq!(classify_workflow(&resolver, &target).unwrap(), Workflow::Build);
    assert!(compute_rotatable(&resolver, &target).unwrap());
}

#[test]
fn empty_source_object_is_build() {
    let resolver = CapabilityResolver::new();
    let target = object(&StubObject::new(&INSTALL_TYPE).shared());
    assert_eq!(classify_workflow(&resolver, &target).unwrap(), Workflow::Build);
}

#[test]
fn minified_source_is_install() {
    let resolver = CapabilityResolver::new();
    let target = object(&install_target(true));
    assert_eq!(classify_workflow(&resolver, &target).unwrap(), Workflow::Install);
}

#[test]
fn placed_source_is_reinstall_with_its_rotation() {
    let resolver = CapabilityResolver::new();
    let target = object(&reinstall_target(true, Rotation::West));
    let workflow = classify_workflow(&resolver, &target).unwrap();
    assert_eq!(workflow, Workflow::Reinstall { source_rotation: Some(Rotation::West) });
}

#[test]
fn lookalike_wrapper_is_reinstall() {
    let resolver = CapabilityResolver::new();
    let inner = thing(true, Rotation::North);
    let lookalike = StubObject::new(&CRATE_TYPE)
        .with("InnerThing", Value::Object(object(&inner)))
        .with("Rotation", Value::Rotation(Rotation::East))
        .shared();
    let target = object(&sourced_target(&lookalike, true));
    assert_eq!(
        classify_workflow(&resolver, &target).unwrap(),
        Workflow::Reinstall { source_rotation: Some(Rotation::East) }
    );
}

#[test]
fn unreadable_source_is_an_error() {
    let resolver = CapabilityResolver::new();
    let stub = install_target(true);
    stub.dispose();
    assert!(classify_workflow(&resolver, &object(&stub)).is_err());
}

// =============================================================================
// Rotatability
// =============================================================================

#[test]
fn build_reads_target_definition() {
    let resolver = CapabilityResolver::new();
    assert!(compute_rotatable(&resolver, &object(&build_target(true))).unwrap());
    assert!(!compute_rotatable(&resolver, &object(&build_target(false))).unwrap());
}

#[test]
fn install_reads_packaged_content_not_wrapper() {
    let resolver = CapabilityResolver::new();
    assert!(compute_rotatable(&resolver, &object(&install_target(true))).unwrap());
    assert!(!compute_rotatable(&resolver, &object(&install_target(false))).unwrap());
}

#[test]
fn reinstall_reads_source_definition() {
    let resolver = CapabilityResolver::new();
    assert!(compute_rotatable(&resolver, &object(&reinstall_target(true, Rotation::South))).unwrap());
    assert!(!compute_rotatable(&resolver, &object(&reinstall_target(false, Rotation::South))).unwrap());
}

#[test]
fn source_without_definition_falls_back_to_target() {
    let resolver = CapabilityResolver::new();
    let bare = StubObject::new(&THING_TYPE).with("Rotation", Value::Rotation(Rotation::North)).shared();
    assert!(compute_rotatable(&resolver, &object(&sourced_target(&bare, true))).unwrap());
    assert!(!compute_rotatable(&resolver, &object(&sourced_target(&bare, false))).unwrap());
}

#[test]
fn terrain_is_not_rotatable() {
    let resolver = CapabilityResolver::new();
    let floor = StubObject::new(&BUILD_TYPE)
        .with("PlacingDef", Value::Definition(terrain_definition()))
        .shared();
    assert!(!compute_rotatable(&resolver, &object(&floor)).unwrap());
}

#[test]
fn missing_capabilities_fail_closed() {
    let resolver = CapabilityResolver::new();
    assert!(!compute_rotatable(&resolver, &object(&StubObject::new(&OPAQUE_TYPE).shared())).unwrap());
    assert!(!compute_rotatable(&resolver, &object(&StubObject::new(&BUILD_TYPE).shared())).unwrap());
}

// =============================================================================
// RotatabilityCache
// =============================================================================

#[test]
fn cache_stores_and_invalidates_per_target() {
    let a = object(&build_target(true));
    let b = object(&build_target(false));
    let mut cache = RotatabilityCache::new();
    assert_eq!(cache.cached(&a), None);
    cache.store(&a, true);
    cache.store(&b, false);
    assert_eq!(cache.cached(&a), Some(true));
    assert_eq!(cache.cached(&b), Some(false));
    cache.invalidate(&a);
    assert_eq!(cache.cached(&a), None);
    assert_eq!(cache.cached(&b), Some(false));
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn cache_prunes_dropped_targets_on_store() {
    let mut cache = RotatabilityCache::new();
    for i in 0..100 {
        let target = object(&build_target(true));
        cache.store(&target, i % 2 == 0);
    }
    assert!(cache.len() <= 1);

    let live = object(&build_target(true));
    cache.store(&live, true);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.cached(&live), Some(true));
}
