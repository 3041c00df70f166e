//! Workflow detection and the rotatability classifier.
//!
//! A target is classified from its capabilities alone:
//! - a source object that is a packaged (minified) wrapper: install
//! - any other source object: reinstall of an already placed object
//! - no source object: build
//!
//! Rotatability fails closed. Whenever a capability is missing or a read comes
//! back empty the answer is `false`, so gestures are never offered for objects
//! whose rotatability cannot be proven.

#[cfg(test)]
#[path = "classify_test.rs"]
mod classify_test;

use crate::capability::CapabilityResolver;
use crate::grid::Rotation;
use crate::introspect::{AccessError, ObjectRef};
use crate::session::WeakMap;

/// A classified workflow, carrying what the override policy needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    Build,
    Install,
    /// `source_rotation` is the object's rotation before it was picked up.
    Reinstall { source_rotation: Option<Rotation> },
}

/// Classify `target` by inspecting its source-object capability.
pub fn classify_workflow(resolver: &CapabilityResolver, target: &ObjectRef) -> Result<Workflow, AccessError> {
    let Some(source) = resolver.source_object(target.as_ref())? else {
        return Ok(Workflow::Build);
    };
    if resolver.resolve_thing(source.type_info()).get_inner.is_some() {
        return Ok(Workflow::Install);
    }
    let source_rotation = resolver.thing_rotation(source.as_ref())?;
    Ok(Workflow::Reinstall { source_rotation })
}

/// Compute rotatability without caching.
///
/// Install and reinstall read the definition of the effective object (the
/// packaged content for a wrapper, else the source itself) and fall back to
/// the target's own definition. Build reads the target's definition.
pub fn compute_rotatable(resolver: &CapabilityResolver, target: &ObjectRef) -> Result<bool, AccessError> {
    if let Some(source) = resolver.source_object(target.as_ref())? {
        let effective = resolver.inner_thing(source.as_ref())?.unwrap_or(source);
        if let Some(def) = resolver.thing_definition(effective.as_ref())? {
            return Ok(def.is_rotatable());
        }
    }
    Ok(resolver
        .definition(target.as_ref())?
        .is_some_and(|def| def.is_rotatable()))
}

/// Per-instance memo of rotatability facts.
///
/// Each fact is computed at most once between invalidations. Read failures
/// are memoized as `false` along with everything else.
#[derive(Default)]
pub struct RotatabilityCache {
    facts: WeakMap<bool>,
}

impl RotatabilityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached fact for `target`, if one was computed since the last clear.
    #[must_use]
    pub fn cached(&self, target: &ObjectRef) -> Option<bool> {
        self.facts.get(target).copied()
    }

    pub fn store(&mut self, target: &ObjectRef, rotatable: bool) {
        self.facts.insert(target, rotatable);
    }

    pub fn invalidate(&mut self, target: &ObjectRef) {
        self.facts.remove(target);
    }

    pub fn clear(&mut self) {
        self.facts.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}
