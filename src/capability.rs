//! Capability resolution: binding typed accessors onto host types.
//!
//! DESIGN
//! ======
//! For every capability the engine needs (rotation get/set, source object,
//! definition, feedback sound) the resolver walks a prioritized lookup plan
//! against the target's [`TypeInfo`]: well-known member names first, then a
//! scan of every declared member for the first one of the expected type.
//! The source-object scan only considers thing-typed members; a target that
//! merely references some other host object is not sourced.
//! The bound accessors for a type are memoized for the process lifetime,
//! including the "absent" outcome, so each type is resolved exactly once.
//!
//! TRADE-OFFS
//! ==========
//! The type scan survives upstream renames in host types, at the cost of
//! possibly binding the wrong member when several share a type. Well-known
//! names always win, which keeps the common case exact.

#[cfg(test)]
#[path = "capability_test.rs"]
mod capability_test;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::consts::*;
use crate::grid::Rotation;
use crate::introspect::{
    AccessError, Definition, Introspect, MemberInfo, MemberKind, ObjectRef, SoundHandle, TypeInfo, TypeKey, Value,
    ValueType,
};

// =============================================================================
// ACCESSORS
// =============================================================================

/// A bound read accessor for one member.
pub struct Getter<T> {
    member: &'static MemberInfo,
    extract: fn(Value) -> Option<T>,
}

impl<T> Getter<T> {
    /// Read the member. `Ok(None)` means the member currently holds nothing.
    pub fn get(&self, object: &dyn Introspect) -> Result<Option<T>, AccessError> {
        let value = object.read(self.member.name)?;
        Ok((self.extract)(value))
    }

    /// Name of the bound member.
    #[must_use]
    pub fn member(&self) -> &'static str {
        self.member.name
    }
}

/// A bound write accessor for one member.
pub struct Setter<T> {
    member: &'static MemberInfo,
    wrap: fn(T) -> Value,
}

impl<T> Setter<T> {
    pub fn set(&self, object: &dyn Introspect, value: T) -> Result<(), AccessError> {
        object.write(self.member.name, (self.wrap)(value))
    }

    #[must_use]
    pub fn member(&self) -> &'static str {
        self.member.name
    }
}

// Manual impls: the accessors are plain pointers whatever `T` is.
impl<T> Clone for Getter<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Getter<T> {}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Setter<T> {}

impl<T> std::fmt::Debug for Getter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Getter({:?} {})", self.member.kind, self.member.name)
    }
}

impl<T> std::fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Setter({:?} {})", self.member.kind, self.member.name)
    }
}

fn extract_rotation(value: Value) -> Option<Rotation> {
    value.as_rotation()
}

fn wrap_rotation(rotation: Rotation) -> Value {
    Value::Rotation(rotation)
}

// =============================================================================
// CAPABILITY SETS
// =============================================================================

/// Accessors resolved for one placement-target type. Any entry may be absent.
#[derive(Debug, Default)]
pub struct CapabilitySet {
    pub get_rotation: Option<Getter<Rotation>>,
    pub set_rotation: Option<Setter<Rotation>>,
    pub get_source_object: Option<Getter<ObjectRef>>,
    pub get_definition: Option<Getter<Arc<Definition>>>,
    pub get_feedback_sound: Option<Getter<SoundHandle>>,
}

/// Accessors resolved for one source-object ("thing") type.
#[derive(Debug, Default)]
pub struct ThingCapabilities {
    pub get_rotation: Option<Getter<Rotation>>,
    pub get_definition: Option<Getter<Arc<Definition>>>,
    /// Present only on packaged-object wrappers.
    pub get_inner: Option<Getter<ObjectRef>>,
}

// =============================================================================
// LOOKUP PLANS
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Step {
    Fields(&'static [&'static str]),
    Properties(&'static [&'static str]),
    ScanFields,
    ScanProperties,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

impl Access {
    fn allows(self, member: &MemberInfo) -> bool {
        match self {
            Self::Read => member.readable,
            Self::Write => member.writable,
        }
    }
}

const ROTATION_PLAN: &[Step] = &[
    Step::Fields(ROTATION_FIELDS),
    Step::Properties(ROTATION_PROPERTIES),
    Step::ScanFields,
    Step::ScanProperties,
];

const SOURCE_PLAN: &[Step] = &[
    Step::Properties(SOURCE_PROPERTIES),
    Step::Fields(SOURCE_FIELDS),
    Step::ScanFields,
    Step::ScanProperties,
];

const DEFINITION_PLAN: &[Step] = &[
    Step::Properties(DEFINITION_PROPERTIES),
    Step::Fields(DEFINITION_FIELDS),
    Step::ScanProperties,
    Step::ScanFields,
];

const SOUND_PLAN: &[Step] = &[
    Step::Fields(SOUND_FIELDS),
    Step::Properties(SOUND_PROPERTIES),
    Step::ScanFields,
    Step::ScanProperties,
];

const THING_ROTATION_PLAN: &[Step] = &[
    Step::Properties(THING_ROTATION_PROPERTIES),
    Step::Fields(THING_ROTATION_FIELDS),
    Step::ScanProperties,
    Step::ScanFields,
];

const THING_DEFINITION_PLAN: &[Step] = &[
    Step::Fields(THING_DEFINITION_FIELDS),
    Step::Properties(THING_DEFINITION_PROPERTIES),
    Step::ScanFields,
    Step::ScanProperties,
];

// No type scan: a wrapper may hold several objects and only the named one is
// the packaged content.
const THING_INNER_PLAN: &[Step] = &[Step::Properties(THING_INNER_PROPERTIES)];

fn named(info: &'static TypeInfo, names: &[&str], kind: MemberKind, ty: ValueType, access: Access) -> Option<&'static MemberInfo> {
    names
        .iter()
        .filter_map(|name| info.find(name, kind))
        .find(|m| m.ty == ty && access.allows(m))
}

fn scan(info: &'static TypeInfo, kind: MemberKind, ty: ValueType, access: Access) -> Option<&'static MemberInfo> {
    info.all_members().find(|m| m.kind == kind && m.ty == ty && access.allows(m))
}

/// Run a lookup plan; the first step that yields a member wins.
fn bind(info: &'static TypeInfo, plan: &[Step], ty: ValueType, access: Access) -> Option<&'static MemberInfo> {
    plan.iter().find_map(|step| match *step {
        Step::Fields(names) => named(info, names, MemberKind::Field, ty, access),
        Step::Properties(names) => named(info, names, MemberKind::Property, ty, access),
        Step::ScanFields => scan(info, MemberKind::Field, ty, access),
        Step::ScanProperties => scan(info, MemberKind::Property, ty, access),
    })
}

fn getter<T>(info: &'static TypeInfo, plan: &[Step], ty: ValueType, extract: fn(Value) -> Option<T>) -> Option<Getter<T>> {
    bind(info, plan, ty, Access::Read).map(|member| Getter { member, extract })
}

/// Resolve every target capability for `info`. Pure; callers memoize.
#[must_use]
pub fn resolve_target(info: &'static TypeInfo) -> CapabilitySet {
    CapabilitySet {
        get_rotation: getter(info, ROTATION_PLAN, ValueType::Rotation, extract_rotation),
        set_rotation: bind(info, ROTATION_PLAN, ValueType::Rotation, Access::Write)
            .map(|member| Setter { member, wrap: wrap_rotation }),
        get_source_object: getter(info, SOURCE_PLAN, ValueType::Thing, Value::into_object),
        get_definition: getter(info, DEFINITION_PLAN, ValueType::Definition, Value::into_definition),
        get_feedback_sound: getter(info, SOUND_PLAN, ValueType::Sound, Value::into_sound),
    }
}

/// Resolve the accessors needed on a source object of type `info`.
#[must_use]
pub fn resolve_thing(info: &'static TypeInfo) -> ThingCapabilities {
    let get_inner = if info.is_named(MINIFIED_TYPE_NAME) {
        getter(info, THING_INNER_PLAN, ValueType::Thing, Value::into_object)
    } else {
        None
    };
    ThingCapabilities {
        get_rotation: getter(info, THING_ROTATION_PLAN, ValueType::Rotation, extract_rotation),
        get_definition: getter(info, THING_DEFINITION_PLAN, ValueType::Definition, Value::into_definition),
        get_inner,
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Process-lifetime memo of resolved capabilities, keyed by host type.
///
/// Append-only. Two threads racing on the same type may both resolve it; the
/// first insert wins and the duplicate is dropped.
#[derive(Default)]
pub struct CapabilityResolver {
    targets: RwLock<HashMap<TypeKey, Arc<CapabilitySet>>>,
    things: RwLock<HashMap<TypeKey, Arc<ThingCapabilities>>>,
    resolutions: AtomicUsize,
}

impl CapabilityResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capabilities of a placement-target type.
    pub fn resolve(&self, info: &'static TypeInfo) -> Arc<CapabilitySet> {
        memoized(&self.targets, &self.resolutions, info, resolve_target)
    }

    /// Capabilities of a source-object type.
    pub fn resolve_thing(&self, info: &'static TypeInfo) -> Arc<ThingCapabilities> {
        memoized(&self.things, &self.resolutions, info, resolve_thing)
    }

    /// Number of type resolutions performed so far (cache misses).
    #[must_use]
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    // --- Convenience reads used by the classifier and engine ---

    /// Current rotation of a target, if the type exposes one.
    pub fn rotation(&self, target: &dyn Introspect) -> Result<Option<Rotation>, AccessError> {
        match &self.resolve(target.type_info()).get_rotation {
            Some(g) => g.get(target),
            None => Ok(None),
        }
    }

    /// Write a target's rotation. Returns `false` when the type has no setter.
    pub fn set_rotation(&self, target: &dyn Introspect, rotation: Rotation) -> Result<bool, AccessError> {
        match &self.resolve(target.type_info()).set_rotation {
            Some(s) => s.set(target, rotation).map(|()| true),
            None => Ok(false),
        }
    }

    pub fn source_object(&self, target: &dyn Introspect) -> Result<Option<ObjectRef>, AccessError> {
        match &self.resolve(target.type_info()).get_source_object {
            Some(g) => g.get(target),
            None => Ok(None),
        }
    }

    pub fn definition(&self, target: &dyn Introspect) -> Result<Option<Arc<Definition>>, AccessError> {
        match &self.resolve(target.type_info()).get_definition {
            Some(g) => g.get(target),
            None => Ok(None),
        }
    }

    pub fn feedback_sound(&self, target: &dyn Introspect) -> Result<Option<SoundHandle>, AccessError> {
        match &self.resolve(target.type_info()).get_feedback_sound {
            Some(g) => g.get(target),
            None => Ok(None),
        }
    }

    pub fn thing_rotation(&self, thing: &dyn Introspect) -> Result<Option<Rotation>, AccessError> {
        match &self.resolve_thing(thing.type_info()).get_rotation {
            Some(g) => g.get(thing),
            None => Ok(None),
        }
    }

    pub fn thing_definition(&self, thing: &dyn Introspect) -> Result<Option<Arc<Definition>>, AccessError> {
        match &self.resolve_thing(thing.type_info()).get_definition {
            Some(g) => g.get(thing),
            None => Ok(None),
        }
    }

    /// Packaged content of a minified wrapper; `None` for anything else.
    pub fn inner_thing(&self, thing: &dyn Introspect) -> Result<Option<ObjectRef>, AccessError> {
        match &self.resolve_thing(thing.type_info()).get_inner {
            Some(g) => g.get(thing),
            None => Ok(None),
        }
    }
}

fn memoized<C>(
    cache: &RwLock<HashMap<TypeKey, Arc<C>>>,
    counter: &AtomicUsize,
    info: &'static TypeInfo,
    resolve: fn(&'static TypeInfo) -> C,
) -> Arc<C> {
    let key = info.key();
    if let Some(hit) = cache.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
        return Arc::clone(hit);
    }

    let resolved = Arc::new(resolve(info));
    counter.fetch_add(1, Ordering::Relaxed);
    tracing::trace!(type_name = info.name, "resolved capabilities");

    let mut map = cache.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(map.entry(key).or_insert(resolved))
}
