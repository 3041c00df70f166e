//! Shared fixtures: counting host objects with assorted member layouts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::grid::Rotation;
use crate::introspect::{AccessError, Definition, DefKind, Introspect, MemberInfo, MemberKind, ObjectRef, SoundHandle, TypeInfo, Value, ValueType};

// =============================================================================
// TYPES
// =============================================================================

/// Build-style target with the well-known member names.
pub static BUILD_TYPE: TypeInfo = TypeInfo {
    name: "Stub.Designator_Build",
    members: &[
        MemberInfo::field("placingRot", ValueType::Rotation),
        MemberInfo::getter("PlacingDef", ValueType::Definition),
        MemberInfo::field("soundSucceeded", ValueType::Sound),
    ],
    base: None,
};

/// Install-style target: inherits everything from [`BUILD_TYPE`].
pub static INSTALL_TYPE: TypeInfo = TypeInfo {
    name: "Stub.Designator_Install",
    members: &[MemberInfo::getter("MiniToInstallOrBuildingToReinstall", ValueType::Thing)],
    base: Some(&BUILD_TYPE),
};

/// Build-style target that also references an unrelated host object.
pub static MAPPED_BUILD_TYPE: TypeInfo = TypeInfo {
    name: "Stub.Designator_Mapped",
    members: &[MemberInfo::getter("Map", ValueType::Object)],
    base: Some(&BUILD_TYPE),
};

/// Sourced target whose thing member has an unknown name.
pub static RENAMED_SOURCE_TYPE: TypeInfo = TypeInfo {
    name: "Stub.Designator_RenamedSource",
    members: &[
        MemberInfo::getter("Map", ValueType::Object),
        MemberInfo::getter("Relocating", ValueType::Thing),
    ],
    base: Some(&BUILD_TYPE),
};

/// Target whose members match no known name; only the type scan finds them.
pub static RENAMED_TYPE: TypeInfo = TypeInfo {
    name: "Stub.Designator_Renamed",
    members: &[
        MemberInfo::field("counter", ValueType::Int),
        MemberInfo::field("facing", ValueType::Rotation),
        MemberInfo::property("Blueprint", ValueType::Definition),
        MemberInfo::property("Placed", ValueType::Sound),
    ],
    base: None,
};

/// Target whose rotation can be read but not written.
pub static READ_ONLY_TYPE: TypeInfo = TypeInfo {
    name: "Stub.Designator_ReadOnly",
    members: &[
        MemberInfo::getter("PlacingRot", ValueType::Rotation),
        MemberInfo::getter("PlacingDef", ValueType::Definition),
    ],
    base: None,
};

/// Target with nothing the engine can use.
pub static OPAQUE_TYPE: TypeInfo = TypeInfo {
    name: "Stub.Opaque",
    members: &[MemberInfo::field("label", ValueType::Text)],
    base: None,
};

pub static THING_TYPE: TypeInfo = TypeInfo {
    name: "Stub.Thing",
    members: &[
        MemberInfo::property("Rotation", ValueType::Rotation),
        MemberInfo::field("def", ValueType::Definition),
    ],
    base: None,
};

pub static MINIFIED_TYPE: TypeInfo = TypeInfo {
    name: "Stub.MinifiedThing",
    members: &[MemberInfo::getter("InnerThing", ValueType::Thing)],
    base: Some(&THING_TYPE),
};

/// Same shape as [`MINIFIED_TYPE`] under a different name: not a wrapper.
pub static CRATE_TYPE: TypeInfo = TypeInfo {
    name: "Stub.Crate",
    members: &[MemberInfo::getter("InnerThing", ValueType::Thing)],
    base: Some(&THING_TYPE),
};

// =============================================================================
// STUB OBJECT
// =============================================================================

/// Host object backed by a member table that counts reads and can be torn
/// down.
pub struct StubObject {
    info: &'static TypeInfo,
    values: Mutex<HashMap<&'static str, Value>>,
    reads: AtomicUsize,
    disposed: AtomicBool,
}

impl StubObject {
    pub fn new(info: &'static TypeInfo) -> Self {
        Self { info, values: Mutex::new(HashMap::new()), reads: AtomicUsize::new(0), disposed: AtomicBool::new(false) }
    }

    pub fn with(self, member: &'static str, value: Value) -> Self {
        self.values.lock().unwrap().insert(member, value);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Reads attempted so far, including failed ones.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make every subsequent access fail.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    /// Raw member value, bypassing the access path.
    pub fn peek(&self, member: &str) -> Value {
        self.values.lock().unwrap().get(member).cloned().unwrap_or(Value::Null)
    }

    pub fn rotation(&self, member: &str) -> Option<Rotation> {
        self.peek(member).as_rotation()
    }

    fn member(&self, name: &str) -> Result<&'static MemberInfo, AccessError> {
        self.info
            .find(name, MemberKind::Field)
            .or_else(|| self.info.find(name, MemberKind::Property))
            .ok_or_else(|| AccessError::NoSuchMember { type_name: self.info.name, member: name.to_string() })
    }
}

impl Introspect for StubObject {
    fn type_info(&self) -> &'static TypeInfo {
        self.info
    }

    fn read(&self, member: &str) -> Result<Value, AccessError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.disposed.load(Ordering::SeqCst) {
            return Err(AccessError::Disposed);
        }
        let info = self.member(member)?;
        Ok(self.values.lock().unwrap().get(info.name).cloned().unwrap_or(Value::Null))
    }

    fn write(&self, member: &str, value: Value) -> Result<(), AccessError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(AccessError::Disposed);
        }
        let info = self.member(member)?;
        if !info.writable {
            return Err(AccessError::ReadOnly { member: member.to_string() });
        }
        self.values.lock().unwrap().insert(info.name, value);
        Ok(())
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

pub fn definition(rotatable: bool) -> Arc<Definition> {
    Arc::new(Definition::thing("Stub_Bench", rotatable))
}

pub fn terrain_definition() -> Arc<Definition> {
    Arc::new(Definition { def_name: "Stub_Floor".into(), kind: DefKind::Terrain, rotatable: true })
}

/// Erase the concrete type.
pub fn object(stub: &Arc<StubObject>) -> ObjectRef {
    stub.clone()
}

/// Build target facing south.
pub fn build_target(rotatable: bool) -> Arc<StubObject> {
    StubObject::new(&BUILD_TYPE)
        .with("placingRot", Value::Rotation(Rotation::South))
        .with("PlacingDef", Value::Definition(definition(rotatable)))
        .shared()
}

/// Build target facing south that holds a non-thing object in `Map`.
pub fn mapped_build_target(rotatable: bool) -> Arc<StubObject> {
    let map = StubObject::new(&OPAQUE_TYPE).with("label", Value::Text("Map".into())).shared();
    StubObject::new(&MAPPED_BUILD_TYPE)
        .with("placingRot", Value::Rotation(Rotation::South))
        .with("PlacingDef", Value::Definition(definition(rotatable)))
        .with("Map", Value::Object(object(&map)))
        .shared()
}

pub fn thing(rotatable: bool, rotation: Rotation) -> Arc<StubObject> {
    StubObject::new(&THING_TYPE)
        .with("Rotation", Value::Rotation(rotation))
        .with("def", Value::Definition(definition(rotatable)))
        .shared()
}

/// Packaged wrapper around `inner`; the wrapper's own definition is never
/// rotatable.
pub fn minified(inner: &Arc<StubObject>) -> Arc<StubObject> {
    StubObject::new(&MINIFIED_TYPE)
        .with("def", Value::Definition(Arc::new(Definition::thing("MinifiedThing", false))))
        .with("InnerThing", Value::Object(object(inner)))
        .shared()
}

/// Install/reinstall target facing south whose source object is `source`.
pub fn sourced_target(source: &Arc<StubObject>, target_rotatable: bool) -> Arc<StubObject> {
    StubObject::new(&INSTALL_TYPE)
        .with("placingRot", Value::Rotation(Rotation::South))
        .with("PlacingDef", Value::Definition(definition(target_rotatable)))
        .with("MiniToInstallOrBuildingToReinstall", Value::Object(object(source)))
        .shared()
}

pub fn install_target(rotatable: bool) -> Arc<StubObject> {
    let inner = thing(rotatable, Rotation::South);
    sourced_target(&minified(&inner), false)
}

pub fn reinstall_target(rotatable: bool, source_rotation: Rotation) -> Arc<StubObject> {
    sourced_target(&thing(rotatable, source_rotation), false)
}

pub fn sound(name: &str) -> Value {
    Value::Sound(SoundHandle::new(name))
}
