//! Runtime introspection seam between the engine and host objects.
//!
//! DESIGN
//! ======
//! The engine never knows the concrete shape of the objects it is handed.
//! Hosts describe each of their types once with a static [`TypeInfo`]
//! (name, declared members, base type) and implement [`Introspect`] to read
//! and write members by name. The capability resolver walks these descriptors
//! to bind accessors; everything else in the crate only sees the bound
//! accessors.
//!
//! Identity matters, values do not: objects travel as [`ObjectRef`]
//! (`Arc<dyn Introspect>`) and are compared with `Arc::ptr_eq`.

#[cfg(test)]
#[path = "introspect_test.rs"]
mod introspect_test;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::grid::Rotation;

/// Shared handle to a host object.
pub type ObjectRef = Arc<dyn Introspect>;

// =============================================================================
// TYPE DESCRIPTORS
// =============================================================================

/// How a member is accessed on the host type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Plain storage slot.
    Field,
    /// Accessor pair; may be read-only or write-only.
    Property,
}

/// Declared type of a member, as far as the engine cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Rotation,
    Definition,
    /// A placeable host object ("thing") or a subtype of one, such as a
    /// packaged wrapper.
    Thing,
    /// Any other host object (maps, designators, managers).
    Object,
    Sound,
    Int,
    Bool,
    Text,
}

impl ValueType {
    /// Whether a value of declared type `other` can be stored in a member of
    /// this type. Things are objects, not the other way round.
    #[must_use]
    pub fn accepts(self, other: ValueType) -> bool {
        self == other || (self == Self::Object && other == Self::Thing)
    }
}

/// One declared member of a host type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberInfo {
    pub name: &'static str,
    pub kind: MemberKind,
    pub ty: ValueType,
    pub readable: bool,
    pub writable: bool,
}

impl MemberInfo {
    /// A readable and writable field.
    #[must_use]
    pub const fn field(name: &'static str, ty: ValueType) -> Self {
        Self { name, kind: MemberKind::Field, ty, readable: true, writable: true }
    }

    /// A property with a getter and a setter.
    #[must_use]
    pub const fn property(name: &'static str, ty: ValueType) -> Self {
        Self { name, kind: MemberKind::Property, ty, readable: true, writable: true }
    }

    /// A property with only a getter.
    #[must_use]
    pub const fn getter(name: &'static str, ty: ValueType) -> Self {
        Self { name, kind: MemberKind::Property, ty, readable: true, writable: false }
    }
}

/// Static description of a host type.
#[derive(Debug)]
pub struct TypeInfo {
    /// Type name; may be qualified with `.` or `::` separators.
    pub name: &'static str,
    /// Members declared directly on this type.
    pub members: &'static [MemberInfo],
    /// Parent type whose members are inherited.
    pub base: Option<&'static TypeInfo>,
}

/// Identity of a [`TypeInfo`], used as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey(usize);

impl TypeInfo {
    /// Cache key for this descriptor. Descriptors are compared by address.
    #[must_use]
    pub fn key(&'static self) -> TypeKey {
        TypeKey(std::ptr::from_ref(self) as usize)
    }

    /// This type followed by its base chain, most derived first.
    pub fn ancestry(&'static self) -> impl Iterator<Item = &'static TypeInfo> {
        std::iter::successors(Some(self), |t| t.base)
    }

    /// Find a member by exact name and kind, searching the base chain.
    #[must_use]
    pub fn find(&'static self, name: &str, kind: MemberKind) -> Option<&'static MemberInfo> {
        self.ancestry()
            .flat_map(|t| t.members.iter())
            .find(|m| m.kind == kind && m.name == name)
    }

    /// Every member of this type and its bases, most derived first.
    pub fn all_members(&'static self) -> impl Iterator<Item = &'static MemberInfo> {
        self.ancestry().flat_map(|t| t.members.iter())
    }

    /// Last path segment of the type name.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let name = self.name;
        let after_colons = name.rsplit("::").next().unwrap_or(name);
        after_colons.rsplit('.').next().unwrap_or(after_colons)
    }

    /// Whether this type is named `unqualified`, with or without a path prefix.
    #[must_use]
    pub fn is_named(&self, unqualified: &str) -> bool {
        self.short_name() == unqualified
    }
}

// =============================================================================
// VALUES
// =============================================================================

/// Kind of buildable definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefKind {
    /// A placeable object; may be rotatable.
    #[default]
    Thing,
    /// Floor-like definitions; never rotatable.
    Terrain,
}

/// A buildable definition as exposed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub def_name: String,
    #[serde(default)]
    pub kind: DefKind,
    #[serde(default)]
    pub rotatable: bool,
}

impl Definition {
    #[must_use]
    pub fn thing(def_name: impl Into<String>, rotatable: bool) -> Self {
        Self { def_name: def_name.into(), kind: DefKind::Thing, rotatable }
    }

    /// Only thing definitions carry a meaningful rotatable flag.
    #[must_use]
    pub fn is_rotatable(&self) -> bool {
        self.kind == DefKind::Thing && self.rotatable
    }
}

/// Handle to a host sound resource, identified by its definition name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundHandle(pub String);

impl SoundHandle {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// A member value read from or written to a host object.
#[derive(Clone)]
pub enum Value {
    /// The member exists but currently holds nothing.
    Null,
    Rotation(Rotation),
    Definition(Arc<Definition>),
    Object(ObjectRef),
    Sound(SoundHandle),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl Value {
    #[must_use]
    pub fn as_rotation(&self) -> Option<Rotation> {
        match self {
            Self::Rotation(r) => Some(*r),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_definition(self) -> Option<Arc<Definition>> {
        match self {
            Self::Definition(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_object(self) -> Option<ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_sound(self) -> Option<SoundHandle> {
        match self {
            Self::Sound(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Rotation(r) => f.debug_tuple("Rotation").field(r).finish(),
            Self::Definition(d) => f.debug_tuple("Definition").field(&d.def_name).finish(),
            Self::Object(o) => f.debug_tuple("Object").field(&o.type_info().name).finish(),
            Self::Sound(s) => f.debug_tuple("Sound").field(&s.0).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Text(t) => f.debug_tuple("Text").field(t).finish(),
        }
    }
}

// =============================================================================
// ACCESS
// =============================================================================

/// Failure reading or writing a member on a host object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// The object has no member with this name.
    #[error("{type_name} has no member `{member}`")]
    NoSuchMember { type_name: &'static str, member: String },
    /// The member exists but cannot be written.
    #[error("member `{member}` is read-only")]
    ReadOnly { member: String },
    /// The value passed to a write has the wrong type.
    #[error("member `{member}` expects {expected:?}")]
    TypeMismatch { member: String, expected: ValueType },
    /// The host object has been torn down and can no longer be accessed.
    #[error("object has been disposed")]
    Disposed,
}

/// Dynamic member access on a host object.
///
/// Implementations use interior mutability for writes; the engine only ever
/// holds shared references.
pub trait Introspect: Send + Sync {
    /// Static descriptor of the concrete type.
    fn type_info(&self) -> &'static TypeInfo;

    /// Read a member by name.
    fn read(&self, member: &str) -> Result<Value, AccessError>;

    /// Write a member by name.
    fn write(&self, member: &str, _value: Value) -> Result<(), AccessError> {
        Err(AccessError::ReadOnly { member: member.to_string() })
    }
}
