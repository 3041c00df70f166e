//! Shared constants for the rotation engine.

// ── Gesture ─────────────────────────────────────────────────────

/// Chebyshev radius (in cells) around the pinned origin that never rotates.
pub const DEADZONE_CELLS: i32 = 1;

// ── Sounds ──────────────────────────────────────────────────────

/// Played when a gesture pins its origin.
pub const SOUND_PIN: &str = "Designate_DragBuilding_Start";

/// Played whenever the gesture changes the rotation.
pub const SOUND_ROTATE: &str = "DragSlider";

/// Commit sound used when the target declares no success sound of its own.
pub const SOUND_PLACE: &str = "Designate_Place";

/// Generic UI click the host may fire on the pinning pointer-down.
pub const SOUND_CLICK: &str = "Click";

// ── Capability member names ─────────────────────────────────────
//
// Tried in order before falling back to a scan by declared type.

pub const ROTATION_FIELDS: &[&str] = &["placingRot"];
pub const ROTATION_PROPERTIES: &[&str] = &["placingRot", "PlacingRot"];

pub const SOURCE_PROPERTIES: &[&str] = &["MiniToInstallOrBuildingToReinstall", "ThingToInstall"];
pub const SOURCE_FIELDS: &[&str] = &[
    "thingToInstall",
    "ent",
    "installThing",
    "minifiedThing",
    "reinstall",
    "miniToInstallOrBuildingToReinstall",
];

pub const DEFINITION_PROPERTIES: &[&str] =
    &["PlacingDef", "placingDef", "EntDef", "entDef", "BuildableDef", "buildableDef"];
pub const DEFINITION_FIELDS: &[&str] = &["placingDef", "entDef", "buildableDef", "defToPlace"];

pub const SOUND_FIELDS: &[&str] = &["soundSucceeded"];
pub const SOUND_PROPERTIES: &[&str] = &["soundSucceeded"];

// ── Thing member names ──────────────────────────────────────────

pub const THING_ROTATION_PROPERTIES: &[&str] = &["Rotation"];
pub const THING_ROTATION_FIELDS: &[&str] = &["rotation"];
pub const THING_DEFINITION_FIELDS: &[&str] = &["def"];
pub const THING_DEFINITION_PROPERTIES: &[&str] = &["Def"];
pub const THING_INNER_PROPERTIES: &[&str] = &["InnerThing"];

/// Unqualified type name of the packaged-object wrapper.
pub const MINIFIED_TYPE_NAME: &str = "MinifiedThing";
