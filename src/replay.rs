//! Scripted host and scenario replay.
//!
//! DESIGN
//! ======
//! A scenario is a JSON document describing one placement target, the host's
//! legality rules and a script of input events. [`run`] builds a
//! [`ScriptedHost`] that behaves like a real placement pipeline (it asks the
//! engine before committing, before playing sounds and when reporting the
//! pointer cell) and drives the engine through the script, recording every
//! host side effect.
//!
//! TRADE-OFFS
//! ==========
//! The host holds a weak reference back to its engine so its own pipeline can
//! re-enter it. Without an attached engine the host behaves as if no engine
//! were installed.

#[cfg(test)]
#[path = "replay_test.rs"]
mod replay_test;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use serde::{Deserialize, Serialize};

use crate::consts::{MINIFIED_TYPE_NAME, SOUND_PLACE};
use crate::engine::RotationEngine;
use crate::grid::{Cell, Rotation};
use crate::host::{Legality, PlacementHost, SoundLocation};
use crate::input::{Disposition, FrameInput, GesturePhase, HostPointerEvent, RotateKey};
use crate::introspect::{AccessError, Definition, Introspect, MemberInfo, MemberKind, ObjectRef, SoundHandle, TypeInfo, Value, ValueType};
use crate::settings::Settings;

/// Engine wired to a scripted host.
pub type ScriptedEngine = RotationEngine<Arc<ScriptedHost>>;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to read scenario {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_json::Error),
}

// =============================================================================
// HOST TYPES
// =============================================================================

static DESIGNATOR: TypeInfo = TypeInfo {
    name: "Designator",
    members: &[MemberInfo::field("soundSucceeded", ValueType::Sound)],
    base: None,
};

static DESIGNATOR_PLACE: TypeInfo = TypeInfo {
    name: "Designator_Place",
    members: &[
        MemberInfo::field("placingRot", ValueType::Rotation),
        MemberInfo::getter("PlacingDef", ValueType::Definition),
    ],
    base: Some(&DESIGNATOR),
};

static DESIGNATOR_BUILD: TypeInfo = TypeInfo { name: "Designator_Build", members: &[], base: Some(&DESIGNATOR_PLACE) };

static DESIGNATOR_INSTALL: TypeInfo = TypeInfo {
    name: "Designator_Install",
    members: &[MemberInfo::getter("MiniToInstallOrBuildingToReinstall", ValueType::Thing)],
    base: Some(&DESIGNATOR_PLACE),
};

static THING: TypeInfo = TypeInfo {
    name: "Thing",
    members: &[
        MemberInfo::property("Rotation", ValueType::Rotation),
        MemberInfo::field("def", ValueType::Definition),
    ],
    base: None,
};

static MINIFIED_THING: TypeInfo = TypeInfo {
    name: MINIFIED_TYPE_NAME,
    members: &[MemberInfo::getter("InnerThing", ValueType::Thing)],
    base: Some(&THING),
};

/// Host object backed by a member table.
pub struct ScriptedObject {
    info: &'static TypeInfo,
    values: Mutex<HashMap<&'static str, Value>>,
}

impl ScriptedObject {
    #[must_use]
    pub fn new(info: &'static TypeInfo) -> Self {
        Self { info, values: Mutex::new(HashMap::new()) }
    }

    /// Seed a member value, bypassing writability.
    #[must_use]
    pub fn with(self, member: &'static str, value: Value) -> Self {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).insert(member, value);
        self
    }

    fn member(&self, name: &str) -> Result<&'static MemberInfo, AccessError> {
        self.info
            .find(name, MemberKind::Field)
            .or_else(|| self.info.find(name, MemberKind::Property))
            .ok_or_else(|| AccessError::NoSuchMember { type_name: self.info.name, member: name.to_string() })
    }
}

fn value_type(value: &Value) -> Option<ValueType> {
    match value {
        Value::Null => None,
        Value::Rotation(_) => Some(ValueType::Rotation),
        Value::Definition(_) => Some(ValueType::Definition),
        Value::Object(object) if object.type_info().ancestry().any(|t| std::ptr::eq(t, &THING)) => {
            Some(ValueType::Thing)
        }
        Value::Object(_) => Some(ValueType::Object),
        Value::Sound(_) => Some(ValueType::Sound),
        Value::Int(_) => Some(ValueType::Int),
        Value::Bool(_) => Some(ValueType::Bool),
        Value::Text(_) => Some(ValueType::Text),
    }
}

impl Introspect for ScriptedObject {
    fn type_info(&self) -> &'static TypeInfo {
        self.info
    }

    fn read(&self, member: &str) -> Result<Value, AccessError> {
        let info = self.member(member)?;
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(info.name).cloned().unwrap_or(Value::Null))
    }

    fn write(&self, member: &str, value: Value) -> Result<(), AccessError> {
        let info = self.member(member)?;
        if !info.writable {
            return Err(AccessError::ReadOnly { member: member.to_string() });
        }
        if value_type(&value).is_some_and(|ty| !info.ty.accepts(ty)) {
            return Err(AccessError::TypeMismatch { member: member.to_string(), expected: info.ty });
        }
        self.values.lock().unwrap_or_else(PoisonError::into_inner).insert(info.name, value);
        Ok(())
    }
}

// =============================================================================
// SCENARIO
// =============================================================================

/// Which placement workflow the scripted target belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetWorkflow {
    #[default]
    Build,
    Install,
    Reinstall,
}

/// The scripted placement target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    #[serde(default)]
    pub workflow: TargetWorkflow,
    pub definition: Definition,
    /// Rotation the target starts with.
    #[serde(default)]
    pub rotation: Rotation,
    /// Rotation of the object being installed or reinstalled.
    #[serde(default)]
    pub source_rotation: Option<Rotation>,
    /// The target's own success sound.
    #[serde(default)]
    pub success_sound: Option<String>,
}

impl TargetSpec {
    /// Build the host object graph for this target.
    #[must_use]
    pub fn build(&self) -> ObjectRef {
        let def = Arc::new(self.definition.clone());
        let mut designator = ScriptedObject::new(match self.workflow {
            TargetWorkflow::Build => &DESIGNATOR_BUILD,
            TargetWorkflow::Install | TargetWorkflow::Reinstall => &DESIGNATOR_INSTALL,
        })
        .with("placingRot", Value::Rotation(self.rotation))
        .with("PlacingDef", Value::Definition(Arc::clone(&def)));
        if let Some(sound) = &self.success_sound {
            designator = designator.with("soundSucceeded", Value::Sound(SoundHandle::new(sound.as_str())));
        }

        let source_rotation = self.source_rotation.unwrap_or_default();
        let thing = || -> ObjectRef {
            Arc::new(
                ScriptedObject::new(&THING)
                    .with("Rotation", Value::Rotation(source_rotation))
                    .with("def", Value::Definition(Arc::clone(&def))),
            )
        };
        let source: Option<ObjectRef> = match self.workflow {
            TargetWorkflow::Build => None,
            TargetWorkflow::Reinstall => Some(thing()),
            TargetWorkflow::Install => {
                let wrapper_def = Definition::thing(MINIFIED_TYPE_NAME, false);
                Some(Arc::new(
                    ScriptedObject::new(&MINIFIED_THING)
                        .with("def", Value::Definition(Arc::new(wrapper_def)))
                        .with("InnerThing", Value::Object(thing())),
                ))
            }
        };
        if let Some(source) = source {
            designator = designator.with("MiniToInstallOrBuildingToReinstall", Value::Object(source));
        }
        Arc::new(designator)
    }
}

/// A cell the host refuses, with its reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRule {
    pub cell: Cell,
    #[serde(default)]
    pub reason: String,
}

/// One scripted input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// Select the target.
    Select,
    /// Clear the selection.
    Deselect,
    /// Move the live pointer.
    Pointer { x: i32, z: i32 },
    /// One polled host frame.
    Frame {
        #[serde(flatten)]
        input: FrameInput,
    },
    Down,
    Move,
    Key { key: RotateKey },
    Up,
    /// A primary click routed through the host's own input handling.
    HostClick,
    /// Any other raw event the host dispatches (releases, secondary buttons).
    HostEvent { kind: HostPointerEvent },
    /// Replace the engine settings.
    Settings { settings: Settings },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub settings: Settings,
    pub target: TargetSpec,
    #[serde(default)]
    pub rejections: Vec<RejectRule>,
    /// Live pointer cell before the first event.
    #[serde(default)]
    pub pointer: Cell,
    pub events: Vec<ScriptEvent>,
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ReplayError::Io { path: path.display().to_string(), source })?;
        Self::from_json(&text)
    }
}

// =============================================================================
// SCRIPTED HOST
// =============================================================================

/// A side effect the host performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum HostCall {
    Commit { cell: Cell },
    /// The host's own commit gate refused the placement.
    CommitBlocked { cell: Cell },
    Sound { name: String, location: SoundLocation },
    SoundSuppressed { name: String },
    Rejection { reason: String },
}

/// In-memory placement pipeline.
#[derive(Default)]
pub struct ScriptedHost {
    pointer: Mutex<Cell>,
    rejections: Mutex<HashMap<Cell, String>>,
    missing_sounds: Mutex<Vec<String>>,
    calls: Mutex<Vec<HostCall>>,
    engine: OnceLock<Weak<ScriptedEngine>>,
}

impl ScriptedHost {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create an engine for this host and let the host pipeline consult it.
    #[must_use]
    pub fn attach(self: &Arc<Self>, settings: Settings) -> Arc<ScriptedEngine> {
        let engine = Arc::new(RotationEngine::new(Arc::clone(self), settings));
        if self.engine.set(Arc::downgrade(&engine)).is_err() {
            tracing::warn!("scripted host already has an engine; keeping the first");
        }
        engine
    }

    fn engine(&self) -> Option<Arc<ScriptedEngine>> {
        self.engine.get().and_then(Weak::upgrade)
    }

    pub fn set_pointer(&self, cell: Cell) {
        *self.pointer.lock().unwrap_or_else(PoisonError::into_inner) = cell;
    }

    pub fn reject(&self, cell: Cell, reason: impl Into<String>) {
        self.rejections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cell, reason.into());
    }

    /// Make [`PlacementHost::find_sound`] miss for `name`.
    pub fn remove_sound(&self, name: impl Into<String>) {
        self.missing_sounds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.into());
    }

    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn take_calls(&self) -> Vec<HostCall> {
        std::mem::take(&mut *self.calls.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    /// The host's own handling of a primary click: give the engine first
    /// refusal, then try to place at the reported pointer cell.
    pub fn click(&self, selected: Option<&ObjectRef>) -> Disposition {
        let disposition = match self.engine() {
            Some(engine) => engine.on_host_input_event(selected, HostPointerEvent::PrimaryDown),
            None => Disposition::Proceed,
        };
        if disposition.is_consumed() {
            return disposition;
        }
        if let Some(target) = selected {
            let cell = self.current_pointer_cell();
            let legality = self.is_legal_at(target.as_ref(), cell);
            if legality.accepted {
                self.commit_at(target.as_ref(), cell);
            } else if let Some(reason) = legality.reason {
                let suppressed = self.engine().is_some_and(|e| e.should_suppress_rejection());
                if !suppressed {
                    self.show_rejection_message(&reason);
                }
            }
        }
        disposition
    }
}

impl PlacementHost for ScriptedHost {
    fn is_legal_at(&self, _target: &dyn Introspect, cell: Cell) -> Legality {
        let rejections = self.rejections.lock().unwrap_or_else(PoisonError::into_inner);
        match rejections.get(&cell) {
            Some(reason) => Legality::rejected(reason.clone()),
            None => Legality::accepted(),
        }
    }

    fn commit_at(&self, _target: &dyn Introspect, cell: Cell) {
        let engine = self.engine();
        let selected = engine.as_ref().and_then(|e| e.selected());
        let allowed = match (&engine, &selected) {
            (Some(engine), Some(target)) => engine.on_before_commit_attempt(target),
            _ => true,
        };
        if !allowed {
            self.record(HostCall::CommitBlocked { cell });
            return;
        }
        self.record(HostCall::Commit { cell });
        self.play_sound(&SoundHandle::new(SOUND_PLACE), SoundLocation::TargetMap);
    }

    fn current_pointer_cell(&self) -> Cell {
        if let Some(cell) = self.engine().and_then(|e| e.pointer_cell_override()) {
            return cell;
        }
        *self.pointer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find_sound(&self, name: &str) -> Option<SoundHandle> {
        let missing = self.missing_sounds.lock().unwrap_or_else(PoisonError::into_inner);
        if missing.iter().any(|m| m == name) { None } else { Some(SoundHandle::new(name)) }
    }

    fn play_sound(&self, sound: &SoundHandle, location: SoundLocation) {
        let suppressed = self.engine().is_some_and(|e| e.should_suppress_sound(sound));
        if suppressed {
            self.record(HostCall::SoundSuppressed { name: sound.name().to_string() });
        } else {
            self.record(HostCall::Sound { name: sound.name().to_string(), location });
        }
    }

    fn show_rejection_message(&self, reason: &str) {
        self.record(HostCall::Rejection { reason: reason.to_string() });
    }
}

// =============================================================================
// RUN
// =============================================================================

/// Engine-visible state after one scripted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub index: usize,
    pub rotation: Option<Rotation>,
    pub phase: String,
    pub pinned: Option<Cell>,
    pub consumed: bool,
    pub calls: Vec<HostCall>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub rotatable: bool,
    pub final_rotation: Option<Rotation>,
    pub steps: Vec<Step>,
}

fn phase_name(phase: GesturePhase) -> &'static str {
    match phase {
        GesturePhase::Idle => "idle",
        GesturePhase::Pinned => "pinned",
        GesturePhase::Committing => "committing",
    }
}

/// Replay `scenario` against a fresh engine and scripted host.
#[must_use]
/// Current rotation for the report. An unreadable target reports `None`.
fn read_rotation(engine: &ScriptedEngine, target: &ObjectRef) -> Option<Rotation> {
    match engine.resolver().rotation(target.as_ref()) {
        Ok(rotation) => rotation,
        Err(error) => {
            tracing::debug!(%error, "target rotation unreadable");
            None
        }
    }
}

pub fn run(scenario: &Scenario) -> Report {
    let host = ScriptedHost::new();
    host.set_pointer(scenario.pointer);
    for rule in &scenario.rejections {
        host.reject(rule.cell, rule.reason.clone());
    }
    let engine = host.attach(scenario.settings);
    let target = scenario.target.build();

    let mut steps = Vec::with_capacity(scenario.events.len());
    for (index, event) in scenario.events.iter().enumerate() {
        let selected = engine.selected();
        let consumed = match event {
            ScriptEvent::Select => {
                engine.on_selection_changed(Some(&target));
                false
            }
            ScriptEvent::Deselect => {
                engine.on_selection_changed(None);
                false
            }
            ScriptEvent::Pointer { x, z } => {
                host.set_pointer(Cell::new(*x, *z));
                false
            }
            ScriptEvent::Frame { input } => engine.on_frame_update(&target, *input).is_consumed(),
            ScriptEvent::Down => engine.on_pointer_down(&target),
            ScriptEvent::Move => {
                engine.on_pointer_move(&target);
                false
            }
            ScriptEvent::Key { key } => engine.on_rotate_key(&target, *key),
            ScriptEvent::Up => engine.on_pointer_up(&target),
            ScriptEvent::HostClick => host.click(selected.as_ref()).is_consumed(),
            ScriptEvent::HostEvent { kind } => engine.on_host_input_event(selected.as_ref(), *kind).is_consumed(),
            ScriptEvent::Settings { settings } => {
                engine.update_settings(*settings);
                false
            }
        };
        let rotation = read_rotation(&engine, &target);
        tracing::debug!(index, ?event, ?rotation, consumed, "replayed event");
        steps.push(Step {
            index,
            rotation,
            phase: phase_name(engine.phase(&target)).to_string(),
            pinned: engine.pinned_cell(&target),
            consumed,
            calls: host.take_calls(),
        });
    }

    Report {
        rotatable: engine.is_rotatable(&target),
        final_rotation: read_rotation(&engine, &target),
        steps,
    }
}
