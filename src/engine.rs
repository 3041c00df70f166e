//! The rotation engine: gesture state machine and host-facing entry points.
//!
//! ARCHITECTURE
//! ============
//! Every host extension point is a thin adapter onto one state-machine input:
//!
//! | Host event | Entry point |
//! |------------|-------------|
//! | primary pointer-down | [`RotationEngine::on_pointer_down`] |
//! | pointer held / moved | [`RotationEngine::on_pointer_move`] |
//! | rotate key while held | [`RotationEngine::on_rotate_key`] |
//! | primary pointer-up | [`RotationEngine::on_pointer_up`] |
//! | host's own commit path | [`RotationEngine::on_before_commit_attempt`] |
//! | selection changed | [`RotationEngine::on_selection_changed`] |
//! | polled per-frame update | [`RotationEngine::on_frame_update`] |
//! | host pointer-cell query | [`RotationEngine::current_pointer_cell_override`] |
//!
//! Session and per-instance caches sit behind one mutex; capability caches
//! live in the resolver. No lock is held across a host call, so the host may
//! re-enter the engine from `commit_at`, `play_sound` or its pointer query.
//!
//! ERRORS
//! ======
//! Nothing escapes an entry point. Failures degrade to "let the host proceed"
//! and are logged at debug level when `debug_logs` is on, once per pin session
//! and message key.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use crate::capability::CapabilityResolver;
use crate::classify::{RotatabilityCache, Workflow, classify_workflow, compute_rotatable};
use crate::consts::{SOUND_CLICK, SOUND_PLACE};
use crate::error::EngineError;
use crate::feedback::{FeedbackDispatcher, FeedbackKind};
use crate::grid::{Cell, Rotation, drag_rotation};
use crate::host::PlacementHost;
use crate::input::{Disposition, FrameInput, GesturePhase, HostPointerEvent, RotateKey};
use crate::introspect::{Introspect, ObjectRef, SoundHandle};
use crate::policy;
use crate::session::{PinOutcome, SessionStore};
use crate::settings::Settings;

/// Mutable engine state guarded by the engine's single mutex.
#[derive(Default)]
struct EngineState {
    sessions: SessionStore,
    rotatable: RotatabilityCache,
    /// Target most recently reported by the host as selected.
    selected: Option<Weak<dyn Introspect>>,
    /// Target whose release is being committed or rejected right now.
    committing: Option<Weak<dyn Introspect>>,
    /// Rejection messages raised during the current host input event should
    /// be swallowed.
    suppress_rejections: bool,
    /// The host's next pointer-attachment warning should be swallowed.
    suppress_attachment_once: bool,
}

// Compares addresses without upgrading, so no strong reference is ever
// created (or released) under the state lock.
fn is_same(weak: Option<&Weak<dyn Introspect>>, target: &ObjectRef) -> bool {
    weak.is_some_and(|w| std::ptr::addr_eq(w.as_ptr(), Arc::as_ptr(target)))
}

/// Restores the raw-pointer flag when dropped.
struct RawPointerRead<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl Drop for RawPointerRead<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::Release);
    }
}

/// Gesture-driven rotation override engine for one host.
pub struct RotationEngine<H> {
    host: H,
    settings: RwLock<Settings>,
    resolver: CapabilityResolver,
    feedback: FeedbackDispatcher,
    state: Mutex<EngineState>,
    reading_raw_pointer: AtomicBool,
}

impl<H: PlacementHost> RotationEngine<H> {
    #[must_use]
    pub fn new(host: H, settings: Settings) -> Self {
        Self {
            host,
            settings: RwLock::new(settings),
            resolver: CapabilityResolver::new(),
            feedback: FeedbackDispatcher::new(),
            state: Mutex::new(EngineState::default()),
            reading_raw_pointer: AtomicBool::new(false),
        }
    }

    // --- Accessors ---

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    #[must_use]
    pub fn resolver(&self) -> &CapabilityResolver {
        &self.resolver
    }

    /// Snapshot of the current settings.
    #[must_use]
    pub fn settings(&self) -> Settings {
        *self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the settings. Takes effect on the next event.
    pub fn update_settings(&self, settings: Settings) {
        let previous = {
            let mut guard = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, settings)
        };
        if previous.debug_logs != settings.debug_logs {
            tracing::info!(enabled = settings.debug_logs, "rotation engine debug logs toggled");
        }
        if previous.gesture_enabled != settings.gesture_enabled {
            tracing::info!(enabled = settings.gesture_enabled, "pointer rotation toggled");
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Queries ---

    /// Gesture phase for `target`.
    #[must_use]
    pub fn phase(&self, target: &ObjectRef) -> GesturePhase {
        let state = self.state();
        if is_same(state.committing.as_ref(), target) {
            GesturePhase::Committing
        } else if state.sessions.pinned(target).is_some() {
            GesturePhase::Pinned
        } else {
            GesturePhase::Idle
        }
    }

    /// Entries held across the per-target side tables, including dropped
    /// targets that have not been pruned yet.
    #[must_use]
    pub fn tracked_entries(&self) -> usize {
        let state = self.state();
        state.sessions.len() + state.rotatable.len()
    }

    /// Gesture origin for `target`, while a gesture is active.
    #[must_use]
    pub fn pinned_cell(&self, target: &ObjectRef) -> Option<Cell> {
        self.state().sessions.pinned(target)
    }

    /// Whether an override has been applied to `target` this selection.
    #[must_use]
    pub fn was_applied(&self, target: &ObjectRef) -> bool {
        self.state().sessions.was_applied(target)
    }

    /// Rotatability fact cached for `target`, if any.
    #[must_use]
    pub fn cached_rotatability(&self, target: &ObjectRef) -> Option<bool> {
        self.state().rotatable.cached(target)
    }

    /// The most recently selected target, while it is still alive.
    #[must_use]
    pub fn selected(&self) -> Option<ObjectRef> {
        self.state().selected.as_ref().and_then(Weak::upgrade)
    }

    /// Memoized rotatability of `target`. Unreadable targets are not rotatable.
    pub fn is_rotatable(&self, target: &ObjectRef) -> bool {
        let cached = self.state().rotatable.cached(target);
        if let Some(fact) = cached {
            return fact;
        }
        let fact = match compute_rotatable(&self.resolver, target) {
            Ok(fact) => fact,
            Err(e) => {
                self.debug_once(target, "rotatable-read", || format!("rotatability unreadable: {e}"));
                false
            }
        };
        self.state().rotatable.store(target, fact);
        fact
    }

    /// Whether pointer gestures apply to `target` at all.
    pub fn gesture_enabled_for(&self, target: &ObjectRef) -> bool {
        self.settings().gesture_enabled && self.is_rotatable(target)
    }

    // --- Pointer gesture ---

    /// Primary pointer pressed. Pins the gesture origin for rotatable targets.
    ///
    /// Returns `true` when the event is consumed and the host must not run its
    /// own click-to-place behavior. Pressing again while pinned keeps the
    /// original origin.
    pub fn on_pointer_down(&self, target: &ObjectRef) -> bool {
        if !self.gesture_enabled_for(target) {
            return false;
        }
        self.pin(target);
        true
    }

    /// Pointer held or moved while a gesture is active.
    pub fn on_pointer_move(&self, target: &ObjectRef) {
        self.drag(target, None);
    }

    /// Rotate key pressed while a gesture is active.
    ///
    /// Only honored when the pointer has not moved since the last gesture
    /// frame; the keyboard then latches and pointer-driven rotation stays off
    /// until the pointer cell changes. Returns whether the key rotated.
    pub fn on_rotate_key(&self, target: &ObjectRef, key: RotateKey) -> bool {
        self.drag(target, Some(key))
    }

    /// Primary pointer released. Commits at the pinned cell when the host
    /// accepts it, otherwise shows the rejection and keeps the rotation.
    ///
    /// Returns `true` when a gesture was active and the event is consumed.
    pub fn on_pointer_up(&self, target: &ObjectRef) -> bool {
        let pinned = self.state().sessions.pinned(target);
        let Some(cell) = pinned else {
            return false;
        };
        self.state().committing = Some(Arc::downgrade(target));

        let legality = self.host.is_legal_at(target.as_ref(), cell);
        if legality.accepted {
            self.state().sessions.arm_placement(target);
            self.host.commit_at(target.as_ref(), cell);
            self.feedback
                .notify(&self.host, &self.resolver, FeedbackKind::Commit, target.as_ref());
            self.state().sessions.unmark_applied(target);
            self.debug(target, || format!("committed at {cell}"));
        } else {
            match legality.reason.as_deref() {
                Some(reason) if !reason.is_empty() => self.host.show_rejection_message(reason),
                _ => {}
            }
            self.debug(target, || format!("placement at {cell} rejected"));
        }

        let mut state = self.state();
        state.sessions.clear(target);
        state.committing = None;
        true
    }

    /// Gate for the host's own commit path.
    ///
    /// While gestures apply to `target`, a direct commit with nothing pinned
    /// pins at the live pointer instead and is blocked. While pinned, only a
    /// commit the engine itself armed on release passes, exactly once.
    pub fn on_before_commit_attempt(&self, target: &ObjectRef) -> bool {
        if !self.gesture_enabled_for(target) {
            return true;
        }
        let pinned = self.state().sessions.pinned(target).is_some();
        if !pinned {
            self.pin(target);
            return false;
        }
        self.state().sessions.take_armed(target)
    }

    /// Selection changed to `target` (or to nothing).
    ///
    /// Aborts any gesture regardless of phase and drops every per-selection
    /// fact: sessions, applied-once flags, rotatability and log dedup.
    pub fn on_selection_changed(&self, target: Option<&ObjectRef>) {
        let mut state = self.state();
        if let Some(previous) = state.selected.take() {
            state.sessions.remove_weak(&previous);
        }
        if let Some(target) = target {
            state.sessions.remove(target);
        }
        state.rotatable.clear();
        state.sessions.clear_transient_all();
        state.committing = None;
        state.suppress_rejections = false;
        state.suppress_attachment_once = false;
        state.selected = target.map(Arc::downgrade);
    }

    /// Polled per-frame update for the selected target.
    ///
    /// Applies the workflow's configured override (once per selection), then
    /// replays the frame's pointer and keyboard state in host order.
    pub fn on_frame_update(&self, target: &ObjectRef, input: FrameInput) -> Disposition {
        self.apply_workflow_override(target);

        let mut consumed = false;
        if input.pointer_down {
            consumed |= self.on_pointer_down(target);
        }
        if input.pointer_held {
            self.drag(target, input.rotate);
        }
        if input.pointer_up {
            consumed |= self.on_pointer_up(target);
        }
        if consumed { Disposition::Consumed } else { Disposition::Proceed }
    }

    /// Pinned cell to report instead of the live pointer, while a gesture is
    /// active, so in-progress legality previews follow the pin.
    ///
    /// Always `None` while the engine itself is reading the live pointer.
    pub fn current_pointer_cell_override(&self, target: &ObjectRef) -> Option<Cell> {
        if self.reading_raw_pointer.load(Ordering::Acquire) {
            return None;
        }
        let any_pinned = self.state().sessions.has_any_pinned();
        if !any_pinned || !self.gesture_enabled_for(target) {
            return None;
        }
        self.state().sessions.pinned(target)
    }

    /// [`Self::current_pointer_cell_override`] for the selected target, for
    /// host queries that carry no target.
    pub fn pointer_cell_override(&self) -> Option<Cell> {
        let target = self.selected()?;
        self.current_pointer_cell_override(&target)
    }

    // --- Overrides ---

    /// Write `rotation` unless an override was already applied this selection.
    /// Marks the target applied on success.
    pub fn apply_override_once(&self, target: &ObjectRef, rotation: Rotation) -> bool {
        if self.state().sessions.was_applied(target) {
            return false;
        }
        match self.resolver.set_rotation(target.as_ref(), rotation) {
            Ok(true) => {
                self.state().sessions.mark_applied(target);
                self.debug(target, || format!("applied override {rotation}"));
                true
            }
            Ok(false) => {
                let err = EngineError::NoRotationSetter { type_name: target.type_info().name };
                self.debug_once(target, "override-no-setter", || err.to_string());
                false
            }
            Err(e) => {
                self.debug_once(target, "override-write", || format!("override write failed: {e}"));
                false
            }
        }
    }

    /// Consult the override policy for the target's workflow and apply the
    /// result once. Returns the rotation applied, if any.
    pub fn apply_workflow_override(&self, target: &ObjectRef) -> Option<Rotation> {
        if self.state().sessions.was_applied(target) {
            return None;
        }
        if !self.is_rotatable(target) {
            return None;
        }
        let workflow = match classify_workflow(&self.resolver, target) {
            Ok(workflow) => workflow,
            Err(e) => {
                self.debug_once(target, "workflow-read", || format!("workflow unreadable: {e}"));
                return None;
            }
        };
        if let Workflow::Reinstall { source_rotation: None } = workflow {
            self.debug_once(target, "keep-rotation-source", || "source rotation unreadable".to_string());
        }
        let settings = self.settings();
        let applied = self.state().sessions.was_applied(target);
        let desired = policy::decide(workflow, &settings.overrides, applied)?;
        self.apply_override_once(target, desired).then_some(desired)
    }

    // --- Host integration queries ---

    /// Whether the host should swallow `sound` instead of playing it.
    ///
    /// The engine's own feedback always passes. Otherwise, while the selected
    /// target has an active gesture, placement and click sounds the host fires
    /// on its own are suppressed.
    pub fn should_suppress_sound(&self, sound: &SoundHandle) -> bool {
        if self.feedback.take_allowance() {
            return false;
        }
        let Some(target) = self.selected() else {
            return false;
        };
        let pinned = self.state().sessions.pinned(&target).is_some();
        if !pinned || !self.gesture_enabled_for(&target) {
            return false;
        }
        if let Ok(Some(own)) = self.resolver.feedback_sound(target.as_ref()) {
            if own == *sound {
                return true;
            }
        }
        sound.name() == SOUND_PLACE || sound.name() == SOUND_CLICK
    }

    /// Called before the host dispatches a pointer event to its own
    /// placement input handling.
    ///
    /// A primary press on a gesture-enabled selection flags rejection
    /// messages for suppression for the rest of the event, and is consumed
    /// outright while any gesture is pinned.
    pub fn on_host_input_event(&self, selected: Option<&ObjectRef>, event: HostPointerEvent) -> Disposition {
        self.state().suppress_rejections = false;
        let Some(target) = selected else {
            return Disposition::Proceed;
        };
        if event != HostPointerEvent::PrimaryDown || !self.gesture_enabled_for(target) {
            return Disposition::Proceed;
        }
        let mut state = self.state();
        state.suppress_rejections = true;
        if state.sessions.has_any_pinned() { Disposition::Consumed } else { Disposition::Proceed }
    }

    /// Whether a rejection message raised now should be swallowed.
    #[must_use]
    pub fn should_suppress_rejection(&self) -> bool {
        self.state().suppress_rejections
    }

    /// Consume the one-shot "ignore the next pointer-attachment warning" flag
    /// set when a gesture pins.
    pub fn take_pointer_attachment_suppression(&self) -> bool {
        std::mem::take(&mut self.state().suppress_attachment_once)
    }

    // --- Internals ---

    /// Live pointer cell, bypassing [`Self::current_pointer_cell_override`].
    fn raw_pointer_cell(&self) -> Cell {
        let _restore = RawPointerRead {
            flag: &self.reading_raw_pointer,
            previous: self.reading_raw_pointer.swap(true, Ordering::AcqRel),
        };
        self.host.current_pointer_cell()
    }

    /// Pin at the live pointer if nothing is pinned yet.
    fn pin(&self, target: &ObjectRef) {
        let already = self.state().sessions.pinned(target).is_some();
        if already {
            return;
        }
        let cell = self.raw_pointer_cell();
        let outcome = {
            let mut state = self.state();
            let outcome = state.sessions.pin(target, cell);
            if matches!(outcome, PinOutcome::Pinned { .. }) {
                state.suppress_attachment_once = true;
            }
            outcome
        };
        if let PinOutcome::Pinned { session_id } = outcome {
            self.debug(target, || format!("pinned at {cell} (session {session_id})"));
            self.feedback
                .notify(&self.host, &self.resolver, FeedbackKind::Pin, target.as_ref());
        }
    }

    /// One gesture frame: observe the pointer, honor a stationary rotate key,
    /// then steer by drag direction unless the keyboard holds the latch.
    fn drag(&self, target: &ObjectRef, key: Option<RotateKey>) -> bool {
        let pinned = self.state().sessions.pinned(target);
        let Some(pin) = pinned else {
            return false;
        };
        let pointer = self.raw_pointer_cell();
        let moved = self.state().sessions.observe_pointer(target, pointer);

        let mut key_rotated = false;
        if let Some(key) = key.filter(|_| !moved) {
            match self.resolver.rotation(target.as_ref()) {
                Ok(Some(current)) => {
                    self.rotate_to(target, current.turned(key.quarter_turns()));
                    self.state().sessions.latch_keyboard(target);
                    key_rotated = true;
                }
                Ok(None) => {
                    self.debug_once(target, "key-no-rotation", || "rotation unreadable; key ignored".to_string());
                }
                Err(e) => {
                    self.debug_once(target, "key-read", || format!("rotation read failed: {e}"));
                }
            }
        }

        let latched = self.state().sessions.is_latched(target);
        if !latched {
            if let Some(desired) = drag_rotation(pin, pointer) {
                self.rotate_to(target, desired);
            }
        }
        key_rotated
    }

    /// Set the rotation and give feedback, only when it actually changes.
    fn rotate_to(&self, target: &ObjectRef, rotation: Rotation) {
        match self.write_rotation(target.as_ref(), rotation) {
            Ok(true) => {
                self.feedback
                    .notify(&self.host, &self.resolver, FeedbackKind::Rotate, target.as_ref());
            }
            Ok(false) => {}
            Err(e) => self.debug_once(target, "rotate-write", || format!("rotation write failed: {e}")),
        }
    }

    /// Write `rotation` if it differs from the current value. An unreadable
    /// current value counts as different.
    fn write_rotation(&self, target: &dyn Introspect, rotation: Rotation) -> Result<bool, EngineError> {
        let current = self.resolver.rotation(target)?;
        if current == Some(rotation) {
            return Ok(false);
        }
        if self.resolver.set_rotation(target, rotation)? {
            Ok(true)
        } else {
            Err(EngineError::NoRotationSetter { type_name: target.type_info().name })
        }
    }

    fn debug(&self, target: &ObjectRef, message: impl FnOnce() -> String) {
        if self.settings().debug_logs {
            tracing::debug!(type_name = target.type_info().name, "{}", message());
        }
    }

    /// Debug log deduplicated per pin session and `key`.
    fn debug_once(&self, target: &ObjectRef, key: &'static str, message: impl FnOnce() -> String) {
        if !self.settings().debug_logs {
            return;
        }
        let first = self.state().sessions.first_log(target, key);
        if first {
            tracing::debug!(type_name = target.type_info().name, key, "{}", message());
        }
    }
}
