//! Per-target side tables and the gesture session store.
//!
//! DESIGN
//! ======
//! Targets are owned by the host and compared by identity. Side state is kept
//! in a [`WeakMap`]: entries are keyed by the target's address and hold a
//! `Weak` back-reference, so the engine never extends a target's lifetime and
//! can tell a live entry from one whose target was dropped (and whose address
//! may since have been reused). Dead entries are pruned lazily whenever a new
//! key is inserted, so growth stays bounded even if the host never reports a
//! selection change for a dropped target.
//!
//! The store itself is not synchronized; the engine owns it behind its single
//! state mutex.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use crate::grid::Cell;
use crate::introspect::{Introspect, ObjectRef};

// =============================================================================
// WEAK MAP
// =============================================================================

/// Identity of a target: the address of its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetKey(usize);

impl TargetKey {
    #[must_use]
    pub fn of(target: &ObjectRef) -> Self {
        Self(Arc::as_ptr(target).cast::<()>() as usize)
    }

    /// Key of a possibly dropped target. Matches [`TargetKey::of`] while any
    /// `Weak` to the allocation is held.
    #[must_use]
    pub fn of_weak(target: &Weak<dyn Introspect>) -> Self {
        Self(target.as_ptr().cast::<()>() as usize)
    }
}

struct Entry<V> {
    target: Weak<dyn Introspect>,
    value: V,
}

impl<V> Entry<V> {
    fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }
}

/// Map from target identity to side state that does not keep targets alive.
pub struct WeakMap<V> {
    entries: HashMap<TargetKey, Entry<V>>,
}

impl<V> Default for WeakMap<V> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<V> WeakMap<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, target: &ObjectRef) -> Option<&V> {
        self.entries
            .get(&TargetKey::of(target))
            .filter(|e| e.is_live())
            .map(|e| &e.value)
    }

    pub fn get_mut(&mut self, target: &ObjectRef) -> Option<&mut V> {
        self.entries
            .get_mut(&TargetKey::of(target))
            .filter(|e| e.is_live())
            .map(|e| &mut e.value)
    }

    /// Value for `target`, inserting `make()` if absent or stale.
    pub fn get_or_insert_with(&mut self, target: &ObjectRef, make: impl FnOnce() -> V) -> &mut V {
        let key = TargetKey::of(target);
        if !self.entries.get(&key).is_some_and(Entry::is_live) {
            self.prune();
        }
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| Entry { target: Arc::downgrade(target), value: make() });
        &mut entry.value
    }

    pub fn insert(&mut self, target: &ObjectRef, value: V) {
        let key = TargetKey::of(target);
        if !self.entries.contains_key(&key) {
            self.prune();
        }
        self.entries.insert(key, Entry { target: Arc::downgrade(target), value });
    }

    pub fn remove(&mut self, target: &ObjectRef) -> Option<V> {
        self.entries
            .remove(&TargetKey::of(target))
            .filter(Entry::is_live)
            .map(|e| e.value)
    }

    /// Remove the entry for a target that may already be gone.
    pub fn remove_weak(&mut self, target: &Weak<dyn Introspect>) {
        self.entries.remove(&TargetKey::of_weak(target));
    }

    /// Drop entries whose target no longer exists. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live());
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Live values.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().filter(|e| e.is_live()).map(|e| &e.value)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries
            .values_mut()
            .filter(|e| e.is_live())
            .map(|e| &mut e.value)
    }

    /// Number of stored entries, including not-yet-pruned dead ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Default> WeakMap<V> {
    /// Value for `target`, replacing a stale entry left by a dropped target.
    pub fn live_or_default(&mut self, target: &ObjectRef) -> &mut V {
        self.get_or_insert_with(target, V::default)
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Ephemeral per-target state for one selection.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Gesture origin; set iff a gesture is active.
    pub pinned_cell: Option<Cell>,
    /// Pointer cell seen on the previous gesture frame.
    pub last_pointer_cell: Option<Cell>,
    /// A configured override has been applied during this selection.
    pub applied_once: bool,
    /// Correlates diagnostics for one gesture.
    pub pin_session_id: Option<u64>,
    /// A keyboard rotation happened while the pointer was still; pointer
    /// rotation stays off until the pointer cell changes.
    pub keyboard_latched: bool,
    /// The next host commit attempt was started by the engine itself.
    pub placement_armed: bool,
    logged: HashSet<(u64, &'static str)>,
}

impl Session {
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.pinned_cell.is_some()
    }

    /// Reset every gesture field. `applied_once` is left to the caller.
    fn end_gesture(&mut self) {
        self.pinned_cell = None;
        self.last_pointer_cell = None;
        self.pin_session_id = None;
        self.keyboard_latched = false;
        self.placement_armed = false;
    }
}

/// Outcome of [`SessionStore::pin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    /// A new gesture started with this session id.
    Pinned { session_id: u64 },
    /// A gesture was already active; its origin is kept.
    AlreadyPinned { origin: Cell },
}

/// Per-target sessions plus the session-id counter.
#[derive(Default)]
pub struct SessionStore {
    sessions: WeakMap<Session>,
    next_session_id: u64,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, target: &ObjectRef) -> Option<&Session> {
        self.sessions.get(target)
    }

    /// Pin `cell` as the gesture origin unless a gesture is already active.
    pub fn pin(&mut self, target: &ObjectRef, cell: Cell) -> PinOutcome {
        if let Some(origin) = self.pinned(target) {
            return PinOutcome::AlreadyPinned { origin };
        }
        self.next_session_id += 1;
        let session_id = self.next_session_id;
        let session = self.sessions.live_or_default(target);
        session.pinned_cell = Some(cell);
        session.last_pointer_cell = Some(cell);
        session.pin_session_id = Some(session_id);
        session.keyboard_latched = false;
        PinOutcome::Pinned { session_id }
    }

    #[must_use]
    pub fn pinned(&self, target: &ObjectRef) -> Option<Cell> {
        self.get(target).and_then(|s| s.pinned_cell)
    }

    #[must_use]
    pub fn has_any_pinned(&self) -> bool {
        self.sessions.values().any(Session::is_pinned)
    }

    /// End the active gesture for `target`, keeping `applied_once`.
    pub fn clear(&mut self, target: &ObjectRef) {
        if let Some(session) = self.sessions.get_mut(target) {
            session.end_gesture();
        }
    }

    /// Forget everything about `target`.
    pub fn remove(&mut self, target: &ObjectRef) {
        self.sessions.remove(target);
    }

    /// Forget everything about a target held only weakly.
    pub fn remove_weak(&mut self, target: &Weak<dyn Introspect>) {
        self.sessions.remove_weak(target);
    }

    /// Reset per-frame bookkeeping (pointer history, latches, log dedup) on
    /// every session.
    pub fn clear_transient_all(&mut self) {
        for session in self.sessions.values_mut() {
            session.last_pointer_cell = None;
            session.keyboard_latched = false;
            session.logged.clear();
        }
    }

    /// Record the current pointer cell; returns whether it moved since the
    /// previous observation.
    pub fn observe_pointer(&mut self, target: &ObjectRef, cell: Cell) -> bool {
        let session = self.sessions.live_or_default(target);
        let moved = session.last_pointer_cell != Some(cell);
        session.last_pointer_cell = Some(cell);
        if moved {
            session.keyboard_latched = false;
        }
        moved
    }

    pub fn latch_keyboard(&mut self, target: &ObjectRef) {
        self.sessions.live_or_default(target).keyboard_latched = true;
    }

    #[must_use]
    pub fn is_latched(&self, target: &ObjectRef) -> bool {
        self.get(target).is_some_and(|s| s.keyboard_latched)
    }

    #[must_use]
    pub fn was_applied(&self, target: &ObjectRef) -> bool {
        self.get(target).is_some_and(|s| s.applied_once)
    }

    pub fn mark_applied(&mut self, target: &ObjectRef) {
        self.sessions.live_or_default(target).applied_once = true;
    }

    pub fn unmark_applied(&mut self, target: &ObjectRef) {
        if let Some(session) = self.sessions.get_mut(target) {
            session.applied_once = false;
        }
    }

    pub fn arm_placement(&mut self, target: &ObjectRef) {
        self.sessions.live_or_default(target).placement_armed = true;
    }

    /// Consume the armed flag; `true` exactly once per arming.
    pub fn take_armed(&mut self, target: &ObjectRef) -> bool {
        match self.sessions.get_mut(target) {
            Some(session) if session.placement_armed => {
                session.placement_armed = false;
                true
            }
            _ => false,
        }
    }

    /// `true` the first time `key` is seen in the target's current pin
    /// session (or in its unpinned state), `false` afterwards.
    pub fn first_log(&mut self, target: &ObjectRef, key: &'static str) -> bool {
        let session = self.sessions.live_or_default(target);
        let bucket = session.pin_session_id.unwrap_or(0);
        session.logged.insert((bucket, key))
    }

    /// Stored entries, including dropped targets not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
