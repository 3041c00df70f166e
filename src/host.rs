//! Boundary to the host placement pipeline.
//!
//! The engine does not own legality checks, placement, pointer tracking,
//! audio or the message surface. It reaches them through [`PlacementHost`].
//! The engine never holds its internal locks while calling into the host, so
//! implementations are free to call back into the engine (for example from
//! their own commit path or pointer-cell query).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::grid::Cell;
use crate::introspect::{Introspect, SoundHandle};

/// Result of a placement legality check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Legality {
    pub accepted: bool,
    /// Why the placement was refused, when the host has something to say.
    pub reason: Option<String>,
}

impl Legality {
    #[must_use]
    pub fn accepted() -> Self {
        Self { accepted: true, reason: None }
    }

    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self { accepted: false, reason: Some(reason.into()) }
    }
}

/// Where a feedback sound should be heard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundLocation {
    /// On the map the target belongs to, falling back to the current map.
    TargetMap,
    /// Non-positional UI sound at the camera.
    Camera,
}

/// Operations the engine consumes from the host.
pub trait PlacementHost {
    /// Whether `target` could be placed at `cell`.
    fn is_legal_at(&self, target: &dyn Introspect, cell: Cell) -> Legality;

    /// Perform the placement side effect.
    fn commit_at(&self, target: &dyn Introspect, cell: Cell);

    /// Live pointer position in grid coordinates.
    fn current_pointer_cell(&self) -> Cell;

    /// Look up a sound resource by name.
    fn find_sound(&self, name: &str) -> Option<SoundHandle>;

    fn play_sound(&self, sound: &SoundHandle, location: SoundLocation);

    /// Surface a placement rejection to the user.
    fn show_rejection_message(&self, reason: &str);
}

impl<T: PlacementHost + ?Sized> PlacementHost for Arc<T> {
    fn is_legal_at(&self, target: &dyn Introspect, cell: Cell) -> Legality {
        (**self).is_legal_at(target, cell)
    }

    fn commit_at(&self, target: &dyn Introspect, cell: Cell) {
        (**self).commit_at(target, cell);
    }

    fn current_pointer_cell(&self) -> Cell {
        (**self).current_pointer_cell()
    }

    fn find_sound(&self, name: &str) -> Option<SoundHandle> {
        (**self).find_sound(name)
    }

    fn play_sound(&self, sound: &SoundHandle, location: SoundLocation) {
        (**self).play_sound(sound, location);
    }

    fn show_rejection_message(&self, reason: &str) {
        (**self).show_rejection_message(reason);
    }
}
