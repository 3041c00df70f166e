//! Input model: the gesture phases and the per-frame input snapshot.
//!
//! The host reports input through narrow entry points on the engine. When it
//! can only offer a polled per-frame view, it fills a [`FrameInput`] and the
//! engine replays it through the same state machine in host order
//! (pointer-down, then held/move, then pointer-up).

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use serde::{Deserialize, Serialize};

/// Phase of the rotation gesture for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GesturePhase {
    /// No gesture; waiting for a pointer-down.
    #[default]
    Idle,
    /// Origin pinned; pointer movement steers the rotation.
    Pinned,
    /// Pointer released; the engine is committing or rejecting the placement.
    Committing,
}

/// Keyboard rotation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotateKey {
    /// Counter-clockwise quarter turn.
    Left,
    /// Clockwise quarter turn.
    Right,
}

impl RotateKey {
    /// Signed quarter turns for this key.
    #[must_use]
    pub fn quarter_turns(self) -> i32 {
        match self {
            Self::Left => -1,
            Self::Right => 1,
        }
    }
}

/// Primary-button state and keyboard rotation for one host frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameInput {
    /// Primary button went down this frame.
    pub pointer_down: bool,
    /// Primary button is held this frame.
    pub pointer_held: bool,
    /// Primary button was released this frame.
    pub pointer_up: bool,
    /// Rotate key pressed this frame, if any.
    pub rotate: Option<RotateKey>,
}

/// A raw pointer event as the host's own input dispatcher sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostPointerEvent {
    /// Primary button pressed.
    PrimaryDown,
    /// Primary button released.
    PrimaryUp,
    /// Anything else (secondary buttons, movement, keys).
    Other,
}

/// What the host should do with an event it was about to process itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Let the host handle the event as usual.
    Proceed,
    /// The engine has consumed the event.
    Consumed,
}

impl Disposition {
    #[must_use]
    pub fn is_consumed(self) -> bool {
        self == Self::Consumed
    }
}
