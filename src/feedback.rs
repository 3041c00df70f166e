//! Audible feedback for gesture transitions.
//!
//! The dispatcher picks a sound per transition and asks the host to play it.
//! Hosts may suppress placement sounds globally while a gesture is pinned
//! (see `RotationEngine::should_suppress_sound`); the dispatcher marks each of
//! its own requests as intentional right before issuing it, and the first
//! suppression query afterwards consumes that mark.

#[cfg(test)]
#[path = "feedback_test.rs"]
mod feedback_test;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::capability::CapabilityResolver;
use crate::consts::{SOUND_PIN, SOUND_PLACE, SOUND_ROTATE};
use crate::host::{PlacementHost, SoundLocation};
use crate::introspect::{Introspect, SoundHandle};

/// Gesture transitions that produce feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Pin,
    Rotate,
    Commit,
}

/// Resolves and requests feedback sounds.
#[derive(Debug, Default)]
pub struct FeedbackDispatcher {
    allow_next: AtomicBool,
}

impl FeedbackDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Play the sound for `kind`. Returns the sound requested, if one resolved.
    pub fn notify<H: PlacementHost + ?Sized>(
        &self,
        host: &H,
        resolver: &CapabilityResolver,
        kind: FeedbackKind,
        target: &dyn Introspect,
    ) -> Option<SoundHandle> {
        let (sound, location) = match kind {
            FeedbackKind::Pin => (host.find_sound(SOUND_PIN), SoundLocation::TargetMap),
            FeedbackKind::Rotate => (host.find_sound(SOUND_ROTATE), SoundLocation::Camera),
            FeedbackKind::Commit => (commit_sound(host, resolver, target), SoundLocation::TargetMap),
        };
        let sound = sound?;
        self.allow_next();
        host.play_sound(&sound, location);
        Some(sound)
    }

    /// Mark the next sound as intentional.
    pub fn allow_next(&self) {
        self.allow_next.store(true, Ordering::Release);
    }

    /// Consume the intentional mark. `true` at most once per [`Self::allow_next`].
    pub fn take_allowance(&self) -> bool {
        self.allow_next.swap(false, Ordering::AcqRel)
    }
}

/// The target's declared success sound, else the generic placement sound.
fn commit_sound<H: PlacementHost + ?Sized>(
    host: &H,
    resolver: &CapabilityResolver,
    target: &dyn Introspect,
) -> Option<SoundHandle> {
    match resolver.feedback_sound(target) {
        Ok(Some(sound)) => Some(sound),
        Ok(None) => host.find_sound(SOUND_PLACE),
        Err(e) => {
            tracing::trace!(error = %e, "success sound unreadable; using placement sound");
            host.find_sound(SOUND_PLACE)
        }
    }
}
