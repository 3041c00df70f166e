//! Gesture-driven rotation override engine for grid placement.
//!
//! A host application places objects on a grid. This crate sits between the
//! host's input handling and its placement pipeline: a primary press pins the
//! placement origin, dragging away from it chooses the facing, and releasing
//! commits at the pinned cell. It also applies configured default rotations
//! per placement workflow, exactly once per selection.
//!
//! The engine discovers everything it needs about host objects at runtime
//! through the [`introspect`] seam, so it works against host types it was
//! never compiled against.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::RotationEngine`]: gesture state machine and host entry points |
//! | [`grid`] | Cells, rotations and the drag-direction rule |
//! | [`introspect`] | Host object reflection: type descriptors and member access |
//! | [`capability`] | Accessor resolution per host type, memoized |
//! | [`classify`] | Workflow detection and the rotatability classifier |
//! | [`session`] | Per-target gesture sessions keyed by object identity |
//! | [`policy`] | Which rotation a workflow starts with |
//! | [`settings`] | Engine configuration and environment loading |
//! | [`feedback`] | Sound feedback for pin, rotate and commit |
//! | [`host`] | The [`host::PlacementHost`] boundary |
//! | [`input`] | Gesture phases and per-frame input |
//! | [`replay`] | Scripted host and JSON scenario replay |
//! | [`consts`] | Deadzone, sound names and member-name candidates |

pub mod capability;
pub mod classify;
pub mod consts;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod grid;
pub mod host;
pub mod input;
pub mod introspect;
pub mod policy;
pub mod replay;
pub mod session;
pub mod settings;

#[cfg(test)]
#[path = "test_helpers_test.rs"]
pub(crate) mod test_helpers;
