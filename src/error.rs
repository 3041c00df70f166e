//! Engine-internal error type.
//!
//! None of these escape the public entry points of `RotationEngine`; each
//! entry point logs and falls back to letting the host proceed.

use crate::introspect::AccessError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Reading or writing a host member failed.
    #[error("host access failed: {0}")]
    Access(#[from] AccessError),
    /// The target type exposes no writable rotation.
    #[error("{type_name} has no writable rotation")]
    NoRotationSetter { type_name: &'static str },
}
