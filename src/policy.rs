//! Override policy: which configured rotation, if any, a workflow starts with.
//!
//! Stateless. The caller owns the "applied once" flag, passes it in, and sets
//! it after a returned rotation has actually been written to the target.

#[cfg(test)]
#[path = "policy_test.rs"]
mod policy_test;

use crate::classify::Workflow;
use crate::grid::Rotation;
use crate::settings::{OverrideSettings, ReinstallMode};

/// Rotation to apply for `workflow`, or `None`.
///
/// Always `None` once `already_applied` is set. A workflow configured with the
/// sentinel never overrides. Reinstall in keep-original mode returns the
/// source object's own rotation, the one value taken from live data rather
/// than configuration.
#[must_use]
pub fn decide(workflow: Workflow, settings: &OverrideSettings, already_applied: bool) -> Option<Rotation> {
    if already_applied {
        return None;
    }
    match workflow {
        Workflow::Build => settings.build,
        Workflow::Install => settings.install,
        Workflow::Reinstall { source_rotation } => match settings.reinstall_mode {
            ReinstallMode::UseOverrideRotation => settings.reinstall,
            ReinstallMode::KeepOriginalRotation => source_rotation,
        },
    }
}
