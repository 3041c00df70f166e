//! Engine configuration.
//!
//! Settings are owned by the host (persistence and UI are its business) and
//! handed to the engine as a plain value. They deserialize with per-field
//! defaults and can also be read from `PIN_ROTATE_*` environment variables.

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::grid::Rotation;

/// How a reinstalled object chooses its starting rotation. Exactly one mode is
/// active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReinstallMode {
    /// Start with the rotation the object had before it was picked up.
    #[default]
    KeepOriginalRotation,
    /// Start with the configured reinstall rotation.
    UseOverrideRotation,
}

/// Rotation overrides per workflow. `None` is the "no override" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideSettings {
    pub build: Option<Rotation>,
    pub install: Option<Rotation>,
    pub reinstall: Option<Rotation>,
    pub reinstall_mode: ReinstallMode,
}

/// Full engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch for pointer-drag rotation.
    pub gesture_enabled: bool,
    /// Emit diagnostic logs from the engine.
    pub debug_logs: bool,
    pub overrides: OverrideSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self { gesture_enabled: true, debug_logs: false, overrides: OverrideSettings::default() }
    }
}

/// Error parsing configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: expected true or false, got '{value}'")]
    InvalidBool { key: String, value: String },
    #[error("{key}: expected north, east, south, west or none, got '{value}'")]
    InvalidRotation { key: String, value: String },
    #[error("{key}: expected keep_original_rotation or use_override_rotation, got '{value}'")]
    InvalidReinstallMode { key: String, value: String },
}

impl Settings {
    /// Build settings from environment variables.
    ///
    /// Optional (defaults in parentheses):
    /// - `PIN_ROTATE_GESTURE_ENABLED` (`true`)
    /// - `PIN_ROTATE_DEBUG_LOGS` (`false`)
    /// - `PIN_ROTATE_BUILD_ROTATION` (`none`)
    /// - `PIN_ROTATE_INSTALL_ROTATION` (`none`)
    /// - `PIN_ROTATE_REINSTALL_ROTATION` (`none`)
    /// - `PIN_ROTATE_REINSTALL_MODE` (`keep_original_rotation`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| match std::env::var(key) {
            Ok(value) => Some(value),
            Err(_) => None,
        })
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let read_bool = |key: &str, default: bool| match lookup(key) {
            Some(raw) => parse_bool(key, &raw),
            None => Ok(default),
        };
        let read_rotation = |key: &str| match lookup(key) {
            Some(raw) => parse_rotation_setting(key, &raw),
            None => Ok(None),
        };

        let reinstall_mode = match lookup("PIN_ROTATE_REINSTALL_MODE") {
            Some(raw) => parse_reinstall_mode("PIN_ROTATE_REINSTALL_MODE", &raw)?,
            None => defaults.overrides.reinstall_mode,
        };

        Ok(Self {
            gesture_enabled: read_bool("PIN_ROTATE_GESTURE_ENABLED", defaults.gesture_enabled)?,
            debug_logs: read_bool("PIN_ROTATE_DEBUG_LOGS", defaults.debug_logs)?,
            overrides: OverrideSettings {
                build: read_rotation("PIN_ROTATE_BUILD_ROTATION")?,
                install: read_rotation("PIN_ROTATE_INSTALL_ROTATION")?,
                reinstall: read_rotation("PIN_ROTATE_REINSTALL_ROTATION")?,
                reinstall_mode,
            },
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { key: key.to_string(), value: raw.to_string() }),
    }
}

/// Parse a rotation setting; `none` (or an empty value) is the sentinel.
pub fn parse_rotation_setting(key: &str, raw: &str) -> Result<Option<Rotation>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    Rotation::from_str(trimmed)
        .map(Some)
        .map_err(|_| ConfigError::InvalidRotation { key: key.to_string(), value: raw.to_string() })
}

fn parse_reinstall_mode(key: &str, raw: &str) -> Result<ReinstallMode, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "keep" | "keep_original_rotation" => Ok(ReinstallMode::KeepOriginalRotation),
        "override" | "use_override_rotation" => Ok(ReinstallMode::UseOverrideRotation),
        _ => Err(ConfigError::InvalidReinstallMode { key: key.to_string(), value: raw.to_string() }),
    }
}
