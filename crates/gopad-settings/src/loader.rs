//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`GopadSettings::default()`]
//! 2. If a settings file is given, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::GopadSettings;

/// Load settings from an optional file, then apply env var overrides.
pub fn load_settings(path: Option<&Path>) -> Result<GopadSettings> {
    match path {
        Some(path) => load_settings_from_path(path),
        None => {
            let mut settings = GopadSettings::default();
            apply_env_overrides(&mut settings);
            Ok(settings)
        }
    }
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<GopadSettings> {
    let defaults = serde_json::to_value(GopadSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        if !user.is_object() {
            return Err(SettingsError::InvalidValue(
                "settings file must contain a JSON object".to_string(),
            ));
        }
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: GopadSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `GOPAD_*` environment variable overrides.
///
/// Invalid values are logged and ignored (falling back to file/default).
pub fn apply_env_overrides(settings: &mut GopadSettings) {
    apply_overrides_with(settings, |name| std::env::var(name).ok());
}

fn apply_overrides_with<F>(settings: &mut GopadSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let checked = |name: &str, parsed: Option<u64>, raw: Option<String>| {
        if parsed.is_none() {
            if let Some(raw) = raw {
                tracing::warn!(key = name, value = %raw, "invalid numeric env var, ignoring");
            }
        }
        parsed
    };
    let ranged = |name: &str, min: u64, max: u64| {
        let raw = string(name);
        let parsed = raw.as_deref().and_then(|v| parse_u64_range(v, min, max));
        checked(name, parsed, raw)
    };
    let boolean = |name: &str| {
        let raw = string(name)?;
        let parsed = parse_bool(&raw);
        if parsed.is_none() {
            tracing::warn!(key = name, value = %raw, "invalid boolean env var, ignoring");
        }
        parsed
    };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("GOPAD_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = ranged("GOPAD_PORT", 1, 65_535).and_then(|v| u16::try_from(v).ok()) {
        settings.server.port = v;
    }
    if let Some(v) = string("GOPAD_STATIC_DIR") {
        settings.server.static_dir = v;
    }
    if let Some(v) = ranged("GOPAD_CACHE_DAYS", 1, 365).and_then(|v| u32::try_from(v).ok()) {
        settings.server.cache_days = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = string("GOPAD_NAME_PREFIX") {
        settings.session.name_prefix = v;
    }

    // ── Collaborators ───────────────────────────────────────────────
    if let Some(v) = string("GOPAD_PLAYGROUND_URL") {
        settings.collaborators.playground_url = v;
    }
    if let Some(v) = string("GOPAD_GIST_API_URL") {
        settings.collaborators.gist_api_url = v;
    }
    if let Some(v) = string("GOPAD_GIST_TOKEN") {
        settings.collaborators.gist_token = Some(v);
    }
    if let Some(v) = ranged("GOPAD_COLLABORATOR_TIMEOUT_SECS", 0, 600) {
        settings.collaborators.timeout_secs = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("GOPAD_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = boolean("GOPAD_LOG_JSON") {
        settings.logging.json = v;
    }
    if let Some(v) = boolean("GOPAD_DEBUG") {
        settings.logging.debug = v;
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
