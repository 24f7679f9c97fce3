//! # gopad-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`GopadSettings::default()`]
//! 2. **Settings file** — a JSON file passed with `--config` (deep-merged over defaults)
//! 3. **Environment variables** — `GOPAD_*` overrides (highest priority)
//!
//! Command-line flags are applied by the binary on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings, load_settings_from_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_merge_re_exported() {
        let a = serde_json::json!({"x": 1});
        let b = serde_json::json!({"y": 2});
        let merged = deep_merge(a, b);
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = GopadSettings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.static_dir, "static");
        assert_eq!(settings.session.name_prefix, "U-");
        assert_eq!(settings.collaborators.timeout_secs, 0);
        assert!(settings.collaborators.gist_token.is_none());
        assert!(!settings.logging.debug);
    }
}
