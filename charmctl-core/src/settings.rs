//! Client settings persisted as YAML.
//!
//! # Storage layout
//!
//! ```text
//! ~/.charmctl/
//!   settings.yaml   (mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every filesystem function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home, used by tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()` and delegates to `_at`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::charm::DEFAULT_ARCHITECTURE;
use crate::error::SettingsError;

pub const ENV_RETRY_ATTEMPTS: &str = "CHARMCTL_RETRY_ATTEMPTS";
pub const ENV_RETRY_DELAY_MS: &str = "CHARMCTL_RETRY_DELAY_MS";

/// Backoff parameters shared by the deploy and convergence loops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub initial_delay_ms: u64,
    pub multiplier: u32,
    pub max_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            multiplier: 2,
            max_attempts: 30,
        }
    }
}

/// Root of `settings.yaml`. Missing keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retry: RetrySettings,
    pub default_architecture: String,
    /// Minimum `Application` facade version for repository deploys.
    pub repository_facade_version: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retry: RetrySettings::default(),
            default_architecture: DEFAULT_ARCHITECTURE.to_string(),
            repository_facade_version: 19,
        }
    }
}

impl Settings {
    /// Apply `CHARMCTL_*` overrides from an environment lookup.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_RETRY_ATTEMPTS) {
            self.retry.max_attempts = value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(SettingsError::InvalidOverride {
                    var: ENV_RETRY_ATTEMPTS,
                    value,
                })?;
        }
        if let Some(value) = lookup(ENV_RETRY_DELAY_MS) {
            self.retry.initial_delay_ms =
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| SettingsError::InvalidOverride {
                        var: ENV_RETRY_DELAY_MS,
                        value,
                    })?;
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.charmctl/settings.yaml`, pure, no I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    home.join(".charmctl").join("settings.yaml")
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load settings from `<home>/.charmctl/settings.yaml`.
///
/// Returns defaults if the file is absent and `SettingsError::Parse` (with the
/// path) if it is malformed. Environment overrides are not applied here.
pub fn load_at(home: &Path) -> Result<Settings, SettingsError> {
    let path = settings_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| SettingsError::Parse { path, source: e })
}

/// `load_at` convenience wrapper, with environment overrides applied.
pub fn load() -> Result<Settings, SettingsError> {
    load_at(&home()?)?.apply_overrides(|key| std::env::var(key).ok())
}

// ---------------------------------------------------------------------------
// Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically write settings: `.yaml.tmp` sibling, `chmod 0600`, `rename`.
pub fn save_at(home: &Path, settings: &Settings) -> Result<PathBuf, SettingsError> {
    let path = settings_path_at(home);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let tmp_path = path.with_file_name("settings.yaml.tmp");

    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(settings: &Settings) -> Result<PathBuf, SettingsError> {
    save_at(&home()?, settings)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, SettingsError> {
    dirs::home_dir().ok_or(SettingsError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), SettingsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), SettingsError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_file_missing() {
        let home = TempDir::new().unwrap();
        let settings = load_at(home.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.retry.max_attempts, 30);
        assert_eq!(settings.retry.initial_delay_ms, 1000);
        assert_eq!(settings.retry.multiplier, 2);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let home = TempDir::new().unwrap();
        let path = settings_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "retry:\n  max_attempts: 5\n").unwrap();

        let settings = load_at(home.path()).unwrap();
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.initial_delay_ms, 1000);
        assert_eq!(settings.default_architecture, "amd64");
    }

    #[test]
    fn overrides_apply_and_validate() {
        let env: HashMap<&str, &str> =
            [(ENV_RETRY_ATTEMPTS, "3"), (ENV_RETRY_DELAY_MS, "0")].into_iter().collect();
        let settings = Settings::default()
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.initial_delay_ms, 0);

        let err = Settings::default()
            .apply_overrides(|k| (k == ENV_RETRY_ATTEMPTS).then(|| "0".to_string()))
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidOverride { .. }));
    }

    #[test]
    fn save_then_load() {
        let home = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.default_architecture = "arm64".into();
        let path = save_at(home.path(), &settings).unwrap();
        assert!(!path.with_file_name("settings.yaml.tmp").exists());
        assert_eq!(load_at(home.path()).unwrap(), settings);
    }
}
