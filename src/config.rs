//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "GROUPCAST_BACK_CONFIG_PATH";

/// Days after the tournament start during which predictions stay open.
const DEFAULT_LOCK_WINDOW_DAYS: u64 = 5;
/// Debounce applied between an edit and the autosave request.
const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 800;
/// How long the saved confirmation lingers before settling back to idle.
const DEFAULT_SAVED_GRACE_MS: u64 = 2_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    prediction_lock_window_days: u64,
    allow_dev_tournament_editing: bool,
    autosave_debounce_ms: u64,
    saved_grace_ms: u64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        lock_window_days = app_config.prediction_lock_window_days,
                        dev_editing = app_config.allow_dev_tournament_editing,
                        "loaded application config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Window after the tournament start during which the UI still offers
    /// editing.
    pub fn prediction_lock_window(&self) -> Duration {
        Duration::from_secs(self.prediction_lock_window_days * 24 * 60 * 60)
    }

    /// Whether inactive dev-only tournaments accept edits on explicit request.
    pub fn dev_editing_allowed(&self) -> bool {
        self.allow_dev_tournament_editing
    }

    /// Debounce between the last edit and the autosave firing.
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// How long the saved confirmation is shown before returning to idle.
    pub fn saved_grace(&self) -> Duration {
        Duration::from_millis(self.saved_grace_ms)
    }
}

#[cfg(test)]
impl AppConfig {
    /// Default configuration with the dev editing override switched on.
    pub(crate) fn with_dev_editing() -> Self {
        Self {
            allow_dev_tournament_editing: true,
            ..Self::default()
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prediction_lock_window_days: DEFAULT_LOCK_WINDOW_DAYS,
            allow_dev_tournament_editing: false,
            autosave_debounce_ms: DEFAULT_AUTOSAVE_DEBOUNCE_MS,
            saved_grace_ms: DEFAULT_SAVED_GRACE_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    prediction_lock_window_days: Option<u64>,
    allow_dev_tournament_editing: Option<bool>,
    autosave_debounce_ms: Option<u64>,
    saved_grace_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            prediction_lock_window_days: value
                .prediction_lock_window_days
                .unwrap_or(defaults.prediction_lock_window_days),
            allow_dev_tournament_editing: value
                .allow_dev_tournament_editing
                .unwrap_or(defaults.allow_dev_tournament_editing),
            autosave_debounce_ms: value
                .autosave_debounce_ms
                .unwrap_or(defaults.autosave_debounce_ms),
            saved_grace_ms: value.saved_grace_ms.unwrap_or(defaults.saved_grace_ms),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
