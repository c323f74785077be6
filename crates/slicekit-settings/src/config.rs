//! Application configuration.
//!
//! Holds the things that are not part of a print profile: where profile
//! and preference files live, the slicing engine binary, debounce timings
//! and the configured post-process chain. Stored as JSON or TOML in the
//! platform config directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, SettingsError, SettingsResult};

const APP_DIR: &str = "slicekit";

/// Platform config directory for this application
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// File locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Current profile INI file
    pub profile_file: PathBuf,
    /// Preferences and machine INI file
    pub preferences_file: PathBuf,
    /// Slicing engine executable
    pub slicer_binary: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        let dir = default_config_dir();
        Self {
            profile_file: dir.join("current_profile.ini"),
            preferences_file: dir.join("preferences.ini"),
            slicer_binary: PathBuf::from("CuraEngine"),
        }
    }
}

/// Debounce timings of the build volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildVolumeTimings {
    /// Quiet time after a setting change before rebuilding
    pub setting_debounce_ms: u64,
    /// Quiet time after a scene change
    pub scene_debounce_ms: u64,
    /// Quiet time after an extruder stack change
    pub stack_debounce_ms: u64,
}

impl Default for BuildVolumeTimings {
    fn default() -> Self {
        Self {
            setting_debounce_ms: 150,
            scene_debounce_ms: 100,
            stack_debounce_ms: 100,
        }
    }
}

/// G-code loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterSettings {
    /// Fraction of the file between two progress reports
    pub progress_step: f64,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            progress_step: 0.01,
        }
    }
}

/// One step of the post-process chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginStep {
    /// Registered plugin name
    pub name: String,
    /// Parameter bindings as text
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Post-processing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessSettings {
    /// Steps run in order over every produced G-code file
    pub steps: Vec<PluginStep>,
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathSettings,
    pub build_volume: BuildVolumeTimings,
    pub interpreter: InterpreterSettings,
    pub post_process: PostProcessSettings,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        default_config_dir().join("config.toml")
    }

    /// Load from a `.json` or `.toml` file and validate
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match extension(path) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(other.unwrap_or("none").to_string()).into())
            }
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Validate and write to a `.json` or `.toml` file
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match extension(path) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(other.unwrap_or("none").to_string()).into())
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> SettingsResult<()> {
        let timings = [
            ("build_volume.setting_debounce_ms", self.build_volume.setting_debounce_ms),
            ("build_volume.scene_debounce_ms", self.build_volume.scene_debounce_ms),
            ("build_volume.stack_debounce_ms", self.build_volume.stack_debounce_ms),
        ];
        for (key, value) in timings {
            if value == 0 || value > 10_000 {
                return Err(ConfigError::ValueOutOfRange {
                    key: key.to_string(),
                    value: value.to_string(),
                }
                .into());
            }
        }

        let step = self.interpreter.progress_step;
        if !(step > 0.0 && step <= 1.0) {
            return Err(ConfigError::ValueOutOfRange {
                key: "interpreter.progress_step".to_string(),
                value: step.to_string(),
            }
            .into());
        }

        if let Some(step) = self.post_process.steps.iter().find(|s| s.name.trim().is_empty()) {
            return Err(ConfigError::ValueOutOfRange {
                key: "post_process.steps".to_string(),
                value: format!("{:?}", step.name),
            }
            .into());
        }

        Ok(())
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}
