//! Event type definitions for the event bus.
//!
//! Events are grouped by category. They are cloneable and serializable so
//! they can be logged or replayed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root event enum for all application events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// Profile and preference changes
    Settings(SettingsEvent),
    /// Build volume recomputation
    BuildVolume(BuildVolumeEvent),
    /// Scene graph changes
    Scene(SceneEvent),
    /// G-code file operations
    File(FileEvent),
    /// External slicer runs
    Slicer(SlicerEvent),
    /// Error and diagnostic events
    Error(ErrorEvent),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Settings(_) => EventCategory::Settings,
            AppEvent::BuildVolume(_) => EventCategory::BuildVolume,
            AppEvent::Scene(_) => EventCategory::Scene,
            AppEvent::File(_) => EventCategory::File,
            AppEvent::Slicer(_) => EventCategory::Slicer,
            AppEvent::Error(_) => EventCategory::Error,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Settings(e) => e.description(),
            AppEvent::BuildVolume(e) => e.description(),
            AppEvent::Scene(e) => e.description(),
            AppEvent::File(e) => e.description(),
            AppEvent::Slicer(e) => e.description(),
            AppEvent::Error(e) => e.description(),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Settings and configuration events.
    Settings,
    /// Build volume events.
    BuildVolume,
    /// Scene graph events.
    Scene,
    /// G-code file events.
    File,
    /// Slicer subprocess events.
    Slicer,
    /// Error and diagnostic events.
    Error,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Settings => write!(f, "Settings"),
            EventCategory::BuildVolume => write!(f, "BuildVolume"),
            EventCategory::Scene => write!(f, "Scene"),
            EventCategory::File => write!(f, "File"),
            EventCategory::Slicer => write!(f, "Slicer"),
            EventCategory::Error => write!(f, "Error"),
        }
    }
}

/// Setting value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    /// Boolean setting value.
    Bool(bool),
    /// Integer setting value.
    Int(i64),
    /// Floating-point setting value.
    Float(f64),
    /// String or enumeration setting value.
    String(String),
}

/// Settings-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SettingsEvent {
    /// Profile or preferences loaded.
    Loaded {
        /// File the settings came from, if any.
        path: Option<PathBuf>,
    },
    /// Profile or preferences saved.
    Saved {
        /// File the settings were written to.
        path: PathBuf,
    },
    /// A property of a setting changed.
    Changed {
        /// Setting key that was changed.
        key: String,
        /// Property that changed, usually `value`.
        property: String,
        /// New value of the setting.
        value: SettingValue,
    },
    /// All profile settings were returned to their defaults.
    ProfileReset,
}

impl SettingsEvent {
    /// Setting name carried by a change event
    pub fn changed_key(&self) -> Option<&str> {
        match self {
            SettingsEvent::Changed { key, .. } => Some(key),
            _ => None,
        }
    }

    fn description(&self) -> String {
        match self {
            SettingsEvent::Loaded { path: Some(path) } => {
                format!("Settings loaded from {}", path.display())
            }
            SettingsEvent::Loaded { path: None } => "Settings loaded".to_string(),
            SettingsEvent::Saved { path } => format!("Settings saved to {}", path.display()),
            SettingsEvent::Changed {
                key,
                property,
                value,
            } => format!("Setting: {}.{} = {:?}", key, property, value),
            SettingsEvent::ProfileReset => "Profile reset".to_string(),
        }
    }
}

/// Build volume events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BuildVolumeEvent {
    /// Derived state went stale.
    Dirty {
        /// What invalidated it.
        reason: String,
    },
    /// Derived state was recomputed.
    Rebuilt {
        /// Number of disallowed polygons.
        disallowed_areas: usize,
        /// Whether the prime tower collided.
        has_errors: bool,
    },
    /// Raft thickness changed during a rebuild.
    RaftThicknessChanged {
        /// New raft thickness in mm.
        thickness: f32,
    },
}

impl BuildVolumeEvent {
    fn description(&self) -> String {
        match self {
            BuildVolumeEvent::Dirty { reason } => format!("Build volume dirty: {}", reason),
            BuildVolumeEvent::Rebuilt {
                disallowed_areas,
                has_errors,
            } => format!(
                "Build volume rebuilt: {} disallowed areas{}",
                disallowed_areas,
                if *has_errors { ", with errors" } else { "" }
            ),
            BuildVolumeEvent::RaftThicknessChanged { thickness } => {
                format!("Raft thickness: {:.2} mm", thickness)
            }
        }
    }
}

/// Scene graph events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SceneEvent {
    /// Nodes were added or removed.
    Changed {
        /// Number of root-level printable nodes.
        printable_nodes: usize,
    },
    /// An arrangement batch was applied.
    Arranged {
        /// Nodes moved onto the platform.
        placed: usize,
        /// Nodes parked outside the platform.
        leftover: usize,
    },
}

impl SceneEvent {
    fn description(&self) -> String {
        match self {
            SceneEvent::Changed { printable_nodes } => {
                format!("Scene changed: {} printable nodes", printable_nodes)
            }
            SceneEvent::Arranged { placed, leftover } => {
                format!("Arranged: {} placed, {} left over", placed, leftover)
            }
        }
    }
}

/// G-code file events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FileEvent {
    /// Load started.
    LoadStarted {
        /// Path being loaded.
        path: PathBuf,
    },
    /// Load finished.
    Loaded {
        /// Path that was loaded.
        path: PathBuf,
        /// Number of layers found.
        layers: usize,
    },
    /// Load was aborted by the progress callback.
    LoadCancelled,
    /// File written.
    Saved {
        /// Path where the file was written.
        path: PathBuf,
    },
}

impl FileEvent {
    fn description(&self) -> String {
        match self {
            FileEvent::LoadStarted { path } => format!("Loading: {}", path.display()),
            FileEvent::Loaded { path, layers } => {
                format!("Loaded: {} ({} layers)", path.display(), layers)
            }
            FileEvent::LoadCancelled => "Load cancelled".to_string(),
            FileEvent::Saved { path } => format!("Saved: {}", path.display()),
        }
    }
}

/// Slicer subprocess events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SlicerEvent {
    /// Engine process spawned.
    Started {
        /// Output file the engine writes.
        output: PathBuf,
    },
    /// Overall progress in `[0, 1]`.
    Progress {
        /// Fraction complete.
        fraction: f32,
    },
    /// Engine and post-processing finished.
    Finished {
        /// Estimated print time in seconds.
        print_time_seconds: u64,
    },
    /// Engine or post-processing failed.
    Failed {
        /// Error report.
        error: String,
    },
    /// Run was cancelled.
    Cancelled,
}

impl SlicerEvent {
    fn description(&self) -> String {
        match self {
            SlicerEvent::Started { output } => format!("Slicing to {}", output.display()),
            SlicerEvent::Progress { fraction } => format!("Slicing {:.0}%", fraction * 100.0),
            SlicerEvent::Finished { print_time_seconds } => {
                format!("Slicing finished, print time {}s", print_time_seconds)
            }
            SlicerEvent::Failed { error } => format!("Slicing failed: {}", error),
            SlicerEvent::Cancelled => "Slicing cancelled".to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Non-critical warning that does not block operation.
    Warning,
    /// Error that may be recoverable.
    Error,
}

/// Error and diagnostic events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ErrorEvent {
    /// Warning (non-blocking).
    Warning {
        /// Warning code identifier.
        code: String,
        /// Human-readable warning message.
        message: String,
    },
    /// Error (the triggering action was aborted).
    Error {
        /// Error code identifier.
        code: String,
        /// Human-readable error message.
        message: String,
    },
}

impl ErrorEvent {
    fn description(&self) -> String {
        match self {
            ErrorEvent::Warning { code, message } => {
                format!("Warning [{}]: {}", code, message)
            }
            ErrorEvent::Error { code, message } => {
                format!("Error [{}]: {}", code, message)
            }
        }
    }

    /// Get the severity of this error event
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorEvent::Warning { .. } => ErrorSeverity::Warning,
            ErrorEvent::Error { .. } => ErrorSeverity::Error,
        }
    }
}
