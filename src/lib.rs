//! # SliceKit
//!
//! Print preparation core for FDM 3D printers:
//! - Profile store with validation, INI persistence and compact profile strings
//! - Build volume with disallowed areas, prime tower checks and raft height
//! - Grid arrangement of objects on the platform
//! - G-code interpretation, start/end snippet generation and header back-patching
//! - Post-process plugins and the slicing engine subprocess
//!
//! ## Architecture
//!
//! 1. **slicekit-core** - Errors, event bus, geometry, scene arena
//! 2. **slicekit-settings** - Settings, profile store, app configuration
//! 3. **slicekit-buildvolume** - Build-volume engine
//! 4. **slicekit-arrange** - Grid arrange and translate operations
//! 5. **slicekit-gcode** - Interpreter, emitter, post-processing, slicer runner
//! 6. **slicekit** - Binary that ties the crates together

pub use slicekit_arrange as arrange;
pub use slicekit_buildvolume as buildvolume;
pub use slicekit_core as common;
pub use slicekit_gcode as gcode;
pub use slicekit_settings as settings;

pub use slicekit_core::{
    AppEvent, BoundingBox3D, ConfigurationError, Error, EventBus, EventFilter, GcodeError,
    GeometryError, PluginError, Point2D, Polygon2D, Result, Scene, SceneObject, Vec3,
};

pub use slicekit_settings::{AppConfig, ProfileStore, SharedProfile};

pub use slicekit_buildvolume::{BuildVolume, SharedBuildVolume, VolumeSettings};

pub use slicekit_arrange::{Arrangement, GridArrange, OperationBatch, TranslateOperation};

pub use slicekit_gcode::{
    GcodeDocument, GcodeEmitter, GcodeLoader, Interpreter, PluginRegistry, PostProcessPipeline,
    SlicerCommand, SlicerProcess,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Pretty console output on stderr, filtered by `RUST_LOG` on top of INFO.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    Ok(())
}

/// Loads the configuration and the profile it points to.
///
/// Missing files fall back to defaults.
pub fn load_environment(config_path: Option<&std::path::Path>) -> anyhow::Result<(AppConfig, ProfileStore)> {
    use anyhow::Context;

    let path = config_path.map(|p| p.to_path_buf()).unwrap_or_else(AppConfig::default_path);
    let config = if path.exists() {
        AppConfig::load_from_file(&path).with_context(|| format!("loading {}", path.display()))?
    } else {
        tracing::debug!("No configuration at {}, using defaults", path.display());
        AppConfig::default()
    };

    let mut profile = ProfileStore::new();
    if config.paths.preferences_file.exists() {
        profile
            .load_preferences(&config.paths.preferences_file)
            .with_context(|| format!("loading {}", config.paths.preferences_file.display()))?;
    }
    if config.paths.profile_file.exists() {
        profile
            .load_profile(&config.paths.profile_file)
            .with_context(|| format!("loading {}", config.paths.profile_file.display()))?;
    }
    Ok((config, profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_reads_configured_profile() {
        let dir = tempfile::tempdir().expect("dir");
        let mut config = AppConfig::default();
        config.paths.profile_file = dir.path().join("profile.ini");
        config.paths.preferences_file = dir.path().join("missing.ini");

        let mut profile = ProfileStore::new();
        profile.put_setting("layer_height", "0.15").expect("put");
        profile.save_profile(&config.paths.profile_file).expect("save");
        let config_path = dir.path().join("slicekit.toml");
        config.save_to_file(&config_path).expect("config");

        let (loaded, profile) = load_environment(Some(&config_path)).expect("load");
        assert_eq!(loaded, config);
        assert_eq!(profile.get_setting_float("layer_height"), 0.15);
    }
}
