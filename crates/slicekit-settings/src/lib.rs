//! # SliceKit Settings
//!
//! The profile store and everything around it: typed settings with
//! validators and visibility conditions, the default registry, profile
//! snapshots, INI persistence, derived calculations and the application
//! configuration file.

pub mod calculations;
pub mod config;
pub mod error;
pub mod ini;
pub mod persistence;
pub mod registry;
pub mod setting;
pub mod snapshot;
pub mod store;
pub mod validators;
pub mod value;

pub use config::{AppConfig, PluginStep};
pub use error::{
    ConfigError, ConfigResult, PersistenceError, PersistenceResult, SettingsError, SettingsResult,
};
pub use ini::IniDocument;
pub use setting::{Condition, Setting, SettingCategory};
pub use snapshot::Snapshot;
pub use store::{ProfileStore, SharedProfile};
pub use validators::{SettingLookup, Validation, ValidationLevel, Validator};
pub use value::{SettingType, Value};
