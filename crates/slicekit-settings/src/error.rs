//! Error types for the settings crate.
//!
//! Structured errors for the profile store, profile persistence and the
//! application configuration file.

use slicekit_core::ConfigurationError;
use std::io;
use thiserror::Error;

/// Errors that can occur during settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The setting name is not registered.
    #[error("Unknown setting '{key}'")]
    UnknownSetting { key: String },

    /// The value cannot be parsed as the setting's declared type.
    #[error("Invalid value '{value}' for setting '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// A profile snapshot could not be decoded.
    #[error("Invalid profile string: {0}")]
    Snapshot(String),

    /// The configuration directory could not be found or created.
    #[error("Config directory error: {0}")]
    ConfigDirectory(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML error: {0}")]
    TomlWriteError(#[from] toml::ser::Error),

    /// A configuration validation error occurred.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A persistence error occurred.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Errors related to the application configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file format is not supported.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A configuration value is out of valid range.
    #[error("Value out of range for '{key}': {value}")]
    ValueOutOfRange { key: String, value: String },
}

/// Errors related to profile and preference files.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// A line could not be parsed as a section header, key or continuation.
    #[error("Malformed line {line}: {content}")]
    MalformedLine { line: usize, content: String },

    /// A key appeared before any section header.
    #[error("Key outside of any section at line {0}")]
    MissingSection(usize),

    /// I/O error during persistence.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl From<SettingsError> for slicekit_core::Error {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::UnknownSetting { key } => {
                ConfigurationError::UnknownSetting { name: key }.into()
            }
            SettingsError::InvalidValue { key, value, reason } => ConfigurationError::InvalidValue {
                name: key,
                value,
                reason,
            }
            .into(),
            SettingsError::IoError(e) => slicekit_core::Error::Io(e),
            other => slicekit_core::Error::other(other.to_string()),
        }
    }
}
