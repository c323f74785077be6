//! Error handling for SliceKit
//!
//! Provides error types for every layer of the print preparation core:
//! - Configuration errors (settings and plugin configuration)
//! - Geometry errors (build volume and arrangement)
//! - G-Code errors (parsing and file access)
//! - Plugin errors (post-processing steps)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Configuration error type
///
/// Raised when a setting has an invalid value, a required setting is missing,
/// or a post-processing chain names a plugin that is not registered.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Setting name is not registered
    #[error("Unknown setting: {name}")]
    UnknownSetting {
        /// The unknown setting name.
        name: String,
    },

    /// Setting value cannot be parsed as the declared type
    #[error("Invalid value '{value}' for setting {name}: {reason}")]
    InvalidValue {
        /// The setting name.
        name: String,
        /// The rejected value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A required setting is absent
    #[error("Missing required setting: {name}")]
    MissingSetting {
        /// The missing setting name.
        name: String,
    },

    /// A validator reported an error level result
    #[error("Setting {name} failed validation: {message}")]
    ValidationFailed {
        /// The setting name.
        name: String,
        /// The validator message.
        message: String,
    },

    /// Plugin name is not registered
    #[error("Unknown post-process plugin: {name}")]
    UnknownPlugin {
        /// The unknown plugin name.
        name: String,
    },
}

/// Geometry error type
///
/// The build volume never raises these directly; they describe conditions the
/// engine records so callers can surface them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Prime tower overlaps a disallowed area
    #[error("Prime tower at ({x:.1}, {y:.1}) collides with a disallowed area")]
    PrimeTowerCollision {
        /// Prime tower centre, platform X.
        x: f32,
        /// Prime tower centre, platform Y.
        y: f32,
    },

    /// Object lies outside the printable volume
    #[error("Object {node} lies outside the build volume")]
    ObjectOutsideVolume {
        /// The scene node index.
        node: usize,
    },

    /// Arrangement ran out of cells on the platform
    #[error("No eligible grid cell for {count} object(s)")]
    NoEligibleCell {
        /// Objects that could not be placed on the platform.
        count: usize,
    },
}

/// G-Code error type
///
/// Represents errors related to G-Code parsing and file access. Parse errors
/// are logged and skipped by the interpreter, never propagated.
#[derive(Error, Debug, Clone)]
pub enum GcodeError {
    /// Invalid G-Code syntax
    #[error("Invalid syntax at line {line_number}: {reason}")]
    InvalidSyntax {
        /// The line number where the syntax error occurred.
        line_number: u32,
        /// The reason for the syntax error.
        reason: String,
    },

    /// Unknown G-Code command
    #[error("Unknown G-Code at line {line_number}: {code}")]
    UnknownCode {
        /// The line number where the unknown code was found.
        line_number: u32,
        /// The unknown G-Code command.
        code: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter '{param}' at line {line_number}: {reason}")]
    InvalidParameter {
        /// The line number where the invalid parameter was found.
        line_number: u32,
        /// The parameter letter.
        param: String,
        /// The reason the parameter is invalid.
        reason: String,
    },

    /// File reading or writing failed
    #[error("File error: {reason}")]
    FileError {
        /// The reason for the file error.
        reason: String,
    },

    /// Generic G-Code error
    #[error("G-Code error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Post-process plugin error
///
/// Displayed as `<kind>: '<message>' @ <file>:<function>:<line>` so the
/// caller can show where a step failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    /// A plugin step failed
    #[error("{kind}: '{message}' @ {file}:{function}:{line}")]
    Failed {
        /// Error kind, e.g. `ValueError`.
        kind: String,
        /// Error message.
        message: String,
        /// Source file of the failing step.
        file: String,
        /// Function of the failing step.
        function: String,
        /// Line of the failing step.
        line: u32,
    },

    /// A parameter could not be coerced to its declared type
    #[error("ParameterError: '{param}={value}' is not a valid {expected} @ {plugin}:params:0")]
    InvalidParameter {
        /// Plugin name.
        plugin: String,
        /// Parameter name.
        param: String,
        /// Supplied value.
        value: String,
        /// Expected type name.
        expected: String,
    },
}

impl PluginError {
    /// Build a failure located at the caller's source position
    #[track_caller]
    pub fn failed(kind: impl Into<String>, message: impl Into<String>, function: &str) -> Self {
        let location = std::panic::Location::caller();
        PluginError::Failed {
            kind: kind.into(),
            message: message.into(),
            file: location.file().to_string(),
            function: function.to_string(),
            line: location.line(),
        }
    }
}

/// Main error type for SliceKit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Geometry error
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// G-Code error
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Plugin error
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a configuration error
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Check if this is a geometry error
    pub fn is_geometry_error(&self) -> bool {
        matches!(self, Error::Geometry(_))
    }

    /// Check if this is a G-Code error
    pub fn is_gcode_error(&self) -> bool {
        matches!(self, Error::Gcode(_))
    }

    /// Check if this is a plugin error
    pub fn is_plugin_error(&self) -> bool {
        matches!(self, Error::Plugin(_))
    }

    /// Check if this is an I/O error
    pub fn is_io_error(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::InvalidValue {
            name: "layer_height".to_string(),
            value: "abc".to_string(),
            reason: "not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value 'abc' for setting layer_height: not a number"
        );
    }

    #[test]
    fn test_plugin_error_display() {
        let err = PluginError::Failed {
            kind: "ValueError".to_string(),
            message: "bad layer".to_string(),
            file: "pause_at_z".to_string(),
            function: "transform".to_string(),
            line: 42,
        };
        assert_eq!(
            err.to_string(),
            "ValueError: 'bad layer' @ pause_at_z:transform:42"
        );
    }

    #[test]
    fn test_plugin_error_records_caller() {
        let err = PluginError::failed("IOError", "missing", "run");
        match err {
            PluginError::Failed { file, line, .. } => {
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unified_conversions() {
        let err: Error = GeometryError::NoEligibleCell { count: 2 }.into();
        assert!(err.is_geometry_error());
        assert_eq!(err.to_string(), "No eligible grid cell for 2 object(s)");

        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_io_error());
        assert!(err.to_string().starts_with("I/O error"));

        let err = Error::other("boom");
        assert_eq!(err.to_string(), "boom");
        assert!(!err.is_plugin_error());
    }
}
