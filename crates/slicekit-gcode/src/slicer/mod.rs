//! Slicing engine invocation.
//!
//! [`EngineSettings`] maps a profile to the engine's integer settings,
//! [`SlicerCommand`] turns them and the objects into a command line, and
//! [`SlicerProcess`] runs it, tracks progress and collects the
//! [`EngineResult`].

mod command;
mod process;
mod result;
mod settings;

pub use command::{SlicerCommand, SlicerObject};
pub use process::SlicerProcess;
pub use result::{EngineLine, EngineResult, ProgressTracker};
pub use settings::EngineSettings;

use std::path::PathBuf;
use thiserror::Error;

/// Errors of an engine run
#[derive(Error, Debug)]
pub enum SlicerError {
    /// The engine binary could not be started
    #[error("Failed to start slicing engine {}: {source}", .binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine exited with a nonzero status
    #[error("Slicing engine failed ({}): {stderr}", .status.map_or_else(|| "killed".to_string(), |c| format!("exit code {}", c)))]
    Failed { status: Option<i32>, stderr: String },

    #[error("Slicing cancelled")]
    Cancelled,

    #[error("Slicer task failed: {0}")]
    Join(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
