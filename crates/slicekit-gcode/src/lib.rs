//! # SliceKit G-code
//!
//! Reading and writing G-code: the streaming interpreter that turns a file
//! into layered toolpaths, the alteration snippet emitter, header
//! back-patching, post-process plugins and the slicing engine runner.

pub mod emitter;
pub mod interpreter;
pub mod loader;
pub mod model;
pub mod postprocess;
pub mod slicer;
pub mod tags;

pub use emitter::{is_tag_in, GcodeEmitter};
pub use interpreter::Interpreter;
pub use loader::GcodeLoader;
pub use model::{GcodeDocument, GcodeLayer, GcodePath, ModelError, PathKind, PathType, Temperatures};
pub use postprocess::{PluginRegistry, PostProcessPipeline, PostProcessPlugin};
pub use slicer::{EngineResult, EngineSettings, SlicerCommand, SlicerError, SlicerObject, SlicerProcess};
pub use tags::{replace_gcode_tags, HeaderValues};
