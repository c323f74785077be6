//! Post-processing of produced G-code files.
//!
//! A plugin rewrites a G-code file in place. The [`PostProcessPipeline`]
//! runs the configured chain over a temporary copy and only replaces the
//! real output once every step succeeded.

pub mod builtin;
pub mod pipeline;
pub mod plugin;
pub mod registry;

pub use builtin::{PauseAtZ, TweakAtZ};
pub use pipeline::PostProcessPipeline;
pub use plugin::{ParamKind, ParamValue, PluginHandle, PluginInfo, PluginParam, PluginParams, PostProcessPlugin};
pub use registry::PluginRegistry;
