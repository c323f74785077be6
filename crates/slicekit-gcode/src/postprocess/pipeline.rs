//! The configured post-process chain

use std::collections::BTreeMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

use slicekit_core::{ConfigurationError, PluginError};
use slicekit_settings::PluginStep;

use super::plugin::PluginHandle;
use super::registry::PluginRegistry;

struct Step {
    plugin: PluginHandle,
    bindings: BTreeMap<String, String>,
}

/// Ordered plugin steps with their parameter bindings
#[derive(Default)]
pub struct PostProcessPipeline {
    steps: Vec<Step>,
}

impl std::fmt::Debug for PostProcessPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|s| &s.plugin.info().name))
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "plugin panicked".to_string()
    }
}

impl PostProcessPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve configured steps against the registry.
    ///
    /// # Errors
    /// `ConfigurationError::UnknownPlugin` for the first unregistered name
    pub fn from_config(registry: &PluginRegistry, steps: &[PluginStep]) -> Result<Self, ConfigurationError> {
        let mut pipeline = Self::new();
        for step in steps {
            pipeline.push(registry.get(&step.name)?, step.params.clone());
        }
        Ok(pipeline)
    }

    pub fn push(&mut self, plugin: PluginHandle, bindings: BTreeMap<String, String>) -> &mut Self {
        self.steps.push(Step { plugin, bindings });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn run_step(step: &Step, path: &Path) -> Result<(), PluginError> {
        let info = step.plugin.info();
        let params = info.bind(&step.bindings)?;
        match panic::catch_unwind(AssertUnwindSafe(|| step.plugin.transform(path, &params))) {
            Ok(result) => result,
            Err(payload) => Err(PluginError::failed(
                "Panic",
                panic_message(&*payload),
                &info.name,
            )),
        }
    }

    /// Run every step over a temporary copy of `target`, then copy the
    /// result back.
    ///
    /// Stops at the first failing step and leaves `target` untouched.
    ///
    /// # Errors
    /// The failure rendered as `<kind>: '<message>' @ <file>:<function>:<line>`
    pub fn run(&self, target: &Path) -> Result<(), String> {
        if self.steps.is_empty() {
            return Ok(());
        }
        let io_error = |e: std::io::Error| PluginError::failed("IOError", e.to_string(), "run").to_string();

        let temp = tempfile::NamedTempFile::new().map_err(io_error)?;
        fs::copy(target, temp.path()).map_err(io_error)?;

        for step in &self.steps {
            let name = &step.plugin.info().name;
            tracing::info!("Running post-process plugin {}", name);
            if let Err(err) = Self::run_step(step, temp.path()) {
                tracing::error!("Post-process plugin {} failed: {}", name, err);
                return Err(err.to_string());
            }
        }

        fs::copy(temp.path(), target).map_err(io_error)?;
        Ok(())
    }

    /// [`run`](Self::run) on the blocking thread pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run_in_background(self, target: PathBuf) -> JoinHandle<Result<(), String>> {
        tokio::task::spawn_blocking(move || self.run(&target))
    }
}
