//! Registry of available post-process plugins

use std::collections::BTreeMap;
use std::sync::Arc;

use slicekit_core::ConfigurationError;

use super::builtin::{PauseAtZ, TweakAtZ};
use super::plugin::{PluginHandle, PostProcessPlugin};

/// Plugins by name
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, PluginHandle>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in plugins
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PauseAtZ::new()));
        registry.register(Arc::new(TweakAtZ::new()));
        registry
    }

    /// Register a plugin under its declared name, replacing any previous one
    pub fn register(&mut self, plugin: Arc<dyn PostProcessPlugin>) -> &mut Self {
        let name = plugin.info().name.clone();
        if self.plugins.insert(name.clone(), plugin).is_some() {
            tracing::debug!("Replaced post-process plugin {}", name);
        }
        self
    }

    /// # Errors
    /// `ConfigurationError::UnknownPlugin` when nothing is registered as `name`
    pub fn get(&self, name: &str) -> Result<PluginHandle, ConfigurationError> {
        self.plugins
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownPlugin { name: name.to_string() })
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry").field("plugins", &self.list()).finish()
    }
}
