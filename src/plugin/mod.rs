// Tue Jan 20 2026 - Alex

pub mod report;

use crate::engine::context::Discovered;
use indexmap::IndexMap;
use thiserror::Error;

pub use report::ReportPlugin;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("No plugin named {0} is registered")]
    NotRegistered(String),
    #[error("Plugin {0} is not enabled in the configuration")]
    NotEnabled(String),
    #[error("Plugin {name} failed to initialize: {reason}")]
    Initialization { name: String, reason: String },
    #[error("Plugin {name} failed: {reason}")]
    Execution { name: String, reason: String },
    #[error("No plugin is loaded")]
    NotLoaded,
}

/// Optional analysis module run against a discovered kernel.
pub trait Plugin: Send {
    fn name(&self) -> &str;

    fn initialize(&mut self, discovered: &Discovered) -> Result<(), PluginError>;

    fn execute(&mut self, discovered: &Discovered) -> Result<Vec<String>, PluginError>;
}

pub type PluginFactory = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Plugins known to this build, populated at startup.
#[derive(Default)]
pub struct PluginRegistry {
    factories: IndexMap<String, PluginFactory>,
    enabled: Option<Vec<String>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the plugins that ship with this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ReportPlugin::NAME, || Box::new(ReportPlugin));
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        if self.factories.insert(name.to_string(), Box::new(factory)).is_some() {
            log::warn!("Plugin {} registered twice, keeping the latest", name);
        }
    }

    /// Restricts loading to `names`. An empty list leaves every registered plugin loadable.
    pub fn with_enabled(mut self, names: &[String]) -> Self {
        self.enabled = if names.is_empty() { None } else { Some(names.to_vec()) };
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Plugin>, PluginError> {
        if let Some(enabled) = &self.enabled {
            if !enabled.iter().any(|n| n == name) {
                return Err(PluginError::NotEnabled(name.to_string()));
            }
        }
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginError::NotRegistered(name.to_string()))?;
        Ok(factory())
    }
}
