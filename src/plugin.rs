//! Monitor plugin contract and registry.
//!
//! A plugin implements one monitor type (`http`, `tcp`, and so on). The
//! crate ships no probes; embedders register a [`PluginFactory`] per type
//! at process start and the factory owns the registry from then on.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::{ConfigError, UpbeatResult};
use crate::event::Event;

/// One schedulable unit of monitoring work.
pub trait Job: Send + Sync {
    /// Performs the check and returns the events it produced.
    ///
    /// # Errors
    ///
    /// Returns an error when the check itself cannot run; per-endpoint
    /// failures should be reported as events instead.
    fn run(&self) -> UpbeatResult<Vec<Event>>;
}

/// The runnable work a plugin built from one monitor configuration.
pub struct Plugin {
    /// Jobs to register with the scheduler, one task each.
    pub jobs: Vec<Box<dyn Job>>,
    /// Number of endpoints the jobs cover, for reporting.
    pub endpoints: usize,
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("jobs", &self.jobs.len())
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

/// Builds [`Plugin`] values for one monitor type.
pub trait PluginFactory: Send + Sync {
    /// Validates the monitor configuration and builds its jobs.
    ///
    /// Must be side-effect-free: no probing, no connections, nothing
    /// observable until a returned job actually runs. Configuration checks
    /// call this and throw the result away.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the monitor's options are
    /// invalid for this type.
    fn create(&self, raw: &Value) -> UpbeatResult<Plugin>;
}

/// Maps monitor types to their plugin factories.
#[derive(Default)]
pub struct PluginRegistry {
    factories: BTreeMap<String, Box<dyn PluginFactory>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for `monitor_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicatePlugin`] when the type is already
    /// taken.
    pub fn register(
        &mut self,
        monitor_type: &str,
        factory: Box<dyn PluginFactory>,
    ) -> Result<(), ConfigError> {
        if self.factories.contains_key(monitor_type) {
            return Err(ConfigError::DuplicatePlugin {
                name: monitor_type.to_string(),
            });
        }
        self.factories.insert(monitor_type.to_string(), factory);
        Ok(())
    }

    /// Whether a factory is registered for `monitor_type`.
    #[must_use]
    pub fn contains(&self, monitor_type: &str) -> bool {
        self.factories.contains_key(monitor_type)
    }

    /// All registered types, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Builds a plugin for `monitor_type` from a monitor's raw
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownMonitorType`] for an unregistered
    /// type, and the factory's own error when the configuration is
    /// invalid.
    pub fn create(&self, monitor_type: &str, raw: &Value) -> UpbeatResult<Plugin> {
        let factory =
            self.factories
                .get(monitor_type)
                .ok_or_else(|| ConfigError::UnknownMonitorType {
                    name: monitor_type.to_string(),
                })?;
        factory.create(raw)
    }
}
