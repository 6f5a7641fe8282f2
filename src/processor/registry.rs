//! Name-to-constructor registry for configured processors.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ProcessorError;
use crate::processor::actions::{AddFields, AddTags, DropFields};
use crate::processor::{Processor, ProcessorList};

type BuildFn = Box<dyn Fn(&Value) -> Result<Arc<dyn Processor>, ProcessorError> + Send + Sync>;

/// Maps processor names to their constructors.
///
/// A monitor's `processors` list is a sequence of one-key maps, each key
/// naming a registered processor and its value carrying that processor's
/// settings. [`ProcessorRegistry::default`] knows the built-in actions;
/// embedders can register additional ones under new names. Registering a
/// name again replaces the earlier constructor.
pub struct ProcessorRegistry {
    builders: BTreeMap<String, BuildFn>,
}

impl ProcessorRegistry {
    /// Creates a registry with no processors at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    /// Registers a constructor under `name`.
    pub fn register<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&Value) -> Result<Arc<dyn Processor>, ProcessorError> + Send + Sync + 'static,
    {
        self.builders.insert(name.to_string(), Box::new(builder));
    }

    /// Whether a constructor is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// All registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }

    /// Builds a single processor from its name and settings block.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::UnknownProcessor`] for an unregistered name
    /// and the constructor's own error when the settings are bad.
    pub fn build(&self, name: &str, config: &Value) -> Result<Arc<dyn Processor>, ProcessorError> {
        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| ProcessorError::UnknownProcessor {
                name: name.to_string(),
            })?;
        builder(config)
    }

    /// Builds an ordered chain from a `processors` configuration list.
    ///
    /// Every entry must be a map with exactly one key. The whole list is
    /// validated: one bad entry fails the build and no processors leak out.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::InvalidSpec`] for a malformed entry,
    /// [`ProcessorError::UnknownProcessor`] for an unregistered name, and
    /// [`ProcessorError::InvalidConfig`] when a settings block does not
    /// deserialize.
    pub fn build_list(&self, specs: &[Value]) -> Result<ProcessorList, ProcessorError> {
        let mut list = ProcessorList::new();
        for spec in specs {
            let Some(map) = spec.as_object() else {
                return Err(ProcessorError::InvalidSpec {
                    got: describe(spec),
                });
            };
            if map.len() != 1 {
                return Err(ProcessorError::InvalidSpec {
                    got: describe(spec),
                });
            }
            let (name, config) = map.iter().next().ok_or_else(|| ProcessorError::InvalidSpec {
                got: describe(spec),
            })?;
            list.push(self.build(name, config)?);
        }
        Ok(list)
    }
}

impl Default for ProcessorRegistry {
    /// A registry with the built-in action processors.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(AddFields::NAME, |config| {
            Ok(Arc::new(AddFields::from_config(config)?) as Arc<dyn Processor>)
        });
        registry.register(AddTags::NAME, |config| {
            Ok(Arc::new(AddTags::from_config(config)?) as Arc<dyn Processor>)
        });
        registry.register(DropFields::NAME, |config| {
            Ok(Arc::new(DropFields::from_config(config)?) as Arc<dyn Processor>)
        });
        registry
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(_) => "a number".to_string(),
        Value::String(_) => "a string".to_string(),
        Value::Array(_) => "an array".to_string(),
        Value::Object(map) => format!("a map with {} keys", map.len()),
    }
}
