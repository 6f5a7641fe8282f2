//! Field and tag manipulation processors.
//!
//! These are the built-in processors a monitor configuration can name under
//! its `processors` list. Each one deserializes its own settings block and
//! validates it at build time, so a monitor with a bad processor never
//! starts.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ProcessorError, UpbeatResult};
use crate::event::{Event, Fields, TAGS_KEY};
use crate::processor::Processor;

fn invalid(name: &str, err: &serde_json::Error) -> ProcessorError {
    ProcessorError::InvalidConfig {
        name: name.to_string(),
        message: err.to_string(),
    }
}

/// Merges a fixed set of fields into every event.
///
/// Keys may be dotted paths and values may be whole objects; existing event
/// fields win only when the incoming value is an object to merge into,
/// otherwise the configured value replaces them. With `target` set the
/// fields land under that path instead of the event root.
#[derive(Debug, Clone, Deserialize)]
pub struct AddFields {
    fields: Map<String, Value>,
    #[serde(default)]
    target: Option<String>,
}

impl AddFields {
    /// Name this processor is registered under.
    pub const NAME: &'static str = "add_fields";

    /// Builds the processor from its settings block.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::InvalidConfig`] when the block does not
    /// deserialize.
    pub fn from_config(config: &Value) -> Result<Self, ProcessorError> {
        serde_json::from_value(config.clone()).map_err(|e| invalid(Self::NAME, &e))
    }
}

impl Processor for AddFields {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, mut event: Event) -> UpbeatResult<Option<Event>> {
        let mut overlay = Fields::new();
        match &self.target {
            Some(target) => overlay.put(target, Value::Object(self.fields.clone())),
            None => {
                for (key, value) in &self.fields {
                    overlay.put(key, value.clone());
                }
            }
        }
        event.fields.merge(&overlay);
        Ok(Some(event))
    }
}

/// Appends tags to an event's tag list.
///
/// Duplicate tags are skipped. A scalar already sitting at the target path
/// is promoted to a one-element list before appending.
#[derive(Debug, Clone, Deserialize)]
pub struct AddTags {
    tags: Vec<String>,
    #[serde(default)]
    target: Option<String>,
}

impl AddTags {
    /// Name this processor is registered under.
    pub const NAME: &'static str = "add_tags";

    /// Builds the processor from its settings block.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::InvalidConfig`] when the block does not
    /// deserialize.
    pub fn from_config(config: &Value) -> Result<Self, ProcessorError> {
        serde_json::from_value(config.clone()).map_err(|e| invalid(Self::NAME, &e))
    }
}

impl Processor for AddTags {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, mut event: Event) -> UpbeatResult<Option<Event>> {
        let target = self.target.as_deref().unwrap_or(TAGS_KEY);
        let mut values: Vec<Value> = match event.get(target) {
            Some(Value::Array(existing)) => existing.clone(),
            Some(other) => vec![other.clone()],
            None => Vec::new(),
        };
        for tag in &self.tags {
            if !values.iter().any(|v| v.as_str() == Some(tag)) {
                values.push(Value::String(tag.clone()));
            }
        }
        event.put(target, Value::Array(values));
        Ok(Some(event))
    }
}

/// Removes fields from an event.
///
/// A named field that does not exist fails the event unless
/// `ignore_missing` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct DropFields {
    fields: Vec<String>,
    #[serde(default)]
    ignore_missing: bool,
}

impl DropFields {
    /// Name this processor is registered under.
    pub const NAME: &'static str = "drop_fields";

    /// Builds the processor from its settings block.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::InvalidConfig`] when the block does not
    /// deserialize.
    pub fn from_config(config: &Value) -> Result<Self, ProcessorError> {
        serde_json::from_value(config.clone()).map_err(|e| invalid(Self::NAME, &e))
    }
}

impl Processor for DropFields {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&self, mut event: Event) -> UpbeatResult<Option<Event>> {
        for field in &self.fields {
            if event.fields.remove(field).is_none() && !self.ignore_missing {
                return Err(ProcessorError::Failed {
                    name: Self::NAME.to_string(),
                    message: format!("field '{field}' does not exist"),
                }
                .into());
            }
        }
        Ok(Some(event))
    }
}
