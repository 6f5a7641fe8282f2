//! Output pipeline contract and per-client processing state.
//!
//! Monitors never talk to an output directly. They connect to a [`Pipeline`]
//! and receive a [`Client`]; everything monitor-specific about how events
//! are enriched travels in the [`ClientConfig`] handed to `connect_with`.
//! [`with_client_config_edit`] is the seam the factory uses to install a
//! monitor's publish settings: it wraps a pipeline so every connection's
//! config passes through an editor first.

/// In-memory pipeline backend.
pub mod memory;

pub use memory::{CollectorConfig, CollectorPipeline};

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::UpbeatResult;
use crate::event::{Event, Fields};
use crate::processor::{Processor, ProcessorList};

/// Key custom metadata fields nest under when not placed at the root.
const CUSTOM_FIELDS_KEY: &str = "fields";

/// Key the host identity is stamped under.
const HOST_NAME_KEY: &str = "host.name";

/// Inline event metadata from a monitor's configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventMetadata {
    /// Custom fields added to every event.
    #[serde(default)]
    pub fields: Fields,
    /// Place custom fields at the event root instead of under `fields`.
    #[serde(default)]
    pub fields_under_root: bool,
    /// Tags appended to every event.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EventMetadata {
    /// Whether no metadata is configured at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.tags.is_empty()
    }
}

/// Per-connection event processing state.
///
/// `apply` runs the stages in a fixed order: connection meta, connection
/// fields, configured event metadata, host identity, the processor chain,
/// and finally null stripping. Each stage sees the output of the previous
/// one, so a processor can drop or rewrite what earlier stages added.
#[derive(Debug, Clone, Default)]
pub struct Processing {
    /// Fields merged into every event's body.
    pub fields: Fields,
    /// Metadata merged into every event's meta map.
    pub meta: Fields,
    /// Configured custom fields and tags.
    pub event_metadata: EventMetadata,
    /// The processor chain events run through.
    pub processors: ProcessorList,
    /// Retain null-valued fields instead of stripping them.
    pub keep_null: bool,
    /// Suppress host-identity stamping.
    pub disable_host: bool,
}

impl Processing {
    /// Runs one event through every processing stage.
    ///
    /// Returns `Ok(None)` when a processor drops the event.
    ///
    /// # Errors
    ///
    /// Propagates the first processor failure.
    pub fn apply(&self, mut event: Event, host: Option<&str>) -> UpbeatResult<Option<Event>> {
        event.meta.merge(&self.meta);
        event.fields.merge(&self.fields);

        if !self.event_metadata.fields.is_empty() {
            if self.event_metadata.fields_under_root {
                event.fields.merge(&self.event_metadata.fields);
            } else {
                let mut nested = Fields::new();
                nested.put(
                    CUSTOM_FIELDS_KEY,
                    Value::Object(self.event_metadata.fields.as_map().clone()),
                );
                event.fields.merge(&nested);
            }
        }
        for tag in &self.event_metadata.tags {
            event.tag(tag);
        }

        if !self.disable_host {
            if let Some(host) = host {
                if event.get(HOST_NAME_KEY).is_none() {
                    event.put(HOST_NAME_KEY, host);
                }
            }
        }

        let Some(mut event) = self.processors.run(event)? else {
            return Ok(None);
        };

        if !self.keep_null {
            event.fields.strip_nulls();
        }
        Ok(Some(event))
    }
}

/// Settings a monitor hands the pipeline when connecting.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Event processing applied to everything published through the client.
    pub processing: Processing,
}

/// A connected producer handle.
pub trait Client: Send + Sync {
    /// Publishes one event.
    ///
    /// # Errors
    ///
    /// Returns a pipeline fault when the event cannot be accepted.
    fn publish(&self, event: Event) -> UpbeatResult<()>;

    /// Releases the connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a pipeline fault when the release itself fails.
    fn close(&self) -> UpbeatResult<()>;
}

/// An event sink monitors connect to.
pub trait Pipeline: Send + Sync {
    /// Opens a client carrying the given processing settings.
    ///
    /// # Errors
    ///
    /// Returns a pipeline fault when the connection cannot be opened.
    fn connect_with(&self, config: ClientConfig) -> UpbeatResult<Arc<dyn Client>>;

    /// Opens a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns a pipeline fault when the connection cannot be opened.
    fn connect(&self) -> UpbeatResult<Arc<dyn Client>> {
        self.connect_with(ClientConfig::default())
    }
}

/// A pure transform applied to a [`ClientConfig`] at connect time.
pub type ConfigEditor = Arc<dyn Fn(ClientConfig) -> UpbeatResult<ClientConfig> + Send + Sync>;

/// Wraps `pipeline` so every connection's config passes through `editor`
/// before reaching it. Wrapping composes; the outermost editor runs first.
pub fn with_client_config_edit(
    pipeline: Arc<dyn Pipeline>,
    editor: ConfigEditor,
) -> Arc<dyn Pipeline> {
    Arc::new(EditingPipeline {
        inner: pipeline,
        editor,
    })
}

struct EditingPipeline {
    inner: Arc<dyn Pipeline>,
    editor: ConfigEditor,
}

impl Pipeline for EditingPipeline {
    fn connect_with(&self, config: ClientConfig) -> UpbeatResult<Arc<dyn Client>> {
        let edited = (self.editor)(config)?;
        self.inner.connect_with(edited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use serde_json::json;

    use crate::processor::ChainBuilder;

    struct Tagger(&'static str);

    impl Processor for Tagger {
        fn name(&self) -> &str {
            self.0
        }

        fn run(&self, mut event: Event) -> UpbeatResult<Option<Event>> {
            event.tag(self.0);
            Ok(Some(event))
        }
    }

    struct DropAll;

    impl Processor for DropAll {
        fn name(&self) -> &str {
            "drop_all"
        }

        fn run(&self, _event: Event) -> UpbeatResult<Option<Event>> {
            Ok(None)
        }
    }

    fn metadata_fields() -> Fields {
        let mut fields = Fields::new();
        fields.put("env", "prod");
        fields
    }

    #[test]
    fn apply_merges_meta_fields_and_metadata() {
        let mut meta = Fields::new();
        meta.put("pipeline", "geoip");
        let mut fields = Fields::new();
        fields.put("event.dataset", "uptime");

        let processing = Processing {
            meta,
            fields,
            event_metadata: EventMetadata {
                fields: metadata_fields(),
                fields_under_root: false,
                tags: vec!["edge".to_string()],
            },
            ..Processing::default()
        };

        let out = processing.apply(Event::now(), None).unwrap().unwrap();
        assert_eq!(out.meta.get_str("pipeline"), Some("geoip"));
        assert_eq!(out.get("event.dataset").and_then(Value::as_str), Some("uptime"));
        assert_eq!(out.get("fields.env").and_then(Value::as_str), Some("prod"));
        assert_eq!(out.get("tags"), Some(&json!(["edge"])));
    }

    #[test]
    fn fields_under_root_skips_the_nesting_key() {
        let processing = Processing {
            event_metadata: EventMetadata {
                fields: metadata_fields(),
                fields_under_root: true,
                tags: Vec::new(),
            },
            ..Processing::default()
        };

        let out = processing.apply(Event::now(), None).unwrap().unwrap();
        assert_eq!(out.get("env").and_then(Value::as_str), Some("prod"));
        assert!(out.get("fields").is_none());
    }

    #[test]
    fn host_is_stamped_unless_disabled_or_present() {
        let processing = Processing::default();
        let out = processing.apply(Event::now(), Some("edge-1")).unwrap().unwrap();
        assert_eq!(out.get("host.name").and_then(Value::as_str), Some("edge-1"));

        let disabled = Processing {
            disable_host: true,
            ..Processing::default()
        };
        let out = disabled.apply(Event::now(), Some("edge-1")).unwrap().unwrap();
        assert!(out.get("host.name").is_none());

        let mut event = Event::now();
        event.put("host.name", "already-set");
        let out = processing.apply(event, Some("edge-1")).unwrap().unwrap();
        assert_eq!(
            out.get("host.name").and_then(Value::as_str),
            Some("already-set")
        );
    }

    #[test]
    fn nulls_are_stripped_unless_keep_null() {
        let mut event = Event::now();
        event.put("error.message", Value::Null);

        let processing = Processing::default();
        let out = processing.apply(event.clone(), None).unwrap().unwrap();
        assert!(out.get("error.message").is_none());

        let keeping = Processing {
            keep_null: true,
            ..Processing::default()
        };
        let out = keeping.apply(event, None).unwrap().unwrap();
        assert_eq!(out.get("error.message"), Some(&Value::Null));
    }

    #[test]
    fn chain_runs_after_metadata_and_can_drop() {
        let processing = Processing {
            processors: ChainBuilder::new().user(Arc::new(Tagger("late"))).build(),
            event_metadata: EventMetadata {
                tags: vec!["early".to_string()],
                ..EventMetadata::default()
            },
            ..Processing::default()
        };

        let out = processing.apply(Event::now(), None).unwrap().unwrap();
        assert_eq!(out.get("tags"), Some(&json!(["early", "late"])));

        let dropping = Processing {
            processors: ChainBuilder::new().user(Arc::new(DropAll)).build(),
            ..Processing::default()
        };
        assert!(dropping.apply(Event::now(), None).unwrap().is_none());
    }

    struct NopClient;

    impl Client for NopClient {
        fn publish(&self, _event: Event) -> UpbeatResult<()> {
            Ok(())
        }

        fn close(&self) -> UpbeatResult<()> {
            Ok(())
        }
    }

    struct Recording {
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl Pipeline for Recording {
        fn connect_with(&self, config: ClientConfig) -> UpbeatResult<Arc<dyn Client>> {
            let names = config
                .processing
                .processors
                .names()
                .into_iter()
                .map(ToString::to_string)
                .collect();
            self.seen.lock().unwrap().push(names);
            Ok(Arc::new(NopClient))
        }
    }

    #[test]
    fn editing_wrapper_rewrites_configs_before_connecting() {
        let recording = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });

        let editor: ConfigEditor = Arc::new(|mut config: ClientConfig| {
            let mut chain = ProcessorList::new();
            chain.push(Arc::new(Tagger("injected")));
            chain.extend(config.processing.processors);
            config.processing.processors = chain;
            Ok(config)
        });

        let wrapped = with_client_config_edit(recording.clone(), editor);

        let inbound = ClientConfig {
            processing: Processing {
                processors: ChainBuilder::new().caller(Arc::new(Tagger("inbound"))).build(),
                ..Processing::default()
            },
        };
        wrapped.connect_with(inbound).unwrap();

        let seen = recording.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[vec!["injected".to_string(), "inbound".to_string()]]);
    }
}
