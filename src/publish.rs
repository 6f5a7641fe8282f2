//! Per-monitor publish settings and the config-editing hook built from them.
//!
//! Every monitor block may carry output options next to its probe options:
//! custom fields and tags, a user processor chain, an ingest pipeline name,
//! and the destination naming controls (`index`, `data_stream`, `dataset`).
//! [`PublishSettings`] unpacks that surface, [`setup_index_processor`] turns
//! the naming controls into an index-stamping processor, and
//! [`build_publish_editor`] folds everything into a [`ConfigEditor`] the
//! factory installs on the monitor's pipeline connection.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use tracing::debug;

use crate::agent::AgentInfo;
use crate::error::{ConfigError, UpbeatError, UpbeatResult};
use crate::pipeline::{ClientConfig, ConfigEditor, EventMetadata};
use crate::processor::index::AddFormattedIndex;
use crate::processor::{ChainBuilder, Processor, ProcessorRegistry};
use crate::template::IndexTemplate;

/// Dataset reported when neither naming source supplies one.
pub const DEFAULT_DATASET: &str = "uptime";

/// Field the resolved dataset is written to on every event.
pub const DATASET_FIELD: &str = "event.dataset";

/// Metadata key carrying the ingest pipeline name.
pub const PIPELINE_META_KEY: &str = "pipeline";

const DEFAULT_STREAM_TYPE: &str = "synthetics";
const DEFAULT_STREAM_DATASET: &str = "generic";
const DEFAULT_STREAM_NAMESPACE: &str = "default";

/// Structured destination naming components.
///
/// Fields left empty fall back independently, so a spec carrying only
/// `dataset` still lands in the default type and namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DataStreamSpec {
    /// Stream type, `synthetics` when empty.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Stream dataset, `generic` when empty.
    #[serde(default)]
    pub dataset: String,
    /// Stream namespace, `default` when empty.
    #[serde(default)]
    pub namespace: String,
}

impl DataStreamSpec {
    /// The composite index name, with per-field defaults applied.
    #[must_use]
    pub fn index_name(&self) -> String {
        let kind = non_empty(&self.kind, DEFAULT_STREAM_TYPE);
        let dataset = non_empty(&self.dataset, DEFAULT_STREAM_DATASET);
        let namespace = non_empty(&self.namespace, DEFAULT_STREAM_NAMESPACE);
        format!("{kind}-{dataset}-{namespace}")
    }
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

/// Wrapper for `publisher_pipeline.*` options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PublisherPipelineSettings {
    /// Suppress host-identity stamping on published events.
    #[serde(default)]
    pub disable_host: bool,
}

/// The publish-related slice of a monitor's configuration.
///
/// Immutable once unpacked. The naming controls overlap on purpose:
/// `data_stream` takes precedence over the legacy `index` template, and the
/// dataset resolves through [`PublishSettings::effective_dataset`] so no
/// caller ever sees a half-applied precedence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishSettings {
    /// Inline custom fields and tags.
    #[serde(flatten)]
    pub event_metadata: EventMetadata,
    /// User processor chain, one single-key map per processor.
    #[serde(default)]
    pub processors: Vec<Value>,
    /// Publisher-level toggles.
    #[serde(default)]
    pub publisher_pipeline: PublisherPipelineSettings,
    /// Retain null-valued fields in output events.
    #[serde(default)]
    pub keep_null: bool,
    /// Ingest pipeline name attached to output metadata.
    #[serde(default)]
    pub pipeline: Option<String>,
    /// Legacy index name template.
    #[serde(default)]
    pub index: Option<String>,
    /// Structured naming components, overriding `index` when present.
    #[serde(default)]
    pub data_stream: Option<DataStreamSpec>,
    /// Legacy dataset tag, lowest-precedence dataset source.
    #[serde(default)]
    pub dataset: Option<String>,
}

impl PublishSettings {
    /// Unpacks the publish options from a monitor's raw configuration.
    ///
    /// Options this module does not know are left for the monitor schema;
    /// only malformed known options fail here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unpack`] carrying the underlying decode
    /// message.
    pub fn from_config(raw: &Value) -> Result<Self, ConfigError> {
        serde_json::from_value(raw.clone()).map_err(|err| ConfigError::Unpack {
            field: "publish".to_string(),
            message: err.to_string(),
        })
    }

    /// Resolves the dataset reported on every event.
    ///
    /// Precedence, fixed: a non-empty legacy `dataset`, then a non-empty
    /// `data_stream.dataset`, then [`DEFAULT_DATASET`].
    #[must_use]
    pub fn effective_dataset(&self) -> &str {
        if let Some(dataset) = self.dataset.as_deref().filter(|d| !d.is_empty()) {
            return dataset;
        }
        self.data_stream
            .as_ref()
            .map(|stream| stream.dataset.as_str())
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DATASET)
    }
}

/// Builds the index-stamping processor for a monitor, if any naming is
/// configured.
///
/// A `data_stream` spec synthesizes its composite name and overrides the
/// legacy `index` template. With neither configured (or an empty `index`)
/// there is nothing to stamp and the output's own defaults apply.
///
/// # Errors
///
/// A legacy `index` that fails to compile is a [`TemplateError`]
/// propagated as-is. A synthesized data-stream name that fails to compile
/// violates the builder's own invariant and surfaces as
/// [`UpbeatError::Internal`].
///
/// [`TemplateError`]: crate::error::TemplateError
pub fn setup_index_processor(
    info: &AgentInfo,
    settings: &PublishSettings,
) -> UpbeatResult<Option<Arc<dyn Processor>>> {
    let static_fields = info.static_fields();

    if let Some(stream) = &settings.data_stream {
        let index = stream.index_name();
        let template = IndexTemplate::compile(&index, &static_fields).map_err(|err| {
            UpbeatError::internal(format!("could not compile index '{index}': {err}"))
        })?;
        return Ok(Some(Arc::new(AddFormattedIndex::new(template))));
    }

    let Some(index) = settings.index.as_deref().filter(|i| !i.is_empty()) else {
        return Ok(None);
    };
    let template = IndexTemplate::compile(index, &static_fields)?;
    Ok(Some(Arc::new(AddFormattedIndex::new(template))))
}

/// Builds the config editor that installs a monitor's publish settings.
///
/// All fallible work happens here, before the editor exists: the index
/// processor is built and the user chain is constructed and validated. The
/// returned editor is a pure transform over one inbound [`ClientConfig`]:
///
/// - the inbound fields gain `event.dataset` set to the resolved dataset;
/// - the inbound meta gains `pipeline` when an ingest pipeline is named;
/// - the outbound chain is index processor, then the inbound chain, then
///   the monitor's own processors, in that order;
/// - event metadata, `keep_null` and `disable_host` are overwritten
///   wholesale from the settings.
///
/// # Errors
///
/// Propagates index-processor compilation and processor-chain build
/// failures.
pub fn build_publish_editor(
    info: &AgentInfo,
    settings: PublishSettings,
    registry: &ProcessorRegistry,
) -> UpbeatResult<ConfigEditor> {
    let index_processor = setup_index_processor(info, &settings)?;
    let user_processors = registry.build_list(&settings.processors)?;
    let dataset = settings.effective_dataset().to_string();

    let PublishSettings {
        event_metadata,
        publisher_pipeline,
        keep_null,
        pipeline,
        ..
    } = settings;
    let pipeline = pipeline.filter(|p| !p.is_empty());

    let editor: ConfigEditor = Arc::new(move |mut config: ClientConfig| {
        let mut processing = config.processing;

        processing.fields.put(DATASET_FIELD, dataset.as_str());
        if let Some(pipeline) = &pipeline {
            processing.meta.put(PIPELINE_META_KEY, pipeline.as_str());
        }

        let mut chain = ChainBuilder::new();
        if let Some(index) = &index_processor {
            chain = chain.system(Arc::clone(index));
        }
        for step in processing.processors.steps() {
            chain = chain.caller(Arc::clone(step));
        }
        for step in user_processors.steps() {
            chain = chain.user(Arc::clone(step));
        }

        processing.processors = chain.build();
        processing.event_metadata = event_metadata.clone();
        processing.keep_null = keep_null;
        processing.disable_host = publisher_pipeline.disable_host;

        debug!(
            dataset = %dataset,
            chain = ?processing.processors.names(),
            "installed publish settings on output client"
        );

        config.processing = processing;
        Ok(config)
    });
    Ok(editor)
}
