//! # Upbeat - uptime monitoring agent core
//!
//! Upbeat turns raw monitor configurations into running monitors attached
//! to a shared output pipeline. Its centerpiece is the per-monitor publish
//! configuration: destination naming (legacy index templates or data
//! streams), dataset tagging, ingest-pipeline selection and processor
//! chains, resolved once per monitor and installed as a config-editing
//! hook on the monitor's pipeline connection before any event flows.
//!
//! ## Core concepts
//!
//! - **Monitor**: one configured check with an identity, a schedule and jobs
//! - **Publish settings**: the output options a monitor block carries
//! - **Config editor**: a pure transform merging those options into the
//!   pipeline connection's processing state
//! - **Index template**: a compiled, timestamp-aware destination name
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use upbeat::{
//!     AgentInfo, CollectorPipeline, FactoryParams, MonitorFactory,
//!     PluginRegistry, ProcessorRegistry, Scheduler,
//! };
//!
//! let mut plugins = PluginRegistry::new();
//! plugins.register("http", Box::new(HttpPlugin))?;
//!
//! let factory = MonitorFactory::new(FactoryParams {
//!     info: AgentInfo::default(),
//!     scheduler: Arc::new(Scheduler::new()),
//!     plugins: Arc::new(plugins),
//!     processors: Arc::new(ProcessorRegistry::default()),
//!     allow_watches: false,
//! });
//!
//! let pipeline = Arc::new(CollectorPipeline::default());
//! let monitor = factory.create(pipeline, &json!({
//!     "type": "http",
//!     "schedule": "@every 30s",
//!     "data_stream": {"dataset": "uptime-check", "namespace": "prod"},
//! }))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod agent;
pub mod error;
pub mod event;
pub mod template;

// Processing and output
pub mod pipeline;
pub mod processor;
pub mod publish;

// Monitor lifecycle
pub mod factory;
pub mod monitor;
pub mod plugin;
pub mod scheduler;

// Re-export primary types at crate root for convenience
pub use agent::AgentInfo;
pub use error::{
    ConfigError, PipelineError, ProcessorError, TemplateError, UpbeatError, UpbeatResult,
};
pub use event::{Event, Fields};
pub use template::IndexTemplate;

pub use pipeline::{
    with_client_config_edit, Client, ClientConfig, CollectorPipeline, ConfigEditor,
    EventMetadata, Pipeline, Processing,
};
pub use processor::{
    AddFormattedIndex, ChainBuilder, Processor, ProcessorList, ProcessorRegistry, RAW_INDEX,
};
pub use publish::{
    build_publish_editor, setup_index_processor, DataStreamSpec, PublishSettings, DEFAULT_DATASET,
};

pub use factory::{FactoryParams, MonitorFactory, Runner, RunnerFactory};
pub use monitor::{Monitor, MonitorConfig};
pub use plugin::{Job, Plugin, PluginFactory, PluginRegistry};
pub use scheduler::{Schedule, Scheduler, TaskId};
