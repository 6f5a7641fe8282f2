//! Monitor factory and the runnable-factory contract.
//!
//! The factory is what an external reload manager drives: `create` turns
//! one raw monitor configuration into a running [`Monitor`] attached to a
//! pipeline, and `check_config` runs the identical validation path with no
//! side effects. Everything monitor-specific about publishing is folded in
//! here, by wrapping the caller's pipeline with the monitor's config
//! editor before connecting.

use std::sync::Arc;

use serde_json::Value;

use tracing::debug;

use crate::agent::AgentInfo;
use crate::error::{ConfigError, UpbeatResult};
use crate::monitor::{Monitor, MonitorConfig};
use crate::pipeline::{with_client_config_edit, Pipeline};
use crate::plugin::{Job, PluginRegistry};
use crate::processor::ProcessorRegistry;
use crate::publish::{build_publish_editor, PublishSettings};
use crate::scheduler::Scheduler;

/// A runnable unit managed by an external reload manager.
pub trait Runner: Send + Sync {
    /// Stable identifier the manager deduplicates runners by.
    fn id(&self) -> &str;

    /// Starts the runner. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error when the runner cannot be scheduled.
    fn start(&self) -> UpbeatResult<()>;

    /// Stops the runner and releases its resources. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error when teardown fails.
    fn stop(&self) -> UpbeatResult<()>;
}

/// The contract a reload manager drives to build runners.
pub trait RunnerFactory: Send + Sync {
    /// Builds and starts a runner for one raw configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or the pipeline
    /// connection fails; a failed create leaves nothing running.
    fn create(&self, pipeline: Arc<dyn Pipeline>, raw: &Value) -> UpbeatResult<Box<dyn Runner>>;

    /// Validates a raw configuration without building anything.
    ///
    /// # Errors
    ///
    /// Returns the same error `create` would for this configuration.
    fn check_config(&self, raw: &Value) -> UpbeatResult<()>;
}

/// Everything a [`MonitorFactory`] needs to build monitors.
pub struct FactoryParams {
    /// Agent identity, bound into compiled index-name templates.
    pub info: AgentInfo,
    /// Shared scheduler monitors register their tasks with.
    pub scheduler: Arc<Scheduler>,
    /// Monitor type registry.
    pub plugins: Arc<PluginRegistry>,
    /// Processor registry user chains are built against.
    pub processors: Arc<ProcessorRegistry>,
    /// Accept `watch.poll_file` monitor options.
    pub allow_watches: bool,
}

/// Builds monitors from raw configurations.
pub struct MonitorFactory {
    info: AgentInfo,
    scheduler: Arc<Scheduler>,
    plugins: Arc<PluginRegistry>,
    processors: Arc<ProcessorRegistry>,
    allow_watches: bool,
}

impl MonitorFactory {
    /// Creates a factory from its parameters.
    #[must_use]
    pub fn new(params: FactoryParams) -> Self {
        Self {
            info: params.info,
            scheduler: params.scheduler,
            plugins: params.plugins,
            processors: params.processors,
            allow_watches: params.allow_watches,
        }
    }

    /// Builds, connects and starts a monitor on the given pipeline.
    ///
    /// The pipeline is wrapped with the monitor's publish editor before
    /// connecting, so every event the monitor emits carries its resolved
    /// settings. All fallible work precedes scheduler registration; a
    /// failed create leaves nothing registered and nothing connected.
    ///
    /// # Errors
    ///
    /// Propagates schema, publish-settings, plugin and pipeline failures.
    pub fn create(&self, pipeline: Arc<dyn Pipeline>, raw: &Value) -> UpbeatResult<Monitor> {
        let monitor = self.new_monitor(Some(pipeline), raw)?;
        monitor.start()?;
        Ok(monitor)
    }

    /// Validates one raw monitor configuration.
    ///
    /// Runs the full build path, including publish settings and the user
    /// processor chain, with no pipeline and no scheduler. Safe to call
    /// repeatedly and concurrently.
    ///
    /// # Errors
    ///
    /// Returns the same error `create` would for this configuration.
    pub fn check_config(&self, raw: &Value) -> UpbeatResult<()> {
        self.new_monitor(None, raw).map(drop)
    }

    fn new_monitor(
        &self,
        pipeline: Option<Arc<dyn Pipeline>>,
        raw: &Value,
    ) -> UpbeatResult<Monitor> {
        let config = MonitorConfig::from_config(raw)?;
        if config.watch.is_some() && !self.allow_watches {
            return Err(ConfigError::WatchesDisabled.into());
        }

        let settings = PublishSettings::from_config(raw)?;
        let editor = build_publish_editor(&self.info, settings, &self.processors)?;

        let plugin = self.plugins.create(&config.monitor_type, raw)?;
        let jobs: Vec<Arc<dyn Job>> = plugin.jobs.into_iter().map(Arc::from).collect();
        let id = config.resolve_id(raw);

        let (client, scheduler) = match pipeline {
            Some(pipeline) => {
                let editing = with_client_config_edit(pipeline, editor);
                let client = editing.connect()?;
                (Some(client), Some(Arc::clone(&self.scheduler)))
            }
            None => (None, None),
        };

        debug!(
            id = %id,
            monitor_type = %config.monitor_type,
            jobs = jobs.len(),
            "monitor built"
        );
        Ok(Monitor::new(
            &config,
            id,
            jobs,
            plugin.endpoints,
            client,
            scheduler,
        ))
    }
}

impl RunnerFactory for MonitorFactory {
    fn create(&self, pipeline: Arc<dyn Pipeline>, raw: &Value) -> UpbeatResult<Box<dyn Runner>> {
        let monitor = MonitorFactory::create(self, pipeline, raw)?;
        Ok(Box::new(monitor))
    }

    fn check_config(&self, raw: &Value) -> UpbeatResult<()> {
        MonitorFactory::check_config(self, raw)
    }
}

impl Runner for Monitor {
    fn id(&self) -> &str {
        Monitor::id(self)
    }

    fn start(&self) -> UpbeatResult<()> {
        Monitor::start(self)
    }

    fn stop(&self) -> UpbeatResult<()> {
        Monitor::stop(self)
    }
}
