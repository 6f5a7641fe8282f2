//! Monitor configuration schema and lifecycle.
//!
//! A monitor is one configured check: its identity, its schedule, the jobs
//! its plugin built, and the pipeline client its events flow through.
//! Everything fallible happens before a monitor exists; the lifecycle
//! itself only registers and unregisters scheduler tasks.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::Value;

use tracing::info;

use crate::error::{ConfigError, UpbeatError, UpbeatResult};
use crate::pipeline::Client;
use crate::plugin::Job;
use crate::scheduler::{Schedule, Scheduler, TaskId};

/// File-watch options for a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchConfig {
    /// File polled for externally managed monitor definitions.
    pub poll_file: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawMonitor {
    #[serde(default, rename = "type")]
    monitor_type: Option<String>,
    #[serde(default)]
    schedule: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    watch: Option<WatchConfig>,
}

/// The scheduling slice of a monitor's configuration.
///
/// Publish options live in [`PublishSettings`]; this covers what the
/// factory itself needs to build and register the monitor.
///
/// [`PublishSettings`]: crate::publish::PublishSettings
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Monitor type, resolved against the plugin registry.
    pub monitor_type: String,
    /// Execution schedule.
    pub schedule: Schedule,
    /// User-supplied identifier, when present.
    pub id: Option<String>,
    /// Human-readable name.
    pub name: Option<String>,
    /// Disabled monitors are built but never scheduled.
    pub enabled: bool,
    /// File-watch options, gated by the factory.
    pub watch: Option<WatchConfig>,
}

impl MonitorConfig {
    /// Unpacks and validates the monitor schema from a raw configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the missing or invalid field.
    pub fn from_config(raw: &Value) -> Result<Self, ConfigError> {
        let unpacked: RawMonitor =
            serde_json::from_value(raw.clone()).map_err(|err| ConfigError::Unpack {
                field: "monitor".to_string(),
                message: err.to_string(),
            })?;

        let monitor_type = unpacked
            .monitor_type
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: "type".to_string(),
            })?;
        let schedule = unpacked
            .schedule
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: "schedule".to_string(),
            })?;
        let schedule = Schedule::parse(&schedule)?;

        Ok(Self {
            monitor_type,
            schedule,
            id: unpacked.id.filter(|id| !id.is_empty()),
            name: unpacked.name,
            enabled: unpacked.enabled.unwrap_or(true),
            watch: unpacked.watch,
        })
    }

    /// The monitor's identifier: the configured `id`, or a stable hash of
    /// the whole configuration when none was given.
    #[must_use]
    pub fn resolve_id(&self, raw: &Value) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => stable_id(&self.monitor_type, raw),
        }
    }
}

/// Derives a deterministic identifier from a monitor's raw configuration.
///
/// The same configuration always hashes to the same id, so reloads do not
/// reshuffle identities.
#[must_use]
pub fn stable_id(monitor_type: &str, raw: &Value) -> String {
    let hash = blake3::hash(raw.to_string().as_bytes());
    format!("auto-{monitor_type}-{}", &hash.to_hex()[..16])
}

/// A built monitor and its scheduler registrations.
///
/// Built exclusively by the factory. A monitor built for validation
/// carries no client and no scheduler; its lifecycle methods are no-ops.
pub struct Monitor {
    id: String,
    name: Option<String>,
    monitor_type: String,
    enabled: bool,
    schedule: Schedule,
    endpoints: usize,
    jobs: Vec<Arc<dyn Job>>,
    client: Option<Arc<dyn Client>>,
    scheduler: Option<Arc<Scheduler>>,
    task_ids: Mutex<Vec<TaskId>>,
    started: AtomicBool,
}

impl Monitor {
    pub(crate) fn new(
        config: &MonitorConfig,
        id: String,
        jobs: Vec<Arc<dyn Job>>,
        endpoints: usize,
        client: Option<Arc<dyn Client>>,
        scheduler: Option<Arc<Scheduler>>,
    ) -> Self {
        Self {
            id,
            name: config.name.clone(),
            monitor_type: config.monitor_type.clone(),
            enabled: config.enabled,
            schedule: config.schedule,
            endpoints,
            jobs,
            client,
            scheduler,
            task_ids: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// The monitor's identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The configured name, when present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The monitor type.
    #[must_use]
    pub fn monitor_type(&self) -> &str {
        &self.monitor_type
    }

    /// Whether the monitor is enabled for scheduling.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// The execution schedule.
    #[must_use]
    pub const fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Number of endpoints the monitor's jobs cover.
    #[must_use]
    pub const fn endpoints(&self) -> usize {
        self.endpoints
    }

    /// Whether `start` has registered the monitor's tasks.
    #[must_use]
    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Registers every job with the scheduler. Idempotent; a disabled
    /// monitor registers nothing.
    ///
    /// # Errors
    ///
    /// Propagates scheduler failures; on failure, nothing stays
    /// registered.
    pub fn start(&self) -> UpbeatResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if !self.enabled {
            info!(id = %self.id, "monitor disabled, not scheduling");
            return Ok(());
        }
        let Some(scheduler) = &self.scheduler else {
            return Ok(());
        };

        let mut registered = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            match scheduler.add(self.schedule, Arc::clone(job)) {
                Ok(task_id) => registered.push(task_id),
                Err(err) => {
                    for task_id in registered {
                        let _ = scheduler.remove(task_id);
                    }
                    self.started.store(false, Ordering::SeqCst);
                    return Err(err);
                }
            }
        }

        let mut task_ids = self
            .task_ids
            .lock()
            .map_err(|_| UpbeatError::internal("poisoned lock: monitor.start"))?;
        *task_ids = registered;
        info!(
            id = %self.id,
            monitor_type = %self.monitor_type,
            tasks = task_ids.len(),
            endpoints = self.endpoints,
            "monitor started"
        );
        Ok(())
    }

    /// Unregisters the monitor's tasks and closes its client, whether or
    /// not the monitor ever started. Idempotent; also runs on drop.
    ///
    /// # Errors
    ///
    /// Propagates scheduler and client failures.
    pub fn stop(&self) -> UpbeatResult<()> {
        let was_started = self.started.swap(false, Ordering::SeqCst);

        let drained: Vec<TaskId> = {
            let mut task_ids = self
                .task_ids
                .lock()
                .map_err(|_| UpbeatError::internal("poisoned lock: monitor.stop"))?;
            std::mem::take(&mut *task_ids)
        };
        if let Some(scheduler) = &self.scheduler {
            for task_id in drained {
                scheduler.remove(task_id)?;
            }
        }
        if let Some(client) = &self.client {
            client.close()?;
        }
        if was_started {
            info!(id = %self.id, "monitor stopped");
        }
        Ok(())
    }

    /// Runs every job once, immediately, publishing the results.
    ///
    /// Works whether or not the monitor is started or enabled; returns the
    /// number of events published.
    ///
    /// # Errors
    ///
    /// Propagates job and publish failures.
    pub fn run_once(&self) -> UpbeatResult<usize> {
        let mut published = 0;
        for job in &self.jobs {
            for event in job.run()? {
                if let Some(client) = &self.client {
                    client.publish(event)?;
                }
                published += 1;
            }
        }
        Ok(published)
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("monitor_type", &self.monitor_type)
            .field("enabled", &self.enabled)
            .field("schedule", &self.schedule)
            .field("endpoints", &self.endpoints)
            .field("jobs", &self.jobs.len())
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::event::Event;
    use crate::pipeline::{CollectorPipeline, Pipeline};

    struct StaticJob;

    impl Job for StaticJob {
        fn run(&self) -> UpbeatResult<Vec<Event>> {
            Ok(vec![Event::now()])
        }
    }

    fn config(raw: &Value) -> MonitorConfig {
        MonitorConfig::from_config(raw).unwrap()
    }

    #[test]
    fn schema_requires_type_and_schedule() {
        let err = MonitorConfig::from_config(&json!({"schedule": "@every 10s"})).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingField {
                field: "type".to_string(),
            }
        );

        let err = MonitorConfig::from_config(&json!({"type": "http"})).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingField {
                field: "schedule".to_string(),
            }
        );

        let err =
            MonitorConfig::from_config(&json!({"type": "http", "schedule": "daily"})).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { ref field, .. } if field == "schedule"));
    }

    #[test]
    fn schema_applies_defaults() {
        let parsed = config(&json!({"type": "http", "schedule": "@every 10s"}));
        assert!(parsed.enabled);
        assert!(parsed.id.is_none());
        assert!(parsed.name.is_none());
        assert!(parsed.watch.is_none());

        let parsed = config(&json!({
            "type": "http",
            "schedule": "@every 10s",
            "enabled": false,
            "id": "my-check",
            "watch": {"poll_file": "/var/run/monitors.json"},
        }));
        assert!(!parsed.enabled);
        assert_eq!(parsed.id.as_deref(), Some("my-check"));
        assert_eq!(
            parsed.watch,
            Some(WatchConfig {
                poll_file: PathBuf::from("/var/run/monitors.json"),
            })
        );
    }

    #[test]
    fn generated_ids_are_stable_per_config() {
        let raw_a = json!({"type": "http", "schedule": "@every 10s", "hosts": ["a"]});
        let raw_b = json!({"type": "http", "schedule": "@every 10s", "hosts": ["b"]});

        let id_a = config(&raw_a).resolve_id(&raw_a);
        assert_eq!(id_a, config(&raw_a).resolve_id(&raw_a));
        assert_ne!(id_a, config(&raw_b).resolve_id(&raw_b));
        assert!(id_a.starts_with("auto-http-"));

        let raw = json!({"type": "http", "schedule": "@every 10s", "id": "fixed"});
        assert_eq!(config(&raw).resolve_id(&raw), "fixed");
    }

    fn monitor(enabled: bool, scheduler: Option<Arc<Scheduler>>) -> Monitor {
        let raw = json!({"type": "http", "schedule": "@every 10s", "enabled": enabled});
        let parsed = config(&raw);
        let id = parsed.resolve_id(&raw);
        Monitor::new(
            &parsed,
            id,
            vec![Arc::new(StaticJob)],
            1,
            None,
            scheduler,
        )
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let scheduler = Arc::new(Scheduler::new());
        let monitor = monitor(true, Some(Arc::clone(&scheduler)));

        monitor.start().unwrap();
        monitor.start().unwrap();
        assert!(monitor.started());
        assert_eq!(scheduler.len().unwrap(), 1);

        monitor.stop().unwrap();
        monitor.stop().unwrap();
        assert!(!monitor.started());
        assert!(scheduler.is_empty().unwrap());
    }

    #[test]
    fn disabled_monitors_never_schedule() {
        let scheduler = Arc::new(Scheduler::new());
        let monitor = monitor(false, Some(Arc::clone(&scheduler)));

        monitor.start().unwrap();
        assert!(scheduler.is_empty().unwrap());
    }

    #[test]
    fn dropping_a_monitor_unregisters_its_tasks() {
        let scheduler = Arc::new(Scheduler::new());
        {
            let monitor = monitor(true, Some(Arc::clone(&scheduler)));
            monitor.start().unwrap();
            assert_eq!(scheduler.len().unwrap(), 1);
        }
        assert!(scheduler.is_empty().unwrap());
    }

    #[test]
    fn run_once_publishes_through_the_client() {
        let pipeline = CollectorPipeline::default();
        let client = pipeline.connect().unwrap();

        let raw = json!({"type": "http", "schedule": "@every 10s"});
        let parsed = config(&raw);
        let id = parsed.resolve_id(&raw);
        let monitor = Monitor::new(
            &parsed,
            id,
            vec![Arc::new(StaticJob)],
            1,
            Some(client),
            None,
        );

        assert_eq!(monitor.run_once().unwrap(), 1);
        assert_eq!(pipeline.drain().len(), 1);
    }

    #[test]
    fn stop_closes_the_client_of_a_never_started_monitor() {
        let pipeline = CollectorPipeline::default();
        let client = pipeline.connect().unwrap();

        let raw = json!({"type": "http", "schedule": "@every 10s"});
        let parsed = config(&raw);
        let id = parsed.resolve_id(&raw);
        let monitor = Monitor::new(
            &parsed,
            id,
            vec![Arc::new(StaticJob)],
            1,
            Some(client),
            None,
        );

        monitor.stop().unwrap();
        assert!(!monitor.started());

        let err = monitor.run_once().unwrap_err();
        assert!(err.is_pipeline());
        assert!(pipeline.drain().is_empty());
    }
}
