//! Monitor schedules and the task table.
//!
//! The scheduler here is a registration table, not a timer: it parses
//! `@every` schedules, holds the jobs monitors register, and can run a task
//! on demand. When executions should actually fire is the embedder's
//! business.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, UpbeatError, UpbeatResult};
use crate::event::Event;
use crate::plugin::Job;

fn lock_err(context: &'static str) -> UpbeatError {
    UpbeatError::internal(format!("poisoned lock: {context}"))
}

/// How often a monitor runs, parsed from `@every <interval>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Schedule {
    interval: Duration,
}

impl Schedule {
    /// Parses a schedule expression.
    ///
    /// The accepted form is `@every <n><unit>` with units `ms`, `s`, `m`
    /// and `h`, for example `@every 30s`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming `schedule` when the
    /// expression does not parse or the interval is zero.
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidField {
            field: "schedule".to_string(),
            reason: format!("'{expression}': {reason}"),
        };

        let rest = expression
            .strip_prefix("@every")
            .ok_or_else(|| invalid("expected '@every <interval>'"))?
            .trim();

        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| invalid("missing interval unit"))?;
        let (number, unit) = rest.split_at(digits_end);
        let number: u64 = number
            .parse()
            .map_err(|_| invalid("missing interval value"))?;

        let interval = match unit {
            "ms" => Duration::from_millis(number),
            "s" => Duration::from_secs(number),
            "m" => Duration::from_secs(number.saturating_mul(60)),
            "h" => Duration::from_secs(number.saturating_mul(3600)),
            other => return Err(invalid(&format!("unknown unit '{other}'"))),
        };
        if interval.is_zero() {
            return Err(invalid("interval must be positive"));
        }
        Ok(Self { interval })
    }

    /// The interval between executions.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.interval.as_millis();
        if ms % 1000 == 0 {
            write!(f, "@every {}s", ms / 1000)
        } else {
            write!(f, "@every {ms}ms")
        }
    }
}

/// Unique identifier for a scheduled task.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new random task id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct ScheduledTask {
    schedule: Schedule,
    job: Arc<dyn Job>,
}

/// Table of registered monitor tasks.
///
/// Shared across monitors behind an `Arc`; every method takes `&self`.
#[derive(Default)]
pub struct Scheduler {
    tasks: Mutex<BTreeMap<TaskId, ScheduledTask>>,
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a job and returns its task id.
    ///
    /// # Errors
    ///
    /// Fails only on a poisoned task table.
    pub fn add(&self, schedule: Schedule, job: Arc<dyn Job>) -> UpbeatResult<TaskId> {
        let id = TaskId::new();
        let mut tasks = self.tasks.lock().map_err(|_| lock_err("scheduler.add"))?;
        tasks.insert(id, ScheduledTask { schedule, job });
        Ok(id)
    }

    /// Unregisters a task. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Fails only on a poisoned task table.
    pub fn remove(&self, id: TaskId) -> UpbeatResult<bool> {
        let mut tasks = self.tasks.lock().map_err(|_| lock_err("scheduler.remove"))?;
        Ok(tasks.remove(&id).is_some())
    }

    /// The schedule a task was registered with, if it is still present.
    ///
    /// # Errors
    ///
    /// Fails only on a poisoned task table.
    pub fn schedule_of(&self, id: TaskId) -> UpbeatResult<Option<Schedule>> {
        let tasks = self
            .tasks
            .lock()
            .map_err(|_| lock_err("scheduler.schedule_of"))?;
        Ok(tasks.get(&id).map(|task| task.schedule))
    }

    /// Runs a registered task once, now.
    ///
    /// Returns `Ok(None)` when the task is no longer registered.
    ///
    /// # Errors
    ///
    /// Propagates the job's own failure, or a poisoned task table.
    pub fn run_task(&self, id: TaskId) -> UpbeatResult<Option<Vec<Event>>> {
        let job = {
            let tasks = self
                .tasks
                .lock()
                .map_err(|_| lock_err("scheduler.run_task"))?;
            match tasks.get(&id) {
                Some(task) => Arc::clone(&task.job),
                None => return Ok(None),
            }
        };
        job.run().map(Some)
    }

    /// Number of registered tasks.
    ///
    /// # Errors
    ///
    /// Fails only on a poisoned task table.
    pub fn len(&self) -> UpbeatResult<usize> {
        let tasks = self.tasks.lock().map_err(|_| lock_err("scheduler.len"))?;
        Ok(tasks.len())
    }

    /// Whether no tasks are registered.
    ///
    /// # Errors
    ///
    /// Fails only on a poisoned task table.
    pub fn is_empty(&self) -> UpbeatResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingJob;

    impl Job for CountingJob {
        fn run(&self) -> UpbeatResult<Vec<Event>> {
            Ok(vec![Event::now()])
        }
    }

    #[test]
    fn parses_every_expressions() {
        assert_eq!(
            Schedule::parse("@every 30s").unwrap().interval(),
            Duration::from_secs(30)
        );
        assert_eq!(
            Schedule::parse("@every 250ms").unwrap().interval(),
            Duration::from_millis(250)
        );
        assert_eq!(
            Schedule::parse("@every 5m").unwrap().interval(),
            Duration::from_secs(300)
        );
        assert_eq!(
            Schedule::parse("@every 2h").unwrap().interval(),
            Duration::from_secs(7200)
        );
    }

    #[test]
    fn rejects_malformed_expressions() {
        for expression in ["30s", "@every", "@every s", "@every 10", "@every 10d", "@every 0s"] {
            let err = Schedule::parse(expression).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidField { ref field, .. } if field == "schedule"),
                "{expression} should be rejected"
            );
        }
    }

    #[test]
    fn display_round_trips_through_parse() {
        for expression in ["@every 30s", "@every 250ms"] {
            let schedule = Schedule::parse(expression).unwrap();
            assert_eq!(schedule.to_string(), expression);
            assert_eq!(Schedule::parse(&schedule.to_string()).unwrap(), schedule);
        }
    }

    #[test]
    fn tasks_register_run_and_unregister() {
        let scheduler = Scheduler::new();
        let schedule = Schedule::parse("@every 10s").unwrap();

        let id = scheduler.add(schedule, Arc::new(CountingJob)).unwrap();
        assert_eq!(scheduler.len().unwrap(), 1);
        assert_eq!(scheduler.schedule_of(id).unwrap(), Some(schedule));

        let events = scheduler.run_task(id).unwrap().unwrap();
        assert_eq!(events.len(), 1);

        assert!(scheduler.remove(id).unwrap());
        assert!(!scheduler.remove(id).unwrap());
        assert!(scheduler.is_empty().unwrap());
        assert_eq!(scheduler.run_task(id).unwrap(), None);
    }
}
