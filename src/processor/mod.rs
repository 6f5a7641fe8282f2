//! Event processors and processor chains.
//!
//! A processor takes an event and returns it transformed, or drops it by
//! returning `None`. Monitors never see processors individually: the factory
//! assembles them into a [`ProcessorList`] whose order is fixed by
//! [`ChainBuilder`], so index routing always runs before client-supplied
//! processing, which runs before monitor-level user processors.

/// Field and tag manipulation processors.
pub mod actions;
/// Index-routing processor.
pub mod index;
/// Name-to-constructor registry for configured processors.
pub mod registry;

pub use index::{AddFormattedIndex, RAW_INDEX};
pub use registry::ProcessorRegistry;

use std::fmt;
use std::sync::Arc;

use crate::error::UpbeatResult;
use crate::event::Event;

/// A single event transformation step.
///
/// Implementations must be pure with respect to shared state: `run` consumes
/// the event and may be called from any number of monitors concurrently.
pub trait Processor: Send + Sync {
    /// Stable name used in logs and error messages.
    fn name(&self) -> &str;

    /// Transforms the event, or returns `Ok(None)` to drop it.
    ///
    /// # Errors
    ///
    /// Returns an error when the event cannot be processed; the pipeline
    /// discards the event and logs the failure.
    fn run(&self, event: Event) -> UpbeatResult<Option<Event>>;
}

/// An ordered group of processors run as one.
///
/// The list itself implements [`Processor`], so a whole chain can stand
/// wherever a single step is expected. A step returning `Ok(None)` stops the
/// chain and drops the event.
#[derive(Clone, Default)]
pub struct ProcessorList {
    processors: Vec<Arc<dyn Processor>>,
}

impl ProcessorList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a processor.
    pub fn push(&mut self, processor: Arc<dyn Processor>) {
        self.processors.push(processor);
    }

    /// Appends every processor from `other`, preserving order.
    pub fn extend(&mut self, other: ProcessorList) {
        self.processors.extend(other.processors);
    }

    /// Number of steps in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether the list has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// The names of all steps, in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Borrows the steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Arc<dyn Processor>] {
        &self.processors
    }
}

impl Processor for ProcessorList {
    fn name(&self) -> &str {
        "processors"
    }

    fn run(&self, event: Event) -> UpbeatResult<Option<Event>> {
        let mut current = event;
        for processor in &self.processors {
            match processor.run(current)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

impl fmt::Debug for ProcessorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Assembles a monitor's processor chain in its fixed order.
///
/// Steps are grouped by origin: `system` steps installed by the factory
/// (index routing), `caller` steps carried by the client configuration, and
/// `user` steps from the monitor's own configuration. `build` concatenates
/// the groups as system, then caller, then user, regardless of the order the
/// builder methods were invoked in.
#[derive(Default)]
pub struct ChainBuilder {
    system: Vec<Arc<dyn Processor>>,
    caller: Vec<Arc<dyn Processor>>,
    user: Vec<Arc<dyn Processor>>,
}

impl ChainBuilder {
    /// Creates a builder with all groups empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a factory-installed step.
    #[must_use]
    pub fn system(mut self, processor: Arc<dyn Processor>) -> Self {
        self.system.push(processor);
        self
    }

    /// Adds a step carried by the caller's client configuration.
    #[must_use]
    pub fn caller(mut self, processor: Arc<dyn Processor>) -> Self {
        self.caller.push(processor);
        self
    }

    /// Adds a monitor-configured step.
    #[must_use]
    pub fn user(mut self, processor: Arc<dyn Processor>) -> Self {
        self.user.push(processor);
        self
    }

    /// Builds the final chain in system, caller, user order.
    #[must_use]
    pub fn build(self) -> ProcessorList {
        let mut list = ProcessorList::new();
        for processor in self
            .system
            .into_iter()
            .chain(self.caller)
            .chain(self.user)
        {
            list.push(processor);
        }
        list
    }
}
