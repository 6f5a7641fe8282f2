//! In-memory pipeline backend.
//!
//! `CollectorPipeline` is the embedded output: published events run through
//! the client's processing settings and land in a bounded channel the
//! embedder drains. Publishing never blocks; a full buffer is reported as
//! backpressure so the caller decides what to shed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::error::{PipelineError, UpbeatResult};
use crate::event::Event;
use crate::pipeline::{Client, ClientConfig, Pipeline, Processing};

/// Settings for the in-memory collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Event buffer capacity.
    pub capacity: usize,
    /// Host identity stamped on events, unless a client disables it.
    pub host_name: Option<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            host_name: None,
        }
    }
}

/// An in-process event sink backed by a bounded channel.
pub struct CollectorPipeline {
    tx: Sender<Event>,
    rx: Receiver<Event>,
    host_name: Option<String>,
}

impl CollectorPipeline {
    /// Creates a collector with the given settings.
    #[must_use]
    pub fn new(config: CollectorConfig) -> Self {
        let (tx, rx) = bounded::<Event>(config.capacity.max(1));
        Self {
            tx,
            rx,
            host_name: config.host_name,
        }
    }

    /// A receiver handle onto the collected events.
    ///
    /// Receivers share the buffer; each event is seen by exactly one of
    /// them.
    #[must_use]
    pub fn receiver(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    /// Drains everything currently buffered.
    #[must_use]
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }
}

impl Default for CollectorPipeline {
    fn default() -> Self {
        Self::new(CollectorConfig::default())
    }
}

impl Pipeline for CollectorPipeline {
    fn connect_with(&self, config: ClientConfig) -> UpbeatResult<Arc<dyn Client>> {
        Ok(Arc::new(CollectorClient {
            processing: config.processing,
            host_name: self.host_name.clone(),
            tx: self.tx.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct CollectorClient {
    processing: Processing,
    host_name: Option<String>,
    tx: Sender<Event>,
    closed: AtomicBool,
}

impl Client for CollectorClient {
    fn publish(&self, event: Event) -> UpbeatResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PipelineError::Closed.into());
        }
        let Some(event) = self.processing.apply(event, self.host_name.as_deref())? else {
            return Ok(());
        };
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PipelineError::Backpressure.into()),
            Err(TrySendError::Disconnected(_)) => Err(PipelineError::Closed.into()),
        }
    }

    fn close(&self) -> UpbeatResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
