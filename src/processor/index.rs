//! Index-routing processor.

use crate::error::UpbeatResult;
use crate::event::Event;
use crate::processor::Processor;
use crate::template::IndexTemplate;

/// Metadata key the output stage reads the destination index from.
pub const RAW_INDEX: &str = "raw_index";

/// Stamps each event's metadata with its destination index name.
///
/// The name comes from a compiled [`IndexTemplate`] rendered against the
/// event's own timestamp, so events that straddle a date boundary route to
/// different indices. Event fields are left untouched; only metadata changes.
#[derive(Debug, Clone)]
pub struct AddFormattedIndex {
    template: IndexTemplate,
}

impl AddFormattedIndex {
    /// Creates the processor from a compiled template.
    #[must_use]
    pub fn new(template: IndexTemplate) -> Self {
        Self { template }
    }

    /// The template this processor renders.
    #[must_use]
    pub fn template(&self) -> &IndexTemplate {
        &self.template
    }
}

impl Processor for AddFormattedIndex {
    fn name(&self) -> &str {
        "add_formatted_index"
    }

    fn run(&self, mut event: Event) -> UpbeatResult<Option<Event>> {
        let index = self.template.format(event.timestamp);
        event.meta.put(RAW_INDEX, index);
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};

    use crate::agent::AgentInfo;

    fn processor(template: &str) -> AddFormattedIndex {
        let fields = AgentInfo::new("upbeat", "9.1.0").static_fields();
        AddFormattedIndex::new(IndexTemplate::compile(template, &fields).unwrap())
    }

    #[test]
    fn stamps_the_rendered_index_into_meta() {
        let mut event = Event::now();
        event.put("monitor.id", "my-check");

        let out = processor("http-uptime-check-prod")
            .run(event)
            .unwrap()
            .unwrap();

        assert_eq!(out.meta.get_str(RAW_INDEX), Some("http-uptime-check-prod"));
        assert_eq!(out.get("monitor.id").and_then(|v| v.as_str()), Some("my-check"));
    }

    #[test]
    fn date_templates_follow_the_event_timestamp() {
        let processor = processor("checks-%{+yyyy.MM.dd}");

        let first = Event::new(Utc.with_ymd_and_hms(2025, 1, 31, 23, 59, 0).unwrap());
        let second = Event::new(Utc.with_ymd_and_hms(2025, 2, 1, 0, 1, 0).unwrap());

        let first = processor.run(first).unwrap().unwrap();
        let second = processor.run(second).unwrap().unwrap();

        assert_eq!(first.meta.get_str(RAW_INDEX), Some("checks-2025.01.31"));
        assert_eq!(second.meta.get_str(RAW_INDEX), Some("checks-2025.02.01"));
    }
}
