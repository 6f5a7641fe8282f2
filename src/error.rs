//! Error types for upbeat.
//!
//! All errors are strongly typed using thiserror. Each kind carries enough
//! context (offending field name, template string) to report the failure
//! without retrying; nothing in this crate performs I/O, so no error is
//! transient.

use thiserror::Error;

/// Schema errors raised while unpacking a monitor's raw configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Field '{field}' is invalid: {reason}")]
    InvalidField {
        field: String,
        reason: String,
    },

    #[error("Could not unpack '{field}': {message}")]
    Unpack {
        field: String,
        message: String,
    },

    #[error("Unknown monitor type: {name}")]
    UnknownMonitorType {
        name: String,
    },

    #[error("Monitor plugin '{name}' is already registered")]
    DuplicatePlugin {
        name: String,
    },

    #[error("watch.poll_file is not allowed for this runner")]
    WatchesDisabled,
}

/// Compile errors for index name templates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unterminated '%{{' expression in template '{template}'")]
    UnterminatedExpression {
        template: String,
    },

    #[error("Empty expression in template '{template}'")]
    EmptyExpression {
        template: String,
    },

    #[error("Unsupported expression '%{{{expression}}}' in template '{template}'")]
    UnsupportedExpression {
        template: String,
        expression: String,
    },

    #[error("Template '{template}' references field '{field}', which is not available to index names")]
    UnresolvedField {
        template: String,
        field: String,
    },

    #[error("Invalid date pattern '{pattern}' in template '{template}': {reason}")]
    InvalidDatePattern {
        template: String,
        pattern: String,
        reason: String,
    },
}

/// Build and run errors for user-configured processor chains.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("Unknown processor type: {name}")]
    UnknownProcessor {
        name: String,
    },

    #[error("Processor spec must be a map with exactly one key, got {got}")]
    InvalidSpec {
        got: String,
    },

    #[error("Invalid configuration for processor '{name}': {message}")]
    InvalidConfig {
        name: String,
        message: String,
    },

    #[error("Processor '{name}' failed: {message}")]
    Failed {
        name: String,
        message: String,
    },
}

/// Faults surfaced by the output pipeline collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Pipeline is closed")]
    Closed,

    #[error("Pipeline buffer is full")]
    Backpressure,
}

/// Top-level error type for upbeat.
///
/// `Internal` is reserved for invariant violations: states that well-formed
/// inputs can never reach, such as an internally synthesized data-stream
/// template failing to compile. It is deliberately distinct from
/// [`TemplateError`], which covers user-supplied templates.
#[derive(Debug, Error)]
pub enum UpbeatError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Processor error: {0}")]
    Processor(#[from] ProcessorError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl UpbeatError {
    /// Creates an internal (invariant violation) error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration schema error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a template compile error.
    #[must_use]
    pub const fn is_template(&self) -> bool {
        matches!(self, Self::Template(_))
    }

    /// Returns true if this is a processor build error.
    #[must_use]
    pub const fn is_processor(&self) -> bool {
        matches!(self, Self::Processor(_))
    }

    /// Returns true if this is a pipeline fault.
    #[must_use]
    pub const fn is_pipeline(&self) -> bool {
        matches!(self, Self::Pipeline(_))
    }

    /// Returns true if this is an invariant violation.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for upbeat operations.
pub type UpbeatResult<T> = Result<T, UpbeatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_missing_field() {
        let err = ConfigError::MissingField {
            field: "schedule".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("schedule"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn test_template_error_names_template_and_field() {
        let err = TemplateError::UnresolvedField {
            template: "monitors-%{[agent.id]}".to_string(),
            field: "agent.id".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("monitors-%{[agent.id]}"));
        assert!(msg.contains("agent.id"));
    }

    #[test]
    fn test_processor_error_unknown() {
        let err = ProcessorError::UnknownProcessor {
            name: "frobnicate".to_string(),
        };
        assert!(format!("{err}").contains("frobnicate"));
    }

    #[test]
    fn test_upbeat_error_from_config() {
        let err: UpbeatError = ConfigError::WatchesDisabled.into();
        assert!(err.is_config());
        assert!(!err.is_internal());
    }

    #[test]
    fn test_upbeat_error_from_template() {
        let err: UpbeatError = TemplateError::EmptyExpression {
            template: "%{}".to_string(),
        }
        .into();
        assert!(err.is_template());
    }

    #[test]
    fn test_upbeat_error_internal_is_distinct_from_template() {
        let err = UpbeatError::internal("synthesized template failed to compile");
        assert!(err.is_internal());
        assert!(!err.is_template());
        assert!(format!("{err}").contains("synthesized template"));
    }
}
