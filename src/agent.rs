//! Identity of the running agent.

use crate::event::Fields;

/// Name and version of the agent process, shared by every monitor.
///
/// These values are the static substitutions available to index-name
/// templates: `%{[agent.name]}` and `%{[agent.version]}`, plus the legacy
/// `beat.*` and `observer.*` aliases kept for configurations written against
/// older agents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInfo {
    name: String,
    version: String,
}

impl AgentInfo {
    /// Creates an identity from a name and version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// The agent name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The agent version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Static fields available to every index-name template compiled for
    /// this agent.
    #[must_use]
    pub fn static_fields(&self) -> Fields {
        let mut fields = Fields::new();
        for alias in ["agent", "beat", "observer"] {
            fields.put(&format!("{alias}.name"), self.name.as_str());
            fields.put(&format!("{alias}.version"), self.version.as_str());
        }
        fields
    }
}

impl Default for AgentInfo {
    fn default() -> Self {
        Self::new("upbeat", env!("CARGO_PKG_VERSION"))
    }
}
