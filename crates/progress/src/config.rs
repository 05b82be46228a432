//! Aggregate configuration.

use serde::{Deserialize, Serialize};

/// Configuration shared by the aggregate combinators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Name recorded on the driver task's tracing span
    #[serde(default)]
    pub label: Option<String>,

    /// Keep driving the remaining constituents of a parallel aggregate
    /// after it has rejected (their outcomes are discarded)
    #[serde(default = "default_drain_after_failure")]
    pub drain_after_failure: bool,
}

fn default_drain_after_failure() -> bool {
    true
}

impl AggregateConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self {
            label: None,
            drain_after_failure: default_drain_after_failure(),
        }
    }

    /// Set the span label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set whether constituents keep running after a rejection.
    pub fn drain_after_failure(mut self, drain: bool) -> Self {
        self.drain_after_failure = drain;
        self
    }

    pub(crate) fn span_label(&self) -> &str {
        self.label.as_deref().unwrap_or("unnamed")
    }
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self::new()
    }
}
