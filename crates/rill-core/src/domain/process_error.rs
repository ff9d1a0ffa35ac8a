//! Failure context captured when the engine halts an instance in error

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::application::runtime_interface::EngineProcessInstance;

/// Node and message the engine reported when it halted the instance
///
/// Retained after the engine handle is evicted so the failure stays
/// queryable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessErrorSnapshot {
    failed_node_id: String,
    error_message: String,
}

impl ProcessErrorSnapshot {
    /// Create a snapshot
    pub fn new(failed_node_id: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            failed_node_id: failed_node_id.into(),
            error_message: error_message.into(),
        }
    }

    /// Read the error markers of a live handle
    pub fn capture(handle: &dyn EngineProcessInstance) -> Self {
        Self {
            failed_node_id: handle.node_id_in_error().unwrap_or_default(),
            error_message: handle.error_message().unwrap_or_default(),
        }
    }

    /// Definition id of the node that failed
    pub fn failed_node_id(&self) -> &str {
        &self.failed_node_id
    }

    /// Message reported by the engine
    pub fn error_message(&self) -> &str {
        &self.error_message
    }
}

impl fmt::Display for ProcessErrorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} failed: {}", self.failed_node_id, self.error_message)
    }
}

/// How to get an instance out of the error state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Fire the failed node again along its default connection
    Retrigger,
    /// Complete the failed node without executing it
    Skip,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryAction::Retrigger => f.write_str("retrigger"),
            RecoveryAction::Skip => f.write_str("skip"),
        }
    }
}
