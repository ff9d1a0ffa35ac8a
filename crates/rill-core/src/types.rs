use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::CoreError;

/// Generic variable store exchanged with the execution engine
pub type VariableMap = HashMap<String, serde_json::Value>;

/// Lifecycle status of a process instance
///
/// Serialized as its integer code so persisted snapshots stay compatible with
/// engines that report raw state codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ProcessInstanceStatus {
    /// Created but not started
    #[default]
    Pending,
    /// Running
    Active,
    /// Finished normally
    Completed,
    /// Finished by an explicit abort
    Aborted,
    /// Paused by the engine
    Suspended,
    /// Halted on a node failure, recoverable
    Error,
}

impl ProcessInstanceStatus {
    /// Integer code of the status
    pub const fn code(self) -> i32 {
        match self {
            ProcessInstanceStatus::Pending => 0,
            ProcessInstanceStatus::Active => 1,
            ProcessInstanceStatus::Completed => 2,
            ProcessInstanceStatus::Aborted => 3,
            ProcessInstanceStatus::Suspended => 4,
            ProcessInstanceStatus::Error => 5,
        }
    }

    /// Whether storage should keep tracking an instance in this status
    #[inline]
    pub fn is_in_flight(self) -> bool {
        matches!(self, ProcessInstanceStatus::Active | ProcessInstanceStatus::Error)
    }

    /// Completed or aborted
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessInstanceStatus::Completed | ProcessInstanceStatus::Aborted
        )
    }
}

impl From<ProcessInstanceStatus> for i32 {
    fn from(status: ProcessInstanceStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i32> for ProcessInstanceStatus {
    type Error = CoreError;

    fn try_from(code: i32) -> Result<Self, CoreError> {
        match code {
            0 => Ok(ProcessInstanceStatus::Pending),
            1 => Ok(ProcessInstanceStatus::Active),
            2 => Ok(ProcessInstanceStatus::Completed),
            3 => Ok(ProcessInstanceStatus::Aborted),
            4 => Ok(ProcessInstanceStatus::Suspended),
            5 => Ok(ProcessInstanceStatus::Error),
            other => Err(CoreError::SerializationError(format!(
                "Unknown process instance status code: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ProcessInstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessInstanceStatus::Pending => "PENDING",
            ProcessInstanceStatus::Active => "ACTIVE",
            ProcessInstanceStatus::Completed => "COMPLETED",
            ProcessInstanceStatus::Aborted => "ABORTED",
            ProcessInstanceStatus::Suspended => "SUSPENDED",
            ProcessInstanceStatus::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// A named event delivered to a running instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Channel the engine routes the signal on
    pub channel: String,
    /// Signal payload
    pub payload: serde_json::Value,
}

impl Signal {
    /// Create a new signal
    pub fn new(channel: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }
}
