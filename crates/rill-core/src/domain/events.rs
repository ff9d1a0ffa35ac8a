use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::process_error::RecoveryAction;
use crate::ProcessInstanceStatus;

/// Domain event trait for all events recorded by a process instance
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the process instance ID this event is associated with
    fn process_instance_id(&self) -> &str;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;
}

macro_rules! domain_event {
    ($ty:ident, $name:literal) => {
        impl DomainEvent for $ty {
            fn event_type(&self) -> &'static str {
                $name
            }

            fn process_instance_id(&self) -> &str {
                &self.process_instance_id
            }

            fn timestamp(&self) -> DateTime<Utc> {
                self.timestamp
            }
        }
    };
}

/// Event: process instance created
#[derive(Debug)]
pub struct ProcessInstanceCreated {
    /// The unique identifier of the process instance
    pub process_instance_id: String,

    /// The identifier of the process definition
    pub process_id: String,

    /// The timestamp when the process instance was created
    pub timestamp: DateTime<Utc>,
}

domain_event!(ProcessInstanceCreated, "process_instance.created");

/// Event: process instance status changed
#[derive(Debug)]
pub struct ProcessInstanceStateChanged {
    /// The unique identifier of the process instance
    pub process_instance_id: String,

    /// Status before the operation
    pub from: ProcessInstanceStatus,

    /// Status after the operation
    pub to: ProcessInstanceStatus,

    /// The timestamp when the change was observed
    pub timestamp: DateTime<Utc>,
}

domain_event!(ProcessInstanceStateChanged, "process_instance.state_changed");

/// Event: the engine halted the process instance on a node failure
#[derive(Debug)]
pub struct ProcessInstanceErrored {
    /// The unique identifier of the process instance
    pub process_instance_id: String,

    /// Node that failed
    pub failed_node_id: String,

    /// Message reported by the engine
    pub error_message: String,

    /// The timestamp when the error was captured
    pub timestamp: DateTime<Utc>,
}

domain_event!(ProcessInstanceErrored, "process_instance.errored");

/// Event: an error was recovered by retrigger or skip
#[derive(Debug)]
pub struct ProcessInstanceRecovered {
    /// The unique identifier of the process instance
    pub process_instance_id: String,

    /// Node that had failed
    pub failed_node_id: String,

    /// Recovery applied
    pub action: RecoveryAction,

    /// The timestamp of the recovery
    pub timestamp: DateTime<Utc>,
}

domain_event!(ProcessInstanceRecovered, "process_instance.recovered");

/// Event: variables written onto the engine store
#[derive(Debug)]
pub struct VariablesUpdated {
    /// The unique identifier of the process instance
    pub process_instance_id: String,

    /// Names of the written variables
    pub names: Vec<String>,

    /// The timestamp of the update
    pub timestamp: DateTime<Utc>,
}

domain_event!(VariablesUpdated, "process_instance.variables_updated");

/// Event: a work item was completed, aborted or transitioned
#[derive(Debug)]
pub struct WorkItemTransitioned {
    /// The unique identifier of the process instance
    pub process_instance_id: String,

    /// Work item acted upon
    pub work_item_id: String,

    /// Phase the work item moved to
    pub phase: String,

    /// The timestamp of the transition
    pub timestamp: DateTime<Utc>,
}

domain_event!(WorkItemTransitioned, "work_item.transitioned");
