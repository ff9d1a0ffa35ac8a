//! Execution-engine contract
//!
//! The runtime never fires nodes itself. Everything that executes a process
//! graph is reached through the traits in this module, implemented by the
//! engine the runtime is embedded in.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::completion::CompletionSender;
use crate::domain::work_item::{Policy, Transition};
use crate::{CoreError, ProcessInstanceStatus, VariableMap};

/// Connection type used when re-firing or completing a node
pub const DEFAULT_CONNECTION: &str = "default";

/// Shared handle to an engine-side process instance
pub type SharedProcessInstance = Arc<dyn EngineProcessInstance>;

/// Produces a fresh engine handle for an evicted instance, `None` when the
/// engine no longer knows it
pub type ReloadSupplier = Arc<dyn Fn() -> Option<SharedProcessInstance> + Send + Sync>;

/// A live node instance inside an engine process instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInstanceInfo {
    /// Node instance id
    pub id: String,
    /// Definition id of the node
    pub node_id: String,
    /// Node name
    pub node_name: String,
}

/// A work item as the engine sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineWorkItem {
    /// Work item id
    pub id: String,
    /// Definition id of the owning node
    pub node_id: String,
    /// Name of the owning node
    pub node_name: String,
    /// State code
    pub state: i32,
    /// Current lifecycle phase
    pub phase_id: Option<String>,
    /// Status within the phase
    pub phase_status: Option<String>,
    /// Input parameters
    pub parameters: VariableMap,
    /// Results
    pub results: VariableMap,
}

/// Engine-side process instance
///
/// Handles are shared and use interior mutability; every method takes `&self`.
pub trait EngineProcessInstance: Send + Sync {
    /// Instance id
    fn id(&self) -> String;

    /// Id of the process definition
    fn process_id(&self) -> String;

    /// Current state
    fn state(&self) -> ProcessInstanceStatus;

    /// Force the state
    fn set_state(&self, state: ProcessInstanceStatus);

    /// Copy of the variable store
    fn variables(&self) -> VariableMap;

    /// Write one variable
    fn set_variable(&self, name: &str, value: serde_json::Value);

    /// Deliver a signal
    fn signal_event(&self, channel: &str, payload: serde_json::Value) -> Result<(), CoreError>;

    /// Live node instances
    fn node_instances(&self) -> Vec<NodeInstanceInfo>;

    /// Live node instance for a node definition id
    fn node_instance_by_node_id(&self, node_id: &str) -> Option<NodeInstanceInfo> {
        self.node_instances()
            .into_iter()
            .find(|node| node.node_id == node_id)
    }

    /// Work items owned by live work-item nodes
    fn work_items(&self) -> Vec<EngineWorkItem>;

    /// Message of the current error, if any
    fn error_message(&self) -> Option<String>;

    /// Node definition id of the current error, if any
    fn node_id_in_error(&self) -> Option<String>;

    /// Clear the error markers
    fn clear_error(&self);

    /// Fire a node instance again along `connection`
    fn trigger_node(&self, node_instance_id: &str, connection: &str) -> Result<(), CoreError>;

    /// Complete a node instance along `connection` without executing it
    fn trigger_completed(
        &self,
        node_instance_id: &str,
        connection: &str,
        remove: bool,
    ) -> Result<(), CoreError>;

    /// Restore engine internals after unmarshalling
    fn reconnect(&self) {}

    /// Register a completion listener under `event_type`
    fn add_event_listener(&self, event_type: &str, sender: CompletionSender);

    /// Remove the listener registered under `event_type`
    fn remove_event_listener(&self, event_type: &str);
}

/// Work item operations of the engine
pub trait WorkItemManager: Send + Sync {
    /// Complete a work item with `results`
    fn complete_work_item(
        &self,
        work_item_id: &str,
        results: VariableMap,
        policies: &[Arc<dyn Policy>],
    ) -> Result<(), CoreError>;

    /// Abort a work item
    fn abort_work_item(
        &self,
        work_item_id: &str,
        policies: &[Arc<dyn Policy>],
    ) -> Result<(), CoreError>;

    /// Move a work item through its lifecycle
    fn transition_work_item(
        &self,
        work_item_id: &str,
        transition: &Transition,
    ) -> Result<(), CoreError>;
}

/// The execution engine
pub trait ProcessRuntime: Send + Sync {
    /// Instantiate a compiled definition with the given variables
    fn create_process_instance(
        &self,
        process_id: &str,
        variables: VariableMap,
    ) -> Result<SharedProcessInstance, CoreError>;

    /// Begin execution of a created instance
    fn start_process_instance(&self, id: &str) -> Result<SharedProcessInstance, CoreError>;

    /// Abort an instance
    fn abort_process_instance(&self, id: &str) -> Result<(), CoreError>;

    /// Work item manager
    fn work_item_manager(&self) -> &dyn WorkItemManager;
}
