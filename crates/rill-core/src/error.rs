use thiserror::Error;

/// Core error type for the Rill runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Operation precondition on the instance status was not met
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Process instance could not be materialized
    #[error("Process instance not found: {0}")]
    ProcessInstanceNotFound(String),

    /// Work item not present (or not visible) in the process instance
    #[error("Work item {work_item_id} not found in process instance {process_instance_id}")]
    WorkItemNotFound {
        /// Requested work item id
        work_item_id: String,
        /// Owning process instance id
        process_instance_id: String,
    },

    /// No live node instance for the given node definition id
    #[error("Node instance for node {node_id} not found in process instance {process_instance_id}")]
    NodeInstanceNotFound {
        /// Node definition id
        node_id: String,
        /// Owning process instance id
        process_instance_id: String,
    },

    /// A work item policy rejected the action
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Field access on a typed record is structurally impossible
    #[error("Binding fault: {0}")]
    BindingFault(String),

    /// The execution engine rejected the process definition
    #[error("Process definition error: {0}")]
    ProcessDefinitionError(String),

    /// Execution engine failure
    #[error("Engine error: {0}")]
    EngineError(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Whether the error is one of the not-found kinds
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::ProcessInstanceNotFound(_)
                | CoreError::WorkItemNotFound { .. }
                | CoreError::NodeInstanceNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::ConfigurationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}
