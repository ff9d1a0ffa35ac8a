//!
//! Rill Core - Process-instance runtime for the Rill workflow engine
//!
//! This crate owns the lifecycle of a running process instance: it binds a
//! typed business record to the generic variable store of the execution
//! engine, mediates every state-changing operation (start, signal, work-item
//! completion, recovery from errors) and defers store mutations through an
//! explicit unit of work.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - process instances, typed records, work items, errors
pub mod domain;

/// Application layer - execution-engine contract and unit of work
pub mod application;

/// Core types
pub mod types;

/// Error types
pub mod error;

/// Runtime configuration
pub mod config;

// Re-export key types
pub use config::{CommitPolicy, RuntimeConfig};
pub use error::CoreError;
pub use types::{ProcessInstanceStatus, Signal, VariableMap};

pub use application::completion::{CompletionEvent, CompletionSender};
pub use application::runtime_interface::{
    EngineProcessInstance, EngineWorkItem, NodeInstanceInfo, ProcessRuntime, ReloadSupplier,
    SharedProcessInstance, WorkItemManager,
};
pub use application::unit_of_work::{CommitReport, StoreAction, UnitOfWork, WorkUnit};

pub use domain::binder::{bind, unbind, VARIABLES_KEY};
pub use domain::model::{FieldBinding, Model};
pub use domain::process::{Process, ProcessDefinition};
pub use domain::process_error::{ProcessErrorSnapshot, RecoveryAction};
pub use domain::process_instance::ProcessInstance;
pub use domain::repository::{MutableProcessInstances, ProcessInstanceView};
pub use domain::work_item::{Identity, Policy, SecurityPolicy, Transition, WorkItem};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
