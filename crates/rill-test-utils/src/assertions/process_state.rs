//! Assertion utilities for validating process instance states.

use rill_core::{Model, ProcessInstance, ProcessInstanceStatus, StoreAction, UnitOfWork};
use thiserror::Error;

/// Error type for process state validation failures
#[derive(Debug, Error)]
pub enum ProcessStateValidationError {
    #[error("Invalid process instance status: expected {expected}, got {actual}")]
    InvalidStatus {
        expected: ProcessInstanceStatus,
        actual: ProcessInstanceStatus,
    },

    #[error("Error snapshot mismatch: expected {expected}, got {actual}")]
    ErrorSnapshotMismatch { expected: String, actual: String },

    #[error("Expected {expected} store action(s) for {process_instance_id}, got {actual}")]
    ActionCount {
        process_instance_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Expected {expected} for {process_instance_id}, got {actual}")]
    ActionKind {
        process_instance_id: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Kind of store action expected on a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedAction {
    Update,
    Remove,
}

impl ExpectedAction {
    fn name(self) -> &'static str {
        match self {
            ExpectedAction::Update => "update",
            ExpectedAction::Remove => "remove",
        }
    }

    fn matches(self, action: &StoreAction) -> bool {
        match self {
            ExpectedAction::Update => action.is_update(),
            ExpectedAction::Remove => action.is_remove(),
        }
    }
}

fn action_name(action: &StoreAction) -> &'static str {
    if action.is_update() {
        "update"
    } else {
        "remove"
    }
}

/// Asserts that a process instance has the expected status.
pub fn assert_status<T: Model>(
    instance: &ProcessInstance<T>,
    expected: ProcessInstanceStatus,
) -> Result<(), ProcessStateValidationError> {
    if instance.status() != expected {
        return Err(ProcessStateValidationError::InvalidStatus {
            expected,
            actual: instance.status(),
        });
    }
    Ok(())
}

/// Asserts that the instance is in ERROR with a snapshot naming `node_id`.
pub fn assert_errored_at<T: Model>(
    instance: &ProcessInstance<T>,
    node_id: &str,
) -> Result<(), ProcessStateValidationError> {
    assert_status(instance, ProcessInstanceStatus::Error)?;

    let actual = instance
        .cached_error()
        .map(|snapshot| snapshot.failed_node_id().to_string())
        .unwrap_or_else(|| "no snapshot".to_string());
    if actual != node_id {
        return Err(ProcessStateValidationError::ErrorSnapshotMismatch {
            expected: node_id.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Asserts that exactly one store action of the expected kind is queued for
/// `process_instance_id`.
pub fn assert_single_action(
    uow: &UnitOfWork,
    process_instance_id: &str,
    expected: ExpectedAction,
) -> Result<(), ProcessStateValidationError> {
    let actions = uow.actions_for(process_instance_id);
    if actions.len() != 1 {
        return Err(ProcessStateValidationError::ActionCount {
            process_instance_id: process_instance_id.to_string(),
            expected: 1,
            actual: actions.len(),
        });
    }

    if !expected.matches(actions[0]) {
        return Err(ProcessStateValidationError::ActionKind {
            process_instance_id: process_instance_id.to_string(),
            expected: expected.name(),
            actual: action_name(actions[0]),
        });
    }
    Ok(())
}

/// Asserts that nothing is queued for `process_instance_id`.
pub fn assert_no_actions(
    uow: &UnitOfWork,
    process_instance_id: &str,
) -> Result<(), ProcessStateValidationError> {
    let actual = uow.actions_for(process_instance_id).len();
    if actual != 0 {
        return Err(ProcessStateValidationError::ActionCount {
            process_instance_id: process_instance_id.to_string(),
            expected: 0,
            actual,
        });
    }
    Ok(())
}
