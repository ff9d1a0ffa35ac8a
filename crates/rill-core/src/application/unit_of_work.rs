//! Unit of work
//!
//! Store mutations produced by process instance operations are not executed
//! on the spot. Each operation appends a [`WorkUnit`] to the unit of work the
//! caller passes in; the caller commits it at the end of its transaction.
//! Units are applied in enqueue order, so the last unit queued for an
//! instance decides its durable state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::repository::{MutableProcessInstances, ProcessInstanceView};
use crate::{CommitPolicy, CoreError, RuntimeConfig};

/// Store mutation for one process instance
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction {
    /// Write the snapshot
    Update(Box<ProcessInstanceView>),
    /// Delete the instance
    Remove,
}

impl StoreAction {
    /// Whether this is an update
    pub fn is_update(&self) -> bool {
        matches!(self, StoreAction::Update(_))
    }

    /// Whether this is a removal
    pub fn is_remove(&self) -> bool {
        matches!(self, StoreAction::Remove)
    }
}

/// A deferred store mutation bound to the store it applies to
#[derive(Clone)]
pub struct WorkUnit {
    process_instance_id: String,
    action: StoreAction,
    store: Arc<dyn MutableProcessInstances>,
}

impl WorkUnit {
    /// Queue an update of `view` into `store`
    pub fn update(view: ProcessInstanceView, store: Arc<dyn MutableProcessInstances>) -> Self {
        Self {
            process_instance_id: view.id.clone(),
            action: StoreAction::Update(Box::new(view)),
            store,
        }
    }

    /// Queue the removal of `process_instance_id` from `store`
    pub fn remove(
        process_instance_id: impl Into<String>,
        store: Arc<dyn MutableProcessInstances>,
    ) -> Self {
        Self {
            process_instance_id: process_instance_id.into(),
            action: StoreAction::Remove,
            store,
        }
    }

    /// Instance the unit applies to
    pub fn process_instance_id(&self) -> &str {
        &self.process_instance_id
    }

    /// The queued action
    pub fn action(&self) -> &StoreAction {
        &self.action
    }

    async fn perform(&self) -> Result<(), CoreError> {
        match &self.action {
            StoreAction::Update(view) => self.store.update(&self.process_instance_id, view).await,
            StoreAction::Remove => self.store.remove(&self.process_instance_id).await,
        }
    }
}

impl fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnit")
            .field("process_instance_id", &self.process_instance_id)
            .field("action", &self.action)
            .finish()
    }
}

/// Outcome of a commit
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    /// Unit of work that was committed
    pub unit_of_work_id: Uuid,
    /// Number of units applied successfully
    pub applied: usize,
    /// Units that failed, by process instance id
    pub failures: Vec<(String, CoreError)>,
}

impl CommitReport {
    /// Whether every unit was applied
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Batch of deferred store mutations for one logical transaction
#[derive(Debug)]
pub struct UnitOfWork {
    id: Uuid,
    policy: CommitPolicy,
    units: Vec<WorkUnit>,
}

impl UnitOfWork {
    /// Start a new unit of work
    pub fn new() -> Self {
        Self::with_policy(CommitPolicy::default())
    }

    /// Start a new unit of work using the configured commit policy
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::with_policy(config.commit_policy)
    }

    /// Start a new unit of work with an explicit commit policy
    pub fn with_policy(policy: CommitPolicy) -> Self {
        let id = Uuid::new_v4();
        debug!(unit_of_work_id = %id, ?policy, "Started unit of work");
        Self {
            id,
            policy,
            units: Vec::with_capacity(8),
        }
    }

    /// Identifier of this unit of work
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Commit policy
    pub fn policy(&self) -> CommitPolicy {
        self.policy
    }

    /// Append a work unit
    pub fn intercept(&mut self, unit: WorkUnit) {
        debug!(
            unit_of_work_id = %self.id,
            process_instance_id = %unit.process_instance_id,
            update = unit.action.is_update(),
            "Queued store action"
        );
        self.units.push(unit);
    }

    /// Queued units in enqueue order
    pub fn pending(&self) -> &[WorkUnit] {
        &self.units
    }

    /// Number of queued units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Queued actions for one instance, in enqueue order
    pub fn actions_for(&self, process_instance_id: &str) -> Vec<&StoreAction> {
        self.units
            .iter()
            .filter(|unit| unit.process_instance_id == process_instance_id)
            .map(|unit| &unit.action)
            .collect()
    }

    /// The action that decides each instance's post-commit state
    pub fn final_actions(&self) -> HashMap<&str, &StoreAction> {
        let mut last = HashMap::new();
        for unit in &self.units {
            last.insert(unit.process_instance_id.as_str(), &unit.action);
        }
        last
    }

    /// Apply every queued unit in enqueue order
    pub async fn commit(self) -> Result<CommitReport, CoreError> {
        let mut report = CommitReport {
            unit_of_work_id: self.id,
            applied: 0,
            failures: Vec::new(),
        };

        for unit in &self.units {
            match unit.perform().await {
                Ok(()) => report.applied += 1,
                Err(e) => match self.policy {
                    CommitPolicy::FailFast => {
                        error!(
                            unit_of_work_id = %self.id,
                            process_instance_id = %unit.process_instance_id,
                            error = %e,
                            "Store action failed, stopping commit"
                        );
                        return Err(CoreError::StateStoreError(format!(
                            "commit of unit of work {} failed for process instance {}: {}",
                            self.id, unit.process_instance_id, e
                        )));
                    }
                    CommitPolicy::ContinueOnError => {
                        warn!(
                            unit_of_work_id = %self.id,
                            process_instance_id = %unit.process_instance_id,
                            error = %e,
                            "Store action failed, continuing"
                        );
                        report.failures.push((unit.process_instance_id.clone(), e));
                    }
                },
            }
        }

        info!(
            unit_of_work_id = %self.id,
            applied = report.applied,
            failed = report.failures.len(),
            "Committed unit of work"
        );
        Ok(report)
    }

    /// Discard every queued unit, returning how many were dropped
    pub fn abort(self) -> usize {
        let dropped = self.units.len();
        debug!(unit_of_work_id = %self.id, dropped, "Aborted unit of work");
        dropped
    }
}

impl Default for UnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}
