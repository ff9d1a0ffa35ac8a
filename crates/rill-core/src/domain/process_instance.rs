//! Process instance state machine
//!
//! A [`ProcessInstance`] owns the identity, status and typed variables of one
//! execution of a process. Every state-changing operation delegates to the
//! engine, re-reads the engine state and variables, and queues exactly the
//! store mutation the resulting status calls for on the caller's
//! [`UnitOfWork`].

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::binder::{bind, unbind};
use super::events::{
    DomainEvent, ProcessInstanceCreated, ProcessInstanceErrored, ProcessInstanceRecovered,
    ProcessInstanceStateChanged, VariablesUpdated, WorkItemTransitioned,
};
use super::model::Model;
use super::process::Process;
use super::process_error::{ProcessErrorSnapshot, RecoveryAction};
use super::repository::ProcessInstanceView;
use super::work_item::{enforce_all, phase, Policy, Transition, WorkItem};
use crate::application::completion::CompletionListener;
use crate::application::runtime_interface::{
    EngineProcessInstance, ReloadSupplier, SharedProcessInstance, DEFAULT_CONNECTION,
};
use crate::application::unit_of_work::{UnitOfWork, WorkUnit};
use crate::{CoreError, ProcessInstanceStatus, Signal, VariableMap};

/// Engine handle slot: either live, or evicted with a way to reload it
#[derive(Clone)]
enum Handle {
    Attached(SharedProcessInstance),
    Detached(ReloadSupplier),
}

/// One execution of a process with variables of type `T`
pub struct ProcessInstance<T: Model> {
    id: String,
    status: ProcessInstanceStatus,
    variables: T,
    process: Process<T>,
    handle: Handle,
    error: Option<ProcessErrorSnapshot>,
    listener: CompletionListener,
    events: Vec<Box<dyn DomainEvent>>,
}

impl<T: Model> ProcessInstance<T> {
    pub(crate) fn new(process: Process<T>, variables: T) -> Result<Self, CoreError> {
        let map = bind(&variables)?;
        let handle = process
            .runtime()
            .create_process_instance(process.id(), map)?;
        let id = handle.id();

        let mut instance = Self {
            id: id.clone(),
            status: ProcessInstanceStatus::Pending,
            variables,
            listener: CompletionListener::new(&id),
            handle: Handle::Attached(handle.clone()),
            process,
            error: None,
            events: Vec::with_capacity(8),
        };
        instance.listener.register(handle.as_ref());

        instance.record_event(Box::new(ProcessInstanceCreated {
            process_instance_id: id.clone(),
            process_id: instance.process.id().to_string(),
            timestamp: Utc::now(),
        }));

        info!(
            process_instance_id = %id,
            process_id = %instance.process.id(),
            "Created process instance"
        );
        Ok(instance)
    }

    pub(crate) fn restore(
        process: Process<T>,
        view: &ProcessInstanceView,
        reload: ReloadSupplier,
    ) -> Result<Self, CoreError> {
        let variables: T = serde_json::from_value(view.variables.clone()).map_err(|e| {
            CoreError::BindingFault(format!(
                "cannot restore variables of process instance {}: {}",
                view.id, e
            ))
        })?;
        let error = match view.status {
            ProcessInstanceStatus::Error => view.error.clone(),
            _ => None,
        };

        debug!(
            process_instance_id = %view.id,
            status = %view.status,
            "Restored process instance from snapshot"
        );
        Ok(Self {
            id: view.id.clone(),
            status: view.status,
            variables,
            listener: CompletionListener::new(&view.id),
            handle: Handle::Detached(reload),
            process,
            error,
            events: Vec::new(),
        })
    }

    /// Instance id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current status
    pub fn status(&self) -> ProcessInstanceStatus {
        self.status
    }

    /// The typed variables, as of the last operation
    pub fn variables(&self) -> &T {
        &self.variables
    }

    /// The owning process
    pub fn process(&self) -> &Process<T> {
        &self.process
    }

    /// The engine handle, when attached
    pub fn handle(&self) -> Option<&SharedProcessInstance> {
        match &self.handle {
            Handle::Attached(handle) => Some(handle),
            Handle::Detached(_) => None,
        }
    }

    /// Whether the engine handle is in memory
    pub fn is_attached(&self) -> bool {
        matches!(self.handle, Handle::Attached(_))
    }

    /// Cached error snapshot, without touching the engine
    pub fn cached_error(&self) -> Option<&ProcessErrorSnapshot> {
        self.error.as_ref()
    }

    /// Domain events recorded so far
    pub fn events(&self) -> &[Box<dyn DomainEvent>] {
        &self.events
    }

    /// Drain the recorded domain events
    pub fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }

    /// Snapshot of the instance as written to the store
    pub fn view(&self) -> Result<ProcessInstanceView, CoreError> {
        let variables = serde_json::to_value(&self.variables).map_err(|e| {
            CoreError::BindingFault(format!("cannot serialize record: {}", e))
        })?;
        Ok(ProcessInstanceView {
            id: self.id.clone(),
            process_id: self.process.id().to_string(),
            status: self.status,
            variables,
            error: self.error.clone(),
            updated_at: Utc::now(),
        })
    }

    /// Begin execution
    ///
    /// Only valid while PENDING. The engine may run the instance straight to
    /// completion or error, so the final status is whatever the engine reports.
    pub fn start(&mut self, uow: &mut UnitOfWork) -> Result<(), CoreError> {
        if self.status != ProcessInstanceStatus::Pending {
            warn!(
                process_instance_id = %self.id,
                status = %self.status,
                "Refusing to start process instance"
            );
            return Err(CoreError::InvalidState(format!(
                "Process instance {} was already started (status {})",
                self.id, self.status
            )));
        }

        let from = self.status;
        let handle = self.materialize()?;
        self.status = ProcessInstanceStatus::Active;
        self.listener.register(handle.as_ref());

        let started = match self.process.runtime().start_process_instance(&self.id) {
            Ok(started) => started,
            Err(e) => {
                self.status = handle.state();
                error!(
                    process_instance_id = %self.id,
                    status = %self.status,
                    error = %e,
                    "Engine failed to start process instance"
                );
                return Err(e);
            }
        };

        let mut variables = started.variables();
        unbind(&mut self.variables, &mut variables)?;
        info!(process_instance_id = %self.id, "Started process instance");

        self.finish(uow, from)
    }

    /// Abort the instance; always queues a removal
    pub fn abort(&mut self, uow: &mut UnitOfWork) -> Result<(), CoreError> {
        let from = self.status;
        let handle = self.materialize()?;
        let mut variables = handle.variables();
        unbind(&mut self.variables, &mut variables)?;

        self.process.runtime().abort_process_instance(&handle.id())?;

        self.listener.unregister(handle.as_ref());
        self.listener.drain();
        self.status = handle.state();
        self.refresh_error(handle.as_ref());
        self.record_transition(from);

        info!(process_instance_id = %self.id, status = %self.status, "Aborted process instance");
        uow.intercept(WorkUnit::remove(
            self.id.clone(),
            self.process.instances().clone(),
        ));
        Ok(())
    }

    /// Deliver a signal to the instance
    pub fn send(&mut self, signal: Signal, uow: &mut UnitOfWork) -> Result<(), CoreError> {
        let from = self.status;
        let handle = self.materialize()?;
        debug!(
            process_instance_id = %self.id,
            channel = %signal.channel,
            "Sending signal"
        );
        handle.signal_event(&signal.channel, signal.payload)?;
        self.finish(uow, from)
    }

    /// Write every field of `updates` onto the engine variable store
    ///
    /// Does not change the status.
    pub fn update_variables(&mut self, updates: &T, uow: &mut UnitOfWork) -> Result<(), CoreError> {
        let handle = self.materialize()?;
        let map = bind(updates)?;
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();

        for (name, value) in map {
            handle.set_variable(&name, value);
        }

        let mut variables = handle.variables();
        unbind(&mut self.variables, &mut variables)?;

        debug!(process_instance_id = %self.id, variables = ?names, "Updated variables");
        self.record_event(Box::new(VariablesUpdated {
            process_instance_id: self.id.clone(),
            names,
            timestamp: Utc::now(),
        }));
        uow.intercept(WorkUnit::update(self.view()?, self.process.instances().clone()));
        Ok(())
    }

    /// Complete a work item with `results`
    pub fn complete_work_item(
        &mut self,
        work_item_id: &str,
        results: VariableMap,
        policies: &[Arc<dyn Policy>],
        uow: &mut UnitOfWork,
    ) -> Result<(), CoreError> {
        let from = self.status;
        self.process
            .runtime()
            .work_item_manager()
            .complete_work_item(work_item_id, results, policies)?;
        self.record_work_item(work_item_id, phase::COMPLETE);
        self.finish(uow, from)
    }

    /// Abort a work item
    pub fn abort_work_item(
        &mut self,
        work_item_id: &str,
        policies: &[Arc<dyn Policy>],
        uow: &mut UnitOfWork,
    ) -> Result<(), CoreError> {
        let from = self.status;
        self.process
            .runtime()
            .work_item_manager()
            .abort_work_item(work_item_id, policies)?;
        self.record_work_item(work_item_id, phase::ABORT);
        self.finish(uow, from)
    }

    /// Move a work item through its lifecycle
    pub fn transition_work_item(
        &mut self,
        work_item_id: &str,
        transition: Transition,
        uow: &mut UnitOfWork,
    ) -> Result<(), CoreError> {
        let from = self.status;
        self.process
            .runtime()
            .work_item_manager()
            .transition_work_item(work_item_id, &transition)?;
        self.record_work_item(work_item_id, &transition.phase);
        self.finish(uow, from)
    }

    /// A single work item visible under `policies`
    pub fn work_item(
        &mut self,
        work_item_id: &str,
        policies: &[Arc<dyn Policy>],
    ) -> Result<WorkItem, CoreError> {
        let handle = self.materialize()?;
        let task_name_parameter = &self.process.config().task_name_parameter;

        handle
            .work_items()
            .iter()
            .find(|item| item.id == work_item_id && enforce_all(policies, item))
            .map(|item| WorkItem::from_engine(item, task_name_parameter))
            .ok_or_else(|| CoreError::WorkItemNotFound {
                work_item_id: work_item_id.to_string(),
                process_instance_id: self.id.clone(),
            })
    }

    /// All work items visible under `policies`
    pub fn work_items(&mut self, policies: &[Arc<dyn Policy>]) -> Result<Vec<WorkItem>, CoreError> {
        let handle = self.materialize()?;
        let task_name_parameter = &self.process.config().task_name_parameter;

        Ok(handle
            .work_items()
            .iter()
            .filter(|item| enforce_all(policies, item))
            .map(|item| WorkItem::from_engine(item, task_name_parameter))
            .collect())
    }

    /// The error snapshot while the instance is in ERROR
    ///
    /// Built from the engine handle (reloading it if needed) the first time it
    /// is asked for, cached afterwards.
    pub fn error(&mut self) -> Result<Option<ProcessErrorSnapshot>, CoreError> {
        if self.status != ProcessInstanceStatus::Error {
            return Ok(None);
        }
        if let Some(snapshot) = &self.error {
            return Ok(Some(snapshot.clone()));
        }

        let handle = self.materialize()?;
        let snapshot = ProcessErrorSnapshot::capture(handle.as_ref());
        self.error = Some(snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Fire the failed node again
    pub fn retrigger(&mut self, uow: &mut UnitOfWork) -> Result<(), CoreError> {
        self.recover(RecoveryAction::Retrigger, uow)
    }

    /// Complete the failed node without executing it
    pub fn skip(&mut self, uow: &mut UnitOfWork) -> Result<(), CoreError> {
        self.recover(RecoveryAction::Skip, uow)
    }

    /// Apply a recovery action to the failed node
    pub fn recover(&mut self, action: RecoveryAction, uow: &mut UnitOfWork) -> Result<(), CoreError> {
        let from = self.status;
        let failed_node_id = match self.error()? {
            Some(snapshot) if !snapshot.failed_node_id().is_empty() => {
                snapshot.failed_node_id().to_string()
            }
            _ => {
                return Err(CoreError::InvalidState(format!(
                    "Process instance {} has no failed node to {}",
                    self.id, action
                )))
            }
        };

        let handle = self.materialize()?;
        let node = handle
            .node_instance_by_node_id(&failed_node_id)
            .ok_or_else(|| CoreError::NodeInstanceNotFound {
                node_id: failed_node_id.clone(),
                process_instance_id: self.id.clone(),
            })?;

        handle.set_state(ProcessInstanceStatus::Active);
        handle.clear_error();
        self.status = ProcessInstanceStatus::Active;
        self.error = None;

        info!(
            process_instance_id = %self.id,
            node_id = %failed_node_id,
            %action,
            "Recovering process instance"
        );
        let triggered = match action {
            RecoveryAction::Retrigger => handle.trigger_node(&node.id, DEFAULT_CONNECTION),
            RecoveryAction::Skip => handle.trigger_completed(&node.id, DEFAULT_CONNECTION, true),
        };
        if let Err(e) = triggered {
            self.status = handle.state();
            self.refresh_error(handle.as_ref());
            error!(
                process_instance_id = %self.id,
                status = %self.status,
                error = %e,
                "Engine failed to recover process instance"
            );
            return Err(e);
        }

        self.record_event(Box::new(ProcessInstanceRecovered {
            process_instance_id: self.id.clone(),
            failed_node_id,
            action,
            timestamp: Utc::now(),
        }));
        self.finish(uow, from)
    }

    /// Dispatch completion events the engine posted for this instance
    ///
    /// Returns the number of events handled; finish bookkeeping runs once when
    /// there is at least one.
    pub fn process_completions(&mut self, uow: &mut UnitOfWork) -> Result<usize, CoreError> {
        let pending = self.listener.drain();
        if pending == 0 {
            return Ok(0);
        }

        debug!(
            process_instance_id = %self.id,
            event_type = %self.listener.event_type(),
            pending,
            "Dispatching completion events"
        );
        let from = self.status;
        self.finish(uow, from)?;
        Ok(pending)
    }

    /// Install an engine handle loaded by the persistence layer
    ///
    /// Refused once the instance has a handle and has left PENDING.
    pub fn attach(&mut self, handle: SharedProcessInstance) -> Result<(), CoreError> {
        if self.is_attached() && self.status != ProcessInstanceStatus::Pending {
            return Err(CoreError::InvalidState(format!(
                "Impossible to override process instance {} that already exists",
                self.id
            )));
        }

        self.status = handle.state();
        self.id = handle.id();
        handle.reconnect();

        if self.listener.process_instance_id() != self.id {
            self.listener = CompletionListener::new(&self.id);
        }
        self.listener.register(handle.as_ref());

        let mut variables = handle.variables();
        unbind(&mut self.variables, &mut variables)?;

        self.error = None;
        self.refresh_error(handle.as_ref());
        self.handle = Handle::Attached(handle);

        debug!(process_instance_id = %self.id, status = %self.status, "Attached engine handle");
        Ok(())
    }

    /// Evict the engine handle, keeping `reload` to materialize it again
    ///
    /// The error snapshot is captured first so it survives the eviction.
    pub fn detach(&mut self, reload: ReloadSupplier) {
        if let Handle::Attached(handle) = self.handle.clone() {
            self.status = handle.state();
            self.refresh_error(handle.as_ref());
        }
        self.handle = Handle::Detached(reload);
        debug!(
            process_instance_id = %self.id,
            status = %self.status,
            listening = self.listener.is_registered(),
            "Detached engine handle"
        );
    }

    fn materialize(&mut self) -> Result<SharedProcessInstance, CoreError> {
        let reload = match &self.handle {
            Handle::Attached(handle) => return Ok(handle.clone()),
            Handle::Detached(reload) => reload.clone(),
        };

        let handle = reload().ok_or_else(|| {
            warn!(process_instance_id = %self.id, "Engine no longer knows process instance");
            CoreError::ProcessInstanceNotFound(self.id.clone())
        })?;
        // Finished instances already dropped their listener
        if self.status.is_in_flight() {
            self.listener.register(handle.as_ref());
        }
        self.handle = Handle::Attached(handle.clone());

        debug!(process_instance_id = %self.id, "Reloaded engine handle");
        Ok(handle)
    }

    /// Shared tail of the mutating operations: re-derive the status, keep the
    /// record in sync with the engine, and queue an update while the instance
    /// is in flight or a removal once it is not.
    fn finish(&mut self, uow: &mut UnitOfWork, from: ProcessInstanceStatus) -> Result<(), CoreError> {
        let handle = self.materialize()?;
        // Whatever the engine posted during this call is observed below.
        self.listener.drain();

        let state = handle.state();
        let in_flight = state.is_in_flight();
        if !in_flight {
            self.listener.unregister(handle.as_ref());
            self.id = handle.id();
        }
        self.status = state;
        self.refresh_error(handle.as_ref());

        let mut variables = handle.variables();
        unbind(&mut self.variables, &mut variables)?;
        self.record_transition(from);

        let store = self.process.instances().clone();
        if in_flight {
            uow.intercept(WorkUnit::update(self.view()?, store));
        } else {
            uow.intercept(WorkUnit::remove(self.id.clone(), store));
        }

        debug!(
            process_instance_id = %self.id,
            status = %self.status,
            in_flight,
            "Finished operation"
        );
        Ok(())
    }

    /// Keep the snapshot present exactly while the status is ERROR
    fn refresh_error(&mut self, handle: &dyn EngineProcessInstance) {
        if self.status != ProcessInstanceStatus::Error {
            self.error = None;
            return;
        }
        if self.error.is_some() {
            return;
        }

        let snapshot = ProcessErrorSnapshot::capture(handle);
        warn!(
            process_instance_id = %self.id,
            node_id = %snapshot.failed_node_id(),
            message = %snapshot.error_message(),
            "Process instance halted in error"
        );
        self.record_event(Box::new(ProcessInstanceErrored {
            process_instance_id: self.id.clone(),
            failed_node_id: snapshot.failed_node_id().to_string(),
            error_message: snapshot.error_message().to_string(),
            timestamp: Utc::now(),
        }));
        self.error = Some(snapshot);
    }

    fn record_transition(&mut self, from: ProcessInstanceStatus) {
        if from != self.status {
            self.record_event(Box::new(ProcessInstanceStateChanged {
                process_instance_id: self.id.clone(),
                from,
                to: self.status,
                timestamp: Utc::now(),
            }));
        }
    }

    fn record_work_item(&mut self, work_item_id: &str, phase: &str) {
        debug!(
            process_instance_id = %self.id,
            work_item_id,
            phase,
            "Work item transitioned"
        );
        self.record_event(Box::new(WorkItemTransitioned {
            process_instance_id: self.id.clone(),
            work_item_id: work_item_id.to_string(),
            phase: phase.to_string(),
            timestamp: Utc::now(),
        }));
    }

    #[inline]
    fn record_event(&mut self, event: Box<dyn DomainEvent>) {
        self.events.push(event);
    }
}

impl<T: Model> PartialEq for ProcessInstance<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.status == other.status
    }
}

impl<T: Model> Eq for ProcessInstance<T> {}

impl<T: Model + fmt::Debug> fmt::Debug for ProcessInstance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessInstance")
            .field("id", &self.id)
            .field("process_id", &self.process.id())
            .field("status", &self.status)
            .field("variables", &self.variables)
            .field("attached", &self.is_attached())
            .field("error", &self.error)
            .finish()
    }
}
