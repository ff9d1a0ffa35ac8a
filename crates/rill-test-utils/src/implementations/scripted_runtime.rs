//! Scripted execution engine for testing.
//!
//! A [`ProcessScript`] is a straight line of [`Step`]s. Starting an instance
//! runs steps until one of them waits (a work item or a signal) or fails; an
//! instance that runs past its last step is COMPLETED. Work item ids are
//! handed out sequentially as `wi-1`, `wi-2`, ... and instance ids as
//! `pi-1`, `pi-2`, ... per runtime.

use parking_lot::Mutex;
use rill_core::domain::work_item::{enforce_all, phase, state};
use rill_core::{
    CompletionEvent, CompletionSender, CoreError, EngineProcessInstance, EngineWorkItem,
    NodeInstanceInfo, Policy, ProcessInstanceStatus, ProcessRuntime, ReloadSupplier,
    SharedProcessInstance, Transition, VariableMap, WorkItemManager,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// One step of a scripted process
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Create a work item and wait for it
    WorkItem {
        node_id: String,
        name: String,
        parameters: VariableMap,
    },
    /// Halt the instance in ERROR the first `times` executions
    Fail {
        node_id: String,
        message: String,
        times: usize,
    },
    /// Write a variable and move on
    SetVariable { name: String, value: Value },
    /// Wait for a signal on `channel`; the payload is stored under the
    /// channel name
    WaitSignal { node_id: String, channel: String },
    /// Park the instance in SUSPENDED
    Suspend { node_id: String },
}

impl Step {
    fn node_id(&self) -> String {
        match self {
            Step::WorkItem { node_id, .. }
            | Step::Fail { node_id, .. }
            | Step::WaitSignal { node_id, .. }
            | Step::Suspend { node_id } => node_id.clone(),
            Step::SetVariable { name, .. } => format!("set-{}", name),
        }
    }
}

/// A scripted process definition
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessScript {
    pub process_id: String,
    pub steps: Vec<Step>,
}

impl ProcessScript {
    pub fn new(process_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            steps: Vec::new(),
        }
    }

    pub fn work_item(
        mut self,
        node_id: impl Into<String>,
        name: impl Into<String>,
        parameters: VariableMap,
    ) -> Self {
        self.steps.push(Step::WorkItem {
            node_id: node_id.into(),
            name: name.into(),
            parameters,
        });
        self
    }

    pub fn fail(mut self, node_id: impl Into<String>, message: impl Into<String>, times: usize) -> Self {
        self.steps.push(Step::Fail {
            node_id: node_id.into(),
            message: message.into(),
            times,
        });
        self
    }

    pub fn set_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.steps.push(Step::SetVariable {
            name: name.into(),
            value,
        });
        self
    }

    pub fn wait_signal(mut self, node_id: impl Into<String>, channel: impl Into<String>) -> Self {
        self.steps.push(Step::WaitSignal {
            node_id: node_id.into(),
            channel: channel.into(),
        });
        self
    }

    pub fn suspend(mut self, node_id: impl Into<String>) -> Self {
        self.steps.push(Step::Suspend {
            node_id: node_id.into(),
        });
        self
    }
}

#[derive(Debug, Default)]
struct Sequence {
    instance: AtomicUsize,
    work_item: AtomicUsize,
    node_instance: AtomicUsize,
}

impl Sequence {
    fn next(counter: &AtomicUsize, prefix: &str) -> String {
        format!("{}-{}", prefix, counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[derive(Default)]
struct EngineState {
    state: ProcessInstanceStatus,
    variables: VariableMap,
    cursor: usize,
    node_instance: Option<NodeInstanceInfo>,
    work_items: Vec<EngineWorkItem>,
    error: Option<(String, String)>,
    failures: HashMap<String, usize>,
    listeners: HashMap<String, CompletionSender>,
    reconnects: usize,
}

/// Engine-side handle of a scripted instance
pub struct ScriptedInstance {
    id: String,
    script: Arc<ProcessScript>,
    sequence: Arc<Sequence>,
    inner: Mutex<EngineState>,
}

impl fmt::Debug for ScriptedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ScriptedInstance")
            .field("id", &self.id)
            .field("process_id", &self.script.process_id)
            .field("state", &inner.state)
            .field("cursor", &inner.cursor)
            .field("work_items", &inner.work_items.len())
            .finish()
    }
}

impl ScriptedInstance {
    fn new(id: String, script: Arc<ProcessScript>, sequence: Arc<Sequence>, variables: VariableMap) -> Self {
        let failures = script
            .steps
            .iter()
            .filter_map(|step| match step {
                Step::Fail { node_id, times, .. } => Some((node_id.clone(), *times)),
                _ => None,
            })
            .collect();

        Self {
            id,
            script,
            sequence,
            inner: Mutex::new(EngineState {
                variables,
                failures,
                ..EngineState::default()
            }),
        }
    }

    /// Number of completion listeners currently registered
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// How many times the handle was reconnected
    pub fn reconnect_count(&self) -> usize {
        self.inner.lock().reconnects
    }

    fn run(&self, inner: &mut EngineState) {
        while inner.state == ProcessInstanceStatus::Active {
            let Some(step) = self.script.steps.get(inner.cursor) else {
                inner.node_instance = None;
                inner.state = ProcessInstanceStatus::Completed;
                debug!(process_instance_id = %self.id, "Scripted instance completed");
                self.notify(inner);
                return;
            };

            match step {
                Step::WorkItem {
                    node_id,
                    name,
                    parameters,
                } => {
                    let node = self.enter(inner, node_id, name);
                    let id = Sequence::next(&self.sequence.work_item, "wi");
                    trace!(process_instance_id = %self.id, work_item_id = %id, "Created work item");
                    inner.work_items.push(EngineWorkItem {
                        id,
                        node_id: node.node_id,
                        node_name: node.node_name,
                        state: state::PENDING,
                        phase_id: None,
                        phase_status: None,
                        parameters: parameters.clone(),
                        results: VariableMap::new(),
                    });
                    return;
                }
                Step::Fail {
                    node_id, message, ..
                } => {
                    let remaining = inner.failures.entry(node_id.clone()).or_insert(0);
                    if *remaining > 0 {
                        *remaining -= 1;
                        self.enter(inner, node_id, node_id);
                        inner.error = Some((node_id.clone(), message.clone()));
                        inner.state = ProcessInstanceStatus::Error;
                        debug!(process_instance_id = %self.id, %node_id, "Scripted node failed");
                        return;
                    }
                    inner.cursor += 1;
                }
                Step::SetVariable { name, value } => {
                    inner.variables.insert(name.clone(), value.clone());
                    inner.cursor += 1;
                }
                Step::WaitSignal { node_id, channel } => {
                    self.enter(inner, node_id, channel);
                    return;
                }
                Step::Suspend { node_id } => {
                    self.enter(inner, node_id, node_id);
                    inner.state = ProcessInstanceStatus::Suspended;
                    debug!(process_instance_id = %self.id, %node_id, "Scripted instance suspended");
                    return;
                }
            }
        }
    }

    fn enter(&self, inner: &mut EngineState, node_id: &str, node_name: &str) -> NodeInstanceInfo {
        let node = NodeInstanceInfo {
            id: Sequence::next(&self.sequence.node_instance, "ni"),
            node_id: node_id.to_string(),
            node_name: node_name.to_string(),
        };
        inner.node_instance = Some(node.clone());
        node
    }

    /// Leave the current step and keep running
    fn advance(&self, inner: &mut EngineState) {
        inner.node_instance = None;
        inner.cursor += 1;
        self.run(inner);
    }

    fn notify(&self, inner: &EngineState) {
        for (event_type, sender) in &inner.listeners {
            let _ = sender.send(CompletionEvent {
                event_type: event_type.clone(),
                process_instance_id: self.id.clone(),
                status: inner.state,
            });
        }
    }

    fn work_item_index(&self, inner: &EngineState, work_item_id: &str) -> Option<usize> {
        inner.work_items.iter().position(|item| item.id == work_item_id)
    }

    fn complete(&self, inner: &mut EngineState, index: usize, results: VariableMap) {
        let item = inner.work_items.remove(index);
        for (name, value) in results {
            inner.variables.insert(name, value);
        }
        trace!(process_instance_id = %self.id, work_item_id = %item.id, "Work item left");
        self.advance(inner);
    }

    fn abort(&self) {
        let mut inner = self.inner.lock();
        inner.work_items.clear();
        inner.node_instance = None;
        inner.state = ProcessInstanceStatus::Aborted;
        self.notify(&inner);
    }
}

impl EngineProcessInstance for ScriptedInstance {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn process_id(&self) -> String {
        self.script.process_id.clone()
    }

    fn state(&self) -> ProcessInstanceStatus {
        self.inner.lock().state
    }

    fn set_state(&self, state: ProcessInstanceStatus) {
        self.inner.lock().state = state;
    }

    fn variables(&self) -> VariableMap {
        self.inner.lock().variables.clone()
    }

    fn set_variable(&self, name: &str, value: Value) {
        self.inner.lock().variables.insert(name.to_string(), value);
    }

    fn signal_event(&self, channel: &str, payload: Value) -> Result<(), CoreError> {
        let mut inner = self.inner.lock();
        let waiting = matches!(
            self.script.steps.get(inner.cursor),
            Some(Step::WaitSignal { channel: expected, .. }) if expected == channel
        );
        if !waiting || inner.state != ProcessInstanceStatus::Active {
            trace!(process_instance_id = %self.id, %channel, "Signal ignored");
            return Ok(());
        }

        inner.variables.insert(channel.to_string(), payload);
        self.advance(&mut inner);
        Ok(())
    }

    fn node_instances(&self) -> Vec<NodeInstanceInfo> {
        self.inner.lock().node_instance.iter().cloned().collect()
    }

    fn work_items(&self) -> Vec<EngineWorkItem> {
        self.inner.lock().work_items.clone()
    }

    fn error_message(&self) -> Option<String> {
        self.inner.lock().error.as_ref().map(|(_, message)| message.clone())
    }

    fn node_id_in_error(&self) -> Option<String> {
        self.inner.lock().error.as_ref().map(|(node_id, _)| node_id.clone())
    }

    fn clear_error(&self) {
        self.inner.lock().error = None;
    }

    fn trigger_node(&self, node_instance_id: &str, _connection: &str) -> Result<(), CoreError> {
        let mut inner = self.inner.lock();
        match &inner.node_instance {
            Some(node) if node.id == node_instance_id => {}
            _ => {
                return Err(CoreError::EngineError(format!(
                    "no node instance {} in {}",
                    node_instance_id, self.id
                )))
            }
        }

        inner.node_instance = None;
        self.run(&mut inner);
        Ok(())
    }

    fn trigger_completed(
        &self,
        node_instance_id: &str,
        _connection: &str,
        _remove: bool,
    ) -> Result<(), CoreError> {
        let mut inner = self.inner.lock();
        match &inner.node_instance {
            Some(node) if node.id == node_instance_id => {}
            _ => {
                return Err(CoreError::EngineError(format!(
                    "no node instance {} in {}",
                    node_instance_id, self.id
                )))
            }
        }

        self.advance(&mut inner);
        Ok(())
    }

    fn reconnect(&self) {
        self.inner.lock().reconnects += 1;
    }

    fn add_event_listener(&self, event_type: &str, sender: CompletionSender) {
        self.inner
            .lock()
            .listeners
            .insert(event_type.to_string(), sender);
    }

    fn remove_event_listener(&self, event_type: &str) {
        self.inner.lock().listeners.remove(event_type);
    }
}

type Instances = Arc<Mutex<HashMap<String, Arc<ScriptedInstance>>>>;

/// In-memory engine executing [`ProcessScript`]s
#[derive(Default)]
pub struct ScriptedRuntime {
    scripts: Mutex<HashMap<String, Arc<ProcessScript>>>,
    instances: Instances,
    sequence: Arc<Sequence>,
}

impl fmt::Debug for ScriptedRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedRuntime")
            .field("scripts", &self.scripts.lock().len())
            .field("instances", &self.instances.lock().len())
            .finish()
    }
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runtime with `script` deployed
    pub fn with_script(script: ProcessScript) -> Arc<Self> {
        let runtime = Self::new();
        runtime.deploy(script);
        Arc::new(runtime)
    }

    pub fn deploy(&self, script: ProcessScript) {
        self.scripts
            .lock()
            .insert(script.process_id.clone(), Arc::new(script));
    }

    /// The engine handle of `id`, if the engine still knows it
    pub fn instance(&self, id: &str) -> Option<Arc<ScriptedInstance>> {
        self.instances.lock().get(id).cloned()
    }

    /// Supplier reloading `id` from this runtime
    pub fn reload_supplier(&self, id: &str) -> ReloadSupplier {
        let instances = self.instances.clone();
        let id = id.to_string();
        Arc::new(move || {
            instances
                .lock()
                .get(&id)
                .map(|instance| instance.clone() as SharedProcessInstance)
        })
    }

    /// Drop `id` from the engine, as if its persisted copy was lost
    pub fn forget(&self, id: &str) -> bool {
        self.instances.lock().remove(id).is_some()
    }

    /// Deliver a signal to every instance, bypassing the process instances
    pub fn broadcast_signal(&self, channel: &str, payload: Value) -> Result<(), CoreError> {
        let instances: Vec<_> = self.instances.lock().values().cloned().collect();
        for instance in instances {
            instance.signal_event(channel, payload.clone())?;
        }
        Ok(())
    }

    fn owner_of(&self, work_item_id: &str) -> Result<(Arc<ScriptedInstance>, EngineWorkItem), CoreError> {
        let instances = self.instances.lock();
        instances
            .values()
            .find_map(|instance| {
                instance
                    .work_items()
                    .into_iter()
                    .find(|item| item.id == work_item_id)
                    .map(|item| (instance.clone(), item))
            })
            .ok_or_else(|| CoreError::WorkItemNotFound {
                work_item_id: work_item_id.to_string(),
                process_instance_id: String::new(),
            })
    }

    fn authorized(
        &self,
        work_item_id: &str,
        policies: &[Arc<dyn Policy>],
    ) -> Result<Arc<ScriptedInstance>, CoreError> {
        let (instance, item) = self.owner_of(work_item_id)?;
        if !enforce_all(policies, &item) {
            return Err(CoreError::NotAuthorized(format!(
                "work item {} of process instance {}",
                work_item_id, instance.id
            )));
        }
        Ok(instance)
    }
}

impl WorkItemManager for ScriptedRuntime {
    fn complete_work_item(
        &self,
        work_item_id: &str,
        results: VariableMap,
        policies: &[Arc<dyn Policy>],
    ) -> Result<(), CoreError> {
        let instance = self.authorized(work_item_id, policies)?;
        let mut inner = instance.inner.lock();
        if let Some(index) = instance.work_item_index(&inner, work_item_id) {
            instance.complete(&mut inner, index, results);
        }
        Ok(())
    }

    fn abort_work_item(
        &self,
        work_item_id: &str,
        policies: &[Arc<dyn Policy>],
    ) -> Result<(), CoreError> {
        let instance = self.authorized(work_item_id, policies)?;
        let mut inner = instance.inner.lock();
        if let Some(index) = instance.work_item_index(&inner, work_item_id) {
            instance.complete(&mut inner, index, VariableMap::new());
        }
        Ok(())
    }

    fn transition_work_item(&self, work_item_id: &str, transition: &Transition) -> Result<(), CoreError> {
        let instance = self.authorized(work_item_id, &transition.policies)?;
        let mut inner = instance.inner.lock();
        let Some(index) = instance.work_item_index(&inner, work_item_id) else {
            return Ok(());
        };

        match transition.phase.as_str() {
            phase::COMPLETE => instance.complete(&mut inner, index, transition.data.clone()),
            phase::ABORT | phase::SKIP => instance.complete(&mut inner, index, VariableMap::new()),
            other => {
                let item = &mut inner.work_items[index];
                item.state = match other {
                    phase::RELEASE => state::PENDING,
                    _ => state::ACTIVE,
                };
                item.phase_id = Some(other.to_string());
                item.phase_status = Some("Activated".to_string());
                for (name, value) in &transition.data {
                    item.results.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(())
    }
}

impl ProcessRuntime for ScriptedRuntime {
    fn create_process_instance(
        &self,
        process_id: &str,
        variables: VariableMap,
    ) -> Result<SharedProcessInstance, CoreError> {
        let script = self.scripts.lock().get(process_id).cloned().ok_or_else(|| {
            CoreError::ProcessDefinitionError(format!("no script deployed for {}", process_id))
        })?;

        let id = Sequence::next(&self.sequence.instance, "pi");
        let instance = Arc::new(ScriptedInstance::new(
            id.clone(),
            script,
            self.sequence.clone(),
            variables,
        ));
        self.instances.lock().insert(id, instance.clone());
        Ok(instance)
    }

    fn start_process_instance(&self, id: &str) -> Result<SharedProcessInstance, CoreError> {
        let instance = self
            .instance(id)
            .ok_or_else(|| CoreError::ProcessInstanceNotFound(id.to_string()))?;
        {
            let mut inner = instance.inner.lock();
            if inner.state != ProcessInstanceStatus::Pending {
                return Err(CoreError::EngineError(format!(
                    "process instance {} is {}",
                    id, inner.state
                )));
            }
            inner.state = ProcessInstanceStatus::Active;
            instance.run(&mut inner);
        }
        Ok(instance)
    }

    fn abort_process_instance(&self, id: &str) -> Result<(), CoreError> {
        let instance = self
            .instance(id)
            .ok_or_else(|| CoreError::ProcessInstanceNotFound(id.to_string()))?;
        instance.abort();
        Ok(())
    }

    fn work_item_manager(&self) -> &dyn WorkItemManager {
        self
    }
}
