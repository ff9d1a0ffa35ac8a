//! Compiled process definitions and the factory for their instances

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::model::Model;
use super::process_instance::ProcessInstance;
use super::repository::{MutableProcessInstances, ProcessInstanceView};
use crate::application::runtime_interface::{ProcessRuntime, ReloadSupplier};
use crate::application::unit_of_work::UnitOfWork;
use crate::{CoreError, RuntimeConfig};

/// Identity of a compiled process definition known to the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessDefinition {
    /// Definition id the engine instantiates
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Definition version
    #[serde(default)]
    pub version: Option<String>,
}

impl ProcessDefinition {
    /// Create a definition reference
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: None,
        }
    }

    /// Set the version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// A process whose instances carry variables of type `T`
pub struct Process<T: Model> {
    definition: Arc<ProcessDefinition>,
    runtime: Arc<dyn ProcessRuntime>,
    instances: Arc<dyn MutableProcessInstances>,
    config: Arc<RuntimeConfig>,
    _model: PhantomData<fn() -> T>,
}

impl<T: Model> Process<T> {
    /// Create a process bound to an engine and a store
    pub fn new(
        definition: ProcessDefinition,
        runtime: Arc<dyn ProcessRuntime>,
        instances: Arc<dyn MutableProcessInstances>,
    ) -> Self {
        Self {
            definition: Arc::new(definition),
            runtime,
            instances,
            config: Arc::new(RuntimeConfig::default()),
            _model: PhantomData,
        }
    }

    /// Replace the runtime configuration
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Definition id
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    /// The definition
    pub fn definition(&self) -> &ProcessDefinition {
        &self.definition
    }

    /// The execution engine
    pub fn runtime(&self) -> &Arc<dyn ProcessRuntime> {
        &self.runtime
    }

    /// The store of in-flight instances
    pub fn instances(&self) -> &Arc<dyn MutableProcessInstances> {
        &self.instances
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Start a unit of work that commits with this process's policy
    pub fn unit_of_work(&self) -> UnitOfWork {
        UnitOfWork::from_config(&self.config)
    }

    /// Create a PENDING instance with the given variables
    pub fn create_instance(&self, variables: T) -> Result<ProcessInstance<T>, CoreError> {
        ProcessInstance::new(self.clone(), variables)
    }

    /// Rebuild an evicted instance from its persisted snapshot
    ///
    /// The engine handle is materialized through `reload` the first time an
    /// operation needs it.
    pub fn restore_instance(
        &self,
        view: &ProcessInstanceView,
        reload: ReloadSupplier,
    ) -> Result<ProcessInstance<T>, CoreError> {
        if view.process_id != self.definition.id {
            return Err(CoreError::InvalidState(format!(
                "Process instance {} belongs to process {}, not {}",
                view.id, view.process_id, self.definition.id
            )));
        }
        ProcessInstance::restore(self.clone(), view, reload)
    }
}

impl<T: Model> Clone for Process<T> {
    fn clone(&self) -> Self {
        Self {
            definition: self.definition.clone(),
            runtime: self.runtime.clone(),
            instances: self.instances.clone(),
            config: self.config.clone(),
            _model: PhantomData,
        }
    }
}

impl<T: Model> fmt::Debug for Process<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("definition", &self.definition)
            .field("config", &self.config)
            .finish()
    }
}
