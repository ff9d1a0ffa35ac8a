use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use rill_core::{CoreError, MutableProcessInstances, ProcessInstanceStatus, ProcessInstanceView};

/// Backing map shared between store handles
pub type SharedViews = Arc<RwLock<HashMap<String, ProcessInstanceView>>>;

/// In-memory implementation of [`MutableProcessInstances`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessInstances {
    instances: SharedViews,
}

impl InMemoryProcessInstances {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store over an existing map
    pub fn with_storage(instances: SharedViews) -> Self {
        Self { instances }
    }

    /// Snapshots currently in `status`
    pub async fn values_by_status(
        &self,
        status: ProcessInstanceStatus,
    ) -> Vec<ProcessInstanceView> {
        let instances = self.instances.read().await;
        instances
            .values()
            .filter(|view| view.status == status)
            .cloned()
            .collect()
    }

    /// Number of stored snapshots
    pub async fn size(&self) -> usize {
        self.instances.read().await.len()
    }
}

#[async_trait]
impl MutableProcessInstances for InMemoryProcessInstances {
    async fn find_by_id(&self, id: &str) -> Result<Option<ProcessInstanceView>, CoreError> {
        let instances = self.instances.read().await;
        Ok(instances.get(id).cloned())
    }

    async fn exists(&self, id: &str) -> Result<bool, CoreError> {
        let instances = self.instances.read().await;
        Ok(instances.contains_key(id))
    }

    async fn update(&self, id: &str, instance: &ProcessInstanceView) -> Result<(), CoreError> {
        if instance.id != id {
            return Err(CoreError::StateStoreError(format!(
                "Snapshot of {} cannot be stored under {}",
                instance.id, id
            )));
        }

        let mut instances = self.instances.write().await;
        let previous = instances.insert(id.to_string(), instance.clone());
        debug!(
            process_instance_id = %id,
            status = %instance.status,
            replaced = previous.is_some(),
            "Stored process instance"
        );
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), CoreError> {
        let mut instances = self.instances.write().await;
        if instances.remove(id).is_none() {
            trace!(process_instance_id = %id, "Nothing stored to remove");
        } else {
            debug!(process_instance_id = %id, "Removed process instance");
        }
        Ok(())
    }

    async fn values(&self) -> Result<Vec<ProcessInstanceView>, CoreError> {
        let instances = self.instances.read().await;
        Ok(instances.values().cloned().collect())
    }
}
