//! Store contract for process instances
//!
//! The runtime never writes to the store directly. Mutations are queued as
//! work units on a [`UnitOfWork`](crate::UnitOfWork) and applied when it
//! commits. External crates implement [`MutableProcessInstances`] to provide
//! different persistence mechanisms.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::process_error::ProcessErrorSnapshot;
use crate::{CoreError, ProcessInstanceStatus};

/// Persisted snapshot of a process instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstanceView {
    /// Instance id
    pub id: String,

    /// Process definition id
    pub process_id: String,

    /// Status at the time of the snapshot
    pub status: ProcessInstanceStatus,

    /// The typed record, serialized
    pub variables: serde_json::Value,

    /// Error snapshot, present exactly when status is ERROR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProcessErrorSnapshot>,

    /// Snapshot timestamp
    pub updated_at: DateTime<Utc>,
}

/// Durable store of in-flight process instances
#[async_trait]
pub trait MutableProcessInstances: Send + Sync {
    /// Find a process instance snapshot by ID
    async fn find_by_id(&self, id: &str) -> Result<Option<ProcessInstanceView>, CoreError>;

    /// Whether a snapshot exists for `id`
    async fn exists(&self, id: &str) -> Result<bool, CoreError> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    /// Insert or replace the snapshot of `id`
    async fn update(&self, id: &str, instance: &ProcessInstanceView) -> Result<(), CoreError>;

    /// Remove the snapshot of `id`
    async fn remove(&self, id: &str) -> Result<(), CoreError>;

    /// All stored snapshots
    async fn values(&self) -> Result<Vec<ProcessInstanceView>, CoreError>;
}
