//! Work item projection, authorization policies and lifecycle transitions

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::application::runtime_interface::EngineWorkItem;
use crate::VariableMap;

/// Work item state codes reported by the engine
pub mod state {
    /// Waiting to be picked up
    pub const PENDING: i32 = 0;
    /// Being worked on
    pub const ACTIVE: i32 = 1;
    /// Completed
    pub const COMPLETED: i32 = 2;
    /// Aborted
    pub const ABORTED: i32 = 3;
}

/// Standard lifecycle phases of a work item
pub mod phase {
    /// Claim the work item
    pub const CLAIM: &str = "claim";
    /// Release a claimed work item
    pub const RELEASE: &str = "release";
    /// Complete the work item
    pub const COMPLETE: &str = "complete";
    /// Abort the work item
    pub const ABORT: &str = "abort";
    /// Skip the work item
    pub const SKIP: &str = "skip";
}

/// Read-only view of an outstanding task of a process instance
///
/// Recomputed from the live engine handle on every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Work item id
    pub id: String,
    /// Display name
    pub name: String,
    /// State code, see [`state`]
    pub state: i32,
    /// Current lifecycle phase
    pub phase_id: Option<String>,
    /// Status within the phase
    pub phase_status: Option<String>,
    /// Input parameters
    pub parameters: VariableMap,
    /// Results recorded so far
    pub results: VariableMap,
}

impl WorkItem {
    /// Project an engine work item; the display name is read from
    /// `task_name_parameter` and falls back to the node name.
    pub fn from_engine(item: &EngineWorkItem, task_name_parameter: &str) -> Self {
        let name = item
            .parameters
            .get(task_name_parameter)
            .and_then(|value| value.as_str())
            .unwrap_or(&item.node_name)
            .to_string();

        Self {
            id: item.id.clone(),
            name,
            state: item.state,
            phase_id: item.phase_id.clone(),
            phase_status: item.phase_status.clone(),
            parameters: item.parameters.clone(),
            results: item.results.clone(),
        }
    }
}

/// Authorization predicate gating visibility of and actions on a work item
pub trait Policy: Debug + Send + Sync {
    /// Whether the policy allows access to `work_item`
    fn enforce(&self, work_item: &EngineWorkItem) -> bool;
}

/// Whether every policy allows access to `work_item`
pub fn enforce_all(policies: &[Arc<dyn Policy>], work_item: &EngineWorkItem) -> bool {
    policies.iter().all(|policy| policy.enforce(work_item))
}

/// Identity of the caller acting on work items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User name
    pub name: String,
    /// Roles (groups) of the user
    pub roles: HashSet<String>,
}

impl Identity {
    /// Create an identity
    pub fn new<I, S>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// Policy based on the `ActorId`, `GroupId` and `ExcludedOwnerId` parameters
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    identity: Identity,
}

impl SecurityPolicy {
    /// Work item parameter listing the allowed actors
    pub const ACTOR_ID: &'static str = "ActorId";
    /// Work item parameter listing the allowed groups
    pub const GROUP_ID: &'static str = "GroupId";
    /// Work item parameter listing the excluded users
    pub const EXCLUDED_OWNER_ID: &'static str = "ExcludedOwnerId";

    /// Create a policy for `identity`
    pub fn of(identity: Identity) -> Arc<dyn Policy> {
        Arc::new(Self { identity })
    }

    /// The identity this policy checks
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

fn csv_parameter(parameters: &VariableMap, name: &str) -> Vec<String> {
    parameters
        .get(name)
        .and_then(|value| value.as_str())
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl Policy for SecurityPolicy {
    fn enforce(&self, work_item: &EngineWorkItem) -> bool {
        let excluded = csv_parameter(&work_item.parameters, Self::EXCLUDED_OWNER_ID);
        if excluded.contains(&self.identity.name) {
            return false;
        }

        let actors = csv_parameter(&work_item.parameters, Self::ACTOR_ID);
        let groups = csv_parameter(&work_item.parameters, Self::GROUP_ID);
        if actors.is_empty() && groups.is_empty() {
            return true;
        }

        actors.contains(&self.identity.name)
            || groups.iter().any(|group| self.identity.roles.contains(group))
    }
}

/// A requested lifecycle transition of a work item
#[derive(Debug, Clone)]
pub struct Transition {
    /// Target phase, see [`phase`]
    pub phase: String,
    /// Data carried by the transition (results for `complete`)
    pub data: VariableMap,
    /// Policies the engine must enforce
    pub policies: Vec<Arc<dyn Policy>>,
}

impl Transition {
    /// Create a transition to `phase`
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            data: VariableMap::new(),
            policies: Vec::new(),
        }
    }

    /// Attach transition data
    pub fn with_data(mut self, data: VariableMap) -> Self {
        self.data = data;
        self
    }

    /// Add a policy
    pub fn with_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.policies.push(policy);
        self
    }
}
