//! Runtime configuration
//!
//! Defaults, environment overrides and optional YAML input for the knobs the
//! process-instance runtime exposes.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

use crate::CoreError;

/// How a unit of work reacts when a store action fails at commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Stop at the first failing action and return the error
    #[default]
    FailFast,
    /// Apply every action and report the failures
    ContinueOnError,
}

impl std::str::FromStr for CommitPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail_fast" | "fail-fast" => Ok(CommitPolicy::FailFast),
            "continue_on_error" | "continue-on-error" => Ok(CommitPolicy::ContinueOnError),
            other => Err(CoreError::ConfigurationError(format!(
                "Unknown commit policy: {}",
                other
            ))),
        }
    }
}

/// Process runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Work item parameter holding the task display name
    #[serde(default = "default_task_name_parameter")]
    pub task_name_parameter: String,

    /// Commit behaviour of units of work
    #[serde(default)]
    pub commit_policy: CommitPolicy,

    /// Log filter used by tracing initialisation
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_task_name_parameter() -> String {
    "TaskName".to_string()
}

fn default_log_filter() -> String {
    "info,rill=debug".to_string()
}

impl RuntimeConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn load() -> Result<Self, CoreError> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;

        info!("Loaded runtime configuration");
        Ok(config)
    }

    /// Parse configuration from YAML, then apply environment overrides
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CoreError> {
        let mut config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(parameter) = env::var("RILL_TASK_NAME_PARAMETER") {
            self.task_name_parameter = parameter;
        }

        if let Ok(policy) = env::var("RILL_COMMIT_POLICY") {
            match policy.parse::<CommitPolicy>() {
                Ok(policy) => self.commit_policy = policy,
                Err(_) => warn!("Invalid RILL_COMMIT_POLICY value: {}", policy),
            }
        }

        if let Ok(filter) = env::var("RILL_LOG") {
            self.log_filter = filter;
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.task_name_parameter.trim().is_empty() {
            return Err(CoreError::ConfigurationError(
                "Task name parameter must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            task_name_parameter: default_task_name_parameter(),
            commit_policy: CommitPolicy::default(),
            log_filter: default_log_filter(),
        }
    }
}
