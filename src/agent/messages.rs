//! Agent protocol wire types

use serde::{Deserialize, Serialize};

/// Error text the service returns when a task's agent is not connected
pub const AGENT_NOT_FOUND: &str = "Agent not found";

/// Run a shell command in the agent's working directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub agent_id: String,
    pub working_dir: String,
    pub arguments: Vec<String>,
}

/// Run a python snippet inside the agent's environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PythonRequest {
    pub agent_id: String,
    pub working_dir: String,
    pub libraries: Vec<String>,
    pub code: String,
    pub python_version: String,
    pub keep_alive: bool,
    pub parent_experiment_id: String,
}

/// Answer to a submit request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResponse {
    pub fn accepted(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: Some(execution_id.into()),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            execution_id: None,
            error: Some(error.into()),
        }
    }
}

/// Answer to a result poll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    #[serde(default, alias = "executed")]
    pub available: bool,
    #[serde(default)]
    pub response_string: Option<String>,
}

impl ExecutionResponse {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn ready(response: impl Into<String>) -> Self {
        Self {
            available: true,
            response_string: Some(response.into()),
        }
    }
}
