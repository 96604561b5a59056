//! HTTP client for the agent protocol

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::http::{Credentials, JsonClient};

use super::{AgentApi, CommandRequest, ExecutionResponse, PythonRequest, SubmitResponse};

/// Agent protocol over the gateway's REST endpoints
#[derive(Debug, Clone)]
pub struct AgentClient {
    http: JsonClient,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>, credentials: &Credentials, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(base_url, credentials, timeout)?,
        })
    }
}

#[async_trait]
impl AgentApi for AgentClient {
    async fn submit_command(&self, request: &CommandRequest) -> Result<SubmitResponse> {
        debug!(agent = %request.agent_id, args = ?request.arguments, "Submitting agent command");
        self.http
            .post("/api/v1/agent/executecommandrequest", request)
            .await
    }

    async fn command_result(&self, execution_id: &str) -> Result<ExecutionResponse> {
        self.http
            .get(&format!("/api/v1/agent/executecommandresponse/{}", execution_id))
            .await
    }

    async fn submit_python(&self, request: &PythonRequest) -> Result<SubmitResponse> {
        debug!(
            agent = %request.agent_id,
            libraries = ?request.libraries,
            "Submitting agent python snippet"
        );
        self.http
            .post("/api/v1/agent/executepythonrequest", request)
            .await
    }

    async fn python_result(&self, execution_id: &str) -> Result<ExecutionResponse> {
        self.http
            .get(&format!("/api/v1/agent/executepythonresponse/{}", execution_id))
            .await
    }
}
