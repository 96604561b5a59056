//! Submit-then-poll execution over the agent protocol
//!
//! A request is submitted once, then its result is polled by execution id
//! until the service marks it available. A missing agent is reported as
//! [`AgentOutcome::Unreachable`] so callers can choose a fallback path.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

use super::{AgentApi, CommandRequest, ExecutionResponse, PythonRequest, SubmitResponse, AGENT_NOT_FOUND};

/// How result polling is paced and bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between result polls
    pub interval: Duration,
    /// Upper bound on the total wait, `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }
}

/// Result of an agent round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome<T> {
    /// The agent ran the request and produced a response
    Completed(T),
    /// No agent is connected for this task
    Unreachable,
}

#[derive(Debug, Clone, Copy)]
enum ExecutionKind {
    Command,
    Python,
}

/// Drives the submit/poll protocol against an [`AgentApi`]
pub struct AgentChannel<'a> {
    api: &'a dyn AgentApi,
    policy: PollPolicy,
}

impl<'a> AgentChannel<'a> {
    pub fn new(api: &'a dyn AgentApi, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    /// Run a shell command and return its textual output
    pub async fn run_command(
        &self,
        agent_ref: &str,
        working_dir: &str,
        arguments: Vec<String>,
    ) -> Result<AgentOutcome<String>> {
        let request = CommandRequest {
            agent_id: agent_ref.to_string(),
            working_dir: working_dir.to_string(),
            arguments,
        };
        let submitted = self.api.submit_command(&request).await?;
        self.complete(ExecutionKind::Command, agent_ref, submitted).await
    }

    /// Run a python snippet and return its textual output
    pub async fn run_python(&self, request: &PythonRequest) -> Result<AgentOutcome<String>> {
        let submitted = self.api.submit_python(request).await?;
        self.complete(ExecutionKind::Python, &request.agent_id, submitted).await
    }

    async fn complete(
        &self,
        kind: ExecutionKind,
        agent_ref: &str,
        submitted: SubmitResponse,
    ) -> Result<AgentOutcome<String>> {
        if let Some(error) = submitted.error {
            if error == AGENT_NOT_FOUND {
                warn!(agent = %agent_ref, "Agent not reachable");
                return Ok(AgentOutcome::Unreachable);
            }
            return Err(Error::remote_execution(error));
        }

        let execution_id = submitted.execution_id.ok_or_else(|| Error::ProtocolMalformed {
            message: "submit response carried neither executionId nor error".to_string(),
        })?;
        debug!(agent = %agent_ref, execution_id = %execution_id, ?kind, "Request accepted");

        self.poll(kind, &execution_id).await.map(AgentOutcome::Completed)
    }

    async fn poll(&self, kind: ExecutionKind, execution_id: &str) -> Result<String> {
        let started = Instant::now();
        let mut attempts: u64 = 0;

        loop {
            attempts += 1;
            let response = self.fetch(kind, execution_id).await?;
            if response.available {
                debug!(execution_id = %execution_id, attempts, "Result available");
                return Ok(response.response_string.unwrap_or_default());
            }

            if let Some(timeout) = self.policy.timeout {
                if started.elapsed() >= timeout {
                    return Err(Error::AgentTimeout {
                        execution_id: execution_id.to_string(),
                        timeout_secs: timeout.as_secs(),
                    });
                }
            }

            trace!(execution_id = %execution_id, attempts, "Result pending");
            tokio::time::sleep(self.policy.interval).await;
        }
    }

    async fn fetch(&self, kind: ExecutionKind, execution_id: &str) -> Result<ExecutionResponse> {
        match kind {
            ExecutionKind::Command => self.api.command_result(execution_id).await,
            ExecutionKind::Python => self.api.python_result(execution_id).await,
        }
    }
}
