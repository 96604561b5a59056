//! Agent protocol
//!
//! Talks to the live agent process that runs alongside a remote task:
//! - Wire types for command and python-snippet requests
//! - `AgentApi`, the request/response seam, and its HTTP implementation
//! - `AgentChannel`, the submit-then-poll driver with unreachable detection

mod channel;
mod client;
mod messages;

use async_trait::async_trait;

use crate::error::Result;

pub use channel::*;
pub use client::*;
pub use messages::*;

/// Request/response operations of the agent service
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Submit a shell command
    async fn submit_command(&self, request: &CommandRequest) -> Result<SubmitResponse>;

    /// Fetch the result of a submitted command
    async fn command_result(&self, execution_id: &str) -> Result<ExecutionResponse>;

    /// Submit a python snippet
    async fn submit_python(&self, request: &PythonRequest) -> Result<SubmitResponse>;

    /// Fetch the result of a submitted python snippet
    async fn python_result(&self, execution_id: &str) -> Result<ExecutionResponse>;
}
