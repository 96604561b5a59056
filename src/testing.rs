//! Scripted collaborators for unit tests

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::agent::{AgentApi, CommandRequest, ExecutionResponse, PythonRequest, SubmitResponse};
use crate::error::Result;
use crate::gateway::{CatalogKind, ExperimentRequest, Gateway, LaunchedExperiment};
use crate::runtime::ExperimentState;
use crate::transport::FileTransport;

// ─────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────

/// Agent service that answers every submit the same way
pub struct FakeAgent {
    submit: SubmitResponse,
    results: RwLock<VecDeque<ExecutionResponse>>,
    commands: RwLock<Vec<CommandRequest>>,
    scripts: RwLock<Vec<PythonRequest>>,
    result_polls: RwLock<u32>,
}

impl FakeAgent {
    pub fn replying(submit: SubmitResponse) -> Self {
        Self {
            submit,
            results: RwLock::new(VecDeque::new()),
            commands: RwLock::new(Vec::new()),
            scripts: RwLock::new(Vec::new()),
            result_polls: RwLock::new(0),
        }
    }

    /// Agent whose task process is not connected
    pub fn missing() -> Self {
        Self::replying(SubmitResponse::rejected(crate::agent::AGENT_NOT_FOUND))
    }

    /// Queue a result poll answer; an empty queue answers pending
    pub fn push_result(&self, response: ExecutionResponse) {
        self.results.write().push_back(response);
    }

    pub fn result_polls(&self) -> u32 {
        *self.result_polls.read()
    }

    pub fn commands(&self) -> Vec<CommandRequest> {
        self.commands.read().clone()
    }

    pub fn scripts(&self) -> Vec<PythonRequest> {
        self.scripts.read().clone()
    }

    fn next_result(&self) -> ExecutionResponse {
        *self.result_polls.write() += 1;
        self.results.write().pop_front().unwrap_or_default()
    }
}

#[async_trait]
impl AgentApi for FakeAgent {
    async fn submit_command(&self, request: &CommandRequest) -> Result<SubmitResponse> {
        self.commands.write().push(request.clone());
        Ok(self.submit.clone())
    }

    async fn command_result(&self, _execution_id: &str) -> Result<ExecutionResponse> {
        Ok(self.next_result())
    }

    async fn submit_python(&self, request: &PythonRequest) -> Result<SubmitResponse> {
        self.scripts.write().push(request.clone());
        Ok(self.submit.clone())
    }

    async fn python_result(&self, _execution_id: &str) -> Result<ExecutionResponse> {
        Ok(self.next_result())
    }
}

// ─────────────────────────────────────────────────────────────────
// Transport
// ─────────────────────────────────────────────────────────────────

/// Transport that records calls and serves canned content
#[derive(Default)]
pub struct FakeTransport {
    calls: RwLock<Vec<String>>,
    listing: Vec<String>,
    content: Vec<u8>,
}

impl FakeTransport {
    pub fn serving(listing: &[&str], content: &[u8]) -> Self {
        Self {
            calls: RwLock::new(Vec::new()),
            listing: listing.iter().map(|s| s.to_string()).collect(),
            content: content.to_vec(),
        }
    }

    /// Operation names in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().clone()
    }

    fn record(&self, operation: &str) {
        self.calls.write().push(operation.to_string());
    }
}

#[async_trait]
impl FileTransport for FakeTransport {
    async fn make_dir(&self, _storage_host: &str, _remote_dir: &str) -> Result<()> {
        self.record("make_dir");
        Ok(())
    }

    async fn upload(&self, _storage_host: &str, local_file: &Path, remote_dir: &str) -> Result<String> {
        self.record("upload");
        let name = local_file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        Ok(format!("{}/{}", remote_dir, name))
    }

    async fn list(&self, _storage_host: &str, _remote_dir: &str) -> Result<Vec<String>> {
        self.record("list");
        Ok(self.listing.clone())
    }

    async fn download(
        &self,
        _storage_host: &str,
        _remote_dir: &str,
        file_name: &str,
        local_dir: &Path,
    ) -> Result<PathBuf> {
        self.record("download");
        let target = local_dir.join(file_name);
        tokio::fs::write(&target, &self.content).await?;
        Ok(target)
    }

    async fn cat(&self, _storage_host: &str, _remote_dir: &str, _file_name: &str) -> Result<Vec<u8>> {
        self.record("cat");
        Ok(self.content.clone())
    }
}

// ─────────────────────────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────────────────────────

/// In-memory catalog and experiment registry
#[derive(Default)]
pub struct FakeGateway {
    catalog: HashMap<(CatalogKind, String), String>,
    launched: RwLock<Vec<ExperimentRequest>>,
    states: RwLock<VecDeque<ExperimentState>>,
    terminated: RwLock<Vec<String>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, kind: CatalogKind, name: &str, id: &str) -> Self {
        self.catalog.insert((kind, name.to_string()), id.to_string());
        self
    }

    /// Queue states returned by successive status reads; the last one repeats
    pub fn push_state(&self, state: ExperimentState) {
        self.states.write().push_back(state);
    }

    pub fn launched(&self) -> Vec<ExperimentRequest> {
        self.launched.read().clone()
    }

    pub fn terminated(&self) -> Vec<String> {
        self.terminated.read().clone()
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn resolve(&self, kind: CatalogKind, name: &str) -> Result<Option<String>> {
        Ok(self.catalog.get(&(kind, name.to_string())).cloned())
    }

    async fn launch_experiment(&self, request: &ExperimentRequest) -> Result<LaunchedExperiment> {
        let mut launched = self.launched.write();
        launched.push(request.clone());
        let id = format!("exp-{}", launched.len());
        Ok(LaunchedExperiment {
            working_dir: Some(format!("/scratch/{}", id)),
            storage_host: Some("store.hpc".to_string()),
            experiment_id: id,
        })
    }

    async fn experiment_state(&self, _experiment_id: &str) -> Result<ExperimentState> {
        let mut states = self.states.write();
        match states.len() {
            0 => Ok(ExperimentState::Created),
            1 => Ok(states[0]),
            _ => Ok(states.pop_front().unwrap_or(ExperimentState::Created)),
        }
    }

    async fn terminate_experiment(&self, experiment_id: &str) -> Result<()> {
        self.terminated.write().push(experiment_id.to_string());
        Ok(())
    }
}
