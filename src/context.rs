//! Session context
//!
//! Everything a Runtime, Task or Plan needs to reach the outside world is
//! carried here and passed in explicitly: caller credentials, the gateway,
//! the agent service, the fallback transport and the plan store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::agent::{
    AgentApi, AgentChannel, AgentClient, CommandRequest, ExecutionResponse, PollPolicy,
    PythonRequest, SubmitResponse,
};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::gateway::{CatalogKind, ExperimentRequest, Gateway, LaunchedExperiment, RestGateway};
use crate::plan::{FilePlanStore, MemoryPlanStore, PlanStore, RestPlanStore};
use crate::runtime::ExperimentState;
use crate::transport::{FileTransport, MountedStorage};

pub use crate::http::Credentials;

/// Gateway names used when resolving a remote submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayProfile {
    pub project: String,
    pub group: String,
    pub storage_resource: String,
}

/// Collaborators and settings shared by every operation of a session
#[derive(Clone)]
pub struct Context {
    credentials: Credentials,
    gateway: Arc<dyn Gateway>,
    agent: Arc<dyn AgentApi>,
    transport: Arc<dyn FileTransport>,
    plan_store: Arc<dyn PlanStore>,
    profile: GatewayProfile,
    agent_server_host: String,
    poll: PollPolicy,
    python_version: String,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Wire the production clients described by a configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let credentials = Credentials::new(
            config.gateway.access_token.clone().unwrap_or_default(),
            config.gateway.username.clone(),
            config.gateway.gateway_id.clone(),
        );
        let timeout = Duration::from_secs(config.gateway.request_timeout_secs);

        let gateway = RestGateway::new(&config.gateway.api_url, &credentials, timeout)?;
        let agent = AgentClient::new(&config.agent.api_url, &credentials, timeout)?;
        let transport = MountedStorage::new(config.mount_root());

        let plan_store: Arc<dyn PlanStore> = match config.plan.store.as_str() {
            "remote" => Arc::new(RestPlanStore::new(&config.gateway.api_url, &credentials, timeout)?),
            _ => Arc::new(FilePlanStore::new(config.plan_store_dir())),
        };
        debug!(store = %config.plan.store, gateway = %config.gateway.api_url, "Context wired");

        Ok(Self::builder()
            .credentials(credentials)
            .gateway(Arc::new(gateway))
            .agent(Arc::new(agent))
            .transport(Arc::new(transport))
            .plan_store(plan_store)
            .profile(GatewayProfile {
                project: config.gateway.project.clone(),
                group: config.gateway.group.clone(),
                storage_resource: config.gateway.storage_resource.clone(),
            })
            .agent_server_host(config.agent.server_host.clone())
            .poll_policy(PollPolicy::new(
                config.agent.poll_interval(),
                config.agent.poll_timeout(),
            ))
            .python_version(config.agent.python_version.clone())
            .build())
    }

    pub fn gateway(&self) -> &dyn Gateway {
        self.gateway.as_ref()
    }

    /// Submit/poll driver over the session's agent service
    pub fn agent_channel(&self) -> AgentChannel<'_> {
        AgentChannel::new(self.agent.as_ref(), self.poll)
    }

    pub fn transport(&self) -> &dyn FileTransport {
        self.transport.as_ref()
    }

    pub fn plan_store(&self) -> &dyn PlanStore {
        self.plan_store.as_ref()
    }

    pub fn profile(&self) -> &GatewayProfile {
        &self.profile
    }

    /// Endpoint a remote job's agent connects back to
    pub fn agent_server_host(&self) -> &str {
        &self.agent_server_host
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    pub fn python_version(&self) -> &str {
        &self.python_version
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("username", &self.credentials.username)
            .field("gateway_id", &self.credentials.gateway_id)
            .field("profile", &self.profile)
            .field("agent_server_host", &self.agent_server_host)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────

/// Builder for [`Context`]
///
/// Collaborators left unset are detached: every call on them fails with
/// [`Error::NotSupported`]. The plan store defaults to an in-memory one.
#[derive(Default)]
pub struct ContextBuilder {
    credentials: Credentials,
    gateway: Option<Arc<dyn Gateway>>,
    agent: Option<Arc<dyn AgentApi>>,
    transport: Option<Arc<dyn FileTransport>>,
    plan_store: Option<Arc<dyn PlanStore>>,
    profile: GatewayProfile,
    agent_server_host: Option<String>,
    poll: PollPolicy,
    python_version: Option<String>,
}

impl ContextBuilder {
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn Gateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn agent(mut self, agent: Arc<dyn AgentApi>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn FileTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn plan_store(mut self, store: Arc<dyn PlanStore>) -> Self {
        self.plan_store = Some(store);
        self
    }

    pub fn profile(mut self, profile: GatewayProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn agent_server_host(mut self, host: impl Into<String>) -> Self {
        self.agent_server_host = Some(host.into());
        self
    }

    pub fn poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn python_version(mut self, version: impl Into<String>) -> Self {
        self.python_version = Some(version.into());
        self
    }

    pub fn build(self) -> Context {
        Context {
            credentials: self.credentials,
            gateway: self.gateway.unwrap_or_else(|| Arc::new(Detached)),
            agent: self.agent.unwrap_or_else(|| Arc::new(Detached)),
            transport: self.transport.unwrap_or_else(|| Arc::new(Detached)),
            plan_store: self
                .plan_store
                .unwrap_or_else(|| Arc::new(MemoryPlanStore::default())),
            profile: self.profile,
            agent_server_host: self.agent_server_host.unwrap_or_default(),
            poll: self.poll,
            python_version: self.python_version.unwrap_or_else(|| "3.10".to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Detached collaborators
// ─────────────────────────────────────────────────────────────────

struct Detached;

fn detached<T>(what: &str) -> Result<T> {
    Err(Error::NotSupported(format!("no {} configured for this session", what)))
}

#[async_trait]
impl Gateway for Detached {
    async fn resolve(&self, _kind: CatalogKind, _name: &str) -> Result<Option<String>> {
        detached("gateway")
    }

    async fn launch_experiment(&self, _request: &ExperimentRequest) -> Result<LaunchedExperiment> {
        detached("gateway")
    }

    async fn experiment_state(&self, _experiment_id: &str) -> Result<ExperimentState> {
        detached("gateway")
    }

    async fn terminate_experiment(&self, _experiment_id: &str) -> Result<()> {
        detached("gateway")
    }
}

#[async_trait]
impl AgentApi for Detached {
    async fn submit_command(&self, _request: &CommandRequest) -> Result<SubmitResponse> {
        detached("agent service")
    }

    async fn command_result(&self, _execution_id: &str) -> Result<ExecutionResponse> {
        detached("agent service")
    }

    async fn submit_python(&self, _request: &PythonRequest) -> Result<SubmitResponse> {
        detached("agent service")
    }

    async fn python_result(&self, _execution_id: &str) -> Result<ExecutionResponse> {
        detached("agent service")
    }
}

#[async_trait]
impl FileTransport for Detached {
    async fn make_dir(&self, _storage_host: &str, _remote_dir: &str) -> Result<()> {
        detached("file transport")
    }

    async fn upload(&self, _storage_host: &str, _local_file: &Path, _remote_dir: &str) -> Result<String> {
        detached("file transport")
    }

    async fn list(&self, _storage_host: &str, _remote_dir: &str) -> Result<Vec<String>> {
        detached("file transport")
    }

    async fn download(
        &self,
        _storage_host: &str,
        _remote_dir: &str,
        _file_name: &str,
        _local_dir: &Path,
    ) -> Result<std::path::PathBuf> {
        detached("file transport")
    }

    async fn cat(&self, _storage_host: &str, _remote_dir: &str, _file_name: &str) -> Result<Vec<u8>> {
        detached("file transport")
    }
}
