//! Gateway-backed runtime
//!
//! Submissions go through the gateway's experiment API. Once the job runs,
//! its agent answers file and script requests; while the agent is not
//! connected, file requests are served by the fallback transport instead.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{AgentOutcome, PythonRequest};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::gateway::{CatalogKind, ExperimentRequest};
use crate::task::{InputValue, Task};

use super::{ExperimentState, Launch, RuntimeOps, Signal};

/// Input carrying the agent correlation id into the job
pub const AGENT_ID_INPUT: &str = "agent_id";
/// Input carrying the endpoint the job's agent connects back to
pub const SERVER_URL_INPUT: &str = "server_url";

/// Placement of a remote submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArgs {
    /// Compute resource name in the gateway catalog
    pub cluster: String,
    /// Resource category, e.g. `cpu` or `gpu`
    pub category: String,
    pub queue_name: String,
    pub node_count: u32,
    pub cpu_count: u32,
    /// Minutes
    pub walltime: u32,
}

/// Runtime that submits through the gateway
#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteRuntime {
    #[serde(flatten)]
    args: RemoteArgs,
    #[serde(skip)]
    signalled: RwLock<HashSet<String>>,
}

impl RemoteRuntime {
    pub fn new(args: RemoteArgs) -> Self {
        Self {
            args,
            signalled: RwLock::new(HashSet::new()),
        }
    }

    pub fn args(&self) -> &RemoteArgs {
        &self.args
    }
}

/// Identity of a launched remote task, as the agent and transport need it
struct Placement<'t> {
    experiment: &'t str,
    agent_ref: &'t str,
    workdir: &'t str,
}

fn placement<'t>(task: &'t Task, operation: &'static str) -> Result<Placement<'t>> {
    let not_launched = || Error::not_launched(task.name(), operation);
    let experiment = task.remote_ref().ok_or_else(not_launched)?;
    let agent_ref = task.agent_ref().ok_or_else(not_launched)?;
    let workdir = task.workdir().ok_or_else(|| Error::Precondition {
        task: task.name().to_string(),
        operation,
        reason: "working directory is unknown",
    })?;
    Ok(Placement {
        experiment,
        agent_ref,
        workdir,
    })
}

fn storage_host<'t>(task: &'t Task, operation: &'static str) -> Result<&'t str> {
    task.sr_host().ok_or_else(|| Error::Precondition {
        task: task.name().to_string(),
        operation,
        reason: "storage host is unknown",
    })
}

async fn resolve(ctx: &Context, task: &Task, kind: CatalogKind, name: &str) -> Result<String> {
    ctx.gateway()
        .resolve(kind, name)
        .await?
        .ok_or_else(|| Error::submission(task.name(), format!("{} '{}' not found in catalog", kind, name)))
}

/// Python string literal for an arbitrary value
fn py_literal(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn upload_snippet(file_name: &str, payload: &[u8]) -> Result<String> {
    Ok(format!(
        "import base64, pathlib\n\
         pathlib.Path({name}).write_bytes(base64.b64decode({data}))\n\
         print({name})\n",
        name = py_literal(file_name)?,
        data = py_literal(&BASE64.encode(payload))?,
    ))
}

fn download_snippet(file_name: &str) -> Result<String> {
    Ok(format!(
        "import base64, pathlib\n\
         print(base64.b64encode(pathlib.Path({name}).read_bytes()).decode())\n",
        name = py_literal(file_name)?,
    ))
}

fn file_name_of(file: &Path) -> Result<&str> {
    file.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::NotSupported(format!("'{}' has no file name", file.display())))
}

impl RemoteRuntime {
    async fn run_python(
        &self,
        ctx: &Context,
        at: &Placement<'_>,
        libraries: Vec<String>,
        code: String,
    ) -> Result<AgentOutcome<String>> {
        let request = PythonRequest {
            agent_id: at.agent_ref.to_string(),
            working_dir: at.workdir.to_string(),
            libraries,
            code,
            python_version: ctx.python_version().to_string(),
            keep_alive: false,
            parent_experiment_id: at.experiment.to_string(),
        };
        ctx.agent_channel().run_python(&request).await
    }
}

#[async_trait]
impl RuntimeOps for RemoteRuntime {
    fn id(&self) -> &'static str {
        "remote"
    }

    async fn execute(&self, ctx: &Context, task: &Task) -> Result<Launch> {
        let profile = ctx.profile();
        let project_id = resolve(ctx, task, CatalogKind::Project, &profile.project).await?;
        let application_id = resolve(ctx, task, CatalogKind::Application, task.app_id()).await?;
        let compute_resource_id = resolve(ctx, task, CatalogKind::ComputeResource, &self.args.cluster).await?;
        let storage_resource_id =
            resolve(ctx, task, CatalogKind::StorageResource, &profile.storage_resource).await?;
        let group_profile_id = resolve(ctx, task, CatalogKind::GroupProfile, &profile.group).await?;

        let agent_ref = Uuid::new_v4().to_string();
        let mut inputs = task.inputs().clone();
        inputs.insert(AGENT_ID_INPUT.to_string(), InputValue::from(agent_ref.as_str()));
        inputs.insert(SERVER_URL_INPUT.to_string(), InputValue::from(ctx.agent_server_host()));

        let request = ExperimentRequest {
            experiment_name: task.name().to_string(),
            project_id,
            application_id,
            compute_resource_id,
            storage_resource_id,
            group_profile_id,
            category: self.args.category.clone(),
            queue: self.args.queue_name.clone(),
            node_count: self.args.node_count,
            cpu_count: self.args.cpu_count,
            wall_time: self.args.walltime,
            inputs,
        };

        let launched = ctx.gateway().launch_experiment(&request).await?;
        info!(
            task = %task.name(),
            experiment = %launched.experiment_id,
            cluster = %self.args.cluster,
            queue = %self.args.queue_name,
            "Remote task submitted"
        );

        Ok(Launch {
            remote_ref: launched.experiment_id,
            agent_ref,
            workdir: launched.working_dir,
            sr_host: launched
                .storage_host
                .or_else(|| Some(profile.storage_resource.clone())),
        })
    }

    async fn execute_script(
        &self,
        ctx: &Context,
        packages: &[String],
        code: &str,
        task: &Task,
    ) -> Result<String> {
        let at = placement(task, "execute_script")?;
        match self.run_python(ctx, &at, packages.to_vec(), code.to_string()).await? {
            AgentOutcome::Completed(output) => Ok(output),
            AgentOutcome::Unreachable => Err(Error::AgentUnavailable {
                agent_ref: at.agent_ref.to_string(),
                operation: "script execution".to_string(),
            }),
        }
    }

    async fn status(&self, ctx: &Context, task: &Task) -> Result<ExperimentState> {
        let experiment = task
            .remote_ref()
            .ok_or_else(|| Error::not_launched(task.name(), "status"))?;
        ctx.gateway().experiment_state(experiment).await
    }

    async fn signal(&self, ctx: &Context, signal: Signal, task: &Task) -> Result<()> {
        let experiment = task
            .remote_ref()
            .ok_or_else(|| Error::not_launched(task.name(), "signal"))?;

        if self.signalled.read().contains(experiment) {
            debug!(task = %task.name(), experiment = %experiment, %signal, "Already signalled");
            return Ok(());
        }

        ctx.gateway().terminate_experiment(experiment).await?;
        self.signalled.write().insert(experiment.to_string());
        info!(task = %task.name(), experiment = %experiment, %signal, "Remote task signalled");
        Ok(())
    }

    async fn list(&self, ctx: &Context, task: &Task) -> Result<Vec<String>> {
        let at = placement(task, "list")?;
        let outcome = ctx
            .agent_channel()
            .run_command(at.agent_ref, at.workdir, vec!["ls".into(), "-1A".into()])
            .await?;

        match outcome {
            AgentOutcome::Completed(listing) => Ok(listing
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect()),
            AgentOutcome::Unreachable => {
                warn!(task = %task.name(), "Listing through fallback transport");
                ctx.transport().list(storage_host(task, "list")?, at.workdir).await
            }
        }
    }

    async fn upload(&self, ctx: &Context, file: &Path, task: &Task) -> Result<String> {
        let at = placement(task, "upload")?;
        let name = file_name_of(file)?;
        let payload = fs::read(file).await.map_err(|e| Error::IoRead {
            path: file.to_path_buf(),
            source: e,
        })?;

        let code = upload_snippet(name, &payload)?;
        match self.run_python(ctx, &at, Vec::new(), code).await? {
            AgentOutcome::Completed(_) => Ok(format!("{}/{}", at.workdir.trim_end_matches('/'), name)),
            AgentOutcome::Unreachable => {
                warn!(task = %task.name(), file = %name, "Uploading through fallback transport");
                ctx.transport()
                    .upload(storage_host(task, "upload")?, file, at.workdir)
                    .await
            }
        }
    }

    async fn download(&self, ctx: &Context, file: &str, local_dir: &Path, task: &Task) -> Result<PathBuf> {
        let at = placement(task, "download")?;

        let encoded = match self.run_python(ctx, &at, Vec::new(), download_snippet(file)?).await? {
            AgentOutcome::Completed(encoded) => encoded,
            AgentOutcome::Unreachable => {
                warn!(task = %task.name(), file = %file, "Downloading through fallback transport");
                return ctx
                    .transport()
                    .download(storage_host(task, "download")?, at.workdir, file, local_dir)
                    .await;
            }
        };

        let bytes = BASE64.decode(encoded.trim()).map_err(|e| Error::ProtocolMalformed {
            message: format!("agent returned an undecodable payload for '{}': {}", file, e),
        })?;

        fs::create_dir_all(local_dir).await.map_err(|e| Error::IoWrite {
            path: local_dir.to_path_buf(),
            source: e,
        })?;
        let target = local_dir.join(file_name_of(Path::new(file))?);
        fs::write(&target, bytes).await.map_err(|e| Error::IoWrite {
            path: target.clone(),
            source: e,
        })?;
        Ok(target)
    }

    async fn read_file(&self, ctx: &Context, file: &str, task: &Task) -> Result<Vec<u8>> {
        let at = placement(task, "read_file")?;
        let outcome = ctx
            .agent_channel()
            .run_command(at.agent_ref, at.workdir, vec!["cat".into(), file.to_string()])
            .await?;

        match outcome {
            AgentOutcome::Completed(content) => Ok(content.into_bytes()),
            AgentOutcome::Unreachable => {
                warn!(task = %task.name(), file = %file, "Reading through fallback transport");
                ctx.transport()
                    .cat(storage_host(task, "read_file")?, at.workdir, file)
                    .await
            }
        }
    }
}
