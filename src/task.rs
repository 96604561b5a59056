//! Tasks
//!
//! A task is one application run bound to exactly one [`Runtime`]. It owns
//! the identifiers assigned at launch and checks them before delegating any
//! other operation to the runtime.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::progress::{self, TransferProgress};
use crate::runtime::{ExperimentState, Runtime, RuntimeOps, Signal};

/// Value of a named application input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Text(value.to_string())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        InputValue::Text(value)
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Bool(value)
    }
}

impl From<i64> for InputValue {
    fn from(value: i64) -> Self {
        InputValue::Int(value)
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        InputValue::Float(value)
    }
}

impl From<Vec<String>> for InputValue {
    fn from(value: Vec<String>) -> Self {
        InputValue::List(value)
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Bool(v) => write!(f, "{}", v),
            InputValue::Int(v) => write!(f, "{}", v),
            InputValue::Float(v) => write!(f, "{}", v),
            InputValue::Text(v) => f.write_str(v),
            InputValue::List(v) => f.write_str(&v.join(",")),
        }
    }
}

/// One submitted unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    name: String,
    app_id: String,
    #[serde(default)]
    inputs: BTreeMap<String, InputValue>,
    runtime: Runtime,
    #[serde(rename = "ref", default)]
    remote_ref: Option<String>,
    #[serde(default)]
    agent_ref: Option<String>,
    #[serde(default)]
    workdir: Option<String>,
    #[serde(default)]
    sr_host: Option<String>,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        app_id: impl Into<String>,
        inputs: BTreeMap<String, InputValue>,
        runtime: Runtime,
    ) -> Self {
        Self {
            name: name.into(),
            app_id: app_id.into(),
            inputs,
            runtime,
            remote_ref: None,
            agent_ref: None,
            workdir: None,
            sr_host: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn inputs(&self) -> &BTreeMap<String, InputValue> {
        &self.inputs
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Backend job id, set once launched
    pub fn remote_ref(&self) -> Option<&str> {
        self.remote_ref.as_deref()
    }

    /// Agent correlation id, set together with `remote_ref`
    pub fn agent_ref(&self) -> Option<&str> {
        self.agent_ref.as_deref()
    }

    pub fn workdir(&self) -> Option<&str> {
        self.workdir.as_deref()
    }

    pub fn sr_host(&self) -> Option<&str> {
        self.sr_host.as_deref()
    }

    pub fn is_launched(&self) -> bool {
        self.remote_ref.is_some()
    }

    fn require_launched(&self, operation: &'static str) -> Result<()> {
        if self.is_launched() {
            Ok(())
        } else {
            Err(Error::not_launched(&self.name, operation))
        }
    }

    /// Submit the task, returning its remote reference
    ///
    /// Without `force` an already launched task is left as is. With `force`
    /// the previous identity is discarded and the task is submitted afresh.
    pub async fn launch(&mut self, ctx: &Context, force: bool) -> Result<&str> {
        if self.is_launched() && !force {
            debug!(task = %self.name, remote_ref = ?self.remote_ref, "Already launched");
            return self
                .remote_ref
                .as_deref()
                .ok_or_else(|| Error::Internal("launched task lost its reference".into()));
        }

        self.remote_ref = None;
        self.agent_ref = None;
        self.workdir = None;
        self.sr_host = None;

        let launch = self.runtime.execute(ctx, self).await?;
        info!(
            task = %self.name,
            runtime = self.runtime.id(),
            remote_ref = %launch.remote_ref,
            "Task launched"
        );

        self.agent_ref = Some(launch.agent_ref);
        self.workdir = launch.workdir;
        self.sr_host = launch.sr_host;
        Ok(self.remote_ref.insert(launch.remote_ref).as_str())
    }

    pub async fn status(&self, ctx: &Context) -> Result<ExperimentState> {
        self.require_launched("status")?;
        self.runtime.status(ctx, self).await
    }

    pub async fn signal(&self, ctx: &Context, signal: Signal) -> Result<()> {
        self.require_launched("signal")?;
        self.runtime.signal(ctx, signal, self).await
    }

    /// Ask the backend to cancel the run
    pub async fn stop(&self, ctx: &Context) -> Result<()> {
        self.signal(ctx, Signal::Term).await
    }

    pub async fn list(&self, ctx: &Context) -> Result<Vec<String>> {
        self.require_launched("list")?;
        self.runtime.list(ctx, self).await
    }

    pub async fn upload(&self, ctx: &Context, file: &Path) -> Result<String> {
        self.require_launched("upload")?;
        self.runtime.upload(ctx, file, self).await
    }

    pub async fn download(&self, ctx: &Context, file: &str, local_dir: &Path) -> Result<PathBuf> {
        self.require_launched("download")?;
        self.runtime.download(ctx, file, local_dir, self).await
    }

    pub async fn read_file(&self, ctx: &Context, file: &str) -> Result<Vec<u8>> {
        self.require_launched("read_file")?;
        self.runtime.read_file(ctx, file, self).await
    }

    pub async fn execute_script(&self, ctx: &Context, packages: &[String], code: &str) -> Result<String> {
        self.require_launched("execute_script")?;
        self.runtime.execute_script(ctx, packages, code, self).await
    }

    /// Download every file of the working directory, one after another
    pub async fn download_all(&self, ctx: &Context, local_dir: &Path) -> Result<Vec<PathBuf>> {
        let names = self.list(ctx).await?;
        let bar = TransferProgress::new(&self.name, names.len(), progress::interactive());

        let mut paths = Vec::with_capacity(names.len());
        for name in &names {
            bar.start_file(name);
            paths.push(self.download(ctx, name, local_dir).await?);
            bar.file_done();
        }
        bar.finish();

        info!(task = %self.name, files = paths.len(), dir = %local_dir.display(), "Downloaded working directory");
        Ok(paths)
    }
}
