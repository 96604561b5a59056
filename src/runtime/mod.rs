//! Execution backends
//!
//! A [`Runtime`] is the backend a task is bound to. Both variants implement
//! the same [`RuntimeOps`] capability set, so tasks and plans never look at
//! which one they hold:
//! - `Mock` simulates a run entirely in process
//! - `Remote` submits through the gateway and talks to the on-node agent

mod mock;
mod remote;
mod state;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::task::Task;

pub use mock::MockRuntime;
pub use remote::{RemoteArgs, RemoteRuntime};
pub use state::*;

// ─────────────────────────────────────────────────────────────────
// Signals
// ─────────────────────────────────────────────────────────────────

/// Signals a caller can deliver to a running task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "SIGTERM")]
    Term,
    #[serde(rename = "SIGINT")]
    Interrupt,
    #[serde(rename = "SIGKILL")]
    Kill,
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Term => "SIGTERM",
            Signal::Interrupt => "SIGINT",
            Signal::Kill => "SIGKILL",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Signal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.strip_prefix("SIG").unwrap_or(&upper) {
            "TERM" => Ok(Signal::Term),
            "INT" => Ok(Signal::Interrupt),
            "KILL" => Ok(Signal::Kill),
            _ => Err(Error::NotSupported(format!("unknown signal '{}'", s))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Capability interface
// ─────────────────────────────────────────────────────────────────

/// Identity assigned to a task by a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub remote_ref: String,
    pub agent_ref: String,
    pub workdir: Option<String>,
    pub sr_host: Option<String>,
}

/// Operations every execution backend provides
///
/// Everything except `execute` expects the task to be launched already;
/// [`Task`] checks that before delegating.
#[async_trait]
pub trait RuntimeOps: Send + Sync {
    /// Discriminator used in persisted plans
    fn id(&self) -> &'static str;

    /// Submit the task and return its new identity
    async fn execute(&self, ctx: &Context, task: &Task) -> Result<Launch>;

    /// Run a script inside the task's environment and return its output
    async fn execute_script(
        &self,
        ctx: &Context,
        packages: &[String],
        code: &str,
        task: &Task,
    ) -> Result<String>;

    async fn status(&self, ctx: &Context, task: &Task) -> Result<ExperimentState>;

    async fn signal(&self, ctx: &Context, signal: Signal, task: &Task) -> Result<()>;

    /// Entries of the task's working directory
    async fn list(&self, ctx: &Context, task: &Task) -> Result<Vec<String>>;

    /// Copy a local file into the working directory, returning its remote path
    async fn upload(&self, ctx: &Context, file: &Path, task: &Task) -> Result<String>;

    /// Copy a working-directory file into `local_dir`, returning the local path
    async fn download(&self, ctx: &Context, file: &str, local_dir: &Path, task: &Task) -> Result<PathBuf>;

    async fn read_file(&self, ctx: &Context, file: &str, task: &Task) -> Result<Vec<u8>>;
}

// ─────────────────────────────────────────────────────────────────
// Runtime
// ─────────────────────────────────────────────────────────────────

/// The backend a task runs on
///
/// Persisted as `{"id": "mock" | "remote", "args": {...}}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "id", content = "args", rename_all = "lowercase")]
pub enum Runtime {
    Mock(MockRuntime),
    Remote(RemoteRuntime),
}

impl Runtime {
    pub fn mock() -> Self {
        Runtime::Mock(MockRuntime::default())
    }

    pub fn remote(args: RemoteArgs) -> Self {
        Runtime::Remote(RemoteRuntime::new(args))
    }

    fn ops(&self) -> &dyn RuntimeOps {
        match self {
            Runtime::Mock(rt) => rt,
            Runtime::Remote(rt) => rt,
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::mock()
    }
}

/// Same variant with the same arguments; session state is not compared
impl PartialEq for Runtime {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Runtime::Mock(_), Runtime::Mock(_)) => true,
            (Runtime::Remote(a), Runtime::Remote(b)) => a.args() == b.args(),
            _ => false,
        }
    }
}

impl Clone for Runtime {
    fn clone(&self) -> Self {
        match self {
            Runtime::Mock(_) => Runtime::mock(),
            Runtime::Remote(rt) => Runtime::remote(rt.args().clone()),
        }
    }
}

#[async_trait]
impl RuntimeOps for Runtime {
    fn id(&self) -> &'static str {
        self.ops().id()
    }

    async fn execute(&self, ctx: &Context, task: &Task) -> Result<Launch> {
        self.ops().execute(ctx, task).await
    }

    async fn execute_script(
        &self,
        ctx: &Context,
        packages: &[String],
        code: &str,
        task: &Task,
    ) -> Result<String> {
        self.ops().execute_script(ctx, packages, code, task).await
    }

    async fn status(&self, ctx: &Context, task: &Task) -> Result<ExperimentState> {
        self.ops().status(ctx, task).await
    }

    async fn signal(&self, ctx: &Context, signal: Signal, task: &Task) -> Result<()> {
        self.ops().signal(ctx, signal, task).await
    }

    async fn list(&self, ctx: &Context, task: &Task) -> Result<Vec<String>> {
        self.ops().list(ctx, task).await
    }

    async fn upload(&self, ctx: &Context, file: &Path, task: &Task) -> Result<String> {
        self.ops().upload(ctx, file, task).await
    }

    async fn download(&self, ctx: &Context, file: &str, local_dir: &Path, task: &Task) -> Result<PathBuf> {
        self.ops().download(ctx, file, local_dir, task).await
    }

    async fn read_file(&self, ctx: &Context, file: &str, task: &Task) -> Result<Vec<u8>> {
        self.ops().read_file(ctx, file, task).await
    }
}
