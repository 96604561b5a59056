//! In-process runtime
//!
//! Simulates a submission without any external resource. Each status read
//! advances a per-instance counter; once it crosses a threshold drawn at
//! launch the run reports `COMPLETED`. Files live in an in-memory scratch
//! working directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::task::Task;
use crate::transport::local_entry;

use super::{ExperimentState, Launch, RuntimeOps, Signal};

/// Fewest status reads before a run completes
const MIN_POLLS: u32 = 2;
/// Spread of the random part of the threshold
const POLL_SPREAD: u32 = 4;

/// Simulated progress of the current submission
#[derive(Debug, Default)]
struct Progress {
    polls: u32,
    threshold: u32,
    cancel_requested: bool,
    finished: Option<ExperimentState>,
    files: BTreeMap<String, Vec<u8>>,
}

/// Runtime that runs nothing
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MockRuntime {
    #[serde(skip)]
    fixed_threshold: Option<u32>,
    #[serde(skip)]
    progress: RwLock<Progress>,
}

impl MockRuntime {
    /// Complete after exactly `polls` status reads
    pub fn with_threshold(polls: u32) -> Self {
        Self {
            fixed_threshold: Some(polls),
            ..Self::default()
        }
    }

    fn draw_threshold(&self) -> u32 {
        self.fixed_threshold.unwrap_or_else(|| {
            let byte = Uuid::new_v4().as_bytes()[0];
            MIN_POLLS + u32::from(byte) % POLL_SPREAD
        })
    }
}

fn scratch_dir(remote_ref: &str) -> String {
    format!("/mock/{}", remote_ref)
}

#[async_trait]
impl RuntimeOps for MockRuntime {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn execute(&self, _ctx: &Context, task: &Task) -> Result<Launch> {
        let threshold = self.draw_threshold();
        *self.progress.write() = Progress {
            threshold,
            ..Progress::default()
        };

        let remote_ref = format!("mock-{}", Uuid::new_v4());
        info!(task = %task.name(), remote_ref = %remote_ref, threshold, "Mock task launched");
        Ok(Launch {
            workdir: Some(scratch_dir(&remote_ref)),
            sr_host: Some("localhost".to_string()),
            agent_ref: Uuid::new_v4().to_string(),
            remote_ref,
        })
    }

    async fn execute_script(
        &self,
        _ctx: &Context,
        _packages: &[String],
        _code: &str,
        task: &Task,
    ) -> Result<String> {
        debug!(task = %task.name(), "Mock script execution skipped");
        Ok(String::new())
    }

    async fn status(&self, _ctx: &Context, task: &Task) -> Result<ExperimentState> {
        let mut progress = self.progress.write();
        if let Some(state) = progress.finished {
            return Ok(state);
        }

        progress.polls += 1;
        let state = if progress.cancel_requested {
            progress.finished = Some(ExperimentState::Canceled);
            ExperimentState::Canceling
        } else if progress.polls >= progress.threshold {
            progress.finished = Some(ExperimentState::Completed);
            ExperimentState::Completed
        } else {
            ExperimentState::Executing
        };
        debug!(task = %task.name(), polls = progress.polls, %state, "Mock status");
        Ok(state)
    }

    async fn signal(&self, _ctx: &Context, signal: Signal, task: &Task) -> Result<()> {
        let mut progress = self.progress.write();
        if progress.finished.is_none() && !progress.cancel_requested {
            progress.cancel_requested = true;
            info!(task = %task.name(), %signal, "Mock task signalled");
        }
        Ok(())
    }

    async fn list(&self, _ctx: &Context, _task: &Task) -> Result<Vec<String>> {
        Ok(self.progress.read().files.keys().cloned().collect())
    }

    async fn upload(&self, _ctx: &Context, file: &Path, task: &Task) -> Result<String> {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::NotSupported(format!("'{}' has no file name", file.display())))?
            .to_string();
        let bytes = fs::read(file).await.map_err(|e| Error::IoRead {
            path: file.to_path_buf(),
            source: e,
        })?;

        self.progress.write().files.insert(name.clone(), bytes);
        let workdir = task.workdir().unwrap_or("/mock");
        Ok(format!("{}/{}", workdir, name))
    }

    async fn download(&self, ctx: &Context, file: &str, local_dir: &Path, task: &Task) -> Result<PathBuf> {
        let target = local_entry(local_dir, file)?;
        let bytes = self.read_file(ctx, file, task).await?;
        fs::create_dir_all(local_dir).await.map_err(|e| Error::IoWrite {
            path: local_dir.to_path_buf(),
            source: e,
        })?;

        fs::write(&target, bytes).await.map_err(|e| Error::IoWrite {
            path: target.clone(),
            source: e,
        })?;
        Ok(target)
    }

    async fn read_file(&self, _ctx: &Context, file: &str, task: &Task) -> Result<Vec<u8>> {
        self.progress.read().files.get(file).cloned().ok_or_else(|| Error::IoRead {
            path: PathBuf::from(task.workdir().unwrap_or("/mock")).join(file),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file in scratch directory"),
        })
    }
}
