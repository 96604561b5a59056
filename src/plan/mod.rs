//! Plans
//!
//! An ordered set of tasks sharing one workflow:
//! prepare → confirm → launch → poll/wait → stop → fetch.
//! Every stage walks the tasks strictly in list order and can be called on
//! its own. Plans round-trip through a JSON document and a [`PlanStore`].

mod store;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::progress::{self, StatusBoard};
use crate::runtime::{ExperimentState, RuntimeOps};
use crate::task::Task;
use crate::transport::local_entry;

pub use store::{FilePlanStore, MemoryPlanStore, PlanStore, RestPlanStore};

/// File name of the snapshot written by [`Plan::fetch`]
pub const SNAPSHOT_FILE: &str = "plan.json";

// ─────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────

/// Workflow stage of [`Plan::launch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prepare,
    Confirm,
    Launch,
    Save,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Prepare => "prepare",
            Stage::Confirm => "confirm",
            Stage::Launch => "launch",
            Stage::Save => "save",
        })
    }
}

/// Where a plan launch stopped and why
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    /// Task being launched when the failure happened
    pub task: Option<String>,
    pub error: Error,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.task {
            Some(task) => write!(f, "{} stage failed for task '{}': {}", self.stage, task, self.error),
            None => write!(f, "{} stage failed: {}", self.stage, self.error),
        }
    }
}

/// Outcome of [`Plan::launch`]
///
/// Tasks launched before a failure stay launched.
#[derive(Debug, Default)]
pub struct LaunchReport {
    /// Names of the tasks that hold a remote reference after the run
    pub launched: Vec<String>,
    pub failure: Option<StageFailure>,
}

impl LaunchReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Outcome of [`Plan::wait_for_completion`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Every task reached a terminal state
    Completed {
        rounds: u32,
        statuses: Vec<(String, ExperimentState)>,
    },
    /// The shutdown future resolved first; remote tasks keep running
    Interrupted { rounds: u32 },
}

// ─────────────────────────────────────────────────────────────────
// Plan
// ─────────────────────────────────────────────────────────────────

/// Ordered tasks with an identity assigned on first save
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    tasks: Vec<Task>,
}

impl Plan {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { id: None, tasks }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    // ─────────────────────────────────────────────────────────────
    // Stages
    // ─────────────────────────────────────────────────────────────

    /// Pre-flight hook
    pub async fn prepare(&self, _ctx: &Context) -> Result<()> {
        debug!(tasks = self.tasks.len(), "Plan prepared");
        Ok(())
    }

    /// Ask on the terminal before launching, unless `silent`
    pub fn confirm(&self, silent: bool) -> Result<()> {
        if silent {
            return Ok(());
        }
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        self.confirm_with(stdin.lock(), stdout.lock())
    }

    /// Prompt on `writer` and read the answer from `reader`
    ///
    /// An empty answer, `y` or `yes` (any case) proceeds. Anything else,
    /// end of input included, aborts.
    pub fn confirm_with<R: BufRead, W: Write>(&self, mut reader: R, mut writer: W) -> Result<()> {
        writeln!(writer, "Plan with {} task(s):", self.tasks.len())?;
        for task in &self.tasks {
            writeln!(writer, "  {} ({}, {} runtime)", task.name(), task.app_id(), task.runtime().id())?;
        }
        write!(writer, "Launch? [Y/n] ")?;
        writer.flush()?;

        let mut answer = String::new();
        if reader.read_line(&mut answer)? == 0 {
            return Err(Error::Aborted("no answer on standard input".into()));
        }

        match answer.trim().to_ascii_lowercase().as_str() {
            "" | "y" | "yes" => Ok(()),
            other => Err(Error::Aborted(format!("user answered '{}'", other))),
        }
    }

    /// Launch every task in order, stopping at the first failure
    pub async fn launch_tasks(&mut self, ctx: &Context, force: bool) -> Result<()> {
        self.launch_each(ctx, force).await.map_err(|(_, e)| e)
    }

    async fn launch_each(&mut self, ctx: &Context, force: bool) -> std::result::Result<(), (String, Error)> {
        for task in &mut self.tasks {
            if let Err(e) = task.launch(ctx, force).await {
                return Err((task.name().to_string(), e));
            }
        }
        Ok(())
    }

    /// `(remote_ref, state)` of every task, in list order
    pub async fn poll_statuses(&self, ctx: &Context) -> Result<Vec<(String, ExperimentState)>> {
        let mut statuses = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            let state = task.status(ctx).await?;
            statuses.push((task.remote_ref().unwrap_or_default().to_string(), state));
        }
        Ok(statuses)
    }

    /// Poll every `interval` until all tasks are terminal or `shutdown` resolves
    ///
    /// Interruption only stops watching; nothing is cancelled remotely.
    pub async fn wait_for_completion<F>(&self, ctx: &Context, interval: Duration, shutdown: F) -> Result<WaitOutcome>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let board = StatusBoard::new(
            self.tasks.iter().map(|t| t.name().to_string()).collect(),
            progress::interactive(),
        );
        let mut rounds = 0;

        loop {
            let statuses = tokio::select! {
                statuses = self.poll_statuses(ctx) => statuses?,
                _ = &mut shutdown => break,
            };
            rounds += 1;

            for (index, (remote_ref, state)) in statuses.iter().enumerate() {
                board.update(index, remote_ref, *state);
            }
            let pending = statuses.iter().filter(|(_, s)| !s.is_terminal()).count();
            debug!(round = rounds, pending, "Plan status polled");

            if pending == 0 {
                board.finish();
                info!(rounds, tasks = statuses.len(), "All tasks finished");
                return Ok(WaitOutcome::Completed { rounds, statuses });
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => break,
            }
        }

        board.finish();
        info!(rounds, "Stopped waiting for plan");
        Ok(WaitOutcome::Interrupted { rounds })
    }

    /// Signal every task to stop, then save
    pub async fn stop(&mut self, ctx: &Context) -> Result<()> {
        for task in &self.tasks {
            task.stop(ctx).await?;
        }
        info!(tasks = self.tasks.len(), "Plan stopped");
        self.save(ctx).await.map(|_| ())
    }

    /// Download every task's files under `local_dir/<task name>` and write
    /// a snapshot of the plan to `local_dir/plan.json`
    pub async fn fetch(&self, ctx: &Context, local_dir: &Path) -> Result<BTreeMap<String, Vec<PathBuf>>> {
        let mut fetched = BTreeMap::new();
        for task in &self.tasks {
            let task_dir = local_entry(local_dir, task.name())?;
            let files = task.download_all(ctx, &task_dir).await?;
            fetched.insert(task.name().to_string(), files);
        }

        std::fs::create_dir_all(local_dir).map_err(|e| Error::IoWrite {
            path: local_dir.to_path_buf(),
            source: e,
        })?;
        self.write_to(&local_dir.join(SNAPSHOT_FILE))?;
        info!(dir = %local_dir.display(), tasks = fetched.len(), "Plan fetched");
        Ok(fetched)
    }

    /// Run prepare → confirm → launch → save, recording the first failure
    pub async fn launch(&mut self, ctx: &Context, silent: bool) -> LaunchReport {
        self.launch_with(ctx, silent, true).await
    }

    /// [`Plan::launch`] with control over re-launching launched tasks
    pub async fn launch_with(&mut self, ctx: &Context, silent: bool, force: bool) -> LaunchReport {
        let mut failure = None;

        if let Err(error) = self.prepare(ctx).await {
            failure = Some(StageFailure {
                stage: Stage::Prepare,
                task: None,
                error,
            });
        } else if let Err(error) = self.confirm(silent) {
            failure = Some(StageFailure {
                stage: Stage::Confirm,
                task: None,
                error,
            });
        } else if let Err((task, error)) = self.launch_each(ctx, force).await {
            failure = Some(StageFailure {
                stage: Stage::Launch,
                task: Some(task),
                error,
            });
        }

        let attempted_launch = !matches!(
            failure,
            Some(StageFailure {
                stage: Stage::Prepare | Stage::Confirm,
                ..
            })
        );
        if attempted_launch {
            if let Err(error) = self.save(ctx).await {
                if failure.is_none() {
                    failure = Some(StageFailure {
                        stage: Stage::Save,
                        task: None,
                        error,
                    });
                } else {
                    warn!(error = %error.format_for_log(), "Plan could not be saved after failed launch");
                }
            }
        }

        if let Some(ref f) = failure {
            error!(
                stage = %f.stage,
                task = f.task.as_deref().unwrap_or("-"),
                error = %f.error.format_for_log(),
                "Plan launch incomplete"
            );
        }

        LaunchReport {
            launched: self
                .tasks
                .iter()
                .filter(|t| t.is_launched())
                .map(|t| t.name().to_string())
                .collect(),
            failure,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────

    /// Store the plan, minting its id on the first save
    pub async fn save(&mut self, ctx: &Context) -> Result<&str> {
        let store = ctx.plan_store();
        match self.id.clone() {
            Some(id) => {
                store.update(&id, self).await?;
                debug!(id = %id, "Plan saved");
            }
            None => {
                let id = store.create(self).await?;
                info!(id = %id, "Plan saved for the first time");
                self.id = Some(id);
            }
        }
        self.id
            .as_deref()
            .ok_or_else(|| Error::Internal("saved plan has no id".into()))
    }

    pub async fn load(ctx: &Context, id: &str) -> Result<Plan> {
        ctx.plan_store().load(id).await
    }

    pub async fn query(ctx: &Context) -> Result<Vec<Plan>> {
        ctx.plan_store().query().await
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Plan> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?).map_err(|e| Error::IoWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn read_from(path: &Path) -> Result<Plan> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RemoteArgs, Runtime};
    use crate::task::InputValue;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn mock_plan(names: &[&str], polls: u32) -> Plan {
        Plan::new(
            names
                .iter()
                .map(|name| Task::new(*name, "Echo", BTreeMap::new(), Runtime::Mock(MockRuntime::with_threshold(polls))))
                .collect(),
        )
    }

    fn confirm(plan: &Plan, input: &str) -> Result<()> {
        let mut out = Vec::new();
        plan.confirm_with(Cursor::new(input.as_bytes()), &mut out)
    }

    #[test]
    fn test_confirm_answers() {
        let plan = mock_plan(&["A"], 1);
        assert!(confirm(&plan, "\n").is_ok());
        assert!(confirm(&plan, "Y\n").is_ok());
        assert!(confirm(&plan, "yes\n").is_ok());
        assert!(matches!(confirm(&plan, "n\n"), Err(Error::Aborted(_))));
        assert!(matches!(confirm(&plan, "maybe\n"), Err(Error::Aborted(_))));
        assert!(matches!(confirm(&plan, ""), Err(Error::Aborted(_))));
    }

    #[test]
    fn test_confirm_lists_tasks() {
        let plan = mock_plan(&["A", "B"], 1);
        let mut out = Vec::new();
        plan.confirm_with(Cursor::new(b"y\n".as_slice()), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("2 task(s)"));
        assert!(text.contains("  B (Echo, mock runtime)"));
    }

    #[tokio::test]
    async fn test_two_mock_tasks_end_to_end() {
        let ctx = Context::builder().build();
        let mut plan = mock_plan(&["A", "B"], 3);

        plan.launch_tasks(&ctx, true).await.unwrap();
        assert!(plan.tasks().iter().all(|t| t.remote_ref().is_some()));

        let outcome = plan
            .wait_for_completion(&ctx, Duration::from_millis(1), std::future::pending())
            .await
            .unwrap();
        match outcome {
            WaitOutcome::Completed { rounds, statuses } => {
                assert_eq!(rounds, 3);
                assert!(statuses.iter().all(|(_, s)| *s == ExperimentState::Completed));
                assert_eq!(statuses[0].0, plan.tasks()[0].remote_ref().unwrap());
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let dir = TempDir::new().unwrap();
        plan.fetch(&ctx, dir.path()).await.unwrap();
        let snapshot = std::fs::read_to_string(dir.path().join(SNAPSHOT_FILE)).unwrap();
        assert!(snapshot.contains("\"A\""));
        assert!(snapshot.contains("\"B\""));
    }

    #[tokio::test]
    async fn test_fetch_keeps_task_dirs_inside_target() {
        let ctx = Context::builder().build();
        let mut plan = mock_plan(&["../escaped"], 1);
        plan.launch_tasks(&ctx, true).await.unwrap();

        let root = TempDir::new().unwrap();
        let input = root.path().join("x.txt");
        std::fs::write(&input, "data").unwrap();
        plan.tasks()[0].upload(&ctx, &input).await.unwrap();

        let out = root.path().join("out");
        let err = plan.fetch(&ctx, &out).await.unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
        assert!(!root.path().join("escaped").exists());
        assert!(!out.join(SNAPSHOT_FILE).exists());
    }

    #[tokio::test]
    async fn test_wait_interrupted_by_shutdown() {
        let ctx = Context::builder().build();
        let mut plan = mock_plan(&["A"], 1000);
        plan.launch_tasks(&ctx, true).await.unwrap();

        let outcome = plan
            .wait_for_completion(&ctx, Duration::from_secs(3600), async {})
            .await
            .unwrap();
        assert!(matches!(outcome, WaitOutcome::Interrupted { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_stops_at_deadline() {
        let ctx = Context::builder().build();
        let mut plan = mock_plan(&["A"], 1000);
        plan.launch_tasks(&ctx, true).await.unwrap();

        let outcome = plan
            .wait_for_completion(
                &ctx,
                Duration::from_secs(60),
                tokio::time::sleep(Duration::from_secs(150)),
            )
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Interrupted { rounds: 3 });
    }

    #[tokio::test]
    async fn test_poll_before_launch_fails() {
        let ctx = Context::builder().build();
        let plan = mock_plan(&["A"], 1);
        assert!(matches!(plan.poll_statuses(&ctx).await, Err(Error::Precondition { .. })));
    }

    #[tokio::test]
    async fn test_launch_reports_partial_failure() {
        let ctx = Context::builder().build();
        let mut plan = mock_plan(&["A"], 1);
        plan.add_task(Task::new(
            "B",
            "Gaussian",
            BTreeMap::new(),
            Runtime::remote(RemoteArgs {
                cluster: "expanse".into(),
                category: "cpu".into(),
                queue_name: "shared".into(),
                node_count: 1,
                cpu_count: 4,
                walltime: 10,
            }),
        ));
        plan.add_task(Task::new("C", "Echo", BTreeMap::new(), Runtime::mock()));

        let report = plan.launch(&ctx, true).await;
        assert!(!report.is_success());
        assert_eq!(report.launched, vec!["A".to_string()]);

        let failure = report.failure.unwrap();
        assert_eq!(failure.stage, Stage::Launch);
        assert_eq!(failure.task.as_deref(), Some("B"));
        assert!(plan.tasks()[0].is_launched());
        assert!(plan.id().is_some(), "plan is still saved after a failed launch");
    }

    #[tokio::test]
    async fn test_launch_success_saves_plan() {
        let ctx = Context::builder().build();
        let mut plan = mock_plan(&["A", "B"], 1);

        let report = plan.launch(&ctx, true).await;
        assert!(report.is_success());
        assert_eq!(report.launched.len(), 2);

        let id = plan.id().unwrap().to_string();
        let stored = Plan::load(&ctx, &id).await.unwrap();
        assert_eq!(stored.tasks()[1].remote_ref(), plan.tasks()[1].remote_ref());

        plan.save(&ctx).await.unwrap();
        assert_eq!(plan.id(), Some(id.as_str()));
        assert_eq!(Plan::query(&ctx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_cancels_and_saves() {
        let ctx = Context::builder().build();
        let mut plan = mock_plan(&["A"], 1000);
        plan.launch_tasks(&ctx, true).await.unwrap();

        plan.stop(&ctx).await.unwrap();
        assert!(plan.id().is_some());
        assert_eq!(plan.tasks()[0].status(&ctx).await.unwrap(), ExperimentState::Canceling);
        assert_eq!(plan.tasks()[0].status(&ctx).await.unwrap(), ExperimentState::Canceled);
    }

    #[test]
    fn test_document_round_trip() {
        let mut inputs = BTreeMap::new();
        inputs.insert("basis".to_string(), InputValue::from("6-31G"));
        inputs.insert("charge".to_string(), InputValue::from(0_i64));
        let mut plan = mock_plan(&["A"], 1);
        plan.add_task(Task::new(
            "B",
            "Gaussian",
            inputs,
            Runtime::remote(RemoteArgs {
                cluster: "expanse".into(),
                category: "gpu".into(),
                queue_name: "gpu-shared".into(),
                node_count: 2,
                cpu_count: 8,
                walltime: 120,
            }),
        ));

        let loaded = Plan::from_json(&plan.to_json().unwrap()).unwrap();
        assert_eq!(loaded, plan);
        for (a, b) in loaded.tasks().iter().zip(plan.tasks()) {
            assert_eq!(a.runtime().id(), b.runtime().id());
            assert_eq!(a.runtime(), b.runtime());
        }
    }

    #[test]
    fn test_reads_external_document() {
        let json = r#"{
            "id": null,
            "tasks": [{
                "name": "A",
                "app_id": "NAMD",
                "inputs": {"steps": 500, "files": ["a.pdb", "a.psf"]},
                "runtime": {"id": "remote", "args": {
                    "cluster": "anvil", "category": "cpu", "queue_name": "wholenode",
                    "node_count": 1, "cpu_count": 128, "walltime": 60
                }},
                "ref": "exp-7",
                "agent_ref": "ag-7",
                "workdir": "/scratch/exp-7",
                "sr_host": "store.hpc"
            }]
        }"#;
        let plan = Plan::from_json(json).unwrap();
        let task = &plan.tasks()[0];
        assert_eq!(plan.id(), None);
        assert_eq!(task.remote_ref(), Some("exp-7"));
        assert_eq!(task.runtime().id(), "remote");
        assert_eq!(task.inputs()["steps"], InputValue::Int(500));
    }
}
