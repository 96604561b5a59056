//! Plan workflow integration tests
//!
//! Drives plans through the public API with the file plan store, mounted
//! storage and in-test gateway/agent services.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use sciplan::agent::{
    AgentApi, CommandRequest, ExecutionResponse, PollPolicy, PythonRequest, SubmitResponse,
    AGENT_NOT_FOUND,
};
use sciplan::gateway::{CatalogKind, ExperimentRequest, Gateway, LaunchedExperiment};
use sciplan::plan::{FilePlanStore, SNAPSHOT_FILE};
use sciplan::runtime::RemoteArgs;
use sciplan::transport::MountedStorage;
use sciplan::{Context, ExperimentState, GatewayProfile, InputValue, Plan, Runtime, Task, WaitOutcome};

/// Gateway whose catalog knows every name and whose jobs finish on the second read
#[derive(Default)]
struct TwoStepGateway {
    launched: AtomicU32,
    reads: AtomicU32,
}

#[async_trait]
impl Gateway for TwoStepGateway {
    async fn resolve(&self, kind: CatalogKind, name: &str) -> sciplan::Result<Option<String>> {
        Ok(Some(format!("{}:{}", kind, name)))
    }

    async fn launch_experiment(&self, request: &ExperimentRequest) -> sciplan::Result<LaunchedExperiment> {
        let n = self.launched.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(LaunchedExperiment {
            experiment_id: format!("{}-{}", request.experiment_name, n),
            working_dir: Some(format!("/work/{}", request.experiment_name)),
            storage_host: Some("store".into()),
        })
    }

    async fn experiment_state(&self, _experiment_id: &str) -> sciplan::Result<ExperimentState> {
        let reads = self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(if reads < 1 {
            ExperimentState::Executing
        } else {
            ExperimentState::Completed
        })
    }

    async fn terminate_experiment(&self, _experiment_id: &str) -> sciplan::Result<()> {
        Ok(())
    }
}

/// Agent service with no connected agents
struct NoAgents;

#[async_trait]
impl AgentApi for NoAgents {
    async fn submit_command(&self, _request: &CommandRequest) -> sciplan::Result<SubmitResponse> {
        Ok(SubmitResponse::rejected(AGENT_NOT_FOUND))
    }

    async fn command_result(&self, _execution_id: &str) -> sciplan::Result<ExecutionResponse> {
        Ok(ExecutionResponse::pending())
    }

    async fn submit_python(&self, _request: &PythonRequest) -> sciplan::Result<SubmitResponse> {
        Ok(SubmitResponse::rejected(AGENT_NOT_FOUND))
    }

    async fn python_result(&self, _execution_id: &str) -> sciplan::Result<ExecutionResponse> {
        Ok(ExecutionResponse::pending())
    }
}

fn mock_task(name: &str) -> Task {
    Task::new(name, "Echo", BTreeMap::new(), Runtime::mock())
}

#[tokio::test]
async fn test_mock_plan_through_file_store() {
    let temp = TempDir::new().unwrap();
    let ctx = Context::builder()
        .plan_store(Arc::new(FilePlanStore::new(temp.path().join("plans"))))
        .build();

    let mut plan = Plan::new(vec![mock_task("A"), mock_task("B")]);
    let report = plan.launch(&ctx, true).await;
    assert!(report.is_success());
    assert_eq!(report.launched, vec!["A".to_string(), "B".to_string()]);

    let outcome = plan
        .wait_for_completion(&ctx, Duration::from_millis(1), std::future::pending())
        .await
        .unwrap();
    assert!(matches!(outcome, WaitOutcome::Completed { .. }));

    let id = plan.id().unwrap().to_string();
    let reloaded = Plan::load(&ctx, &id).await.unwrap();
    assert_eq!(reloaded.tasks().len(), 2);
    assert_eq!(reloaded.tasks()[0].remote_ref(), plan.tasks()[0].remote_ref());
    assert_eq!(Plan::query(&ctx).await.unwrap().len(), 1);

    let out = temp.path().join("out");
    plan.fetch(&ctx, &out).await.unwrap();
    let snapshot = Plan::read_from(&out.join(SNAPSHOT_FILE)).unwrap();
    assert_eq!(snapshot, plan);
}

#[tokio::test]
async fn test_remote_plan_falls_back_to_mounted_storage() {
    let mount = TempDir::new().unwrap();
    let workdir = mount.path().join("store/work/sim");
    std::fs::create_dir_all(&workdir).unwrap();
    std::fs::write(workdir.join("energy.out"), "E=-1.5").unwrap();
    std::fs::write(workdir.join("run.log"), "ok").unwrap();

    let ctx = Context::builder()
        .gateway(Arc::new(TwoStepGateway::default()))
        .agent(Arc::new(NoAgents))
        .transport(Arc::new(MountedStorage::new(mount.path())))
        .profile(GatewayProfile {
            project: "p".into(),
            group: "g".into(),
            storage_resource: "store".into(),
        })
        .agent_server_host("agents.example.org:19900")
        .poll_policy(PollPolicy::new(Duration::from_millis(1), Some(Duration::from_secs(5))))
        .build();

    let mut inputs = BTreeMap::new();
    inputs.insert("steps".to_string(), InputValue::from(10_i64));
    let mut plan = Plan::new(vec![Task::new(
        "sim",
        "LAMMPS",
        inputs,
        Runtime::remote(RemoteArgs {
            cluster: "anvil".into(),
            category: "cpu".into(),
            queue_name: "shared".into(),
            node_count: 1,
            cpu_count: 8,
            walltime: 15,
        }),
    )]);

    plan.launch_tasks(&ctx, true).await.unwrap();
    let task = &plan.tasks()[0];
    assert_eq!(task.remote_ref(), Some("sim-1"));

    let first = plan.poll_statuses(&ctx).await.unwrap();
    assert_eq!(first, vec![("sim-1".to_string(), ExperimentState::Executing)]);

    assert_eq!(
        task.list(&ctx).await.unwrap(),
        vec!["energy.out".to_string(), "run.log".to_string()]
    );
    assert_eq!(task.read_file(&ctx, "energy.out").await.unwrap(), b"E=-1.5");
    assert!(task.execute_script(&ctx, &[], "print(1)").await.is_err());

    let out = TempDir::new().unwrap();
    let fetched = plan.fetch(&ctx, out.path()).await.unwrap();
    assert_eq!(fetched["sim"].len(), 2);
    assert_eq!(
        std::fs::read_to_string(out.path().join("sim/run.log")).unwrap(),
        "ok"
    );
}
