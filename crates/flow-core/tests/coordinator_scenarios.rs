use std::sync::{Arc, Mutex};
use std::time::Duration;

use flow_core::{ActionError, ApprovalDecision, CoreEngineError, EnvironmentRegistry, EventStore, FailureReason, RetryPolicy,
                RunCoordinator, RunStatus, Step, StepStatus, WorkflowDefinition};
use uuid::Uuid;

type Log = Arc<Mutex<Vec<String>>>;

fn recording(id: &str, log: &Log) -> Step {
    let log = log.clone();
    let name = id.to_string();
    Step::from_fn(id, move |ctx| {
        log.lock().unwrap().push(format!("{}:{}", ctx.environment.name, name));
        Ok(format!("{name} ok in {}", ctx.environment.namespace))
    })
}

fn registry() -> Arc<EnvironmentRegistry> {
    Arc::new(EnvironmentRegistry::builtin())
}

async fn wait_for_status(coord: &RunCoordinator, run_id: Uuid, status: RunStatus) {
    for _ in 0..1000 {
        if coord.status(run_id).expect("status").overall_status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("run {run_id} never reached {status:?}");
}

#[tokio::test]
async fn dev_validate_apply_notify_succeeds_in_order() {
    let log: Log = Arc::default();
    let def = WorkflowDefinition::builder("deploy").step(recording("validate", &log))
                                                   .step(recording("apply", &log))
                                                   .step(recording("notify", &log))
                                                   .build()
                                                   .unwrap();
    let coord = RunCoordinator::new(registry(), def);

    let handle = coord.trigger("dev").expect("trigger dev");
    let run = coord.wait(handle.run_id).await.expect("wait");

    assert_eq!(run.overall_status, RunStatus::Succeeded);
    assert_eq!(run.exit_code(), 0);
    assert_eq!(run.results.len(), 3);
    assert!(run.results.iter().all(|r| r.status == StepStatus::Success));
    assert_eq!(*log.lock().unwrap(), vec!["dev:validate", "dev:apply", "dev:notify"]);
    assert_eq!(run.results[1].output, "apply ok in awx-dev");
}

#[tokio::test]
async fn unknown_environment_creates_no_run() {
    let log: Log = Arc::default();
    let def = WorkflowDefinition::builder("deploy").step(recording("apply", &log)).build().unwrap();
    let coord = RunCoordinator::new(registry(), def);

    let err = coord.trigger("qa").unwrap_err();
    assert_eq!(err, CoreEngineError::UnknownEnvironment("qa".into()));
    assert_eq!(err.exit_code(), 2);
    assert!(coord.runs().is_empty());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_triggers_yield_one_run_and_one_rejection() {
    let def = WorkflowDefinition::builder("deploy").step(Step::new("slow", SlowAction))
                                                   .build()
                                                   .unwrap();
    let coord = Arc::new(RunCoordinator::new(registry(), def));

    let a = {
        let c = coord.clone();
        tokio::spawn(async move { c.trigger("nonprod") })
    };
    let b = {
        let c = coord.clone();
        tokio::spawn(async move { c.trigger("nonprod") })
    };
    let results = vec![a.await.unwrap(), b.await.unwrap()];

    let ok: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let rejected: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(ok.len(), 1);
    assert_eq!(rejected, vec![&CoreEngineError::RunInProgress("nonprod".into())]);
    assert_eq!(rejected[0].exit_code(), 3);

    // otro entorno no se ve afectado
    let other = coord.trigger("dev").expect("dev runs concurrently");
    assert_eq!(coord.runs().len(), 2);

    let first = coord.wait(ok[0].run_id).await.unwrap();
    assert_eq!(first.overall_status, RunStatus::Succeeded);
    coord.wait(other.run_id).await.unwrap();

    // una vez terminal, se puede volver a lanzar
    let again = coord.trigger("nonprod").expect("retrigger after terminal");
    coord.wait(again.run_id).await.unwrap();
}

struct SlowAction;

#[async_trait::async_trait]
impl flow_core::StepAction for SlowAction {
    async fn execute(&self, _ctx: &flow_core::ExecutionContext) -> Result<String, ActionError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok("done".into())
    }
}

#[tokio::test(start_paused = true)]
async fn retry_bound_stops_the_run() {
    let log: Log = Arc::default();
    let calls = Arc::new(Mutex::new(0u32));
    let counter = calls.clone();
    let def = WorkflowDefinition::builder("maintenance").step(Step::from_fn("backup", move |_| {
                                                            *counter.lock().unwrap() += 1;
                                                            Err(ActionError::new("kubectl: connection refused"))
                                                        }).with_retry(RetryPolicy::fixed(3, Duration::from_secs(300))))
                                                        .step(recording("health_check", &log))
                                                        .build()
                                                        .unwrap();
    let coord = RunCoordinator::new(registry(), def);
    let handle = coord.trigger("dev").unwrap();
    let run = coord.wait(handle.run_id).await.unwrap();

    assert_eq!(*calls.lock().unwrap(), 3);
    assert_eq!(run.overall_status, RunStatus::Failed);
    assert_eq!(run.exit_code(), 1);
    assert_eq!(run.results.len(), 1);
    assert_eq!(run.results[0].status, StepStatus::Failed);
    assert_eq!(run.results[0].attempts, 3);
    assert!(log.lock().unwrap().is_empty(), "no step after the failure may run");
    assert!(matches!(run.failure, Some(FailureReason::StepExecutionFailed { ref step_id, .. }) if step_id == "backup"));
}

fn prod_workflow(log: &Log) -> WorkflowDefinition {
    WorkflowDefinition::builder("deploy").step(recording("plan", log))
                                         .step(recording("apply", log).requiring_approval())
                                         .step(recording("notify", log))
                                         .build()
                                         .unwrap()
}

#[tokio::test]
async fn prod_halts_at_gate_and_reject_fails_run() {
    let log: Log = Arc::default();
    let coord = RunCoordinator::new(registry(), prod_workflow(&log));
    let handle = coord.trigger("prod").unwrap();

    wait_for_status(&coord, handle.run_id, RunStatus::AwaitingApproval).await;
    let snap = coord.status(handle.run_id).unwrap();
    assert_eq!(snap.current_step_id.as_deref(), Some("apply"));
    assert_eq!(snap.results.len(), 1);
    assert_eq!(*log.lock().unwrap(), vec!["prod:plan"]);

    coord.resolve(handle.run_id, "apply", ApprovalDecision::Reject).unwrap();
    let run = coord.wait(handle.run_id).await.unwrap();

    assert_eq!(run.overall_status, RunStatus::Failed);
    assert_eq!(run.results.len(), 2);
    assert_eq!(run.results[0].status, StepStatus::Success);
    assert_eq!(run.results[1].status, StepStatus::Skipped);
    assert_eq!(run.failure, Some(FailureReason::ApprovalRejected { step_id: "apply".into() }));
    assert_eq!(*log.lock().unwrap(), vec!["prod:plan"]);
    assert!(run.trace.iter().any(|l| l.contains("awaiting approval for step 'apply'")));
}

#[tokio::test]
async fn prod_approve_resumes_from_the_gated_step() {
    let log: Log = Arc::default();
    let coord = RunCoordinator::new(registry(), prod_workflow(&log));
    let handle = coord.trigger("prod").unwrap();

    wait_for_status(&coord, handle.run_id, RunStatus::AwaitingApproval).await;
    assert!(coord.resolve(handle.run_id, "notify", ApprovalDecision::Approve).is_err());
    coord.resolve(handle.run_id, "apply", ApprovalDecision::Approve).unwrap();
    let run = coord.wait(handle.run_id).await.unwrap();

    assert_eq!(run.overall_status, RunStatus::Succeeded);
    assert_eq!(*log.lock().unwrap(), vec!["prod:plan", "prod:apply", "prod:notify"]);
}

#[tokio::test]
async fn cancellation_after_second_step_stops_before_third() {
    let log: Log = Arc::default();

    // El segundo step pide la cancelación de su propio run: la solicitud
    // llega mientras el step está en curso y se aplica en la frontera.
    let slot: Arc<Mutex<Option<Arc<RunCoordinator>>>> = Arc::default();
    let def = {
        let slot = slot.clone();
        let log = log.clone();
        let log_s2 = log.clone();
        WorkflowDefinition::builder("deploy").step(recording("s1", &log))
                                             .step(Step::from_fn("s2", move |ctx| {
                                                 log_s2.lock().unwrap().push("dev:s2".into());
                                                 if let Some(c) = slot.lock().unwrap().as_ref() {
                                                     c.cancel(ctx.run_id).expect("cancel");
                                                 }
                                                 Ok("s2".into())
                                             }))
                                             .step(recording("s3", &log))
                                             .step(recording("s4", &log))
                                             .step(recording("s5", &log))
                                             .build()
                                             .unwrap()
    };
    let coord = Arc::new(RunCoordinator::new(registry(), def));
    *slot.lock().unwrap() = Some(coord.clone());

    let handle = coord.trigger("dev").unwrap();
    let run = coord.wait(handle.run_id).await.unwrap();
    slot.lock().unwrap().take();

    assert_eq!(run.overall_status, RunStatus::Failed);
    assert_eq!(run.failure, Some(FailureReason::Cancelled));
    assert_eq!(run.results.len(), 2);
    assert_eq!(*log.lock().unwrap(), vec!["dev:s1", "dev:s2"]);
    assert!(run.cancel_requested);
}

#[tokio::test]
async fn cancellation_while_awaiting_approval() {
    let log: Log = Arc::default();
    let coord = RunCoordinator::new(registry(), prod_workflow(&log));
    let handle = coord.trigger("prod").unwrap();
    wait_for_status(&coord, handle.run_id, RunStatus::AwaitingApproval).await;

    coord.cancel(handle.run_id).unwrap();
    let run = coord.wait(handle.run_id).await.unwrap();
    assert_eq!(run.failure, Some(FailureReason::Cancelled));
    assert_eq!(run.results.last().map(|r| r.status), Some(StepStatus::Skipped));
    assert!(!coord.engine().gate().is_pending(handle.run_id, "apply"));
}

#[tokio::test]
async fn unknown_run_is_reported() {
    let log: Log = Arc::default();
    let coord = RunCoordinator::new(registry(), prod_workflow(&log));
    let ghost = Uuid::new_v4();
    assert_eq!(coord.status(ghost).unwrap_err(), CoreEngineError::UnknownRun(ghost));
    assert!(coord.cancel(ghost).is_err());
    assert!(coord.resolve(ghost, "apply", ApprovalDecision::Approve).is_err());
}

#[tokio::test]
async fn cancellation_during_last_step_fails_the_run() {
    let log: Log = Arc::default();
    let slot: Arc<Mutex<Option<Arc<RunCoordinator>>>> = Arc::default();
    let def = {
        let slot = slot.clone();
        WorkflowDefinition::builder("deploy").step(recording("validate", &log))
                                             .step(recording("apply", &log))
                                             .step(Step::from_fn("notify", move |ctx| {
                                                 if let Some(c) = slot.lock().unwrap().as_ref() {
                                                     c.cancel(ctx.run_id).expect("cancel");
                                                 }
                                                 Ok("notified".into())
                                             }))
                                             .build()
                                             .unwrap()
    };
    let coord = Arc::new(RunCoordinator::new(registry(), def));
    *slot.lock().unwrap() = Some(coord.clone());

    let handle = coord.trigger("dev").unwrap();
    let run = coord.wait(handle.run_id).await.unwrap();
    slot.lock().unwrap().take();

    assert_eq!(run.overall_status, RunStatus::Failed);
    assert_eq!(run.failure, Some(FailureReason::Cancelled));
    assert_eq!(run.results.len(), 3);
    assert!(run.cancel_requested);
    assert_eq!(run.exit_code(), 1);
}

#[tokio::test]
async fn cancel_after_completion_leaves_the_run_succeeded() {
    let log: Log = Arc::default();
    let def = WorkflowDefinition::builder("deploy").step(recording("apply", &log)).build().unwrap();
    let coord = RunCoordinator::new(registry(), def);
    let handle = coord.trigger("dev").unwrap();
    coord.wait(handle.run_id).await.unwrap();

    coord.cancel(handle.run_id).unwrap();
    let run = coord.status(handle.run_id).unwrap();
    assert_eq!(run.overall_status, RunStatus::Succeeded);
    assert!(!run.cancel_requested);
}

#[tokio::test]
async fn prune_forgets_finished_runs_only() {
    let log: Log = Arc::default();
    let coord = RunCoordinator::new(registry(), prod_workflow(&log));

    let dev = coord.trigger("dev").unwrap();
    coord.wait(dev.run_id).await.unwrap();
    let prod = coord.trigger("prod").unwrap();
    wait_for_status(&coord, prod.run_id, RunStatus::AwaitingApproval).await;

    assert_eq!(coord.prune_finished(), 1);
    assert_eq!(coord.status(dev.run_id).unwrap_err(), CoreEngineError::UnknownRun(dev.run_id));
    assert!(!coord.engine().has_run(dev.run_id));
    assert_eq!(coord.runs().len(), 1);
    assert_eq!(coord.active_run("prod"), Some(prod.run_id));
    assert_eq!(coord.prune_finished(), 0);

    // El entorno purgado admite un run nuevo.
    let again = coord.trigger("dev").unwrap();
    assert_eq!(coord.wait(again.run_id).await.unwrap().overall_status, RunStatus::Succeeded);

    coord.cancel(prod.run_id).unwrap();
    coord.wait(prod.run_id).await.unwrap();
    assert_eq!(coord.prune_finished(), 2);
    assert!(coord.runs().is_empty());
    assert!(coord.engine().event_store().run_ids().is_empty());
}
