//! `runner::drive` contra gates reales: la pregunta abierta al operador no
//! debe impedir que el run termine por timeout o por interrupción.
use std::sync::Arc;
use std::time::Duration;

use deployflow::runner::{drive, Approvals};
use flow_core::{ApprovalDecision, EnvironmentRegistry, FailureReason, RunCoordinator, RunStatus, Step,
                WorkflowDefinition, WorkflowEngine};
use tokio::sync::mpsc;

fn gated_deploy() -> WorkflowDefinition {
    WorkflowDefinition::builder("deploy").step(Step::from_fn("plan", |_| Ok("plan ok".into())))
                                         .step(Step::from_fn("apply", |_| Ok("applied".into())).requiring_approval())
                                         .build()
                                         .unwrap()
}

fn coordinator(engine: WorkflowEngine) -> RunCoordinator {
    RunCoordinator::with_engine(Arc::new(EnvironmentRegistry::builtin()), gated_deploy(), Arc::new(engine))
}

#[tokio::test]
async fn approval_timeout_ends_the_run_while_the_question_is_open() {
    let coord = coordinator(WorkflowEngine::new().with_approval_timeout(Duration::from_millis(100)));
    let handle = coord.trigger("prod").unwrap();
    // Nadie contesta, pero la entrada sigue abierta.
    let (_tx, rx) = mpsc::unbounded_channel();
    let mut approvals = Approvals::Interactive(rx);

    let run = tokio::time::timeout(Duration::from_secs(5),
                                   drive(&coord, handle.run_id, &mut approvals, std::future::pending()))
              .await
              .expect("drive returned")
              .unwrap();
    assert_eq!(run.overall_status, RunStatus::Failed);
    assert_eq!(run.failure, Some(FailureReason::ApprovalTimeout { step_id: "apply".into() }));
}

#[tokio::test]
async fn interrupt_at_the_question_cancels_the_run() {
    let coord = coordinator(WorkflowEngine::new());
    let handle = coord.trigger("prod").unwrap();
    let (_tx, rx) = mpsc::unbounded_channel();
    let mut approvals = Approvals::Interactive(rx);
    let interrupt = tokio::time::sleep(Duration::from_millis(500));

    let run = tokio::time::timeout(Duration::from_secs(5), drive(&coord, handle.run_id, &mut approvals, interrupt))
              .await
              .expect("drive returned")
              .unwrap();
    assert_eq!(run.failure, Some(FailureReason::Cancelled));
    assert!(run.cancel_requested);
    assert!(!coord.engine().gate().is_pending(handle.run_id, "apply"));
}

#[tokio::test]
async fn typed_yes_approves_the_gate() {
    let coord = coordinator(WorkflowEngine::new());
    let handle = coord.trigger("prod").unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send("yes".to_string()).unwrap();
    let mut approvals = Approvals::Interactive(rx);

    let run = drive(&coord, handle.run_id, &mut approvals, std::future::pending()).await.unwrap();
    assert_eq!(run.overall_status, RunStatus::Succeeded);
    assert_eq!(run.results[1].output, "applied");
}

#[tokio::test]
async fn closed_input_rejects_the_gate() {
    let coord = coordinator(WorkflowEngine::new());
    let handle = coord.trigger("prod").unwrap();
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    drop(tx);
    let mut approvals = Approvals::Interactive(rx);

    let run = drive(&coord, handle.run_id, &mut approvals, std::future::pending()).await.unwrap();
    assert_eq!(run.failure, Some(FailureReason::ApprovalRejected { step_id: "apply".into() }));
}

#[tokio::test]
async fn fixed_reject_needs_no_input() {
    let coord = coordinator(WorkflowEngine::new());
    let handle = coord.trigger("prod").unwrap();
    let mut approvals = Approvals::Fixed(ApprovalDecision::Reject);

    let run = drive(&coord, handle.run_id, &mut approvals, std::future::pending()).await.unwrap();
    assert_eq!(run.exit_code(), 1);
    assert_eq!(run.results.len(), 2);
}
