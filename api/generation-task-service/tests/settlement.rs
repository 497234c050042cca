mod common;

use common::{Harness, now};
use generation_task_service::module::generation_task::model::{TaskStatus, TaskType};
use generation_task_service::module::user_account::model::PlanTier;
use generation_task_service::service::provider_service::NormalizedResult;
use generation_task_service::service::metrics_service;
use generation_task_service::service::settlement_service::{self, SettlementOutcome};

fn success(url: &str) -> NormalizedResult {
    NormalizedResult::Success {
        payload_urls: vec![url.to_string()],
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_success_settlements_debit_exactly_once() {
    let h = Harness::new();
    h.seed_user("alice", 100, PlanTier::Basic);
    h.seed_task("img-race", "alice", TaskType::Image, 4, now()).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let state = h.state.clone();
        let url = format!("https://cdn.test/{i}.png");
        handles.push(tokio::spawn(async move {
            settlement_service::settle(&state, "img-race", success(&url)).await
        }));
    }
    let mut completed = 0;
    for handle in handles {
        match handle.await.expect("join") {
            SettlementOutcome::Completed => completed += 1,
            SettlementOutcome::AlreadyTerminal => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(completed, 1);
    let task = h.task("img-race").await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.credits_deducted);
    assert_eq!(task.images.len(), 1);
    let user = h.user("alice").await;
    assert_eq!(user.credits, 96);
    assert_eq!(user.images_generated_this_month, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_success_and_failure_race_settles_one_way() {
    let h = Harness::new();
    h.seed_user("alice", 100, PlanTier::Basic);
    h.seed_task("img-mixed", "alice", TaskType::Image, 4, now()).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let state = h.state.clone();
        let result = if i % 2 == 0 {
            success("https://cdn.test/m.png")
        } else {
            NormalizedResult::Failure {
                reason: "generation failed".to_string(),
            }
        };
        handles.push(tokio::spawn(async move {
            settlement_service::settle(&state, "img-mixed", result).await
        }));
    }
    let mut terminal_writes = 0;
    for handle in handles {
        if matches!(
            handle.await.expect("join"),
            SettlementOutcome::Completed | SettlementOutcome::Failed
        ) {
            terminal_writes += 1;
        }
    }

    assert_eq!(terminal_writes, 1);
    let task = h.task("img-mixed").await;
    let credits = h.user("alice").await.credits;
    match task.status {
        TaskStatus::Completed => {
            assert!(task.credits_deducted);
            assert_eq!(credits, 96);
        }
        TaskStatus::Failed => {
            assert!(!task.credits_deducted);
            assert_eq!(credits, 100);
        }
        other => panic!("task left in flight: {other:?}"),
    }
}

#[tokio::test]
async fn failure_never_debits() {
    let h = Harness::new();
    h.seed_user("alice", 100, PlanTier::Basic);
    h.seed_task("img-f", "alice", TaskType::Image, 4, now()).await;

    let outcome = settlement_service::settle(
        &h.state,
        "img-f",
        NormalizedResult::Failure {
            reason: "nsfw".to_string(),
        },
    )
    .await;

    assert_eq!(outcome, SettlementOutcome::Failed);
    let task = h.task("img-f").await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some("nsfw"));
    assert!(!task.credits_deducted);
    assert_eq!(h.user("alice").await.credits, 100);
}

#[tokio::test]
async fn terminal_task_ignores_any_further_result() {
    let h = Harness::new();
    h.seed_user("alice", 100, PlanTier::Basic);
    h.seed_task("img-t", "alice", TaskType::Image, 4, now()).await;
    settlement_service::settle(&h.state, "img-t", success("https://cdn.test/first.png")).await;
    let settled = h.task("img-t").await;

    for result in [
        success("https://cdn.test/second.png"),
        NormalizedResult::Failure {
            reason: "late failure".to_string(),
        },
        NormalizedResult::InProgress,
    ] {
        let outcome = settlement_service::settle(&h.state, "img-t", result).await;
        assert_eq!(outcome, SettlementOutcome::AlreadyTerminal);
    }

    let task = h.task("img-t").await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.images, settled.images);
    assert_eq!(task.error, None);
    assert_eq!(task.completed_at, settled.completed_at);
    assert_eq!(h.user("alice").await.credits, 96);
}

#[tokio::test]
async fn debit_floors_balance_at_zero() {
    let h = Harness::new();
    h.seed_user("bob", 100, PlanTier::Pro);
    h.seed_task("vid-a", "bob", TaskType::Video, 110, now()).await;

    let outcome =
        settlement_service::settle(&h.state, "vid-a", success("https://cdn.test/a.mp4")).await;

    assert_eq!(outcome, SettlementOutcome::Completed);
    assert_eq!(h.user("bob").await.credits, 0);
}

#[tokio::test]
async fn unknown_task_is_ignored() {
    let h = Harness::new();
    let outcome = settlement_service::settle(&h.state, "nope", success("https://x")).await;
    assert_eq!(outcome, SettlementOutcome::UnknownTask);
}

#[tokio::test]
async fn expire_fails_in_flight_task_once() {
    let h = Harness::new();
    h.seed_user("alice", 100, PlanTier::Basic);
    h.seed_task("img-x", "alice", TaskType::Image, 4, now() - 3600).await;

    assert_eq!(
        settlement_service::expire(&h.state, "img-x").await,
        SettlementOutcome::Failed
    );
    assert_eq!(
        settlement_service::expire(&h.state, "img-x").await,
        SettlementOutcome::AlreadyTerminal
    );
    assert_eq!(
        settlement_service::settle(&h.state, "img-x", success("https://late")).await,
        SettlementOutcome::AlreadyTerminal
    );
    assert_eq!(h.user("alice").await.credits, 100);
}

#[tokio::test]
async fn missing_owner_is_counted_as_settlement_error() {
    let h = Harness::new();
    h.seed_task("img-orphan", "ghost", TaskType::Image, 4, now()).await;
    let before = metrics_service::snapshot().settlement_errors;

    let outcome =
        settlement_service::settle(&h.state, "img-orphan", success("https://cdn.test/o.png")).await;

    assert_eq!(outcome, SettlementOutcome::DebitFailed);
    assert_eq!(h.task("img-orphan").await.status, TaskStatus::Completed);
    assert!(metrics_service::snapshot().settlement_errors > before);
}
