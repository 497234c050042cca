use crate::app::AppState;
use crate::module::generation_task::model::TaskRecord;
use crate::service::provider_service::NormalizedResult;
use crate::service::{ledger_service, metrics_service, validation_service};
use chrono::Utc;
use tracing::{debug, error, info, warn};

pub const EMPTY_SUCCESS_REASON: &str = "no result URL returned despite success code";
pub const TIMEOUT_REASON: &str =
    "generation timed out after 15 minutes; no credits were charged";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    UnknownTask,
    AlreadyTerminal,
    StillInFlight,
    Completed,
    Failed,
    /// Task completed and marked deducted, but no user balance was debited.
    DebitFailed,
    StoreError,
}

impl SettlementOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownTask => "unknown_task",
            Self::AlreadyTerminal => "already_terminal",
            Self::StillInFlight => "still_in_flight",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::DebitFailed => "debit_failed",
            Self::StoreError => "store_error",
        }
    }
}

/// Drives a task towards its terminal state from a provider result. Shared by
/// the callback and polling paths and never returns an error: both callers
/// must answer their own client whatever happens here.
pub async fn settle(state: &AppState, task_id: &str, result: NormalizedResult) -> SettlementOutcome {
    let task = match state.tasks.find_by_task_id(task_id).await {
        Ok(Some(task)) => task,
        Ok(None) => {
            info!(task_id, "settlement for unknown task ignored");
            return SettlementOutcome::UnknownTask;
        }
        Err(e) => return store_failure(task_id, "load", &e.to_string()),
    };
    if task.status.is_terminal() {
        debug!(task_id, status = task.status.as_str(), "task already settled");
        return SettlementOutcome::AlreadyTerminal;
    }

    let now = Utc::now().timestamp();
    match result {
        NormalizedResult::InProgress => {
            if let Err(e) = state.tasks.mark_processing(task_id).await {
                warn!(task_id, error = %e, "mark processing failed");
            }
            SettlementOutcome::StillInFlight
        }
        NormalizedResult::Success { payload_urls } => {
            let urls: Vec<String> = payload_urls
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect();
            if urls.is_empty() {
                settle_failure(state, task_id, EMPTY_SUCCESS_REASON.to_string(), now).await
            } else {
                settle_success(state, task_id, urls, now).await
            }
        }
        NormalizedResult::Failure { reason } => {
            let reason = validation_service::sanitize_provider_message(&reason);
            settle_failure(state, task_id, reason, now).await
        }
    }
}

/// Force-fails a task that outlived the in-flight ceiling. Shares the
/// conditional write of the failure path, so a late success cannot follow.
pub async fn expire(state: &AppState, task_id: &str) -> SettlementOutcome {
    let now = Utc::now().timestamp();
    let outcome = settle_failure(state, task_id, TIMEOUT_REASON.to_string(), now).await;
    if outcome == SettlementOutcome::Failed {
        metrics_service::inc_tasks_timed_out();
        warn!(task_id, "task force-failed after timeout");
    }
    outcome
}

async fn settle_success(
    state: &AppState,
    task_id: &str,
    urls: Vec<String>,
    now: i64,
) -> SettlementOutcome {
    let claimed = match state.tasks.complete_if_in_flight(task_id, urls, now).await {
        Ok(Some(task)) => task,
        Ok(None) => {
            debug!(task_id, "success lost the race to another settlement");
            return SettlementOutcome::AlreadyTerminal;
        }
        Err(e) => return store_failure(task_id, "complete", &e.to_string()),
    };
    metrics_service::inc_tasks_completed();

    match ledger_service::debit_for_task(state, &claimed, now).await {
        Ok(Some(_)) => {
            metrics_service::add_credits_debited(claimed.credits_reserved.max(0) as u64);
            SettlementOutcome::Completed
        }
        Ok(None) => {
            metrics_service::inc_settlement_errors();
            error!(
                task_id,
                user_id = %claimed.user_id,
                amount = claimed.credits_reserved,
                "task completed and marked deducted but owner not found; needs reconciliation"
            );
            SettlementOutcome::DebitFailed
        }
        Err(e) => {
            metrics_service::inc_settlement_errors();
            error!(
                task_id,
                user_id = %claimed.user_id,
                amount = claimed.credits_reserved,
                error = %e,
                "task completed but debit failed; needs reconciliation"
            );
            SettlementOutcome::DebitFailed
        }
    }
}

async fn settle_failure(
    state: &AppState,
    task_id: &str,
    reason: String,
    now: i64,
) -> SettlementOutcome {
    match state.tasks.fail_if_in_flight(task_id, reason, now).await {
        Ok(Some(task)) => {
            metrics_service::inc_tasks_failed();
            ledger_service::refund_for_task(&task);
            info!(task_id, error = task.error.as_deref().unwrap_or_default(), "task failed");
            SettlementOutcome::Failed
        }
        Ok(None) => {
            debug!(task_id, "failure lost the race to another settlement");
            SettlementOutcome::AlreadyTerminal
        }
        Err(e) => store_failure(task_id, "fail", &e.to_string()),
    }
}

fn store_failure(task_id: &str, step: &'static str, reason: &str) -> SettlementOutcome {
    metrics_service::inc_settlement_errors();
    error!(task_id, step, error = %reason, "settlement store error swallowed");
    SettlementOutcome::StoreError
}

/// Whether a freshly loaded task should be force-failed instead of queried.
pub fn needs_expiry(task: &TaskRecord, ceiling_seconds: i64) -> bool {
    task.is_timed_out(Utc::now().timestamp(), ceiling_seconds)
}
