use crate::app::AppState;
use crate::module::generation_task::crud::StoreError;
use crate::module::generation_task::model::TaskRecord;
use crate::module::user_account::model::{HistoryEntry, SettlementDebit};
use tracing::{debug, info};
use uuid::Uuid;

/// Charges the reserved credits of a task that was just claimed as completed.
/// Callers must only invoke this after `complete_if_in_flight` returned the
/// task, which is what keeps the debit to once per task.
///
/// Returns the new balance, or `None` when the owner no longer exists.
pub async fn debit_for_task(
    state: &AppState,
    task: &TaskRecord,
    now: i64,
) -> Result<Option<i64>, StoreError> {
    let debit = SettlementDebit {
        amount: task.credits_reserved,
        task_type: task.task_type,
        entry: HistoryEntry {
            entry_id: Uuid::new_v4().to_string(),
            task_id: task.task_id.clone(),
            prompt: task.prompt.clone(),
            urls: task.result_urls().to_vec(),
            credits_used: task.credits_reserved,
            created_at: now,
        },
    };
    let balance = state.users.apply_debit(&task.user_id, debit).await?;
    if let Some(balance) = balance {
        info!(
            task_id = %task.task_id,
            user_id = %task.user_id,
            amount = task.credits_reserved,
            balance,
            "credits debited"
        );
    }
    Ok(balance)
}

/// Credits are reserved, never pre-subtracted, so a failed task has nothing
/// to give back.
pub fn refund_for_task(task: &TaskRecord) {
    debug!(
        task_id = %task.task_id,
        user_id = %task.user_id,
        reserved = task.credits_reserved,
        "no refund needed for uncharged task"
    );
}
