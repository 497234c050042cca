use crate::app::AppState;
use crate::module::generation_task::error::AppError;
use crate::module::generation_task::model::TaskRecord;
use crate::module::generation_task::schema::TaskStatusResponse;
use crate::service::settlement_service;
use tracing::{debug, warn};

/// Owner-scoped status read that also nudges in-flight tasks forward: expired
/// tasks are force-failed, live ones are re-queried and settled inline.
pub async fn poll_task(
    state: &AppState,
    user_id: &str,
    task_id: &str,
) -> Result<TaskStatusResponse, AppError> {
    let task = load_owned(state, user_id, task_id).await?;
    if task.status.is_terminal() {
        return Ok(TaskStatusResponse::from(&task));
    }

    let ceiling = state.config.task_timeout_seconds;
    if settlement_service::needs_expiry(&task, ceiling) {
        settlement_service::expire(state, task_id).await;
        return reload(state, user_id, task).await;
    }

    let provider = state.provider_for(task.task_type);
    match provider.query_status(task_id).await {
        Ok(result) => {
            let outcome = settlement_service::settle(state, task_id, result).await;
            debug!(task_id, outcome = outcome.as_str(), "poll settlement finished");
        }
        Err(e) => {
            warn!(task_id, provider = provider.name(), error = %e, "provider status query failed");
            if settlement_service::needs_expiry(&task, ceiling) {
                settlement_service::expire(state, task_id).await;
            }
        }
    }
    reload(state, user_id, task).await
}

async fn load_owned(state: &AppState, user_id: &str, task_id: &str) -> Result<TaskRecord, AppError> {
    state
        .tasks
        .find_by_task_id_and_user(task_id, user_id)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?
        .ok_or_else(|| AppError::not_found("task not found"))
}

/// Falls back to the copy already in hand if the re-read fails; the client
/// will poll again.
async fn reload(
    state: &AppState,
    user_id: &str,
    fallback: TaskRecord,
) -> Result<TaskStatusResponse, AppError> {
    let task = match state
        .tasks
        .find_by_task_id_and_user(&fallback.task_id, user_id)
        .await
    {
        Ok(Some(task)) => task,
        Ok(None) => fallback,
        Err(e) => {
            warn!(task_id = %fallback.task_id, error = %e, "task reload failed");
            fallback
        }
    };
    Ok(TaskStatusResponse::from(&task))
}
