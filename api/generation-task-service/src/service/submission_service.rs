use crate::app::AppState;
use crate::module::generation_task::crud::StoreError;
use crate::module::generation_task::error::AppError;
use crate::module::generation_task::model::{NewTask, TaskRecord, TaskType};
use crate::module::generation_task::schema::{
    GenerateImageRequest, GenerateVideoRequest, ImageQuality, SubmitTaskResponse,
};
use crate::module::user_account::model::UserRecord;
use crate::service::provider_service::{ProviderError, ProviderSubmission};
use crate::service::{
    callback_url_service, metrics_service, pricing_service, validation_service,
};
use axum::http::HeaderMap;
use chrono::Utc;
use tracing::{error, info, warn};

pub async fn submit_image(
    state: &AppState,
    user_id: &str,
    req: GenerateImageRequest,
    headers: &HeaderMap,
) -> Result<SubmitTaskResponse, AppError> {
    let user = load_user(state, user_id).await?;
    let valid = validation_service::validate_image_request(&req)?;
    let credits_needed = pricing_service::image_credits(req.quality);
    ensure_balance(&user, credits_needed)?;

    let submission = ProviderSubmission::Image {
        prompt: valid.prompt.clone(),
        num_images: valid.num_images,
        aspect_ratio: valid.aspect_ratio,
        pro: req.quality == ImageQuality::Pro,
        callback_url: callback_url(state, headers)?,
    };
    let task_id = dispatch(state, TaskType::Image, &submission).await?;
    persist(
        state,
        NewTask {
            task_id,
            user_id: user.user_id,
            prompt: valid.prompt,
            task_type: TaskType::Image,
            num_images: Some(valid.num_images),
            credits_reserved: credits_needed,
        },
    )
    .await
}

pub async fn submit_video(
    state: &AppState,
    user_id: &str,
    req: GenerateVideoRequest,
    headers: &HeaderMap,
) -> Result<SubmitTaskResponse, AppError> {
    let user = load_user(state, user_id).await?;
    let valid = validation_service::validate_video_request(&req)?;
    let credits_needed = pricing_service::video_credits(valid.duration_seconds, req.sound);
    ensure_balance(&user, credits_needed)?;

    let submission = ProviderSubmission::Video {
        prompt: valid.prompt.clone(),
        duration_seconds: valid.duration_seconds,
        sound: req.sound,
        aspect_ratio: valid.aspect_ratio,
        callback_url: callback_url(state, headers)?,
    };
    let task_id = dispatch(state, TaskType::Video, &submission).await?;
    persist(
        state,
        NewTask {
            task_id,
            user_id: user.user_id,
            prompt: valid.prompt,
            task_type: TaskType::Video,
            num_images: None,
            credits_reserved: credits_needed,
        },
    )
    .await
}

async fn load_user(state: &AppState, user_id: &str) -> Result<UserRecord, AppError> {
    state
        .users
        .find_by_id(user_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| AppError::unauthenticated("session user does not exist"))
}

/// Checks only; the balance is charged at settlement.
fn ensure_balance(user: &UserRecord, credits_needed: i64) -> Result<(), AppError> {
    if user.credits < credits_needed {
        return Err(AppError::insufficient_credits(credits_needed, user.credits));
    }
    Ok(())
}

fn callback_url(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    callback_url_service::build_callback_url(state.config.public_base_url.as_deref(), headers)
        .map_err(AppError::internal)
}

async fn dispatch(
    state: &AppState,
    task_type: TaskType,
    submission: &ProviderSubmission,
) -> Result<String, AppError> {
    let provider = state.provider_for(task_type);
    provider.submit(submission).await.map_err(|e| {
        warn!(provider = provider.name(), error = %e, "provider submit failed");
        AppError::provider(user_facing_provider_message(&e))
    })
}

fn user_facing_provider_message(err: &ProviderError) -> String {
    match err.provider_message() {
        Some(raw) => validation_service::sanitize_provider_message(raw),
        None => "the generation provider is unavailable, please try again later".to_string(),
    }
}

async fn persist(state: &AppState, new: NewTask) -> Result<SubmitTaskResponse, AppError> {
    let task = TaskRecord::pending(new, Utc::now().timestamp());
    let task = state.tasks.create(task).await.map_err(|e| {
        error!(error = %e, "submitted task could not be persisted");
        internal(e)
    })?;
    metrics_service::inc_tasks_submitted();
    info!(
        task_id = %task.task_id,
        user_id = %task.user_id,
        task_type = task.task_type.as_str(),
        credits_reserved = task.credits_reserved,
        "generation task submitted"
    );
    Ok(SubmitTaskResponse {
        success: true,
        task_id: task.task_id,
        credits_reserved: task.credits_reserved,
        message: format!("{} generation started", task.task_type.as_str()),
    })
}

fn internal(err: StoreError) -> AppError {
    AppError::internal(err.to_string())
}
