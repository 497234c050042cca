use super::error::AppError;
use super::schema::{
    CallbackAck, ErrorResponse, GenerateImageRequest, GenerateVideoRequest, HealthMetricsView,
    HealthResponse,
};
use crate::app::AppState;
use crate::service::callback_service;
use crate::service::metrics_service;
use crate::service::polling_service;
use crate::service::session_auth_service::{bearer_token, verify_session_token};
use crate::service::submission_service;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

pub async fn generate_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let user_id = match session_user_id(&state, &headers) {
        Ok(id) => id,
        Err(err) => return error_response(err, "image submission rejected"),
    };
    let req = match parse_body::<GenerateImageRequest>(&body) {
        Ok(req) => req,
        Err(err) => return error_response(err, "image submission rejected"),
    };
    match submission_service::submit_image(&state, &user_id, req, &headers).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(err) => error_response(err, "image submission rejected"),
    }
}

pub async fn generate_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let user_id = match session_user_id(&state, &headers) {
        Ok(id) => id,
        Err(err) => return error_response(err, "video submission rejected"),
    };
    let req = match parse_body::<GenerateVideoRequest>(&body) {
        Ok(req) => req,
        Err(err) => return error_response(err, "video submission rejected"),
    };
    match submission_service::submit_video(&state, &user_id, req, &headers).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(err) => error_response(err, "video submission rejected"),
    }
}

pub async fn get_task_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Response {
    let user_id = match session_user_id(&state, &headers) {
        Ok(id) => id,
        Err(err) => return error_response(err, "task status rejected"),
    };
    match polling_service::poll_task(&state, &user_id, &task_id).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(err) => error_response(err, "task status lookup failed"),
    }
}

/// Takes raw bytes so unparseable bodies still get a 200 ack instead of
/// axum's extractor rejection.
pub async fn generation_callback(State(state): State<AppState>, body: Bytes) -> Response {
    match callback_service::parse_callback_body(&body) {
        Ok(decoded) => {
            info!(task_id = %decoded.task_id, provider = decoded.provider, "generation callback received");
            callback_service::dispatch_settlement(&state, decoded);
            (
                StatusCode::OK,
                Json(CallbackAck {
                    success: true,
                    message: Some("callback accepted".to_string()),
                    error: None,
                }),
            )
                .into_response()
        }
        Err(rejection) => {
            callback_service::record_rejection(&rejection);
            let status = if rejection.rejectable() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::OK
            };
            let err = AppError::malformed_callback(status, rejection.to_string());
            (
                err.status,
                Json(CallbackAck {
                    success: false,
                    message: None,
                    error: Some(err.message),
                }),
            )
                .into_response()
        }
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let m = metrics_service::snapshot();
    let metrics = HealthMetricsView {
        tasks_submitted: m.tasks_submitted,
        tasks_completed: m.tasks_completed,
        tasks_failed: m.tasks_failed,
        tasks_timed_out: m.tasks_timed_out,
        callbacks_accepted: m.callbacks_accepted,
        callbacks_rejected: m.callbacks_rejected,
        credits_debited: m.credits_debited,
        settlement_errors: m.settlement_errors,
    };
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            store: state.tasks.backend().to_string(),
            image_provider_configured: state.image_provider.is_configured(),
            video_provider_configured: state.video_provider.is_configured(),
            metrics,
        }),
    )
}

fn session_user_id(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    let secret = state
        .config
        .session_jwt_secret
        .as_deref()
        .ok_or_else(|| AppError::unauthenticated("sessions are not configured"))?;
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::unauthenticated("missing bearer session token"))?;
    let claims = verify_session_token(token, secret).map_err(AppError::unauthenticated)?;
    Ok(claims.sub)
}

/// Session first, body second: an anonymous caller gets 401 whatever it sent.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::invalid_request(format!("invalid request body: {e}")))
}

fn error_response(err: AppError, context: &'static str) -> Response {
    warn!(error_code = err.code, reason = %err.message, "{context}");
    let (required, current) = match err.shortfall {
        Some(s) => (Some(s.required), Some(s.current)),
        None => (None, None),
    };
    (
        err.status,
        Json(ErrorResponse {
            success: false,
            error: err.code.to_string(),
            message: err.message,
            required,
            current,
        }),
    )
        .into_response()
}
