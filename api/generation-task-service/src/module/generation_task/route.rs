use super::controller;
use crate::app::AppState;
use axum::Router;
use axum::routing::{get, post};

pub fn register_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/generate/image", post(controller::generate_image))
        .route("/api/generate/video", post(controller::generate_video))
        .route(
            "/api/callback/generation",
            post(controller::generation_callback),
        )
        .route(
            "/api/task-status/:task_id",
            get(controller::get_task_status),
        )
        .route("/api/health", get(controller::health))
        .with_state(state)
}
