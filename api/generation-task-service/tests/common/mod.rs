#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use generation_task_service::app::{AppState, build_router};
use generation_task_service::config::environment::AppConfig;
use generation_task_service::module::generation_task::crud::{MemoryTaskStore, TaskStore};
use generation_task_service::module::generation_task::model::{NewTask, TaskRecord, TaskType};
use generation_task_service::module::user_account::crud::{MemoryUserStore, UserStore};
use generation_task_service::module::user_account::model::{PlanTier, UserRecord};
use generation_task_service::service::provider_service::{
    NormalizedResult, ProviderAdapter, ProviderError, ProviderSubmission,
};
use generation_task_service::service::session_auth_service::issue_session_token;
use http::{Request, StatusCode};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::util::ServiceExt;

pub const SESSION_SECRET: &str = "test-session-secret";

pub fn test_config() -> AppConfig {
    AppConfig {
        rust_env: "test".to_string(),
        api_host: "127.0.0.1".to_string(),
        api_port: 0,
        mongodb_url: None,
        mongodb_database: None,
        public_base_url: Some("http://app.test".to_string()),
        cors_allowed_origins: "http://localhost:3000".to_string(),
        image_provider_base_url: "http://127.0.0.1:9".to_string(),
        image_provider_api_key: None,
        video_provider_base_url: "http://127.0.0.1:9".to_string(),
        video_provider_api_key: None,
        video_provider_model: "text-to-video".to_string(),
        provider_timeout_seconds: 1,
        task_timeout_seconds: 900,
        session_jwt_secret: Some(SESSION_SECRET.to_string()),
    }
}

/// Provider double: hands out sequential task ids and replays queued status
/// results. An empty queue reads as still generating; a queued `None` reads
/// as the provider being unreachable.
pub struct ScriptedProvider {
    prefix: &'static str,
    task_type: TaskType,
    issued: AtomicUsize,
    queries: AtomicUsize,
    submit_rejection: Mutex<Option<String>>,
    statuses: Mutex<VecDeque<Option<NormalizedResult>>>,
    submissions: Mutex<Vec<ProviderSubmission>>,
}

impl ScriptedProvider {
    pub fn new(prefix: &'static str, task_type: TaskType) -> Self {
        Self {
            prefix,
            task_type,
            issued: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            submit_rejection: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn reject_submissions_with(&self, message: &str) {
        *self.submit_rejection.lock().unwrap() = Some(message.to_string());
    }

    pub fn push_status(&self, result: NormalizedResult) {
        self.statuses.lock().unwrap().push_back(Some(result));
    }

    pub fn push_unreachable(&self) {
        self.statuses.lock().unwrap().push_back(None);
    }

    pub fn submissions(&self) -> Vec<ProviderSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.prefix
    }

    fn task_type(&self) -> TaskType {
        self.task_type
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn submit(&self, submission: &ProviderSubmission) -> Result<String, ProviderError> {
        if let Some(message) = self.submit_rejection.lock().unwrap().clone() {
            return Err(ProviderError::Rejected { code: 422, message });
        }
        self.submissions.lock().unwrap().push(submission.clone());
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{}-{n}", self.prefix))
    }

    async fn query_status(&self, _provider_task_id: &str) -> Result<NormalizedResult, ProviderError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        match self.statuses.lock().unwrap().pop_front() {
            Some(Some(result)) => Ok(result),
            Some(None) => Err(ProviderError::Transport("connection refused".to_string())),
            None => Ok(NormalizedResult::InProgress),
        }
    }
}

pub struct Harness {
    pub state: AppState,
    pub tasks: Arc<MemoryTaskStore>,
    pub users: Arc<MemoryUserStore>,
    pub image: Arc<ScriptedProvider>,
    pub video: Arc<ScriptedProvider>,
}

impl Harness {
    pub fn new() -> Self {
        let tasks = Arc::new(MemoryTaskStore::default());
        let users = Arc::new(MemoryUserStore::default());
        let image = Arc::new(ScriptedProvider::new("img", TaskType::Image));
        let video = Arc::new(ScriptedProvider::new("vid", TaskType::Video));
        let state = AppState::with_components(
            test_config(),
            tasks.clone(),
            users.clone(),
            image.clone(),
            video.clone(),
        );
        Self {
            state,
            tasks,
            users,
            image,
            video,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn seed_user(&self, user_id: &str, credits: i64, plan: PlanTier) {
        self.users
            .insert(UserRecord::new(user_id, credits, plan))
            .expect("seed user");
    }

    /// Inserts an in-flight task directly, optionally backdated.
    pub async fn seed_task(
        &self,
        task_id: &str,
        user_id: &str,
        task_type: TaskType,
        credits_reserved: i64,
        created_at: i64,
    ) -> TaskRecord {
        let task = TaskRecord::pending(
            NewTask {
                task_id: task_id.to_string(),
                user_id: user_id.to_string(),
                prompt: "a quiet harbor at dawn".to_string(),
                task_type,
                num_images: matches!(task_type, TaskType::Image).then_some(1),
                credits_reserved,
            },
            created_at,
        );
        self.tasks.create(task).await.expect("seed task")
    }

    pub async fn user(&self, user_id: &str) -> UserRecord {
        self.users
            .find_by_id(user_id)
            .await
            .expect("load user")
            .expect("user exists")
    }

    pub async fn task(&self, task_id: &str) -> TaskRecord {
        self.tasks
            .find_by_task_id(task_id)
            .await
            .expect("load task")
            .expect("task exists")
    }

    /// Callback settlement runs detached; wait until it lands.
    pub async fn wait_for_terminal(&self, task_id: &str) -> TaskRecord {
        for _ in 0..200 {
            let task = self.task(task_id).await;
            if task.status.is_terminal() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {task_id} never reached a terminal state");
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn bearer(user_id: &str) -> String {
    let (token, _) = issue_session_token(user_id, SESSION_SECRET, 3600).expect("issue token");
    format!("Bearer {token}")
}

pub async fn post_json(
    app: Router,
    uri: &str,
    auth: Option<&str>,
    body: &Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    let req = builder
        .body(Body::from(serde_json::to_vec(body).expect("encode body")))
        .expect("request");
    send(app, req).await
}

pub async fn post_raw(app: Router, uri: &str, body: &'static str) -> (StatusCode, Value) {
    post_raw_with_auth(app, uri, None, body).await
}

pub async fn post_raw_with_auth(
    app: Router,
    uri: &str,
    auth: Option<&str>,
    body: &'static str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    let req = builder.body(Body::from(body)).expect("request");
    send(app, req).await
}

pub async fn get_json(app: Router, uri: &str, auth: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    let req = builder.body(Body::empty()).expect("request");
    send(app, req).await
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.expect("response");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}
