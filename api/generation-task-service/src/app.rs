use crate::config::db::MongoConfig;
use crate::config::environment::AppConfig;
use crate::infra::{InfraClients, init_infra};
use crate::module::generation_task::crud::{MemoryTaskStore, MongoTaskStore, TaskStore};
use crate::module::generation_task::model::TaskType;
use crate::module::generation_task::route::register_routes;
use crate::module::user_account::crud::{MemoryUserStore, MongoUserStore, UserStore};
use crate::service::image_provider_service::HttpImageProvider;
use crate::service::provider_service::ProviderAdapter;
use crate::service::video_provider_service::HttpVideoProvider;
use axum::Router;
use axum::http::{HeaderValue, Method};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub tasks: Arc<dyn TaskStore>,
    pub users: Arc<dyn UserStore>,
    pub image_provider: Arc<dyn ProviderAdapter>,
    pub video_provider: Arc<dyn ProviderAdapter>,
}

impl AppState {
    /// Connects the configured system of record. A configured but unreachable
    /// MongoDB is an error: the in-memory stores hold no users and would drop
    /// every callback for tasks already persisted.
    pub async fn bootstrap(config: AppConfig) -> Result<Self, String> {
        let infra = init_infra(MongoConfig::from_app(&config)).await?;
        if infra.is_none() {
            warn!("MONGODB_URL not set; using empty in-memory stores (local testing only)");
        }
        Self::new(config, infra)
    }

    /// MongoDB-backed stores when infra is up, in-memory otherwise.
    pub fn new(config: AppConfig, infra: Option<InfraClients>) -> Result<Self, String> {
        let (tasks, users): (Arc<dyn TaskStore>, Arc<dyn UserStore>) = match &infra {
            Some(infra) => (
                Arc::new(MongoTaskStore::new(&infra.mongo_db)),
                Arc::new(MongoUserStore::new(&infra.mongo_db)),
            ),
            None => (
                Arc::new(MemoryTaskStore::default()),
                Arc::new(MemoryUserStore::default()),
            ),
        };
        let image_provider = Arc::new(HttpImageProvider::new(
            &config.image_provider_base_url,
            config.image_provider_api_key.clone(),
            config.provider_timeout_seconds,
        )?);
        let video_provider = Arc::new(HttpVideoProvider::new(
            &config.video_provider_base_url,
            config.video_provider_api_key.clone(),
            &config.video_provider_model,
            config.provider_timeout_seconds,
        )?);
        Ok(Self::with_components(
            config,
            tasks,
            users,
            image_provider,
            video_provider,
        ))
    }

    pub fn with_components(
        config: AppConfig,
        tasks: Arc<dyn TaskStore>,
        users: Arc<dyn UserStore>,
        image_provider: Arc<dyn ProviderAdapter>,
        video_provider: Arc<dyn ProviderAdapter>,
    ) -> Self {
        Self {
            config,
            tasks,
            users,
            image_provider,
            video_provider,
        }
    }

    pub fn provider_for(&self, task_type: TaskType) -> &Arc<dyn ProviderAdapter> {
        match task_type {
            TaskType::Image => &self.image_provider,
            TaskType::Video => &self.video_provider,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let mut origins: Vec<HeaderValue> = state
        .config
        .allowed_origins()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if origins.is_empty() {
        origins.push(HeaderValue::from_static("http://localhost:3000"));
    }
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    register_routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
