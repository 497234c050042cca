use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rust_env: String,
    pub api_host: String,
    pub api_port: u16,
    pub mongodb_url: Option<String>,
    pub mongodb_database: Option<String>,
    pub public_base_url: Option<String>,
    pub cors_allowed_origins: String,
    pub image_provider_base_url: String,
    pub image_provider_api_key: Option<String>,
    pub video_provider_base_url: String,
    pub video_provider_api_key: Option<String>,
    pub video_provider_model: String,
    pub provider_timeout_seconds: i64,
    pub task_timeout_seconds: i64,
    pub session_jwt_secret: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        load_dotenv_layers();
        Ok(Self {
            rust_env: read_var("RUST_ENV")?,
            api_host: read_var("API_HOST")?,
            api_port: read_var("API_PORT")?
                .parse::<u16>()
                .map_err(|e| format!("invalid API_PORT: {e}"))?,
            mongodb_url: read_non_empty("MONGODB_URL"),
            mongodb_database: read_non_empty("MONGODB_DATABASE"),
            public_base_url: read_non_empty("PUBLIC_BASE_URL"),
            cors_allowed_origins: read_optional_string(
                "CORS_ALLOWED_ORIGINS",
                "http://localhost:3000",
            ),
            image_provider_base_url: read_optional_string(
                "IMAGE_PROVIDER_BASE_URL",
                "https://api.image-provider.invalid",
            ),
            image_provider_api_key: read_non_empty("IMAGE_PROVIDER_API_KEY"),
            video_provider_base_url: read_optional_string(
                "VIDEO_PROVIDER_BASE_URL",
                "https://api.video-provider.invalid",
            ),
            video_provider_api_key: read_non_empty("VIDEO_PROVIDER_API_KEY"),
            video_provider_model: read_optional_string("VIDEO_PROVIDER_MODEL", "text-to-video"),
            provider_timeout_seconds: read_optional_i64("PROVIDER_TIMEOUT_SECONDS", 30)?,
            task_timeout_seconds: read_optional_i64("TASK_TIMEOUT_SECONDS", 900)?,
            session_jwt_secret: read_non_empty("SESSION_JWT_SECRET"),
        })
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }
}

fn read_var(key: &str) -> Result<String, String> {
    env::var(key).map_err(|_| format!("missing required env var: {key}"))
}

fn read_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_optional_i64(key: &str, default: i64) -> Result<i64, String> {
    match env::var(key) {
        Ok(v) => v.parse::<i64>().map_err(|e| format!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn read_optional_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn load_dotenv_layers() {
    for path in [".env", "../.env", "../../.env"] {
        let _ = dotenvy::from_path_override(path);
    }
}
