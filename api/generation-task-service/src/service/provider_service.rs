use crate::module::generation_task::model::TaskType;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Provider-agnostic view of a generation result. Adapters own the mapping
/// from their status vocabulary into these three cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedResult {
    InProgress,
    Success { payload_urls: Vec<String> },
    Failure { reason: String },
}

/// "We don't know" errors. A provider that explicitly reports a failed
/// generation yields `NormalizedResult::Failure` instead.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transport(String),

    #[error("provider returned http status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider payload could not be decoded: {0}")]
    Decode(String),

    #[error("provider rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },
}

impl ProviderError {
    /// Provider-supplied text, if any, for sanitizing before display.
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => Some(message),
            Self::Status { body, .. } => Some(body),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSubmission {
    Image {
        prompt: String,
        num_images: u32,
        aspect_ratio: String,
        pro: bool,
        callback_url: String,
    },
    Video {
        prompt: String,
        duration_seconds: u32,
        sound: bool,
        aspect_ratio: String,
        callback_url: String,
    },
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn task_type(&self) -> TaskType;

    fn is_configured(&self) -> bool;

    /// Returns the provider-issued task id.
    async fn submit(&self, submission: &ProviderSubmission) -> Result<String, ProviderError>;

    async fn query_status(&self, provider_task_id: &str) -> Result<NormalizedResult, ProviderError>;
}

/// Both providers wrap payloads as `{code, msg, data}`; a non-200 code is a
/// request-level rejection rather than a generation outcome.
pub fn unwrap_envelope(payload: Value) -> Result<Value, ProviderError> {
    let code = payload.get("code").and_then(Value::as_i64).unwrap_or(200);
    if code != 200 {
        let message = payload
            .get("msg")
            .or_else(|| payload.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("provider rejected the request")
            .to_string();
        return Err(ProviderError::Rejected { code, message });
    }
    payload
        .get("data")
        .cloned()
        .filter(|d| !d.is_null())
        .ok_or_else(|| ProviderError::Decode("response is missing data".to_string()))
}

pub async fn read_json_response(resp: reqwest::Response) -> Result<Value, ProviderError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: trim_log(&body),
        });
    }
    resp.json::<Value>()
        .await
        .map_err(|e| ProviderError::Decode(e.to_string()))
}

pub fn build_http_client(timeout_seconds: i64) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds.max(1) as u64))
        .build()
        .map_err(|e| format!("failed to build http client: {e}"))
}

pub fn string_list(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

pub fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

fn trim_log(input: &str) -> String {
    let trimmed = input.trim();
    match trimmed.char_indices().nth(300) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
