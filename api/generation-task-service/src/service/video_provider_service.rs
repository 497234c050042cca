use crate::module::generation_task::model::TaskType;
use crate::service::callback_service::CallbackRejection;
use crate::service::provider_service::{
    NormalizedResult, ProviderAdapter, ProviderError, ProviderSubmission, build_http_client,
    non_empty_str, read_json_response, string_list, unwrap_envelope,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

pub const PROVIDER_NAME: &str = "video-provider";

/// Job states reported by the video provider, in both callbacks and
/// `recordInfo` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoJobState {
    Waiting,
    Queuing,
    Generating,
    Success,
    Fail,
}

impl VideoJobState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "waiting" => Some(Self::Waiting),
            "queuing" => Some(Self::Queuing),
            "generating" => Some(Self::Generating),
            "success" => Some(Self::Success),
            "fail" | "failed" => Some(Self::Fail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpVideoProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpVideoProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        timeout_seconds: i64,
    ) -> Result<Self, String> {
        Ok(Self {
            client: build_http_client(timeout_seconds)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Transport("video provider api key is not configured".to_string()))
    }
}

#[async_trait]
impl ProviderAdapter for HttpVideoProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn task_type(&self) -> TaskType {
        TaskType::Video
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn submit(&self, submission: &ProviderSubmission) -> Result<String, ProviderError> {
        let ProviderSubmission::Video {
            prompt,
            duration_seconds,
            sound,
            aspect_ratio,
            callback_url,
        } = submission
        else {
            return Err(ProviderError::Decode(
                "video provider received a non-video submission".to_string(),
            ));
        };
        let body = json!({
            "model": self.model,
            "callBackUrl": callback_url,
            "input": {
                "prompt": prompt,
                "duration": duration_seconds.to_string(),
                "sound": sound,
                "aspect_ratio": aspect_ratio,
            }
        });
        let resp = self
            .client
            .post(format!("{}/api/v1/jobs/createTask", self.base_url))
            .bearer_auth(self.api_key()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let data = unwrap_envelope(read_json_response(resp).await?)?;
        non_empty_str(data.get("taskId"))
            .ok_or_else(|| ProviderError::Decode("createTask response is missing taskId".to_string()))
    }

    async fn query_status(&self, provider_task_id: &str) -> Result<NormalizedResult, ProviderError> {
        let resp = self
            .client
            .get(format!("{}/api/v1/jobs/recordInfo", self.base_url))
            .query(&[("taskId", provider_task_id)])
            .bearer_auth(self.api_key()?)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let data = unwrap_envelope(read_json_response(resp).await?)?;
        let raw_state = data.get("state").and_then(Value::as_str).unwrap_or_default();
        let state = VideoJobState::parse(raw_state)
            .ok_or_else(|| ProviderError::Decode(format!("unknown job state `{raw_state}`")))?;
        Ok(decode_job(state, &data))
    }
}

fn decode_job(state: VideoJobState, data: &Value) -> NormalizedResult {
    match state {
        VideoJobState::Waiting | VideoJobState::Queuing | VideoJobState::Generating => {
            NormalizedResult::InProgress
        }
        VideoJobState::Success => NormalizedResult::Success {
            payload_urls: result_urls(data.get("resultJson")),
        },
        VideoJobState::Fail => {
            let fail_code = non_empty_str(data.get("failCode"))
                .or_else(|| data.get("failCode").and_then(Value::as_i64).map(|c| c.to_string()));
            let reason = non_empty_str(data.get("failMsg")).unwrap_or_else(|| match fail_code {
                Some(code) => format!("video generation failed (code {code})"),
                None => "video generation failed".to_string(),
            });
            NormalizedResult::Failure { reason }
        }
    }
}

/// `resultJson` arrives as a JSON-encoded string or, from some endpoints, an
/// already decoded object.
fn result_urls(result_json: Option<&Value>) -> Vec<String> {
    match result_json {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .map(|v| string_list(v.get("resultUrls")))
            .unwrap_or_default(),
        Some(obj @ Value::Object(_)) => string_list(obj.get("resultUrls")),
        _ => Vec::new(),
    }
}

/// Decodes a video provider callback (`data.state` shape).
pub fn decode_callback(payload: &Value) -> Result<(String, NormalizedResult), CallbackRejection> {
    let data = payload.get("data").cloned().unwrap_or(Value::Null);
    let task_id = non_empty_str(data.get("taskId").or_else(|| data.get("task_id")))
        .ok_or(CallbackRejection::MissingTaskId {
            provider: PROVIDER_NAME,
        })?;
    let raw_state = data.get("state");
    let state = raw_state
        .and_then(Value::as_str)
        .and_then(VideoJobState::parse)
        .ok_or_else(|| CallbackRejection::UnrecognizedCode {
            provider: PROVIDER_NAME,
            code: raw_state.map(Value::to_string).unwrap_or_else(|| "missing".to_string()),
        })?;
    Ok((task_id, decode_job(state, &data)))
}
