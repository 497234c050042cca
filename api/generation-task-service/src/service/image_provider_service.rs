use crate::module::generation_task::model::TaskType;
use crate::service::callback_service::CallbackRejection;
use crate::service::provider_service::{
    NormalizedResult, ProviderAdapter, ProviderError, ProviderSubmission, build_http_client,
    non_empty_str, read_json_response, string_list, unwrap_envelope,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

pub const PROVIDER_NAME: &str = "image-provider";

/// Integer status codes the image provider sends in callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCallbackCode {
    Success,
    PolicyViolation,
    InputFetchFailed,
    InternalError,
    GenerationFailed,
}

impl ImageCallbackCode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            200 => Some(Self::Success),
            400 => Some(Self::PolicyViolation),
            451 => Some(Self::InputFetchFailed),
            500 => Some(Self::InternalError),
            501 => Some(Self::GenerationFailed),
            _ => None,
        }
    }

    fn default_reason(&self) -> &'static str {
        match self {
            Self::Success => "",
            Self::PolicyViolation => "the prompt was rejected by the content policy",
            Self::InputFetchFailed => "the provider could not fetch the input image",
            Self::InternalError => "the image provider hit an internal error",
            Self::GenerationFailed => "image generation failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpImageProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpImageProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout_seconds: i64,
    ) -> Result<Self, String> {
        Ok(Self {
            client: build_http_client(timeout_seconds)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Transport("image provider api key is not configured".to_string()))
    }
}

#[async_trait]
impl ProviderAdapter for HttpImageProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn task_type(&self) -> TaskType {
        TaskType::Image
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn submit(&self, submission: &ProviderSubmission) -> Result<String, ProviderError> {
        let ProviderSubmission::Image {
            prompt,
            num_images,
            aspect_ratio,
            pro,
            callback_url,
        } = submission
        else {
            return Err(ProviderError::Decode(
                "image provider received a non-image submission".to_string(),
            ));
        };
        let body = json!({
            "prompt": prompt,
            "size": aspect_ratio,
            "nVariants": num_images,
            "isEnhance": pro,
            "callBackUrl": callback_url,
        });
        let resp = self
            .client
            .post(format!("{}/api/v1/image/generate", self.base_url))
            .bearer_auth(self.api_key()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let data = unwrap_envelope(read_json_response(resp).await?)?;
        non_empty_str(data.get("taskId"))
            .ok_or_else(|| ProviderError::Decode("submit response is missing taskId".to_string()))
    }

    async fn query_status(&self, provider_task_id: &str) -> Result<NormalizedResult, ProviderError> {
        let resp = self
            .client
            .get(format!("{}/api/v1/image/record-info", self.base_url))
            .query(&[("taskId", provider_task_id)])
            .bearer_auth(self.api_key()?)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let data = unwrap_envelope(read_json_response(resp).await?)?;
        decode_record(&data)
    }
}

/// Maps a `record-info` payload: `successFlag` 0 = generating, 1 = done,
/// 2 = failed.
pub fn decode_record(data: &Value) -> Result<NormalizedResult, ProviderError> {
    let flag = data
        .get("successFlag")
        .and_then(Value::as_i64)
        .ok_or_else(|| ProviderError::Decode("record is missing successFlag".to_string()))?;
    match flag {
        0 => Ok(NormalizedResult::InProgress),
        1 => Ok(NormalizedResult::Success {
            payload_urls: string_list(data.get("response").and_then(|r| r.get("resultUrls"))),
        }),
        2 => Ok(NormalizedResult::Failure {
            reason: non_empty_str(data.get("errorMessage"))
                .unwrap_or_else(|| ImageCallbackCode::GenerationFailed.default_reason().to_string()),
        }),
        other => Err(ProviderError::Decode(format!("unknown successFlag {other}"))),
    }
}

/// Decodes an image provider callback (`data.info` shape).
pub fn decode_callback(payload: &Value) -> Result<(String, NormalizedResult), CallbackRejection> {
    let data = payload.get("data");
    let task_id = non_empty_str(data.and_then(|d| d.get("taskId").or_else(|| d.get("task_id"))))
        .ok_or(CallbackRejection::MissingTaskId {
            provider: PROVIDER_NAME,
        })?;
    let raw_code = payload.get("code");
    let code = raw_code
        .and_then(Value::as_i64)
        .and_then(ImageCallbackCode::from_code)
        .ok_or_else(|| CallbackRejection::UnrecognizedCode {
            provider: PROVIDER_NAME,
            code: raw_code.map(Value::to_string).unwrap_or_else(|| "missing".to_string()),
        })?;

    let result = match code {
        ImageCallbackCode::Success => {
            let info = data.and_then(|d| d.get("info"));
            let urls = string_list(info.and_then(|i| i.get("result_urls").or_else(|| i.get("resultUrls"))));
            NormalizedResult::Success { payload_urls: urls }
        }
        failure => NormalizedResult::Failure {
            reason: non_empty_str(payload.get("msg"))
                .unwrap_or_else(|| failure.default_reason().to_string()),
        },
    };
    Ok((task_id, result))
}
