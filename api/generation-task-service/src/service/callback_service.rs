use crate::app::AppState;
use crate::service::provider_service::NormalizedResult;
use crate::service::{
    image_provider_service, metrics_service, settlement_service, video_provider_service,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackRejection {
    #[error("callback body is not valid json: {0}")]
    InvalidJson(String),

    #[error("callback payload matches no known provider shape")]
    UnrecognizedShape,

    #[error("{provider} callback is missing a task id")]
    MissingTaskId { provider: &'static str },

    #[error("{provider} callback has unrecognized status {code}")]
    UnrecognizedCode { provider: &'static str, code: String },
}

impl CallbackRejection {
    /// Structural problems with an identified provider payload may be
    /// rejected with 400; everything else is acknowledged so the provider
    /// stops retrying a body that will never parse.
    pub fn rejectable(&self) -> bool {
        matches!(
            self,
            Self::MissingTaskId { .. } | Self::UnrecognizedCode { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCallback {
    pub provider: &'static str,
    pub task_id: String,
    pub result: NormalizedResult,
}

type ShapePredicate = fn(&Value) -> bool;
type ShapeDecoder = fn(&Value) -> Result<(String, NormalizedResult), CallbackRejection>;

/// Checked in order; the first matching predicate owns the payload.
static CALLBACK_SHAPES: [(&str, ShapePredicate, ShapeDecoder); 2] = [
    (
        video_provider_service::PROVIDER_NAME,
        has_data_field_state as ShapePredicate,
        video_provider_service::decode_callback as ShapeDecoder,
    ),
    (
        image_provider_service::PROVIDER_NAME,
        has_data_field_info as ShapePredicate,
        image_provider_service::decode_callback as ShapeDecoder,
    ),
];

fn data_has_key(payload: &Value, key: &str) -> bool {
    payload
        .get("data")
        .and_then(Value::as_object)
        .is_some_and(|data| data.contains_key(key))
}

fn has_data_field_state(payload: &Value) -> bool {
    data_has_key(payload, "state")
}

fn has_data_field_info(payload: &Value) -> bool {
    data_has_key(payload, "info")
}

pub fn parse_callback_body(body: &[u8]) -> Result<DecodedCallback, CallbackRejection> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| CallbackRejection::InvalidJson(e.to_string()))?;
    decode_callback(&payload)
}

pub fn decode_callback(payload: &Value) -> Result<DecodedCallback, CallbackRejection> {
    let (provider, _, decode) = CALLBACK_SHAPES
        .iter()
        .find(|(_, is_shape, _)| is_shape(payload))
        .copied()
        .ok_or(CallbackRejection::UnrecognizedShape)?;
    let (task_id, result) = decode(payload)?;
    Ok(DecodedCallback {
        provider,
        task_id,
        result,
    })
}

/// Hands the decoded callback to the resolver on a detached task so the
/// webhook ack never waits on store round-trips.
pub fn dispatch_settlement(state: &AppState, callback: DecodedCallback) {
    metrics_service::inc_callbacks_accepted();
    let state = state.clone();
    let handle = tokio::spawn(async move {
        let outcome = settlement_service::settle(&state, &callback.task_id, callback.result).await;
        info!(
            task_id = %callback.task_id,
            provider = callback.provider,
            outcome = outcome.as_str(),
            "callback settlement finished"
        );
    });
    tokio::spawn(async move {
        if let Err(e) = handle.await {
            error!(error = %e, "callback settlement task panicked");
        }
    });
}

pub fn record_rejection(rejection: &CallbackRejection) {
    metrics_service::inc_callbacks_rejected();
    warn!(reason = %rejection, "generation callback rejected");
}
