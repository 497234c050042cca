use axum::http::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditShortfall {
    pub required: i64,
    pub current: i64,
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub shortfall: Option<CreditShortfall>,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            shortfall: None,
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
    }

    pub fn insufficient_credits(required: i64, current: i64) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            code: "INSUFFICIENT_CREDITS",
            message: format!(
                "insufficient credits: {required} required, {current} available"
            ),
            shortfall: Some(CreditShortfall { required, current }),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "PROVIDER_ERROR", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn malformed_callback(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, "MALFORMED_CALLBACK", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}
