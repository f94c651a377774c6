use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use touchline_core::error::TouchlineError;

/// Error body returned by the API: `{"error": {"kind", "message"}}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            kind: "validation",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<TouchlineError> for ApiError {
    fn from(e: TouchlineError) -> Self {
        let (status, kind) = match &e {
            TouchlineError::Routing(_) => (StatusCode::BAD_GATEWAY, "routing"),
            TouchlineError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation"),
            TouchlineError::Provider { .. }
            | TouchlineError::ProviderTimeout { .. }
            | TouchlineError::LlmRequest(_)
            | TouchlineError::LlmStream(_)
            | TouchlineError::LlmParse(_) => (StatusCode::BAD_GATEWAY, "upstream"),
            TouchlineError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
            // Invariant violations, graph and config errors are our own defects.
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        Self {
            status,
            kind,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "kind": self.kind,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}
