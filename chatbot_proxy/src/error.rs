use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::client::UpstreamError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Message is required")]
    MissingMessage,
    #[error("Message must be a string")]
    NotAString,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::MissingMessage | ProxyError::NotAString => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": self.to_string() }))).into_response()
            }
            ProxyError::Upstream(e) => {
                tracing::error!("completion request failed: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": "Upstream completion failed", "details": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
