use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::ProxyError;
use crate::types::{ChatMessage, ChatRequest, ChatResponse};
use crate::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Relay one user message and return the buffered completion.
pub async fn get_response(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ChatResponse>, ProxyError> {
    let message = match payload {
        Ok(Json(body)) => ChatRequest::from(body).message,
        Err(e) => {
            tracing::debug!("unreadable chat body: {}", e.body_text());
            None
        }
    };
    let message = match message {
        None | Some(Value::Null) => return Err(ProxyError::MissingMessage),
        Some(Value::String(s)) if s.is_empty() => return Err(ProxyError::MissingMessage),
        Some(Value::String(s)) => s,
        Some(_) => return Err(ProxyError::NotAString),
    };

    let messages = [ChatMessage::user(message)];
    let response = state.client.complete(&messages).await?;
    tracing::info!(chars = response.len(), "completion relayed");
    Ok(Json(ChatResponse { response }))
}
