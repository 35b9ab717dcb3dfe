//! Relay for the dashboard chatbot: forwards a message to a hosted language
//! model and returns the streamed completion as a single JSON value.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod client;
pub mod config;
pub mod error;
pub mod routes;
pub mod types;

use client::CompletionClient;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn CompletionClient>,
}

impl AppState {
    pub fn new(client: impl CompletionClient + 'static) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/get_response", post(routes::get_response))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
