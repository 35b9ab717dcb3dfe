//! On-the-fly sequence forecasting service for smart-plug energy readings.
//!
//! Every `POST /predict` fits a fresh LSTM on the posted series and returns
//! the predicted next reading.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod model;
pub mod routes;
pub mod types;

use model::TrainConfig;

#[derive(Clone)]
pub struct AppState {
    pub train: Arc<TrainConfig>,
}

impl AppState {
    pub fn new(train: TrainConfig) -> Self {
        Self {
            train: Arc::new(train),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(routes::predict))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
