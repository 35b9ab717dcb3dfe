use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::json;

use crate::error::ForecastError;
use crate::model::forecast_next;
use crate::types::{parse_table, PredictRequest, PredictResponse};
use crate::AppState;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Train on the posted records and forecast the next one.
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<PredictResponse>, ForecastError> {
    let Json(body) = payload.map_err(|e| ForecastError::InvalidFormat(e.body_text()))?;
    let req = PredictRequest::from(body);

    let records = parse_table(req.data)?;
    let required = state.train.sequence_length;
    if records.len() < required {
        tracing::warn!(rows = records.len(), required, "rejecting short series");
        return Err(ForecastError::InsufficientRows { required });
    }

    // CPU-bound fit; keep it off the async workers
    let cfg = state.train.as_ref().clone();
    let next = tokio::task::spawn_blocking(move || forecast_next(&records, &cfg))
        .await
        .map_err(|e| ForecastError::Task(e.to_string()))??;

    tracing::info!(
        avg_power = next.avg_power,
        time_elapsed = next.time_elapsed,
        pc_emissions = next.pc_emissions,
        "forecast ready"
    );
    Ok(Json(PredictResponse::from(next)))
}
