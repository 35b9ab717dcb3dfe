use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::model::TrainError;
use crate::types::TableError;

/// Everything `/predict` can answer with besides a forecast.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("No data provided")]
    MissingData,
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
    #[error("Insufficient data for prediction, need at least {required} rows")]
    InsufficientRows { required: usize },
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error("prediction task failed: {0}")]
    Task(String),
}

impl From<TableError> for ForecastError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::Empty => ForecastError::MissingData,
            TableError::Malformed(details) => ForecastError::InvalidFormat(details),
        }
    }
}

impl ForecastError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForecastError::MissingData
            | ForecastError::InvalidFormat(_)
            | ForecastError::InsufficientRows { .. }
            | ForecastError::Train(TrainError::NotEnoughData { .. }) => StatusCode::BAD_REQUEST,
            ForecastError::Train(_) | ForecastError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ForecastError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ForecastError::MissingData | ForecastError::InsufficientRows { .. } => {
                json!({ "error": self.to_string() })
            }
            ForecastError::InvalidFormat(details) => {
                json!({ "error": "Invalid data format", "details": details })
            }
            ForecastError::Train(e @ TrainError::NotEnoughData { .. }) => {
                json!({ "error": e.to_string() })
            }
            ForecastError::Train(e) => {
                tracing::error!("Error during prediction: {}", e);
                json!({ "error": "Error during prediction", "details": e.to_string() })
            }
            ForecastError::Task(details) => {
                tracing::error!("Error during prediction: {}", details);
                json!({ "error": "Error during prediction", "details": details })
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(err: ForecastError) -> (StatusCode, Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn input_problems_are_bad_requests() {
        let (status, body) = render(ForecastError::MissingData).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No data provided");
        assert!(body.get("details").is_none());

        let (status, body) = render(ForecastError::InvalidFormat("missing field `PCEmissions`".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid data format");
        assert_eq!(body["details"], "missing field `PCEmissions`");

        let (status, body) = render(ForecastError::InsufficientRows { required: 10 }).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Insufficient data for prediction, need at least 10 rows");
    }

    #[tokio::test]
    async fn not_enough_data_stays_a_bad_request() {
        let (status, body) = render(TrainError::NotEnoughData { required: 10 }.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Not enough data to train the model. Minimum data points required: 10"
        );
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn fit_and_inference_failures_are_server_errors() {
        let cases: Vec<(ForecastError, &str)> = vec![
            (TrainError::NonFinite.into(), "non-finite"),
            (TrainError::WindowLength { got: 3, expected: 10 }.into(), "got 3, expected 10"),
            (TrainError::Torch(tch::TchError::Torch("shape mismatch".into())).into(), "shape mismatch"),
            (ForecastError::Task("task panicked".into()), "task panicked"),
        ];
        for (err, detail) in cases {
            let (status, body) = render(err).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["error"], "Error during prediction");
            let details = body["details"].as_str().unwrap();
            assert!(details.contains(detail), "{} missing {}", details, detail);
        }
    }
}
