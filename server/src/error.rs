use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use polkagate_balances::AggregatorError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Aggregator(#[from] AggregatorError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Aggregator(err) => match err {
                AggregatorError::UnknownChain(_) | AggregatorError::UnknownAsset(_) => {
                    StatusCode::NOT_FOUND
                }
                AggregatorError::Address(_) => StatusCode::BAD_REQUEST,
                AggregatorError::AlreadyFetching(_) => StatusCode::CONFLICT,
                AggregatorError::Rpc(_) | AggregatorError::Fetch(_) | AggregatorError::PriceFeed(_) => {
                    StatusCode::BAD_GATEWAY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };

        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
