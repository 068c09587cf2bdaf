use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use findata_market_data::MarketDataError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    MarketData(#[from] MarketDataError),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::MarketData(e) => match e {
                MarketDataError::ProviderSelection { .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, "PROVIDER_UNAVAILABLE")
                }
                MarketDataError::InvalidCategory(_) | MarketDataError::InvalidMarket(_) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        if status.is_server_error() {
            tracing::warn!("Request failed with {}: {}", status, self);
        }
        let body = Json(ErrorBody {
            code,
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
