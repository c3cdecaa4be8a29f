use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use snafu::Snafu;

use super::Detail;
use crate::service::ServiceError;
use crate::store::StoreError;
use crate::Located;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(context(false), display("{source}"))]
    Service { source: ServiceError },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Service { source } => match source {
                ServiceError::Invalid { .. } | ServiceError::Filter { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ServiceError::Store {
                    source: StoreError::NotFound { .. },
                } => StatusCode::NOT_FOUND,
                ServiceError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let detail = match &self {
            ApiError::Service {
                source: ServiceError::Store { source },
            } if status.is_server_error() => {
                tracing::error!(error = %source, location = %source.location(), "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(Detail::new(detail))).into_response()
    }
}
