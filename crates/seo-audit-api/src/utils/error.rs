use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::repositories::StoreError;
use crate::services::job_queue::JobQueueError;
use crate::services::seo_provider::ProviderError;
use crate::utils::response::ApiResponse;
use crate::utils::validation::FieldErrors;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Unauthorized => ApiResponse::failure("Authentication required", None),
            ApiError::NotFound(msg) => {
                tracing::debug!("Not found: {}", msg);
                ApiResponse::failure(msg, None)
            }
            ApiError::Validation(details) => {
                tracing::debug!("Validation failed: {:?}", details);
                ApiResponse::failure("Validation failed", Some(details))
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                ApiResponse::failure(msg, None)
            }
            ApiError::Conflict(msg) => {
                tracing::info!("Conflict: {}", msg);
                ApiResponse::failure(msg, None)
            }
            ApiError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                ApiResponse::failure(INTERNAL_MESSAGE, None)
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ApiResponse::failure(INTERNAL_MESSAGE, None)
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Database(msg) => ApiError::Database(msg),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        ApiError::Internal(format!("SEO provider: {}", err))
    }
}

impl From<JobQueueError> for ApiError {
    fn from(err: JobQueueError) -> Self {
        ApiError::Internal(format!("Job queue: {}", err))
    }
}
