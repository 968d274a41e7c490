//! Mapping from service errors to HTTP responses.

use api_shared::{AuthError, ErrorRes};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mobilemed_core::RecordsError;

/// Error type returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    Records(RecordsError),
    BadRequest(String),
    Unauthorized(AuthError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Records(RecordsError::Validation(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Records(RecordsError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Records(RecordsError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Records(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Records(
                e @ (RecordsError::Validation(_)
                | RecordsError::Conflict(_)
                | RecordsError::NotFound(_)),
            ) => e.to_string(),
            ApiError::Records(_) => "Internal error".into(),
            ApiError::BadRequest(message) => message.clone(),
            ApiError::Unauthorized(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {:?}", self);
        }

        let body = ErrorRes {
            status_code: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").into(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RecordsError> for ApiError {
    fn from(err: RecordsError) -> Self {
        ApiError::Records(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
