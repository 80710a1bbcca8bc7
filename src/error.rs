use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/* -------------------------
   Core taxonomy
--------------------------*/

/// Failures of the backing store (snapshot loads and document mutations).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
    #[error("{collection} document {id} not found")]
    NotFound { collection: &'static str, id: Uuid },
    #[error("malformed {collection} document: {reason}")]
    Malformed {
        collection: &'static str,
        reason: String,
    },
}

/// Failures while classifying a raw change notification.
///
/// A malformed event is dropped by the caller; it never aborts the
/// reconciliation loop.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("malformed change event: {0}")]
    MalformedEvent(String),
}

/* -------------------------
   HTTP surface
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Internal(String),
}

impl ApiError {
    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => {
                ApiError::NotFound("NOT_FOUND", format!("{collection} document {id} not found"))
            }
            other => ApiError::Internal(format!("store error: {other}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg),
            )
                .into_response(),
        }
    }
}
