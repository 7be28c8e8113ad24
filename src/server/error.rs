//! API error mapping
//!
//! Bodies carry a categorical message and a stable code. Provider payloads,
//! secret names and storage paths stay in the logs.

use crate::error::{AuthError, Error};
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] Error),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self { ApiError::Core(e.into()) }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self { ApiError::BadRequest(e.body_text()) }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self { ApiError::BadRequest(e.body_text()) }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn auth_code(e: AuthError) -> &'static str {
    match e {
        AuthError::InvalidAddress => "INVALID_ADDRESS",
        AuthError::ChallengeExpired => "CHALLENGE_EXPIRED",
        AuthError::InvalidSignature => "INVALID_SIGNATURE",
        AuthError::InvalidToken => "INVALID_TOKEN",
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(Error::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(Error::Auth(AuthError::InvalidAddress)) => StatusCode::BAD_REQUEST,
            ApiError::Core(Error::Auth(_)) => StatusCode::UNAUTHORIZED,
            ApiError::Core(Error::Gateway(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Core(Error::Storage(_) | Error::Secret(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Core(Error::Config(_) | Error::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            ApiError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => ("BAD_REQUEST", msg.clone()),
            ApiError::Core(Error::Validation(e)) => ("VALIDATION_ERROR", e.to_string()),
            ApiError::Core(Error::Auth(e)) => (auth_code(*e), e.to_string()),
            ApiError::Core(Error::Gateway(e)) => {
                error!(kind = e.kind.as_str(), "gateway fault: {}", e.message);
                ("GATEWAY_ERROR", "signing gateway unavailable".to_string())
            }
            ApiError::Core(Error::Storage(e)) => {
                error!("storage fault: {e}");
                ("STORAGE_UNAVAILABLE", "ledger unavailable".to_string())
            }
            ApiError::Core(Error::Secret(e)) => {
                error!("secret fault: {e}");
                ("SECRET_UNAVAILABLE", "credentials unavailable".to_string())
            }
            ApiError::Core(Error::Config(e) | Error::Internal(e)) => {
                error!("internal fault: {e}");
                ("INTERNAL_ERROR", "internal error".to_string())
            }
        };

        let body = ErrorResponse { error: message, code: code.to_string() };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
