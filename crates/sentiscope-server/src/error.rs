//! API error type and its HTTP mapping.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use sentiscope_ai::InferenceError;
use sentiscope_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::AuthError;

pub const INVALID_CREDENTIALS: &str = "Incorrect email or password";
pub const INVALID_TOKEN: &str = "Could not validate credentials";

#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 with `WWW-Authenticate: Bearer`.
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("sentiment model unavailable: {0}")]
    ModelUnavailable(#[from] InferenceError),

    /// Logged in full; the client only sees a generic message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Unauthorized(msg) => (*msg).to_string(),
            Self::BadRequest(msg) | Self::Validation(msg) => msg.clone(),
            Self::ModelUnavailable(_) => "Sentiment model unavailable".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(cause) => error!(error = %cause, "request failed"),
            Self::ModelUnavailable(cause) => error!(error = %cause, "inference failed"),
            _ => {}
        }

        let status = self.status();
        let body = Json(json!({ "detail": self.detail() }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => Self::BadRequest("Email already registered".to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized(INVALID_CREDENTIALS),
            AuthError::InvalidToken => Self::Unauthorized(INVALID_TOKEN),
            AuthError::Store(e) => e.into(),
            AuthError::Hash(msg) => Self::Internal(format!("password hashing: {msg}")),
            AuthError::Token(e) => Self::Internal(format!("token encoding: {e}")),
            AuthError::ExpiryOutOfRange => Self::Internal("token expiry out of range".into()),
        }
    }
}
