//! Body extractors whose rejections render as `{"detail": ...}` 422s.

use axum::extract::FromRequest;
use axum::extract::rejection::{FormRejection, JsonRejection};
use tracing::debug;

use crate::ApiError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct ApiForm<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection.body_text(), "rejected JSON body");
        Self::Validation(format!("Invalid request body: {}", root_cause(&rejection)))
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        debug!(error = %rejection.body_text(), "rejected form body");
        Self::Validation(format!("Invalid form data: {}", root_cause(&rejection)))
    }
}

/// The innermost error, without axum's wrapper prefixes.
fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut cause = err;
    while let Some(next) = cause.source() {
        cause = next;
    }
    cause.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn root_cause_walks_the_chain() {
        let err = Outer(std::io::Error::other("missing field `email`"));
        assert_eq!(root_cause(&err), "missing field `email`");
    }
}
