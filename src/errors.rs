use crate::services::error::UploadError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// HTTP-facing error: a status code plus a human-readable message and
/// the error classification it was built from.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, kind: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: msg.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "kind": self.kind,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let status = match &err {
            UploadError::InvalidIdentifier(_)
            | UploadError::UnsupportedMediaType(_)
            | UploadError::InvalidRequest(_)
            | UploadError::ProbeFailure(_)
            | UploadError::RemuxFailure(_)
            | UploadError::MalformedReference(_) => StatusCode::BAD_REQUEST,
            UploadError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            UploadError::Forbidden(_) => StatusCode::FORBIDDEN,
            UploadError::NotFound(_) => StatusCode::NOT_FOUND,
            UploadError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::IoFailure(_)
            | UploadError::PublishFailure(_)
            | UploadError::PersistFailure(_)
            | UploadError::SigningFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_and_auth_errors_map_to_4xx() {
        let forbidden = AppError::from(UploadError::Forbidden("v".into()));
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
        assert_eq!(forbidden.kind, "Forbidden");

        let unauth = AppError::from(UploadError::Unauthenticated("no token".into()));
        assert_eq!(unauth.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn processing_failures_are_bad_requests() {
        for err in [
            UploadError::UnsupportedMediaType("video/webm".into()),
            UploadError::ProbeFailure("exit 1".into()),
            UploadError::RemuxFailure("exit 1".into()),
        ] {
            assert_eq!(AppError::from(err).status, StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn store_failures_are_server_errors() {
        let err = AppError::from(UploadError::PublishFailure("timeout".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind, "PublishFailure");
    }
}
