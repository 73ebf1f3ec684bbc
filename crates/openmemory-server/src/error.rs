//! HTTP error mapping
//!
//! Every failure crosses the wire as `{err, message, violations?, warnings?}`
//! with a status drawn from the core taxonomy. State retrieval handles its
//! own not-found shape (`mode: "INITIALIZE"`) before errors get here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use openmemory_core::CoreError;

/// Wire-level error wrapper
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::EmbedderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::ResourceLocked { .. } => StatusCode::LOCKED,
            CoreError::EnforcementViolation { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match &self.0 {
            CoreError::BadRequest(_) => "BadRequest",
            CoreError::NotFound(_) => "NotFound",
            CoreError::EmbedderUnavailable(_) => "EmbedderUnavailable",
            CoreError::ResourceLocked { .. } => "ResourceLocked",
            CoreError::EnforcementViolation { .. } => "EnforcementViolation",
            CoreError::StoreWriteFailed(_) => "StoreWriteFailed",
            _ => "Internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "err": self.kind(),
            "message": self.0.to_string(),
        });
        if let CoreError::EnforcementViolation { violations, warnings } = &self.0 {
            body["violations"] = serde_json::json!(violations);
            if !warnings.is_empty() {
                body["warnings"] = serde_json::json!(warnings);
            }
        }
        (self.status(), Json(body)).into_response()
    }
}

/// Handler result alias
pub type ApiResult<T> = std::result::Result<T, ApiError>;
