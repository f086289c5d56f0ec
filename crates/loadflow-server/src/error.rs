use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use loadflow_core::models::{CoreError, CoreErrorKind};

/// Error returned by every handler, rendered as
/// `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn unknown_computation(name: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "UnknownComputation",
            format!("no computation named '{name}'"),
        )
    }

    pub fn invalid_body(error: impl std::fmt::Display) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "InvalidInput",
            format!("request body is not valid JSON: {error}"),
        )
    }

    /// An id that does not parse can never name a task.
    pub fn unknown_task_id(raw: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "TaskNotFound",
            format!("no task with id '{raw}'"),
        )
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        let status = match error.kind {
            CoreErrorKind::AdmissionRejected => StatusCode::SERVICE_UNAVAILABLE,
            CoreErrorKind::TaskNotFound | CoreErrorKind::ResultNotReady => StatusCode::NOT_FOUND,
            CoreErrorKind::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
            CoreErrorKind::InvalidTransition | CoreErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, format!("{:?}", error.kind), error.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(kind = %self.kind, message = %self.message, "request failed");
        }
        let body = Json(serde_json::json!({
            "error": {
                "kind": self.kind,
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}
