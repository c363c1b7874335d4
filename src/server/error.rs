use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::GraphError;
use crate::notes::NoteError;
use crate::track::TrackError;

/// Error response: a status code and a `{"detail": ...}` body safe to show users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    /// Log `err` and answer with `detail` only.
    pub fn internal(detail: &str, err: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %err, "{detail}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

impl From<GraphError> for ApiError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::SkillNotFound { name } => Self::not_found(format!("Skill not found: {name}")),
            other => Self::internal("Skill graph error", &other),
        }
    }
}

impl From<TrackError> for ApiError {
    fn from(e: TrackError) -> Self {
        if e.is_invalid_input() {
            return Self::bad_request(e.to_string());
        }
        match e {
            TrackError::NotFound { id } => {
                Self::not_found(format!("Learning track not found: {id}"))
            }
            other => Self::internal("Learning track storage is unavailable", &other),
        }
    }
}

impl From<NoteError> for ApiError {
    fn from(e: NoteError) -> Self {
        match e {
            NoteError::NotFound { .. } => Self::not_found("Note not found"),
            NoteError::Forbidden { .. } => Self::new(StatusCode::FORBIDDEN, "Access denied"),
            other => Self::internal("Note storage is unavailable", &other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request body: {}", e.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::bad_request(format!("Invalid query: {}", e.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_skill_is_not_found() {
        let err: ApiError = GraphError::SkillNotFound {
            name: "cobol".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert!(err.detail.contains("cobol"));
    }

    #[test]
    fn invalid_tracks_are_bad_requests() {
        let err: ApiError = TrackError::EmptyPath.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn foreign_notes_are_forbidden() {
        let err: ApiError = NoteError::Forbidden { id: "n1".into() }.into();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.detail, "Access denied");
    }

    #[test]
    fn backend_failures_hide_details() {
        let err: ApiError = TrackError::Upstream {
            status: 500,
            message: "Traceback: secret internals".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.detail.contains("Traceback"));
    }
}
