use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::access_policy::AccessDenied;
use crate::services::assignments::AssignmentError;
use crate::services::grading::GradingError;
use crate::services::submissions::SubmissionError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<AccessDenied> for ApiError {
    fn from(denied: AccessDenied) -> Self {
        ApiError::Forbidden(denied.0)
    }
}

impl From<GradingError> for ApiError {
    fn from(err: GradingError) -> Self {
        match err {
            GradingError::DuplicateQuestion(_) => ApiError::BadRequest(err.to_string()),
            GradingError::QuestionNotFound(_) => ApiError::NotFound(err.to_string()),
        }
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::TestNotFound => ApiError::NotFound("Test not found".to_string()),
            SubmissionError::NotAssigned => {
                ApiError::Forbidden("Test is not assigned to this student")
            }
            SubmissionError::OutsideAvailability => ApiError::BadRequest(err.to_string()),
            SubmissionError::Grading(inner) => inner.into(),
            SubmissionError::AttemptsExhausted(_) | SubmissionError::AttemptRace => {
                ApiError::Conflict(err.to_string())
            }
            SubmissionError::Database(inner) => {
                ApiError::internal(inner, "Failed to record submission")
            }
        }
    }
}

impl From<AssignmentError> for ApiError {
    fn from(err: AssignmentError) -> Self {
        match err {
            AssignmentError::DuplicateStudent | AssignmentError::DuplicateClassroom => {
                ApiError::Conflict(err.to_string())
            }
            AssignmentError::Database(inner) => {
                ApiError::internal(inner, "Failed to create assignment")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let status = StatusCode::UNAUTHORIZED;
                let mut response = (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: message.to_string() }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Forbidden(message) => {
                let status = StatusCode::FORBIDDEN;
                (
                    status,
                    Json(ErrorResponse { status: status.as_u16(), detail: message.to_string() }),
                )
                    .into_response()
            }
            ApiError::BadRequest(message) => {
                let status = StatusCode::BAD_REQUEST;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::NotFound(message) => {
                let status = StatusCode::NOT_FOUND;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::Conflict(message) => {
                let status = StatusCode::CONFLICT;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, Json(ErrorResponse { status: status.as_u16(), detail: message }))
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (AccessDenied("nope").into(), StatusCode::FORBIDDEN),
            (GradingError::DuplicateQuestion("q".into()).into(), StatusCode::BAD_REQUEST),
            (GradingError::QuestionNotFound("q".into()).into(), StatusCode::NOT_FOUND),
            (SubmissionError::TestNotFound.into(), StatusCode::NOT_FOUND),
            (SubmissionError::NotAssigned.into(), StatusCode::FORBIDDEN),
            (SubmissionError::OutsideAvailability.into(), StatusCode::BAD_REQUEST),
            (SubmissionError::AttemptsExhausted(2).into(), StatusCode::CONFLICT),
            (SubmissionError::AttemptRace.into(), StatusCode::CONFLICT),
            (AssignmentError::DuplicateStudent.into(), StatusCode::CONFLICT),
            (AssignmentError::DuplicateClassroom.into(), StatusCode::CONFLICT),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn unauthorized_sets_bearer_challenge() {
        let response = ApiError::Unauthorized("no").into_response();
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
