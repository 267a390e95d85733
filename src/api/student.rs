use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::api::helpers::fetch_test;
use crate::api::validation::validate_payload;
use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::classroom::ClassroomResponse;
use crate::schemas::result::{SubmitRequest, SubmitResponse, TestResultResponse};
use crate::schemas::test::{AssignedTestResponse, StudentQuestionResponse, StudentTestDetailResponse, TestResponse};
use crate::services::{assignment_resolver, grading, submissions};


pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/tests", get(list_tests))
        .route("/tests/:test_id", get(get_test))
        .route("/submit", post(submit))
        .route("/test-results", get(list_results))
        .route("/classrooms", get(list_classrooms))
}

async fn list_tests(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Vec<AssignedTestResponse>>, ApiError> {
    let resolved =
        assignment_resolver::resolve_for_student(state.db(), &student.id, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to resolve assigned tests"))?;

    Ok(Json(resolved.into_iter().map(AssignedTestResponse::from_resolved).collect()))
}

async fn get_test(
    Path(test_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<StudentTestDetailResponse>, ApiError> {
    let test = fetch_test(&state, &test_id).await?;

    let accessible =
        assignment_resolver::can_access(state.db(), &student.id, &test_id, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to resolve assigned tests"))?;
    if !accessible {
        return Err(ApiError::Forbidden("Test is not assigned to this student"));
    }

    let questions = repositories::questions::list_by_test(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;

    Ok(Json(StudentTestDetailResponse {
        test: TestResponse::from_db(test),
        questions: questions.into_iter().map(StudentQuestionResponse::from_db).collect(),
    }))
}

async fn submit(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    validate_payload(&payload)?;

    let outcome = submissions::submit(
        state.db(),
        &student.id,
        &payload.test_id,
        &payload.answers(),
        primitive_now_utc(),
    )
    .await?;

    metrics::record_submission(
        outcome.test.grading_mode.as_str(),
        grading::passed(outcome.result.score, outcome.test.pass_score),
    );
    tracing::info!(
        student_id = %student.id,
        test_id = %outcome.test.id,
        attempt = outcome.result.attempt_number,
        score = outcome.result.score,
        action = "test_submit",
        "Student submitted test"
    );

    Ok((StatusCode::CREATED, Json(SubmitResponse::from_outcome(outcome))))
}

async fn list_results(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Vec<TestResultResponse>>, ApiError> {
    let results = repositories::results::list_for_student(state.db(), &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list results"))?;

    Ok(Json(results.into_iter().map(TestResultResponse::from_view).collect()))
}

async fn list_classrooms(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassroomResponse>>, ApiError> {
    let classrooms = repositories::classrooms::list_for_student(state.db(), &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list classrooms"))?;

    Ok(Json(classrooms.into_iter().map(ClassroomResponse::from_db).collect()))
}
