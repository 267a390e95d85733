use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{actor, load_user_with_role, teacher_linked_to_student, CurrentUser};
use crate::api::helpers::{create_account, NewAccount};
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::result::TestResultResponse;
use crate::schemas::user::{StudentCreate, UserResponse};
use crate::services::access_policy;


pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/students", get(list_students).post(create_student))
        .route("/students/:student_id/results", get(student_results))
}

async fn list_students(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    access_policy::require_teacher(actor(&user))?;

    let students = repositories::teacher_students::list_linked_students(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list students"))?;

    Ok(Json(students.into_iter().map(UserResponse::from_db).collect()))
}

/// Creates a student account already linked to the calling teacher.
async fn create_student(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<StudentCreate>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    access_policy::require_teacher(actor(&user))?;
    access_policy::create_user(actor(&user), UserRole::Student)?;
    validate_payload(&payload)?;

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to begin transaction"))?;

    let student = create_account(
        &mut *tx,
        &state,
        NewAccount {
            username: &payload.username,
            password: &payload.password,
            role: UserRole::Student,
            is_active: true,
        },
    )
    .await?;

    repositories::teacher_students::link(&mut *tx, &user.id, &student.id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to link student"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        teacher_id = %user.id,
        student_id = %student.id,
        action = "teacher_student_create",
        "Teacher created student"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from_db(student))))
}

async fn student_results(
    Path(student_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<TestResultResponse>>, ApiError> {
    let linked = teacher_linked_to_student(&state, &user, &student_id).await?;
    access_policy::view_student_results(actor(&user), &student_id, linked)?;

    load_user_with_role(&state, &student_id, UserRole::Student).await?;

    let results = repositories::results::list_for_student(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list results"))?;

    Ok(Json(results.into_iter().map(TestResultResponse::from_view).collect()))
}
