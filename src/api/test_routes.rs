use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{
    actor, load_user_with_role, teacher_linked_to_student, teacher_of_classroom, CurrentUser,
};
use crate::api::helpers::{fetch_classroom, fetch_test};
use crate::api::validation::{parse_optional_body, validate_payload};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::result::TestResultResponse;
use crate::schemas::test::{
    validate_window, ClassroomAssign, ClassroomAssignmentResponse, QuestionCreate,
    QuestionResponse, QuestionUpdate, StudentAssignmentResponse, TestCreate, TestDetailResponse,
    TestResponse, TestUpdate,
};
use crate::services::access_policy;
use crate::services::assignments::{self, Visibility};

#[cfg(test)]
mod flows;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tests).post(create_test))
        .route("/:test_id", get(get_test).patch(update_test).delete(delete_test))
        .route("/:test_id/questions", post(add_question))
        .route(
            "/:test_id/questions/:question_id",
            patch(update_question).delete(delete_question),
        )
        .route("/:test_id/results", get(list_results))
        .route(
            "/:test_id/assign-to-student/:student_id",
            post(assign_to_student).delete(unassign_from_student),
        )
        .route(
            "/:test_id/assign-to-classroom/:classroom_id",
            post(assign_to_classroom).delete(unassign_from_classroom),
        )
}

async fn list_tests(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<TestResponse>>, ApiError> {
    access_policy::author_tests(actor(&user))?;

    let created_by = (user.role != UserRole::Admin).then_some(user.id.as_str());
    let tests = repositories::tests::list(state.db(), created_by)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list tests"))?;

    Ok(Json(tests.into_iter().map(TestResponse::from_db).collect()))
}

async fn create_test(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<TestCreate>,
) -> Result<(StatusCode, Json<TestDetailResponse>), ApiError> {
    access_policy::author_tests(actor(&user))?;
    validate_payload(&payload)?;

    let now = primitive_now_utc();
    let fields = payload.fields();

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to begin transaction"))?;

    let test = repositories::tests::create(
        &mut *tx,
        &Uuid::new_v4().to_string(),
        &user.id,
        &fields,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create test"))?;

    let mut questions = Vec::with_capacity(payload.questions.len());
    for question in payload.questions {
        let created = repositories::questions::create(
            &mut *tx,
            &Uuid::new_v4().to_string(),
            &test.id,
            &question.into_fields(),
            now,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question"))?;
        questions.push(created);
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        user_id = %user.id,
        test_id = %test.id,
        questions = questions.len(),
        action = "test_create",
        "Test created"
    );

    Ok((
        StatusCode::CREATED,
        Json(TestDetailResponse {
            test: TestResponse::from_db(test),
            questions: questions.into_iter().map(QuestionResponse::from_db).collect(),
        }),
    ))
}

async fn get_test(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<TestDetailResponse>, ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    access_policy::edit_test(actor(&user), test.created_by.as_deref())?;

    let questions = repositories::questions::list_by_test(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;

    Ok(Json(TestDetailResponse {
        test: TestResponse::from_db(test),
        questions: questions.into_iter().map(QuestionResponse::from_db).collect(),
    }))
}

async fn update_test(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<TestUpdate>,
) -> Result<Json<TestResponse>, ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    access_policy::edit_test(actor(&user), test.created_by.as_deref())?;
    validate_payload(&payload)?;

    let fields = payload.apply(&test).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let updated = repositories::tests::update(state.db(), &test_id, &fields, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    tracing::info!(user_id = %user.id, test_id = %test_id, action = "test_update", "Test updated");

    Ok(Json(TestResponse::from_db(updated)))
}

async fn delete_test(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    access_policy::edit_test(actor(&user), test.created_by.as_deref())?;

    let deleted = repositories::tests::delete(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete test"))?;
    if !deleted {
        return Err(ApiError::NotFound("Test not found".to_string()));
    }

    tracing::info!(user_id = %user.id, test_id = %test_id, action = "test_delete", "Test deleted");

    Ok(StatusCode::NO_CONTENT)
}

async fn add_question(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    access_policy::edit_test(actor(&user), test.created_by.as_deref())?;
    validate_payload(&payload)?;

    let question = repositories::questions::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        &test_id,
        &payload.into_fields(),
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    tracing::info!(
        user_id = %user.id,
        test_id = %test_id,
        question_id = %question.id,
        action = "question_create",
        "Question added"
    );

    Ok((StatusCode::CREATED, Json(QuestionResponse::from_db(question))))
}

async fn update_question(
    Path((test_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuestionUpdate>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    access_policy::edit_test(actor(&user), test.created_by.as_deref())?;
    validate_payload(&payload)?;

    let question = repositories::questions::find_in_test(state.db(), &test_id, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    let fields = payload.apply(&question).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let updated =
        repositories::questions::update(state.db(), &question_id, &fields, primitive_now_utc())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to update question"))?
            .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    tracing::info!(
        user_id = %user.id,
        question_id = %question_id,
        action = "question_update",
        "Question updated"
    );

    Ok(Json(QuestionResponse::from_db(updated)))
}

async fn delete_question(
    Path((test_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    access_policy::edit_test(actor(&user), test.created_by.as_deref())?;

    let deleted = repositories::questions::delete(state.db(), &test_id, &question_id)
        .await
        .map_err(|e| {
            if crate::db::is_foreign_key_violation(&e) {
                ApiError::Conflict("Question already has submitted answers".to_string())
            } else {
                ApiError::internal(e, "Failed to delete question")
            }
        })?;
    if !deleted {
        return Err(ApiError::NotFound("Question not found".to_string()));
    }

    tracing::info!(
        user_id = %user.id,
        question_id = %question_id,
        action = "question_delete",
        "Question deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

async fn list_results(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<TestResultResponse>>, ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    access_policy::view_test_results(actor(&user), test.created_by.as_deref())?;

    let results = repositories::results::list_for_test(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list results"))?;

    Ok(Json(results.into_iter().map(TestResultResponse::from_view).collect()))
}

async fn assign_to_student(
    Path((test_id, student_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<StudentAssignmentResponse>), ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    let linked = teacher_linked_to_student(&state, &user, &student_id).await?;
    access_policy::assign_test(actor(&user), test.created_by.as_deref(), linked)?;
    load_user_with_role(&state, &student_id, UserRole::Student).await?;

    let assignment =
        assignments::assign_to_student(state.db(), &test_id, &student_id, &user.id, primitive_now_utc())
            .await?;

    tracing::info!(
        user_id = %user.id,
        test_id = %test_id,
        student_id = %student_id,
        action = "assign_test_student",
        "Test assigned to student"
    );

    Ok((StatusCode::CREATED, Json(StudentAssignmentResponse::from_db(assignment))))
}

async fn unassign_from_student(
    Path((test_id, student_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    let linked = teacher_linked_to_student(&state, &user, &student_id).await?;
    access_policy::assign_test(actor(&user), test.created_by.as_deref(), linked)?;

    let removed =
        repositories::assignments::delete_student_assignment(state.db(), &student_id, &test_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to remove assignment"))?;
    if !removed {
        return Err(ApiError::NotFound("Assignment not found".to_string()));
    }

    tracing::info!(
        user_id = %user.id,
        test_id = %test_id,
        student_id = %student_id,
        action = "unassign_test_student",
        "Test unassigned from student"
    );

    Ok(StatusCode::NO_CONTENT)
}

async fn assign_to_classroom(
    Path((test_id, classroom_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ClassroomAssignmentResponse>), ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    fetch_classroom(&state, &classroom_id).await?;
    let linked = teacher_of_classroom(&state, &user, &classroom_id).await?;
    access_policy::assign_test(actor(&user), test.created_by.as_deref(), linked)?;

    let options: ClassroomAssign = parse_optional_body(&body)?;
    validate_window(options.visible_from, options.visible_until)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let assignment = assignments::assign_to_classroom(
        state.db(),
        &test_id,
        &classroom_id,
        &user.id,
        Visibility {
            is_visible: options.is_visible,
            visible_from: options.visible_from,
            visible_until: options.visible_until,
        },
        primitive_now_utc(),
    )
    .await?;

    tracing::info!(
        user_id = %user.id,
        test_id = %test_id,
        classroom_id = %classroom_id,
        action = "assign_test_classroom",
        "Test assigned to classroom"
    );

    Ok((
        StatusCode::CREATED,
        Json(ClassroomAssignmentResponse::from_db(assignment, Some(test.name))),
    ))
}

async fn unassign_from_classroom(
    Path((test_id, classroom_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let test = fetch_test(&state, &test_id).await?;
    let linked = teacher_of_classroom(&state, &user, &classroom_id).await?;
    access_policy::assign_test(actor(&user), test.created_by.as_deref(), linked)?;

    let removed =
        repositories::assignments::delete_classroom_assignment(state.db(), &classroom_id, &test_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to remove assignment"))?;
    if !removed {
        return Err(ApiError::NotFound("Assignment not found".to_string()));
    }

    tracing::info!(
        user_id = %user.id,
        test_id = %test_id,
        classroom_id = %classroom_id,
        action = "unassign_test_classroom",
        "Test unassigned from classroom"
    );

    Ok(StatusCode::NO_CONTENT)
}
