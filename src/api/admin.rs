use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{load_user_with_role, CurrentAdmin};
use crate::api::helpers::{create_account, NewAccount};
use crate::api::validation::{validate_password_len, validate_payload, validate_username};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::classroom::ClassroomResponse;
use crate::schemas::user::{AdminUserCreate, AdminUserUpdate, StudentLink, UserListQuery, UserResponse};
use crate::schemas::MessageResponse;


pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:user_id", get(get_user).patch(update_user).delete(delete_user))
        .route("/teachers", get(list_teachers))
        .route("/teachers/:teacher_id/students", get(list_teacher_students).post(link_student))
        .route(
            "/teachers/:teacher_id/students/:student_id",
            axum::routing::delete(unlink_student),
        )
        .route(
            "/students/:student_id/classrooms",
            get(list_student_classrooms).put(replace_student_classrooms),
        )
}

async fn list_users(
    Query(params): Query<UserListQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = repositories::users::list(state.db(), params.role)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list users"))?;

    Ok(Json(users.into_iter().map(UserResponse::from_db).collect()))
}

async fn get_user(
    Path(user_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?;

    let Some(user) = user else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };

    Ok(Json(UserResponse::from_db(user)))
}

async fn create_user(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AdminUserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_payload(&payload)?;

    let user = create_account(
        state.db(),
        &state,
        NewAccount {
            username: &payload.username,
            password: &payload.password,
            role: payload.role,
            is_active: payload.is_active,
        },
    )
    .await?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %user.id,
        role = user.role.as_str(),
        action = "user_create",
        "Admin created user"
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from_db(user))))
}

async fn update_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AdminUserUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    validate_payload(&payload)?;

    if let Some(username) = payload.username.as_deref() {
        validate_username(username)?;
        let existing = repositories::users::exists_by_username(state.db(), username)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;
        if existing.is_some_and(|id| id != user_id) {
            return Err(ApiError::Conflict("User with this username already exists".to_string()));
        }
    }

    let hashed_password = if let Some(password) = payload.password.as_ref() {
        validate_password_len(password)?;
        Some(
            security::hash_password(password)
                .map_err(|e| ApiError::internal(e, "Failed to hash password"))?,
        )
    } else {
        None
    };

    let updated = repositories::users::update(
        state.db(),
        &user_id,
        repositories::users::UpdateUser {
            username: payload.username,
            role: payload.role,
            is_active: payload.is_active,
            hashed_password,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| {
        if crate::db::is_unique_violation(&e) {
            ApiError::Conflict("User with this username already exists".to_string())
        } else {
            ApiError::internal(e, "Failed to update user")
        }
    })?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(
        admin_id = %admin.id,
        user_id = %updated.id,
        action = "user_update",
        "Admin updated user"
    );

    Ok(Json(UserResponse::from_db(updated)))
}

async fn delete_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    if user_id == admin.id {
        return Err(ApiError::BadRequest("Admins cannot delete their own account".to_string()));
    }

    let deleted = repositories::users::delete(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete user"))?;

    if !deleted {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(admin_id = %admin.id, user_id = %user_id, action = "user_delete", "Admin deleted user");

    Ok(StatusCode::NO_CONTENT)
}

async fn list_teachers(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let teachers = repositories::users::list(state.db(), Some(UserRole::Teacher))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list teachers"))?;

    Ok(Json(teachers.into_iter().map(UserResponse::from_db).collect()))
}

async fn list_teacher_students(
    Path(teacher_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    load_user_with_role(&state, &teacher_id, UserRole::Teacher).await?;

    let students = repositories::teacher_students::list_direct_students(state.db(), &teacher_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list teacher students"))?;

    Ok(Json(students.into_iter().map(UserResponse::from_db).collect()))
}

async fn link_student(
    Path(teacher_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<StudentLink>,
) -> Result<Json<MessageResponse>, ApiError> {
    load_user_with_role(&state, &teacher_id, UserRole::Teacher).await?;
    load_user_with_role(&state, &payload.student_id, UserRole::Student).await?;

    let created = repositories::teacher_students::link(
        state.db(),
        &teacher_id,
        &payload.student_id,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to link student"))?;

    tracing::info!(
        admin_id = %admin.id,
        teacher_id = %teacher_id,
        student_id = %payload.student_id,
        created,
        action = "teacher_student_link",
        "Admin linked student to teacher"
    );

    Ok(Json(MessageResponse::new(if created {
        "Student linked to teacher"
    } else {
        "Student already linked to teacher"
    })))
}

async fn unlink_student(
    Path((teacher_id, student_id)): Path<(String, String)>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let removed = repositories::teacher_students::unlink(state.db(), &teacher_id, &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to unlink student"))?;

    if !removed {
        return Err(ApiError::NotFound("Teacher-student link not found".to_string()));
    }

    tracing::info!(
        admin_id = %admin.id,
        teacher_id = %teacher_id,
        student_id = %student_id,
        action = "teacher_student_unlink",
        "Admin unlinked student from teacher"
    );

    Ok(StatusCode::NO_CONTENT)
}

async fn list_student_classrooms(
    Path(student_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassroomResponse>>, ApiError> {
    load_user_with_role(&state, &student_id, UserRole::Student).await?;

    let classrooms = repositories::classrooms::list_for_student(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list student classrooms"))?;

    Ok(Json(classrooms.into_iter().map(ClassroomResponse::from_db).collect()))
}

/// Replaces the student's classroom memberships with exactly the given ids.
async fn replace_student_classrooms(
    Path(student_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(mut classroom_ids): Json<Vec<String>>,
) -> Result<Json<Vec<ClassroomResponse>>, ApiError> {
    load_user_with_role(&state, &student_id, UserRole::Student).await?;

    classroom_ids.sort();
    classroom_ids.dedup();

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to begin transaction"))?;

    let missing = repositories::classrooms::missing_ids(&mut *tx, &classroom_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check classrooms"))?;
    if let Some(first) = missing.first() {
        return Err(ApiError::NotFound(format!("Classroom {first} not found")));
    }

    repositories::classrooms::replace_student_classrooms(
        &mut tx,
        &student_id,
        &classroom_ids,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to replace student classrooms"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        admin_id = %admin.id,
        student_id = %student_id,
        classrooms = classroom_ids.len(),
        action = "student_classrooms_replace",
        "Admin replaced student classrooms"
    );

    let classrooms = repositories::classrooms::list_for_student(state.db(), &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list student classrooms"))?;

    Ok(Json(classrooms.into_iter().map(ClassroomResponse::from_db).collect()))
}
