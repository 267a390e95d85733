use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{actor, teacher_of_classroom, CurrentAdmin, CurrentUser};
use crate::api::helpers::fetch_classroom;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::classroom::{
    ClassroomCreate, ClassroomDetailResponse, ClassroomResponse, ClassroomWithUsers, StudentIds,
    TeacherIds, ROSTER_PREVIEW_LEN,
};
use crate::schemas::test::ClassroomAssignmentResponse;
use crate::schemas::user::{UserBrief, UserResponse};
use crate::schemas::MessageResponse;
use crate::services::access_policy;


pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_classrooms).post(create_classroom))
        .route("/with-users", get(list_with_users))
        .route("/:classroom_id", get(get_classroom).delete(delete_classroom))
        .route("/:classroom_id/students", get(list_students).post(add_students))
        .route("/:classroom_id/students/:student_id", delete(remove_student))
        .route("/:classroom_id/teachers", post(add_teachers))
        .route("/:classroom_id/tests", get(list_tests))
}

async fn list_classrooms(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassroomResponse>>, ApiError> {
    let classrooms = match user.role {
        UserRole::Admin => repositories::classrooms::list_all(state.db()).await,
        UserRole::Teacher => repositories::classrooms::list_for_teacher(state.db(), &user.id).await,
        UserRole::Student => {
            return Err(ApiError::Forbidden("Teachers or admins only"));
        }
    }
    .map_err(|e| ApiError::internal(e, "Failed to list classrooms"))?;

    Ok(Json(classrooms.into_iter().map(ClassroomResponse::from_db).collect()))
}

/// A teacher creating a classroom becomes one of its teachers.
async fn create_classroom(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ClassroomCreate>,
) -> Result<(StatusCode, Json<ClassroomResponse>), ApiError> {
    if user.role == UserRole::Student {
        return Err(ApiError::Forbidden("Teachers or admins only"));
    }
    validate_payload(&payload)?;

    let now = primitive_now_utc();
    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to begin transaction"))?;

    let classroom = repositories::classrooms::create(
        &mut *tx,
        &Uuid::new_v4().to_string(),
        payload.name.trim(),
        &user.id,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create classroom"))?;

    if user.role == UserRole::Teacher {
        repositories::classrooms::add_teacher(&mut *tx, &classroom.id, &user.id, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to add classroom teacher"))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        user_id = %user.id,
        classroom_id = %classroom.id,
        action = "classroom_create",
        "Classroom created"
    );

    Ok((StatusCode::CREATED, Json(ClassroomResponse::from_db(classroom))))
}

async fn list_with_users(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassroomWithUsers>>, ApiError> {
    let classrooms = repositories::classrooms::list_all(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list classrooms"))?;

    let ids: Vec<String> = classrooms.iter().map(|classroom| classroom.id.clone()).collect();
    let members = repositories::classrooms::list_members(state.db(), &ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list classroom members"))?;

    let mut teachers: HashMap<String, Vec<UserBrief>> = HashMap::new();
    let mut students: HashMap<String, Vec<UserBrief>> = HashMap::new();
    for member in members {
        let bucket = if member.is_teacher { &mut teachers } else { &mut students };
        bucket
            .entry(member.classroom_id)
            .or_default()
            .push(UserBrief { id: member.user_id, username: member.username });
    }

    let response = classrooms
        .into_iter()
        .map(|classroom| {
            let mut roster = students.remove(&classroom.id).unwrap_or_default();
            let total_students = roster.len();
            roster.truncate(ROSTER_PREVIEW_LEN);
            ClassroomWithUsers {
                teachers: teachers.remove(&classroom.id).unwrap_or_default(),
                students: roster,
                total_students,
                id: classroom.id,
                name: classroom.name,
            }
        })
        .collect();

    Ok(Json(response))
}

async fn get_classroom(
    Path(classroom_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ClassroomDetailResponse>, ApiError> {
    let classroom = fetch_classroom(&state, &classroom_id).await?;
    let is_teacher = teacher_of_classroom(&state, &user, &classroom_id).await?;
    access_policy::view_classroom(actor(&user), is_teacher)?;

    let teachers = repositories::classrooms::list_teachers(state.db(), &classroom_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list classroom teachers"))?;
    let students = repositories::classrooms::list_students(state.db(), &classroom_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list classroom students"))?;

    Ok(Json(ClassroomDetailResponse {
        classroom: ClassroomResponse::from_db(classroom),
        teachers: teachers.into_iter().map(brief).collect(),
        students: students.into_iter().map(brief).collect(),
    }))
}

async fn delete_classroom(
    Path(classroom_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let deleted = repositories::classrooms::delete(state.db(), &classroom_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete classroom"))?;
    if !deleted {
        return Err(ApiError::NotFound("Classroom not found".to_string()));
    }

    tracing::info!(
        admin_id = %admin.id,
        classroom_id = %classroom_id,
        action = "classroom_delete",
        "Classroom deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

async fn list_students(
    Path(classroom_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    fetch_classroom(&state, &classroom_id).await?;
    let is_teacher = teacher_of_classroom(&state, &user, &classroom_id).await?;
    access_policy::view_classroom(actor(&user), is_teacher)?;

    let students = repositories::classrooms::list_students(state.db(), &classroom_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list classroom students"))?;

    Ok(Json(students.into_iter().map(UserResponse::from_db).collect()))
}

async fn add_students(
    Path(classroom_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<StudentIds>,
) -> Result<Json<MessageResponse>, ApiError> {
    fetch_classroom(&state, &classroom_id).await?;
    let is_teacher = teacher_of_classroom(&state, &user, &classroom_id).await?;
    access_policy::manage_classroom(actor(&user), is_teacher)?;

    let all_directly_linked = if user.role == UserRole::Admin {
        true
    } else {
        let linked: HashSet<String> = repositories::teacher_students::filter_direct_students(
            state.db(),
            &user.id,
            &payload.student_ids,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check student links"))?
        .into_iter()
        .collect();
        payload.student_ids.iter().all(|id| linked.contains(id))
    };
    access_policy::enroll_students(actor(&user), all_directly_linked)?;

    let added =
        add_members(&state, &classroom_id, &payload.student_ids, UserRole::Student).await?;

    tracing::info!(
        user_id = %user.id,
        classroom_id = %classroom_id,
        added,
        action = "classroom_students_add",
        "Students added to classroom"
    );

    Ok(Json(MessageResponse::new(format!("{added} student(s) added to classroom"))))
}

async fn remove_student(
    Path((classroom_id, student_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let is_teacher = teacher_of_classroom(&state, &user, &classroom_id).await?;
    access_policy::manage_classroom(actor(&user), is_teacher)?;

    let removed = repositories::classrooms::remove_student(state.db(), &classroom_id, &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to remove student"))?;
    if !removed {
        return Err(ApiError::NotFound("Student is not in this classroom".to_string()));
    }

    tracing::info!(
        user_id = %user.id,
        classroom_id = %classroom_id,
        student_id = %student_id,
        action = "classroom_student_remove",
        "Student removed from classroom"
    );

    Ok(StatusCode::NO_CONTENT)
}

async fn add_teachers(
    Path(classroom_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<TeacherIds>,
) -> Result<Json<MessageResponse>, ApiError> {
    fetch_classroom(&state, &classroom_id).await?;

    let added =
        add_members(&state, &classroom_id, &payload.teacher_ids, UserRole::Teacher).await?;

    tracing::info!(
        admin_id = %admin.id,
        classroom_id = %classroom_id,
        added,
        action = "classroom_teachers_add",
        "Teachers added to classroom"
    );

    Ok(Json(MessageResponse::new(format!("{added} teacher(s) added to classroom"))))
}

async fn list_tests(
    Path(classroom_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassroomAssignmentResponse>>, ApiError> {
    fetch_classroom(&state, &classroom_id).await?;
    let is_teacher = teacher_of_classroom(&state, &user, &classroom_id).await?;
    access_policy::view_classroom(actor(&user), is_teacher)?;

    let assignments = repositories::assignments::list_for_classroom(state.db(), &classroom_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list classroom tests"))?;

    Ok(Json(
        assignments
            .into_iter()
            .map(|view| ClassroomAssignmentResponse::from_db(view.assignment, Some(view.test_name)))
            .collect(),
    ))
}

/// Adds every id as a member in one transaction. Unknown ids or wrong roles abort the batch.
async fn add_members(
    state: &AppState,
    classroom_id: &str,
    user_ids: &[String],
    role: UserRole,
) -> Result<usize, ApiError> {
    let mut ids = user_ids.to_vec();
    ids.sort();
    ids.dedup();

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to begin transaction"))?;

    let known = repositories::users::filter_ids_with_role(&mut *tx, &ids, role)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check users"))?;
    if let Some(missing) = ids.iter().find(|id| !known.contains(id)) {
        return Err(ApiError::NotFound(format!("{} {missing} not found", role.as_str())));
    }

    let now = primitive_now_utc();
    let mut added = 0;
    for id in &ids {
        let created = match role {
            UserRole::Teacher => {
                repositories::classrooms::add_teacher(&mut *tx, classroom_id, id, now).await
            }
            _ => repositories::classrooms::add_student(&mut *tx, classroom_id, id, now).await,
        }
        .map_err(|e| ApiError::internal(e, "Failed to add classroom member"))?;
        if created {
            added += 1;
        }
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;
    Ok(added)
}

fn brief(user: User) -> UserBrief {
    UserBrief { id: user.id, username: user.username }
}
