use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::validation::{validate_password_len, validate_username};
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Classroom, Test, User};
use crate::db::types::UserRole;
use crate::repositories;

pub(crate) struct NewAccount<'a> {
    pub(crate) username: &'a str,
    pub(crate) password: &'a str,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
}

/// Validates and stores a new account. Duplicate usernames are a conflict.
pub(crate) async fn create_account(
    executor: impl sqlx::PgExecutor<'_>,
    state: &AppState,
    account: NewAccount<'_>,
) -> Result<User, ApiError> {
    validate_username(account.username)?;
    validate_password_len(account.password)?;

    let existing = repositories::users::exists_by_username(state.db(), account.username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing user"))?;

    if existing.is_some() {
        return Err(ApiError::Conflict("User with this username already exists".to_string()));
    }

    let hashed_password = security::hash_password(account.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;
    let now = primitive_now_utc();

    repositories::users::create(
        executor,
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username: account.username,
            hashed_password,
            role: account.role,
            is_active: account.is_active,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| {
        if crate::db::is_unique_violation(&e) {
            ApiError::Conflict("User with this username already exists".to_string())
        } else {
            ApiError::internal(e, "Failed to create user")
        }
    })
}

pub(crate) async fn fetch_test(state: &AppState, test_id: &str) -> Result<Test, ApiError> {
    repositories::tests::find_by_id(state.db(), test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))
}

pub(crate) async fn fetch_classroom(
    state: &AppState,
    classroom_id: &str,
) -> Result<Classroom, ApiError> {
    repositories::classrooms::find_by_id(state.db(), classroom_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch classroom"))?
        .ok_or_else(|| ApiError::NotFound("Classroom not found".to_string()))
}
