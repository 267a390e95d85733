use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts, HeaderMap};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::services::access_policy::{self, Actor};

pub(crate) const USER_ID_HEADER: &str = "x-user-id";
pub(crate) const USER_ROLE_HEADER: &str = "x-user-role";

pub(crate) struct CurrentUser(pub(crate) User);
pub(crate) struct CurrentAdmin(pub(crate) User);
pub(crate) struct CurrentStudent(pub(crate) User);

pub(crate) fn actor(user: &User) -> Actor<'_> {
    Actor { id: &user.id, role: user.role }
}

enum Credentials {
    Bearer(String),
    Headers { user_id: String, role: UserRole },
}

fn read_credentials(headers: &HeaderMap, allow_header_identity: bool) -> Result<Credentials, ApiError> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let token = auth_header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;
        return Ok(Credentials::Bearer(token.to_string()));
    }

    if !allow_header_identity {
        return Err(ApiError::Unauthorized("Not authenticated"));
    }

    match (header_value(headers, USER_ID_HEADER), header_value(headers, USER_ROLE_HEADER)) {
        (Some(user_id), Some(role)) if !user_id.is_empty() => {
            let role = UserRole::parse(role)
                .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;
            Ok(Credentials::Headers { user_id: user_id.to_string(), role })
        }
        _ => Err(ApiError::Unauthorized("Not authenticated")),
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::trim)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let credentials =
            read_credentials(&parts.headers, app_state.settings().security().allow_header_identity)?;

        let (user_id, claimed_role) = match credentials {
            Credentials::Bearer(token) => {
                let claims = security::verify_token(&token, app_state.settings())
                    .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;
                (claims.sub, None)
            }
            Credentials::Headers { user_id, role } => (user_id, Some(role)),
        };

        let user = repositories::users::find_by_id(app_state.db(), &user_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        if !user.is_active {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        if claimed_role.is_some_and(|role| role != user.role) {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        access_policy::require_admin(actor(&user))?;
        Ok(CurrentAdmin(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentStudent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        access_policy::require_student(actor(&user))?;
        Ok(CurrentStudent(user))
    }
}

/// Loads a user that must exist with `role`, for endpoints addressing a user by id.
pub(crate) async fn load_user_with_role(
    state: &AppState,
    user_id: &str,
    role: UserRole,
) -> Result<User, ApiError> {
    let user = repositories::users::find_by_id(state.db(), user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

    match user {
        Some(user) if user.role == role => Ok(user),
        _ => Err(ApiError::NotFound(format!("{} not found", capitalized(role)))),
    }
}

/// Whether `teacher` is linked to `student_id` directly or through a shared classroom.
pub(crate) async fn teacher_linked_to_student(
    state: &AppState,
    teacher: &User,
    student_id: &str,
) -> Result<bool, ApiError> {
    if teacher.role != UserRole::Teacher {
        return Ok(false);
    }
    let facts = repositories::teacher_students::link_facts(state.db(), &teacher.id, student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check teacher link"))?;
    Ok(facts.direct || facts.shared_classroom)
}

pub(crate) async fn teacher_of_classroom(
    state: &AppState,
    user: &User,
    classroom_id: &str,
) -> Result<bool, ApiError> {
    if user.role != UserRole::Teacher {
        return Ok(false);
    }
    repositories::classrooms::is_teacher(state.db(), classroom_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check classroom teacher"))
}

fn capitalized(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "Admin",
        UserRole::Teacher => "Teacher",
        UserRole::Student => "Student",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn bearer_takes_precedence_over_identity_headers() {
        let map = headers(&[
            ("authorization", "Bearer abc"),
            (USER_ID_HEADER, "u1"),
            (USER_ROLE_HEADER, "admin"),
        ]);
        assert!(matches!(read_credentials(&map, true), Ok(Credentials::Bearer(token)) if token == "abc"));
    }

    #[test]
    fn identity_headers_require_opt_in() {
        let map = headers(&[(USER_ID_HEADER, "u1"), (USER_ROLE_HEADER, "Teacher")]);
        assert!(matches!(
            read_credentials(&map, true),
            Ok(Credentials::Headers { role: UserRole::Teacher, .. })
        ));
        assert!(matches!(read_credentials(&map, false), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn malformed_credentials_are_unauthorized() {
        assert!(read_credentials(&headers(&[("authorization", "Basic xyz")]), true).is_err());
        assert!(read_credentials(&headers(&[(USER_ID_HEADER, "u1")]), true).is_err());
        assert!(read_credentials(
            &headers(&[(USER_ID_HEADER, "u1"), (USER_ROLE_HEADER, "root")]),
            true
        )
        .is_err());
        assert!(read_credentials(&HeaderMap::new(), true).is_err());
    }
}
