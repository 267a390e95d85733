use std::collections::BTreeMap;

use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Test, User};
use crate::db::types::{GradingMode, UserRole};
use crate::repositories;
use crate::repositories::questions::QuestionFields;
use crate::repositories::tests::TestFields;
use crate::services::assignments::{self, AssignmentError};

const DEMO_TEST_NAME: &str = "Practice SHSAT 1";
const DEFAULT_SEED_PASSWORD: &str = "password123";

pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let username = admin.first_superuser_username.as_str();
    ensure_account(state, username, &admin.first_superuser_password, UserRole::Admin).await?;
    Ok(())
}

/// Creates the user, or repairs role, activity and password on an existing one.
async fn ensure_account(
    state: &AppState,
    username: &str,
    password: &str,
    role: UserRole,
) -> anyhow::Result<User> {
    let now = primitive_now_utc();

    if let Some(user) = repositories::users::find_by_username(state.db(), username).await? {
        let verified =
            security::verify_password(password, &user.hashed_password).unwrap_or(false);
        let hashed_password =
            if verified { None } else { Some(security::hash_password(password)?) };

        if hashed_password.is_none() && user.role == role && user.is_active {
            tracing::info!(username, "Account already up to date");
            return Ok(user);
        }

        let updated = repositories::users::update(
            state.db(),
            &user.id,
            repositories::users::UpdateUser {
                username: None,
                role: Some(role),
                is_active: Some(true),
                hashed_password,
                updated_at: now,
            },
        )
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {username} disappeared during update"))?;

        tracing::info!(username, role = role.as_str(), "Updated account");
        return Ok(updated);
    }

    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username,
            hashed_password: security::hash_password(password)?,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    tracing::info!(username, role = role.as_str(), "Created account");
    Ok(user)
}

/// Populates demo accounts, one practice test and its assignments. Safe to re-run.
pub(crate) async fn seed_demo_data(state: &AppState) -> anyhow::Result<()> {
    let password =
        std::env::var("SEED_PASSWORD").unwrap_or_else(|_| DEFAULT_SEED_PASSWORD.to_string());

    ensure_account(state, "admin", &password, UserRole::Admin).await?;
    let teacher = ensure_account(state, "teacher", &password, UserRole::Teacher).await?;
    let students = [
        ensure_account(state, "student1", &password, UserRole::Student).await?,
        ensure_account(state, "student2", &password, UserRole::Student).await?,
    ];

    let now = primitive_now_utc();
    for student in &students {
        repositories::teacher_students::link(state.db(), &teacher.id, &student.id, now).await?;
    }

    let test = ensure_demo_test(state, &teacher).await?;

    for student in &students {
        match assignments::assign_to_student(state.db(), &test.id, &student.id, &teacher.id, now)
            .await
        {
            Ok(_) => tracing::info!(student = %student.username, "Assigned demo test"),
            Err(AssignmentError::DuplicateStudent) => {}
            Err(err) => return Err(err.into()),
        }
    }

    tracing::info!(test_id = %test.id, "Demo data ready");
    Ok(())
}

async fn ensure_demo_test(state: &AppState, teacher: &User) -> anyhow::Result<Test> {
    let existing = repositories::tests::list(state.db(), Some(&teacher.id)).await?;
    if let Some(test) = existing.into_iter().find(|test| test.name == DEMO_TEST_NAME) {
        return Ok(test);
    }

    let now = primitive_now_utc();
    let fields = TestFields {
        name: DEMO_TEST_NAME.to_string(),
        description: Some("Two warm-up questions".to_string()),
        is_timed: false,
        duration_minutes: None,
        max_attempts: None,
        available_from: None,
        available_until: None,
        is_published: true,
        pass_score: Some(50),
        grading_mode: GradingMode::Instant,
    };

    let mut tx = state.db().begin().await?;
    let test =
        repositories::tests::create(&mut *tx, &Uuid::new_v4().to_string(), &teacher.id, &fields, now)
            .await?;

    let questions = [
        ("What is 7 x 8?", [("A", "54"), ("B", "56"), ("C", "58"), ("D", "64")], "B"),
        ("Which is a prime number?", [("A", "21"), ("B", "27"), ("C", "29"), ("D", "33")], "C"),
    ];
    for (index, (text, choices, correct)) in questions.into_iter().enumerate() {
        let choices: BTreeMap<String, String> =
            choices.into_iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        repositories::questions::create(
            &mut *tx,
            &Uuid::new_v4().to_string(),
            &test.id,
            &QuestionFields {
                order_index: index as i32 + 1,
                question_text: text.to_string(),
                choices,
                correct_choice: correct.to_string(),
                explanation: None,
            },
            now,
        )
        .await?;
    }
    tx.commit().await?;

    tracing::info!(test_id = %test.id, "Created demo test");
    Ok(test)
}
