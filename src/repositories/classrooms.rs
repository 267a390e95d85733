use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Classroom, User};
use crate::db::types::UserRole;
use crate::repositories::users::COLUMNS as USER_COLUMNS;

pub(crate) const COLUMNS: &str = "id, name, created_by, created_at, updated_at";

/// One roster entry, used to assemble classrooms together with their members.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MemberRow {
    pub(crate) classroom_id: String,
    pub(crate) user_id: String,
    pub(crate) username: String,
    pub(crate) role: UserRole,
    pub(crate) is_teacher: bool,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    name: &str,
    created_by: &str,
    now: PrimitiveDateTime,
) -> Result<Classroom, sqlx::Error> {
    sqlx::query_as::<_, Classroom>(&format!(
        "INSERT INTO classrooms (id, name, created_by, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $4)
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(created_by)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Classroom>, sqlx::Error> {
    sqlx::query_as::<_, Classroom>(&format!("SELECT {COLUMNS} FROM classrooms WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<Classroom>, sqlx::Error> {
    sqlx::query_as::<_, Classroom>(&format!("SELECT {COLUMNS} FROM classrooms ORDER BY name, id"))
        .fetch_all(pool)
        .await
}

pub(crate) async fn list_for_teacher(
    pool: &PgPool,
    teacher_id: &str,
) -> Result<Vec<Classroom>, sqlx::Error> {
    sqlx::query_as::<_, Classroom>(&format!(
        "SELECT {COLUMNS}
         FROM classrooms
         WHERE id IN (SELECT classroom_id FROM classroom_teachers WHERE teacher_id = $1)
         ORDER BY name, id"
    ))
    .bind(teacher_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_for_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<Classroom>, sqlx::Error> {
    sqlx::query_as::<_, Classroom>(&format!(
        "SELECT {COLUMNS}
         FROM classrooms
         WHERE id IN (SELECT classroom_id FROM classroom_students WHERE student_id = $1)
         ORDER BY name, id"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM classroom_test_assignments WHERE classroom_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM classroom_students WHERE classroom_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM classroom_teachers WHERE classroom_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM classrooms WHERE id = $1").bind(id).execute(&mut *tx).await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn add_teacher(
    executor: impl sqlx::PgExecutor<'_>,
    classroom_id: &str,
    teacher_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO classroom_teachers (classroom_id, teacher_id, created_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (classroom_id, teacher_id) DO NOTHING",
    )
    .bind(classroom_id)
    .bind(teacher_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn add_student(
    executor: impl sqlx::PgExecutor<'_>,
    classroom_id: &str,
    student_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO classroom_students (classroom_id, student_id, created_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (classroom_id, student_id) DO NOTHING",
    )
    .bind(classroom_id)
    .bind(student_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn remove_student(
    pool: &PgPool,
    classroom_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM classroom_students WHERE classroom_id = $1 AND student_id = $2")
            .bind(classroom_id)
            .bind(student_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Replaces every classroom membership of `student_id` with `classroom_ids`.
pub(crate) async fn replace_student_classrooms(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    student_id: &str,
    classroom_ids: &[String],
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM classroom_students WHERE student_id = $1")
        .bind(student_id)
        .execute(&mut **tx)
        .await?;

    for classroom_id in classroom_ids {
        add_student(&mut **tx, classroom_id, student_id, now).await?;
    }

    Ok(())
}

pub(crate) async fn is_teacher(
    pool: &PgPool,
    classroom_id: &str,
    teacher_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (
            SELECT 1 FROM classroom_teachers WHERE classroom_id = $1 AND teacher_id = $2
         )",
    )
    .bind(classroom_id)
    .bind(teacher_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_students(
    pool: &PgPool,
    classroom_id: &str,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS}
         FROM users
         WHERE id IN (SELECT student_id FROM classroom_students WHERE classroom_id = $1)
         ORDER BY username"
    ))
    .bind(classroom_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_teachers(
    pool: &PgPool,
    classroom_id: &str,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS}
         FROM users
         WHERE id IN (SELECT teacher_id FROM classroom_teachers WHERE classroom_id = $1)
         ORDER BY username"
    ))
    .bind(classroom_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_members(
    pool: &PgPool,
    classroom_ids: &[String],
) -> Result<Vec<MemberRow>, sqlx::Error> {
    if classroom_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, MemberRow>(
        "SELECT ct.classroom_id, u.id AS user_id, u.username, u.role, TRUE AS is_teacher
         FROM classroom_teachers ct
         JOIN users u ON u.id = ct.teacher_id
         WHERE ct.classroom_id = ANY($1)
         UNION ALL
         SELECT cs.classroom_id, u.id AS user_id, u.username, u.role, FALSE AS is_teacher
         FROM classroom_students cs
         JOIN users u ON u.id = cs.student_id
         WHERE cs.classroom_id = ANY($1)
         ORDER BY username",
    )
    .bind(classroom_ids)
    .fetch_all(pool)
    .await
}

/// Returns the ids from `ids` that do not name an existing classroom.
pub(crate) async fn missing_ids(
    executor: impl sqlx::PgExecutor<'_>,
    ids: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_scalar::<_, String>(
        "SELECT requested
         FROM UNNEST($1::text[]) AS requested
         WHERE NOT EXISTS (SELECT 1 FROM classrooms WHERE id = requested)",
    )
    .bind(ids)
    .fetch_all(executor)
    .await
}
