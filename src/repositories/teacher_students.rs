use sqlx::PgPool;

use crate::db::models::User;
use crate::repositories::users::COLUMNS as USER_COLUMNS;

/// How a teacher is connected to a student, if at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub(crate) struct LinkFacts {
    pub(crate) direct: bool,
    pub(crate) shared_classroom: bool,
}

/// Inserts the link if missing. Returns `true` when a row was created.
pub(crate) async fn link(
    executor: impl sqlx::PgExecutor<'_>,
    teacher_id: &str,
    student_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO teacher_students (teacher_id, student_id, created_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (teacher_id, student_id) DO NOTHING",
    )
    .bind(teacher_id)
    .bind(student_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn unlink(
    pool: &PgPool,
    teacher_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM teacher_students WHERE teacher_id = $1 AND student_id = $2")
            .bind(teacher_id)
            .bind(student_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// The subset of `student_ids` with a direct link to the teacher.
pub(crate) async fn filter_direct_students(
    executor: impl sqlx::PgExecutor<'_>,
    teacher_id: &str,
    student_ids: &[String],
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT student_id FROM teacher_students
         WHERE teacher_id = $1 AND student_id = ANY($2)",
    )
    .bind(teacher_id)
    .bind(student_ids)
    .fetch_all(executor)
    .await
}

pub(crate) async fn link_facts(
    pool: &PgPool,
    teacher_id: &str,
    student_id: &str,
) -> Result<LinkFacts, sqlx::Error> {
    sqlx::query_as::<_, LinkFacts>(
        "SELECT
            EXISTS (
                SELECT 1 FROM teacher_students
                WHERE teacher_id = $1 AND student_id = $2
            ) AS direct,
            EXISTS (
                SELECT 1
                FROM classroom_teachers ct
                JOIN classroom_students cs ON cs.classroom_id = ct.classroom_id
                WHERE ct.teacher_id = $1 AND cs.student_id = $2
            ) AS shared_classroom",
    )
    .bind(teacher_id)
    .bind(student_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_direct_students(
    pool: &PgPool,
    teacher_id: &str,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS}
         FROM users
         WHERE id IN (SELECT student_id FROM teacher_students WHERE teacher_id = $1)
         ORDER BY username"
    ))
    .bind(teacher_id)
    .fetch_all(pool)
    .await
}

/// Students linked directly or through a shared classroom.
pub(crate) async fn list_linked_students(
    pool: &PgPool,
    teacher_id: &str,
) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS}
         FROM users
         WHERE role = 'student'
           AND (
             id IN (SELECT student_id FROM teacher_students WHERE teacher_id = $1)
             OR id IN (
                SELECT cs.student_id
                FROM classroom_students cs
                JOIN classroom_teachers ct ON ct.classroom_id = cs.classroom_id
                WHERE ct.teacher_id = $1
             )
           )
         ORDER BY username"
    ))
    .bind(teacher_id)
    .fetch_all(pool)
    .await
}
