use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{ClassroomTestAssignment, StudentTestAssignment, Test};

pub(crate) const STUDENT_COLUMNS: &str = "\
    id, student_id, test_id, assigned_by, assigned_at, started, finished, score, completed_at";

pub(crate) const CLASSROOM_COLUMNS: &str = "\
    id, classroom_id, test_id, assigned_by, is_visible, visible_from, visible_until, assigned_at";

/// A test reached through a direct assignment.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct DirectTestRow {
    #[sqlx(flatten)]
    pub(crate) test: Test,
    pub(crate) assigned_at: PrimitiveDateTime,
}

/// A test reached through one of the student's classrooms.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ClassroomTestRow {
    #[sqlx(flatten)]
    pub(crate) test: Test,
    pub(crate) classroom_id: String,
    pub(crate) is_visible: bool,
    pub(crate) visible_from: Option<PrimitiveDateTime>,
    pub(crate) visible_until: Option<PrimitiveDateTime>,
    pub(crate) assigned_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ClassroomAssignmentView {
    #[sqlx(flatten)]
    pub(crate) assignment: ClassroomTestAssignment,
    pub(crate) test_name: String,
}

pub(crate) struct CreateClassroomAssignment<'a> {
    pub classroom_id: &'a str,
    pub test_id: &'a str,
    pub assigned_by: &'a str,
    pub is_visible: bool,
    pub visible_from: Option<PrimitiveDateTime>,
    pub visible_until: Option<PrimitiveDateTime>,
    pub assigned_at: PrimitiveDateTime,
}

pub(crate) async fn find_student_assignment(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    test_id: &str,
) -> Result<Option<StudentTestAssignment>, sqlx::Error> {
    sqlx::query_as::<_, StudentTestAssignment>(&format!(
        "SELECT {STUDENT_COLUMNS}
         FROM student_test_assignments
         WHERE student_id = $1 AND test_id = $2"
    ))
    .bind(student_id)
    .bind(test_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn create_student_assignment(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    student_id: &str,
    test_id: &str,
    assigned_by: &str,
    assigned_at: PrimitiveDateTime,
) -> Result<StudentTestAssignment, sqlx::Error> {
    sqlx::query_as::<_, StudentTestAssignment>(&format!(
        "INSERT INTO student_test_assignments (
            id, student_id, test_id, assigned_by, assigned_at, started, finished
        ) VALUES ($1, $2, $3, $4, $5, FALSE, FALSE)
        RETURNING {STUDENT_COLUMNS}"
    ))
    .bind(id)
    .bind(student_id)
    .bind(test_id)
    .bind(assigned_by)
    .bind(assigned_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn delete_student_assignment(
    pool: &PgPool,
    student_id: &str,
    test_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM student_test_assignments WHERE student_id = $1 AND test_id = $2",
    )
    .bind(student_id)
    .bind(test_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Marks the direct assignment (if any) as taken with the latest attempt's score.
pub(crate) async fn record_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    test_id: &str,
    score: i32,
    completed_at: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE student_test_assignments
         SET started = TRUE, finished = TRUE, score = $1, completed_at = $2
         WHERE student_id = $3 AND test_id = $4",
    )
    .bind(score)
    .bind(completed_at)
    .bind(student_id)
    .bind(test_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn find_classroom_assignment(
    executor: impl sqlx::PgExecutor<'_>,
    classroom_id: &str,
    test_id: &str,
) -> Result<Option<ClassroomTestAssignment>, sqlx::Error> {
    sqlx::query_as::<_, ClassroomTestAssignment>(&format!(
        "SELECT {CLASSROOM_COLUMNS}
         FROM classroom_test_assignments
         WHERE classroom_id = $1 AND test_id = $2"
    ))
    .bind(classroom_id)
    .bind(test_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn create_classroom_assignment(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    params: CreateClassroomAssignment<'_>,
) -> Result<ClassroomTestAssignment, sqlx::Error> {
    sqlx::query_as::<_, ClassroomTestAssignment>(&format!(
        "INSERT INTO classroom_test_assignments (
            id, classroom_id, test_id, assigned_by, is_visible, visible_from, visible_until,
            assigned_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {CLASSROOM_COLUMNS}"
    ))
    .bind(id)
    .bind(params.classroom_id)
    .bind(params.test_id)
    .bind(params.assigned_by)
    .bind(params.is_visible)
    .bind(params.visible_from)
    .bind(params.visible_until)
    .bind(params.assigned_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn delete_classroom_assignment(
    pool: &PgPool,
    classroom_id: &str,
    test_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM classroom_test_assignments WHERE classroom_id = $1 AND test_id = $2",
    )
    .bind(classroom_id)
    .bind(test_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_for_classroom(
    pool: &PgPool,
    classroom_id: &str,
) -> Result<Vec<ClassroomAssignmentView>, sqlx::Error> {
    sqlx::query_as::<_, ClassroomAssignmentView>(
        "SELECT cta.id, cta.classroom_id, cta.test_id, cta.assigned_by, cta.is_visible,
                cta.visible_from, cta.visible_until, cta.assigned_at, t.name AS test_name
         FROM classroom_test_assignments cta
         JOIN tests t ON t.id = cta.test_id
         WHERE cta.classroom_id = $1
         ORDER BY cta.assigned_at, cta.id",
    )
    .bind(classroom_id)
    .fetch_all(pool)
    .await
}

/// Direct assignments of `student_id`, in assignment order.
pub(crate) async fn list_direct_tests(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
) -> Result<Vec<DirectTestRow>, sqlx::Error> {
    sqlx::query_as::<_, DirectTestRow>(
        "SELECT t.id, t.name, t.description, t.created_by, t.is_timed, t.duration_minutes,
                t.max_attempts, t.available_from, t.available_until, t.is_published,
                t.pass_score, t.grading_mode, t.created_at, t.updated_at,
                sta.assigned_at
         FROM student_test_assignments sta
         JOIN tests t ON t.id = sta.test_id
         WHERE sta.student_id = $1
         ORDER BY sta.assigned_at, sta.id",
    )
    .bind(student_id)
    .fetch_all(executor)
    .await
}

/// Classroom assignments reaching `student_id` through any membership, in assignment order.
pub(crate) async fn list_classroom_tests(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
) -> Result<Vec<ClassroomTestRow>, sqlx::Error> {
    sqlx::query_as::<_, ClassroomTestRow>(
        "SELECT t.id, t.name, t.description, t.created_by, t.is_timed, t.duration_minutes,
                t.max_attempts, t.available_from, t.available_until, t.is_published,
                t.pass_score, t.grading_mode, t.created_at, t.updated_at,
                cta.classroom_id, cta.is_visible, cta.visible_from, cta.visible_until,
                cta.assigned_at
         FROM classroom_test_assignments cta
         JOIN classroom_students cs ON cs.classroom_id = cta.classroom_id
         JOIN tests t ON t.id = cta.test_id
         WHERE cs.student_id = $1
         ORDER BY cta.assigned_at, cta.id",
    )
    .bind(student_id)
    .fetch_all(executor)
    .await
}
