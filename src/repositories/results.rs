use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{StudentAnswer, TestResult};

pub(crate) const COLUMNS: &str = "\
    id, student_id, test_id, score, correct_count, answered_count, attempt_number, completed_at";

pub(crate) const ANSWER_COLUMNS: &str =
    "id, test_result_id, student_id, question_id, selected_choice, is_correct";

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ResultView {
    #[sqlx(flatten)]
    pub(crate) result: TestResult,
    pub(crate) test_name: String,
    pub(crate) username: String,
}

pub(crate) struct CreateTestResult<'a> {
    pub id: &'a str,
    pub student_id: &'a str,
    pub test_id: &'a str,
    pub score: i32,
    pub correct_count: i32,
    pub answered_count: i32,
    pub attempt_number: i32,
    pub completed_at: PrimitiveDateTime,
}

pub(crate) struct CreateStudentAnswer<'a> {
    pub id: &'a str,
    pub test_result_id: &'a str,
    pub student_id: &'a str,
    pub question_id: &'a str,
    pub selected_choice: &'a str,
    pub is_correct: bool,
}

pub(crate) async fn count_attempts(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    test_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM test_results WHERE student_id = $1 AND test_id = $2",
    )
    .bind(student_id)
    .bind(test_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateTestResult<'_>,
) -> Result<TestResult, sqlx::Error> {
    sqlx::query_as::<_, TestResult>(&format!(
        "INSERT INTO test_results (
            id, student_id, test_id, score, correct_count, answered_count, attempt_number,
            completed_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.student_id)
    .bind(params.test_id)
    .bind(params.score)
    .bind(params.correct_count)
    .bind(params.answered_count)
    .bind(params.attempt_number)
    .bind(params.completed_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn create_answer(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateStudentAnswer<'_>,
) -> Result<StudentAnswer, sqlx::Error> {
    sqlx::query_as::<_, StudentAnswer>(&format!(
        "INSERT INTO student_answers (
            id, test_result_id, student_id, question_id, selected_choice, is_correct
        ) VALUES ($1,$2,$3,$4,$5,$6)
        RETURNING {ANSWER_COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.test_result_id)
    .bind(params.student_id)
    .bind(params.question_id)
    .bind(params.selected_choice)
    .bind(params.is_correct)
    .fetch_one(executor)
    .await
}

const VIEW_SELECT: &str = "\
    SELECT r.id, r.student_id, r.test_id, r.score, r.correct_count, r.answered_count, \
           r.attempt_number, r.completed_at, t.name AS test_name, u.username \
    FROM test_results r \
    JOIN tests t ON t.id = r.test_id \
    JOIN users u ON u.id = r.student_id";

pub(crate) async fn list_for_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<ResultView>, sqlx::Error> {
    sqlx::query_as::<_, ResultView>(&format!(
        "{VIEW_SELECT} WHERE r.student_id = $1 ORDER BY r.completed_at, r.attempt_number"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_for_test(
    pool: &PgPool,
    test_id: &str,
) -> Result<Vec<ResultView>, sqlx::Error> {
    sqlx::query_as::<_, ResultView>(&format!(
        "{VIEW_SELECT} WHERE r.test_id = $1 ORDER BY u.username, r.attempt_number"
    ))
    .bind(test_id)
    .fetch_all(pool)
    .await
}
