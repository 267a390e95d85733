use sqlx::PgPool;
use thiserror::Error;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::time::window_contains;
use crate::db::is_unique_violation;
use crate::db::models::{Test, TestResult};
use crate::repositories::{assignments, questions, results, tests};
use crate::services::assignment_resolver;
use crate::services::grading::{self, Grade, GradingError, SubmittedAnswer};

#[derive(Debug, Error)]
pub(crate) enum SubmissionError {
    #[error("test not found")]
    TestNotFound,
    #[error("test is not assigned to this student")]
    NotAssigned,
    #[error("test is not available at this time")]
    OutsideAvailability,
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error("maximum of {0} attempts reached")]
    AttemptsExhausted(i32),
    #[error("another submission for this attempt was recorded first")]
    AttemptRace,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug)]
pub(crate) struct SubmissionOutcome {
    pub(crate) test: Test,
    pub(crate) result: TestResult,
    pub(crate) grade: Grade,
}

/// Grades and records one attempt. Nothing is written unless every step succeeds.
pub(crate) async fn submit(
    pool: &PgPool,
    student_id: &str,
    test_id: &str,
    answers: &[SubmittedAnswer],
    now: PrimitiveDateTime,
) -> Result<SubmissionOutcome, SubmissionError> {
    let test = tests::find_by_id(pool, test_id).await?.ok_or(SubmissionError::TestNotFound)?;

    if !assignment_resolver::can_access(pool, student_id, test_id, now).await? {
        return Err(SubmissionError::NotAssigned);
    }

    if !window_contains(test.available_from, test.available_until, now) {
        return Err(SubmissionError::OutsideAvailability);
    }

    let question_ids: Vec<String> =
        answers.iter().map(|answer| answer.question_id.clone()).collect();
    let answer_keys = questions::find_by_ids(pool, &question_ids).await?;
    let grade = grading::grade(test_id, answers, &answer_keys)?;

    let mut tx = pool.begin().await?;

    let prior_attempts = results::count_attempts(&mut *tx, student_id, test_id).await?;
    if let Some(max_attempts) = test.max_attempts {
        if prior_attempts >= i64::from(max_attempts) {
            return Err(SubmissionError::AttemptsExhausted(max_attempts));
        }
    }
    let attempt_number = i32::try_from(prior_attempts + 1).unwrap_or(i32::MAX);

    let result_id = Uuid::new_v4().to_string();
    let result = results::create(
        &mut *tx,
        results::CreateTestResult {
            id: &result_id,
            student_id,
            test_id,
            score: grade.percentage,
            correct_count: grade.correct_count,
            answered_count: grade.answered_count,
            attempt_number,
            completed_at: now,
        },
    )
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            SubmissionError::AttemptRace
        } else {
            SubmissionError::Database(err)
        }
    })?;

    for answer in &grade.answers {
        results::create_answer(
            &mut *tx,
            results::CreateStudentAnswer {
                id: &Uuid::new_v4().to_string(),
                test_result_id: &result.id,
                student_id,
                question_id: &answer.question_id,
                selected_choice: &answer.selected_choice,
                is_correct: answer.is_correct,
            },
        )
        .await?;
    }

    assignments::record_attempt(&mut *tx, student_id, test_id, grade.percentage, now).await?;

    tx.commit().await?;

    Ok(SubmissionOutcome { test, result, grade })
}
