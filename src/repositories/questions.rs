use std::collections::BTreeMap;

use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Question;

pub(crate) const COLUMNS: &str = "\
    id, test_id, order_index, question_text, choices, correct_choice, explanation, \
    created_at, updated_at";

#[derive(Debug, Clone)]
pub(crate) struct QuestionFields {
    pub order_index: i32,
    pub question_text: String,
    pub choices: BTreeMap<String, String>,
    pub correct_choice: String,
    pub explanation: Option<String>,
}

impl From<&Question> for QuestionFields {
    fn from(question: &Question) -> Self {
        Self {
            order_index: question.order_index,
            question_text: question.question_text.clone(),
            choices: question.choices.0.clone(),
            correct_choice: question.correct_choice.clone(),
            explanation: question.explanation.clone(),
        }
    }
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    test_id: &str,
    fields: &QuestionFields,
    now: PrimitiveDateTime,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, test_id, order_index, question_text, choices, correct_choice, explanation,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
        RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(test_id)
    .bind(fields.order_index)
    .bind(&fields.question_text)
    .bind(Json(&fields.choices))
    .bind(&fields.correct_choice)
    .bind(&fields.explanation)
    .bind(now)
    .fetch_one(executor)
    .await
}

/// Ordered by `order_index`, ties broken by creation time.
pub(crate) async fn list_by_test(
    pool: &PgPool,
    test_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS}
         FROM questions
         WHERE test_id = $1
         ORDER BY order_index, created_at, id"
    ))
    .bind(test_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_in_test(
    pool: &PgPool,
    test_id: &str,
    question_id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE id = $1 AND test_id = $2"
    ))
    .bind(question_id)
    .bind(test_id)
    .fetch_optional(pool)
    .await
}

/// Looks up questions by id regardless of which test owns them.
pub(crate) async fn find_by_ids(
    executor: impl sqlx::PgExecutor<'_>,
    ids: &[String],
) -> Result<Vec<Question>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = ANY($1)"))
        .bind(ids)
        .fetch_all(executor)
        .await
}

pub(crate) async fn update(
    pool: &PgPool,
    question_id: &str,
    fields: &QuestionFields,
    now: PrimitiveDateTime,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET
            order_index = $1,
            question_text = $2,
            choices = $3,
            correct_choice = $4,
            explanation = $5,
            updated_at = $6
         WHERE id = $7
         RETURNING {COLUMNS}"
    ))
    .bind(fields.order_index)
    .bind(&fields.question_text)
    .bind(Json(&fields.choices))
    .bind(&fields.correct_choice)
    .bind(&fields.explanation)
    .bind(now)
    .bind(question_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(
    pool: &PgPool,
    test_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1 AND test_id = $2")
        .bind(question_id)
        .bind(test_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
