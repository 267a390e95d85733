use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{GradingMode, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Test {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) created_by: Option<String>,
    pub(crate) is_timed: bool,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) max_attempts: Option<i32>,
    pub(crate) available_from: Option<PrimitiveDateTime>,
    pub(crate) available_until: Option<PrimitiveDateTime>,
    pub(crate) is_published: bool,
    pub(crate) pass_score: Option<i32>,
    pub(crate) grading_mode: GradingMode,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) order_index: i32,
    pub(crate) question_text: String,
    pub(crate) choices: Json<BTreeMap<String, String>>,
    pub(crate) correct_choice: String,
    pub(crate) explanation: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Classroom {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) created_by: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ClassroomTestAssignment {
    pub(crate) id: String,
    pub(crate) classroom_id: String,
    pub(crate) test_id: String,
    pub(crate) assigned_by: Option<String>,
    pub(crate) is_visible: bool,
    pub(crate) visible_from: Option<PrimitiveDateTime>,
    pub(crate) visible_until: Option<PrimitiveDateTime>,
    pub(crate) assigned_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StudentTestAssignment {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) test_id: String,
    pub(crate) assigned_by: Option<String>,
    pub(crate) assigned_at: PrimitiveDateTime,
    pub(crate) started: bool,
    pub(crate) finished: bool,
    pub(crate) score: Option<i32>,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct TestResult {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) test_id: String,
    pub(crate) score: i32,
    pub(crate) correct_count: i32,
    pub(crate) answered_count: i32,
    pub(crate) attempt_number: i32,
    pub(crate) completed_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StudentAnswer {
    pub(crate) id: String,
    pub(crate) test_result_id: String,
    pub(crate) student_id: String,
    pub(crate) question_id: String,
    pub(crate) selected_choice: String,
    pub(crate) is_correct: bool,
}
