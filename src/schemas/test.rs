use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;
use validator::{Validate, ValidationError};

use crate::core::time::{deserialize_nullable_datetime, deserialize_optional_datetime, format_primitive};
use crate::db::models::{ClassroomTestAssignment, Question, StudentTestAssignment, Test};
use crate::db::types::GradingMode;
use crate::repositories::questions::QuestionFields;
use crate::repositories::tests::TestFields;
use crate::schemas::nullable;
use crate::services::assignment_resolver::ResolvedTest;

pub(crate) const CHOICE_KEYS: [&str; 4] = ["A", "B", "C", "D"];

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_question_create"))]
pub(crate) struct QuestionCreate {
    #[serde(default)]
    #[serde(alias = "order")]
    pub(crate) order_index: i32,
    #[validate(length(min = 1, message = "question_text must not be empty"))]
    #[serde(alias = "text")]
    pub(crate) question_text: String,
    pub(crate) choices: BTreeMap<String, String>,
    pub(crate) correct_choice: String,
    #[serde(default)]
    pub(crate) explanation: Option<String>,
}

impl QuestionCreate {
    pub(crate) fn into_fields(self) -> QuestionFields {
        QuestionFields {
            order_index: self.order_index,
            question_text: self.question_text,
            choices: self.choices,
            correct_choice: self.correct_choice,
            explanation: self.explanation,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionUpdate {
    #[serde(default)]
    #[serde(alias = "order")]
    pub(crate) order_index: Option<i32>,
    #[serde(default)]
    #[serde(alias = "text")]
    #[validate(length(min = 1, message = "question_text must not be empty"))]
    pub(crate) question_text: Option<String>,
    #[serde(default)]
    pub(crate) choices: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub(crate) correct_choice: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub(crate) explanation: Option<Option<String>>,
}

impl QuestionUpdate {
    /// Applies the patch to `current` and re-checks the choice invariants on the result.
    pub(crate) fn apply(self, current: &Question) -> Result<QuestionFields, ValidationError> {
        let mut fields = QuestionFields::from(current);
        if let Some(order_index) = self.order_index {
            fields.order_index = order_index;
        }
        if let Some(question_text) = self.question_text {
            fields.question_text = question_text;
        }
        if let Some(choices) = self.choices {
            fields.choices = choices;
        }
        if let Some(correct_choice) = self.correct_choice {
            fields.correct_choice = correct_choice;
        }
        if let Some(explanation) = self.explanation {
            fields.explanation = explanation;
        }
        validate_choices(&fields.choices, &fields.correct_choice)?;
        Ok(fields)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_test_create"))]
pub(crate) struct TestCreate {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) is_timed: bool,
    #[serde(default)]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, message = "max_attempts must be positive"))]
    pub(crate) max_attempts: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub(crate) available_from: Option<PrimitiveDateTime>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub(crate) available_until: Option<PrimitiveDateTime>,
    #[serde(default = "default_true")]
    pub(crate) is_published: bool,
    #[serde(default)]
    #[validate(range(min = 0, max = 100, message = "pass_score must be between 0 and 100"))]
    pub(crate) pass_score: Option<i32>,
    #[serde(default)]
    pub(crate) grading_mode: GradingMode,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) questions: Vec<QuestionCreate>,
}

impl TestCreate {
    pub(crate) fn fields(&self) -> TestFields {
        TestFields {
            name: self.name.clone(),
            description: self.description.clone(),
            is_timed: self.is_timed,
            duration_minutes: self.duration_minutes,
            max_attempts: self.max_attempts,
            available_from: self.available_from,
            available_until: self.available_until,
            is_published: self.is_published,
            pass_score: self.pass_score,
            grading_mode: self.grading_mode,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TestUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub(crate) name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub(crate) description: Option<Option<String>>,
    #[serde(default)]
    pub(crate) is_timed: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub(crate) duration_minutes: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub(crate) max_attempts: Option<Option<i32>>,
    #[serde(default, deserialize_with = "deserialize_nullable_datetime")]
    pub(crate) available_from: Option<Option<PrimitiveDateTime>>,
    #[serde(default, deserialize_with = "deserialize_nullable_datetime")]
    pub(crate) available_until: Option<Option<PrimitiveDateTime>>,
    #[serde(default)]
    pub(crate) is_published: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub(crate) pass_score: Option<Option<i32>>,
    #[serde(default)]
    pub(crate) grading_mode: Option<GradingMode>,
}

impl TestUpdate {
    /// Applies the patch to `current` and re-checks the invariants on the merged values.
    pub(crate) fn apply(self, current: &Test) -> Result<TestFields, ValidationError> {
        let mut fields = TestFields::from(current);
        if let Some(name) = self.name {
            fields.name = name;
        }
        if let Some(description) = self.description {
            fields.description = description;
        }
        if let Some(is_timed) = self.is_timed {
            fields.is_timed = is_timed;
        }
        if let Some(duration_minutes) = self.duration_minutes {
            fields.duration_minutes = duration_minutes;
        }
        if let Some(max_attempts) = self.max_attempts {
            fields.max_attempts = max_attempts;
        }
        if let Some(available_from) = self.available_from {
            fields.available_from = available_from;
        }
        if let Some(available_until) = self.available_until {
            fields.available_until = available_until;
        }
        if let Some(is_published) = self.is_published {
            fields.is_published = is_published;
        }
        if let Some(pass_score) = self.pass_score {
            fields.pass_score = pass_score;
        }
        if let Some(grading_mode) = self.grading_mode {
            fields.grading_mode = grading_mode;
        }
        validate_test_fields(&fields)?;
        Ok(fields)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClassroomAssign {
    #[serde(default = "default_true")]
    pub(crate) is_visible: bool,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub(crate) visible_from: Option<PrimitiveDateTime>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub(crate) visible_until: Option<PrimitiveDateTime>,
}

impl Default for ClassroomAssign {
    fn default() -> Self {
        Self { is_visible: true, visible_from: None, visible_until: None }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TestResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) created_by: Option<String>,
    pub(crate) is_timed: bool,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) max_attempts: Option<i32>,
    pub(crate) available_from: Option<String>,
    pub(crate) available_until: Option<String>,
    pub(crate) is_published: bool,
    pub(crate) pass_score: Option<i32>,
    pub(crate) grading_mode: GradingMode,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl TestResponse {
    pub(crate) fn from_db(test: Test) -> Self {
        Self {
            id: test.id,
            name: test.name,
            description: test.description,
            created_by: test.created_by,
            is_timed: test.is_timed,
            duration_minutes: test.duration_minutes,
            max_attempts: test.max_attempts,
            available_from: test.available_from.map(format_primitive),
            available_until: test.available_until.map(format_primitive),
            is_published: test.is_published,
            pass_score: test.pass_score,
            grading_mode: test.grading_mode,
            created_at: format_primitive(test.created_at),
            updated_at: format_primitive(test.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) order_index: i32,
    pub(crate) question_text: String,
    pub(crate) choices: BTreeMap<String, String>,
    pub(crate) correct_choice: String,
    pub(crate) explanation: Option<String>,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question) -> Self {
        Self {
            id: question.id,
            test_id: question.test_id,
            order_index: question.order_index,
            question_text: question.question_text,
            choices: question.choices.0,
            correct_choice: question.correct_choice,
            explanation: question.explanation,
        }
    }
}

/// Question as shown to a student taking the test: no answer key.
#[derive(Debug, Serialize)]
pub(crate) struct StudentQuestionResponse {
    pub(crate) id: String,
    pub(crate) order_index: i32,
    pub(crate) question_text: String,
    pub(crate) choices: BTreeMap<String, String>,
}

impl StudentQuestionResponse {
    pub(crate) fn from_db(question: Question) -> Self {
        Self {
            id: question.id,
            order_index: question.order_index,
            question_text: question.question_text,
            choices: question.choices.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TestDetailResponse {
    #[serde(flatten)]
    pub(crate) test: TestResponse,
    pub(crate) questions: Vec<QuestionResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentTestDetailResponse {
    #[serde(flatten)]
    pub(crate) test: TestResponse,
    pub(crate) questions: Vec<StudentQuestionResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignedTestResponse {
    #[serde(flatten)]
    pub(crate) test: TestResponse,
    pub(crate) direct: bool,
    pub(crate) classroom_ids: Vec<String>,
}

impl AssignedTestResponse {
    pub(crate) fn from_resolved(resolved: ResolvedTest) -> Self {
        Self {
            test: TestResponse::from_db(resolved.test),
            direct: resolved.direct,
            classroom_ids: resolved.classroom_ids,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentAssignmentResponse {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) test_id: String,
    pub(crate) assigned_by: Option<String>,
    pub(crate) assigned_at: String,
    pub(crate) started: bool,
    pub(crate) finished: bool,
    pub(crate) score: Option<i32>,
    pub(crate) completed_at: Option<String>,
}

impl StudentAssignmentResponse {
    pub(crate) fn from_db(assignment: StudentTestAssignment) -> Self {
        Self {
            id: assignment.id,
            student_id: assignment.student_id,
            test_id: assignment.test_id,
            assigned_by: assignment.assigned_by,
            assigned_at: format_primitive(assignment.assigned_at),
            started: assignment.started,
            finished: assignment.finished,
            score: assignment.score,
            completed_at: assignment.completed_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassroomAssignmentResponse {
    pub(crate) id: String,
    pub(crate) classroom_id: String,
    pub(crate) test_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) test_name: Option<String>,
    pub(crate) assigned_by: Option<String>,
    pub(crate) is_visible: bool,
    pub(crate) visible_from: Option<String>,
    pub(crate) visible_until: Option<String>,
    pub(crate) assigned_at: String,
}

impl ClassroomAssignmentResponse {
    pub(crate) fn from_db(assignment: ClassroomTestAssignment, test_name: Option<String>) -> Self {
        Self {
            id: assignment.id,
            classroom_id: assignment.classroom_id,
            test_id: assignment.test_id,
            test_name,
            assigned_by: assignment.assigned_by,
            is_visible: assignment.is_visible,
            visible_from: assignment.visible_from.map(format_primitive),
            visible_until: assignment.visible_until.map(format_primitive),
            assigned_at: format_primitive(assignment.assigned_at),
        }
    }
}

pub(crate) fn validate_choices(
    choices: &BTreeMap<String, String>,
    correct_choice: &str,
) -> Result<(), ValidationError> {
    if choices.is_empty() {
        return Err(validation_error("choices", "choices must not be empty"));
    }
    if choices.keys().any(|key| !CHOICE_KEYS.contains(&key.as_str())) {
        return Err(validation_error("choices", "choice keys must be A, B, C or D"));
    }
    if !choices.contains_key(correct_choice) {
        return Err(validation_error("correct_choice", "correct_choice must be one of the choice keys"));
    }
    Ok(())
}

pub(crate) fn validate_window(
    from: Option<PrimitiveDateTime>,
    until: Option<PrimitiveDateTime>,
) -> Result<(), ValidationError> {
    match (from, until) {
        (Some(from), Some(until)) if from > until => Err(validation_error(
            "availability",
            "available_from must not be later than available_until",
        )),
        _ => Ok(()),
    }
}

fn validate_question_create(payload: &QuestionCreate) -> Result<(), ValidationError> {
    validate_choices(&payload.choices, &payload.correct_choice)
}

fn validate_test_create(payload: &TestCreate) -> Result<(), ValidationError> {
    validate_window(payload.available_from, payload.available_until)
}

fn validate_test_fields(fields: &TestFields) -> Result<(), ValidationError> {
    if fields.name.trim().is_empty() {
        return Err(validation_error("name", "name must not be empty"));
    }
    if fields.pass_score.is_some_and(|score| !(0..=100).contains(&score)) {
        return Err(validation_error("pass_score", "pass_score must be between 0 and 100"));
    }
    if fields.max_attempts.is_some_and(|max| max < 1) {
        return Err(validation_error("max_attempts", "max_attempts must be positive"));
    }
    if fields.duration_minutes.is_some_and(|minutes| minutes < 1) {
        return Err(validation_error("duration_minutes", "duration_minutes must be positive"));
    }
    validate_window(fields.available_from, fields.available_until)
}

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn question_payload(correct: &str) -> serde_json::Value {
        json!({
            "question_text": "2 + 2?",
            "choices": {"A": "3", "B": "4", "C": "5", "D": "6"},
            "correct_choice": correct
        })
    }

    #[test]
    fn correct_choice_must_be_a_choice_key() {
        let ok: QuestionCreate = serde_json::from_value(question_payload("B")).unwrap();
        assert!(ok.validate().is_ok());

        let bad: QuestionCreate = serde_json::from_value(question_payload("E")).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn choice_keys_are_limited_to_a_through_d() {
        let choices: BTreeMap<String, String> =
            [("A".to_string(), "x".to_string()), ("Z".to_string(), "y".to_string())].into();
        assert!(validate_choices(&choices, "A").is_err());
    }

    #[test]
    fn inverted_availability_window_is_rejected() {
        let payload: TestCreate = serde_json::from_value(json!({
            "name": "Algebra",
            "available_from": "2025-05-02T00:00:00Z",
            "available_until": "2025-05-01T00:00:00Z"
        }))
        .unwrap();

        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_create_defaults() {
        let payload: TestCreate = serde_json::from_value(json!({"name": "Algebra"})).unwrap();
        assert!(payload.validate().is_ok());
        assert!(payload.is_published);
        assert_eq!(payload.grading_mode, GradingMode::Instant);
        assert!(payload.questions.is_empty());
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let current = Test {
            id: "t1".to_string(),
            name: "Algebra".to_string(),
            description: Some("old".to_string()),
            created_by: None,
            is_timed: false,
            duration_minutes: None,
            max_attempts: Some(3),
            available_from: Some(datetime!(2025-01-01 00:00:00)),
            available_until: None,
            is_published: true,
            pass_score: Some(50),
            grading_mode: GradingMode::Instant,
            created_at: datetime!(2025-01-01 00:00:00),
            updated_at: datetime!(2025-01-01 00:00:00),
        };

        let patch: TestUpdate =
            serde_json::from_value(json!({"max_attempts": null, "description": "new"})).unwrap();
        let fields = patch.apply(&current).unwrap();

        assert_eq!(fields.max_attempts, None);
        assert_eq!(fields.description.as_deref(), Some("new"));
        assert_eq!(fields.pass_score, Some(50));
        assert_eq!(fields.available_from, Some(datetime!(2025-01-01 00:00:00)));
    }

    #[test]
    fn update_rechecks_window_against_stored_values() {
        let current = Test {
            id: "t1".to_string(),
            name: "Algebra".to_string(),
            description: None,
            created_by: None,
            is_timed: false,
            duration_minutes: None,
            max_attempts: None,
            available_from: Some(datetime!(2025-06-01 00:00:00)),
            available_until: None,
            is_published: true,
            pass_score: None,
            grading_mode: GradingMode::Instant,
            created_at: datetime!(2025-01-01 00:00:00),
            updated_at: datetime!(2025-01-01 00:00:00),
        };

        let patch: TestUpdate =
            serde_json::from_value(json!({"available_until": "2025-05-01T00:00"})).unwrap();
        assert!(patch.apply(&current).is_err());
    }
}
