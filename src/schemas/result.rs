use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::types::GradingMode;
use crate::repositories::results::ResultView;
use crate::services::grading::{self, SubmittedAnswer};
use crate::services::submissions::SubmissionOutcome;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerRequest {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(alias = "selectedChoice")]
    pub(crate) selected_choice: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitRequest {
    #[serde(alias = "testId")]
    pub(crate) test_id: String,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) answers: Vec<AnswerRequest>,
}

impl SubmitRequest {
    pub(crate) fn answers(&self) -> Vec<SubmittedAnswer> {
        self.answers
            .iter()
            .map(|answer| SubmittedAnswer {
                question_id: answer.question_id.clone(),
                selected_choice: answer.selected_choice.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerOutcome {
    pub(crate) question_id: String,
    pub(crate) selected_choice: String,
    pub(crate) is_correct: bool,
}

/// Score fields are omitted for deferred-grading tests.
#[derive(Debug, Serialize)]
pub(crate) struct SubmitResponse {
    pub(crate) result_id: String,
    pub(crate) test_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) grading_mode: GradingMode,
    pub(crate) completed_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correct_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) answered_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) passed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) answers: Option<Vec<AnswerOutcome>>,
}

impl SubmitResponse {
    pub(crate) fn from_outcome(outcome: SubmissionOutcome) -> Self {
        let SubmissionOutcome { test, result, grade } = outcome;
        let base = Self {
            result_id: result.id,
            test_id: result.test_id,
            attempt_number: result.attempt_number,
            grading_mode: test.grading_mode,
            completed_at: format_primitive(result.completed_at),
            score: None,
            correct_count: None,
            answered_count: None,
            passed: None,
            answers: None,
        };

        match test.grading_mode {
            GradingMode::Deferred => base,
            GradingMode::Instant => Self {
                score: Some(result.score),
                correct_count: Some(result.correct_count),
                answered_count: Some(result.answered_count),
                passed: grading::passed(result.score, test.pass_score),
                answers: Some(
                    grade
                        .answers
                        .into_iter()
                        .map(|answer| AnswerOutcome {
                            question_id: answer.question_id,
                            selected_choice: answer.selected_choice,
                            is_correct: answer.is_correct,
                        })
                        .collect(),
                ),
                ..base
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TestResultResponse {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) test_name: String,
    pub(crate) student_id: String,
    pub(crate) username: String,
    pub(crate) score: i32,
    pub(crate) correct_count: i32,
    pub(crate) answered_count: i32,
    pub(crate) attempt_number: i32,
    pub(crate) completed_at: String,
}

impl TestResultResponse {
    pub(crate) fn from_view(view: ResultView) -> Self {
        Self {
            id: view.result.id,
            test_id: view.result.test_id,
            test_name: view.test_name,
            student_id: view.result.student_id,
            username: view.username,
            score: view.result.score,
            correct_count: view.result.correct_count,
            answered_count: view.result.answered_count,
            attempt_number: view.result.attempt_number,
            completed_at: format_primitive(view.result.completed_at),
        }
    }
}
