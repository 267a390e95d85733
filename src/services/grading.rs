use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::db::models::Question;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum GradingError {
    #[error("question {0} answered more than once")]
    DuplicateQuestion(String),
    #[error("question {0} not found in this test")]
    QuestionNotFound(String),
}

#[derive(Debug, Clone)]
pub(crate) struct SubmittedAnswer {
    pub(crate) question_id: String,
    pub(crate) selected_choice: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GradedAnswer {
    pub(crate) question_id: String,
    pub(crate) selected_choice: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Grade {
    pub(crate) answers: Vec<GradedAnswer>,
    pub(crate) correct_count: i32,
    pub(crate) answered_count: i32,
    pub(crate) percentage: i32,
}

/// Scores `answers` against the answer keys of `test_id`.
///
/// `questions` may contain rows from other tests; answering one of those is
/// treated the same as answering an unknown id.
pub(crate) fn grade(
    test_id: &str,
    answers: &[SubmittedAnswer],
    questions: &[Question],
) -> Result<Grade, GradingError> {
    let mut seen = HashSet::with_capacity(answers.len());
    for answer in answers {
        if !seen.insert(answer.question_id.as_str()) {
            return Err(GradingError::DuplicateQuestion(answer.question_id.clone()));
        }
    }

    let keys: HashMap<&str, &str> = questions
        .iter()
        .filter(|question| question.test_id == test_id)
        .map(|question| (question.id.as_str(), question.correct_choice.as_str()))
        .collect();

    let mut graded = Vec::with_capacity(answers.len());
    let mut correct_count = 0;

    for answer in answers {
        let correct_choice = keys
            .get(answer.question_id.as_str())
            .ok_or_else(|| GradingError::QuestionNotFound(answer.question_id.clone()))?;
        let is_correct = *correct_choice == answer.selected_choice;
        if is_correct {
            correct_count += 1;
        }
        graded.push(GradedAnswer {
            question_id: answer.question_id.clone(),
            selected_choice: answer.selected_choice.clone(),
            is_correct,
        });
    }

    let answered_count = graded.len() as i32;
    Ok(Grade {
        answers: graded,
        correct_count,
        answered_count,
        percentage: percentage(correct_count, answered_count),
    })
}

/// `correct / answered` as a whole percentage, halves rounded up. Zero answers score 0.
pub(crate) fn percentage(correct: i32, answered: i32) -> i32 {
    if answered <= 0 {
        return 0;
    }
    (correct * 100 + answered / 2) / answered
}

pub(crate) fn passed(score: i32, pass_score: Option<i32>) -> Option<bool> {
    pass_score.map(|threshold| score >= threshold)
}
