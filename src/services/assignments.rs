use sqlx::PgPool;
use thiserror::Error;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::db::models::{ClassroomTestAssignment, StudentTestAssignment};
use crate::repositories::assignments::{self, CreateClassroomAssignment};

#[derive(Debug, Error)]
pub(crate) enum AssignmentError {
    #[error("test is already assigned to this student")]
    DuplicateStudent,
    #[error("test is already assigned to this classroom")]
    DuplicateClassroom,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Visibility {
    pub(crate) is_visible: bool,
    pub(crate) visible_from: Option<PrimitiveDateTime>,
    pub(crate) visible_until: Option<PrimitiveDateTime>,
}

impl Default for Visibility {
    fn default() -> Self {
        Self { is_visible: true, visible_from: None, visible_until: None }
    }
}

/// Creates a direct assignment, rejecting an existing (student, test) pair.
pub(crate) async fn assign_to_student(
    pool: &PgPool,
    test_id: &str,
    student_id: &str,
    assigned_by: &str,
    now: PrimitiveDateTime,
) -> Result<StudentTestAssignment, AssignmentError> {
    if assignments::find_student_assignment(pool, student_id, test_id).await?.is_some() {
        return Err(AssignmentError::DuplicateStudent);
    }

    assignments::create_student_assignment(
        pool,
        &Uuid::new_v4().to_string(),
        student_id,
        test_id,
        assigned_by,
        now,
    )
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AssignmentError::DuplicateStudent
        } else {
            AssignmentError::Database(err)
        }
    })
}

/// Creates a classroom assignment, rejecting an existing (classroom, test) pair.
pub(crate) async fn assign_to_classroom(
    pool: &PgPool,
    test_id: &str,
    classroom_id: &str,
    assigned_by: &str,
    visibility: Visibility,
    now: PrimitiveDateTime,
) -> Result<ClassroomTestAssignment, AssignmentError> {
    if assignments::find_classroom_assignment(pool, classroom_id, test_id).await?.is_some() {
        return Err(AssignmentError::DuplicateClassroom);
    }

    assignments::create_classroom_assignment(
        pool,
        &Uuid::new_v4().to_string(),
        CreateClassroomAssignment {
            classroom_id,
            test_id,
            assigned_by,
            is_visible: visibility.is_visible,
            visible_from: visibility.visible_from,
            visible_until: visibility.visible_until,
            assigned_at: now,
        },
    )
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AssignmentError::DuplicateClassroom
        } else {
            AssignmentError::Database(err)
        }
    })
}
