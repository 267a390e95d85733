use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Classroom;
use crate::schemas::user::UserBrief;

pub(crate) const ROSTER_PREVIEW_LEN: usize = 5;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ClassroomCreate {
    #[validate(length(min = 1, max = 128, message = "name must be 1-128 characters"))]
    pub(crate) name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentIds {
    #[serde(alias = "studentIds")]
    pub(crate) student_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TeacherIds {
    #[serde(alias = "teacherIds")]
    pub(crate) teacher_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassroomResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) created_by: Option<String>,
    pub(crate) created_at: String,
}

impl ClassroomResponse {
    pub(crate) fn from_db(classroom: Classroom) -> Self {
        Self {
            id: classroom.id,
            name: classroom.name,
            created_by: classroom.created_by,
            created_at: format_primitive(classroom.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassroomDetailResponse {
    #[serde(flatten)]
    pub(crate) classroom: ClassroomResponse,
    pub(crate) teachers: Vec<UserBrief>,
    pub(crate) students: Vec<UserBrief>,
}

/// Overview row: all teachers, the first few students and the student count.
#[derive(Debug, Serialize)]
pub(crate) struct ClassroomWithUsers {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) teachers: Vec<UserBrief>,
    pub(crate) students: Vec<UserBrief>,
    pub(crate) total_students: usize,
}
