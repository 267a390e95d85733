pub(crate) mod assignments;
pub(crate) mod classrooms;
pub(crate) mod questions;
pub(crate) mod results;
pub(crate) mod teacher_students;
pub(crate) mod users;
