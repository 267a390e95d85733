pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod classrooms;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod helpers;
pub(crate) mod router;
pub(crate) mod student;
pub(crate) mod teacher;
pub(crate) mod test_routes;
pub(crate) mod validation;
