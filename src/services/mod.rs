pub(crate) mod access_policy;
pub(crate) mod assignment_resolver;
pub(crate) mod assignments;
pub(crate) mod grading;
pub(crate) mod submissions;
