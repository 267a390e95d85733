use thiserror::Error;

use crate::db::types::UserRole;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub(crate) struct AccessDenied(pub(crate) &'static str);

#[derive(Debug, Clone, Copy)]
pub(crate) struct Actor<'a> {
    pub(crate) id: &'a str,
    pub(crate) role: UserRole,
}

impl Actor<'_> {
    fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

pub(crate) fn require_admin(actor: Actor<'_>) -> Result<(), AccessDenied> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AccessDenied("Admin privileges required"))
    }
}

/// Admins may create any account; teachers only students.
pub(crate) fn create_user(actor: Actor<'_>, target_role: UserRole) -> Result<(), AccessDenied> {
    match (actor.role, target_role) {
        (UserRole::Admin, _) => Ok(()),
        (UserRole::Teacher, UserRole::Student) => Ok(()),
        (UserRole::Teacher, _) => Err(AccessDenied("Teachers may only create student accounts")),
        (UserRole::Student, _) => Err(AccessDenied("Students may not create accounts")),
    }
}

pub(crate) fn author_tests(actor: Actor<'_>) -> Result<(), AccessDenied> {
    match actor.role {
        UserRole::Admin | UserRole::Teacher => Ok(()),
        UserRole::Student => Err(AccessDenied("Only teachers and admins may author tests")),
    }
}

/// Edit, delete and question changes: the creator or an admin.
pub(crate) fn edit_test(actor: Actor<'_>, created_by: Option<&str>) -> Result<(), AccessDenied> {
    if actor.is_admin() || (actor.role == UserRole::Teacher && created_by == Some(actor.id)) {
        Ok(())
    } else {
        Err(AccessDenied("Only the test creator or an admin may modify this test"))
    }
}

/// `target_linked` is whether the teacher is already linked to the student or classroom.
pub(crate) fn assign_test(
    actor: Actor<'_>,
    created_by: Option<&str>,
    target_linked: bool,
) -> Result<(), AccessDenied> {
    match actor.role {
        UserRole::Admin => Ok(()),
        UserRole::Student => Err(AccessDenied("Students may not assign tests")),
        UserRole::Teacher => {
            if created_by != Some(actor.id) {
                return Err(AccessDenied("Teachers may only assign tests they created"));
            }
            if !target_linked {
                return Err(AccessDenied("Teacher is not linked to this assignment target"));
            }
            Ok(())
        }
    }
}

/// The student themself, a linked teacher, or an admin.
pub(crate) fn view_student_results(
    actor: Actor<'_>,
    student_id: &str,
    teacher_linked: bool,
) -> Result<(), AccessDenied> {
    match actor.role {
        UserRole::Admin => Ok(()),
        UserRole::Student if actor.id == student_id => Ok(()),
        UserRole::Teacher if teacher_linked => Ok(()),
        _ => Err(AccessDenied("Not authorized to view this student's results")),
    }
}

/// Test-wide result listings: the creator or an admin.
pub(crate) fn view_test_results(
    actor: Actor<'_>,
    created_by: Option<&str>,
) -> Result<(), AccessDenied> {
    edit_test(actor, created_by)
        .map_err(|_| AccessDenied("Only the test creator or an admin may view these results"))
}

pub(crate) fn view_classroom(
    actor: Actor<'_>,
    is_classroom_teacher: bool,
) -> Result<(), AccessDenied> {
    match actor.role {
        UserRole::Admin => Ok(()),
        UserRole::Teacher if is_classroom_teacher => Ok(()),
        _ => Err(AccessDenied("Not authorized to view this classroom")),
    }
}

/// Adding or removing classroom members follows the same rule as viewing the roster.
pub(crate) fn manage_classroom(
    actor: Actor<'_>,
    is_classroom_teacher: bool,
) -> Result<(), AccessDenied> {
    view_classroom(actor, is_classroom_teacher)
        .map_err(|_| AccessDenied("Not authorized to manage this classroom"))
}

/// Teachers may enroll only students they already own through a direct link.
/// Classroom membership is itself a link, so it cannot be used to create one.
pub(crate) fn enroll_students(
    actor: Actor<'_>,
    all_directly_linked: bool,
) -> Result<(), AccessDenied> {
    match actor.role {
        UserRole::Admin => Ok(()),
        UserRole::Teacher if all_directly_linked => Ok(()),
        UserRole::Teacher => Err(AccessDenied("Teachers may only add students linked to them")),
        UserRole::Student => Err(AccessDenied("Not authorized to manage this classroom")),
    }
}

pub(crate) fn require_student(actor: Actor<'_>) -> Result<(), AccessDenied> {
    if actor.role == UserRole::Student {
        Ok(())
    } else {
        Err(AccessDenied("Only students may take tests"))
    }
}

pub(crate) fn require_teacher(actor: Actor<'_>) -> Result<(), AccessDenied> {
    if actor.role == UserRole::Teacher {
        Ok(())
    } else {
        Err(AccessDenied("Teacher role required"))
    }
}
