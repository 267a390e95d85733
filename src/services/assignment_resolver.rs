use std::collections::HashMap;

use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::core::time::window_contains;
use crate::db::models::Test;
use crate::repositories::assignments::{self, ClassroomTestRow, DirectTestRow};

/// A test the student may access, with every path that grants it.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedTest {
    pub(crate) test: Test,
    pub(crate) direct: bool,
    pub(crate) classroom_ids: Vec<String>,
}

/// Merges direct and classroom assignment rows into one entry per test.
///
/// Direct rows come first in their given order, followed by classroom rows.
/// Hidden or out-of-window classroom rows and unpublished tests are skipped.
pub(crate) fn merge(
    direct: Vec<DirectTestRow>,
    classroom: Vec<ClassroomTestRow>,
    now: PrimitiveDateTime,
) -> Vec<ResolvedTest> {
    let mut resolved: Vec<ResolvedTest> = Vec::with_capacity(direct.len() + classroom.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in direct {
        if !row.test.is_published {
            continue;
        }
        if let Some(&index) = positions.get(&row.test.id) {
            resolved[index].direct = true;
            continue;
        }
        positions.insert(row.test.id.clone(), resolved.len());
        resolved.push(ResolvedTest { test: row.test, direct: true, classroom_ids: Vec::new() });
    }

    for row in classroom {
        if !row.test.is_published || !row.is_visible {
            continue;
        }
        if !window_contains(row.visible_from, row.visible_until, now) {
            continue;
        }
        match positions.get(&row.test.id) {
            Some(&index) => {
                let entry = &mut resolved[index];
                if !entry.classroom_ids.contains(&row.classroom_id) {
                    entry.classroom_ids.push(row.classroom_id);
                }
            }
            None => {
                positions.insert(row.test.id.clone(), resolved.len());
                resolved.push(ResolvedTest {
                    test: row.test,
                    direct: false,
                    classroom_ids: vec![row.classroom_id],
                });
            }
        }
    }

    resolved
}

pub(crate) async fn resolve_for_student(
    pool: &PgPool,
    student_id: &str,
    now: PrimitiveDateTime,
) -> Result<Vec<ResolvedTest>, sqlx::Error> {
    let direct = assignments::list_direct_tests(pool, student_id).await?;
    let classroom = assignments::list_classroom_tests(pool, student_id).await?;
    Ok(merge(direct, classroom, now))
}

pub(crate) async fn can_access(
    pool: &PgPool,
    student_id: &str,
    test_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let resolved = resolve_for_student(pool, student_id, now).await?;
    Ok(resolved.iter().any(|entry| entry.test.id == test_id))
}
