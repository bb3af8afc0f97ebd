/// Task assignment join entity
///
/// One row per (task, user) pair. Assignments have no lifecycle of their
/// own: they are created one at a time and removed in bulk when a task's
/// assignee list is replaced or the task is deleted.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE task_assignees (
///     task_id BIGINT NOT NULL REFERENCES tasks(id),
///     user_id BIGINT NOT NULL REFERENCES users(id),
///     assigned_by BIGINT NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL,
///     CONSTRAINT task_assignees_task_user_unique UNIQUE (task_id, user_id)
/// );
/// ```

use chrono::{DateTime, Utc};

use crate::clock::Clock;

/// A user's assignment to a task
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TaskAssignee {
    pub task_id: i64,

    /// Assigned user
    pub user_id: i64,

    /// Actor who created the assignment
    pub assigned_by: i64,

    pub created_at: DateTime<Utc>,
}

impl TaskAssignee {
    pub fn new(clock: &dyn Clock, task_id: i64, user_id: i64, assigned_by: i64) -> Self {
        Self {
            task_id,
            user_id,
            assigned_by,
            created_at: clock.now(),
        }
    }
}
