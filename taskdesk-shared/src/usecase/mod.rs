/// Use-case orchestration
///
/// Each service method is one logical operation. Mutations run inside a
/// single [`UnitOfWork::run`](crate::db::UnitOfWork::run); reads use a plain
/// executor raced against the caller's cancellation token. Services hold no
/// per-request state and are cheap to clone.
///
/// Results are returned as serializable views rather than entities so that
/// password hashes and token versions never leave this layer.

pub mod auth;
pub mod task;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Task, TaskAssignee, TaskStatus, User};

pub use auth::{AuthOutput, AuthService, LoginInput, SignupInput};
pub use task::{CreateTaskInput, TaskService, UpdateTaskInput};

/// Page size used when none (or a non-positive one) is requested
pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// Largest page size honoured
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Clamps a requested page into `(limit, offset)`
pub fn normalize_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = match limit {
        Some(limit) if limit > 0 => limit.min(MAX_PAGE_LIMIT),
        _ => DEFAULT_PAGE_LIMIT,
    };
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Public user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub name: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// One assignment of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssigneeView {
    pub user_id: i64,
    pub assigned_by: i64,
    pub assigned_at: DateTime<Utc>,
}

impl From<&TaskAssignee> for AssigneeView {
    fn from(row: &TaskAssignee) -> Self {
        Self {
            user_id: row.user_id,
            assigned_by: row.assigned_by,
            assigned_at: row.created_at,
        }
    }
}

/// Task with its assignees
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub priority: i32,
    pub assignees: Vec<AssigneeView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskView {
    pub fn new(task: &Task, assignees: &[TaskAssignee]) -> Self {
        Self {
            id: task.id,
            owner_id: task.owner_id,
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: task.due_date,
            status: task.status,
            priority: task.priority,
            assignees: assignees.iter().map(AssigneeView::from).collect(),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }

    pub fn assignee_ids(&self) -> Vec<i64> {
        self.assignees.iter().map(|a| a.user_id).collect()
    }
}
