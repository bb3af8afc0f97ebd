/// Task entity and its status state machine
///
/// A task is owned by exactly one user for its whole lifetime. Every
/// mutation goes through a named method that re-validates the touched field
/// and stamps `updated_at` from the injected clock.
///
/// # State Machine
///
/// ```text
/// TODO ──────→ IN_PROGRESS
///   ↑  ╲           │  ↑
///   │   ╲          ↓  │ (back to TODO)
///   │    ╰──────→ DONE
///   ╰──────────────╯
/// ```
///
/// DONE → IN_PROGRESS is not allowed; a finished task must be reopened to
/// TODO first.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('TODO', 'IN_PROGRESS', 'DONE');
///
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     owner_id BIGINT NOT NULL REFERENCES users(id),
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     due_date TIMESTAMPTZ,
///     status task_status NOT NULL DEFAULT 'TODO',
///     priority INTEGER NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL,
///     deleted_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```
/// use taskdesk_shared::clock::SystemClock;
/// use taskdesk_shared::domain::task::{Task, TaskStatus};
///
/// let clock = SystemClock;
/// let mut task = Task::new(&clock, 1, "  Write report ").unwrap();
/// assert_eq!(task.title, "Write report");
/// assert_eq!(task.status, TaskStatus::Todo);
///
/// task.change_status(&clock, "DONE").unwrap();
/// assert!(task.change_status(&clock, "IN_PROGRESS").is_err());
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::DomainError;
use crate::clock::Clock;

/// Maximum title length, in characters
pub const MAX_TITLE_LEN: usize = 255;

/// Lowest accepted priority
pub const MIN_PRIORITY: i32 = 0;

/// Highest accepted priority
pub const MAX_PRIORITY: i32 = 5;

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not started
    Todo,

    /// Being worked on
    InProgress,

    /// Finished
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    /// Wire and storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
        }
    }

    /// Checks if transition to target status is allowed
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Todo, TaskStatus::InProgress)
                | (TaskStatus::Todo, TaskStatus::Done)
                | (TaskStatus::InProgress, TaskStatus::Done)
                | (TaskStatus::InProgress, TaskStatus::Todo)
                | (TaskStatus::Done, TaskStatus::Todo)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TODO" => Ok(TaskStatus::Todo),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "DONE" => Ok(TaskStatus::Done),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Task entity
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Task {
    /// Storage-assigned id (0 until persisted)
    pub id: i64,

    /// Owning user; never changes
    pub owner_id: i64,

    /// Trimmed, non-empty title
    pub title: String,

    /// Trimmed description; `None` rather than an empty string
    pub description: Option<String>,

    pub due_date: Option<DateTime<Utc>>,

    pub status: TaskStatus,

    /// Priority in `MIN_PRIORITY..=MAX_PRIORITY`
    pub priority: i32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set once on soft delete
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Builds a new TODO task with priority 0
    ///
    /// # Errors
    ///
    /// Returns `TitleRequired` or `TitleTooLong` if the title is rejected.
    pub fn new(clock: &dyn Clock, owner_id: i64, title: &str) -> Result<Self, DomainError> {
        let title = validate_title(title)?;
        let now = clock.now();

        Ok(Self {
            id: 0,
            owner_id,
            title,
            description: None,
            due_date: None,
            status: TaskStatus::Todo,
            priority: MIN_PRIORITY,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    pub fn update_title(&mut self, clock: &dyn Clock, title: &str) -> Result<(), DomainError> {
        self.title = validate_title(title)?;
        self.touch(clock);
        Ok(())
    }

    /// Replaces the description; blank input clears it
    pub fn update_description(&mut self, clock: &dyn Clock, description: Option<&str>) {
        self.description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        self.touch(clock);
    }

    /// Replaces the due date; `None` clears it
    pub fn update_due_date(&mut self, clock: &dyn Clock, due_date: Option<DateTime<Utc>>) {
        self.due_date = due_date;
        self.touch(clock);
    }

    /// Replaces the priority, leaving the task untouched if out of range
    pub fn update_priority(&mut self, clock: &dyn Clock, priority: i32) -> Result<(), DomainError> {
        validate_priority(priority)?;
        self.priority = priority;
        self.touch(clock);
        Ok(())
    }

    /// Moves the task to the status named by `requested`
    ///
    /// The check runs against the in-memory current status, so callers must
    /// have loaded the task inside the active unit of work.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatusTransition` for unknown names and for
    /// disallowed pairs (including re-requesting the current status).
    pub fn change_status(&mut self, clock: &dyn Clock, requested: &str) -> Result<(), DomainError> {
        let next = requested
            .parse::<TaskStatus>()
            .ok()
            .filter(|next| self.status.can_transition_to(*next))
            .ok_or_else(|| DomainError::InvalidStatusTransition {
                from: self.status,
                requested: requested.to_string(),
            })?;

        self.status = next;
        self.touch(clock);
        Ok(())
    }

    /// Marks the task deleted; a second call is a no-op
    pub fn soft_delete(&mut self, clock: &dyn Clock) {
        if self.deleted_at.is_some() {
            return;
        }
        let now = clock.now();
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id == user_id
    }

    fn touch(&mut self, clock: &dyn Clock) {
        self.updated_at = clock.now();
    }
}

fn validate_title(title: &str) -> Result<String, DomainError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::TitleRequired);
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::TitleTooLong { max: MAX_TITLE_LEN });
    }
    Ok(title.to_string())
}

/// Checks a priority value against the accepted range
pub fn validate_priority(priority: i32) -> Result<(), DomainError> {
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return Err(DomainError::InvalidPriority(priority));
    }
    Ok(())
}
