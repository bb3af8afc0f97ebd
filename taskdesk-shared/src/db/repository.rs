/// Repository contracts
///
/// Repositories are stateless translators between storage rows and domain
/// entities. Each method takes the executor to run on, so the caller decides
/// whether a call participates in a transaction. Every read excludes
/// soft-deleted rows.

use async_trait::async_trait;

use super::error::DbError;
use crate::domain::{Task, TaskAssignee, User};

#[async_trait]
pub trait UserRepository<E: Send>: Send + Sync {
    /// Inserts the user and stores the assigned id back into it
    ///
    /// Fails with `DbError::UniqueViolation` if the email is taken.
    async fn create(&self, ex: &mut E, user: &mut User) -> Result<(), DbError>;

    async fn find_by_id(&self, ex: &mut E, id: i64) -> Result<Option<User>, DbError>;

    /// Looks up by the normalized email
    async fn find_by_email(&self, ex: &mut E, email: &str) -> Result<Option<User>, DbError>;

    /// Like `find_by_id`, but holds a row lock until the transaction ends
    async fn lock_by_id(&self, ex: &mut E, id: i64) -> Result<Option<User>, DbError>;

    /// All live users, in id order
    async fn list(&self, ex: &mut E) -> Result<Vec<User>, DbError>;

    /// Persists every mutable column of the user
    async fn update(&self, ex: &mut E, user: &User) -> Result<(), DbError>;
}

#[async_trait]
pub trait TaskRepository<E: Send>: Send + Sync {
    /// Inserts the task and stores the assigned id back into it
    async fn create(&self, ex: &mut E, task: &mut Task) -> Result<(), DbError>;

    async fn find_by_id(&self, ex: &mut E, id: i64) -> Result<Option<Task>, DbError>;

    /// Tasks the user owns or is assigned to, newest first
    async fn list_for_user(
        &self,
        ex: &mut E,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Task>, DbError>;

    /// Persists every mutable column of the task
    async fn update(&self, ex: &mut E, task: &Task) -> Result<(), DbError>;

    /// Writes the task's delete and update timestamps
    async fn soft_delete(&self, ex: &mut E, task: &Task) -> Result<(), DbError>;
}

#[async_trait]
pub trait AssigneeRepository<E: Send>: Send + Sync {
    /// Inserts one assignment
    ///
    /// Fails with `DbError::UniqueViolation` if the pair already exists.
    async fn create(&self, ex: &mut E, assignee: &TaskAssignee) -> Result<(), DbError>;

    /// Assignments of a task, oldest first
    async fn find_by_task(&self, ex: &mut E, task_id: i64) -> Result<Vec<TaskAssignee>, DbError>;

    /// Removes every assignment of a task, returning how many were removed
    async fn delete_by_task(&self, ex: &mut E, task_id: i64) -> Result<u64, DbError>;
}
