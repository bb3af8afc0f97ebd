/// Task use cases
///
/// Authorization follows [`crate::domain::policy`]. A task the actor may
/// not view is reported as `TaskNotFound`; an edit, delete or assignment
/// change by anyone but the owner is reported as `Forbidden`.
///
/// Assignee lists are replaced wholesale: when an update carries a list
/// (even an empty one) every existing assignment row is deleted and the new
/// rows are recreated, which also resets their `assigned_by` and timestamp.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{normalize_page, TaskView};
use crate::clock::Clock;
use crate::db::repository::{AssigneeRepository, TaskRepository, UserRepository};
use crate::db::{with_cancel, Backend};
use crate::domain::{policy, Task, TaskAssignee};
use crate::error::{Error, Result};

/// Fields for a new task
#[derive(Debug, Clone, Default)]
pub struct CreateTaskInput {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<i32>,
    pub assignee_ids: Vec<i64>,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskInput {
    pub title: Option<String>,

    /// Blank text clears the description
    pub description: Option<String>,

    /// `Some(None)` clears the due date
    pub due_date: Option<Option<DateTime<Utc>>>,

    /// Requested status name, checked against the transition table
    pub status: Option<String>,

    pub priority: Option<i32>,

    /// `Some` replaces every assignment, `Some(vec![])` clears them
    pub assignee_ids: Option<Vec<i64>>,
}

/// Task use cases
#[derive(Clone)]
pub struct TaskService<B> {
    backend: B,
    clock: Arc<dyn Clock>,
}

impl<B: Backend> TaskService<B> {
    pub fn new(backend: B, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Tasks the actor owns or is assigned to, newest first
    pub async fn list(
        &self,
        cancel: &CancellationToken,
        actor_id: i64,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<TaskView>> {
        let (limit, offset) = normalize_page(limit, offset);

        let views = with_cancel(cancel, async {
            let mut ex = self.backend.executor().await?;
            let tasks = self
                .backend
                .tasks()
                .list_for_user(&mut ex, actor_id, limit, offset)
                .await?;

            let mut views = Vec::with_capacity(tasks.len());
            for task in &tasks {
                let rows = self.backend.assignees().find_by_task(&mut ex, task.id).await?;
                views.push(TaskView::new(task, &rows));
            }
            Ok(views)
        })
        .await?;

        debug!(user_id = actor_id, limit, offset, count = views.len(), "Listed tasks");
        Ok(views)
    }

    /// Creates a task owned by the actor, with optional assignees
    ///
    /// # Errors
    ///
    /// - `Error::Domain` for an invalid title or priority
    /// - `Error::AssigneeNotFound` if any assignee id names no live user
    /// - `Error::DuplicateAssignee` if an id is listed twice
    ///
    /// Any failure rolls the whole task back.
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        actor_id: i64,
        input: CreateTaskInput,
    ) -> Result<TaskView> {
        let this = self.clone();
        let view = self
            .backend
            .run(cancel, move |ex| {
                Box::pin(async move { this.create_in(ex, actor_id, input).await })
            })
            .await?;

        info!(
            user_id = actor_id,
            task_id = view.id,
            assignees = view.assignees.len(),
            "Task created"
        );
        Ok(view)
    }

    async fn create_in(
        &self,
        ex: &mut B::Executor,
        actor_id: i64,
        input: CreateTaskInput,
    ) -> Result<TaskView> {
        let clock = self.clock.as_ref();

        let mut task = Task::new(clock, actor_id, &input.title)?;
        if let Some(description) = input.description.as_deref() {
            task.update_description(clock, Some(description));
        }
        if let Some(due_date) = input.due_date {
            task.update_due_date(clock, Some(due_date));
        }
        if let Some(priority) = input.priority {
            task.update_priority(clock, priority)?;
        }

        self.backend.tasks().create(ex, &mut task).await?;
        let rows = self.assign(ex, &task, &input.assignee_ids, actor_id).await?;

        Ok(TaskView::new(&task, &rows))
    }

    /// Fetches one task visible to the actor
    pub async fn get(&self, cancel: &CancellationToken, actor_id: i64, task_id: i64) -> Result<TaskView> {
        with_cancel(cancel, async {
            let mut ex = self.backend.executor().await?;
            let task = self
                .backend
                .tasks()
                .find_by_id(&mut ex, task_id)
                .await?
                .ok_or(Error::TaskNotFound)?;

            let rows = self.backend.assignees().find_by_task(&mut ex, task_id).await?;
            if !policy::can_view(&task, &rows, actor_id) {
                debug!(user_id = actor_id, task_id, "Task hidden from non-member");
                return Err(Error::TaskNotFound);
            }

            Ok(TaskView::new(&task, &rows))
        })
        .await
    }

    /// Applies a partial update; owner only
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        actor_id: i64,
        task_id: i64,
        input: UpdateTaskInput,
    ) -> Result<TaskView> {
        let this = self.clone();
        let view = self
            .backend
            .run(cancel, move |ex| {
                Box::pin(async move { this.update_in(ex, actor_id, task_id, input).await })
            })
            .await?;

        info!(user_id = actor_id, task_id, status = %view.status, "Task updated");
        Ok(view)
    }

    async fn update_in(
        &self,
        ex: &mut B::Executor,
        actor_id: i64,
        task_id: i64,
        input: UpdateTaskInput,
    ) -> Result<TaskView> {
        let clock = self.clock.as_ref();

        let mut task = self
            .backend
            .tasks()
            .find_by_id(ex, task_id)
            .await?
            .ok_or(Error::TaskNotFound)?;

        if !policy::can_edit(&task, actor_id) {
            return Err(Error::Forbidden);
        }

        if let Some(title) = input.title.as_deref() {
            task.update_title(clock, title)?;
        }
        if let Some(description) = input.description.as_deref() {
            task.update_description(clock, Some(description));
        }
        if let Some(due_date) = input.due_date {
            task.update_due_date(clock, due_date);
        }
        if let Some(status) = input.status.as_deref() {
            task.change_status(clock, status)?;
        }
        if let Some(priority) = input.priority {
            task.update_priority(clock, priority)?;
        }

        self.backend.tasks().update(ex, &task).await?;

        let rows = match input.assignee_ids {
            Some(ids) => {
                if !policy::can_manage_assignees(&task, actor_id) {
                    return Err(Error::Forbidden);
                }
                let removed = self.backend.assignees().delete_by_task(ex, task.id).await?;
                debug!(task_id, removed, "Cleared assignees for replacement");
                self.assign(ex, &task, &ids, actor_id).await?
            }
            None => self.backend.assignees().find_by_task(ex, task.id).await?,
        };

        Ok(TaskView::new(&task, &rows))
    }

    /// Soft-deletes a task and drops its assignments; owner only
    pub async fn delete(&self, cancel: &CancellationToken, actor_id: i64, task_id: i64) -> Result<()> {
        let this = self.clone();
        self.backend
            .run(cancel, move |ex| {
                Box::pin(async move { this.delete_in(ex, actor_id, task_id).await })
            })
            .await?;

        info!(user_id = actor_id, task_id, "Task deleted");
        Ok(())
    }

    async fn delete_in(&self, ex: &mut B::Executor, actor_id: i64, task_id: i64) -> Result<()> {
        let mut task = self
            .backend
            .tasks()
            .find_by_id(ex, task_id)
            .await?
            .ok_or(Error::TaskNotFound)?;

        if !policy::can_delete(&task, actor_id) {
            return Err(Error::Forbidden);
        }

        self.backend.assignees().delete_by_task(ex, task.id).await?;
        task.soft_delete(self.clock.as_ref());
        self.backend.tasks().soft_delete(ex, &task).await?;

        Ok(())
    }

    /// Verifies each user and inserts one assignment row per id, in order
    async fn assign(
        &self,
        ex: &mut B::Executor,
        task: &Task,
        user_ids: &[i64],
        actor_id: i64,
    ) -> Result<Vec<TaskAssignee>> {
        let mut rows = Vec::with_capacity(user_ids.len());

        for &user_id in user_ids {
            if self.backend.users().find_by_id(ex, user_id).await?.is_none() {
                return Err(Error::AssigneeNotFound(user_id));
            }

            let row = TaskAssignee::new(self.clock.as_ref(), task.id, user_id, actor_id);
            self.backend
                .assignees()
                .create(ex, &row)
                .await
                .map_err(|e| {
                    if e.is_unique_violation() {
                        Error::DuplicateAssignee(user_id)
                    } else {
                        e.into()
                    }
                })?;
            rows.push(row);
        }

        // Same order as `find_by_task`
        rows.sort_by_key(|row| (row.created_at, row.user_id));
        Ok(rows)
    }
}
