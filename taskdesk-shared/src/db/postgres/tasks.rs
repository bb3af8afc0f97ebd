/// Task persistence on PostgreSQL

use async_trait::async_trait;

use super::PgExecutor;
use crate::db::error::DbError;
use crate::db::repository::TaskRepository;
use crate::domain::Task;

const TASK_COLUMNS: &str = "t.id, t.owner_id, t.title, t.description, t.due_date, t.status, \
                            t.priority, t.created_at, t.updated_at, t.deleted_at";

#[derive(Debug, Clone, Copy, Default)]
pub struct PgTaskRepository;

#[async_trait]
impl TaskRepository<PgExecutor> for PgTaskRepository {
    async fn create(&self, ex: &mut PgExecutor, task: &mut Task) -> Result<(), DbError> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO tasks (owner_id, title, description, due_date, status, priority, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id",
        )
        .bind(task.owner_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_date)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.created_at)
        .bind(task.updated_at)
        .fetch_one(ex.connection())
        .await?;

        task.id = id;
        Ok(())
    }

    async fn find_by_id(&self, ex: &mut PgExecutor, id: i64) -> Result<Option<Task>, DbError> {
        let sql = format!(
            "SELECT {} FROM tasks t WHERE t.id = $1 AND t.deleted_at IS NULL",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(ex.connection())
            .await?;

        Ok(task)
    }

    async fn list_for_user(
        &self,
        ex: &mut PgExecutor,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Task>, DbError> {
        let sql = format!(
            "SELECT {} FROM tasks t
             WHERE t.deleted_at IS NULL
               AND (t.owner_id = $1
                    OR EXISTS (SELECT 1 FROM task_assignees a
                               WHERE a.task_id = t.id AND a.user_id = $1))
             ORDER BY t.created_at DESC, t.id DESC
             LIMIT $2 OFFSET $3",
            TASK_COLUMNS
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(ex.connection())
            .await?;

        Ok(tasks)
    }

    async fn update(&self, ex: &mut PgExecutor, task: &Task) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE tasks
             SET title = $2, description = $3, due_date = $4, status = $5, priority = $6, updated_at = $7
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_date)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.updated_at)
        .execute(ex.connection())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::RowNotFound);
        }
        Ok(())
    }

    async fn soft_delete(&self, ex: &mut PgExecutor, task: &Task) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE tasks SET deleted_at = $2, updated_at = $3
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(task.id)
        .bind(task.deleted_at)
        .bind(task.updated_at)
        .execute(ex.connection())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::RowNotFound);
        }
        Ok(())
    }
}
