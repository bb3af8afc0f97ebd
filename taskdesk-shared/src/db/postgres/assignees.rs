/// Task assignment persistence on PostgreSQL

use async_trait::async_trait;

use super::PgExecutor;
use crate::db::error::DbError;
use crate::db::repository::AssigneeRepository;
use crate::domain::TaskAssignee;

#[derive(Debug, Clone, Copy, Default)]
pub struct PgAssigneeRepository;

#[async_trait]
impl AssigneeRepository<PgExecutor> for PgAssigneeRepository {
    async fn create(&self, ex: &mut PgExecutor, assignee: &TaskAssignee) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO task_assignees (task_id, user_id, assigned_by, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(assignee.task_id)
        .bind(assignee.user_id)
        .bind(assignee.assigned_by)
        .bind(assignee.created_at)
        .execute(ex.connection())
        .await?;

        Ok(())
    }

    async fn find_by_task(&self, ex: &mut PgExecutor, task_id: i64) -> Result<Vec<TaskAssignee>, DbError> {
        let rows = sqlx::query_as::<_, TaskAssignee>(
            "SELECT task_id, user_id, assigned_by, created_at
             FROM task_assignees
             WHERE task_id = $1
             ORDER BY created_at ASC, user_id ASC",
        )
        .bind(task_id)
        .fetch_all(ex.connection())
        .await?;

        Ok(rows)
    }

    async fn delete_by_task(&self, ex: &mut PgExecutor, task_id: i64) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM task_assignees WHERE task_id = $1")
            .bind(task_id)
            .execute(ex.connection())
            .await?;

        Ok(result.rows_affected())
    }
}
