/// User persistence on PostgreSQL

use async_trait::async_trait;

use super::PgExecutor;
use crate::db::error::DbError;
use crate::db::repository::UserRepository;
use crate::domain::User;

const USER_COLUMNS: &str =
    "id, email, password_hash, name, token_version, created_at, updated_at, deleted_at";

#[derive(Debug, Clone, Copy, Default)]
pub struct PgUserRepository;

#[async_trait]
impl UserRepository<PgExecutor> for PgUserRepository {
    async fn create(&self, ex: &mut PgExecutor, user: &mut User) -> Result<(), DbError> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO users (email, password_hash, name, token_version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.token_version)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(ex.connection())
        .await?;

        user.id = id;
        Ok(())
    }

    async fn find_by_id(&self, ex: &mut PgExecutor, id: i64) -> Result<Option<User>, DbError> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(ex.connection())
            .await?;

        Ok(user)
    }

    async fn find_by_email(&self, ex: &mut PgExecutor, email: &str) -> Result<Option<User>, DbError> {
        let sql = format!(
            "SELECT {} FROM users WHERE email = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(ex.connection())
            .await?;

        Ok(user)
    }

    async fn lock_by_id(&self, ex: &mut PgExecutor, id: i64) -> Result<Option<User>, DbError> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(ex.connection())
            .await?;

        Ok(user)
    }

    async fn list(&self, ex: &mut PgExecutor) -> Result<Vec<User>, DbError> {
        let sql = format!(
            "SELECT {} FROM users WHERE deleted_at IS NULL ORDER BY id ASC",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(ex.connection())
            .await?;

        Ok(users)
    }

    async fn update(&self, ex: &mut PgExecutor, user: &User) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE users
             SET email = $2, password_hash = $3, name = $4, token_version = $5, updated_at = $6
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.token_version)
        .bind(user.updated_at)
        .execute(ex.connection())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::RowNotFound);
        }
        Ok(())
    }
}
