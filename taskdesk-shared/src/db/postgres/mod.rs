/// PostgreSQL storage backend
///
/// [`PgBackend`] wraps a connection pool. Its executor is either a pooled
/// connection (plain reads) or an open transaction (inside
/// [`UnitOfWork::run`]); repositories only ever see `&mut PgConnection`, so
/// the same SQL runs in both modes.
///
/// # Example
///
/// ```no_run
/// use taskdesk_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskdesk_shared::db::postgres::PgBackend;
/// use taskdesk_shared::db::Backend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let backend = PgBackend::new(pool);
/// backend.ping().await?;
/// # Ok(())
/// # }
/// ```

pub mod assignees;
pub mod tasks;
pub mod users;

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::Postgres;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::DbError;
use super::{pool, run_in_transaction, Backend, Transaction, UnitOfWork};
use crate::error::{Error, Result};

pub use assignees::PgAssigneeRepository;
pub use tasks::PgTaskRepository;
pub use users::PgUserRepository;

/// Executor over one PostgreSQL connection
pub struct PgExecutor(Conn);

enum Conn {
    Pooled(PoolConnection<Postgres>),
    Transaction(sqlx::Transaction<'static, Postgres>),
}

impl PgExecutor {
    /// Connection the next statement runs on
    pub fn connection(&mut self) -> &mut PgConnection {
        match &mut self.0 {
            Conn::Pooled(conn) => &mut **conn,
            Conn::Transaction(tx) => &mut **tx,
        }
    }
}

#[async_trait]
impl Transaction for PgExecutor {
    async fn commit(self) -> Result<(), DbError> {
        match self.0 {
            Conn::Pooled(_) => Ok(()),
            Conn::Transaction(tx) => Ok(tx.commit().await?),
        }
    }

    async fn rollback(self) -> Result<(), DbError> {
        match self.0 {
            Conn::Pooled(_) => Ok(()),
            Conn::Transaction(tx) => Ok(tx.rollback().await?),
        }
    }
}

/// PostgreSQL implementation of [`Backend`]
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
    users: PgUserRepository,
    tasks: PgTaskRepository,
    assignees: PgAssigneeRepository,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            users: PgUserRepository,
            tasks: PgTaskRepository,
            assignees: PgAssigneeRepository,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UnitOfWork for PgBackend {
    type Executor = PgExecutor;

    async fn run<T, F>(&self, cancel: &CancellationToken, work: F) -> Result<T>
    where
        T: Send,
        F: for<'e> FnOnce(&'e mut Self::Executor) -> BoxFuture<'e, Result<T>> + Send,
    {
        let tx = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            tx = self.pool.begin() => tx.map_err(|e| Error::BeginFailed(e.into()))?,
        };
        debug!("Transaction started");

        run_in_transaction(PgExecutor(Conn::Transaction(tx)), cancel, work).await
    }

    async fn executor(&self) -> Result<Self::Executor> {
        let conn = self.pool.acquire().await.map_err(DbError::from)?;
        Ok(PgExecutor(Conn::Pooled(conn)))
    }
}

#[async_trait]
impl Backend for PgBackend {
    type Users = PgUserRepository;
    type Tasks = PgTaskRepository;
    type Assignees = PgAssigneeRepository;

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn tasks(&self) -> &Self::Tasks {
        &self.tasks
    }

    fn assignees(&self) -> &Self::Assignees {
        &self.assignees
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(pool::health_check(&self.pool).await?)
    }
}
