/// Persistence layer for TaskDesk
///
/// This module defines the storage contract that use cases program against
/// and ships two implementations of it.
///
/// # Modules
///
/// - `repository`: Stateless repository traits, generic over an executor
/// - `postgres`: PostgreSQL backend (sqlx)
/// - `memory`: In-process backend used by tests and local runs
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: Database migration runner
///
/// # Unit of Work
///
/// [`UnitOfWork::run`] opens a transaction, hands its executor to the
/// caller's closure and then commits or rolls back depending on the
/// closure's result. [`UnitOfWork::executor`] hands out a plain,
/// non-transactional executor for read paths. Repositories accept either,
/// so the same repository call works inside and outside a transaction.
///
/// # Example
///
/// ```no_run
/// use taskdesk_shared::db::{Backend, UnitOfWork};
/// use taskdesk_shared::db::memory::MemoryDatabase;
/// use taskdesk_shared::db::repository::UserRepository;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> taskdesk_shared::error::Result<()> {
/// let db = MemoryDatabase::new();
/// let cancel = CancellationToken::new();
///
/// let users = db
///     .run(&cancel, |ex| {
///         let db = db.clone();
///         Box::pin(async move { Ok(db.users().list(ex).await?) })
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```

pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod postgres;
pub mod repository;

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use error::DbError;
use repository::{AssigneeRepository, TaskRepository, UserRepository};

/// Transactional scope over a storage backend
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Query handle shared by transactional and plain access
    type Executor: Send;

    /// Runs `work` inside one transaction
    ///
    /// - `Ok` from `work` commits; a commit failure becomes
    ///   [`Error::CommitFailed`].
    /// - `Err` from `work` rolls back and returns the original error, or
    ///   [`Error::RollbackFailed`] carrying both errors if the rollback fails.
    /// - A fired `cancel` token abandons `work`, rolls back and returns
    ///   [`Error::Cancelled`].
    async fn run<T, F>(&self, cancel: &CancellationToken, work: F) -> Result<T>
    where
        T: Send,
        F: for<'e> FnOnce(&'e mut Self::Executor) -> BoxFuture<'e, Result<T>> + Send;

    /// Non-transactional executor for read paths
    async fn executor(&self) -> Result<Self::Executor>;
}

/// An open transaction that can be finished exactly once
#[async_trait]
pub trait Transaction: Send + Sized {
    async fn commit(self) -> Result<(), DbError>;

    async fn rollback(self) -> Result<(), DbError>;
}

/// A complete storage backend: unit of work plus its repositories
#[async_trait]
pub trait Backend: UnitOfWork + Clone + 'static {
    type Users: UserRepository<Self::Executor>;
    type Tasks: TaskRepository<Self::Executor>;
    type Assignees: AssigneeRepository<Self::Executor>;

    fn users(&self) -> &Self::Users;

    fn tasks(&self) -> &Self::Tasks;

    fn assignees(&self) -> &Self::Assignees;

    /// Liveness probe for health reporting
    async fn ping(&self) -> Result<(), DbError>;
}

/// Drives `work` over an already-open transaction and finishes it
///
/// Shared by every backend so that commit, rollback and cancellation
/// behave identically regardless of storage.
pub async fn run_in_transaction<X, T, F>(mut tx: X, cancel: &CancellationToken, work: F) -> Result<T>
where
    X: Transaction,
    T: Send,
    F: for<'e> FnOnce(&'e mut X) -> BoxFuture<'e, Result<T>> + Send,
{
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("Operation cancelled inside transaction");
            Err(Error::Cancelled)
        }
        result = work(&mut tx) => result,
    };

    finish(tx, outcome).await
}

/// Commits on success, rolls back on failure
pub async fn finish<X, T>(tx: X, outcome: Result<T>) -> Result<T>
where
    X: Transaction,
{
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                error!(error = %e, "Transaction commit failed");
                Error::CommitFailed(e)
            })?;
            debug!("Transaction committed");
            Ok(value)
        }
        Err(cause) => match tx.rollback().await {
            Ok(()) => {
                warn!(error = %cause, "Transaction rolled back");
                Err(cause)
            }
            Err(rollback) => {
                error!(error = %cause, rollback_error = %rollback, "Transaction rollback failed");
                Err(Error::RollbackFailed {
                    cause: Box::new(cause),
                    rollback,
                })
            }
        },
    }
}

/// Races a non-transactional operation against the cancellation token
pub async fn with_cancel<T, Fut>(cancel: &CancellationToken, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Transaction double that records how it was finished
    #[derive(Default)]
    struct RecordingTx {
        commits: Arc<AtomicUsize>,
        rollbacks: Arc<AtomicUsize>,
        fail_commit: bool,
        fail_rollback: bool,
        writes: u32,
    }

    #[async_trait]
    impl Transaction for RecordingTx {
        async fn commit(self) -> Result<(), DbError> {
            if self.fail_commit {
                return Err(DbError::Unavailable("commit refused".into()));
            }
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(self) -> Result<(), DbError> {
            if self.fail_rollback {
                return Err(DbError::Unavailable("rollback refused".into()));
            }
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_success_commits() {
        let tx = RecordingTx::default();
        let commits = tx.commits.clone();
        let rollbacks = tx.rollbacks.clone();

        let result = run_in_transaction(tx, &CancellationToken::new(), |tx| {
            Box::pin(async move {
                tx.writes += 1;
                Ok(tx.writes)
            })
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(commits.load(Ordering::SeqCst), 1);
        assert_eq!(rollbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_rolls_back_and_returns_cause() {
        let tx = RecordingTx::default();
        let commits = tx.commits.clone();
        let rollbacks = tx.rollbacks.clone();

        let result: Result<()> = run_in_transaction(tx, &CancellationToken::new(), |_| {
            Box::pin(async move { Err(Error::TaskNotFound) })
        })
        .await;

        assert!(matches!(result, Err(Error::TaskNotFound)));
        assert_eq!(commits.load(Ordering::SeqCst), 0);
        assert_eq!(rollbacks.load(Ordering::SeqCst), 1);
    }

    /// Collects the level of every event emitted while installed
    #[derive(Clone, Default)]
    struct LevelRecorder(Arc<std::sync::Mutex<Vec<tracing::Level>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LevelRecorder {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    #[tokio::test]
    async fn test_rollback_is_logged_as_warning() {
        use tracing_subscriber::layer::SubscriberExt;

        let recorder = LevelRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let result: Result<()> = run_in_transaction(RecordingTx::default(), &CancellationToken::new(), |_| {
            Box::pin(async move { Err(Error::Forbidden) })
        })
        .await;

        assert!(matches!(result, Err(Error::Forbidden)));
        assert_eq!(*recorder.0.lock().unwrap(), vec![tracing::Level::WARN]);
    }

    #[tokio::test]
    async fn test_rollback_failure_wraps_both() {
        let tx = RecordingTx {
            fail_rollback: true,
            ..Default::default()
        };

        let result: Result<()> = run_in_transaction(tx, &CancellationToken::new(), |_| {
            Box::pin(async move { Err(Error::Forbidden) })
        })
        .await;

        match result {
            Err(Error::RollbackFailed { cause, rollback }) => {
                assert!(matches!(*cause, Error::Forbidden));
                assert!(matches!(rollback, DbError::Unavailable(_)));
            }
            other => panic!("expected rollback failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported() {
        let tx = RecordingTx {
            fail_commit: true,
            ..Default::default()
        };

        let result = run_in_transaction(tx, &CancellationToken::new(), |_| {
            Box::pin(async move { Ok(()) })
        })
        .await;

        assert!(matches!(result, Err(Error::CommitFailed(_))));
    }

    #[tokio::test]
    async fn test_cancellation_rolls_back() {
        let tx = RecordingTx::default();
        let commits = tx.commits.clone();
        let rollbacks = tx.rollbacks.clone();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run_in_transaction(tx, &cancel, |_| {
            Box::pin(async move {
                futures::future::pending::<()>().await;
                Ok(())
            })
        })
        .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(commits.load(Ordering::SeqCst), 0);
        assert_eq!(rollbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_cancel() {
        let cancel = CancellationToken::new();
        assert_eq!(with_cancel(&cancel, async { Ok(5) }).await.unwrap(), 5);

        cancel.cancel();
        let result: Result<()> = with_cancel(&cancel, futures::future::pending()).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
