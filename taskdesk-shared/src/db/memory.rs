/// In-process storage backend
///
/// Holds all tables behind one async mutex. A transaction takes the lock
/// for its whole lifetime, works on a staged copy of the tables and writes
/// the copy back on commit; rollback simply drops it. Transactions are
/// therefore fully serialized, which gives the same observable guarantees
/// the use cases rely on from PostgreSQL (atomicity, uniqueness, row locks)
/// without an external service.
///
/// The same uniqueness constraints as the SQL schema are enforced: one user
/// per email (soft-deleted rows included) and one assignment per
/// (task, user) pair.
///
/// Fault injection hooks (`fail_next_begin`, `fail_next_commit`,
/// `fail_next_rollback`) let tests exercise the unit-of-work failure paths.
///
/// # Example
///
/// ```
/// use taskdesk_shared::db::memory::MemoryDatabase;
///
/// # #[tokio::main]
/// # async fn main() {
/// let db = MemoryDatabase::new();
/// db.fail_next_commit();
/// assert!(db.snapshot().await.users.is_empty());
/// # }
/// ```

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::DbError;
use super::repository::{AssigneeRepository, TaskRepository, UserRepository};
use super::{run_in_transaction, Backend, Transaction, UnitOfWork};
use crate::domain::{Task, TaskAssignee, User};
use crate::error::{Error, Result};

const USERS_EMAIL_KEY: &str = "users_email_key";
const ASSIGNEES_UNIQUE_KEY: &str = "task_assignees_task_user_unique";

/// Table contents
#[derive(Debug, Clone, Default)]
pub struct Tables {
    /// Users by id, soft-deleted rows included
    pub users: BTreeMap<i64, User>,

    /// Tasks by id, soft-deleted rows included
    pub tasks: BTreeMap<i64, Task>,

    /// Assignments in insertion order
    pub assignees: Vec<TaskAssignee>,

    next_user_id: i64,
    next_task_id: i64,
}

impl Tables {
    fn live_user(&self, id: i64) -> Option<&User> {
        self.users.get(&id).filter(|u| !u.is_deleted())
    }

    fn live_task(&self, id: i64) -> Option<&Task> {
        self.tasks.get(&id).filter(|t| !t.is_deleted())
    }
}

#[derive(Debug, Default)]
struct Faults {
    begin: AtomicBool,
    commit: AtomicBool,
    rollback: AtomicBool,
}

fn take(flag: &AtomicBool) -> bool {
    flag.swap(false, Ordering::SeqCst)
}

/// Cloneable handle to one in-memory database
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
    users: MemoryUserRepository,
    tasks: MemoryTaskRepository,
    assignees: MemoryAssigneeRepository,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `run` fail before its work starts
    pub fn fail_next_begin(&self) {
        self.faults.begin.store(true, Ordering::SeqCst);
    }

    /// Makes the next commit fail; the staged changes are discarded
    pub fn fail_next_commit(&self) {
        self.faults.commit.store(true, Ordering::SeqCst);
    }

    /// Makes the next rollback report failure; the staged changes are still discarded
    pub fn fail_next_rollback(&self) {
        self.faults.rollback.store(true, Ordering::SeqCst);
    }

    /// Copy of the committed tables
    ///
    /// Waits for any open transaction to finish.
    pub async fn snapshot(&self) -> Tables {
        self.tables.lock().await.clone()
    }
}

/// Executor over the in-memory tables
pub struct MemoryExecutor(Access);

enum Access {
    /// Each call locks, applies and releases
    Direct(Arc<Mutex<Tables>>),

    /// Holds the lock and a staged copy until commit or rollback
    Transaction {
        guard: OwnedMutexGuard<Tables>,
        staged: Tables,
        faults: Arc<Faults>,
    },
}

impl MemoryExecutor {
    async fn with<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Tables) -> R,
    {
        match &mut self.0 {
            Access::Direct(tables) => {
                let mut guard = tables.lock().await;
                f(&mut guard)
            }
            Access::Transaction { staged, .. } => f(staged),
        }
    }
}

#[async_trait]
impl Transaction for MemoryExecutor {
    async fn commit(self) -> Result<(), DbError> {
        match self.0 {
            Access::Direct(_) => Ok(()),
            Access::Transaction {
                mut guard,
                staged,
                faults,
            } => {
                if take(&faults.commit) {
                    return Err(DbError::Unavailable("commit failed".to_string()));
                }
                *guard = staged;
                Ok(())
            }
        }
    }

    async fn rollback(self) -> Result<(), DbError> {
        match self.0 {
            Access::Direct(_) => Ok(()),
            Access::Transaction { faults, .. } => {
                if take(&faults.rollback) {
                    return Err(DbError::Unavailable("rollback failed".to_string()));
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryDatabase {
    type Executor = MemoryExecutor;

    async fn run<T, F>(&self, cancel: &CancellationToken, work: F) -> Result<T>
    where
        T: Send,
        F: for<'e> FnOnce(&'e mut Self::Executor) -> BoxFuture<'e, Result<T>> + Send,
    {
        if take(&self.faults.begin) {
            return Err(Error::BeginFailed(DbError::Unavailable(
                "begin failed".to_string(),
            )));
        }

        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.tables.clone().lock_owned() => guard,
        };
        debug!("Memory transaction started");

        let staged = (*guard).clone();
        let tx = MemoryExecutor(Access::Transaction {
            guard,
            staged,
            faults: self.faults.clone(),
        });

        run_in_transaction(tx, cancel, work).await
    }

    async fn executor(&self) -> Result<Self::Executor> {
        Ok(MemoryExecutor(Access::Direct(self.tables.clone())))
    }
}

#[async_trait]
impl Backend for MemoryDatabase {
    type Users = MemoryUserRepository;
    type Tasks = MemoryTaskRepository;
    type Assignees = MemoryAssigneeRepository;

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
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryUserRepository;

#[async_trait]
impl UserRepository<MemoryExecutor> for MemoryUserRepository {
    async fn create(&self, ex: &mut MemoryExecutor, user: &mut User) -> Result<(), DbError> {
        ex.with(|t| {
            if t.users.values().any(|u| u.email == user.email) {
                return Err(DbError::UniqueViolation {
                    constraint: USERS_EMAIL_KEY.to_string(),
                });
            }
            t.next_user_id += 1;
            user.id = t.next_user_id;
            t.users.insert(user.id, user.clone());
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, ex: &mut MemoryExecutor, id: i64) -> Result<Option<User>, DbError> {
        Ok(ex.with(|t| t.live_user(id).cloned()).await)
    }

    async fn find_by_email(
        &self,
        ex: &mut MemoryExecutor,
        email: &str,
    ) -> Result<Option<User>, DbError> {
        Ok(ex
            .with(|t| {
                t.users
                    .values()
                    .find(|u| !u.is_deleted() && u.email == email)
                    .cloned()
            })
            .await)
    }

    async fn lock_by_id(&self, ex: &mut MemoryExecutor, id: i64) -> Result<Option<User>, DbError> {
        // A transaction already holds the table lock
        self.find_by_id(ex, id).await
    }

    async fn list(&self, ex: &mut MemoryExecutor) -> Result<Vec<User>, DbError> {
        Ok(ex
            .with(|t| t.users.values().filter(|u| !u.is_deleted()).cloned().collect())
            .await)
    }

    async fn update(&self, ex: &mut MemoryExecutor, user: &User) -> Result<(), DbError> {
        ex.with(|t| {
            if t.live_user(user.id).is_none() {
                return Err(DbError::RowNotFound);
            }
            if t
                .users
                .values()
                .any(|u| u.id != user.id && u.email == user.email)
            {
                return Err(DbError::UniqueViolation {
                    constraint: USERS_EMAIL_KEY.to_string(),
                });
            }
            t.users.insert(user.id, user.clone());
            Ok(())
        })
        .await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryTaskRepository;

#[async_trait]
impl TaskRepository<MemoryExecutor> for MemoryTaskRepository {
    async fn create(&self, ex: &mut MemoryExecutor, task: &mut Task) -> Result<(), DbError> {
        ex.with(|t| {
            t.next_task_id += 1;
            task.id = t.next_task_id;
            t.tasks.insert(task.id, task.clone());
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, ex: &mut MemoryExecutor, id: i64) -> Result<Option<Task>, DbError> {
        Ok(ex.with(|t| t.live_task(id).cloned()).await)
    }

    async fn list_for_user(
        &self,
        ex: &mut MemoryExecutor,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Task>, DbError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let offset = usize::try_from(offset).unwrap_or(0);

        Ok(ex
            .with(|t| {
                let mut tasks: Vec<Task> = t
                    .tasks
                    .values()
                    .filter(|task| !task.is_deleted())
                    .filter(|task| {
                        task.owner_id == user_id
                            || t.assignees
                                .iter()
                                .any(|a| a.task_id == task.id && a.user_id == user_id)
                    })
                    .cloned()
                    .collect();

                tasks.sort_by(|a, b| {
                    b.created_at
                        .cmp(&a.created_at)
                        .then_with(|| b.id.cmp(&a.id))
                });

                tasks.into_iter().skip(offset).take(limit).collect()
            })
            .await)
    }

    async fn update(&self, ex: &mut MemoryExecutor, task: &Task) -> Result<(), DbError> {
        ex.with(|t| {
            if t.live_task(task.id).is_none() {
                return Err(DbError::RowNotFound);
            }
            t.tasks.insert(task.id, task.clone());
            Ok(())
        })
        .await
    }

    async fn soft_delete(&self, ex: &mut MemoryExecutor, task: &Task) -> Result<(), DbError> {
        ex.with(|t| match t.tasks.get_mut(&task.id) {
            Some(stored) if !stored.is_deleted() => {
                stored.deleted_at = task.deleted_at;
                stored.updated_at = task.updated_at;
                Ok(())
            }
            _ => Err(DbError::RowNotFound),
        })
        .await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryAssigneeRepository;

#[async_trait]
impl AssigneeRepository<MemoryExecutor> for MemoryAssigneeRepository {
    async fn create(&self, ex: &mut MemoryExecutor, assignee: &TaskAssignee) -> Result<(), DbError> {
        ex.with(|t| {
            if t
                .assignees
                .iter()
                .any(|a| a.task_id == assignee.task_id && a.user_id == assignee.user_id)
            {
                return Err(DbError::UniqueViolation {
                    constraint: ASSIGNEES_UNIQUE_KEY.to_string(),
                });
            }
            t.assignees.push(assignee.clone());
            Ok(())
        })
        .await
    }

    async fn find_by_task(
        &self,
        ex: &mut MemoryExecutor,
        task_id: i64,
    ) -> Result<Vec<TaskAssignee>, DbError> {
        Ok(ex
            .with(|t| {
                let mut rows: Vec<TaskAssignee> = t
                    .assignees
                    .iter()
                    .filter(|a| a.task_id == task_id)
                    .cloned()
                    .collect();
                rows.sort_by_key(|a| (a.created_at, a.user_id));
                rows
            })
            .await)
    }

    async fn delete_by_task(&self, ex: &mut MemoryExecutor, task_id: i64) -> Result<u64, DbError> {
        Ok(ex
            .with(|t| {
                let before = t.assignees.len();
                t.assignees.retain(|a| a.task_id != task_id);
                (before - t.assignees.len()) as u64
            })
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
    }

    async fn insert_user(db: &MemoryDatabase, clock: &ManualClock, email: &str) -> User {
        let mut user = User::new(clock, email, "Someone").unwrap();
        let mut ex = db.executor().await.unwrap();
        db.users().create(&mut ex, &mut user).await.unwrap();
        user
    }

    async fn insert_task(db: &MemoryDatabase, clock: &ManualClock, owner: i64, title: &str) -> Task {
        let mut task = Task::new(clock, owner, title).unwrap();
        let mut ex = db.executor().await.unwrap();
        db.tasks().create(&mut ex, &mut task).await.unwrap();
        task
    }

    #[tokio::test]
    async fn test_user_ids_and_email_uniqueness() {
        let db = MemoryDatabase::new();
        let clock = clock();

        let alice = insert_user(&db, &clock, "alice@example.com").await;
        let bob = insert_user(&db, &clock, "bob@example.com").await;
        assert_eq!(alice.id, 1);
        assert_eq!(bob.id, 2);

        let mut dup = User::new(&clock, "alice@example.com", "Other").unwrap();
        let mut ex = db.executor().await.unwrap();
        let err = db.users().create(&mut ex, &mut dup).await.unwrap_err();
        assert!(err.is_unique_violation());

        let found = db
            .users()
            .find_by_email(&mut ex, "alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, alice.id);
    }

    #[tokio::test]
    async fn test_soft_deleted_rows_are_hidden() {
        let db = MemoryDatabase::new();
        let clock = clock();
        let owner = insert_user(&db, &clock, "owner@example.com").await;
        let mut task = insert_task(&db, &clock, owner.id, "Gone soon").await;

        let mut ex = db.executor().await.unwrap();
        task.soft_delete(&clock);
        db.tasks().soft_delete(&mut ex, &task).await.unwrap();

        assert!(db.tasks().find_by_id(&mut ex, task.id).await.unwrap().is_none());
        assert!(db
            .tasks()
            .list_for_user(&mut ex, owner.id, 20, 0)
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            db.tasks().update(&mut ex, &task).await,
            Err(DbError::RowNotFound)
        ));

        // Row retained in storage
        assert!(db.snapshot().await.tasks[&task.id].is_deleted());
    }

    #[tokio::test]
    async fn test_list_for_user_owned_or_assigned_newest_first() {
        let db = MemoryDatabase::new();
        let clock = clock();
        let alice = insert_user(&db, &clock, "alice@example.com").await;
        let bob = insert_user(&db, &clock, "bob@example.com").await;

        let first = insert_task(&db, &clock, alice.id, "first").await;
        clock.advance(Duration::minutes(1));
        let second = insert_task(&db, &clock, bob.id, "second").await;
        clock.advance(Duration::minutes(1));
        let _private = insert_task(&db, &clock, bob.id, "private").await;
        clock.advance(Duration::minutes(1));
        let third = insert_task(&db, &clock, alice.id, "third").await;

        let mut ex = db.executor().await.unwrap();
        db.assignees()
            .create(&mut ex, &TaskAssignee::new(&clock, second.id, alice.id, bob.id))
            .await
            .unwrap();

        let ids: Vec<i64> = db
            .tasks()
            .list_for_user(&mut ex, alice.id, 20, 0)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let page: Vec<i64> = db
            .tasks()
            .list_for_user(&mut ex, alice.id, 1, 1)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(page, vec![second.id]);
    }

    #[tokio::test]
    async fn test_assignee_uniqueness_and_bulk_delete() {
        let db = MemoryDatabase::new();
        let clock = clock();
        let mut ex = db.executor().await.unwrap();

        let row = TaskAssignee::new(&clock, 1, 2, 1);
        db.assignees().create(&mut ex, &row).await.unwrap();
        clock.advance(Duration::seconds(1));
        db.assignees()
            .create(&mut ex, &TaskAssignee::new(&clock, 1, 3, 1))
            .await
            .unwrap();
        db.assignees()
            .create(&mut ex, &TaskAssignee::new(&clock, 9, 2, 1))
            .await
            .unwrap();

        let err = db.assignees().create(&mut ex, &row).await.unwrap_err();
        assert!(err.is_unique_violation());

        let rows = db.assignees().find_by_task(&mut ex, 1).await.unwrap();
        assert_eq!(rows.iter().map(|a| a.user_id).collect::<Vec<_>>(), vec![2, 3]);

        assert_eq!(db.assignees().delete_by_task(&mut ex, 1).await.unwrap(), 2);
        assert!(db.assignees().find_by_task(&mut ex, 1).await.unwrap().is_empty());
        assert_eq!(db.assignees().find_by_task(&mut ex, 9).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transaction_commit_and_rollback() {
        let db = MemoryDatabase::new();
        let cancel = CancellationToken::new();

        let committed = db
            .run(&cancel, |ex| {
                let db = db.clone();
                Box::pin(async move {
                    let mut user = User::new(&clock(), "kept@example.com", "Kept")?;
                    db.users().create(ex, &mut user).await?;
                    Ok(user.id)
                })
            })
            .await
            .unwrap();
        assert_eq!(committed, 1);

        let result: Result<()> = db
            .run(&cancel, |ex| {
                let db = db.clone();
                Box::pin(async move {
                    let mut user = User::new(&clock(), "dropped@example.com", "Dropped")?;
                    db.users().create(ex, &mut user).await?;
                    Err(Error::Forbidden)
                })
            })
            .await;
        assert!(matches!(result, Err(Error::Forbidden)));

        let tables = db.snapshot().await;
        assert_eq!(tables.users.len(), 1);
        assert_eq!(tables.users[&1].email, "kept@example.com");
    }

    #[tokio::test]
    async fn test_injected_commit_failure_discards_changes() {
        let db = MemoryDatabase::new();
        db.fail_next_commit();

        let result = db
            .run(&CancellationToken::new(), |ex| {
                let db = db.clone();
                Box::pin(async move {
                    let mut user = User::new(&clock(), "lost@example.com", "Lost")?;
                    db.users().create(ex, &mut user).await?;
                    Ok(())
                })
            })
            .await;

        assert!(matches!(result, Err(Error::CommitFailed(_))));
        assert!(db.snapshot().await.users.is_empty());
    }

    #[tokio::test]
    async fn test_injected_begin_and_rollback_failures() {
        let db = MemoryDatabase::new();
        let cancel = CancellationToken::new();

        db.fail_next_begin();
        let result = db.run(&cancel, |_| Box::pin(async move { Ok(()) })).await;
        assert!(matches!(result, Err(Error::BeginFailed(_))));

        db.fail_next_rollback();
        let result: Result<()> = db
            .run(&cancel, |_| Box::pin(async move { Err(Error::TaskNotFound) }))
            .await;
        assert!(matches!(result, Err(ref e) if e.is_fatal()));

        // Faults are one-shot
        assert!(db.run(&cancel, |_| Box::pin(async move { Ok(()) })).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_before_lock() {
        let db = MemoryDatabase::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = db.run(&cancel, |_| Box::pin(async move { Ok(()) })).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
