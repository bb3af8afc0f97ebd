/// Domain layer
///
/// Entities enforce their own field and state invariants at the point of
/// mutation; [`policy`] holds the pure authorization predicates. Nothing in
/// here touches storage.

pub mod assignee;
pub mod error;
pub mod policy;
pub mod task;
pub mod user;

pub use assignee::TaskAssignee;
pub use error::DomainError;
pub use task::{Task, TaskStatus};
pub use user::User;
