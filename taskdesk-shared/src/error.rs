/// Crate-wide error type
///
/// Every use-case operation returns [`Result<T>`]. Subsystem errors
/// ([`DomainError`], [`DbError`], [`PasswordError`]) convert into [`Error`]
/// with `?`, and [`Error::kind`] collapses every variant into the small,
/// stable [`ErrorKind`] taxonomy that outer layers (HTTP, CLI) map onto
/// their own status codes.
///
/// # Example
///
/// ```
/// use taskdesk_shared::error::{Error, ErrorKind};
///
/// let err = Error::TaskNotFound;
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// assert!(!err.is_fatal());
/// ```

use crate::auth::password::PasswordError;
use crate::db::error::DbError;
use crate::domain::error::DomainError;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Stable classification of failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or out-of-range input
    Validation,

    /// Missing, invalid, expired or revoked credentials
    Unauthorized,

    /// Authenticated but not permitted
    Forbidden,

    /// Entity absent (or hidden from the actor)
    NotFound,

    /// Uniqueness violated
    Conflict,

    /// Anything the caller cannot fix
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Error returned by use cases and the unit of work
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Entity invariant violated
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("email is already registered")]
    DuplicateEmail,

    /// The user is already assigned to the task
    #[error("user {0} is already assigned to this task")]
    DuplicateAssignee(i64),

    #[error("user not found")]
    UserNotFound,

    #[error("task not found")]
    TaskNotFound,

    /// A requested assignee does not exist
    #[error("assignee user {0} not found")]
    AssigneeNotFound(i64),

    /// Login failed; never says whether the email or the password was wrong
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Actor may not perform the action on an entity it can see
    #[error("forbidden")]
    Forbidden,

    #[error("token has expired")]
    TokenExpired,

    /// Malformed token, bad signature, wrong issuer, not yet valid or unknown subject
    #[error("invalid token")]
    InvalidToken,

    /// Token was valid but predates the user's current session generation
    #[error("token has been revoked")]
    TokenRevoked,

    /// Storage failure outside of transaction control
    #[error("storage error: {0}")]
    Storage(#[from] DbError),

    #[error("password hashing failed: {0}")]
    Password(#[from] PasswordError),

    /// Token could not be signed
    #[error("token signing failed: {0}")]
    TokenSigning(String),

    #[error("failed to begin transaction: {0}")]
    BeginFailed(#[source] DbError),

    /// Work succeeded but the commit did not
    #[error("failed to commit transaction: {0}")]
    CommitFailed(#[source] DbError),

    /// Work failed and the rollback failed too; both errors are kept
    #[error("rollback failed ({rollback}) after: {cause}")]
    RollbackFailed {
        cause: Box<Error>,
        #[source]
        rollback: DbError,
    },

    /// The caller's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Classifies the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Domain(_) => ErrorKind::Validation,
            Error::DuplicateEmail | Error::DuplicateAssignee(_) => ErrorKind::Conflict,
            Error::UserNotFound | Error::TaskNotFound | Error::AssigneeNotFound(_) => {
                ErrorKind::NotFound
            }
            Error::InvalidCredentials
            | Error::TokenExpired
            | Error::InvalidToken
            | Error::TokenRevoked => ErrorKind::Unauthorized,
            Error::Forbidden => ErrorKind::Forbidden,
            Error::Storage(_)
            | Error::Password(_)
            | Error::TokenSigning(_)
            | Error::BeginFailed(_)
            | Error::CommitFailed(_)
            | Error::RollbackFailed { .. }
            | Error::Cancelled
            | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when the system may be left in an unknown state
    ///
    /// Only a failed rollback qualifies: the transaction outcome is then
    /// undetermined from the caller's point of view.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::RollbackFailed { .. })
    }

    /// Domain error behind this one, if any
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Error::Domain(err) => Some(err),
            Error::RollbackFailed { cause, .. } => cause.as_domain(),
            _ => None,
        }
    }
}
