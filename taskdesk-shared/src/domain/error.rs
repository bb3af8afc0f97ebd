/// Invariant violations raised by domain entities
///
/// These are always caller mistakes (malformed or out-of-range input) and
/// classify as validation errors.

use super::task::TaskStatus;

/// Error raised when an entity rejects a value or a state change
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Email is empty or does not look like an address
    #[error("invalid email format")]
    InvalidEmail,

    /// Display name is empty after trimming
    #[error("name is required")]
    InvalidName,

    /// Display name exceeds the length limit
    #[error("name must be at most {max} characters")]
    NameTooLong { max: usize },

    /// Password is empty
    #[error("password is required")]
    InvalidPassword,

    /// Password is shorter than the minimum length
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    /// Task title is empty after trimming
    #[error("title is required")]
    TitleRequired,

    /// Task title exceeds the length limit
    #[error("title must be at most {max} characters")]
    TitleTooLong { max: usize },

    /// Priority outside the accepted range
    #[error("priority must be between 0 and 5, got {0}")]
    InvalidPriority(i32),

    /// Requested status is unknown or not reachable from the current one
    #[error("invalid status transition from {from} to {requested}")]
    InvalidStatusTransition { from: TaskStatus, requested: String },
}

impl DomainError {
    /// Name of the input field the error refers to
    pub fn field(&self) -> &'static str {
        match self {
            DomainError::InvalidEmail => "email",
            DomainError::InvalidName | DomainError::NameTooLong { .. } => "name",
            DomainError::InvalidPassword | DomainError::PasswordTooShort { .. } => "password",
            DomainError::TitleRequired | DomainError::TitleTooLong { .. } => "title",
            DomainError::InvalidPriority(_) => "priority",
            DomainError::InvalidStatusTransition { .. } => "status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names() {
        assert_eq!(DomainError::InvalidEmail.field(), "email");
        assert_eq!(DomainError::NameTooLong { max: 100 }.field(), "name");
        assert_eq!(DomainError::PasswordTooShort { min: 8 }.field(), "password");
        assert_eq!(DomainError::InvalidPriority(9).field(), "priority");
        assert_eq!(
            DomainError::InvalidStatusTransition {
                from: TaskStatus::Done,
                requested: "IN_PROGRESS".to_string(),
            }
            .field(),
            "status"
        );
    }

    #[test]
    fn test_display() {
        let err = DomainError::InvalidStatusTransition {
            from: TaskStatus::Done,
            requested: "IN_PROGRESS".to_string(),
        };
        assert_eq!(err.to_string(), "invalid status transition from DONE to IN_PROGRESS");
    }
}
