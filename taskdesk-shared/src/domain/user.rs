/// User entity
///
/// A user owns tasks, can be assigned to other users' tasks and holds the
/// `token_version` counter that backs session revocation: every issued
/// token embeds the version current at issuance, and bumping the counter
/// invalidates all of them at once.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(100) NOT NULL,
///     token_version BIGINT NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL,
///     deleted_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use validator::ValidateEmail;

use super::error::DomainError;
use crate::clock::Clock;

/// Maximum display name length, in characters
pub const MAX_NAME_LEN: usize = 100;

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// User account
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    /// Storage-assigned id (0 until persisted)
    pub id: i64,

    /// Normalized (trimmed, lowercase) email address
    pub email: String,

    /// Opaque password digest, never the plaintext
    pub password_hash: String,

    /// Trimmed display name
    pub name: String,

    /// Session generation counter; only ever increases
    pub token_version: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set when the account is soft-deleted
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Builds a new, not yet persisted user
    ///
    /// Email and name are normalized before validation. The password hash
    /// starts empty and must be attached with [`User::set_password_hash`].
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidEmail` if the email is empty or malformed
    /// - `DomainError::InvalidName` / `NameTooLong` if the name is empty or too long
    pub fn new(clock: &dyn Clock, email: &str, name: &str) -> Result<Self, DomainError> {
        let now = clock.now();
        let user = Self {
            id: 0,
            email: normalize_email(email),
            password_hash: String::new(),
            name: name.trim().to_string(),
            token_version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        user.validate_email()?;
        user.validate_name()?;
        Ok(user)
    }

    pub fn validate_email(&self) -> Result<(), DomainError> {
        if self.email.is_empty() || !self.email.validate_email() {
            return Err(DomainError::InvalidEmail);
        }
        Ok(())
    }

    pub fn validate_name(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidName);
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::NameTooLong { max: MAX_NAME_LEN });
        }
        Ok(())
    }

    /// Attaches a freshly computed password digest
    pub fn set_password_hash(&mut self, clock: &dyn Clock, hash: String) {
        self.password_hash = hash;
        self.updated_at = clock.now();
    }

    /// Bumps the session generation by exactly one
    ///
    /// Every token issued before this call stops verifying once the new
    /// value is persisted.
    pub fn increment_token_version(&mut self, clock: &dyn Clock) {
        self.token_version += 1;
        self.updated_at = clock.now();
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Canonical form used for storage and lookup: trimmed and lowercased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
