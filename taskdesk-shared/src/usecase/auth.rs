/// Account use cases: signup, login, logout and the user directory
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskdesk_shared::auth::password::{Argon2Hasher, HashCost};
/// use taskdesk_shared::auth::session::{SessionService, TokenSettings};
/// use taskdesk_shared::clock::{Clock, SystemClock};
/// use taskdesk_shared::db::memory::MemoryDatabase;
/// use taskdesk_shared::usecase::{AuthService, SignupInput};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let db = MemoryDatabase::new();
/// let clock: Arc<dyn Clock> = Arc::new(SystemClock);
/// let sessions = SessionService::new(
///     db.clone(),
///     clock.clone(),
///     TokenSettings::new("a-secret-of-at-least-thirty-two-bytes", "taskdesk", chrono::Duration::hours(1)),
/// );
/// let auth = AuthService::new(db, sessions, Arc::new(Argon2Hasher::new(HashCost::default())?), clock);
///
/// let out = auth
///     .signup(&CancellationToken::new(), SignupInput {
///         email: "Ada@Example.com".to_string(),
///         password: "analytical-engine".to_string(),
///         name: "Ada".to_string(),
///     })
///     .await?;
/// assert_eq!(out.user.email, "ada@example.com");
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::UserView;
use crate::auth::password::{hash_blocking, verify_blocking, PasswordHasher};
use crate::auth::session::SessionService;
use crate::clock::Clock;
use crate::db::repository::UserRepository;
use crate::db::{with_cancel, Backend};
use crate::domain::user::{normalize_email, MIN_PASSWORD_LEN};
use crate::domain::{DomainError, User};
use crate::error::{Error, Result};

/// Signup request
#[derive(Clone)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Login request
#[derive(Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Issued token plus the profile it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthOutput {
    pub token: String,
    pub user: UserView,
}

/// Account use cases
#[derive(Clone)]
pub struct AuthService<B> {
    backend: B,
    sessions: SessionService<B>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
}

impl<B: Backend> AuthService<B> {
    pub fn new(
        backend: B,
        sessions: SessionService<B>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            sessions,
            hasher,
            clock,
        }
    }

    /// Creates an account and returns a session for it
    ///
    /// # Errors
    ///
    /// - `Error::Domain` for an empty email or name, or a short password
    /// - `Error::DuplicateEmail` if the normalized email is taken
    pub async fn signup(&self, cancel: &CancellationToken, input: SignupInput) -> Result<AuthOutput> {
        let email = normalize_email(&input.email);
        let name = input.name.trim().to_string();

        if email.is_empty() {
            return Err(DomainError::InvalidEmail.into());
        }
        if input.password.is_empty() {
            return Err(DomainError::InvalidPassword.into());
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            }
            .into());
        }
        if name.is_empty() {
            return Err(DomainError::InvalidName.into());
        }

        let this = self.clone();
        let output = self
            .backend
            .run(cancel, move |ex| {
                Box::pin(async move { this.signup_in(ex, email, input.password, name).await })
            })
            .await?;

        info!(user_id = output.user.id, "User signed up");
        Ok(output)
    }

    async fn signup_in(
        &self,
        ex: &mut B::Executor,
        email: String,
        password: String,
        name: String,
    ) -> Result<AuthOutput> {
        if self.backend.users().find_by_email(ex, &email).await?.is_some() {
            debug!("Signup rejected: email already registered");
            return Err(Error::DuplicateEmail);
        }

        let hash = hash_blocking(self.hasher.clone(), password).await?;

        let mut user = User::new(self.clock.as_ref(), &email, &name)?;
        user.set_password_hash(self.clock.as_ref(), hash);

        self.backend
            .users()
            .create(ex, &mut user)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    Error::DuplicateEmail
                } else {
                    e.into()
                }
            })?;

        let token = self.sessions.issue(&user)?;
        Ok(AuthOutput {
            token,
            user: UserView::from(&user),
        })
    }

    /// Exchanges credentials for a session
    ///
    /// An unknown email and a wrong password are indistinguishable: both
    /// cost one full password verification and both return
    /// `Error::InvalidCredentials`.
    pub async fn login(&self, cancel: &CancellationToken, input: LoginInput) -> Result<AuthOutput> {
        let email = normalize_email(&input.email);
        if email.is_empty() {
            return Err(DomainError::InvalidEmail.into());
        }
        if input.password.is_empty() {
            return Err(DomainError::InvalidPassword.into());
        }

        let user = with_cancel(cancel, async {
            let mut ex = self.backend.executor().await?;
            Ok(self.backend.users().find_by_email(&mut ex, &email).await?)
        })
        .await?;

        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let verified = with_cancel(cancel, async {
            Ok(verify_blocking(self.hasher.clone(), input.password, stored_hash).await?)
        })
        .await;

        let user = match (user, verified) {
            (Some(user), Ok(true)) => user,
            (_, Err(Error::Cancelled)) => return Err(Error::Cancelled),
            (_, Err(e)) => {
                warn!(error = %e, "Login rejected: password verification failed");
                return Err(Error::InvalidCredentials);
            }
            (_, Ok(_)) => {
                warn!("Login rejected: invalid credentials");
                return Err(Error::InvalidCredentials);
            }
        };

        let token = self.sessions.issue(&user)?;
        info!(user_id = user.id, "User logged in");

        Ok(AuthOutput {
            token,
            user: UserView::from(&user),
        })
    }

    /// Revokes every outstanding session of the user
    ///
    /// Bumps the token version by exactly one under a row lock.
    pub async fn logout(&self, cancel: &CancellationToken, user_id: i64) -> Result<()> {
        let this = self.clone();
        let version = self
            .backend
            .run(cancel, move |ex| {
                Box::pin(async move { this.logout_in(ex, user_id).await })
            })
            .await?;

        info!(user_id, token_version = version, "User logged out");
        Ok(())
    }

    async fn logout_in(&self, ex: &mut B::Executor, user_id: i64) -> Result<i64> {
        let mut user = self
            .backend
            .users()
            .lock_by_id(ex, user_id)
            .await?
            .ok_or(Error::UserNotFound)?;

        user.increment_token_version(self.clock.as_ref());
        self.backend.users().update(ex, &user).await?;

        Ok(user.token_version)
    }

    /// Lists every live user, for picking assignees
    pub async fn list_users(&self, cancel: &CancellationToken) -> Result<Vec<UserView>> {
        let users = with_cancel(cancel, async {
            let mut ex = self.backend.executor().await?;
            Ok(self.backend.users().list(&mut ex).await?)
        })
        .await?;

        debug!(count = users.len(), "Listed users");
        Ok(users.iter().map(UserView::from).collect())
    }
}
