/// Session issuance and verification
///
/// A session is a signed token that embeds the user's `token_version`.
/// Verification re-reads the user row on every call and rejects tokens
/// whose embedded version differs from the stored one, so bumping the
/// stored version (logout) revokes every outstanding token for that user
/// without any server-side token store. The version is never cached.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskdesk_shared::auth::session::{SessionService, TokenSettings};
/// use taskdesk_shared::clock::SystemClock;
/// use taskdesk_shared::db::memory::MemoryDatabase;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> taskdesk_shared::error::Result<()> {
/// let sessions = SessionService::new(
///     MemoryDatabase::new(),
///     Arc::new(SystemClock),
///     TokenSettings::new("a-secret-of-at-least-thirty-two-bytes", "taskdesk", chrono::Duration::hours(1)),
/// );
///
/// let user_id = sessions
///     .authenticate(&CancellationToken::new(), "eyJhbGciOi...")
///     .await?;
/// # Ok(())
/// # }
/// ```

use chrono::Duration;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::jwt::{create_token, validate_token, Claims, JwtError};
use crate::clock::Clock;
use crate::db::repository::UserRepository;
use crate::db::{with_cancel, Backend};
use crate::domain::User;
use crate::error::{Error, Result};

/// Signing settings for session tokens
#[derive(Clone)]
pub struct TokenSettings {
    secret: String,
    issuer: String,
    ttl: Duration,
}

impl TokenSettings {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            ttl,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Issues and verifies session tokens against live user state
#[derive(Clone)]
pub struct SessionService<B> {
    backend: B,
    clock: Arc<dyn Clock>,
    settings: Arc<TokenSettings>,
}

impl<B: Backend> SessionService<B> {
    pub fn new(backend: B, clock: Arc<dyn Clock>, settings: TokenSettings) -> Self {
        Self {
            backend,
            clock,
            settings: Arc::new(settings),
        }
    }

    /// Signs a token for the user's current id and token version
    pub fn issue(&self, user: &User) -> Result<String> {
        let claims = Claims::new(
            user.id,
            user.token_version,
            &self.settings.issuer,
            self.clock.now(),
            self.settings.ttl,
        );

        create_token(&claims, &self.settings.secret).map_err(|e| Error::TokenSigning(e.to_string()))
    }

    /// Resolves a bearer token to the id of a live user
    ///
    /// # Errors
    ///
    /// - `Error::TokenExpired` past expiry (after leeway)
    /// - `Error::TokenRevoked` if the user's token version has moved on
    /// - `Error::InvalidToken` for every other rejection, including a
    ///   subject that no longer exists
    pub async fn authenticate(&self, cancel: &CancellationToken, token: &str) -> Result<i64> {
        let claims = validate_token(
            token,
            &self.settings.secret,
            &self.settings.issuer,
            self.clock.now(),
        )
        .map_err(|e| match e {
            JwtError::Expired => Error::TokenExpired,
            other => {
                debug!(error = %other, "Token rejected");
                Error::InvalidToken
            }
        })?;

        let user = with_cancel(cancel, async {
            let mut ex = self.backend.executor().await?;
            Ok(self.backend.users().find_by_id(&mut ex, claims.uid).await?)
        })
        .await?;

        let Some(user) = user else {
            warn!(user_id = claims.uid, "Token subject no longer exists");
            return Err(Error::InvalidToken);
        };

        if user.token_version != claims.token_version {
            warn!(
                user_id = user.id,
                token_version = claims.token_version,
                current_version = user.token_version,
                "Revoked token presented"
            );
            return Err(Error::TokenRevoked);
        }

        Ok(user.id)
    }
}
