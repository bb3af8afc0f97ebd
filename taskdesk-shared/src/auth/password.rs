/// Password hashing using Argon2id
///
/// Use cases depend on the [`PasswordHasher`] trait; [`Argon2Hasher`] is the
/// production implementation. Hashing is CPU-bound, so async callers go
/// through [`hash_blocking`] / [`verify_blocking`], which move the work onto
/// tokio's blocking pool.
///
/// # Security
///
/// - **Algorithm**: Argon2id, version 0x13
/// - **Default cost**: 64 MB memory, 3 passes, 4 lanes, 32-byte output
/// - **Salt**: 16 random bytes per hash from the OS RNG
/// - **Dummy hash**: every hasher carries a hash of a fixed throwaway
///   password so that a login for an unknown email still pays for one
///   full verification
///
/// # Example
///
/// ```
/// use taskdesk_shared::auth::password::{Argon2Hasher, HashCost, PasswordHasher};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hasher = Argon2Hasher::new(HashCost::default())?;
/// let hash = hasher.hash("correct horse battery")?;
///
/// assert!(hash.starts_with("$argon2id$"));
/// assert!(hasher.verify("correct horse battery", &hash)?);
/// assert!(!hasher.verify("wrong password", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, ParamsBuilder, Version,
};
use std::sync::Arc;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// One-way password digest capability
pub trait PasswordHasher: Send + Sync {
    /// Produces a salted PHC-format digest
    fn hash(&self, password: &str) -> Result<String, PasswordError>;

    /// `Ok(false)` on mismatch; `Err` only if the hash itself is unusable
    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError>;

    /// Valid digest of a throwaway password, for constant-effort misses
    fn dummy_hash(&self) -> &str;
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl HashCost {
    /// Minimal cost; only for tests and local development
    pub fn low() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST,
            iterations: 1,
            parallelism: 1,
        }
    }
}

const DUMMY_PASSWORD: &str = "taskdesk-dummy-password-for-timing";

/// Argon2id [`PasswordHasher`]
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
    dummy_hash: String,
}

impl std::fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Hasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish()
    }
}

impl Argon2Hasher {
    /// Builds a hasher and precomputes its dummy hash
    ///
    /// # Errors
    ///
    /// Returns `PasswordError::HashError` if the cost parameters are rejected.
    pub fn new(cost: HashCost) -> Result<Self, PasswordError> {
        let params = ParamsBuilder::new()
            .m_cost(cost.memory_kib)
            .t_cost(cost.iterations)
            .p_cost(cost.parallelism)
            .output_len(32)
            .build()
            .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

        // Cost parameters come from the stored hash, not from self
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
        }
    }

    fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}

/// Hashes on the blocking thread pool
pub async fn hash_blocking(
    hasher: Arc<dyn PasswordHasher>,
    password: String,
) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| PasswordError::HashError(format!("Hashing task failed: {}", e)))?
}

/// Verifies on the blocking thread pool
pub async fn verify_blocking(
    hasher: Arc<dyn PasswordHasher>,
    password: String,
    hash: Option<String>,
) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => hasher.verify(&password, &hash),
        None => hasher
            .verify(&password, hasher.dummy_hash())
            .map(|_| false),
    })
    .await
    .map_err(|e| PasswordError::VerifyError(format!("Verification task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(HashCost::low()).unwrap()
    }

    #[test]
    fn test_hash_is_salted_phc_string() {
        let hasher = hasher();
        let first = hasher.hash("password123").unwrap();
        let second = hasher.hash("password123").unwrap();

        assert!(first.starts_with("$argon2id$v=19$"));
        assert_ne!(first, second);
        assert!(hasher.verify("password123", &first).unwrap());
        assert!(hasher.verify("password123", &second).unwrap());
    }

    #[test]
    fn test_verify_mismatch_is_false() {
        let hasher = hasher();
        let hash = hasher.hash("password123").unwrap();

        assert!(!hasher.verify("password124", &hash).unwrap());
        assert!(!hasher.verify("", &hash).unwrap());
    }

    #[test]
    fn test_verify_malformed_hash_is_error() {
        let hasher = hasher();
        assert!(matches!(
            hasher.verify("password123", "not-a-hash"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_default_cost_matches_hash_params() {
        let cost = HashCost::default();
        assert_eq!(cost.memory_kib, 65536);
        assert_eq!(cost.iterations, 3);
        assert_eq!(cost.parallelism, 4);
    }

    #[test]
    fn test_dummy_hash_is_verifiable() {
        let hasher = hasher();
        assert!(hasher.dummy_hash().starts_with("$argon2id$"));
        assert!(hasher.verify(DUMMY_PASSWORD, hasher.dummy_hash()).unwrap());
        assert!(!hasher.verify("guess", hasher.dummy_hash()).unwrap());
    }

    #[test]
    fn test_invalid_cost_rejected() {
        let result = Argon2Hasher::new(HashCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(PasswordError::HashError(_))));
    }

    #[tokio::test]
    async fn test_blocking_helpers() {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(hasher());

        let hash = hash_blocking(hasher.clone(), "password123".to_string())
            .await
            .unwrap();
        assert!(verify_blocking(hasher.clone(), "password123".to_string(), Some(hash))
            .await
            .unwrap());

        // Unknown user: runs against the dummy hash and always fails
        assert!(!verify_blocking(hasher, DUMMY_PASSWORD.to_string(), None)
            .await
            .unwrap());
    }
}
