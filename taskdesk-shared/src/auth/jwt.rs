/// JWT session tokens
///
/// Tokens are signed with HS256 and carry the user id plus a snapshot of
/// the user's `token_version` at issuance. Signature, algorithm and issuer
/// are checked by `jsonwebtoken`; time-based claims are checked here against
/// an explicit `now` so that callers can drive validation from an injected
/// clock.
///
/// # Claims
///
/// - `sub`: user id as a string
/// - `uid`: user id
/// - `tkn_ver`: token version at issuance
/// - `iss`: issuer
/// - `iat` / `nbf` / `exp`: Unix timestamps
///
/// # Example
///
/// ```
/// use taskdesk_shared::auth::jwt::{create_token, validate_token, Claims};
/// use chrono::{Duration, Utc};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "an-example-secret-that-is-32-bytes!";
/// let now = Utc::now();
///
/// let claims = Claims::new(42, 0, "taskdesk", now, Duration::hours(1));
/// let token = create_token(&claims, secret)?;
///
/// let validated = validate_token(&token, secret, "taskdesk", now)?;
/// assert_eq!(validated.uid, 42);
/// assert_eq!(validated.token_version, 0);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Tolerated clock skew on `exp` and `nbf`, in seconds
pub const LEEWAY_SECONDS: i64 = 30;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token is not valid yet
    #[error("Token is not valid yet")]
    NotYetValid,

    /// Token was issued by someone else
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },

    /// Malformed token, bad signature or unexpected algorithm
    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// Session token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user id, stringified
    pub sub: String,

    /// User id
    pub uid: i64,

    /// User's token version when the token was issued
    #[serde(rename = "tkn_ver")]
    pub token_version: i64,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(
        user_id: i64,
        token_version: i64,
        issuer: &str,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            sub: user_id.to_string(),
            uid: user_id,
            token_version,
            iss: issuer.to_string(),
            iat: issued_at.timestamp(),
            nbf: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Signs claims with HS256
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, algorithm and issuer, then checks `exp`/`nbf` at `now`
///
/// Both time checks allow [`LEEWAY_SECONDS`] of skew.
pub fn validate_token(
    token: &str,
    secret: &str,
    issuer: &str,
    now: DateTime<Utc>,
) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
    validation.validate_exp = false;
    validation.validate_nbf = false;

    let claims = decode::<Claims>(token, &key, &validation)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
                expected: issuer.to_string(),
            },
            _ => JwtError::Invalid(e.to_string()),
        })?
        .claims;

    let now = now.timestamp();
    if now > claims.exp + LEEWAY_SECONDS {
        return Err(JwtError::Expired);
    }
    if claims.nbf > now + LEEWAY_SECONDS {
        return Err(JwtError::NotYetValid);
    }
    if claims.sub != claims.uid.to_string() {
        return Err(JwtError::Invalid("subject does not match user id".to_string()));
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";
    const ISSUER: &str = "taskdesk";

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn token(ttl: Duration) -> String {
        create_token(&Claims::new(7, 3, ISSUER, issued_at(), ttl), SECRET).unwrap()
    }

    #[test]
    fn test_create_and_validate_token() {
        let token = token(Duration::hours(1));
        let claims = validate_token(&token, SECRET, ISSUER, issued_at()).unwrap();

        assert_eq!(claims.sub, "7");
        assert_eq!(claims.uid, 7);
        assert_eq!(claims.token_version, 3);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.iat, issued_at().timestamp());
        assert_eq!(claims.exp, (issued_at() + Duration::hours(1)).timestamp());
        assert_eq!(claims.expires_at(), Some(issued_at() + Duration::hours(1)));
    }

    #[test]
    fn test_claims_serialize_token_version_as_tkn_ver() {
        let claims = Claims::new(1, 5, ISSUER, issued_at(), Duration::minutes(5));
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["tkn_ver"], 5);
        assert_eq!(json["uid"], 1);
        assert_eq!(json["sub"], "1");
        assert!(json.get("token_version").is_none());
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let token = token(Duration::hours(1));
        let result = validate_token(&token, "another-secret-key-of-32-bytes-long!", ISSUER, issued_at());
        assert!(matches!(result, Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_validate_with_wrong_issuer() {
        let token = token(Duration::hours(1));
        let result = validate_token(&token, SECRET, "someone-else", issued_at());
        assert!(matches!(result, Err(JwtError::InvalidIssuer { .. })));
    }

    #[test]
    fn test_expiry_allows_leeway() {
        let token = token(Duration::minutes(10));
        let expiry = issued_at() + Duration::minutes(10);

        assert!(validate_token(&token, SECRET, ISSUER, expiry).is_ok());
        assert!(validate_token(&token, SECRET, ISSUER, expiry + Duration::seconds(LEEWAY_SECONDS)).is_ok());
        assert!(matches!(
            validate_token(&token, SECRET, ISSUER, expiry + Duration::seconds(LEEWAY_SECONDS + 1)),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_not_before_allows_leeway() {
        let token = token(Duration::hours(1));
        let early = issued_at() - Duration::seconds(LEEWAY_SECONDS);
        let too_early = issued_at() - Duration::seconds(LEEWAY_SECONDS + 1);

        assert!(validate_token(&token, SECRET, ISSUER, early).is_ok());
        assert!(matches!(
            validate_token(&token, SECRET, ISSUER, too_early),
            Err(JwtError::NotYetValid)
        ));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let claims = Claims::new(7, 0, ISSUER, issued_at(), Duration::hours(1));
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            validate_token(&token, SECRET, ISSUER, issued_at()),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn test_malformed_token() {
        assert!(matches!(
            validate_token("not.a.token", SECRET, ISSUER, issued_at()),
            Err(JwtError::Invalid(_))
        ));
        assert!(matches!(
            validate_token("", SECRET, ISSUER, issued_at()),
            Err(JwtError::Invalid(_))
        ));
    }
}
