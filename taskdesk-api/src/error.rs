/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`; use-case errors convert with `?` and are
/// mapped here onto an HTTP status and a stable error code through
/// [`ErrorKind`]. Internal failures are logged and replaced by a generic
/// message so storage or hashing details never reach clients.
///
/// # Response body
///
/// ```json
/// {
///   "code": "VALIDATION_ERROR",
///   "message": "title is required",
///   "details": [{ "field": "title", "message": "title is required" }]
/// }
/// ```

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use taskdesk_shared::{Error, ErrorKind};
use validator::ValidationErrors;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Request could not be parsed or failed shape checks (400)
    Validation(Vec<ValidationErrorDetail>),

    /// Bearer authentication failed (401) with a specific code
    Unauthenticated {
        code: &'static str,
        message: &'static str,
    },

    /// Use-case failure, mapped by its kind
    Service(Error),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code (e.g. `NOT_FOUND`, `TOKEN_EXPIRED`)
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Per-field validation problems
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![ValidationErrorDetail {
            field: field.into(),
            message: message.into(),
        }])
    }

    /// Maps a failed bearer authentication onto its 401 code
    pub fn from_auth(err: Error) -> Self {
        match err {
            Error::TokenExpired => ApiError::Unauthenticated {
                code: "TOKEN_EXPIRED",
                message: "token has expired, please login again",
            },
            Error::TokenRevoked => ApiError::Unauthenticated {
                code: "TOKEN_INVALIDATED",
                message: "token has been invalidated, please login again",
            },
            Error::InvalidToken => ApiError::Unauthenticated {
                code: "INVALID_TOKEN",
                message: "invalid token",
            },
            other => ApiError::Service(other),
        }
    }
}

fn status_and_code(kind: ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        ErrorKind::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        ErrorKind::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
        ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::Unauthenticated { code, message } => write!(f, "{}: {}", code, message),
            ApiError::Service(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ApiError::Validation(errors) => {
                let message = errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "Request validation failed".to_string());
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message, Some(errors))
            }
            ApiError::Unauthenticated { code, message } => {
                (StatusCode::UNAUTHORIZED, code, message.to_string(), None)
            }
            ApiError::Service(err) => {
                let kind = err.kind();
                let (status, code) = status_and_code(kind);

                match kind {
                    ErrorKind::Internal => {
                        if matches!(err, Error::Cancelled) {
                            tracing::debug!("Request cancelled");
                        } else {
                            // Log internal errors but don't expose details to clients
                            tracing::error!(error = %err, fatal = err.is_fatal(), "Internal error");
                        }
                        (status, code, "internal server error".to_string(), None)
                    }
                    ErrorKind::Validation => {
                        let details = err.as_domain().map(|domain| {
                            vec![ValidationErrorDetail {
                                field: domain.field().to_string(),
                                message: domain.to_string(),
                            }]
                        });
                        (status, code, err.to_string(), details)
                    }
                    _ => (status, code, err.to_string(), None),
                }
            }
        };

        let body = Json(ErrorResponse {
            code: code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Service(err)
    }
}

/// Convert `validator` failures into field details
impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        let mut errors: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::Validation(errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation("query", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation("id", rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdesk_shared::domain::DomainError;

    async fn body(err: ApiError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::validation("title", "title is required");
        assert_eq!(err.to_string(), "Validation failed: 1 errors");

        let err = ApiError::Service(Error::TaskNotFound);
        assert_eq!(err.to_string(), "task not found");
    }

    #[tokio::test]
    async fn test_kind_mapping() {
        let cases = [
            (Error::DuplicateEmail, StatusCode::CONFLICT, "CONFLICT"),
            (Error::TaskNotFound, StatusCode::NOT_FOUND, "NOT_FOUND"),
            (Error::Forbidden, StatusCode::FORBIDDEN, "FORBIDDEN"),
            (Error::InvalidCredentials, StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        ];

        for (err, status, code) in cases {
            let (got_status, body) = body(err.into()).await;
            assert_eq!(got_status, status);
            assert_eq!(body.code, code);
        }
    }

    #[tokio::test]
    async fn test_domain_error_carries_field() {
        let (status, body) = body(Error::from(DomainError::InvalidPriority(9)).into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "VALIDATION_ERROR");
        let details = body.details.unwrap();
        assert_eq!(details[0].field, "priority");
    }

    #[tokio::test]
    async fn test_internal_error_is_opaque() {
        let (status, body) = body(Error::Internal("connection refused on 10.0.0.5".into()).into()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert!(!body.message.contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_auth_codes() {
        let (status, expired) = body(ApiError::from_auth(Error::TokenExpired)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(expired.code, "TOKEN_EXPIRED");

        let (_, revoked) = body(ApiError::from_auth(Error::TokenRevoked)).await;
        assert_eq!(revoked.code, "TOKEN_INVALIDATED");

        let (_, invalid) = body(ApiError::from_auth(Error::InvalidToken)).await;
        assert_eq!(invalid.code, "INVALID_TOKEN");
    }
}
