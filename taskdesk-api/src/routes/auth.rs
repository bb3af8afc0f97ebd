/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/signup` - Create an account and get a token
/// - `POST /v1/auth/login` - Exchange credentials for a token
/// - `POST /v1/auth/logout` - Revoke every token of the caller
///
/// Shape checks happen here; email normalization and the authoritative
/// field rules live in the domain.

use crate::{
    app::{AppState, AuthUser},
    error::ApiResult,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use taskdesk_shared::{
    db::Backend,
    usecase::{AuthOutput, LoginInput, SignupInput},
};
use validator::Validate;

/// Signup request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(max = 254, message = "email must be at most 254 characters"))]
    pub email: String,

    /// Upper bound keeps the hashing work per request bounded
    #[validate(length(max = 128, message = "password must be at most 128 characters"))]
    pub password: String,

    /// Length is checked by the domain after trimming
    pub name: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(max = 254, message = "email must be at most 254 characters"))]
    pub email: String,

    #[validate(length(max = 128, message = "password must be at most 128 characters"))]
    pub password: String,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/signup
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "SecureP@ss123",
///   "name": "Jane Doe"
/// }
/// ```
///
/// # Response
///
/// `201 Created`
///
/// ```json
/// {
///   "token": "eyJ...",
///   "user": { "id": 1, "email": "user@example.com", "name": "Jane Doe" }
/// }
/// ```
///
/// # Errors
///
/// - `400 VALIDATION_ERROR`: Bad email, short password, empty name
/// - `409 CONFLICT`: Email already registered
pub async fn signup<B: Backend>(
    State(state): State<AppState<B>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthOutput>)> {
    let Json(req) = payload?;
    req.validate()?;

    let scope = state.request_scope();
    let output = state
        .auth
        .signup(
            scope.token(),
            SignupInput {
                email: req.email,
                password: req.password,
                name: req.name,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(output)))
}

/// Login endpoint
///
/// An unknown email and a wrong password produce the same
/// `401 UNAUTHORIZED` response.
pub async fn login<B: Backend>(
    State(state): State<AppState<B>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthOutput>> {
    let Json(req) = payload?;
    req.validate()?;

    let scope = state.request_scope();
    let output = state
        .auth
        .login(
            scope.token(),
            LoginInput {
                email: req.email,
                password: req.password,
            },
        )
        .await?;

    Ok(Json(output))
}

/// Logout endpoint
///
/// Invalidates every token issued to the caller so far, including the one
/// used for this request. Responds `204 No Content`.
pub async fn logout<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> ApiResult<StatusCode> {
    let scope = state.request_scope();
    state.auth.logout(scope.token(), user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
