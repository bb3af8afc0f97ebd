/// User directory
///
/// # Endpoints
///
/// - `GET /v1/users` - All live users (id, email, name), for picking assignees

use crate::{
    app::{AppState, AuthUser},
    error::ApiResult,
};
use axum::{extract::State, Extension, Json};
use taskdesk_shared::{db::Backend, usecase::UserView};

/// Lists every live user
pub async fn list_users<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> ApiResult<Json<Vec<UserView>>> {
    let scope = state.request_scope();
    let users = state.auth.list_users(scope.token()).await?;

    tracing::debug!(user_id, count = users.len(), "Served user directory");
    Ok(Json(users))
}
