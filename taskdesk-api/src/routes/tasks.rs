/// Task endpoints
///
/// # Endpoints
///
/// - `GET    /v1/tasks?limit=&offset=` - Tasks owned by or assigned to the caller
/// - `POST   /v1/tasks` - Create a task
/// - `GET    /v1/tasks/:id` - One task
/// - `PATCH  /v1/tasks/:id` - Partial update (owner only)
/// - `DELETE /v1/tasks/:id` - Soft delete (owner only)
///
/// # Task representation
///
/// ```json
/// {
///   "id": 7,
///   "ownerId": 1,
///   "title": "Ship release",
///   "description": null,
///   "dueDate": "2025-03-01T17:00:00Z",
///   "status": "IN_PROGRESS",
///   "priority": 3,
///   "assignees": [{ "userId": 2, "assignedBy": 1, "assignedAt": "..." }],
///   "createdAt": "...",
///   "updatedAt": "..."
/// }
/// ```

use crate::{
    app::{AppState, AuthUser},
    error::ApiResult,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use taskdesk_shared::{
    db::Backend,
    usecase::{CreateTaskInput, TaskView, UpdateTaskInput},
};
use validator::Validate;

/// Paging parameters for the task list
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Create task request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(max = 1024, message = "title is too long"))]
    pub title: String,

    #[validate(length(max = 10000, message = "description is too long"))]
    pub description: Option<String>,

    pub due_date: Option<DateTime<Utc>>,

    pub priority: Option<i32>,

    #[serde(default)]
    #[validate(length(max = 100, message = "at most 100 assignees per task"))]
    pub assignee_ids: Vec<i64>,
}

/// Update task request
///
/// Absent fields are left untouched. `dueDate: null` clears the due date;
/// `assigneeIds: []` removes every assignee.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(max = 1024, message = "title is too long"))]
    pub title: Option<String>,

    #[validate(length(max = 10000, message = "description is too long"))]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<DateTime<Utc>>>,

    pub status: Option<String>,

    pub priority: Option<i32>,

    #[validate(length(max = 100, message = "at most 100 assignees per task"))]
    pub assignee_ids: Option<Vec<i64>>,
}

/// Marks a field that appeared in the payload, even as `null`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl From<CreateTaskRequest> for CreateTaskInput {
    fn from(req: CreateTaskRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            due_date: req.due_date,
            priority: req.priority,
            assignee_ids: req.assignee_ids,
        }
    }
}

impl From<UpdateTaskRequest> for UpdateTaskInput {
    fn from(req: UpdateTaskRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            due_date: req.due_date,
            status: req.status,
            priority: req.priority,
            assignee_ids: req.assignee_ids,
        }
    }
}

/// Lists the caller's tasks, newest first
///
/// `limit` defaults to 20 and is capped at 100; `offset` defaults to 0.
pub async fn list_tasks<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    query: Result<Query<ListTasksQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let Query(query) = query?;

    let scope = state.request_scope();
    let tasks = state
        .tasks
        .list(scope.token(), user_id, query.limit, query.offset)
        .await?;

    Ok(Json(tasks))
}

/// Creates a task owned by the caller
///
/// # Errors
///
/// - `400 VALIDATION_ERROR`: Empty or long title, priority outside 0..=5
/// - `404 NOT_FOUND`: An assignee id names no user
/// - `409 CONFLICT`: An assignee id is listed twice
pub async fn create_task<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TaskView>)> {
    let Json(req) = payload?;
    req.validate()?;

    let scope = state.request_scope();
    let task = state.tasks.create(scope.token(), user_id, req.into()).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// Fetches one task
///
/// Tasks the caller neither owns nor is assigned to answer `404`.
pub async fn get_task<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    task_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<TaskView>> {
    let Path(task_id) = task_id?;

    let scope = state.request_scope();
    let task = state.tasks.get(scope.token(), user_id, task_id).await?;

    Ok(Json(task))
}

/// Applies a partial update
///
/// # Errors
///
/// - `400 VALIDATION_ERROR`: Bad field value or disallowed status transition
/// - `403 FORBIDDEN`: Caller is not the owner
/// - `404 NOT_FOUND`: Task or assignee missing
pub async fn update_task<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    task_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<Json<TaskView>> {
    let Path(task_id) = task_id?;
    let Json(req) = payload?;
    req.validate()?;

    let scope = state.request_scope();
    let task = state
        .tasks
        .update(scope.token(), user_id, task_id, req.into())
        .await?;

    Ok(Json(task))
}

/// Soft-deletes a task; responds `204 No Content`
pub async fn delete_task<B: Backend>(
    State(state): State<AppState<B>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    task_id: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(task_id) = task_id?;

    let scope = state.request_scope();
    state.tasks.delete(scope.token(), user_id, task_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
