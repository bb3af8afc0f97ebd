/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
/// Both are generic over the storage [`Backend`], so the same router serves
/// PostgreSQL in production and the in-memory backend in tests.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskdesk_api::{app::{build_router, AppState}, config::Config};
/// use taskdesk_shared::auth::password::{Argon2Hasher, HashCost};
/// use taskdesk_shared::clock::SystemClock;
/// use taskdesk_shared::db::{pool, postgres::PgBackend};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = pool::create_pool(pool::DatabaseConfig {
///     url: config.database.url.clone(),
///     ..Default::default()
/// })
/// .await?;
///
/// let state = AppState::new(
///     PgBackend::new(pool),
///     config,
///     Arc::new(Argon2Hasher::new(HashCost::default())?),
///     Arc::new(SystemClock),
/// );
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    middleware::security::SecurityHeadersLayer,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::Duration;
use std::sync::Arc;
use taskdesk_shared::{
    auth::{
        password::PasswordHasher,
        session::{SessionService, TokenSettings},
    },
    clock::Clock,
    db::Backend,
    usecase::{AuthService, TaskService},
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every field is a cheap handle.
pub struct AppState<B> {
    /// Storage backend
    pub backend: B,

    /// Token issuing and verification
    pub sessions: SessionService<B>,

    /// Signup, login, logout, user directory
    pub auth: AuthService<B>,

    /// Task operations
    pub tasks: TaskService<B>,

    /// Application configuration
    pub config: Arc<Config>,

    /// Parent of every request's cancellation token; fired on shutdown
    pub shutdown: CancellationToken,
}

impl<B: Clone> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            sessions: self.sessions.clone(),
            auth: self.auth.clone(),
            tasks: self.tasks.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<B: Backend> AppState<B> {
    /// Wires the use-case services over one backend
    pub fn new(
        backend: B,
        config: Config,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = TokenSettings::new(
            config.jwt.secret.clone(),
            config.jwt.issuer.clone(),
            Duration::minutes(config.jwt.ttl_minutes),
        );
        let sessions = SessionService::new(backend.clone(), clock.clone(), settings);
        let auth = AuthService::new(backend.clone(), sessions.clone(), hasher, clock.clone());
        let tasks = TaskService::new(backend.clone(), clock);

        Self {
            backend,
            sessions,
            auth,
            tasks,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancellation scope for one request
    pub fn request_scope(&self) -> RequestScope {
        RequestScope::new(self.shutdown.child_token())
    }
}

/// Cancellation token tied to a handler's lifetime
///
/// The token fires when the scope is dropped, so work still running on
/// behalf of a request whose handler future was abandoned (client gone,
/// timeout) is cancelled and its transaction rolled back.
pub struct RequestScope {
    token: CancellationToken,
    _guard: DropGuard,
}

impl RequestScope {
    fn new(token: CancellationToken) -> Self {
        Self {
            _guard: token.clone().drop_guard(),
            token,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Id of the user behind the request's bearer token
///
/// Inserted into request extensions by the authentication middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                   # Health check (public)
/// └── /v1/
///     ├── /auth/
///     │   ├── POST /signup      # public
///     │   ├── POST /login       # public
///     │   └── POST /logout      # authenticated
///     ├── GET /users            # authenticated
///     └── /tasks                # authenticated
///         ├── GET    /
///         ├── POST   /
///         ├── GET    /:id
///         ├── PATCH  /:id
///         └── DELETE /:id
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer, origins from config)
/// 3. Logging (tower-http TraceLayer)
/// 4. Bearer authentication (per-route basis)
pub fn build_router<B: Backend>(state: AppState<B>) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check::<B>));

    // Auth routes: signup and login are public, logout needs a session
    let auth_routes = Router::new()
        .route("/signup", post(routes::auth::signup::<B>))
        .route("/login", post(routes::auth::login::<B>))
        .merge(
            Router::new()
                .route("/logout", post(routes::auth::logout::<B>))
                .route_layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    require_auth::<B>,
                )),
        );

    let protected_routes = Router::new()
        .route("/users", get(routes::users::list_users::<B>))
        .route(
            "/tasks",
            get(routes::tasks::list_tasks::<B>).post(routes::tasks::create_task::<B>),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task::<B>)
                .patch(routes::tasks::update_task::<B>)
                .delete(routes::tasks::delete_task::<B>),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth::<B>,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.enable_hsts))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [header::AUTHORIZATION, header::CONTENT_TYPE];

    if config.allows_any_origin() {
        // Credentials cannot be combined with a wildcard origin
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Bearer authentication middleware
///
/// Resolves the `Authorization: Bearer <token>` header to a live user and
/// injects [`AuthUser`] into request extensions.
///
/// Every failure is a 401 with a specific code:
/// - `MISSING_TOKEN`: no header
/// - `INVALID_TOKEN_FORMAT`: not a `Bearer` credential
/// - `TOKEN_EXPIRED`: past expiry
/// - `TOKEN_INVALIDATED`: the user has logged out since issuance
/// - `INVALID_TOKEN`: anything else
async fn require_auth<B: Backend>(
    State(state): State<AppState<B>>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let credential = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::Unauthenticated {
            code: "MISSING_TOKEN",
            message: "authorization header is required",
        })?;

    let token = credential
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Unauthenticated {
            code: "INVALID_TOKEN_FORMAT",
            message: "authorization header must be 'Bearer {token}'",
        })?;

    let scope = state.request_scope();
    let user_id = state
        .sessions
        .authenticate(scope.token(), token)
        .await
        .map_err(|err| {
            tracing::warn!(reason = %err, "Rejected bearer token");
            ApiError::from_auth(err)
        })?;

    req.extensions_mut().insert(AuthUser(user_id));

    Ok(next.run(req).await)
}
