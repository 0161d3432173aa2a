/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use corpdesk_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use corpdesk_shared::auth::{
    jwt::JwtSettings,
    middleware::{authenticate, bearer_token},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower::Layer;
use tower_http::{
    cors::CorsLayer,
    normalize_path::NormalizePathLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    jwt: Arc<JwtSettings>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        let jwt = Arc::new(config.jwt_settings());
        Self {
            db,
            config: Arc::new(config),
            jwt,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt.secret
    }

    pub fn jwt_settings(&self) -> &JwtSettings {
        &self.jwt
    }
}

/// Builds the complete router
///
/// ```text
/// /health                                   public
/// /v1/auth/token, /v1/auth/token/refresh    public
/// /v1/auth/{logout,me,change-password}      bearer token
/// /v1/{users,departments,login-history,stats,projects,tasks,attendance,
///      leave-requests,expenses,payroll,notifications}   bearer token
/// ```
///
/// A trailing slash is trimmed before routing, so `/v1/users/` and
/// `/v1/users` reach the same handler. Layers, outermost first: security
/// headers, CORS, request tracing, and per-group authentication.
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let public_routes = Router::new()
        .route("/auth/token", post(routes::auth::obtain_token))
        .route("/auth/token/refresh", post(routes::auth::refresh_token));

    let protected_routes = Router::new()
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/change-password", post(routes::auth::change_password))
        .route(
            "/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route("/users/search", get(routes::users::search_users))
        .route(
            "/users/:id",
            get(routes::users::get_user)
                .patch(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route(
            "/departments",
            get(routes::departments::list_departments).post(routes::departments::create_department),
        )
        .route(
            "/departments/:id",
            get(routes::departments::get_department)
                .patch(routes::departments::update_department)
                .delete(routes::departments::delete_department),
        )
        .route("/login-history", get(routes::users::login_history))
        .route("/stats/dashboard", get(routes::stats::dashboard))
        .route("/stats/users", get(routes::stats::user_stats))
        .route(
            "/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/projects/:id",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/attendance",
            get(routes::attendance::list_attendance).post(routes::attendance::create_attendance),
        )
        .route("/attendance/mark-today", post(routes::attendance::mark_today))
        .route(
            "/attendance/:id",
            get(routes::attendance::get_attendance)
                .patch(routes::attendance::update_attendance)
                .delete(routes::attendance::delete_attendance),
        )
        .route(
            "/leave-requests",
            get(routes::leave_requests::list_leave_requests)
                .post(routes::leave_requests::create_leave_request),
        )
        .route(
            "/leave-requests/:id",
            get(routes::leave_requests::get_leave_request)
                .patch(routes::leave_requests::update_leave_request)
                .delete(routes::leave_requests::delete_leave_request),
        )
        .route(
            "/leave-requests/:id/approve",
            post(routes::leave_requests::decide_leave_request),
        )
        .route(
            "/expenses",
            get(routes::expenses::list_expenses).post(routes::expenses::create_expense),
        )
        .route(
            "/expenses/:id",
            get(routes::expenses::get_expense)
                .patch(routes::expenses::update_expense)
                .delete(routes::expenses::delete_expense),
        )
        .route("/expenses/:id/approve", post(routes::expenses::decide_expense))
        .route(
            "/payroll",
            get(routes::payroll::list_payroll).post(routes::payroll::create_payroll),
        )
        .route("/payroll/my", get(routes::payroll::my_payroll))
        .route(
            "/payroll/:id",
            get(routes::payroll::get_payroll)
                .patch(routes::payroll::update_payroll)
                .delete(routes::payroll::delete_payroll),
        )
        .route(
            "/notifications",
            get(routes::notifications::list_notifications)
                .post(routes::notifications::create_notification),
        )
        .route(
            "/notifications/mark-all-read",
            post(routes::notifications::mark_all_read),
        )
        .route(
            "/notifications/:id",
            get(routes::notifications::get_notification)
                .patch(routes::notifications::update_notification)
                .delete(routes::notifications::delete_notification),
        )
        .route(
            "/notifications/:id/mark-read",
            post(routes::notifications::mark_read),
        )
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = public_routes.merge(protected_routes);

    let cors = cors_layer(&state.config);

    let app = Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state);

    // Router::layer runs after route matching, so the path has to be
    // rewritten by a service wrapped around the whole router
    Router::new().fallback_service(NormalizePathLayer::trim_trailing_slash().layer(app))
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Resolves the bearer token into an `AuthContext` request extension
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?.to_owned();
    let auth = authenticate(&state.db, state.jwt_secret(), &token).await?;

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
