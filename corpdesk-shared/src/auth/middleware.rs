/// Request authentication for Axum
///
/// The API's auth layer turns a `Bearer` access token into an
/// [`AuthContext`] and stores it in the request extensions. Handlers then
/// take `AuthContext` as an extractor argument. The context carries the
/// user's *current* role, loaded from the database, so a demotion or
/// deactivation applies to the very next request.
///
/// # Example
///
/// ```no_run
/// use corpdesk_shared::auth::middleware::AuthContext;
///
/// async fn handler(auth: AuthContext) -> String {
///     format!("{} (level {})", auth.username, auth.level())
/// }
/// ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::authorization::{self, AuthzError, Capabilities, Visibility};
use super::jwt::{validate_access_token, JwtError};
use crate::models::role::{Level, Role};
use crate::models::user::User;

/// Authenticated caller, added to request extensions by the auth layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub username: String,
    /// Role as stored at request time
    pub role: Role,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }

    pub fn level(&self) -> Level {
        self.role.level()
    }

    pub fn has_permission(&self, required: Level) -> bool {
        authorization::has_permission(self.level(), required)
    }

    pub fn require_user_management(&self) -> Result<(), AuthzError> {
        authorization::require_user_management(self.level())
    }

    pub fn can_view_financial_data(&self) -> bool {
        authorization::can_view_financial_data(self.role)
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::for_role(self.role)
    }

    /// Records this caller may see in owner-scoped collections
    pub fn visibility(&self) -> Visibility {
        Visibility::for_user(self.user_id, self.level())
    }

    pub fn is_self(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub fn require_level(&self, required: Level) -> Result<(), AuthzError> {
        authorization::require_level(self.level(), required)
    }

    pub fn require_financial_access(&self) -> Result<(), AuthzError> {
        authorization::require_financial_access(self.role)
    }

    /// Passes for `owner_id` itself or any caller at `required` or above
    pub fn require_owner_or_level(&self, owner_id: Uuid, required: Level) -> Result<(), AuthzError> {
        authorization::require_owner_or_level(self.user_id, self.level(), owner_id, required)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header
    #[error("Missing credentials")]
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    #[error("{0}")]
    InvalidFormat(String),

    /// Token rejected, or its user no longer exists
    #[error("{0}")]
    InvalidToken(String),

    /// The account has been deactivated
    #[error("User account is inactive")]
    InactiveAccount,

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::DatabaseError(ref msg) => {
                tracing::error!(error = %msg, "Authentication lookup failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "internal_error",
                        "message": "An internal error occurred",
                    })),
                )
                    .into_response();
            }
            _ => StatusCode::UNAUTHORIZED,
        };

        let body = Json(json!({
            "error": "unauthorized",
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Validates an access token and loads the caller
///
/// # Errors
///
/// - `InvalidToken` if the token is invalid, expired, a refresh token, or
///   its user was deleted
/// - `InactiveAccount` if the user has been deactivated
pub async fn authenticate(pool: &PgPool, secret: &str, token: &str) -> Result<AuthContext, AuthError> {
    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        _ => AuthError::InvalidToken(format!("Invalid token: {}", e)),
    })?;

    let user = User::find_by_id(pool, claims.sub)
        .await
        .map_err(|e| AuthError::DatabaseError(e.to_string()))?
        .ok_or_else(|| AuthError::InvalidToken("User not found".to_string()))?;

    if !user.is_active {
        tracing::warn!(user_id = %user.id, "Rejected token for inactive user");
        return Err(AuthError::InactiveAccount);
    }

    Ok(AuthContext::from_user(&user))
}
