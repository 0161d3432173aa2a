/// Authentication endpoints
///
/// - `POST /v1/auth/token`: Exchange username and password for tokens
/// - `POST /v1/auth/token/refresh`: Exchange a refresh token for an access token
/// - `POST /v1/auth/logout`: Revoke a refresh token
/// - `GET /v1/auth/me`: Current user, capabilities and navigation
/// - `POST /v1/auth/change-password`

use std::net::{IpAddr, SocketAddr};

use crate::{
    app::AppState,
    error::{ApiError, ApiJson, ApiResult},
    routes::{optional_json, MessageResponse},
};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap},
    Json,
};
use corpdesk_shared::{
    auth::{
        authorization::Capabilities,
        jwt,
        middleware::AuthContext,
        navigation::{sections_for, NavSection},
        password,
    },
    models::{
        login_history::LoginHistory,
        notification::Notification,
        revoked_token::RevokedToken,
        user::{User, UserView},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(length(min = 1, max = 150, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user: UserView,
    pub capabilities: Capabilities,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserView,
    pub capabilities: Capabilities,
    pub navigation: Vec<NavSection>,
    pub unread_notifications: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Old password is required"))]
    pub old_password: String,

    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,

    pub confirm_password: String,
}

const BEARER: &str = "Bearer";

/// Parses a proxy header value as an IP address
fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
}

/// Client address, preferring proxy headers over the socket peer
///
/// Header values that are not valid IP addresses are ignored.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    header_ip(headers, "x-forwarded-for")
        .or_else(|| header_ip(headers, "x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip()))
        .map(|ip| ip.to_string())
        .unwrap_or_default()
}

/// Issue access and refresh tokens
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/token
/// { "username": "employee1", "password": "..." }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Missing fields
/// - `401 Unauthorized`: Wrong credentials or inactive account
pub async fn obtain_token(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    req.validate()?;

    let user = User::find_by_username(&state.db, req.username.trim())
        .await?
        .ok_or_else(|| {
            tracing::info!(username = %req.username, "Login failed: unknown user");
            ApiError::Unauthorized("Invalid username or password".to_string())
        })?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login failed: wrong password");
        return Err(ApiError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    }

    if !user.is_active {
        tracing::warn!(user_id = %user.id, "Login refused for inactive account");
        return Err(ApiError::Unauthorized("User account is inactive".to_string()));
    }

    let tokens = jwt::issue_token_pair(user.id, state.jwt_settings())?;

    let ip_address = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    LoginHistory::record(&state.db, user.id, &ip_address, user_agent).await?;
    User::update_last_login(&state.db, user.id).await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Json(TokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: BEARER,
        expires_in: tokens.expires_in,
        user: user.view(true),
        capabilities: Capabilities::for_role(user.role),
    }))
}

/// Exchange a refresh token for a new access token
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid, expired or revoked token, or inactive user
pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    if RevokedToken::is_revoked(&state.db, &claims.jti).await? {
        tracing::warn!(user_id = %claims.sub, "Revoked refresh token presented");
        return Err(ApiError::Unauthorized("Token has been revoked".to_string()));
    }

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    if !user.is_active {
        return Err(ApiError::Unauthorized("User account is inactive".to_string()));
    }

    let settings = state.jwt_settings();
    let access_token = jwt::issue_access_token(user.id, settings)?;

    Ok(Json(RefreshResponse {
        access_token,
        token_type: BEARER,
        expires_in: settings.access_ttl.num_seconds(),
    }))
}

/// Revoke the caller's refresh token
///
/// The body is optional: `{ "refresh_token": "..." }`. Without a token the
/// call only acknowledges the logout; the client drops its tokens.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    let req: LogoutRequest = optional_json(&body)?;

    if let Some(token) = req.refresh_token.as_deref().filter(|t| !t.trim().is_empty()) {
        let claims = jwt::validate_refresh_token(token.trim(), state.jwt_secret())
            .map_err(|e| ApiError::BadRequest(format!("Invalid refresh token: {}", e)))?;

        if claims.sub != auth.user_id {
            return Err(ApiError::BadRequest(
                "Refresh token does not belong to the current user".to_string(),
            ));
        }

        RevokedToken::revoke(&state.db, &claims.jti, auth.user_id, claims.expires_at()).await?;

        let purged = RevokedToken::purge_expired(&state.db).await?;
        if purged > 0 {
            tracing::debug!(purged, "Purged expired token revocations");
        }
    }

    tracing::info!(user_id = %auth.user_id, "User logged out");

    Ok(Json(MessageResponse::new("Successfully logged out")))
}

/// Current user with capabilities, navigation and unread count
pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<MeResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let unread_notifications = Notification::unread_count(&state.db, user.id).await?;

    Ok(Json(MeResponse {
        capabilities: auth.capabilities(),
        navigation: sections_for(user.role),
        user: user.view(true),
        unread_notifications,
    }))
}

/// Change the caller's password
///
/// # Errors
///
/// - `400 Bad Request`: Wrong old password, mismatched confirmation, or a
///   new password that fails the policy
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if !password::verify_password(&req.old_password, &user.password_hash)? {
        return Err(ApiError::invalid_field("old_password", "Old password is incorrect"));
    }
    if req.new_password != req.confirm_password {
        return Err(ApiError::invalid_field("confirm_password", "Passwords do not match"));
    }

    let attributes = [
        user.username.as_str(),
        user.first_name.as_str(),
        user.last_name.as_str(),
        user.email.as_str(),
    ];
    password::validate_password_policy(&req.new_password, &attributes)
        .map_err(|e| ApiError::password_policy("new_password", e))?;

    let hash = password::hash_password(&req.new_password)?;
    User::set_password_hash(&state.db, user.id, &hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");

        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers, Some(peer)), "198.51.100.2");

        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "127.0.0.1");
        assert_eq!(client_ip(&HeaderMap::new(), None), "");
    }

    #[test]
    fn test_client_ip_ignores_malformed_headers() {
        let peer: SocketAddr = "192.0.2.10:5000".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-address"));
        assert_eq!(client_ip(&headers, Some(peer)), "192.0.2.10");

        let overlong = "1".repeat(60);
        headers.insert("x-forwarded-for", HeaderValue::from_str(&overlong).unwrap());
        headers.insert("x-real-ip", HeaderValue::from_str(&overlong).unwrap());
        assert_eq!(client_ip(&headers, Some(peer)), "192.0.2.10");

        // A bad forwarded value still lets a valid X-Real-IP through
        headers.insert("x-real-ip", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(client_ip(&headers, Some(peer)), "2001:db8::1");
        assert!(client_ip(&headers, Some(peer)).len() <= 45);
    }

    #[test]
    fn test_token_request_validation() {
        let req = TokenRequest {
            username: String::new(),
            password: "secret".to_string(),
        };
        assert!(req.validate().is_err());
    }
}
