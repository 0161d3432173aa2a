/// JWT token generation and validation module
///
/// Access and refresh tokens are HS256-signed JWTs. Each token carries a
/// random `jti` so that an individual refresh token can be revoked at logout
/// (see [`crate::models::revoked_token`]).
///
/// Tokens only identify the user. The role is loaded from the database on
/// every request, so a role change takes effect immediately.
///
/// # Token Types
///
/// - **Access Token**: Short-lived (default 60 minutes), sent as `Bearer` on API calls
/// - **Refresh Token**: Long-lived (default 7 days), exchanged for new access tokens
///
/// # Example
///
/// ```
/// use corpdesk_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let secret = "your-secret-key-at-least-32-bytes";
///
/// let claims = Claims::new(user_id, TokenType::Access, Duration::minutes(60));
/// let token = create_token(&claims, secret)?;
///
/// let validated = validate_access_token(&token, secret)?;
/// assert_eq!(validated.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer written into and required from every token
pub const ISSUER: &str = "corpdesk";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, issuer or format check failed
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// A refresh token was used as an access token, or the reverse
    #[error("Expected {expected} token, got {actual} token")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
///
/// - `sub`: User ID
/// - `iss`: Always "corpdesk"
/// - `iat` / `nbf` / `exp`: Unix timestamps
/// - `jti`: Unique token ID, used for revocation
/// - `token_type`: Access or refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub jti: Uuid,
    pub token_type: TokenType,
}

impl Claims {
    /// Creates claims expiring `expires_in` from now
    pub fn new(user_id: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4(),
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Signing secret and token lifetimes
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

/// Freshly issued access + refresh tokens
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Signs claims with HS256
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates signature, expiry, `nbf` and issuer, and returns the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

fn validate_typed(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != expected {
        return Err(JwtError::WrongType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }

    Ok(claims)
}

/// Validates a token and requires it to be an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Access)
}

/// Validates a token and requires it to be a refresh token
///
/// Revocation is checked separately against the database.
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Refresh)
}

/// Issues a new access token for the user
pub fn issue_access_token(user_id: Uuid, settings: &JwtSettings) -> Result<String, JwtError> {
    let claims = Claims::new(user_id, TokenType::Access, settings.access_ttl);
    create_token(&claims, &settings.secret)
}

/// Issues an access + refresh token pair for the user
pub fn issue_token_pair(user_id: Uuid, settings: &JwtSettings) -> Result<TokenPair, JwtError> {
    let refresh = Claims::new(user_id, TokenType::Refresh, settings.refresh_ttl);

    Ok(TokenPair {
        access_token: issue_access_token(user_id, settings)?,
        refresh_token: create_token(&refresh, &settings.secret)?,
        expires_in: settings.access_ttl.num_seconds(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn settings() -> JwtSettings {
        JwtSettings {
            secret: SECRET.to_string(),
            access_ttl: Duration::minutes(60),
            refresh_ttl: Duration::days(7),
        }
    }

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, TokenType::Access, Duration::hours(1));

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "corpdesk");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_each_token_gets_a_unique_jti() {
        let user_id = Uuid::new_v4();
        let a = Claims::new(user_id, TokenType::Refresh, Duration::days(1));
        let b = Claims::new(user_id, TokenType::Refresh, Duration::days(1));
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_create_and_validate_token() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, TokenType::Access, Duration::minutes(5));
        let token = create_token(&claims, SECRET).expect("Should create token");

        let validated = validate_token(&token, SECRET).expect("Should validate token");
        assert_eq!(validated.sub, user_id);
        assert_eq!(validated.jti, claims.jti);
        assert_eq!(validated.token_type, TokenType::Access);
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let claims = Claims::new(Uuid::new_v4(), TokenType::Access, Duration::minutes(5));
        let token = create_token(&claims, SECRET).unwrap();

        let result = validate_token(&token, "another-secret-key-at-least-32-bytes");
        assert!(matches!(result, Err(JwtError::ValidationError(_))));
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = Claims::new(Uuid::new_v4(), TokenType::Access, Duration::seconds(-3600));
        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let pair = issue_token_pair(Uuid::new_v4(), &settings()).unwrap();

        assert!(validate_access_token(&pair.access_token, SECRET).is_ok());
        assert!(validate_refresh_token(&pair.refresh_token, SECRET).is_ok());

        let err = validate_access_token(&pair.refresh_token, SECRET).unwrap_err();
        assert!(matches!(err, JwtError::WrongType { expected: "access", actual: "refresh" }));

        let err = validate_refresh_token(&pair.access_token, SECRET).unwrap_err();
        assert!(matches!(err, JwtError::WrongType { expected: "refresh", .. }));
    }

    #[test]
    fn test_token_pair() {
        let user_id = Uuid::new_v4();
        let pair = issue_token_pair(user_id, &settings()).unwrap();

        assert_eq!(pair.expires_in, 3600);
        let refresh = validate_refresh_token(&pair.refresh_token, SECRET).unwrap();
        assert_eq!(refresh.sub, user_id);
        assert!(refresh.expires_at() > Utc::now() + Duration::days(6));
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(
            validate_token("not-a-jwt", SECRET),
            Err(JwtError::ValidationError(_))
        ));
    }
}
