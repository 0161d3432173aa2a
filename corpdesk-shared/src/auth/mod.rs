/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and the password policy
/// - [`jwt`]: Access/refresh token issuance and validation
/// - [`authorization`]: The permission evaluator (levels, user management, financial access)
/// - [`middleware`]: `AuthContext` and bearer-token authentication for Axum
/// - [`navigation`]: Navigation sections visible to each role
///
/// # Example
///
/// ```no_run
/// use corpdesk_shared::auth::jwt::{issue_token_pair, JwtSettings};
/// use corpdesk_shared::auth::password::{hash_password, verify_password};
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("granite-otter-42")?;
/// assert!(verify_password("granite-otter-42", &hash)?);
///
/// let settings = JwtSettings {
///     secret: "a-secret-of-at-least-thirty-two-bytes".to_string(),
///     access_ttl: Duration::minutes(60),
///     refresh_ttl: Duration::days(7),
/// };
/// let tokens = issue_token_pair(Uuid::new_v4(), &settings)?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod navigation;
pub mod password;
