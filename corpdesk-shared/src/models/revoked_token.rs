/// Revoked refresh tokens
///
/// Logout stores the SHA-256 digest of the refresh token's `jti`. The refresh
/// endpoint refuses any token whose digest is present. Rows past their
/// expiry can be purged, since the token would fail validation anyway.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

/// Hex-encoded SHA-256 of a token id
pub fn token_digest(jti: &Uuid) -> String {
    hex::encode(Sha256::digest(jti.as_bytes()))
}

pub struct RevokedToken;

impl RevokedToken {
    /// Revokes a token. Revoking twice is a no-op.
    pub async fn revoke(
        pool: &PgPool,
        jti: &Uuid,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (token_hash) DO NOTHING
            "#,
        )
        .bind(token_digest(jti))
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Checks whether a token id has been revoked
    pub async fn is_revoked(pool: &PgPool, jti: &Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE token_hash = $1)")
            .bind(token_digest(jti))
            .fetch_one(pool)
            .await
    }

    /// Deletes revocations whose token has expired
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_digest_is_stable_hex() {
        let jti = Uuid::new_v4();
        let digest = token_digest(&jti);

        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, token_digest(&jti));
        assert_ne!(digest, token_digest(&Uuid::new_v4()));
    }
}
