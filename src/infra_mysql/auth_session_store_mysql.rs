use super::util::uid_as_bytes;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Duration, Utc};
use sqlx::MySqlPool;

/// Keeps the refresh fingerprint on the user row itself.
pub struct MySqlAuthSessionStore {
    pool: MySqlPool,
}

impl MySqlAuthSessionStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlAuthSessionStore { pool }
    }

    fn expires_at(ttl_secs: u64) -> DateTime<Utc> {
        i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[async_trait::async_trait]
impl AuthSessionStore for MySqlAuthSessionStore {
    async fn set_session(
        &self,
        user_id: UserId,
        fingerprint: &str,
        ttl_secs: u64,
    ) -> Result<(), AuthError> {
        sqlx::query(
            r#"
UPDATE user
SET refresh_token_hash = ?, refresh_expires_at = ?
WHERE user_id = ?
"#,
        )
        .bind(fingerprint)
        .bind(Self::expires_at(ttl_secs))
        .bind(uid_as_bytes(&user_id))
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("set session: {e}")))?;

        Ok(())
    }

    async fn get_session(&self, user_id: UserId) -> Result<Option<String>, AuthError> {
        let fingerprint: Option<Option<String>> = sqlx::query_scalar(
            r#"
SELECT refresh_token_hash
FROM user
WHERE user_id = ? AND refresh_expires_at > ?
"#,
        )
        .bind(uid_as_bytes(&user_id))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("get session: {e}")))?;

        Ok(fingerprint.flatten())
    }

    async fn clear_session(&self, user_id: UserId) -> Result<(), AuthError> {
        sqlx::query(
            r#"
UPDATE user
SET refresh_token_hash = NULL, refresh_expires_at = NULL
WHERE user_id = ?
"#,
        )
        .bind(uid_as_bytes(&user_id))
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("clear session: {e}")))?;

        Ok(())
    }

    async fn rotate_session(
        &self,
        user_id: UserId,
        expected: &str,
        replacement: &str,
        ttl_secs: u64,
    ) -> Result<bool, AuthError> {
        // The row lock taken by UPDATE serializes concurrent rotations.
        let result = sqlx::query(
            r#"
UPDATE user
SET refresh_token_hash = ?, refresh_expires_at = ?
WHERE user_id = ? AND refresh_token_hash = ? AND refresh_expires_at > ?
"#,
        )
        .bind(replacement)
        .bind(Self::expires_at(ttl_secs))
        .bind(uid_as_bytes(&user_id))
        .bind(expected)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("rotate session: {e}")))?;

        Ok(result.rows_affected() == 1)
    }
}
