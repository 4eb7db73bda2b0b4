use crate::application_port::*;
use crate::domain_model::*;

/// Per-user pointer to the single live refresh token, held as its fingerprint.
#[async_trait::async_trait]
pub trait AuthSessionStore: Send + Sync {
    /// Overwrite whatever session the user had.
    async fn set_session(
        &self,
        user_id: UserId,
        fingerprint: &str,
        ttl_secs: u64,
    ) -> Result<(), AuthError>;

    /// Current fingerprint, or `None` if there is no live session.
    async fn get_session(&self, user_id: UserId) -> Result<Option<String>, AuthError>;

    async fn clear_session(&self, user_id: UserId) -> Result<(), AuthError>;

    /// Replace `expected` with `replacement` atomically. Returns `false` and
    /// leaves the store untouched when the current value is not `expected`.
    async fn rotate_session(
        &self,
        user_id: UserId,
        expected: &str,
        replacement: &str,
        ttl_secs: u64,
    ) -> Result<bool, AuthError>;
}
