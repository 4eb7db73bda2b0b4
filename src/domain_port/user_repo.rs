use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            created_at: self.created_at,
        }
    }
}

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with `AuthError::UserExists` if the username or email is taken.
    async fn create(&self, record: &UserRecord) -> Result<(), AuthError>;

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError>;

    async fn find_by_credential_key(
        &self,
        key: &CredentialKey,
    ) -> Result<Option<UserRecord>, AuthError>;

    /// Fails with `AuthError::UserExists` if the email belongs to someone else.
    async fn update_profile(
        &self,
        user_id: UserId,
        email: &str,
        full_name: &str,
    ) -> Result<(), AuthError>;

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), AuthError>;
}
