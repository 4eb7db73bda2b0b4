use crate::application_port::AuthError;
use crate::domain_model::{UserId, UserProfile};

#[derive(Debug, Clone)]
pub struct UpdateAccountInput {
    pub email: String,
    pub full_name: String,
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    async fn profile(&self, user_id: UserId) -> Result<UserProfile, AuthError>;
    async fn update_account(
        &self,
        user_id: UserId,
        request: UpdateAccountInput,
    ) -> Result<UserProfile, AuthError>;
}
