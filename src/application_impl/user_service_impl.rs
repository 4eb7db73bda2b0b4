use crate::application_impl::account_rules::{normalize_email, normalize_full_name};
use crate::application_port::{AuthError, UpdateAccountInput, UserService};
use crate::domain_model::{UserId, UserProfile};
use crate::domain_port::UserRepo;
use crate::logger::*;
use std::sync::Arc;

pub struct RealUserService {
    user_repo: Arc<dyn UserRepo>,
}

impl RealUserService {
    pub fn new(user_repo: Arc<dyn UserRepo>) -> RealUserService {
        RealUserService { user_repo }
    }
}

#[async_trait::async_trait]
impl UserService for RealUserService {
    async fn profile(&self, user_id: UserId) -> Result<UserProfile, AuthError> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .filter(|rec| rec.is_active)
            .map(|rec| rec.profile())
            .ok_or(AuthError::UserNotFound)
    }

    async fn update_account(
        &self,
        user_id: UserId,
        request: UpdateAccountInput,
    ) -> Result<UserProfile, AuthError> {
        let email = normalize_email(&request.email)?;
        let full_name = normalize_full_name(&request.full_name)?;

        self.user_repo
            .update_profile(user_id, &email, &full_name)
            .await?;
        info!(%user_id, "account details updated");

        self.profile(user_id).await
    }
}
