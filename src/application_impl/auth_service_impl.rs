use crate::application_impl::account_rules::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use constant_time_eq::constant_time_eq;
use std::sync::Arc;
use tokio::sync::OnceCell;

// Hashed once, then verified against whenever a login names no usable account.
const DECOY_PASSWORD: &str = "tokenkeeper-decoy-password";

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    session_store: Arc<dyn AuthSessionStore>,
    clock: Arc<dyn Clock>,
    decoy_hash: OnceCell<String>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        session_store: Arc<dyn AuthSessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_codec,
            session_store,
            clock,
            decoy_hash: OnceCell::new(),
        }
    }

    /// PHC string produced by the configured hasher, so verifying against it
    /// costs the same as verifying a real account.
    async fn decoy_hash(&self) -> Result<&str, AuthError> {
        let hash = self
            .decoy_hash
            .get_or_try_init(|| self.credential_hasher.hash_password(DECOY_PASSWORD))
            .await?;
        Ok(hash.as_str())
    }

    fn ttl_secs(&self, until: DateTime<Utc>) -> u64 {
        let secs = (until - self.clock.now()).num_seconds();
        if secs <= 0 { 1 } else { secs as u64 }
    }

    async fn active_user(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        Ok(self
            .user_repo
            .find_by_id(user_id)
            .await?
            .filter(|rec| rec.is_active))
    }

    /// Mints a pair and makes its refresh token the only live one for `user_id`.
    async fn start_session(&self, user_id: UserId) -> Result<AuthTokens, AuthError> {
        let tokens = self.token_codec.issue_token_pair(user_id).await?;
        let fingerprint = self.token_codec.fingerprint(&tokens.refresh_token)?;
        let ttl_secs = self.ttl_secs(tokens.refresh_token_expires_at);
        self.session_store
            .set_session(user_id, &fingerprint, ttl_secs)
            .await?;
        Ok(tokens)
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn signup(&self, request: SignupInput) -> Result<UserProfile, AuthError> {
        let SignupInput {
            username,
            email,
            full_name,
            password,
        } = request;

        let username = normalize_username(&username)?;
        let email = normalize_email(&email)?;
        let full_name = normalize_full_name(&full_name)?;
        check_password(&password)?;

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let record = UserRecord {
            user_id: UserId::new_v4(),
            username,
            email,
            full_name,
            password_hash,
            is_active: true,
            created_at: self.clock.now(),
        };
        self.user_repo.create(&record).await?;

        info!(user_id = %record.user_id, username = %record.username, "user registered");
        Ok(record.profile())
    }

    async fn authenticate(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput {
            credential_key,
            password,
        } = request;

        let rec = self
            .user_repo
            .find_by_credential_key(&credential_key)
            .await?
            .filter(|rec| rec.is_active);

        // Unknown accounts still pay for a full verify.
        let password_hash = match &rec {
            Some(rec) => rec.password_hash.as_str(),
            None => self.decoy_hash().await?,
        };
        let matched = self
            .credential_hasher
            .verify_password(&password, password_hash)
            .await?;

        let rec = match rec {
            Some(rec) if matched && !password.is_empty() => rec,
            Some(rec) => {
                debug!(user_id = %rec.user_id, "login rejected: wrong password");
                return Err(AuthError::InvalidCredential);
            }
            None => {
                debug!(%credential_key, "login rejected: no such user");
                return Err(AuthError::InvalidCredential);
            }
        };

        let tokens = self.start_session(rec.user_id).await?;
        info!(user_id = %rec.user_id, "user logged in");

        Ok(LoginResult {
            user: rec.profile(),
            tokens,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let verified = self
            .token_codec
            .verify_token(refresh_token, TokenKind::Refresh)
            .await
            .map_err(|rejection| {
                debug!(%rejection, "refresh token rejected");
                AuthError::from(rejection)
            })?;
        let user_id = verified.user_id;

        if self.active_user(user_id).await?.is_none() {
            warn!(%user_id, "refresh token for unknown or inactive user");
            return Err(AuthError::SessionMismatch);
        }

        let presented = self
            .token_codec
            .fingerprint(&RefreshToken(refresh_token.to_string()))?;
        match self.session_store.get_session(user_id).await? {
            Some(current) if constant_time_eq(current.as_bytes(), presented.as_bytes()) => {}
            Some(_) => {
                warn!(%user_id, jti = %verified.jti, "stale refresh token presented");
                return Err(AuthError::SessionMismatch);
            }
            None => {
                warn!(%user_id, jti = %verified.jti, "refresh token presented without a session");
                return Err(AuthError::SessionMismatch);
            }
        }

        let tokens = self.token_codec.issue_token_pair(user_id).await?;
        let replacement = self.token_codec.fingerprint(&tokens.refresh_token)?;
        let ttl_secs = self.ttl_secs(tokens.refresh_token_expires_at);

        // Rotation: compare-and-swap, so only one concurrent refresh can win.
        if !self
            .session_store
            .rotate_session(user_id, &presented, &replacement, ttl_secs)
            .await?
        {
            warn!(%user_id, jti = %verified.jti, "refresh token lost a concurrent rotation");
            return Err(AuthError::SessionMismatch);
        }

        info!(%user_id, "refresh token rotated");
        Ok(tokens)
    }

    async fn logout(&self, user_id: UserId) -> Result<(), AuthError> {
        self.session_store.clear_session(user_id).await?;
        info!(%user_id, "user logged out");
        Ok(())
    }

    async fn authorize(&self, access_token: &str) -> Result<UserId, AuthError> {
        if access_token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let verified = self
            .token_codec
            .verify_token(access_token, TokenKind::Access)
            .await
            .map_err(|rejection| {
                debug!(%rejection, "access token rejected");
                AuthError::from(rejection)
            })?;

        if self.active_user(verified.user_id).await?.is_none() {
            return Err(AuthError::UserNotFound);
        }

        Ok(verified.user_id)
    }

    async fn change_password(
        &self,
        user_id: UserId,
        request: ChangePasswordInput,
    ) -> Result<(), AuthError> {
        let rec = self
            .active_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self
            .credential_hasher
            .verify_password(&request.old_password, &rec.password_hash)
            .await?
        {
            return Err(AuthError::InvalidCredential);
        }
        check_password(&request.new_password)?;

        let password_hash = self
            .credential_hasher
            .hash_password(&request.new_password)
            .await?;
        self.user_repo
            .update_password_hash(user_id, &password_hash)
            .await?;

        info!(%user_id, "password changed");
        Ok(())
    }
}
