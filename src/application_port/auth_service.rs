use crate::domain_model::{CredentialKey, UserId, UserProfile};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredential,
    #[error("token missing")]
    MissingToken,
    #[error("token malformed")]
    MalformedToken,
    #[error("token expired")]
    ExpiredToken,
    #[error("token type mismatch")]
    TokenTypeMismatch,
    #[error("session mismatch")]
    SessionMismatch,
    #[error("configuration fault: {0}")]
    ConfigurationFault(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("user already exists")]
    UserExists,
    #[error("user not found")]
    UserNotFound,
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

/// Why a presented token was refused, in the order the checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenRejection {
    #[error("malformed")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("expired")]
    Expired,
    #[error("wrong type")]
    WrongType,
}

impl From<TokenRejection> for AuthError {
    fn from(rejection: TokenRejection) -> Self {
        match rejection {
            TokenRejection::Malformed | TokenRejection::BadSignature => AuthError::MalformedToken,
            TokenRejection::Expired => AuthError::ExpiredToken,
            TokenRejection::WrongType => AuthError::TokenTypeMismatch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn other(self) -> TokenKind {
        match self {
            TokenKind::Access => TokenKind::Refresh,
            TokenKind::Refresh => TokenKind::Access,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub credential_key: CredentialKey,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ChangePasswordInput {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: UserProfile,
    pub tokens: AuthTokens,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub issued_at: DateTime<Utc>,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub user_id: UserId,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Wall-clock source for issued-at and expiry arithmetic.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    /// Mints an access token and a refresh token for `user`, each with a fresh `jti`.
    async fn issue_token_pair(&self, user: UserId) -> Result<AuthTokens, AuthError>;

    /// Runs well-formed, signature, expiry and type checks in that order.
    async fn verify_token(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> Result<VerifiedToken, TokenRejection>;

    /// Keyed digest of a refresh token; this is what the session store holds.
    fn fingerprint(&self, token: &RefreshToken) -> Result<String, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn signup(&self, request: SignupInput) -> Result<UserProfile, AuthError>;
    async fn authenticate(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
    async fn logout(&self, user_id: UserId) -> Result<(), AuthError>;
    async fn authorize(&self, access_token: &str) -> Result<UserId, AuthError>;
    async fn change_password(
        &self,
        user_id: UserId,
        request: ChangePasswordInput,
    ) -> Result<(), AuthError>;
}
