use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    pub fn new_v4() -> Self {
        UserId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(UserId)
    }
}

/// Either half of the login identity. Usernames are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialKey {
    Username(String),
    Email(String),
}

impl CredentialKey {
    /// Prefers the username when both are supplied; blank values count as absent.
    pub fn from_parts(username: Option<&str>, email: Option<&str>) -> Option<Self> {
        let username = username.map(str::trim).filter(|s| !s.is_empty());
        let email = email.map(str::trim).filter(|s| !s.is_empty());
        match (username, email) {
            (Some(username), _) => Some(CredentialKey::Username(username.to_lowercase())),
            (None, Some(email)) => Some(CredentialKey::Email(email.to_string())),
            (None, None) => None,
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKey::Username(username) => write!(f, "username:{}", username),
            CredentialKey::Email(email) => write!(f, "email:{}", email),
        }
    }
}

/// Public projection of a user. Never carries the password hash or session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}
