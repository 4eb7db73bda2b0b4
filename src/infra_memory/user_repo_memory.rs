use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Process-local user store with unique username and email indexes.
#[derive(Default)]
pub struct MemoryUserRepo {
    users: DashMap<UserId, UserRecord>,
    usernames: DashMap<String, UserId>,
    emails: DashMap<String, UserId>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn email_key(email: &str) -> String {
        email.to_lowercase()
    }

    fn get(&self, user_id: &UserId) -> Option<UserRecord> {
        self.users.get(user_id).map(|rec| rec.clone())
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, record: &UserRecord) -> Result<(), AuthError> {
        match self.usernames.entry(record.username.clone()) {
            Entry::Occupied(_) => return Err(AuthError::UserExists),
            Entry::Vacant(slot) => {
                slot.insert(record.user_id);
            }
        }

        match self.emails.entry(Self::email_key(&record.email)) {
            Entry::Occupied(_) => {
                self.usernames.remove(&record.username);
                return Err(AuthError::UserExists);
            }
            Entry::Vacant(slot) => {
                slot.insert(record.user_id);
            }
        }

        self.users.insert(record.user_id, record.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.get(&user_id))
    }

    async fn find_by_credential_key(
        &self,
        key: &CredentialKey,
    ) -> Result<Option<UserRecord>, AuthError> {
        let user_id = match key {
            CredentialKey::Username(username) => self.usernames.get(username).map(|id| *id),
            CredentialKey::Email(email) => self.emails.get(&Self::email_key(email)).map(|id| *id),
        };
        Ok(user_id.and_then(|id| self.get(&id)))
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        email: &str,
        full_name: &str,
    ) -> Result<(), AuthError> {
        let current = self.get(&user_id).ok_or(AuthError::UserNotFound)?;
        let old_key = Self::email_key(&current.email);
        let new_key = Self::email_key(email);

        if new_key != old_key {
            match self.emails.entry(new_key) {
                Entry::Occupied(_) => return Err(AuthError::UserExists),
                Entry::Vacant(slot) => {
                    slot.insert(user_id);
                }
            }
            self.emails.remove(&old_key);
        }

        let mut rec = self
            .users
            .get_mut(&user_id)
            .ok_or(AuthError::UserNotFound)?;
        rec.email = email.to_string();
        rec.full_name = full_name.to_string();
        Ok(())
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let mut rec = self
            .users
            .get_mut(&user_id)
            .ok_or(AuthError::UserNotFound)?;
        rec.password_hash = password_hash.to_string();
        Ok(())
    }
}
