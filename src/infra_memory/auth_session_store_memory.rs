use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Duration, Utc};
use constant_time_eq::constant_time_eq;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct SessionEntry {
    fingerprint: String,
    expires_at: DateTime<Utc>,
}

/// Process-local session store. Each user's entry is guarded by its shard lock,
/// which is what makes `rotate_session` a compare-and-swap.
pub struct MemoryAuthSessionStore {
    sessions: DashMap<UserId, SessionEntry>,
    clock: Arc<dyn Clock>,
}

impl MemoryAuthSessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryAuthSessionStore {
            sessions: DashMap::new(),
            clock,
        }
    }

    fn entry_for(&self, fingerprint: &str, ttl_secs: u64) -> SessionEntry {
        let expires_at = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        SessionEntry {
            fingerprint: fingerprint.to_string(),
            expires_at,
        }
    }
}

#[async_trait::async_trait]
impl AuthSessionStore for MemoryAuthSessionStore {
    async fn set_session(
        &self,
        user_id: UserId,
        fingerprint: &str,
        ttl_secs: u64,
    ) -> Result<(), AuthError> {
        let entry = self.entry_for(fingerprint, ttl_secs);
        self.sessions.insert(user_id, entry);
        Ok(())
    }

    async fn get_session(&self, user_id: UserId) -> Result<Option<String>, AuthError> {
        let now = self.clock.now();
        self.sessions
            .remove_if(&user_id, |_, entry| entry.expires_at <= now);
        Ok(self
            .sessions
            .get(&user_id)
            .map(|entry| entry.fingerprint.clone()))
    }

    async fn clear_session(&self, user_id: UserId) -> Result<(), AuthError> {
        self.sessions.remove(&user_id);
        Ok(())
    }

    async fn rotate_session(
        &self,
        user_id: UserId,
        expected: &str,
        replacement: &str,
        ttl_secs: u64,
    ) -> Result<bool, AuthError> {
        let now = self.clock.now();
        let replacement = self.entry_for(replacement, ttl_secs);
        match self.sessions.entry(user_id) {
            Entry::Occupied(mut current)
                if current.get().expires_at > now
                    && constant_time_eq(
                        current.get().fingerprint.as_bytes(),
                        expected.as_bytes(),
                    ) =>
            {
                current.insert(replacement);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
