use super::util::{is_dup_key, uid_as_bytes, uid_from_bytes};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

const SELECT_USER: &str = r#"
SELECT user_id, username, email, full_name, password_hash, is_active, created_at
FROM user
"#;

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, AuthError> {
        let store_err = |e: sqlx::Error| AuthError::Store(e.to_string());

        let user_id_bytes: Vec<u8> = row.try_get("user_id").map_err(store_err)?;
        let user_id = uid_from_bytes(&user_id_bytes)?;
        let username: String = row.try_get("username").map_err(store_err)?;
        let email: String = row.try_get("email").map_err(store_err)?;
        let full_name: String = row.try_get("full_name").map_err(store_err)?;
        let password_hash: String = row.try_get("password_hash").map_err(store_err)?;
        let is_active: bool = row.try_get("is_active").map_err(store_err)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(store_err)?;

        Ok(UserRecord {
            user_id,
            username,
            email,
            full_name,
            password_hash,
            is_active,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn create(&self, record: &UserRecord) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO user (user_id, username, email, full_name, password_hash, is_active, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(uid_as_bytes(&record.user_id))
        .bind(&record.username)
        .bind(&record.email)
        .bind(&record.full_name)
        .bind(&record.password_hash)
        .bind(record.is_active)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                AuthError::UserExists
            } else {
                AuthError::Store(e.to_string())
            }
        })?;

        Ok(())
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(&format!("{SELECT_USER} WHERE user_id = ?"))
            .bind(uid_as_bytes(&user_id))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn find_by_credential_key(
        &self,
        key: &CredentialKey,
    ) -> Result<Option<UserRecord>, AuthError> {
        let (column, value) = match key {
            CredentialKey::Username(username) => ("username", username.as_str()),
            CredentialKey::Email(email) => ("email", email.as_str()),
        };
        let row_opt: Option<MySqlRow> =
            sqlx::query(&format!("{SELECT_USER} WHERE {column} = ?"))
                .bind(value)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        email: &str,
        full_name: &str,
    ) -> Result<(), AuthError> {
        sqlx::query("UPDATE user SET email = ?, full_name = ? WHERE user_id = ?")
            .bind(email)
            .bind(full_name)
            .bind(uid_as_bytes(&user_id))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_dup_key(&e) {
                    AuthError::UserExists
                } else {
                    AuthError::Store(format!("update profile: {e}"))
                }
            })?;

        Ok(())
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        sqlx::query("UPDATE user SET password_hash = ? WHERE user_id = ?")
            .bind(password_hash)
            .bind(uid_as_bytes(&user_id))
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("update password: {e}")))?;

        Ok(())
    }
}
