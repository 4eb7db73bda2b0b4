use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{self, Settings};
use anyhow::anyhow;
use chrono::Duration;
use sqlx::{MySql, Pool};
use std::sync::Arc;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub user_service: Arc<dyn UserService>,
    pub secure_cookies: bool,
    pool: Option<Pool<MySql>>,
}

pub fn jwt_config(auth: &settings::Auth) -> Result<JwtConfig, AuthError> {
    let ttl = |secs: i64, name: &str| {
        Duration::try_seconds(secs)
            .ok_or_else(|| AuthError::ConfigurationFault(format!("auth.{} is out of range", name)))
    };
    Ok(JwtConfig {
        issuer: auth.issuer.clone(),
        audience: auth.audience.clone(),
        access_ttl: ttl(auth.access_ttl_secs, "access_ttl_secs")?,
        refresh_ttl: ttl(auth.refresh_ttl_secs, "refresh_ttl_secs")?,
        access_signing_key: auth.access_token_secret.clone().into_bytes(),
        refresh_signing_key: auth.refresh_token_secret.clone().into_bytes(),
        leeway_secs: auth.leeway_secs,
    })
}

impl Server {
    /// Wires every service from settings. A `ConfigurationFault` here means the
    /// process must not start serving.
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::try_new(
            jwt_config(&settings.auth)?,
            clock.clone(),
        )?);
        let costs = &settings.auth.argon2;
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(
            Argon2PasswordHasher::with_costs(costs.memory_kib, costs.iterations, costs.parallelism)?,
        );

        let pool = match settings.storage.backend.as_str() {
            "memory" => None,
            "mysql" => {
                let dsn = settings
                    .storage
                    .mysql_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("storage.mysql_dsn is required for mysql storage"))?;
                Some(Pool::<MySql>::connect(dsn).await?)
            }
            other => return Err(anyhow!("Unknown storage backend: {}", other)),
        };

        let user_repo: Arc<dyn UserRepo> = match &pool {
            Some(pool) => Arc::new(MySqlUserRepo::new(pool.clone())),
            None => Arc::new(MemoryUserRepo::new()),
        };

        let session_store: Arc<dyn AuthSessionStore> = match settings.session.backend.as_str() {
            "memory" => Arc::new(MemoryAuthSessionStore::new(clock.clone())),
            "redis" => {
                let dsn = settings
                    .session
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("session.redis_dsn is required for redis sessions"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisAuthSessionStore::new(
                    redis_manager,
                    settings.session.prefix.clone(),
                ))
            }
            "mysql" => match &pool {
                Some(pool) => Arc::new(MySqlAuthSessionStore::new(pool.clone())),
                None => return Err(anyhow!("mysql sessions require mysql storage")),
            },
            other => return Err(anyhow!("Unknown session backend: {}", other)),
        };

        info!(
            storage = %settings.storage.backend,
            session = %settings.session.backend,
            "server started"
        );

        Ok(Self::assemble(
            user_repo,
            credential_hasher,
            token_codec,
            session_store,
            clock,
            settings.http.secure_cookies,
            pool,
        ))
    }

    /// Everything in process memory; used by tests and the demo binary.
    pub fn in_memory(
        jwt: JwtConfig,
        credential_hasher: Arc<dyn CredentialHasher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let token_codec: Arc<dyn TokenCodec> =
            Arc::new(JwtHs256Codec::try_new(jwt, clock.clone())?);
        let session_store: Arc<dyn AuthSessionStore> =
            Arc::new(MemoryAuthSessionStore::new(clock.clone()));

        Ok(Self::assemble(
            Arc::new(MemoryUserRepo::new()),
            credential_hasher,
            token_codec,
            session_store,
            clock,
            true,
            None,
        ))
    }

    fn assemble(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        session_store: Arc<dyn AuthSessionStore>,
        clock: Arc<dyn Clock>,
        secure_cookies: bool,
        pool: Option<Pool<MySql>>,
    ) -> Self {
        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo.clone(),
            credential_hasher,
            token_codec,
            session_store,
            clock,
        ));
        let user_service: Arc<dyn UserService> = Arc::new(RealUserService::new(user_repo));

        Self {
            auth_service,
            user_service,
            secure_cookies,
            pool,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
