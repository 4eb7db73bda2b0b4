//! Walks one user through the token lifecycle against in-memory stores:
//! register, login, authorize, refresh, replay the old refresh token, logout.
//!
//! ```text
//! cargo run --bin auth_demo
//! ```

use chrono::{Duration, Utc};
use std::sync::Arc;
use tokenkeeper::application_impl::*;
use tokenkeeper::application_port::*;
use tokenkeeper::domain_model::CredentialKey;
use tokenkeeper::logger::*;
use tokenkeeper::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    logger.reload_filter("auth_demo=debug,tokenkeeper=debug")?;

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let jwt = JwtConfig {
        issuer: "tokenkeeper".to_string(),
        audience: "auth-demo".to_string(),
        access_ttl: Duration::minutes(15),
        refresh_ttl: Duration::days(7),
        access_signing_key: b"demo-access-secret".to_vec(),
        refresh_signing_key: b"demo-refresh-secret".to_vec(),
        leeway_secs: 0,
    };
    let server = Server::in_memory(jwt, Arc::new(Argon2PasswordHasher::default()), clock.clone())?;
    let auth = server.auth_service.clone();

    let profile = auth
        .signup(SignupInput {
            username: "u1".to_string(),
            email: "u1@example.com".to_string(),
            full_name: "User One".to_string(),
            password: "correct horse".to_string(),
        })
        .await?;
    info!(user_id = %profile.user_id, "registered");

    let login = auth
        .authenticate(LoginInput {
            credential_key: CredentialKey::Username("u1".to_string()),
            password: "correct horse".to_string(),
        })
        .await?;
    let first = login.tokens;
    info!(expires_at = %first.access_token_expires_at, "logged in");

    let user_id = auth.authorize(&first.access_token.0).await?;
    info!(%user_id, "access token accepted");

    match auth.authorize(&first.refresh_token.0).await {
        Err(e) => info!("refresh token used as access token: {}", e),
        Ok(_) => warn!("refresh token was accepted as an access token"),
    }

    clock.advance(Duration::minutes(10));
    let second = auth.refresh(&first.refresh_token.0).await?;
    info!(expires_at = %second.refresh_token_expires_at, "refreshed");

    match auth.refresh(&first.refresh_token.0).await {
        Err(e) => info!("replayed refresh token: {}", e),
        Ok(_) => warn!("replayed refresh token was accepted"),
    }

    auth.logout(user_id).await?;
    match auth.refresh(&second.refresh_token.0).await {
        Err(e) => info!("refresh after logout: {}", e),
        Ok(_) => warn!("refresh after logout was accepted"),
    }

    clock.advance(Duration::minutes(20));
    match auth.authorize(&second.access_token.0).await {
        Err(e) => info!("access token after its lifetime: {}", e),
        Ok(_) => warn!("expired access token was accepted"),
    }

    server.shutdown().await;
    Ok(())
}
