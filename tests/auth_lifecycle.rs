//! Token lifecycle tests against the in-memory wiring.

use chrono::{Duration, Utc};
use futures_util::future::join_all;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;
use tokenkeeper::application_impl::*;
use tokenkeeper::application_port::*;
use tokenkeeper::domain_model::{CredentialKey, UserId};
use tokenkeeper::server::Server;

const ACCESS_SECRET: &[u8] = b"lifecycle-access-secret";
const REFRESH_SECRET: &[u8] = b"lifecycle-refresh-secret";
const PASSWORD: &str = "correct horse battery";

fn jwt_config() -> JwtConfig {
    JwtConfig {
        issuer: "tokenkeeper".to_string(),
        audience: "tests".to_string(),
        access_ttl: Duration::minutes(15),
        refresh_ttl: Duration::days(7),
        access_signing_key: ACCESS_SECRET.to_vec(),
        refresh_signing_key: REFRESH_SECRET.to_vec(),
        leeway_secs: 0,
    }
}

fn setup() -> (Arc<dyn AuthService>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let hasher = Arc::new(Argon2PasswordHasher::with_costs(8, 1, 1).unwrap());
    let server = Server::in_memory(jwt_config(), hasher, clock.clone()).unwrap();
    (server.auth_service.clone(), clock)
}

async fn register(auth: &Arc<dyn AuthService>, username: &str) -> UserId {
    auth.signup(SignupInput {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        full_name: format!("User {}", username),
        password: PASSWORD.to_string(),
    })
    .await
    .unwrap()
    .user_id
}

async fn login(auth: &Arc<dyn AuthService>, username: &str) -> AuthTokens {
    auth.authenticate(LoginInput {
        credential_key: CredentialKey::Username(username.to_string()),
        password: PASSWORD.to_string(),
    })
    .await
    .unwrap()
    .tokens
}

#[tokio::test]
async fn test_u1_rotation_scenario() {
    let (auth, clock) = setup();
    let user_id = register(&auth, "u1").await;

    let first = login(&auth, "u1").await;
    assert_eq!(auth.authorize(&first.access_token.0).await.unwrap(), user_id);

    clock.advance(Duration::seconds(30));
    let second = auth.refresh(&first.refresh_token.0).await.unwrap();
    assert_ne!(second.refresh_token, first.refresh_token);
    assert_eq!(auth.authorize(&second.access_token.0).await.unwrap(), user_id);

    // rt1 is permanently dead
    let replay = auth.refresh(&first.refresh_token.0).await;
    assert!(matches!(replay, Err(AuthError::SessionMismatch)));

    let third = auth.refresh(&second.refresh_token.0).await.unwrap();
    assert_eq!(auth.authorize(&third.access_token.0).await.unwrap(), user_id);

    let replay = auth.refresh(&first.refresh_token.0).await;
    assert!(matches!(replay, Err(AuthError::SessionMismatch)));
    let replay = auth.refresh(&second.refresh_token.0).await;
    assert!(matches!(replay, Err(AuthError::SessionMismatch)));
}

#[tokio::test]
async fn test_new_login_replaces_previous_session() {
    let (auth, _) = setup();
    register(&auth, "u1").await;

    let first = login(&auth, "u1").await;
    let second = login(&auth, "u1").await;

    let stale = auth.refresh(&first.refresh_token.0).await;
    assert!(matches!(stale, Err(AuthError::SessionMismatch)));
    auth.refresh(&second.refresh_token.0).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_has_one_winner() {
    let (auth, _) = setup();
    register(&auth, "u1").await;
    let tokens = login(&auth, "u1").await;

    let attempts = (0..8).map(|_| {
        let auth = auth.clone();
        let refresh_token = tokens.refresh_token.0.clone();
        tokio::spawn(async move { auth.refresh(&refresh_token).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for result in &results {
        if let Err(e) = result {
            assert!(matches!(e, AuthError::SessionMismatch), "unexpected {:?}", e);
        }
    }

    // the winner's token carries the session forward
    auth.refresh(&winners[0].refresh_token.0).await.unwrap();
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let (auth, _) = setup();
    let user_id = register(&auth, "u1").await;
    let tokens = login(&auth, "u1").await;

    auth.logout(user_id).await.unwrap();

    let after = auth.refresh(&tokens.refresh_token.0).await;
    assert!(matches!(after, Err(AuthError::SessionMismatch)));

    // logging out twice is not an error
    auth.logout(user_id).await.unwrap();
}

#[tokio::test]
async fn test_token_types_are_not_interchangeable() {
    let (auth, _) = setup();
    register(&auth, "u1").await;
    let tokens = login(&auth, "u1").await;

    let as_access = auth.authorize(&tokens.refresh_token.0).await;
    assert!(matches!(as_access, Err(AuthError::TokenTypeMismatch)));

    let as_refresh = auth.refresh(&tokens.access_token.0).await;
    assert!(matches!(as_refresh, Err(AuthError::TokenTypeMismatch)));
}

#[tokio::test]
async fn test_backdated_access_token_is_expired() {
    let (auth, _) = setup();
    let user_id = register(&auth, "u1").await;

    let now = Utc::now().timestamp();
    let claims = serde_json::json!({
        "sub": user_id.to_string(),
        "typ": "access",
        "iat": now - 3600,
        "exp": now - 60,
        "iss": "tokenkeeper",
        "aud": "tests",
        "jti": "backdated",
    });
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(ACCESS_SECRET),
    )
    .unwrap();

    let result = auth.authorize(&token).await;
    assert!(matches!(result, Err(AuthError::ExpiredToken)));
}

#[tokio::test]
async fn test_tokens_expire_with_the_clock() {
    let (auth, clock) = setup();
    register(&auth, "u1").await;
    let tokens = login(&auth, "u1").await;

    clock.advance(Duration::minutes(15));
    let access = auth.authorize(&tokens.access_token.0).await;
    assert!(matches!(access, Err(AuthError::ExpiredToken)));

    // still within the refresh lifetime
    let renewed = auth.refresh(&tokens.refresh_token.0).await.unwrap();

    clock.advance(Duration::days(7));
    let refresh = auth.refresh(&renewed.refresh_token.0).await;
    assert!(matches!(refresh, Err(AuthError::ExpiredToken)));
}

#[tokio::test]
async fn test_missing_and_malformed_tokens() {
    let (auth, _) = setup();

    assert!(matches!(
        auth.authorize("").await,
        Err(AuthError::MissingToken)
    ));
    assert!(matches!(auth.refresh("").await, Err(AuthError::MissingToken)));
    assert!(matches!(
        auth.authorize("not-a-jwt").await,
        Err(AuthError::MalformedToken)
    ));
    assert!(matches!(
        auth.refresh("a.b.c").await,
        Err(AuthError::MalformedToken)
    ));
}

#[tokio::test]
async fn test_unknown_user_and_wrong_password_look_the_same() {
    let (auth, _) = setup();
    register(&auth, "u1").await;

    let wrong_password = auth
        .authenticate(LoginInput {
            credential_key: CredentialKey::Username("u1".to_string()),
            password: "not the password".to_string(),
        })
        .await;
    let unknown_user = auth
        .authenticate(LoginInput {
            credential_key: CredentialKey::Username("nobody".to_string()),
            password: PASSWORD.to_string(),
        })
        .await;
    let empty_password = auth
        .authenticate(LoginInput {
            credential_key: CredentialKey::Email("u1@example.com".to_string()),
            password: String::new(),
        })
        .await;

    for result in [wrong_password, unknown_user, empty_password] {
        match result {
            Err(e @ AuthError::InvalidCredential) => {
                assert_eq!(e.to_string(), "invalid credentials")
            }
            other => panic!("expected InvalidCredential, got {:?}", other.map(|_| ())),
        }
    }
}

#[tokio::test]
async fn test_login_by_email() {
    let (auth, _) = setup();
    let user_id = register(&auth, "u1").await;

    let result = auth
        .authenticate(LoginInput {
            credential_key: CredentialKey::Email("U1@Example.com".to_string()),
            password: PASSWORD.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(result.user.user_id, user_id);
    assert_eq!(result.user.username, "u1");
}

#[tokio::test]
async fn test_duplicate_signup_is_rejected() {
    let (auth, _) = setup();
    register(&auth, "u1").await;

    let again = auth
        .signup(SignupInput {
            username: "U1".to_string(),
            email: "someone-else@example.com".to_string(),
            full_name: "Another".to_string(),
            password: PASSWORD.to_string(),
        })
        .await;
    assert!(matches!(again, Err(AuthError::UserExists)));
}

#[tokio::test]
async fn test_change_password() {
    let (auth, _) = setup();
    let user_id = register(&auth, "u1").await;

    let wrong_old = auth
        .change_password(
            user_id,
            ChangePasswordInput {
                old_password: "guess".to_string(),
                new_password: "a brand new password".to_string(),
            },
        )
        .await;
    assert!(matches!(wrong_old, Err(AuthError::InvalidCredential)));

    auth.change_password(
        user_id,
        ChangePasswordInput {
            old_password: PASSWORD.to_string(),
            new_password: "a brand new password".to_string(),
        },
    )
    .await
    .unwrap();

    let old = auth
        .authenticate(LoginInput {
            credential_key: CredentialKey::Username("u1".to_string()),
            password: PASSWORD.to_string(),
        })
        .await;
    assert!(matches!(old, Err(AuthError::InvalidCredential)));

    auth.authenticate(LoginInput {
        credential_key: CredentialKey::Username("u1".to_string()),
        password: "a brand new password".to_string(),
    })
    .await
    .unwrap();
}

#[test]
fn test_missing_secret_is_a_configuration_fault() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let hasher = Arc::new(Argon2PasswordHasher::with_costs(8, 1, 1).unwrap());
    let mut cfg = jwt_config();
    cfg.refresh_signing_key.clear();

    let result = Server::in_memory(cfg, hasher, clock);
    assert!(matches!(result, Err(AuthError::ConfigurationFault(_))));
}
