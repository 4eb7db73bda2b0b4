use super::cookie::*;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::{CredentialKey, UserId, UserProfile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{self, Reply, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

fn reply_with_cookies<T: Serialize>(
    data: &T,
    cookies: &[String],
) -> Result<warp::reply::Response, warp::Rejection> {
    let response = warp::reply::json(&ApiResponse::ok(data)).into_response();
    append_cookies(response, cookies)
        .map_err(ApiFailure::internal)
        .map_err(reject::custom)
}

fn token_cookies(policy: CookiePolicy, tokens: &AuthTokens) -> [String; 2] {
    [
        policy.set(
            ACCESS_TOKEN_COOKIE,
            &tokens.access_token.0,
            tokens.issued_at,
            tokens.access_token_expires_at,
        ),
        policy.set(
            REFRESH_TOKEN_COOKIE,
            &tokens.refresh_token.0,
            tokens.issued_at,
            tokens.refresh_token_expires_at,
        ),
    ]
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

pub async fn register(
    body: RegisterRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let signup_input = SignupInput {
        username: body.username,
        email: body.email,
        full_name: body.full_name,
        password: body.password,
    };
    let profile = auth_service
        .signup(signup_input)
        .await
        .map_err(ApiFailure::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::ok(profile)),
        StatusCode::CREATED,
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub auth_tokens: AuthTokens,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: CookiePolicy,
) -> Result<impl warp::Reply, warp::Rejection> {
    let credential_key = CredentialKey::from_parts(body.username.as_deref(), body.email.as_deref())
        .ok_or_else(|| ApiFailure::invalid_input("Username or email is required"))
        .map_err(reject::custom)?;

    let login_input = LoginInput {
        credential_key,
        password: body.password,
    };
    let login_result = auth_service
        .authenticate(login_input)
        .await
        .map_err(ApiFailure::from)
        .map_err(reject::custom)?;

    let cookies = token_cookies(cookie_policy, &login_result.tokens);
    let login_response = LoginResponse {
        user: login_result.user,
        auth_tokens: login_result.tokens,
    };
    reply_with_cookies(&login_response, &cookies)
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(alias = "refreshToken")]
    pub refresh_token: Option<String>,
}

/// The refresh token may come from the cookie or, failing that, the JSON body.
pub async fn refresh_token(
    cookie: Option<String>,
    body: Bytes,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: CookiePolicy,
) -> Result<impl warp::Reply, warp::Rejection> {
    let from_body = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .map_err(|e| ApiFailure::invalid_input(e.to_string()))
            .map_err(reject::custom)?
    };
    let presented = cookie
        .filter(|token| !token.is_empty())
        .or(from_body.refresh_token)
        .unwrap_or_default();

    let tokens = auth_service
        .refresh(&presented)
        .await
        .map_err(ApiFailure::refresh)
        .map_err(reject::custom)?;

    let cookies = token_cookies(cookie_policy, &tokens);
    reply_with_cookies(&tokens, &cookies)
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {}

pub async fn logout(
    user_id: UserId,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: CookiePolicy,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service
        .logout(user_id)
        .await
        .map_err(ApiFailure::from)
        .map_err(reject::custom)?;

    let cookies = [
        cookie_policy.clear(ACCESS_TOKEN_COOKIE),
        cookie_policy.clear(REFRESH_TOKEN_COOKIE),
    ];
    reply_with_cookies(&LogoutResponse {}, &cookies)
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordResponse {}

pub async fn change_password(
    body: ChangePasswordRequest,
    user_id: UserId,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = ChangePasswordInput {
        old_password: body.old_password,
        new_password: body.new_password,
    };
    auth_service
        .change_password(user_id, input)
        .await
        .map_err(ApiFailure::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(ChangePasswordResponse {})))
}

pub async fn current_user(
    user_id: UserId,
    user_service: Arc<dyn UserService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let profile = user_service
        .profile(user_id)
        .await
        .map_err(ApiFailure::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(profile)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub email: String,
    pub full_name: String,
}

pub async fn update_account(
    body: UpdateAccountRequest,
    user_id: UserId,
    user_service: Arc<dyn UserService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = UpdateAccountInput {
        email: body.email,
        full_name: body.full_name,
    };
    let profile = user_service
        .update_account(user_id, input)
        .await
        .map_err(ApiFailure::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(profile)))
}
