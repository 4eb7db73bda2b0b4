use super::cookie::*;
use super::error::*;
use super::handler;
use crate::application_port::AuthService;
use crate::domain_model::UserId;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let cookie_policy = CookiePolicy {
        secure: server.secure_cookies,
    };

    let register = warp::path("register")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::register);

    let login = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and(with_policy(cookie_policy))
        .and_then(handler::login);

    let refresh_token = warp::path("refresh-token")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::cookie::optional::<String>(REFRESH_TOKEN_COOKIE))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with(server.auth_service.clone()))
        .and(with_policy(cookie_policy))
        .and_then(handler::refresh_token);

    let logout = warp::path("logout")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and(with_policy(cookie_policy))
        .and_then(handler::logout);

    let change_password = warp::path("change-password")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::change_password);

    let current_user = warp::path("current-user")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.user_service.clone()))
        .and_then(handler::current_user);

    let update_account = warp::path("update-account")
        .and(warp::path::end())
        .and(warp::patch())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.user_service.clone()))
        .and_then(handler::update_account);

    warp::path("users").and(
        register
            .or(login)
            .or(refresh_token)
            .or(logout)
            .or(change_password)
            .or(current_user)
            .or(update_account),
    )
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_policy(
    policy: CookiePolicy,
) -> impl Filter<Extract = (CookiePolicy,), Error = Infallible> + Clone {
    warp::any().map(move || policy)
}

/// Accepts the access token from its cookie or from `Authorization: Bearer`.
/// The cookie wins when both are present.
fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (UserId,), Error = warp::Rejection> + Clone {
    warp::cookie::optional::<String>(ACCESS_TOKEN_COOKIE)
        .and(warp::header::optional::<String>("authorization"))
        .and_then(move |cookie: Option<String>, header: Option<String>| {
            let auth_service = auth_service.clone();
            async move {
                let token = cookie.filter(|token| !token.is_empty()).or_else(|| {
                    header.and_then(|value| value.strip_prefix("Bearer ").map(str::to_string))
                });
                let Some(token) = token else {
                    return Err(reject::custom(ApiFailure::from(ApiErrorCode::MissingToken)));
                };

                let user_id = auth_service
                    .authorize(token.trim())
                    .await
                    .map_err(ApiFailure::from)
                    .map_err(reject::custom)?;
                Ok::<UserId, warp::Rejection>(user_id)
            }
        })
}
