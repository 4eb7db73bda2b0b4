use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let failure = if let Some(failure) = err.find::<ApiFailure>() {
        failure.clone()
    } else if err.is_not_found() {
        ApiFailure::from(ApiErrorCode::NotFound)
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiFailure::invalid_input(e.to_string())
    } else if err.find::<reject::PayloadTooLarge>().is_some()
        || err.find::<reject::UnsupportedMediaType>().is_some()
        || err.find::<reject::LengthRequired>().is_some()
    {
        ApiFailure::invalid_input("Request body is not acceptable")
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiFailure::from(ApiErrorCode::MethodNotAllowed)
    } else {
        ApiFailure::internal(format!("unhandled rejection: {:?}", err))
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(
        failure.code.clone(),
        failure.message,
    ));
    Ok(warp::reply::with_status(json, failure.code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid input")]
    InvalidInput,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("User with same credentials already exists")]
    UserExists,
    #[error("Unauthorized request")]
    MissingToken,
    #[error("Invalid access token")]
    InvalidToken,
    #[error("Access token expired")]
    TokenExpired,
    #[error("Invalid refresh token")]
    InvalidRefreshToken,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::MissingToken
            | ApiErrorCode::InvalidToken
            | ApiErrorCode::TokenExpired
            | ApiErrorCode::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::UserExists => StatusCode::CONFLICT,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The rejection every handler raises: a code plus the message shown to the client.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiFailure {
    pub fn invalid_input(message: impl Into<String>) -> ApiFailure {
        ApiFailure {
            code: ApiErrorCode::InvalidInput,
            message: message.into(),
        }
    }

    /// Logs the detail; the client only ever sees "Internal error".
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiFailure {
        warn!("Internal error: {}", error);
        ApiFailure::from(ApiErrorCode::InternalError)
    }

    /// Refresh failures all look the same to the caller, whichever check failed.
    pub fn refresh(error: AuthError) -> ApiFailure {
        match error {
            AuthError::MissingToken => ApiFailure::from(ApiErrorCode::MissingToken),
            AuthError::MalformedToken
            | AuthError::ExpiredToken
            | AuthError::TokenTypeMismatch
            | AuthError::SessionMismatch
            | AuthError::UserNotFound
            | AuthError::InvalidCredential => ApiFailure::from(ApiErrorCode::InvalidRefreshToken),
            other => ApiFailure::from(other),
        }
    }
}

impl reject::Reject for ApiFailure {}

impl From<ApiErrorCode> for ApiFailure {
    fn from(code: ApiErrorCode) -> Self {
        ApiFailure {
            message: code.to_string(),
            code,
        }
    }
}

impl From<AuthError> for ApiFailure {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredential => ApiFailure::from(ApiErrorCode::InvalidCredentials),
            AuthError::MissingToken => ApiFailure::from(ApiErrorCode::MissingToken),
            AuthError::MalformedToken
            | AuthError::TokenTypeMismatch
            | AuthError::SessionMismatch
            | AuthError::UserNotFound => ApiFailure::from(ApiErrorCode::InvalidToken),
            AuthError::ExpiredToken => ApiFailure::from(ApiErrorCode::TokenExpired),
            AuthError::InvalidInput(message) => ApiFailure::invalid_input(message),
            AuthError::UserExists => ApiFailure::from(ApiErrorCode::UserExists),
            AuthError::ConfigurationFault(e) => ApiFailure::internal(e),
            AuthError::Store(e) => ApiFailure::internal(e),
            AuthError::InternalError(e) => ApiFailure::internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_and_wrong_password_render_identically() {
        // both arrive as InvalidCredential; make sure nothing else maps near it
        let failure = ApiFailure::from(AuthError::InvalidCredential);
        assert_eq!(failure.code, ApiErrorCode::InvalidCredentials);
        assert_eq!(failure.message, "Invalid username or password");
        assert_eq!(failure.code.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn refresh_failures_collapse_to_one_message() {
        let errors = [
            AuthError::MalformedToken,
            AuthError::ExpiredToken,
            AuthError::TokenTypeMismatch,
            AuthError::SessionMismatch,
            AuthError::UserNotFound,
        ];
        for error in errors {
            let failure = ApiFailure::refresh(error);
            assert_eq!(failure.code, ApiErrorCode::InvalidRefreshToken);
            assert_eq!(failure.message, "Invalid refresh token");
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let failure = ApiFailure::from(AuthError::Store("connection refused".to_string()));
        assert_eq!(failure.code.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failure.message, "Internal error");
    }
}
