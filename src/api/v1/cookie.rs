use chrono::{DateTime, Utc};
use warp::http::HeaderValue;
use warp::http::header::SET_COOKIE;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Attributes shared by both token cookies. `secure` is only turned off for
/// plain-HTTP development.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
}

impl CookiePolicy {
    fn attributes(&self) -> &'static str {
        if self.secure {
            "Path=/; HttpOnly; Secure; SameSite=Strict"
        } else {
            "Path=/; HttpOnly; SameSite=Strict"
        }
    }

    /// `Max-Age` is the token's own lifetime, measured from when it was issued.
    pub fn set(
        &self,
        name: &str,
        value: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> String {
        let max_age = (expires_at - issued_at).num_seconds().max(0);
        format!("{}={}; {}; Max-Age={}", name, value, self.attributes(), max_age)
    }

    pub fn clear(&self, name: &str) -> String {
        format!("{}=; {}; Max-Age=0", name, self.attributes())
    }
}

/// Appends one `Set-Cookie` header per cookie; `with_header` would keep only the last.
pub fn append_cookies(
    mut response: warp::reply::Response,
    cookies: &[String],
) -> Result<warp::reply::Response, warp::http::header::InvalidHeaderValue> {
    for cookie in cookies {
        response
            .headers_mut()
            .append(SET_COOKIE, HeaderValue::from_str(cookie)?);
    }
    Ok(response)
}
