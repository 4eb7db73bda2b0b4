mod cookie;
mod error;
mod handler;
mod router;

pub use cookie::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
pub use error::recover_error;
pub use router::routes;
