mod auth_session_store_memory;
mod user_repo_memory;

pub use auth_session_store_memory::*;
pub use user_repo_memory::*;
