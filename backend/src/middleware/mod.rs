//! Request middleware

pub mod auth;
pub mod body;

pub use auth::{auth_middleware, AuthUser, CurrentUser};
pub use body::OptionalJson;
