pub mod auth;

pub use auth::{admin_session_middleware, require_bearer};
