//! Authentication and authorization

mod guards;
mod middleware;

pub use guards::{authorize, Action};
pub use middleware::{require_auth, AuthUser};
