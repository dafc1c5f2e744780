mod access;
mod session;
pub mod middleware;

pub use access::{allowed, Action, Role};
pub use middleware::{auth_middleware, SESSION_COOKIE};
pub use session::{Session, SessionStore};
