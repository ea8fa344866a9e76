//! Authentication: password hashing, session tokens, login lockout and the
//! middleware that guards protected routes.

pub mod guard;
pub mod handlers;
pub mod middleware;
pub mod password;
mod service;
pub mod token;

pub use guard::{LoginGuard, LoginVerdict};
pub use password::{BcryptHasher, HashError, PasswordHasher};
pub use service::AuthService;
pub use token::{Claims, TokenService};
