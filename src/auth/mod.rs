// Password hashing, access tokens and the request extractors built on them

mod extract;
mod password;
mod token;

pub use extract::{CurrentUser, MaybeUser};
pub use password::{hash_password, verify_password};
pub use token::JwtKeys;

/// Errors raised while authenticating a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No Authorization header or bearer token present.
    #[error("missing authentication token")]
    MissingToken,

    /// Signature, format or claim check failed.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token has expired")]
    Expired,

    /// Token is well-formed but its subject no longer exists.
    #[error("unknown user")]
    UnknownUser,

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}
