//! Error types for credential and session operations.

use tessera_store::StoreError;
use thiserror::Error;

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors returned by registration, login and token verification.
#[derive(Error, Debug)]
pub enum AuthError {
    /// A user with this username already exists.
    #[error("username already exists: {0}")]
    DuplicateUsername(String),

    /// Unknown username or wrong password.
    ///
    /// The two causes are deliberately indistinguishable.
    #[error("invalid username or password")]
    AuthenticationFailure,

    /// The token's expiry has passed.
    #[error("token has expired")]
    TokenExpired,

    /// The token is malformed or its signature does not match.
    #[error("invalid token: {0}")]
    TokenInvalid(String),

    /// The token is valid but its subject no longer exists.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// A required input was empty or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Signing a token failed.
    #[error("token signing failed: {0}")]
    Signing(String),

    /// A configuration value could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The document store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Returns true if the caller is at fault (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AuthError::DuplicateUsername(_)
                | AuthError::AuthenticationFailure
                | AuthError::TokenExpired
                | AuthError::TokenInvalid(_)
                | AuthError::UserNotFound(_)
                | AuthError::InvalidInput(_)
        )
    }

    /// Returns true if the service is at fault (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AuthError::Signing(_) | AuthError::Config(_) | AuthError::Store(_)
        )
    }
}
