//! Error types for the auth module

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur while obtaining or renewing tokens
#[derive(Debug, Error)]
pub enum AuthError {
    /// Neither a usable access token nor a refresh token is held
    #[error("no refresh token available; re-authentication required")]
    NoRefreshToken,

    /// The token endpoint refused the refresh grant
    #[error("refresh failed; re-authentication required: {body}")]
    RefreshRejected {
        /// Raw error payload returned by the provider
        body: String,
    },

    /// The token endpoint could not be reached
    #[error("Token endpoint request failed: {0}")]
    Transport(String),

    /// The authorization code exchange failed
    #[error("Authorization code exchange failed: {0}")]
    Bootstrap(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Whether an operator has to run the login flow again before any
    /// further token can be issued.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            AuthError::NoRefreshToken | AuthError::RefreshRejected { .. } | AuthError::Bootstrap(_)
        )
    }

    /// Transport failures may succeed when the caller tries again later.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Transport(_))
    }
}
