//! Error types for the core module

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Authentication error
    #[error("Authentication error: {0}")]
    AuthError(#[from] graphmail_auth::AuthError),

    /// Graph API error other than authentication
    #[error("Graph error: {0}")]
    GraphError(String),

    /// Missing or malformed setting
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request failed structural validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        CoreError::DatabaseError(e.to_string())
    }
}

impl From<graphmail_graph::GraphError> for CoreError {
    fn from(e: graphmail_graph::GraphError) -> Self {
        match e {
            graphmail_graph::GraphError::Auth(auth) => CoreError::AuthError(auth),
            other => CoreError::GraphError(other.to_string()),
        }
    }
}
