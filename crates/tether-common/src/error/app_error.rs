//! Application error type
//!
//! Top-level taxonomy for failures that reach the operator. Component crates
//! define their own error enums and convert into this at the app boundary.

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad credentials; terminal, never retried
    #[error("Authentication failed - check the configured token")]
    AuthenticationFailed,

    /// Shard id/count the service refuses to accept; terminal
    #[error("Invalid shard configuration: {0}")]
    InvalidShardConfig(String),

    /// Privileged intents the account is not approved for; terminal
    #[error("Disallowed gateway intents: {0}")]
    DisallowedIntents(String),

    /// A remote coordination service could not be reached and fallback was
    /// not permitted
    #[error("Coordination service unreachable: {0}")]
    CoordinationUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Terminal errors stop the client; everything else is retried or
    /// resolved by waiting
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::InvalidShardConfig(_)
                | Self::DisallowedIntents(_)
                | Self::Config(_)
        )
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
