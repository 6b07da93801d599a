//! Coordination service errors

use thiserror::Error;

use tether_rest::RemoteError;

pub type RpcResult<T> = Result<T, RpcError>;

#[derive(Debug, Error)]
pub enum RpcError {
    /// The service could not be reached at all. Callers decide per lock
    /// or per policy whether to continue without coordination.
    #[error("service unreachable: {0}")]
    Unavailable(String),

    #[error("service returned an error: {0}")]
    Failed(String),

    #[error("failed to bind service listener: {0}")]
    Bind(#[from] std::io::Error),
}

impl RpcError {
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Classifies a transport-level failure: connect and timeout errors
    /// mean the service is unreachable, anything else is a hard failure.
    #[must_use]
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Failed(err.to_string())
        }
    }
}

impl From<RpcError> for RemoteError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Unavailable(msg) => Self::Unavailable(msg),
            other => Self::Failed(other.to_string()),
        }
    }
}
