//! REST client errors

use thiserror::Error;

use crate::remote::RemoteError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request expired in queue after {0} ms")]
    QueueTimeout(u64),

    #[error("request queue closed before the request was sent")]
    QueueClosed,

    #[error("coordination service error: {0}")]
    Remote(#[from] RemoteError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
