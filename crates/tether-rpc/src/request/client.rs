//! Remote executor backed by the request service

use async_trait::async_trait;

use tether_rest::{ApiRequest, ApiResponse, RemoteError, RemoteRequestExecutor};

use crate::error::RpcError;
use crate::messages::{RemoteRequest, RemoteResponse};

/// Plugs the request service into the REST pipeline's executor seam
#[derive(Debug)]
pub struct HttpRequestExecutor {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRequestExecutor {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl RemoteRequestExecutor for HttpRequestExecutor {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, RemoteError> {
        let url = format!("{}/request/execute", self.base_url);
        let relay = RemoteRequest {
            method: request.route.method.clone(),
            url: request.route.url.clone(),
            body: request.body.clone(),
        };

        let response = self
            .http
            .post(&url)
            .json(&relay)
            .send()
            .await
            .map_err(|err| RemoteError::from(RpcError::from_transport(&err)))?;

        if !response.status().is_success() {
            return Err(RemoteError::Failed(format!(
                "request service answered {}",
                response.status()
            )));
        }

        let relayed = response
            .json::<RemoteResponse>()
            .await
            .map_err(|err| RemoteError::Failed(err.to_string()))?;

        Ok(relayed.into())
    }
}
