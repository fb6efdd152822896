//! Plain HTTP transport backed by `reqwest`.

use async_trait::async_trait;
use ring_types::NodeAddress;
use std::time::Duration;

use super::{Method, RpcRequest, RpcResponse, Transport, TransportError};

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::ConnectionFailed(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Transport that speaks the node API over plain HTTP.
///
/// One connection pool is shared by every [`NodeHandle`](crate::NodeHandle)
/// built on the same transport.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport around a preconfigured client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Full URL for a request to `target`.
    pub fn url(target: &NodeAddress, request: &RpcRequest) -> String {
        format!("{}{}", target.base_url(), request.path())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        target: &NodeAddress,
        request: &RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse, TransportError> {
        let url = Self::url(target, request);
        let builder = match request.method() {
            Method::Get => self.http.get(&url),
            Method::Put => self.http.put(&url),
            Method::Post => self.http.post(&url),
        };
        let builder = match request {
            RpcRequest::Put { value, .. } => builder.body(value.clone()),
            RpcRequest::Reconfigure(body) => builder.json(body),
            _ => builder,
        };

        let response = builder.timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(RpcResponse::new(status, body.to_vec()))
    }
}
