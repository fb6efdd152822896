//! Transport abstraction for node RPCs.
//!
//! This module provides a pluggable transport layer that abstracts how a
//! request reaches a node (plain HTTP, or an in-process simulated cluster
//! for testing).
//!
//! # Design
//!
//! The transport is request/response and stateless per call:
//! - [`RpcRequest`] names one operation of the node API
//! - [`Transport::call`] delivers it to one address within a timeout
//! - [`RpcResponse`] carries the raw status and body
//!
//! Status interpretation (2xx vs. failure) and body decoding belong to
//! [`NodeHandle`](crate::NodeHandle), not to the transport.
//!
//! # Example
//!
//! ```ignore
//! let transport = SimCluster::new(4);
//! let response = transport
//!     .call(&addr, &RpcRequest::Ping, Duration::from_secs(5))
//!     .await?;
//! assert!(response.is_success());
//! ```

mod http;
mod sim;

pub use http::HttpTransport;
pub use sim::SimCluster;

use async_trait::async_trait;
use ring_types::{NodeAddress, ReconfigureRequest};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, reset, or name resolution failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// No response within the per-call timeout.
    #[error("request timed out")]
    Timeout,

    /// Any other request failure (body read, protocol error).
    #[error("request failed: {0}")]
    Request(String),
}

/// HTTP method used by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// PUT
    Put,
    /// POST
    Post,
}

/// One operation of the node API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcRequest {
    /// `GET /helloworld`
    Ping,
    /// `GET /node-info`
    NodeInfo,
    /// `POST /join?nprime={seed}`
    Join {
        /// Existing ring member to join through.
        seed: NodeAddress,
    },
    /// `POST /leave`
    Leave,
    /// `POST /reset`
    Reset,
    /// `POST /sim-crash`
    SimCrash,
    /// `POST /sim-recover`
    SimRecover,
    /// `GET /storage/{key}`
    Get {
        /// Storage key.
        key: String,
    },
    /// `PUT /storage/{key}` with the raw value as body
    Put {
        /// Storage key.
        key: String,
        /// Value, sent as UTF-8 body.
        value: String,
    },
    /// `POST /reconfigure` with a JSON body
    Reconfigure(ReconfigureRequest),
}

impl RpcRequest {
    /// Short operation name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            RpcRequest::Ping => "ping",
            RpcRequest::NodeInfo => "node-info",
            RpcRequest::Join { .. } => "join",
            RpcRequest::Leave => "leave",
            RpcRequest::Reset => "reset",
            RpcRequest::SimCrash => "sim-crash",
            RpcRequest::SimRecover => "sim-recover",
            RpcRequest::Get { .. } => "get",
            RpcRequest::Put { .. } => "put",
            RpcRequest::Reconfigure(_) => "reconfigure",
        }
    }

    /// HTTP method for this operation.
    pub fn method(&self) -> Method {
        match self {
            RpcRequest::Ping | RpcRequest::NodeInfo | RpcRequest::Get { .. } => Method::Get,
            RpcRequest::Put { .. } => Method::Put,
            _ => Method::Post,
        }
    }

    /// Path and query string for this operation.
    pub fn path(&self) -> String {
        match self {
            RpcRequest::Ping => "/helloworld".into(),
            RpcRequest::NodeInfo => "/node-info".into(),
            RpcRequest::Join { seed } => format!("/join?nprime={}", seed),
            RpcRequest::Leave => "/leave".into(),
            RpcRequest::Reset => "/reset".into(),
            RpcRequest::SimCrash => "/sim-crash".into(),
            RpcRequest::SimRecover => "/sim-recover".into(),
            RpcRequest::Get { key } | RpcRequest::Put { key, .. } => format!("/storage/{}", key),
            RpcRequest::Reconfigure(_) => "/reconfigure".into(),
        }
    }
}

/// Raw response from a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl RpcResponse {
    /// Build a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8 (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport trait for delivering one request to one node.
///
/// Implementations must bound every call by `timeout` and report
/// connection-level problems as [`TransportError`]; a response with any
/// status code is `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `request` to `target` and wait at most `timeout` for the reply.
    async fn call(
        &self,
        target: &NodeAddress,
        request: &RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn call(
        &self,
        target: &NodeAddress,
        request: &RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse, TransportError> {
        (**self).call(target, request, timeout).await
    }
}
