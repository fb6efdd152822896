//! NodeHandle - the RPC facade for one cluster member.
//!
//! Every operation issues exactly one timeout-bounded request through a
//! [`Transport`]. Two layers are offered:
//!
//! - `try_*` methods return `Result<_, RpcError>` with the structured cause
//!   (connection, timeout, status, decode)
//! - the plain methods (`join`, `ping`, `get_info`, ...) collapse every
//!   failure to `false` / `None` and log the cause with the node address
//!
//! Orchestration code uses the plain layer so its control flow stays
//! uniform; diagnostics (health checks) use the `try_*` layer.

use ring_types::{NodeAddress, NodeInfo, ReconfigureRequest};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::transport::{RpcRequest, RpcResponse, Transport, TransportError};

/// RPC errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Transport error (refused, timeout, request failure).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Node answered with a non-2xx status.
    #[error("{op} returned status {status}")]
    Status {
        /// Operation name.
        op: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// Response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Per-call timeouts used by a [`NodeHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcTimeouts {
    /// join, leave, reset, sim-crash, sim-recover, reconfigure.
    pub control: Duration,
    /// ping and node-info.
    pub probe: Duration,
    /// get and put.
    pub data: Duration,
}

impl Default for RpcTimeouts {
    fn default() -> Self {
        Self {
            control: Duration::from_secs(10),
            probe: Duration::from_secs(5),
            data: Duration::from_secs(10),
        }
    }
}

/// Typed, timeout-bounded client for one node.
///
/// Holds no state beyond its address, shared transport and timeouts, so
/// cloning is cheap and handles can be rebuilt for any address on demand.
pub struct NodeHandle<T: Transport> {
    address: NodeAddress,
    transport: Arc<T>,
    timeouts: RpcTimeouts,
}

impl<T: Transport> Clone for NodeHandle<T> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            transport: Arc::clone(&self.transport),
            timeouts: self.timeouts,
        }
    }
}

impl<T: Transport> std::fmt::Debug for NodeHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("address", &self.address)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> NodeHandle<T> {
    /// Create a handle with default timeouts.
    pub fn new(address: NodeAddress, transport: Arc<T>) -> Self {
        Self {
            address,
            transport,
            timeouts: RpcTimeouts::default(),
        }
    }

    /// Override the per-call timeouts.
    pub fn with_timeouts(mut self, timeouts: RpcTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Address of the node.
    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    /// Timeouts in use.
    pub fn timeouts(&self) -> RpcTimeouts {
        self.timeouts
    }

    /// Shared transport (for building handles to other nodes).
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Handle for another address sharing this handle's transport and timeouts.
    pub fn sibling(&self, address: NodeAddress) -> Self {
        Self {
            address,
            transport: Arc::clone(&self.transport),
            timeouts: self.timeouts,
        }
    }

    async fn send(&self, request: RpcRequest, timeout: Duration) -> Result<RpcResponse, RpcError> {
        let response = self.transport.call(&self.address, &request, timeout).await?;
        if !response.is_success() {
            return Err(RpcError::Status {
                op: request.name(),
                status: response.status,
            });
        }
        Ok(response)
    }

    // ========================================================================
    // Structured layer
    // ========================================================================

    /// Ask the node to join the ring through `seed`.
    pub async fn try_join(&self, seed: &NodeAddress) -> Result<(), RpcError> {
        let request = RpcRequest::Join { seed: seed.clone() };
        self.send(request, self.timeouts.control).await.map(drop)
    }

    /// Ask the node to leave the ring gracefully.
    pub async fn try_leave(&self) -> Result<(), RpcError> {
        self.send(RpcRequest::Leave, self.timeouts.control).await.map(drop)
    }

    /// Force the node back to a fresh single-node ring.
    pub async fn try_reset(&self) -> Result<(), RpcError> {
        self.send(RpcRequest::Reset, self.timeouts.control).await.map(drop)
    }

    /// Turn on simulated crash mode.
    pub async fn try_simulate_crash(&self) -> Result<(), RpcError> {
        self.send(RpcRequest::SimCrash, self.timeouts.control).await.map(drop)
    }

    /// Turn off simulated crash mode.
    pub async fn try_simulate_recover(&self) -> Result<(), RpcError> {
        self.send(RpcRequest::SimRecover, self.timeouts.control).await.map(drop)
    }

    /// Fetch and decode the node's topology snapshot.
    pub async fn try_get_info(&self) -> Result<NodeInfo, RpcError> {
        let response = self.send(RpcRequest::NodeInfo, self.timeouts.probe).await?;
        serde_json::from_slice(&response.body).map_err(|e| RpcError::Decode(e.to_string()))
    }

    /// Liveness probe.
    pub async fn try_ping(&self) -> Result<(), RpcError> {
        self.send(RpcRequest::Ping, self.timeouts.probe).await.map(drop)
    }

    /// Store a value.
    pub async fn try_put(&self, key: &str, value: &str) -> Result<(), RpcError> {
        let request = RpcRequest::Put {
            key: key.to_string(),
            value: value.to_string(),
        };
        self.send(request, self.timeouts.data).await.map(drop)
    }

    /// Read a value; `Ok(None)` when the node answers 404.
    pub async fn try_get(&self, key: &str) -> Result<Option<String>, RpcError> {
        let request = RpcRequest::Get {
            key: key.to_string(),
        };
        match self.send(request, self.timeouts.data).await {
            Ok(response) => String::from_utf8(response.body)
                .map(Some)
                .map_err(|e| RpcError::Decode(e.to_string())),
            Err(RpcError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Push new topology parameters to the node.
    pub async fn try_reconfigure(&self, request: &ReconfigureRequest) -> Result<(), RpcError> {
        self.send(RpcRequest::Reconfigure(request.clone()), self.timeouts.control)
            .await
            .map(drop)
    }

    // ========================================================================
    // Boolean facade
    // ========================================================================

    /// Join through `seed`. Does not wait for the ring to converge.
    pub async fn join(&self, seed: &NodeAddress) -> bool {
        self.report("join", self.try_join(seed).await)
    }

    /// Leave gracefully.
    pub async fn leave(&self) -> bool {
        self.report("leave", self.try_leave().await)
    }

    /// Reset to a fresh single-node ring.
    pub async fn reset(&self) -> bool {
        self.report("reset", self.try_reset().await)
    }

    /// Enter simulated crash mode.
    pub async fn simulate_crash(&self) -> bool {
        self.report("sim-crash", self.try_simulate_crash().await)
    }

    /// Leave simulated crash mode.
    pub async fn simulate_recover(&self) -> bool {
        self.report("sim-recover", self.try_simulate_recover().await)
    }

    /// Topology snapshot, or `None` on any failure.
    pub async fn get_info(&self) -> Option<NodeInfo> {
        match self.try_get_info().await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::debug!("node-info from {} failed: {}", self.address, e);
                None
            }
        }
    }

    /// True only if the node answered the liveness probe with 2xx.
    pub async fn ping(&self) -> bool {
        match self.try_ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("ping {} failed: {}", self.address, e);
                false
            }
        }
    }

    /// Store a value.
    pub async fn put(&self, key: &str, value: &str) -> bool {
        self.report("put", self.try_put(key, value).await)
    }

    /// Read a value as `(found, value)`; `(false, "")` when absent or failed.
    pub async fn get(&self, key: &str) -> (bool, String) {
        match self.try_get(key).await {
            Ok(Some(value)) => (true, value),
            Ok(None) => (false, String::new()),
            Err(e) => {
                tracing::warn!("get {} from {} failed: {}", key, self.address, e);
                (false, String::new())
            }
        }
    }

    /// Push new topology parameters.
    pub async fn reconfigure(&self, request: &ReconfigureRequest) -> bool {
        self.report("reconfigure", self.try_reconfigure(request).await)
    }

    fn report(&self, op: &str, result: Result<(), RpcError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{} on {} failed: {}", op, self.address, e);
                false
            }
        }
    }
}
