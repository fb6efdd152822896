//! # ring-client
//!
//! RPC client for the nodes of a Chord ring under test.
//!
//! ## Features
//!
//! - **NodeHandle**: one timeout-bounded call per operation against one node,
//!   with a boolean/optional facade that never fails across its boundary
//! - **Transport Abstraction**: pluggable transport layer (HTTP, simulated)
//! - **Simulated Cluster**: in-process ring model for tests and dry runs
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ring_client::{HttpTransport, NodeHandle};
//!
//! let transport = Arc::new(HttpTransport::new());
//! let node = NodeHandle::new("c1-3:50123".parse()?, transport);
//!
//! if node.ping().await {
//!     let info = node.get_info().await;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod handle;
pub mod transport;

pub use handle::{NodeHandle, RpcError, RpcTimeouts};
pub use transport::{
    HttpTransport, Method, RpcRequest, RpcResponse, SimCluster, Transport, TransportError,
};
