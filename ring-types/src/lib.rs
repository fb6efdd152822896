//! # ring-types
//!
//! Wire format types shared by every chordprobe crate.
//!
//! - [`NodeAddress`] - `host:port` identity of one cluster member
//! - [`NodeInfo`] - topology snapshot returned by `GET /node-info`
//! - [`ReconfigureRequest`] - body of `POST /reconfigure`
//! - [`AddressError`] - address parsing failures

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod messages;

pub use address::NodeAddress;
pub use error::AddressError;
pub use messages::{NodeInfo, ReconfigureRequest};
