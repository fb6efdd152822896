//! Error types for ring-types.

use thiserror::Error;

/// Errors produced while parsing a `host:port` address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// No `:` separator between host and port
    #[error("missing port in address: {0}")]
    MissingPort(String),

    /// Host part is empty
    #[error("empty host in address: {0}")]
    EmptyHost(String),

    /// Port is not a valid u16
    #[error("invalid port in address: {0}")]
    InvalidPort(String),
}
