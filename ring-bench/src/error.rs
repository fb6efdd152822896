//! Error types for chordprobe-bench.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that abort a benchmark.
///
/// Scenario failures (a ring that does not converge, a dead node during
/// setup) are not errors: they are recorded as unsuccessful
/// [`RunResult`](crate::RunResult)s and the run continues.
#[derive(Debug, Error)]
pub enum BenchError {
    /// A value read back differs from the value written.
    #[error("data mismatch for key {key}: expected {expected:?}, got {actual:?}")]
    DataIntegrity {
        /// Storage key.
        key: String,
        /// Value that was written.
        expected: String,
        /// Value that was read back (`None` if absent or unreadable).
        actual: Option<String>,
    },

    /// The ring required for a benchmark could not be built.
    #[error("ring setup failed: {0}")]
    Setup(String),

    /// Fewer nodes supplied than the benchmark needs.
    #[error("not enough nodes: need {needed}, have {available}")]
    InsufficientNodes {
        /// Nodes required.
        needed: usize,
        /// Nodes supplied.
        available: usize,
    },

    /// A stored result record violates the result invariants.
    #[error("invalid result record: {0}")]
    InvalidRecord(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Results file could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
