//! Configuration loading for chordprobe.
//!
//! Configuration is loaded from an optional TOML file. Every section and
//! every field may be omitted; missing values fall back to the defaults
//! documented on each field.

use ring_client::RpcTimeouts;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BenchConfig {
    /// Per-call RPC timeouts.
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Ring consistency oracle.
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Growth, shrink and crash experiments.
    #[serde(default)]
    pub scenarios: ScenarioConfig,
    /// Throughput benchmark.
    #[serde(default)]
    pub throughput: ThroughputConfig,
}

/// RPC timeout configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// Timeout for join/leave/reset/crash/recover/reconfigure in seconds (default: 10).
    #[serde(default = "default_control_timeout_secs")]
    pub control_timeout_secs: u64,
    /// Timeout for ping and node-info in seconds (default: 5).
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Timeout for storage get/put in seconds (default: 10).
    #[serde(default = "default_data_timeout_secs")]
    pub data_timeout_secs: u64,
}

/// Oracle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Consecutive consistent checks required to call a ring stable (default: 5).
    #[serde(default = "default_required_checks")]
    pub required_checks: usize,
    /// Maximum checks per stability probe (default: twice `required_checks`).
    pub max_attempts: Option<usize>,
    /// Pause after each check in milliseconds (default: 500).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Pause between failed stability probes in milliseconds (default: 200).
    #[serde(default = "default_retry_pause_ms")]
    pub retry_pause_ms: u64,
    /// Also require every node's predecessor to match the traversal (default: false).
    #[serde(default)]
    pub require_predecessor: bool,
}

/// Experiment configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    /// Repetitions per scenario instance (default: 3).
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,
    /// Ring sizes for the growth experiment (default: 2, 4, 8, 16, 32).
    #[serde(default = "default_growth_sizes")]
    pub growth_sizes: Vec<usize>,
    /// `[start, end]` pairs for the shrink experiment (default: 32→16, 16→8, 8→4, 4→2).
    #[serde(default = "default_shrink_pairs")]
    pub shrink_pairs: Vec<(usize, usize)>,
    /// Ring size for the crash experiment (default: 32).
    #[serde(default = "default_crash_network_size")]
    pub crash_network_size: usize,
    /// Upper bound on simultaneous crashes, further capped at half the ring (default: 16).
    #[serde(default = "default_max_crash_burst")]
    pub max_crash_burst: usize,
    /// Convergence timeout after a topology change in seconds (default: 120).
    #[serde(default = "default_stabilization_timeout_secs")]
    pub stabilization_timeout_secs: u64,
    /// Timeout for building the initial ring in seconds (default: 60).
    #[serde(default = "default_setup_timeout_secs")]
    pub setup_timeout_secs: u64,
    /// Convergence timeout after a crash burst in seconds (default: 120).
    #[serde(default = "default_crash_timeout_secs")]
    pub crash_timeout_secs: u64,
    /// Pause after resetting the pool in milliseconds (default: 500).
    #[serde(default = "default_settle_after_reset_ms")]
    pub settle_after_reset_ms: u64,
    /// Pause after a join burst in milliseconds (default: 500).
    #[serde(default = "default_settle_after_join_ms")]
    pub settle_after_join_ms: u64,
    /// Pause after a leave burst in milliseconds (default: 300).
    #[serde(default = "default_settle_after_leave_ms")]
    pub settle_after_leave_ms: u64,
    /// Maximum RPCs in flight during a burst (default: 64).
    #[serde(default = "default_burst_concurrency")]
    pub burst_concurrency: usize,
}

/// Throughput benchmark configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ThroughputConfig {
    /// Ring size (default: 32).
    #[serde(default = "default_throughput_network_size")]
    pub network_size: usize,
    /// Key/value pairs written and read back per repetition (default: 1000).
    #[serde(default = "default_pairs")]
    pub pairs: usize,
    /// Repetitions (default: 3).
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,
    /// Length of generated values (default: 20).
    #[serde(default = "default_value_length")]
    pub value_length: usize,
    /// Pause between sequential joins in milliseconds (default: 500).
    #[serde(default = "default_join_interval_ms")]
    pub join_interval_ms: u64,
    /// Timeout for the ring to stabilize before measuring in seconds (default: 60).
    #[serde(default = "default_setup_timeout_secs")]
    pub setup_timeout_secs: u64,
}

// Default value functions
fn default_control_timeout_secs() -> u64 {
    10
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_data_timeout_secs() -> u64 {
    10
}

fn default_required_checks() -> usize {
    5
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_retry_pause_ms() -> u64 {
    200
}

fn default_repetitions() -> usize {
    3
}

fn default_growth_sizes() -> Vec<usize> {
    vec![2, 4, 8, 16, 32]
}

fn default_shrink_pairs() -> Vec<(usize, usize)> {
    vec![(32, 16), (16, 8), (8, 4), (4, 2)]
}

fn default_crash_network_size() -> usize {
    32
}

fn default_max_crash_burst() -> usize {
    16
}

fn default_stabilization_timeout_secs() -> u64 {
    120
}

fn default_setup_timeout_secs() -> u64 {
    60
}

fn default_crash_timeout_secs() -> u64 {
    120
}

fn default_settle_after_reset_ms() -> u64 {
    500
}

fn default_settle_after_join_ms() -> u64 {
    500
}

fn default_settle_after_leave_ms() -> u64 {
    300
}

fn default_burst_concurrency() -> usize {
    64
}

fn default_throughput_network_size() -> usize {
    32
}

fn default_pairs() -> usize {
    1000
}

fn default_value_length() -> usize {
    20
}

fn default_join_interval_ms() -> u64 {
    500
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            control_timeout_secs: default_control_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            data_timeout_secs: default_data_timeout_secs(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            required_checks: default_required_checks(),
            max_attempts: None,
            poll_interval_ms: default_poll_interval_ms(),
            retry_pause_ms: default_retry_pause_ms(),
            require_predecessor: false,
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            repetitions: default_repetitions(),
            growth_sizes: default_growth_sizes(),
            shrink_pairs: default_shrink_pairs(),
            crash_network_size: default_crash_network_size(),
            max_crash_burst: default_max_crash_burst(),
            stabilization_timeout_secs: default_stabilization_timeout_secs(),
            setup_timeout_secs: default_setup_timeout_secs(),
            crash_timeout_secs: default_crash_timeout_secs(),
            settle_after_reset_ms: default_settle_after_reset_ms(),
            settle_after_join_ms: default_settle_after_join_ms(),
            settle_after_leave_ms: default_settle_after_leave_ms(),
            burst_concurrency: default_burst_concurrency(),
        }
    }
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self {
            network_size: default_throughput_network_size(),
            pairs: default_pairs(),
            repetitions: default_repetitions(),
            value_length: default_value_length(),
            join_interval_ms: default_join_interval_ms(),
            setup_timeout_secs: default_setup_timeout_secs(),
        }
    }
}

impl BenchConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it holds
    /// values no run could succeed with.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.oracle.validate()?;
        self.throughput.validate()
    }
}

impl OracleConfig {
    /// Checks per stability call: `max_attempts`, or twice `required_checks`.
    pub fn attempts(&self) -> usize {
        self.max_attempts.unwrap_or(self.required_checks * 2)
    }

    /// Reject settings under which no ring can ever be declared stable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.required_checks == 0 {
            return Err(ConfigError::Invalid(
                "oracle.required_checks must be at least 1".into(),
            ));
        }
        if self.attempts() < self.required_checks {
            return Err(ConfigError::Invalid(format!(
                "oracle.max_attempts ({}) is below oracle.required_checks ({})",
                self.attempts(),
                self.required_checks
            )));
        }
        Ok(())
    }
}

impl ThroughputConfig {
    /// Reject an empty workload.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pairs == 0 {
            return Err(ConfigError::Invalid("throughput.pairs must be at least 1".into()));
        }
        Ok(())
    }
}

impl RpcConfig {
    /// Timeouts for [`NodeHandle`](ring_client::NodeHandle).
    pub fn timeouts(&self) -> RpcTimeouts {
        RpcTimeouts {
            control: Duration::from_secs(self.control_timeout_secs),
            probe: Duration::from_secs(self.probe_timeout_secs),
            data: Duration::from_secs(self.data_timeout_secs),
        }
    }
}

impl ScenarioConfig {
    /// Convergence timeout after a join or leave burst.
    pub fn stabilization_timeout(&self) -> Duration {
        Duration::from_secs(self.stabilization_timeout_secs)
    }

    /// Timeout for building the initial ring.
    pub fn setup_timeout(&self) -> Duration {
        Duration::from_secs(self.setup_timeout_secs)
    }

    /// Convergence timeout after a crash burst.
    pub fn crash_timeout(&self) -> Duration {
        Duration::from_secs(self.crash_timeout_secs)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Parsed values are out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
