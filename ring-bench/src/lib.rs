//! # ring-bench
//!
//! Consistency oracle and topology-change experiments for a Chord ring that
//! is only reachable through its node RPC surface.
//!
//! ## Features
//!
//! - **RingOracle**: decides whether a node set forms one ring of an
//!   expected size, with debounced stability and bounded waiting
//! - **Orchestrator**: growth, shrink and crash experiments with bursts of
//!   concurrent RPCs and reproducible node sampling
//! - **ResultStore**: append-only run log with grouped statistics and a
//!   JSON file format for report tooling
//! - **Throughput**: put/get benchmark with read-back verification
//! - **Health**: pre-flight probe of every node
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ring_bench::{Orchestrator, ResultStore, RingOracle, ScenarioConfig};
//! use ring_client::HttpTransport;
//!
//! let oracle = RingOracle::new(Arc::new(HttpTransport::new()));
//! let pool = addresses.into_iter().map(|a| oracle.handle(a)).collect();
//! let mut orchestrator = Orchestrator::new(pool, oracle, ScenarioConfig::default());
//!
//! let mut store = ResultStore::new();
//! orchestrator.run_all(&mut store).await;
//! store.save("results.json".as_ref())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod health;
pub mod oracle;
pub mod orchestrator;
pub mod reconfigure;
pub mod results;
pub mod stats;
pub mod throughput;

pub use config::{BenchConfig, ConfigError, OracleConfig, RpcConfig, ScenarioConfig, ThroughputConfig};
pub use error::BenchError;
pub use health::{check_cluster, HealthReport, NodeHealth};
pub use oracle::{ClusterSnapshot, RingCheck, RingOracle, StabilityPolicy};
pub use orchestrator::{burst, ExperimentConfig, Orchestrator};
pub use reconfigure::reconfigure_cluster;
pub use results::{GroupStats, KindSummary, ResultStore, RunResult, ScenarioKind};
pub use stats::SampleStats;
pub use throughput::{ThroughputBench, ThroughputReport, ThroughputRun};
