//! CLI command implementations.

pub mod bench;
pub mod health;
pub mod reconfigure;
pub mod report;
pub mod throughput;

use anyhow::{Context, Result};
use ring_bench::{BenchConfig, RingOracle, StabilityPolicy};
use ring_client::{NodeHandle, Transport};
use ring_types::NodeAddress;
use std::collections::HashSet;
use std::sync::Arc;

/// Shared state for transport-backed commands.
pub struct Runtime<T: Transport> {
    transport: Arc<T>,
    policy: StabilityPolicy,
    pub config: BenchConfig,
    pub seed: Option<u64>,
}

impl<T: Transport> Runtime<T> {
    pub fn new(transport: Arc<T>, config: BenchConfig, seed: Option<u64>) -> Result<Self> {
        let policy =
            StabilityPolicy::try_from(&config.oracle).context("Invalid [oracle] settings")?;
        Ok(Self {
            transport,
            policy,
            config,
            seed,
        })
    }

    /// Oracle configured from `[rpc]` and `[oracle]`.
    pub fn oracle(&self) -> RingOracle<T> {
        RingOracle::new(Arc::clone(&self.transport))
            .with_timeouts(self.config.rpc.timeouts())
            .with_policy(self.policy.clone())
    }

    /// Handles for `nodes`.
    pub fn pool(&self, oracle: &RingOracle<T>, nodes: Vec<NodeAddress>) -> Vec<NodeHandle<T>> {
        nodes.into_iter().map(|addr| oracle.handle(addr)).collect()
    }
}

/// Resolve the node list for a command: the simulated cluster's addresses
/// when running with `--sim`, otherwise the given addresses without
/// duplicates (first occurrence kept).
pub fn select_nodes(
    given: Vec<NodeAddress>,
    simulated: Option<Vec<NodeAddress>>,
) -> Result<Vec<NodeAddress>> {
    if let Some(simulated) = simulated {
        if !given.is_empty() {
            tracing::warn!("--sim given; ignoring {} node addresses", given.len());
        }
        return Ok(simulated);
    }

    if given.is_empty() {
        anyhow::bail!("No node addresses given (pass host:port arguments or --sim <N>)");
    }

    let mut seen = HashSet::new();
    let mut nodes = given;
    nodes.retain(|addr| seen.insert(addr.clone()));
    Ok(nodes)
}
