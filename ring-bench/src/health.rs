//! Pre-flight health check.
//!
//! Confirms that every node answers the liveness probe and serves a
//! decodable topology snapshot before a benchmark is started.

use futures_util::stream::{self, StreamExt};
use ring_client::{NodeHandle, Transport};
use ring_types::NodeAddress;

/// Health of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHealth {
    /// Node address.
    pub address: NodeAddress,
    /// Failure cause, `None` when healthy.
    pub failure: Option<String>,
}

impl NodeHealth {
    /// Returns true if all endpoints answered.
    pub fn is_healthy(&self) -> bool {
        self.failure.is_none()
    }
}

/// Health of a set of nodes, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    /// Per-node results.
    pub nodes: Vec<NodeHealth>,
}

impl HealthReport {
    /// Number of healthy nodes.
    pub fn healthy_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_healthy()).count()
    }

    /// Nodes that failed a probe.
    pub fn unhealthy(&self) -> impl Iterator<Item = &NodeHealth> {
        self.nodes.iter().filter(|n| !n.is_healthy())
    }

    /// Returns true if every node is healthy.
    pub fn all_healthy(&self) -> bool {
        self.nodes.iter().all(NodeHealth::is_healthy)
    }
}

/// Probe one node: `/helloworld`, then `/node-info`.
pub async fn check_node<T: Transport>(node: &NodeHandle<T>) -> NodeHealth {
    let failure = match node.try_ping().await {
        Err(e) => Some(format!("/helloworld failed: {}", e)),
        Ok(()) => match node.try_get_info().await {
            Err(e) => Some(format!("/node-info failed: {}", e)),
            Ok(_) => None,
        },
    };
    NodeHealth {
        address: node.address().clone(),
        failure,
    }
}

/// Probe every node with at most `concurrency` nodes in flight.
pub async fn check_cluster<T: Transport>(nodes: &[NodeHandle<T>], concurrency: usize) -> HealthReport {
    let nodes: Vec<NodeHealth> = stream::iter(nodes)
        .map(|node| check_node(node))
        .buffered(concurrency.max(1))
        .collect()
        .await;
    HealthReport { nodes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring_client::SimCluster;
    use std::sync::Arc;

    fn handles(sim: &SimCluster) -> Vec<NodeHandle<SimCluster>> {
        let transport = Arc::new(sim.clone());
        sim.addresses()
            .into_iter()
            .map(|a| NodeHandle::new(a, Arc::clone(&transport)))
            .collect()
    }

    #[tokio::test]
    async fn all_nodes_healthy() {
        let sim = SimCluster::new(3);
        let report = check_cluster(&handles(&sim), 8).await;

        assert_eq!(report.healthy_count(), 3);
        assert!(report.all_healthy());
    }

    #[tokio::test]
    async fn reports_cause_per_node_in_order() {
        let sim = SimCluster::new(3);
        let nodes = handles(&sim);
        sim.set_unreachable(nodes[0].address(), true);
        nodes[2].simulate_crash().await;

        let report = check_cluster(&nodes, 1).await;

        assert_eq!(report.healthy_count(), 1);
        assert!(!report.all_healthy());
        let addrs: Vec<_> = report.nodes.iter().map(|n| n.address.clone()).collect();
        assert_eq!(addrs, sim.addresses());

        let causes: Vec<&str> = report
            .unhealthy()
            .filter_map(|n| n.failure.as_deref())
            .collect();
        assert!(causes[0].starts_with("/helloworld failed: transport error"));
        assert_eq!(causes[1], "/helloworld failed: ping returned status 503");
    }
}
