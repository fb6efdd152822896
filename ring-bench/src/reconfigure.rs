//! Cluster-wide reconfiguration.

use futures_util::stream::{self, StreamExt};
use ring_client::{NodeHandle, Transport};
use ring_types::{NodeAddress, ReconfigureRequest};

/// Send `/reconfigure` to every node. The request's member list is the full
/// node set. Returns the addresses that did not accept it, in input order.
pub async fn reconfigure_cluster<T: Transport>(
    nodes: &[NodeHandle<T>],
    max_nodes: usize,
    finger_table_size: usize,
    concurrency: usize,
) -> Vec<NodeAddress> {
    let request = ReconfigureRequest {
        nodes: nodes.iter().map(|n| n.address().clone()).collect(),
        max_nodes,
        finger_table_size,
    };
    tracing::info!(
        "Reconfiguring {} nodes: max_nodes={}, finger_table_size={}",
        nodes.len(),
        max_nodes,
        finger_table_size
    );

    let request = &request;
    let accepted: Vec<bool> = stream::iter(nodes)
        .map(|node| node.reconfigure(request))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    nodes
        .iter()
        .zip(accepted)
        .filter(|(_, ok)| !ok)
        .map(|(node, _)| node.address().clone())
        .collect()
}
