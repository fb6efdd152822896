//! Push ring parameters to every node.

use anyhow::Result;
use ring_bench::reconfigure_cluster;
use ring_client::Transport;
use ring_types::NodeAddress;

use super::Runtime;

/// Run the reconfigure command. Fails if any node refuses.
pub async fn run<T: Transport>(
    runtime: &Runtime<T>,
    max_nodes: usize,
    finger_table_size: usize,
    nodes: Vec<NodeAddress>,
) -> Result<()> {
    let oracle = runtime.oracle();
    let pool = runtime.pool(&oracle, nodes);

    let failed = reconfigure_cluster(
        &pool,
        max_nodes,
        finger_table_size,
        runtime.config.scenarios.burst_concurrency,
    )
    .await;

    if !failed.is_empty() {
        for addr in &failed {
            println!("{} FAILED", addr);
        }
        anyhow::bail!("{}/{} nodes rejected the reconfiguration", failed.len(), pool.len());
    }

    println!("Reconfigured {} nodes", pool.len());
    Ok(())
}
