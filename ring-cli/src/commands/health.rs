//! Check node endpoints.

use anyhow::Result;
use ring_bench::check_cluster;
use ring_client::Transport;
use ring_types::NodeAddress;

use super::Runtime;

/// Run the health command. Fails if any node is unhealthy.
pub async fn run<T: Transport>(runtime: &Runtime<T>, nodes: Vec<NodeAddress>) -> Result<()> {
    let oracle = runtime.oracle();
    let pool = runtime.pool(&oracle, nodes);

    println!("Checking {} nodes...", pool.len());
    let report = check_cluster(&pool, runtime.config.scenarios.burst_concurrency).await;

    for (i, node) in report.nodes.iter().enumerate() {
        match &node.failure {
            None => println!("[{}/{}] {} OK", i + 1, pool.len(), node.address),
            Some(cause) => println!("[{}/{}] {} FAILED: {}", i + 1, pool.len(), node.address, cause),
        }
    }

    println!("\nHealthy nodes: {}/{}", report.healthy_count(), pool.len());

    if !report.all_healthy() {
        let unhealthy = pool.len() - report.healthy_count();
        anyhow::bail!("{} nodes are not responding correctly", unhealthy);
    }

    println!("All nodes are healthy and ready for benchmarking");
    Ok(())
}
