//! Measure put/get throughput.

use anyhow::{Context, Result};
use ring_bench::ThroughputBench;
use ring_client::Transport;
use ring_types::NodeAddress;

use super::Runtime;

/// Run the throughput command.
pub async fn run<T: Transport>(
    runtime: &Runtime<T>,
    repetitions: Option<usize>,
    nodes: Vec<NodeAddress>,
) -> Result<()> {
    let mut config = runtime.config.throughput.clone();
    if let Some(repetitions) = repetitions {
        config.repetitions = repetitions;
    }
    let (size, pairs) = (config.network_size, config.pairs);

    tracing::info!(
        "Chord DHT throughput benchmark: {} nodes available, testing with {}",
        nodes.len(),
        size
    );

    let oracle = runtime.oracle();
    let pool = runtime.pool(&oracle, nodes);
    let mut bench = ThroughputBench::new(pool, oracle, config);
    if let Some(seed) = runtime.seed {
        bench = bench.with_seed(seed);
    }

    let report = bench.run().await.context("Throughput benchmark failed")?;

    println!("Run\tThroughput (ops/sec)\tElapsed (s)");
    for run in &report.runs {
        let rate = run
            .ops_per_sec()
            .map(|rate| format!("{:.2}", rate))
            .unwrap_or_else(|| "n/a".into());
        println!("{}\t{}\t{:.3}", run.repetition, rate, run.elapsed.as_secs_f64());
    }
    if let Some(stats) = report.stats() {
        println!(
            "\nAverage throughput for {} nodes ({} pairs): {:.2} ± {:.2} ops/sec",
            size, pairs, stats.mean, stats.stddev
        );
    }

    Ok(())
}
