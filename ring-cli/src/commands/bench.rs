//! Run topology-change experiments.

use anyhow::{Context, Result};
use ring_bench::{Orchestrator, ResultStore, ScenarioKind};
use ring_client::Transport;
use ring_types::NodeAddress;
use std::path::Path;

use super::{report, Runtime};

/// Nodes needed for every experiment to run at its largest size.
const RECOMMENDED_NODES: usize = 32;

/// Run the bench command.
pub async fn run<T: Transport>(
    runtime: &Runtime<T>,
    scenario: Option<ScenarioKind>,
    repetitions: Option<usize>,
    output: &Path,
    nodes: Vec<NodeAddress>,
) -> Result<()> {
    let mut config = runtime.config.scenarios.clone();
    if let Some(repetitions) = repetitions {
        config.repetitions = repetitions;
    }

    if nodes.len() < RECOMMENDED_NODES {
        tracing::warn!(
            "Only {} nodes available. Some tests will be skipped (recommend at least {}).",
            nodes.len(),
            RECOMMENDED_NODES
        );
    }

    tracing::info!(
        "Chord network benchmark: {} nodes, {} repetitions per experiment",
        nodes.len(),
        config.repetitions
    );

    let oracle = runtime.oracle();
    let pool = runtime.pool(&oracle, nodes);
    let mut orchestrator = Orchestrator::new(pool, oracle, config);
    if let Some(seed) = runtime.seed {
        orchestrator = orchestrator.with_seed(seed);
    }

    let mut store = ResultStore::new();
    orchestrator.run(scenario, &mut store).await;

    println!("{}", report::render(&store));

    store
        .save(output)
        .with_context(|| format!("Failed to write results to {}", output.display()))?;
    println!("Results saved to {}", output.display());

    Ok(())
}
