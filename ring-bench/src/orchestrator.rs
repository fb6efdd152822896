//! Topology-change experiments.
//!
//! The orchestrator drives three kinds of perturbation against a fixed pool
//! of nodes and measures how long the ring takes to converge afterwards:
//!
//! - **growth**: single-node rings join one seed in a burst
//! - **shrink**: part of a stable ring leaves gracefully in a burst
//! - **crash**: part of a stable ring crashes simultaneously
//!
//! Every repetition starts from a hard reset of the whole pool and samples
//! its nodes with the orchestrator's own seedable RNG. A failed repetition
//! is recorded and never aborts the remaining ones.

use futures_util::future;
use futures_util::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use ring_client::{NodeHandle, Transport};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::ScenarioConfig;
use crate::oracle::RingOracle;
use crate::results::{ResultStore, RunResult, ScenarioKind};

const NOT_ALL_ALIVE: &str = "Not all nodes alive";
const SETUP_UNSTABLE: &str = "Initial network didn't stabilize";
const NO_CONVERGENCE: &str = "Timeout waiting for stability";

/// Parameters of one scenario instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentConfig {
    /// Scenario kind.
    pub kind: ScenarioKind,
    /// Ring size before the topology change.
    pub start_size: usize,
    /// Expected ring size after the topology change.
    pub target_size: usize,
    /// Number of repetitions.
    pub repetitions: usize,
    /// Convergence timeout after the change.
    pub stabilization_timeout: Duration,
    /// Oracle pause between consecutive checks.
    pub poll_interval: Duration,
}

impl ExperimentConfig {
    /// Nodes crashed or leaving per repetition.
    pub fn removed(&self) -> usize {
        self.start_size.saturating_sub(self.target_size)
    }
}

/// Issue `op` against every node with at most `concurrency` calls in flight
/// and wait for all of them. Returns the number of calls that succeeded.
pub async fn burst<'a, T, F, Fut>(nodes: &'a [NodeHandle<T>], concurrency: usize, op: F) -> usize
where
    T: Transport + 'a,
    F: Fn(&'a NodeHandle<T>) -> Fut,
    Fut: Future<Output = bool>,
{
    stream::iter(nodes)
        .map(op)
        .buffer_unordered(concurrency.max(1))
        .filter(|ok| future::ready(*ok))
        .count()
        .await
}

/// Drives growth, shrink and crash experiments over a node pool.
pub struct Orchestrator<T: Transport> {
    pool: Vec<NodeHandle<T>>,
    oracle: RingOracle<T>,
    config: ScenarioConfig,
    rng: StdRng,
}

impl<T: Transport> Orchestrator<T> {
    /// Create an orchestrator with an entropy-seeded RNG.
    pub fn new(pool: Vec<NodeHandle<T>>, oracle: RingOracle<T>, config: ScenarioConfig) -> Self {
        Self {
            pool,
            oracle,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed RNG seed so node sampling is reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Node pool.
    pub fn pool(&self) -> &[NodeHandle<T>] {
        &self.pool
    }

    /// Scenario instances of the growth experiment that fit the pool.
    pub fn growth_plan(&self) -> Vec<ExperimentConfig> {
        self.config
            .growth_sizes
            .iter()
            .filter(|&&size| self.fits(size, ScenarioKind::Growth))
            .map(|&size| self.experiment(ScenarioKind::Growth, size, size, self.config.stabilization_timeout()))
            .collect()
    }

    /// Scenario instances of the shrink experiment that fit the pool.
    pub fn shrink_plan(&self) -> Vec<ExperimentConfig> {
        self.config
            .shrink_pairs
            .iter()
            .filter(|&&(start, _)| self.fits(start, ScenarioKind::Shrink))
            .map(|&(start, end)| {
                self.experiment(ScenarioKind::Shrink, start, end, self.config.stabilization_timeout())
            })
            .collect()
    }

    /// Scenario instances of the crash experiment, one per burst size.
    pub fn crash_plan(&self) -> Vec<ExperimentConfig> {
        let size = self.config.crash_network_size;
        if !self.fits(size, ScenarioKind::Crash) {
            return Vec::new();
        }
        let max_burst = self.config.max_crash_burst.min(size / 2);
        (1..=max_burst)
            .map(|burst| self.experiment(ScenarioKind::Crash, size, size - burst, self.config.crash_timeout()))
            .collect()
    }

    fn fits(&self, size: usize, kind: ScenarioKind) -> bool {
        if size > self.pool.len() {
            tracing::info!(
                "Skipping {} with {} nodes: only {} available",
                kind,
                size,
                self.pool.len()
            );
            return false;
        }
        true
    }

    fn experiment(
        &self,
        kind: ScenarioKind,
        start_size: usize,
        target_size: usize,
        stabilization_timeout: Duration,
    ) -> ExperimentConfig {
        ExperimentConfig {
            kind,
            start_size,
            target_size,
            repetitions: self.config.repetitions,
            stabilization_timeout,
            poll_interval: self.oracle.policy().poll_interval,
        }
    }

    /// Run the experiments of `kind`, or all of them when `None`.
    pub async fn run(&mut self, kind: Option<ScenarioKind>, store: &mut ResultStore) {
        match kind {
            Some(ScenarioKind::Growth) => self.run_growth(store).await,
            Some(ScenarioKind::Shrink) => self.run_shrink(store).await,
            Some(ScenarioKind::Crash) => self.run_crash(store).await,
            None => self.run_all(store).await,
        }
    }

    /// Run growth, shrink and crash experiments in that order.
    pub async fn run_all(&mut self, store: &mut ResultStore) {
        self.run_growth(store).await;
        self.run_shrink(store).await;
        self.run_crash(store).await;
    }

    /// Growth experiment.
    pub async fn run_growth(&mut self, store: &mut ResultStore) {
        for experiment in self.growth_plan() {
            tracing::info!(
                "Testing network growth to {} nodes (timeout {:?}, poll {:?})",
                experiment.target_size,
                experiment.stabilization_timeout,
                experiment.poll_interval
            );
            for rep in 0..experiment.repetitions {
                let result = self.growth_once(&experiment).await;
                log_result(rep, &experiment, &result);
                store.push(result);
            }
        }
    }

    /// Shrink experiment.
    pub async fn run_shrink(&mut self, store: &mut ResultStore) {
        for experiment in self.shrink_plan() {
            tracing::info!(
                "Testing network shrinking from {} to {} nodes",
                experiment.start_size,
                experiment.target_size
            );
            for rep in 0..experiment.repetitions {
                let result = self.shrink_once(&experiment).await;
                log_result(rep, &experiment, &result);
                store.push(result);
            }
        }
    }

    /// Crash-tolerance experiment.
    pub async fn run_crash(&mut self, store: &mut ResultStore) {
        for experiment in self.crash_plan() {
            tracing::info!(
                "Testing crash tolerance with {} simultaneous crashes",
                experiment.removed()
            );
            for rep in 0..experiment.repetitions {
                let result = self.crash_once(&experiment).await;
                log_result(rep, &experiment, &result);
                store.push(result);
            }
        }
    }

    async fn growth_once(&mut self, experiment: &ExperimentConfig) -> RunResult {
        let size = experiment.start_size;
        self.reset_pool(false).await;
        let nodes = self.sample(size);
        sleep(self.settle_after_reset()).await;

        let alive = burst(&nodes, self.concurrency(), |node| node.ping()).await;
        if alive != size {
            tracing::warn!("only {}/{} nodes alive", alive, size);
            return RunResult::setup_failed(ScenarioKind::Growth, size, size, NOT_ALL_ALIVE);
        }

        self.join_all(&nodes).await;
        sleep(Duration::from_millis(self.config.settle_after_join_ms)).await;

        let (stable, elapsed) = self
            .oracle
            .wait_for_stability(&nodes, size, experiment.stabilization_timeout)
            .await;
        if stable {
            RunResult::succeeded(ScenarioKind::Growth, size, size, elapsed)
        } else {
            RunResult::timed_out(ScenarioKind::Growth, size, size, elapsed, NO_CONVERGENCE)
        }
    }

    async fn shrink_once(&mut self, experiment: &ExperimentConfig) -> RunResult {
        let (start, end) = (experiment.start_size, experiment.target_size);
        self.reset_pool(false).await;
        let nodes = self.sample(start);
        sleep(self.settle_after_reset()).await;

        if !self.build_ring(&nodes).await {
            return RunResult::setup_failed(ScenarioKind::Shrink, start, end, SETUP_UNSTABLE);
        }

        let (keep, leave) = nodes.split_at(end.min(start));
        let left = burst(leave, self.concurrency(), |node| node.leave()).await;
        tracing::debug!("{}/{} nodes left", left, leave.len());
        sleep(Duration::from_millis(self.config.settle_after_leave_ms)).await;

        let (stable, elapsed) = self
            .oracle
            .wait_for_stability(keep, end, experiment.stabilization_timeout)
            .await;
        if stable {
            RunResult::succeeded(ScenarioKind::Shrink, start, end, elapsed)
        } else {
            RunResult::timed_out(ScenarioKind::Shrink, start, end, elapsed, NO_CONVERGENCE)
        }
    }

    async fn crash_once(&mut self, experiment: &ExperimentConfig) -> RunResult {
        let (size, expected) = (experiment.start_size, experiment.target_size);
        let crashes = experiment.removed();
        self.reset_pool(true).await;
        let nodes = self.sample(size);
        sleep(self.settle_after_reset()).await;

        if !self.build_ring(&nodes).await {
            return RunResult::setup_failed(ScenarioKind::Crash, size, expected, SETUP_UNSTABLE);
        }

        let crashed: Vec<NodeHandle<T>> = nodes
            .choose_multiple(&mut self.rng, crashes)
            .cloned()
            .collect();
        let survivors: Vec<NodeHandle<T>> = nodes
            .iter()
            .filter(|node| !crashed.iter().any(|c| c.address() == node.address()))
            .cloned()
            .collect();

        burst(&crashed, self.concurrency(), |node| node.simulate_crash()).await;

        let (stable, elapsed) = self
            .oracle
            .wait_for_stability(&survivors, expected, experiment.stabilization_timeout)
            .await;
        let result = if stable {
            RunResult::succeeded(ScenarioKind::Crash, size, expected, elapsed)
        } else {
            RunResult::timed_out(
                ScenarioKind::Crash,
                size,
                expected,
                elapsed,
                format!("Network couldn't tolerate {} crashes", crashes),
            )
        };

        burst(&crashed, self.concurrency(), |node| node.simulate_recover()).await;
        result
    }

    /// Reset every node in the pool, recovering simulated crashes first if asked.
    async fn reset_pool(&self, recover_first: bool) {
        let reset = burst(&self.pool, self.concurrency(), |node| async move {
            if recover_first {
                node.simulate_recover().await;
            }
            node.reset().await
        })
        .await;
        tracing::debug!("reset {}/{} nodes", reset, self.pool.len());
    }

    /// Burst-join `nodes[1..]` through `nodes[0]`.
    async fn join_all(&self, nodes: &[NodeHandle<T>]) {
        let Some((seed, rest)) = nodes.split_first() else {
            return;
        };
        let seed = seed.address();
        let joined = burst(rest, self.concurrency(), |node| node.join(seed)).await;
        tracing::debug!("{}/{} joins accepted by {}", joined, rest.len(), seed);
    }

    /// Join `nodes` into one ring and wait for it within the setup timeout.
    async fn build_ring(&self, nodes: &[NodeHandle<T>]) -> bool {
        self.join_all(nodes).await;
        let (stable, _) = self
            .oracle
            .wait_for_stability(nodes, nodes.len(), self.config.setup_timeout())
            .await;
        stable
    }

    fn sample(&mut self, size: usize) -> Vec<NodeHandle<T>> {
        self.pool
            .choose_multiple(&mut self.rng, size)
            .cloned()
            .collect()
    }

    fn concurrency(&self) -> usize {
        self.config.burst_concurrency
    }

    fn settle_after_reset(&self) -> Duration {
        Duration::from_millis(self.config.settle_after_reset_ms)
    }
}

fn log_result(rep: usize, experiment: &ExperimentConfig, result: &RunResult) {
    if result.success() {
        tracing::info!(
            "  Repetition {}/{}: SUCCESS ({:.2}s)",
            rep + 1,
            experiment.repetitions,
            result.duration_secs()
        );
    } else {
        tracing::warn!(
            "  Repetition {}/{}: FAILED ({})",
            rep + 1,
            experiment.repetitions,
            result.reason()
        );
    }
}
