//! Throughput and correctness benchmark.
//!
//! Builds a ring, writes a batch of uuid-keyed values through randomly
//! chosen members, reads every one back through another random member and
//! reports operations per second. A value that does not read back exactly
//! as written aborts the benchmark with [`BenchError::DataIntegrity`].

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use ring_client::{NodeHandle, Transport};
use serde::Serialize;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::config::ThroughputConfig;
use crate::error::BenchError;
use crate::oracle::RingOracle;
use crate::stats::SampleStats;

/// One measured repetition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputRun {
    /// Repetition number, starting at 1.
    pub repetition: usize,
    /// Put and get operations issued.
    pub operations: usize,
    /// Wall time for all operations.
    pub elapsed: Duration,
}

impl ThroughputRun {
    /// Operations per second, or `None` if no time was measured.
    pub fn ops_per_sec(&self) -> Option<f64> {
        if self.elapsed.is_zero() {
            return None;
        }
        Some(self.operations as f64 / self.elapsed.as_secs_f64())
    }
}

/// Result of the throughput benchmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputReport {
    /// Ring size.
    pub network_size: usize,
    /// Pairs written per repetition.
    pub pairs: usize,
    /// Per-repetition measurements.
    pub runs: Vec<ThroughputRun>,
}

impl ThroughputReport {
    /// Mean and spread of ops/sec across repetitions.
    pub fn stats(&self) -> Option<SampleStats> {
        let samples: Vec<f64> = self.runs.iter().filter_map(ThroughputRun::ops_per_sec).collect();
        SampleStats::from_samples(&samples)
    }
}

/// Throughput benchmark runner.
pub struct ThroughputBench<T: Transport> {
    pool: Vec<NodeHandle<T>>,
    oracle: RingOracle<T>,
    config: ThroughputConfig,
    rng: StdRng,
}

impl<T: Transport> ThroughputBench<T> {
    /// Create a runner with an entropy-seeded RNG.
    pub fn new(pool: Vec<NodeHandle<T>>, oracle: RingOracle<T>, config: ThroughputConfig) -> Self {
        Self {
            pool,
            oracle,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed RNG seed for node sampling and generated values.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Run all repetitions.
    ///
    /// # Errors
    ///
    /// Fails on an empty workload, if the pool is too small, a ring cannot
    /// be built, or a value does not read back as written.
    pub async fn run(&mut self) -> Result<ThroughputReport, BenchError> {
        self.config.validate()?;
        let size = self.config.network_size;
        if size == 0 || size > self.pool.len() {
            return Err(BenchError::InsufficientNodes {
                needed: size.max(1),
                available: self.pool.len(),
            });
        }

        let mut runs = Vec::with_capacity(self.config.repetitions);
        for rep in 1..=self.config.repetitions {
            tracing::info!("Repetition {}/{}", rep, self.config.repetitions);
            let nodes: Vec<NodeHandle<T>> = self
                .pool
                .choose_multiple(&mut self.rng, size)
                .cloned()
                .collect();

            self.setup_ring(&nodes).await?;

            let pairs = self.generate_pairs();
            let elapsed = self.measure(&nodes, &pairs).await?;
            let run = ThroughputRun {
                repetition: rep,
                operations: pairs.len() * 2,
                elapsed,
            };
            match run.ops_per_sec() {
                Some(rate) => tracing::info!("Throughput: {:.2} ops/sec", rate),
                None => tracing::warn!("Repetition {} finished in zero time; not rated", rep),
            }
            runs.push(run);
        }

        Ok(ThroughputReport {
            network_size: size,
            pairs: self.config.pairs,
            runs,
        })
    }

    /// Recover and reset every node, join them one at a time, wait for the ring.
    async fn setup_ring(&self, nodes: &[NodeHandle<T>]) -> Result<(), BenchError> {
        for node in nodes {
            if !node.simulate_recover().await || !node.reset().await {
                return Err(BenchError::Setup(format!(
                    "{} could not be recovered and reset",
                    node.address()
                )));
            }
        }

        if let Some((seed, rest)) = nodes.split_first() {
            for node in rest {
                if !node.join(seed.address()).await {
                    return Err(BenchError::Setup(format!(
                        "{} could not join via {}",
                        node.address(),
                        seed.address()
                    )));
                }
                sleep(Duration::from_millis(self.config.join_interval_ms)).await;
            }
        }

        let timeout = Duration::from_secs(self.config.setup_timeout_secs);
        let (stable, _) = self
            .oracle
            .wait_for_stability(nodes, nodes.len(), timeout)
            .await;
        if !stable {
            return Err(BenchError::Setup(format!(
                "ring of {} nodes did not stabilize within {:?}",
                nodes.len(),
                timeout
            )));
        }
        Ok(())
    }

    fn generate_pairs(&mut self) -> Vec<(String, String)> {
        let len = self.config.value_length;
        (0..self.config.pairs)
            .map(|_| {
                let key = uuid::Uuid::new_v4().to_string();
                let value: String = (&mut self.rng)
                    .sample_iter(&Alphanumeric)
                    .take(len)
                    .map(char::from)
                    .collect();
                (key, value)
            })
            .collect()
    }

    /// Put every pair, then read every pair back, through random members.
    async fn measure(
        &mut self,
        nodes: &[NodeHandle<T>],
        pairs: &[(String, String)],
    ) -> Result<Duration, BenchError> {
        let started = Instant::now();

        for (key, value) in pairs {
            if let Some(node) = nodes.choose(&mut self.rng) {
                node.put(key, value).await;
            }
        }

        for (key, expected) in pairs {
            let Some(node) = nodes.choose(&mut self.rng) else {
                continue;
            };
            let (found, actual) = node.get(key).await;
            if !found || &actual != expected {
                return Err(BenchError::DataIntegrity {
                    key: key.clone(),
                    expected: expected.clone(),
                    actual: found.then_some(actual),
                });
            }
        }

        Ok(started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use ring_client::SimCluster;
    use std::sync::Arc;

    fn bench(sim: &SimCluster, config: ThroughputConfig) -> ThroughputBench<SimCluster> {
        let oracle = RingOracle::new(Arc::new(sim.clone()));
        let pool = sim.addresses().into_iter().map(|a| oracle.handle(a)).collect();
        ThroughputBench::new(pool, oracle, config).with_seed(11)
    }

    fn small() -> ThroughputConfig {
        ThroughputConfig {
            network_size: 4,
            pairs: 25,
            repetitions: 2,
            ..ThroughputConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn writes_read_back_on_healthy_ring() {
        let sim = SimCluster::new(6);
        let report = bench(&sim, small()).run().await.unwrap();

        assert_eq!(report.network_size, 4);
        assert_eq!(report.runs.len(), 2);
        assert!(report.runs.iter().all(|r| r.operations == 50));

        let puts: usize = sim.addresses().iter().map(|a| sim.calls(a, "put")).sum();
        let gets: usize = sim.addresses().iter().map(|a| sim.calls(a, "get")).sum();
        assert_eq!((puts, gets), (50, 50));
    }

    #[tokio::test(start_paused = true)]
    async fn corrupted_read_is_fatal() {
        let sim = SimCluster::new(4);
        for addr in sim.addresses() {
            sim.corrupt_reads(&addr, true);
        }

        let err = bench(&sim, small()).run().await.unwrap_err();
        match err {
            BenchError::DataIntegrity {
                expected, actual, ..
            } => {
                assert_eq!(expected.len(), 20);
                assert_eq!(actual, Some(format!("{}~", expected)));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn too_few_nodes() {
        let sim = SimCluster::new(2);
        let err = bench(&sim, small()).run().await.unwrap_err();
        assert!(matches!(
            err,
            BenchError::InsufficientNodes {
                needed: 4,
                available: 2
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_node_fails_setup() {
        let sim = SimCluster::new(4);
        sim.set_unreachable(&sim.addresses()[0], true);

        let err = bench(&sim, small()).run().await.unwrap_err();
        assert!(matches!(err, BenchError::Setup(_)));
    }

    #[test]
    fn zero_elapsed_is_not_rated() {
        let instant = ThroughputRun {
            repetition: 1,
            operations: 50,
            elapsed: Duration::ZERO,
        };
        assert_eq!(instant.ops_per_sec(), None);

        let report = ThroughputReport {
            network_size: 4,
            pairs: 25,
            runs: vec![
                instant.clone(),
                ThroughputRun {
                    elapsed: Duration::from_millis(500),
                    ..instant
                },
            ],
        };
        let stats = report.stats().unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.mean, 100.0);
        assert!(stats.mean.is_finite());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_workload_is_rejected() {
        let sim = SimCluster::new(4);
        let config = ThroughputConfig {
            pairs: 0,
            ..small()
        };

        let err = bench(&sim, config).run().await.unwrap_err();
        assert!(matches!(err, BenchError::Config(ConfigError::Invalid(_))));
        assert_eq!(sim.calls(&sim.addresses()[0], "reset"), 0);
    }

    #[test]
    fn ops_per_sec_counts_puts_and_gets() {
        let run = ThroughputRun {
            repetition: 1,
            operations: 2000,
            elapsed: Duration::from_secs(4),
        };
        assert_eq!(run.ops_per_sec(), Some(500.0));

        let report = ThroughputReport {
            network_size: 32,
            pairs: 1000,
            runs: vec![
                run.clone(),
                ThroughputRun {
                    elapsed: Duration::from_secs(2),
                    ..run
                },
            ],
        };
        let stats = report.stats().unwrap();
        assert_eq!(stats.mean, 750.0);
        assert_eq!(stats.stddev, 250.0);
    }
}
