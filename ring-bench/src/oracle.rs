//! Ring consistency oracle.
//!
//! Decides from outside the cluster whether a set of nodes currently forms
//! exactly one ring of an expected size. The only evidence used is what the
//! nodes report over RPC: a live start node is found with `ping`, then
//! successor pointers are followed with `node-info` until the traversal
//! returns to the start, overshoots, or hits a broken link.
//!
//! A single consistent traversal can be a coincidence while the ring is
//! still converging, so [`RingOracle::is_stable`] debounces: it requires
//! several consecutive consistent checks.

use ring_client::{NodeHandle, RpcTimeouts, Transport};
use ring_types::{NodeAddress, NodeInfo};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::config::{ConfigError, OracleConfig};

/// Debounce and polling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilityPolicy {
    /// Consecutive consistent checks required.
    pub required_checks: usize,
    /// Maximum checks per [`RingOracle::is_stable`] call.
    pub max_attempts: usize,
    /// Pause after each check.
    pub poll_interval: Duration,
    /// Pause between [`RingOracle::is_stable`] calls while waiting.
    pub retry_pause: Duration,
    /// Require predecessor pointers to agree with the traversal.
    pub require_predecessor: bool,
}

impl Default for StabilityPolicy {
    fn default() -> Self {
        let config = OracleConfig::default();
        Self {
            required_checks: config.required_checks,
            max_attempts: config.attempts(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            retry_pause: Duration::from_millis(config.retry_pause_ms),
            require_predecessor: config.require_predecessor,
        }
    }
}

impl TryFrom<&OracleConfig> for StabilityPolicy {
    type Error = ConfigError;

    fn try_from(config: &OracleConfig) -> Result<Self, Self::Error> {
        config.validate()?;
        Ok(Self {
            required_checks: config.required_checks,
            max_attempts: config.attempts(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            retry_pause: Duration::from_millis(config.retry_pause_ms),
            require_predecessor: config.require_predecessor,
        })
    }
}

/// Verdict of one consistency check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingCheck {
    /// One closed ring of exactly the expected size.
    Consistent,
    /// No node of the subset answered `ping`.
    NoLiveNode,
    /// A node did not answer `node-info` or reported no successor.
    BrokenLink {
        /// Node whose successor could not be read.
        at: NodeAddress,
    },
    /// More distinct nodes were reached than expected.
    Overshoot {
        /// Distinct nodes reached.
        visited: usize,
    },
    /// The traversal did not return to its start.
    NotClosed {
        /// Distinct nodes reached.
        visited: usize,
    },
    /// The ring closed with the wrong number of members.
    SizeMismatch {
        /// Distinct nodes in the ring.
        visited: usize,
        /// Expected ring size.
        expected: usize,
    },
    /// A node's predecessor disagrees with the traversal order.
    PredecessorMismatch {
        /// Node reporting the predecessor.
        at: NodeAddress,
        /// Predecessor implied by the traversal.
        expected: NodeAddress,
        /// Predecessor reported by the node.
        reported: Option<NodeAddress>,
    },
}

impl RingCheck {
    /// Returns true for [`RingCheck::Consistent`].
    pub fn is_consistent(&self) -> bool {
        matches!(self, RingCheck::Consistent)
    }
}

impl fmt::Display for RingCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingCheck::Consistent => write!(f, "consistent"),
            RingCheck::NoLiveNode => write!(f, "no live node"),
            RingCheck::BrokenLink { at } => write!(f, "broken link at {}", at),
            RingCheck::Overshoot { visited } => write!(f, "overshoot after {} nodes", visited),
            RingCheck::NotClosed { visited } => {
                write!(f, "ring not closed after {} nodes", visited)
            }
            RingCheck::SizeMismatch { visited, expected } => {
                write!(f, "ring of {} nodes, expected {}", visited, expected)
            }
            RingCheck::PredecessorMismatch {
                at,
                expected,
                reported,
            } => match reported {
                Some(reported) => write!(
                    f,
                    "{} reports predecessor {}, expected {}",
                    at, reported, expected
                ),
                None => write!(f, "{} reports no predecessor, expected {}", at, expected),
            },
        }
    }
}

/// Node-info snapshots collected during one traversal, in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSnapshot {
    entries: Vec<(NodeAddress, NodeInfo)>,
}

impl ClusterSnapshot {
    fn push(&mut self, address: NodeAddress, info: NodeInfo) {
        self.entries.push((address, info));
    }

    /// Number of nodes observed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Observed addresses in traversal order.
    pub fn addresses(&self) -> impl Iterator<Item = &NodeAddress> {
        self.entries.iter().map(|(addr, _)| addr)
    }

    /// Snapshot reported by `address`.
    pub fn get(&self, address: &NodeAddress) -> Option<&NodeInfo> {
        self.entries
            .iter()
            .find(|(addr, _)| addr == address)
            .map(|(_, info)| info)
    }

    /// First node whose predecessor does not point at the node visited before it.
    fn predecessor_mismatch(&self) -> Option<RingCheck> {
        let n = self.entries.len();
        (0..n).find_map(|i| {
            let (addr, info) = &self.entries[i];
            let (expected, _) = &self.entries[(i + n - 1) % n];
            if info.predecessor.as_ref() == Some(expected) {
                None
            } else {
                Some(RingCheck::PredecessorMismatch {
                    at: addr.clone(),
                    expected: expected.clone(),
                    reported: info.predecessor.clone(),
                })
            }
        })
    }
}

/// External ring consistency oracle.
pub struct RingOracle<T: Transport> {
    transport: Arc<T>,
    timeouts: RpcTimeouts,
    policy: StabilityPolicy,
}

impl<T: Transport> Clone for RingOracle<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            timeouts: self.timeouts,
            policy: self.policy.clone(),
        }
    }
}

impl<T: Transport> RingOracle<T> {
    /// Create an oracle with default timeouts and policy.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            timeouts: RpcTimeouts::default(),
            policy: StabilityPolicy::default(),
        }
    }

    /// Set the RPC timeouts used for probes and for handles built by [`handle`](Self::handle).
    pub fn with_timeouts(mut self, timeouts: RpcTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the debounce policy.
    pub fn with_policy(mut self, policy: StabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Debounce policy in use.
    pub fn policy(&self) -> &StabilityPolicy {
        &self.policy
    }

    /// Handle for `address` on the oracle's transport.
    pub fn handle(&self, address: NodeAddress) -> NodeHandle<T> {
        NodeHandle::new(address, Arc::clone(&self.transport)).with_timeouts(self.timeouts)
    }

    /// Run one consistency check and return the verdict.
    pub async fn check_once(&self, nodes: &[NodeHandle<T>], expected_size: usize) -> RingCheck {
        let (check, _) = self.inspect(nodes, expected_size).await;
        check
    }

    /// Run one consistency check and return the verdict with the snapshots it saw.
    pub async fn inspect(
        &self,
        nodes: &[NodeHandle<T>],
        expected_size: usize,
    ) -> (RingCheck, ClusterSnapshot) {
        let mut snapshot = ClusterSnapshot::default();

        let mut start = None;
        for node in nodes {
            if node.ping().await {
                start = Some(node.address().clone());
                break;
            }
        }
        let Some(start) = start else {
            return (RingCheck::NoLiveNode, snapshot);
        };

        let mut visited: HashSet<NodeAddress> = HashSet::new();
        let mut current = start.clone();

        for _ in 0..=expected_size {
            if current == start && visited.contains(&current) {
                break;
            }
            visited.insert(current.clone());

            let info = self.handle(current.clone()).get_info().await;
            let Some(info) = info else {
                return (RingCheck::BrokenLink { at: current }, snapshot);
            };
            let Some(successor) = info.successor.clone() else {
                return (RingCheck::BrokenLink { at: current }, snapshot);
            };
            tracing::debug!("{} -> {}", current, successor);
            snapshot.push(current, info);
            current = successor;

            if visited.len() > expected_size {
                return (
                    RingCheck::Overshoot {
                        visited: visited.len(),
                    },
                    snapshot,
                );
            }
        }

        let check = if current != start {
            RingCheck::NotClosed {
                visited: visited.len(),
            }
        } else if visited.len() != expected_size {
            RingCheck::SizeMismatch {
                visited: visited.len(),
                expected: expected_size,
            }
        } else if self.policy.require_predecessor && expected_size > 1 {
            snapshot
                .predecessor_mismatch()
                .unwrap_or(RingCheck::Consistent)
        } else {
            RingCheck::Consistent
        };
        (check, snapshot)
    }

    /// Debounced check: `required_checks` consecutive consistent checks
    /// within `max_attempts` attempts.
    pub async fn is_stable(&self, nodes: &[NodeHandle<T>], expected_size: usize) -> bool {
        let mut consecutive = 0;

        for _ in 0..self.policy.max_attempts {
            let check = self.check_once(nodes, expected_size).await;
            if check.is_consistent() {
                consecutive += 1;
                if consecutive >= self.policy.required_checks {
                    return true;
                }
            } else {
                tracing::debug!("ring of {} not consistent: {}", expected_size, check);
                consecutive = 0;
            }
            sleep(self.policy.poll_interval).await;
        }

        false
    }

    /// Poll [`is_stable`](Self::is_stable) until it succeeds or `timeout` elapses.
    ///
    /// Returns `(true, elapsed)` on success and `(false, timeout)` otherwise.
    pub async fn wait_for_stability(
        &self,
        nodes: &[NodeHandle<T>],
        expected_size: usize,
        timeout: Duration,
    ) -> (bool, Duration) {
        let started = Instant::now();

        while started.elapsed() < timeout {
            if self.is_stable(nodes, expected_size).await {
                return (true, started.elapsed());
            }
            sleep(self.policy.retry_pause).await;
        }

        (false, timeout)
    }
}
