//! Simulated cluster for testing.
//!
//! An in-process model of a Chord ring that answers the node API. Each node
//! belongs to a membership group; topology changes (join, leave, reset,
//! crash, recover) take effect on successor pointers only after a
//! configurable stabilization delay, so callers observe the same transient
//! inconsistency a real ring shows while it converges.
//!
//! Fault knobs allow tests to make a node unreachable, hang it, pin a stale
//! successor, drop the successor field, or corrupt storage reads.

use async_trait::async_trait;
use ring_types::{NodeAddress, NodeInfo};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::{RpcRequest, RpcResponse, Transport, TransportError};

/// First port handed out by [`SimCluster::new`].
const SIM_BASE_PORT: u16 = 7000;

/// Routing entries reported in `others`.
const MAX_OTHERS: usize = 4;

#[derive(Debug, Clone)]
enum SuccessorOverride {
    Pinned(NodeAddress),
    Missing,
}

#[derive(Debug)]
struct SimNode {
    id: u64,
    group: u64,
    successor: NodeAddress,
    predecessor: NodeAddress,
    crashed: bool,
    unreachable: bool,
    hung: bool,
    corrupt_reads: bool,
    successor_override: Option<SuccessorOverride>,
}

#[derive(Debug, Default)]
struct SimInner {
    nodes: BTreeMap<NodeAddress, SimNode>,
    storage: HashMap<u64, HashMap<String, String>>,
    /// Groups with a pending relink, keyed to the time of their last change.
    dirty: HashMap<u64, Instant>,
    next_group: u64,
    stabilization_delay: Duration,
    calls: HashMap<(NodeAddress, &'static str), usize>,
}

/// In-process simulated Chord cluster.
///
/// Cloning shares the same cluster state.
#[derive(Debug, Clone, Default)]
pub struct SimCluster {
    inner: Arc<Mutex<SimInner>>,
}

impl SimCluster {
    /// Create `size` fresh single-node rings at `sim:7000`, `sim:7001`, ...
    ///
    /// Ports stop at 65535, so at most 58536 nodes are created.
    pub fn new(size: usize) -> Self {
        Self::with_addresses(
            (SIM_BASE_PORT..=u16::MAX)
                .take(size)
                .map(|port| NodeAddress::new("sim", port)),
        )
    }

    /// Create one fresh single-node ring per address.
    pub fn with_addresses(addresses: impl IntoIterator<Item = NodeAddress>) -> Self {
        let mut inner = SimInner::default();
        for addr in addresses {
            let group = inner.fresh_group();
            inner.nodes.insert(
                addr.clone(),
                SimNode {
                    id: ring_id(&addr),
                    group,
                    successor: addr.clone(),
                    predecessor: addr,
                    crashed: false,
                    unreachable: false,
                    hung: false,
                    corrupt_reads: false,
                    successor_override: None,
                },
            );
        }
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Delay between a membership change and the ring relinking.
    pub fn with_stabilization_delay(self, delay: Duration) -> Self {
        self.state().stabilization_delay = delay;
        self
    }

    /// All node addresses, in address order.
    pub fn addresses(&self) -> Vec<NodeAddress> {
        self.state().nodes.keys().cloned().collect()
    }

    /// Put `members` into one ring, linked immediately.
    pub fn form_ring(&self, members: &[NodeAddress]) {
        let mut inner = self.state();
        let group = inner.fresh_group();
        for addr in members {
            if let Some(node) = inner.nodes.get_mut(addr) {
                node.group = group;
            }
        }
        inner.relink(group);
    }

    /// Refuse every connection to `addr`.
    pub fn set_unreachable(&self, addr: &NodeAddress, unreachable: bool) {
        self.with_node(addr, |node| node.unreachable = unreachable);
    }

    /// Never answer requests to `addr`; calls run into their timeout.
    pub fn set_hung(&self, addr: &NodeAddress, hung: bool) {
        self.with_node(addr, |node| node.hung = hung);
    }

    /// Report `successor` from `addr` regardless of the ring state.
    pub fn pin_successor(&self, addr: &NodeAddress, successor: NodeAddress) {
        self.with_node(addr, |node| {
            node.successor_override = Some(SuccessorOverride::Pinned(successor))
        });
    }

    /// Omit the successor field from `addr`'s node-info.
    pub fn drop_successor(&self, addr: &NodeAddress) {
        self.with_node(addr, |node| {
            node.successor_override = Some(SuccessorOverride::Missing)
        });
    }

    /// Undo [`pin_successor`](Self::pin_successor) / [`drop_successor`](Self::drop_successor).
    pub fn clear_successor_override(&self, addr: &NodeAddress) {
        self.with_node(addr, |node| node.successor_override = None);
    }

    /// Return altered values for storage reads served by `addr`.
    pub fn corrupt_reads(&self, addr: &NodeAddress, corrupt: bool) {
        self.with_node(addr, |node| node.corrupt_reads = corrupt);
    }

    /// Whether `addr` is currently in simulated crash state.
    pub fn is_crashed(&self, addr: &NodeAddress) -> bool {
        self.state()
            .nodes
            .get(addr)
            .map(|node| node.crashed)
            .unwrap_or(false)
    }

    /// Number of `op` requests (see [`RpcRequest::name`]) delivered to `addr`.
    pub fn calls(&self, addr: &NodeAddress, op: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|((target, name), _)| target == addr && *name == op)
            .map(|(_, count)| *count)
            .sum()
    }

    fn with_node(&self, addr: &NodeAddress, f: impl FnOnce(&mut SimNode)) {
        if let Some(node) = self.state().nodes.get_mut(addr) {
            f(node);
        }
    }

    fn state(&self) -> MutexGuard<'_, SimInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SimInner {
    fn fresh_group(&mut self) -> u64 {
        self.next_group += 1;
        self.next_group
    }

    fn mark_dirty(&mut self, group: u64, now: Instant) {
        self.dirty.insert(group, now);
    }

    /// Relink every group whose stabilization delay has elapsed.
    fn settle(&mut self, now: Instant) {
        let delay = self.stabilization_delay;
        let ready: Vec<u64> = self
            .dirty
            .iter()
            .filter(|(_, since)| now >= **since + delay)
            .map(|(group, _)| *group)
            .collect();
        for group in ready {
            self.dirty.remove(&group);
            self.relink(group);
        }
    }

    /// Link the live members of `group` into one ring ordered by id.
    fn relink(&mut self, group: u64) {
        let mut members: Vec<(u64, NodeAddress)> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.group == group && !node.crashed)
            .map(|(addr, node)| (node.id, addr.clone()))
            .collect();
        members.sort();

        let n = members.len();
        for i in 0..n {
            let successor = members[(i + 1) % n].1.clone();
            let predecessor = members[(i + n - 1) % n].1.clone();
            if let Some(node) = self.nodes.get_mut(&members[i].1) {
                node.successor = successor;
                node.predecessor = predecessor;
            }
        }
    }

    /// Move `addr` into a fresh single-node ring.
    fn make_solo(&mut self, addr: &NodeAddress, now: Instant) {
        let group = self.fresh_group();
        if let Some(node) = self.nodes.get_mut(addr) {
            let old = node.group;
            node.group = group;
            node.successor = addr.clone();
            node.predecessor = addr.clone();
            self.mark_dirty(old, now);
        }
    }

    fn node_info(&self, addr: &NodeAddress, node: &SimNode) -> NodeInfo {
        let successor = match &node.successor_override {
            Some(SuccessorOverride::Pinned(pinned)) => Some(pinned.clone()),
            Some(SuccessorOverride::Missing) => None,
            None => Some(node.successor.clone()),
        };
        let others = self
            .nodes
            .iter()
            .filter(|(other, peer)| {
                peer.group == node.group
                    && !peer.crashed
                    && *other != addr
                    && Some(*other) != successor.as_ref()
            })
            .map(|(other, _)| other.to_string())
            .take(MAX_OTHERS)
            .collect();

        NodeInfo {
            node_hash: format!("{:016x}", node.id),
            successor,
            predecessor: Some(node.predecessor.clone()),
            others,
        }
    }

    fn handle(
        &mut self,
        target: &NodeAddress,
        request: &RpcRequest,
        now: Instant,
    ) -> Result<RpcResponse, TransportError> {
        self.settle(now);
        *self
            .calls
            .entry((target.clone(), request.name()))
            .or_default() += 1;

        let (group, crashed, unreachable) = match self.nodes.get(target) {
            Some(node) => (node.group, node.crashed, node.unreachable),
            None => {
                return Err(TransportError::ConnectionFailed(format!(
                    "no route to {}",
                    target
                )))
            }
        };
        if unreachable {
            return Err(TransportError::ConnectionFailed(format!(
                "connection refused by {}",
                target
            )));
        }
        if crashed && !matches!(request, RpcRequest::SimCrash | RpcRequest::SimRecover) {
            return Ok(RpcResponse::new(503, "Node is crashed"));
        }

        let response = match request {
            RpcRequest::Ping => RpcResponse::new(200, target.to_string()),
            RpcRequest::NodeInfo => {
                let node = &self.nodes[target];
                let info = self.node_info(target, node);
                let body = serde_json::to_vec(&info)
                    .map_err(|e| TransportError::Request(e.to_string()))?;
                RpcResponse::new(200, body)
            }
            RpcRequest::Join { seed } => self.join(target, seed, now),
            RpcRequest::Leave | RpcRequest::Reset => {
                self.make_solo(target, now);
                RpcResponse::new(200, "OK")
            }
            RpcRequest::SimCrash => {
                if let Some(node) = self.nodes.get_mut(target) {
                    node.crashed = true;
                }
                self.mark_dirty(group, now);
                RpcResponse::new(200, "Crash simulated")
            }
            RpcRequest::SimRecover => {
                if let Some(node) = self.nodes.get_mut(target) {
                    node.crashed = false;
                }
                self.mark_dirty(group, now);
                RpcResponse::new(200, "Recovered")
            }
            RpcRequest::Get { key } => {
                let corrupt = self.nodes[target].corrupt_reads;
                match self.storage.get(&group).and_then(|s| s.get(key)) {
                    Some(value) if corrupt => RpcResponse::new(200, format!("{}~", value)),
                    Some(value) => RpcResponse::new(200, value.clone()),
                    None => RpcResponse::new(404, "Key not found"),
                }
            }
            RpcRequest::Put { key, value } => {
                self.storage
                    .entry(group)
                    .or_default()
                    .insert(key.clone(), value.clone());
                RpcResponse::new(200, "Value stored")
            }
            RpcRequest::Reconfigure(_) => RpcResponse::new(200, "Reconfigured"),
        };
        Ok(response)
    }

    fn join(&mut self, target: &NodeAddress, seed: &NodeAddress, now: Instant) -> RpcResponse {
        if target == seed {
            return RpcResponse::new(200, "Already in network");
        }
        let seed_group = match self.nodes.get(seed) {
            Some(node) if !node.crashed && !node.unreachable => node.group,
            _ => return RpcResponse::new(502, "Error joining DHT: seed unreachable"),
        };
        let old = match self.nodes.get_mut(target) {
            Some(node) => {
                let old = node.group;
                node.group = seed_group;
                node.successor = seed.clone();
                old
            }
            None => return RpcResponse::new(502, "Error joining DHT"),
        };
        self.mark_dirty(old, now);
        self.mark_dirty(seed_group, now);
        RpcResponse::new(200, "Joined the DHT successfully")
    }
}

#[async_trait]
impl Transport for SimCluster {
    async fn call(
        &self,
        target: &NodeAddress,
        request: &RpcRequest,
        timeout: Duration,
    ) -> Result<RpcResponse, TransportError> {
        let hung = self
            .state()
            .nodes
            .get(target)
            .map(|node| node.hung)
            .unwrap_or(false);
        if hung {
            tokio::time::sleep(timeout).await;
            return Err(TransportError::Timeout);
        }

        self.state().handle(target, request, Instant::now())
    }
}

/// Ring identifier for an address: the first 8 bytes of its SHA-256.
fn ring_id(addr: &NodeAddress) -> u64 {
    let digest = Sha256::digest(addr.to_string().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_secs(5);

    async fn info(sim: &SimCluster, addr: &NodeAddress) -> NodeInfo {
        let response = sim.call(addr, &RpcRequest::NodeInfo, T).await.unwrap();
        serde_json::from_slice(&response.body).unwrap()
    }

    /// Follow successors from `start` and return the cycle.
    async fn walk(sim: &SimCluster, start: &NodeAddress) -> Vec<NodeAddress> {
        let mut seen = vec![start.clone()];
        let mut current = info(sim, start).await.successor.unwrap();
        while &current != start && seen.len() <= 64 {
            seen.push(current.clone());
            current = info(sim, &current).await.successor.unwrap();
        }
        seen
    }

    #[test]
    fn addresses_stop_at_the_last_port() {
        let sim = SimCluster::new(60_000);
        let addrs = sim.addresses();
        assert_eq!(addrs.len(), usize::from(u16::MAX - SIM_BASE_PORT) + 1);
        assert_eq!(addrs.last().map(|a| a.port()), Some(u16::MAX));
    }

    #[tokio::test]
    async fn fresh_node_is_its_own_successor() {
        let sim = SimCluster::new(1);
        let addr = &sim.addresses()[0];
        let info = info(&sim, addr).await;
        assert_eq!(info.successor.as_ref(), Some(addr));
        assert_eq!(info.node_hash.len(), 16);
    }

    #[tokio::test]
    async fn joins_converge_into_one_ring() {
        let sim = SimCluster::new(5);
        let nodes = sim.addresses();
        for node in &nodes[1..] {
            let response = sim
                .call(node, &RpcRequest::Join { seed: nodes[0].clone() }, T)
                .await
                .unwrap();
            assert!(response.is_success());
        }

        let cycle = walk(&sim, &nodes[2]).await;
        assert_eq!(cycle.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn relink_waits_for_stabilization_delay() {
        let sim = SimCluster::new(3).with_stabilization_delay(Duration::from_secs(2));
        let nodes = sim.addresses();
        sim.form_ring(&nodes);
        sim.call(&nodes[1], &RpcRequest::SimCrash, T).await.unwrap();

        // The crashed node is still referenced by its predecessor.
        let pointing_at_crashed = {
            let mut hits = 0;
            for node in [&nodes[0], &nodes[2]] {
                if info(&sim, node).await.successor.as_ref() == Some(&nodes[1]) {
                    hits += 1;
                }
            }
            hits
        };
        assert_eq!(pointing_at_crashed, 1);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(walk(&sim, &nodes[0]).await.len(), 2);
    }

    #[tokio::test]
    async fn crashed_node_answers_only_control_endpoints() {
        let sim = SimCluster::new(2);
        let addr = sim.addresses()[0].clone();
        sim.call(&addr, &RpcRequest::SimCrash, T).await.unwrap();

        assert!(sim.is_crashed(&addr));
        let ping = sim.call(&addr, &RpcRequest::Ping, T).await.unwrap();
        assert_eq!(ping.status, 503);
        let reset = sim.call(&addr, &RpcRequest::Reset, T).await.unwrap();
        assert_eq!(reset.status, 503);

        let recover = sim.call(&addr, &RpcRequest::SimRecover, T).await.unwrap();
        assert!(recover.is_success());
        assert!(!sim.is_crashed(&addr));
    }

    #[tokio::test]
    async fn leave_returns_node_to_single_ring() {
        let sim = SimCluster::new(3);
        let nodes = sim.addresses();
        sim.form_ring(&nodes);

        sim.call(&nodes[0], &RpcRequest::Leave, T).await.unwrap();

        assert_eq!(walk(&sim, &nodes[0]).await.len(), 1);
        assert_eq!(walk(&sim, &nodes[1]).await.len(), 2);
    }

    #[tokio::test]
    async fn storage_is_shared_within_a_ring() {
        let sim = SimCluster::new(2);
        let nodes = sim.addresses();
        sim.form_ring(&nodes);

        let put = RpcRequest::Put {
            key: "k".into(),
            value: "v".into(),
        };
        sim.call(&nodes[0], &put, T).await.unwrap();

        let get = RpcRequest::Get { key: "k".into() };
        let response = sim.call(&nodes[1], &get, T).await.unwrap();
        assert_eq!(response.text(), "v");

        let missing = RpcRequest::Get { key: "nope".into() };
        assert_eq!(sim.call(&nodes[1], &missing, T).await.unwrap().status, 404);
    }

    #[tokio::test]
    async fn fault_knobs() {
        let sim = SimCluster::new(3);
        let nodes = sim.addresses();
        sim.form_ring(&nodes);

        sim.set_unreachable(&nodes[0], true);
        assert!(matches!(
            sim.call(&nodes[0], &RpcRequest::Ping, T).await,
            Err(TransportError::ConnectionFailed(_))
        ));

        sim.pin_successor(&nodes[1], nodes[1].clone());
        assert_eq!(info(&sim, &nodes[1]).await.successor, Some(nodes[1].clone()));

        sim.drop_successor(&nodes[2]);
        assert_eq!(info(&sim, &nodes[2]).await.successor, None);

        sim.clear_successor_override(&nodes[2]);
        assert!(info(&sim, &nodes[2]).await.successor.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_node_times_out() {
        let sim = SimCluster::new(1);
        let addr = sim.addresses()[0].clone();
        sim.set_hung(&addr, true);

        let started = Instant::now();
        let result = sim.call(&addr, &RpcRequest::Ping, T).await;
        assert_eq!(result, Err(TransportError::Timeout));
        assert!(started.elapsed() >= T);
    }

    #[tokio::test]
    async fn unknown_address_is_unreachable() {
        let sim = SimCluster::new(1);
        let stranger = NodeAddress::new("elsewhere", 1);
        assert!(sim.call(&stranger, &RpcRequest::Ping, T).await.is_err());
    }

    #[tokio::test]
    async fn counts_calls_per_operation() {
        let sim = SimCluster::new(1);
        let addr = sim.addresses()[0].clone();
        sim.call(&addr, &RpcRequest::Reset, T).await.unwrap();
        sim.call(&addr, &RpcRequest::Reset, T).await.unwrap();
        sim.call(&addr, &RpcRequest::Ping, T).await.unwrap();

        assert_eq!(sim.calls(&addr, "reset"), 2);
        assert_eq!(sim.calls(&addr, "ping"), 1);
        assert_eq!(sim.calls(&addr, "leave"), 0);
    }
}
