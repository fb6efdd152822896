//! JSON payloads exchanged with cluster nodes.

use serde::{Deserialize, Deserializer, Serialize};

use crate::NodeAddress;

/// Topology snapshot returned by `GET /node-info`.
///
/// Re-fetched on every probe; never cached across calls. A missing or
/// `null` successor decodes to `None` and is treated by callers as a broken
/// ring link. Only the successor must be a valid address; an unparseable
/// predecessor decodes to `None` and routing entries are kept as raw strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Ring identifier of the node, as reported (hex string).
    #[serde(default)]
    pub node_hash: String,
    /// Current successor on the ring.
    #[serde(default)]
    pub successor: Option<NodeAddress>,
    /// Current predecessor, if the node exposes it.
    #[serde(
        default,
        deserialize_with = "lenient_address",
        skip_serializing_if = "Option::is_none"
    )]
    pub predecessor: Option<NodeAddress>,
    /// Other known peers (finger table / routing entries). Opaque.
    #[serde(default)]
    pub others: Vec<String>,
}

impl NodeInfo {
    /// Snapshot with a successor and no other routing state.
    pub fn new(node_hash: impl Into<String>, successor: NodeAddress) -> Self {
        Self {
            node_hash: node_hash.into(),
            successor: Some(successor),
            predecessor: None,
            others: Vec::new(),
        }
    }

    /// Set the predecessor.
    pub fn with_predecessor(mut self, predecessor: NodeAddress) -> Self {
        self.predecessor = Some(predecessor);
        self
    }

    /// Set the routing entries.
    pub fn with_others(mut self, others: Vec<String>) -> Self {
        self.others = others;
        self
    }
}

/// `None` for a missing, `null`, or unparseable address.
fn lenient_address<'de, D>(deserializer: D) -> Result<Option<NodeAddress>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Reported {
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<Reported>::deserialize(deserializer)? {
        Some(Reported::Text(text)) => text.parse().ok(),
        Some(Reported::Other(_)) | None => None,
    })
}

/// Body of `POST /reconfigure`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconfigureRequest {
    /// Full member list the node should consider.
    pub nodes: Vec<NodeAddress>,
    /// Upper bound on ring size.
    pub max_nodes: usize,
    /// Number of finger table entries to maintain.
    pub finger_table_size: usize,
}
