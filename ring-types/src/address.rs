//! Identity type for cluster members.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AddressError;

/// Address of one cluster member.
///
/// Parsed from and displayed as `host:port`. Equality, hashing and ordering
/// are by value, so addresses can be used directly as map keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeAddress {
    host: String,
    port: u16,
}

impl NodeAddress {
    /// Create an address from its parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or IP.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL for plain HTTP requests to this node.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl FromStr for NodeAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
        if host.is_empty() {
            return Err(AddressError::EmptyHost(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for NodeAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeAddress> for String {
    fn from(addr: NodeAddress) -> Self {
        addr.to_string()
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAddress({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parses_host_and_port() {
        let addr: NodeAddress = "c7-12:51234".parse().unwrap();
        assert_eq!(addr.host(), "c7-12");
        assert_eq!(addr.port(), 51234);
        assert_eq!(addr.to_string(), "c7-12:51234");
    }

    #[test]
    fn base_url_is_plain_http() {
        let addr = NodeAddress::new("localhost", 8080);
        assert_eq!(addr.base_url(), "http://localhost:8080");
    }

    #[test]
    fn rejects_missing_port() {
        assert_eq!(
            "localhost".parse::<NodeAddress>(),
            Err(AddressError::MissingPort("localhost".into()))
        );
    }

    #[test]
    fn rejects_bad_port() {
        assert!(matches!(
            "localhost:99999".parse::<NodeAddress>(),
            Err(AddressError::InvalidPort(_))
        ));
        assert!(matches!(
            "localhost:http".parse::<NodeAddress>(),
            Err(AddressError::InvalidPort(_))
        ));
    }

    #[test]
    fn rejects_empty_host() {
        assert!(matches!(
            ":8080".parse::<NodeAddress>(),
            Err(AddressError::EmptyHost(_))
        ));
    }

    #[test]
    fn trims_whitespace() {
        let addr: NodeAddress = " node:1 \n".parse().unwrap();
        assert_eq!(addr, NodeAddress::new("node", 1));
    }

    #[test]
    fn equal_addresses_dedupe_in_sets() {
        let set: HashSet<NodeAddress> = ["a:1", "a:1", "b:1"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn serializes_as_string() {
        let addr = NodeAddress::new("node", 7000);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"node:7000\"");

        let back: NodeAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn deserialize_rejects_malformed() {
        let result: Result<NodeAddress, _> = serde_json::from_str("\"no-port\"");
        assert!(result.is_err());
    }
}
