// ── Core identity types ──
//
// NodeId, PortId and LinkId form the foundation of every inventory type.
// All three round-trip through their string form, which is also the
// segment used for them in the hierarchical store keyspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── NodeId ──────────────────────────────────────────────────────────

/// Opaque identifier of a switch, e.g. `openflow:1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() || id.contains('/') {
            return Err(CoreError::InvalidIdentifier {
                kind: "node",
                value: id,
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the identifier of port `number` on this node.
    pub fn port(&self, number: u32) -> PortId {
        PortId {
            node: self.clone(),
            number,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

// ── PortId ──────────────────────────────────────────────────────────

/// Globally unique port identifier: the owning node plus a port number.
///
/// The string form is `<node-id>:<number>`, so `openflow:1:2` is port 2 on
/// node `openflow:1`. Logical ports with a non-numeric suffix (`LOCAL`,
/// `CONTROLLER`, ...) do not parse.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortId {
    node: NodeId,
    number: u32,
}

impl PortId {
    pub fn new(node: NodeId, number: u32) -> Self {
        Self { node, number }
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Whether this port lives on `node`.
    pub fn is_on(&self, node: &NodeId) -> bool {
        self.node == *node
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.number)
    }
}

impl FromStr for PortId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidIdentifier {
            kind: "port",
            value: s.to_owned(),
        };
        let (node, number) = s.rsplit_once(':').ok_or_else(invalid)?;
        let number: u32 = number.parse().map_err(|_| invalid())?;
        let node = NodeId::new(node).map_err(|_| invalid())?;
        Ok(Self { node, number })
    }
}

impl TryFrom<String> for PortId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PortId> for String {
    fn from(id: PortId) -> Self {
        id.to_string()
    }
}

// ── LinkId ──────────────────────────────────────────────────────────

/// Identifier of a directed inter-switch link.
///
/// Discovered links carry the identifier assigned by the topology source.
/// Static links use `static:<source-port>`, see [`LinkId::for_static`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkId(String);

const STATIC_LINK_PREFIX: &str = "static:";

impl LinkId {
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() || id.contains('/') {
            return Err(CoreError::InvalidIdentifier {
                kind: "link",
                value: id,
            });
        }
        Ok(Self(id))
    }

    /// Identifier of the static link whose source is `source`.
    pub fn for_static(source: &PortId) -> Self {
        Self(format!("{STATIC_LINK_PREFIX}{source}"))
    }

    pub fn is_static(&self) -> bool {
        self.0.starts_with(STATIC_LINK_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LinkId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LinkId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<LinkId> for String {
    fn from(id: LinkId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn port_id_splits_on_last_colon() {
        let port: PortId = "openflow:12:3".parse().unwrap();
        assert_eq!(port.node().as_str(), "openflow:12");
        assert_eq!(port.number(), 3);
        assert_eq!(port.to_string(), "openflow:12:3");
    }

    #[test]
    fn logical_ports_are_rejected() {
        assert!("openflow:1:LOCAL".parse::<PortId>().is_err());
        assert!("openflow:1:".parse::<PortId>().is_err());
        assert!(":4".parse::<PortId>().is_err());
        assert!("4".parse::<PortId>().is_err());
    }

    #[test]
    fn node_id_rejects_empty_and_path_separators() {
        assert!(NodeId::new("").is_err());
        assert!(NodeId::new("a/b").is_err());
        assert!(NodeId::new("openflow:1").is_ok());
    }

    #[test]
    fn static_link_ids_are_derived_from_source_port() {
        let src = NodeId::new("openflow:1").unwrap().port(2);
        let id = LinkId::for_static(&src);
        assert_eq!(id.as_str(), "static:openflow:1:2");
        assert!(id.is_static());
        assert!(!LinkId::new("openflow:1:2").unwrap().is_static());
    }

    #[test]
    fn port_id_is_on_its_node() {
        let node = NodeId::new("openflow:7").unwrap();
        let port = node.port(1);
        assert!(port.is_on(&node));
        assert!(!port.is_on(&NodeId::new("openflow:8").unwrap()));
    }
}
