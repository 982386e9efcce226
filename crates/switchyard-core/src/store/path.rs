// ── Hierarchical keyspace ──
//
// `StorePath` is the untyped address of an entry; `Location` is the typed
// view of every path shape the engine reads or writes. Listeners parse
// incoming paths into a `Location` and drop anything that doesn't fit.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::CoreError;
use crate::model::{LinkId, NodeId, PortId};

/// Logical partition of the datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Discovered and derived state.
    Operational,
    /// User intent.
    Configuration,
}

/// Address of an entry in the hierarchical keyspace, displayed as `/a/b/c`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorePath(Vec<String>);

impl StorePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a segment, returning the child path.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Whether `self` equals `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &StorePath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Whether `self` lies strictly below `prefix`.
    pub fn is_descendant_of(&self, prefix: &StorePath) -> bool {
        self.0.len() > prefix.0.len() && self.starts_with(prefix)
    }

    fn as_strs(&self) -> Vec<&str> {
        self.0.iter().map(String::as_str).collect()
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for StorePath {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::str::FromStr for StorePath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix('/') else {
            return Err(CoreError::InvalidIdentifier {
                kind: "path",
                value: s.to_owned(),
            });
        };
        if rest.is_empty() {
            return Ok(Self(Vec::new()));
        }
        if rest.split('/').any(str::is_empty) {
            return Err(CoreError::InvalidIdentifier {
                kind: "path",
                value: s.to_owned(),
            });
        }
        Ok(Self::new(rest.split('/')))
    }
}

impl From<StorePath> for String {
    fn from(path: StorePath) -> Self {
        path.to_string()
    }
}

// ── Keyspace roots ──────────────────────────────────────────────────

const RAW_INVENTORY: &str = "inventory";
const RAW_TOPOLOGY: &str = "topology";
const DERIVED_INVENTORY: &str = "derived-inventory";
const DERIVED_TOPOLOGY: &str = "derived-topology";
const STATIC_TOPOLOGY: &str = "static-topology";

const NODE: &str = "node";
const PORT: &str = "port";
const LINK: &str = "link";
const IGNORED_LINK: &str = "ignored-link";
const SWITCH_LINK: &str = "switch-link";
const EDGE_PORT: &str = "edge-port";

/// Collection roots, used for scans and listener registration.
pub mod roots {
    use super::{
        DERIVED_INVENTORY, DERIVED_TOPOLOGY, EDGE_PORT, IGNORED_LINK, LINK, NODE, RAW_INVENTORY,
        RAW_TOPOLOGY, STATIC_TOPOLOGY, SWITCH_LINK, StorePath,
    };

    pub fn raw_nodes() -> StorePath {
        StorePath::new([RAW_INVENTORY, NODE])
    }

    pub fn raw_links() -> StorePath {
        StorePath::new([RAW_TOPOLOGY, LINK])
    }

    pub fn nodes() -> StorePath {
        StorePath::new([DERIVED_INVENTORY, NODE])
    }

    pub fn derived_inventory() -> StorePath {
        StorePath::new([DERIVED_INVENTORY])
    }

    pub fn links() -> StorePath {
        StorePath::new([DERIVED_TOPOLOGY, LINK])
    }

    pub fn ignored_links() -> StorePath {
        StorePath::new([DERIVED_TOPOLOGY, IGNORED_LINK])
    }

    pub fn static_topology() -> StorePath {
        StorePath::new([STATIC_TOPOLOGY])
    }

    pub fn static_switch_links() -> StorePath {
        StorePath::new([STATIC_TOPOLOGY, SWITCH_LINK])
    }

    pub fn static_edge_ports() -> StorePath {
        StorePath::new([STATIC_TOPOLOGY, EDGE_PORT])
    }
}

// ── Location ────────────────────────────────────────────────────────

/// Typed address of every entry shape the engine understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    RawNode(NodeId),
    RawPort(PortId),
    RawLink(LinkId),
    Node(NodeId),
    Port(PortId),
    Link(LinkId),
    IgnoredLink(LinkId),
    StaticSwitchLink(PortId),
    StaticEdgePort(PortId),
}

impl Location {
    pub fn partition(&self) -> Partition {
        match self {
            Self::StaticSwitchLink(_) | Self::StaticEdgePort(_) => Partition::Configuration,
            _ => Partition::Operational,
        }
    }

    pub fn path(&self) -> StorePath {
        match self {
            Self::RawNode(node) => roots::raw_nodes().child(node.as_str()),
            Self::RawPort(port) => roots::raw_nodes()
                .child(port.node().as_str())
                .child(PORT)
                .child(port.to_string()),
            Self::RawLink(link) => roots::raw_links().child(link.as_str()),
            Self::Node(node) => roots::nodes().child(node.as_str()),
            Self::Port(port) => roots::nodes()
                .child(port.node().as_str())
                .child(PORT)
                .child(port.to_string()),
            Self::Link(link) => roots::links().child(link.as_str()),
            Self::IgnoredLink(link) => roots::ignored_links().child(link.as_str()),
            Self::StaticSwitchLink(port) => roots::static_switch_links().child(port.to_string()),
            Self::StaticEdgePort(port) => roots::static_edge_ports().child(port.to_string()),
        }
    }

    /// Parse a path into a location.
    ///
    /// Fails with [`CoreError::UnsupportedPath`] for shapes outside the
    /// keyspace and [`CoreError::InvalidIdentifier`] for malformed ids.
    pub fn parse(partition: Partition, path: &StorePath) -> Result<Self, CoreError> {
        let unsupported = || CoreError::UnsupportedPath { path: path.clone() };
        let segments = path.as_strs();

        match (partition, segments.as_slice()) {
            (Partition::Operational, [RAW_INVENTORY, NODE, node]) => {
                Ok(Self::RawNode(node.parse()?))
            }
            (Partition::Operational, [RAW_INVENTORY, NODE, node, PORT, port]) => {
                Ok(Self::RawPort(parse_port_under(node, port)?))
            }
            (Partition::Operational, [RAW_TOPOLOGY, LINK, link]) => Ok(Self::RawLink(link.parse()?)),
            (Partition::Operational, [DERIVED_INVENTORY, NODE, node]) => {
                Ok(Self::Node(node.parse()?))
            }
            (Partition::Operational, [DERIVED_INVENTORY, NODE, node, PORT, port]) => {
                Ok(Self::Port(parse_port_under(node, port)?))
            }
            (Partition::Operational, [DERIVED_TOPOLOGY, LINK, link]) => Ok(Self::Link(link.parse()?)),
            (Partition::Operational, [DERIVED_TOPOLOGY, IGNORED_LINK, link]) => {
                Ok(Self::IgnoredLink(link.parse()?))
            }
            (Partition::Configuration, [STATIC_TOPOLOGY, SWITCH_LINK, port]) => {
                Ok(Self::StaticSwitchLink(port.parse()?))
            }
            (Partition::Configuration, [STATIC_TOPOLOGY, EDGE_PORT, port]) => {
                Ok(Self::StaticEdgePort(port.parse()?))
            }
            _ => Err(unsupported()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.partition(), self.path())
    }
}

/// A port segment must name a port on the node segment above it.
fn parse_port_under(node: &str, port: &str) -> Result<PortId, CoreError> {
    let node: NodeId = node.parse()?;
    let port: PortId = port.parse()?;
    if !port.is_on(&node) {
        return Err(CoreError::InvalidIdentifier {
            kind: "port",
            value: port.to_string(),
        });
    }
    Ok(port)
}
