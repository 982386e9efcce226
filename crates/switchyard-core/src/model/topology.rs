// ── Derived inventory and topology types ──
//
// The converged view maintained by the engine. Links are stored by value
// as (source, destination) pairs; each port keeps a `PortLink` index entry
// per attached link instead of holding references to its peer.

use serde::{Deserialize, Serialize};

use super::discovery::ProtocolVersion;
use super::entity_id::{LinkId, NodeId, PortId};

/// A switch in the derived inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub protocol_version: Option<ProtocolVersion>,
}

/// Back-reference from a port to a link that uses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortLink {
    pub link_id: LinkId,
    /// The port at the other end of the link.
    pub peer: PortId,
}

/// A port in the derived inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,
    pub name: Option<String>,
    pub enabled: bool,
    pub cost: u64,
    #[serde(default)]
    pub port_links: Vec<PortLink>,
}

impl Port {
    /// Whether the port currently takes part in an inter-switch link.
    pub fn has_inter_switch_link(&self) -> bool {
        !self.port_links.is_empty()
    }

    /// Add a port link unless an identical one is present.
    /// Returns `true` if the list changed.
    pub fn add_port_link(&mut self, link: PortLink) -> bool {
        if self.port_links.contains(&link) {
            return false;
        }
        self.port_links.push(link);
        true
    }

    /// Drop the port link for `link_id`. Returns `true` if one was removed.
    pub fn remove_port_link(&mut self, link_id: &LinkId) -> bool {
        let before = self.port_links.len();
        self.port_links.retain(|pl| pl.link_id != *link_id);
        before != self.port_links.len()
    }
}

/// A materialized directed inter-switch link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub source: PortId,
    pub destination: PortId,
    /// Created from static configuration rather than discovery.
    #[serde(default)]
    pub static_link: bool,
}

/// A discovered link held back because it cannot be materialized yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredLink {
    pub id: LinkId,
    pub source: PortId,
    pub destination: PortId,
}

impl IgnoredLink {
    pub fn touches(&self, port: &PortId) -> bool {
        self.source == *port || self.destination == *port
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn port(id: &str) -> Port {
        Port {
            id: id.parse().unwrap(),
            name: None,
            enabled: true,
            cost: 1,
            port_links: Vec::new(),
        }
    }

    #[test]
    fn port_links_are_deduplicated() {
        let mut p = port("openflow:1:1");
        let pl = PortLink {
            link_id: LinkId::new("l1").unwrap(),
            peer: "openflow:2:1".parse().unwrap(),
        };
        assert!(p.add_port_link(pl.clone()));
        assert!(!p.add_port_link(pl));
        assert!(p.has_inter_switch_link());
    }

    #[test]
    fn removing_port_link_reports_change() {
        let mut p = port("openflow:1:1");
        let id = LinkId::new("l1").unwrap();
        p.add_port_link(PortLink {
            link_id: id.clone(),
            peer: "openflow:2:1".parse().unwrap(),
        });
        assert!(p.remove_port_link(&id));
        assert!(!p.remove_port_link(&id));
        assert!(!p.has_inter_switch_link());
    }

    #[test]
    fn ignored_link_touches_either_endpoint() {
        let link = IgnoredLink {
            id: LinkId::new("l1").unwrap(),
            source: "openflow:1:1".parse().unwrap(),
            destination: "openflow:2:1".parse().unwrap(),
        };
        assert!(link.touches(&"openflow:1:1".parse().unwrap()));
        assert!(link.touches(&"openflow:2:1".parse().unwrap()));
        assert!(!link.touches(&"openflow:1:2".parse().unwrap()));
    }
}
