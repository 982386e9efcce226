// ── Static topology configuration ──

use serde::{Deserialize, Serialize};

use super::entity_id::PortId;

/// User-declared link between two ports, materialized regardless of what
/// discovery reports. At most one per source port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaticSwitchLink {
    pub source: PortId,
    pub destination: PortId,
}

/// A port that must never be treated as part of an inter-switch link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaticEdgePort {
    pub port: PortId,
}

/// Complete static configuration, as loaded from or saved to the
/// file-backed copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticTopology {
    #[serde(default)]
    pub switch_links: Vec<StaticSwitchLink>,
    #[serde(default)]
    pub edge_ports: Vec<StaticEdgePort>,
}

impl StaticTopology {
    pub fn is_empty(&self) -> bool {
        self.switch_links.is_empty() && self.edge_ports.is_empty()
    }
}
