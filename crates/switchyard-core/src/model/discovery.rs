// ── Raw discovery records ──
//
// What the southbound plugins write into the operational partition.
// These are inputs only; the engine never mutates them.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity_id::{LinkId, NodeId, PortId};

/// Wire protocol version negotiated with a switch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[non_exhaustive]
pub enum ProtocolVersion {
    #[serde(rename = "openflow-1.0")]
    #[strum(serialize = "openflow-1.0")]
    OpenFlow10,
    #[serde(rename = "openflow-1.3")]
    #[strum(serialize = "openflow-1.3")]
    OpenFlow13,
}

/// A switch as reported by discovery.
///
/// The protocol version is usually unknown when the node first shows up
/// and is filled in once the handshake completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNode {
    pub id: NodeId,
    #[serde(default)]
    pub protocol_version: Option<ProtocolVersion>,
}

/// A physical port as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPort {
    pub id: PortId,
    #[serde(default)]
    pub name: Option<String>,
    /// Administratively up and link up.
    #[serde(default)]
    pub enabled: bool,
    /// Current link speed, if the switch reports one.
    #[serde(default)]
    pub speed_kbps: Option<u64>,
}

/// A directed link reported by the topology discovery service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub id: LinkId,
    pub source: PortId,
    pub destination: PortId,
}
