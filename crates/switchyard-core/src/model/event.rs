// ── Inventory events ──
//
// What subscribers of the inventory publisher receive.

use serde::{Deserialize, Serialize};
use strum::Display;

use super::discovery::ProtocolVersion;
use super::entity_id::{NodeId, PortId};
use super::topology::{Node, Port};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    Created,
    Changed,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEvent {
    pub node_id: NodeId,
    pub protocol_version: Option<ProtocolVersion>,
    pub update_type: UpdateType,
}

impl NodeEvent {
    pub(crate) fn new(node: &Node, update_type: UpdateType) -> Self {
        Self {
            node_id: node.id.clone(),
            protocol_version: node.protocol_version,
            update_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEvent {
    pub port_id: PortId,
    pub enabled: bool,
    pub has_inter_switch_link: bool,
    /// Set on `Changed` events only: whether `enabled` flipped.
    pub state_changed: Option<bool>,
    /// Set on `Changed` events only: whether ISL attachment flipped.
    pub isl_changed: Option<bool>,
    pub update_type: UpdateType,
}

impl PortEvent {
    pub(crate) fn created(port: &Port) -> Self {
        Self::plain(port, UpdateType::Created)
    }

    /// A removed port never reports an inter-switch link; any it had are
    /// announced by a preceding [`links_detached`](Self::links_detached).
    pub(crate) fn removed(port: &Port) -> Self {
        Self {
            has_inter_switch_link: false,
            ..Self::plain(port, UpdateType::Removed)
        }
    }

    pub(crate) fn changed(old: &Port, new: &Port) -> Self {
        Self {
            port_id: new.id.clone(),
            enabled: new.enabled,
            has_inter_switch_link: new.has_inter_switch_link(),
            state_changed: Some(old.enabled != new.enabled),
            isl_changed: Some(old.has_inter_switch_link() != new.has_inter_switch_link()),
            update_type: UpdateType::Changed,
        }
    }

    /// The effect of losing every inter-switch link, reported for a port
    /// that is about to be removed while still attached.
    pub(crate) fn links_detached(port: &Port) -> Self {
        Self {
            port_id: port.id.clone(),
            enabled: port.enabled,
            has_inter_switch_link: false,
            state_changed: Some(false),
            isl_changed: Some(true),
            update_type: UpdateType::Changed,
        }
    }

    fn plain(port: &Port, update_type: UpdateType) -> Self {
        Self {
            port_id: port.id.clone(),
            enabled: port.enabled,
            has_inter_switch_link: port.has_inter_switch_link(),
            state_changed: None,
            isl_changed: None,
            update_type,
        }
    }
}

/// Either kind of inventory event, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InventoryEvent {
    Node(NodeEvent),
    Port(PortEvent),
}
