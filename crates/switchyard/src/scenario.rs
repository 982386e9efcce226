//! Scenario files: an ordered list of steps fed to one engine.
//!
//! ```json
//! { "steps": [
//!     { "op": "commit", "writes": [
//!         { "type": "put_node", "id": "openflow:1" },
//!         { "type": "put_port", "id": "openflow:1:1", "enabled": true, "speed_kbps": 1000000 }
//!     ] },
//!     { "op": "edge_port", "port": "openflow:1:1" },
//!     { "op": "set_owner", "owner": false }
//! ] }
//! ```
//!
//! Every `commit` step is one store transaction, so its writes reach the
//! engine as a single change batch.

use std::path::Path;

use serde::Deserialize;

use switchyard_core::store::Location;
use switchyard_core::{
    CoreError, InventoryManager, LinkId, NodeId, PortId, RawLink, RawNode, RawPort,
    ReadWriteTransaction, StaticSwitchLink,
};

use crate::error::CliError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Raw discovery writes committed together.
    Commit { writes: Vec<RawWrite> },
    StaticLink {
        source: PortId,
        destination: PortId,
    },
    RemoveStaticLink { source: PortId },
    EdgePort { port: PortId },
    RemoveEdgePort { port: PortId },
    SetOwner { owner: bool },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawWrite {
    PutNode(RawNode),
    PutPort(RawPort),
    PutLink(RawLink),
    DeleteNode { id: NodeId },
    DeletePort { id: PortId },
    DeleteLink { id: LinkId },
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::ScenarioUnreadable {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| CliError::ScenarioInvalid {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

impl Step {
    /// Apply this step to `manager`. Convergence is not awaited here.
    pub fn apply(self, manager: &InventoryManager) -> Result<(), CoreError> {
        let statics = manager.static_topology();
        match self {
            Self::Commit { writes } => {
                let mut tx = ReadWriteTransaction::new(manager.store().as_ref());
                for write in writes {
                    write.stage(&mut tx)?;
                }
                tx.commit()?;
            }
            Self::StaticLink {
                source,
                destination,
            } => statics.set_switch_link(StaticSwitchLink {
                source,
                destination,
            })?,
            Self::RemoveStaticLink { source } => {
                if !statics.remove_switch_link(&source)? {
                    tracing::warn!(%source, "no static link to remove");
                }
            }
            Self::EdgePort { port } => statics.add_edge_port(port)?,
            Self::RemoveEdgePort { port } => {
                if !statics.remove_edge_port(&port)? {
                    tracing::warn!(%port, "no edge port to remove");
                }
            }
            Self::SetOwner { owner } => {
                manager.set_owner(owner);
            }
        }
        Ok(())
    }
}

impl RawWrite {
    fn stage(self, tx: &mut ReadWriteTransaction<'_>) -> Result<(), CoreError> {
        match self {
            Self::PutNode(node) => tx.put(&Location::RawNode(node.id.clone()), node),
            Self::PutPort(port) => tx.put(&Location::RawPort(port.id.clone()), port),
            Self::PutLink(link) => tx.put(&Location::RawLink(link.id.clone()), link),
            Self::DeleteNode { id } => tx.delete(&Location::RawNode(id))?,
            Self::DeletePort { id } => tx.delete(&Location::RawPort(id))?,
            Self::DeleteLink { id } => tx.delete(&Location::RawLink(id))?,
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_step_kind() {
        let scenario: Scenario = serde_json::from_str(
            r#"{ "steps": [
                { "op": "commit", "writes": [
                    { "type": "put_node", "id": "openflow:1", "protocol_version": "openflow-1.3" },
                    { "type": "put_port", "id": "openflow:1:1", "enabled": true },
                    { "type": "put_link", "id": "l1", "source": "openflow:1:1", "destination": "openflow:2:1" },
                    { "type": "delete_link", "id": "l1" }
                ] },
                { "op": "static_link", "source": "openflow:1:2", "destination": "openflow:2:2" },
                { "op": "remove_static_link", "source": "openflow:1:2" },
                { "op": "edge_port", "port": "openflow:1:1" },
                { "op": "remove_edge_port", "port": "openflow:1:1" },
                { "op": "set_owner", "owner": false }
            ] }"#,
        )
        .unwrap();
        assert_eq!(scenario.steps.len(), 6);
        let Step::Commit { writes } = &scenario.steps[0] else {
            panic!("expected a commit step");
        };
        assert_eq!(writes.len(), 4);
    }

    #[test]
    fn malformed_identifiers_are_rejected() {
        let parsed: Result<Scenario, _> = serde_json::from_str(
            r#"{ "steps": [ { "op": "edge_port", "port": "not-a-port" } ] }"#,
        );
        assert!(parsed.is_err());
    }
}
