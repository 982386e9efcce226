// ── Node listener and updater ──

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::error::CoreError;
use crate::listener::{BatchListener, EventContext};
use crate::model::{Node, NodeId, Port, PortId, RawNode, RawPort, UpdateType};
use crate::queue::TxQueue;
use crate::store::{DataChange, Location, Partition, ReadWriteTransaction, StoredEntity};
use crate::topology::resolver;
use crate::update::{InventoryTask, UpdateStrategy, UpdateTask};

use super::port::merge_port;

// ── Listener ─────────────────────────────────────────────────────────

/// Watches raw nodes below `/inventory/node`. Port entries in the same
/// subtree belong to [`PortListener`](super::PortListener).
pub(crate) struct NodeListener {
    queue: TxQueue,
    cost_base: u64,
}

impl NodeListener {
    pub(crate) fn new(queue: TxQueue, cost_base: u64) -> Self {
        Self { queue, cost_base }
    }
}

impl BatchListener for NodeListener {
    type Context = EventContext<NodeId>;

    fn kind(&self) -> &'static str {
        "node"
    }

    fn enter_event(&self) -> Self::Context {
        EventContext::new()
    }

    fn record(
        &self,
        ctx: &mut Self::Context,
        location: Location,
        update: UpdateType,
        _change: &DataChange,
    ) -> bool {
        let Location::RawNode(id) = location else {
            return false;
        };
        ctx.add(update, id.clone(), Location::RawNode(id));
        true
    }

    fn exit_event(&self, ctx: Self::Context) {
        if ctx.is_empty() {
            return;
        }
        let (created, updated, removed) = ctx.counts();
        debug!(targets = ctx.len(), created, updated, removed, "node batch collected");
        let task = UpdateTask::new(NodeUpdater::new(self.cost_base), ctx.into_targets());
        self.queue.post(Box::new(InventoryTask::Node(task)));
    }
}

// ── Updater ──────────────────────────────────────────────────────────

pub(crate) struct NodeUpdater {
    cost_base: u64,
    /// Ports picked up while creating nodes.
    swept: BTreeSet<PortId>,
}

impl NodeUpdater {
    pub(crate) fn new(cost_base: u64) -> Self {
        Self {
            cost_base,
            swept: BTreeSet::new(),
        }
    }
}

impl UpdateStrategy for NodeUpdater {
    type Key = NodeId;
    type Raw = RawNode;

    const KIND: &'static str = "node";

    fn add(
        &mut self,
        tx: &mut ReadWriteTransaction<'_>,
        key: &NodeId,
        raw: RawNode,
    ) -> Result<bool, CoreError> {
        let location = Location::Node(key.clone());
        match tx.get::<Node>(&location)? {
            None => {
                let swept = create_node(tx, key, raw, self.cost_base)?;
                self.swept.extend(swept);
                Ok(true)
            }
            Some(mut node) => {
                // The negotiated version is learned once and never unset.
                if node.protocol_version.is_none() && raw.protocol_version.is_some() {
                    node.protocol_version = raw.protocol_version;
                    debug!(node = %key, version = ?node.protocol_version, "protocol version learned");
                    tx.put(&location, node);
                }
                Ok(false)
            }
        }
    }

    fn remove(&mut self, tx: &mut ReadWriteTransaction<'_>, key: &NodeId) -> Result<(), CoreError> {
        let location = Location::Node(key.clone());
        if tx.get::<Node>(&location)?.is_none() {
            return Ok(());
        }
        for port in tx.scan_as::<Port>(Partition::Operational, &location.path())? {
            resolver::release_port(tx, &port)?;
        }
        tx.delete(&location)?;
        info!(node = %key, "node removed");
        Ok(())
    }

    fn fix_up(&mut self, tx: &mut ReadWriteTransaction<'_>, added: bool) -> Result<(), CoreError> {
        if !added {
            return Ok(());
        }
        resolver::resolve_added_ports(tx, &self.swept)
    }
}

/// Create the derived node from its raw record and merge the raw ports
/// already reported under it. Returns the ports this created.
pub(crate) fn create_node(
    tx: &mut ReadWriteTransaction<'_>,
    id: &NodeId,
    raw: RawNode,
    cost_base: u64,
) -> Result<BTreeSet<PortId>, CoreError> {
    tx.put(
        &Location::Node(id.clone()),
        Node {
            id: id.clone(),
            protocol_version: raw.protocol_version,
        },
    );
    info!(node = %id, "node created");

    let mut swept = BTreeSet::new();
    let entries = tx.scan(
        Partition::Operational,
        &Location::RawNode(id.clone()).path(),
    )?;
    for (path, entity) in entries {
        // Same filtering as the port listener: unsupported paths are skipped.
        let Ok(Location::RawPort(port)) = Location::parse(Partition::Operational, &path) else {
            continue;
        };
        let Some(mut raw) = RawPort::from_entity(entity) else {
            continue;
        };
        raw.id = port.clone();
        if merge_port(tx, raw, cost_base)? {
            swept.insert(port);
        }
    }
    Ok(swept)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::ProtocolVersion;
    use crate::store::MemoryStore;

    fn raw_node(version: Option<ProtocolVersion>) -> RawNode {
        RawNode {
            id: "openflow:1".parse().unwrap(),
            protocol_version: version,
        }
    }

    #[test]
    fn protocol_version_is_only_filled_in() {
        let store = MemoryStore::new();
        let mut tx = ReadWriteTransaction::new(&store);
        let mut updater = NodeUpdater::new(1);
        let key: NodeId = "openflow:1".parse().unwrap();

        assert!(updater.add(&mut tx, &key, raw_node(None)).unwrap());
        assert!(
            !updater
                .add(&mut tx, &key, raw_node(Some(ProtocolVersion::OpenFlow13)))
                .unwrap()
        );
        updater
            .add(&mut tx, &key, raw_node(Some(ProtocolVersion::OpenFlow10)))
            .unwrap();

        let node = tx.get::<Node>(&Location::Node(key)).unwrap().unwrap();
        assert_eq!(node.protocol_version, Some(ProtocolVersion::OpenFlow13));
    }

    #[test]
    fn new_node_sweeps_ports_reported_earlier() {
        let store = MemoryStore::new();
        let mut tx = ReadWriteTransaction::new(&store);
        let port: PortId = "openflow:1:3".parse().unwrap();
        tx.put(
            &Location::RawPort(port.clone()),
            RawPort {
                id: port.clone(),
                name: None,
                enabled: true,
                speed_kbps: None,
            },
        );

        let mut updater = NodeUpdater::new(1);
        let key: NodeId = "openflow:1".parse().unwrap();
        updater.add(&mut tx, &key, raw_node(None)).unwrap();

        assert!(tx.get::<Port>(&Location::Port(port.clone())).unwrap().is_some());
        assert_eq!(updater.swept, BTreeSet::from([port]));
    }

    #[test]
    fn removing_node_drops_its_ports() {
        let store = MemoryStore::new();
        let mut tx = ReadWriteTransaction::new(&store);
        let key: NodeId = "openflow:1".parse().unwrap();
        let mut updater = NodeUpdater::new(1);
        updater.add(&mut tx, &key, raw_node(None)).unwrap();
        merge_port(
            &mut tx,
            RawPort {
                id: key.port(1),
                name: None,
                enabled: true,
                speed_kbps: None,
            },
            1,
        )
        .unwrap();

        updater.remove(&mut tx, &key).unwrap();
        assert!(tx.get::<Node>(&Location::Node(key.clone())).unwrap().is_none());
        assert!(tx.get::<Port>(&Location::Port(key.port(1))).unwrap().is_none());
    }
}
