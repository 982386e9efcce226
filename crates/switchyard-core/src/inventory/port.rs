// ── Port listener and updater ──

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::CoreError;
use crate::listener::{BatchListener, EventContext};
use crate::model::{Node, Port, PortId, RawNode, RawPort, UpdateType};
use crate::queue::TxQueue;
use crate::store::{DataChange, Location, ReadWriteTransaction};
use crate::topology::resolver;
use crate::update::{InventoryTask, UpdateStrategy, UpdateTask};

use super::node::create_node;
use super::port_cost;

// ── Listener ─────────────────────────────────────────────────────────

/// Watches raw ports below `/inventory/node`.
pub(crate) struct PortListener {
    queue: TxQueue,
    cost_base: u64,
}

impl PortListener {
    pub(crate) fn new(queue: TxQueue, cost_base: u64) -> Self {
        Self { queue, cost_base }
    }
}

impl BatchListener for PortListener {
    type Context = EventContext<PortId>;

    fn kind(&self) -> &'static str {
        "port"
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
        let Location::RawPort(id) = location else {
            return false;
        };
        ctx.add(update, id.clone(), Location::RawPort(id));
        true
    }

    fn exit_event(&self, ctx: Self::Context) {
        if ctx.is_empty() {
            return;
        }
        let (created, updated, removed) = ctx.counts();
        debug!(created, updated, removed, "port batch collected");
        let task = UpdateTask::new(PortUpdater::new(self.cost_base), ctx.into_targets());
        self.queue.post(Box::new(InventoryTask::Port(task)));
    }
}

// ── Updater ──────────────────────────────────────────────────────────

pub(crate) struct PortUpdater {
    cost_base: u64,
    added: BTreeSet<PortId>,
}

impl PortUpdater {
    pub(crate) fn new(cost_base: u64) -> Self {
        Self {
            cost_base,
            added: BTreeSet::new(),
        }
    }
}

impl UpdateStrategy for PortUpdater {
    type Key = PortId;
    type Raw = RawPort;

    const KIND: &'static str = "port";

    fn add(
        &mut self,
        tx: &mut ReadWriteTransaction<'_>,
        key: &PortId,
        mut raw: RawPort,
    ) -> Result<bool, CoreError> {
        let Some(swept) = ensure_node(tx, key, self.cost_base)? else {
            debug!(port = %key, "raw node missing, port skipped");
            return Ok(false);
        };
        // Creating the node may already have merged this port.
        let swept_any = !swept.is_empty();
        self.added.extend(swept);
        raw.id = key.clone();
        let created = merge_port(tx, raw, self.cost_base)?;
        if created {
            self.added.insert(key.clone());
        }
        Ok(created || swept_any)
    }

    fn remove(&mut self, tx: &mut ReadWriteTransaction<'_>, key: &PortId) -> Result<(), CoreError> {
        let location = Location::Port(key.clone());
        let Some(port) = tx.get::<Port>(&location)? else {
            return Ok(());
        };
        resolver::release_port(tx, &port)?;
        tx.delete(&location)?;
        debug!(port = %key, "port removed");
        Ok(())
    }

    fn fix_up(&mut self, tx: &mut ReadWriteTransaction<'_>, added: bool) -> Result<(), CoreError> {
        if !added {
            return Ok(());
        }
        resolver::resolve_added_ports(tx, &self.added)
    }
}

/// Make sure the derived node owning `port` exists, creating it from the
/// raw node record. Yields the ports swept up by a fresh node, or `None`
/// if discovery doesn't know the node.
fn ensure_node(
    tx: &mut ReadWriteTransaction<'_>,
    port: &PortId,
    cost_base: u64,
) -> Result<Option<BTreeSet<PortId>>, CoreError> {
    let node_id = port.node();
    if tx.get::<Node>(&Location::Node(node_id.clone()))?.is_some() {
        return Ok(Some(BTreeSet::new()));
    }
    let Some(raw) = tx.get::<RawNode>(&Location::RawNode(node_id.clone()))? else {
        return Ok(None);
    };
    debug!(node = %node_id, "node created ahead of its port");
    create_node(tx, node_id, raw, cost_base).map(Some)
}

/// Merge a raw port into the derived inventory. Scalar fields are
/// overwritten and port links preserved. Returns `true` if the port is new.
pub(crate) fn merge_port(
    tx: &mut ReadWriteTransaction<'_>,
    raw: RawPort,
    cost_base: u64,
) -> Result<bool, CoreError> {
    let location = Location::Port(raw.id.clone());
    let existing = tx.get::<Port>(&location)?;
    let port = Port {
        cost: port_cost(cost_base, raw.speed_kbps),
        id: raw.id,
        name: raw.name,
        enabled: raw.enabled,
        port_links: existing
            .as_ref()
            .map(|p| p.port_links.clone())
            .unwrap_or_default(),
    };
    if existing.as_ref() == Some(&port) {
        return Ok(false);
    }
    debug!(port = %port.id, enabled = port.enabled, cost = port.cost, "port merged");
    tx.put(&location, port);
    Ok(existing.is_none())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{LinkId, PortLink};
    use crate::store::MemoryStore;

    fn raw_port(id: &str, enabled: bool) -> RawPort {
        RawPort {
            id: id.parse().unwrap(),
            name: Some("eth1".into()),
            enabled,
            speed_kbps: Some(1_000_000),
        }
    }

    #[test]
    fn merge_preserves_port_links() {
        let store = MemoryStore::new();
        let mut tx = ReadWriteTransaction::new(&store);
        assert!(merge_port(&mut tx, raw_port("openflow:1:1", true), 1_000_000).unwrap());

        let location = Location::Port("openflow:1:1".parse().unwrap());
        let mut port = tx.get::<Port>(&location).unwrap().unwrap();
        port.add_port_link(PortLink {
            link_id: LinkId::new("l1").unwrap(),
            peer: "openflow:2:1".parse().unwrap(),
        });
        tx.put(&location, port);

        assert!(!merge_port(&mut tx, raw_port("openflow:1:1", false), 1_000_000).unwrap());
        let merged = tx.get::<Port>(&location).unwrap().unwrap();
        assert!(!merged.enabled);
        assert_eq!(merged.port_links.len(), 1);
    }

    #[test]
    fn identical_merge_stages_nothing() {
        let store = MemoryStore::new();
        let mut tx = ReadWriteTransaction::new(&store);
        merge_port(&mut tx, raw_port("openflow:1:1", true), 1_000_000).unwrap();
        tx.commit().unwrap();

        let mut tx = ReadWriteTransaction::new(&store);
        assert!(!merge_port(&mut tx, raw_port("openflow:1:1", true), 1_000_000).unwrap());
        assert!(!tx.is_dirty());
    }

    #[test]
    fn port_without_raw_node_is_skipped() {
        let store = MemoryStore::new();
        let mut tx = ReadWriteTransaction::new(&store);
        let mut updater = PortUpdater::new(1_000_000);
        let key: PortId = "openflow:1:1".parse().unwrap();
        assert!(!updater.add(&mut tx, &key, raw_port("openflow:1:1", true)).unwrap());
        assert!(!tx.is_dirty());
    }

    #[test]
    fn port_creates_missing_node_from_raw_record() {
        let store = MemoryStore::new();
        let mut tx = ReadWriteTransaction::new(&store);
        tx.put(
            &Location::RawNode("openflow:1".parse().unwrap()),
            RawNode {
                id: "openflow:1".parse().unwrap(),
                protocol_version: None,
            },
        );
        let mut updater = PortUpdater::new(1_000_000);
        let key: PortId = "openflow:1:1".parse().unwrap();
        assert!(updater.add(&mut tx, &key, raw_port("openflow:1:1", true)).unwrap());
        assert!(
            tx.get::<Node>(&Location::Node("openflow:1".parse().unwrap()))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn node_created_by_port_sweeps_sibling_ports() {
        let store = MemoryStore::new();
        let mut tx = ReadWriteTransaction::new(&store);
        tx.put(
            &Location::RawNode("openflow:1".parse().unwrap()),
            RawNode {
                id: "openflow:1".parse().unwrap(),
                protocol_version: None,
            },
        );
        for id in ["openflow:1:1", "openflow:1:3"] {
            tx.put(&Location::RawPort(id.parse().unwrap()), raw_port(id, true));
        }

        let mut updater = PortUpdater::new(1_000_000);
        let key: PortId = "openflow:1:1".parse().unwrap();
        assert!(updater.add(&mut tx, &key, raw_port("openflow:1:1", true)).unwrap());

        let sibling: PortId = "openflow:1:3".parse().unwrap();
        assert!(tx.get::<Port>(&Location::Port(sibling.clone())).unwrap().is_some());
        assert_eq!(updater.added, BTreeSet::from([key, sibling]));
    }
}
