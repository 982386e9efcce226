// ── Inventory reader ──
//
// Read-only view of the converged model for consumers. Every call reads
// the committed store; nothing is cached.

use std::sync::Arc;

use crate::error::CoreError;
use crate::model::{
    IgnoredLink, Link, LinkId, Node, NodeId, Port, PortId, StaticEdgePort, StaticSwitchLink,
};
use crate::store::{Datastore, Location, Partition, StorePath, StoredEntity, roots};

#[derive(Clone)]
pub struct InventoryReader {
    store: Arc<dyn Datastore>,
}

impl InventoryReader {
    pub(crate) fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    fn get<T: StoredEntity>(&self, location: &Location) -> Result<Option<T>, CoreError> {
        let path = location.path();
        match self.store.read(location.partition(), &path)? {
            None => Ok(None),
            Some(entity) => T::from_entity(entity)
                .map(Some)
                .ok_or(CoreError::UnexpectedEntity {
                    path,
                    expected: T::KIND,
                }),
        }
    }

    fn list<T: StoredEntity>(
        &self,
        partition: Partition,
        prefix: &StorePath,
    ) -> Result<Vec<T>, CoreError> {
        Ok(self
            .store
            .scan(partition, prefix)?
            .into_iter()
            .filter_map(|(_, entity)| T::from_entity(entity))
            .collect())
    }

    // ── Inventory ────────────────────────────────────────────────────

    pub fn nodes(&self) -> Result<Vec<Node>, CoreError> {
        self.list(Partition::Operational, &roots::nodes())
    }

    pub fn node(&self, id: &NodeId) -> Result<Option<Node>, CoreError> {
        self.get(&Location::Node(id.clone()))
    }

    /// Ports of `node`, ordered by path.
    pub fn ports(&self, node: &NodeId) -> Result<Vec<Port>, CoreError> {
        self.list(
            Partition::Operational,
            &Location::Node(node.clone()).path(),
        )
    }

    pub fn port(&self, id: &PortId) -> Result<Option<Port>, CoreError> {
        self.get(&Location::Port(id.clone()))
    }

    // ── Topology ─────────────────────────────────────────────────────

    pub fn links(&self) -> Result<Vec<Link>, CoreError> {
        self.list(Partition::Operational, &roots::links())
    }

    pub fn link(&self, id: &LinkId) -> Result<Option<Link>, CoreError> {
        self.get(&Location::Link(id.clone()))
    }

    /// Discovered links waiting for an endpoint or blocked by the overlay.
    pub fn ignored_links(&self) -> Result<Vec<IgnoredLink>, CoreError> {
        self.list(Partition::Operational, &roots::ignored_links())
    }

    pub fn static_switch_links(&self) -> Result<Vec<StaticSwitchLink>, CoreError> {
        self.list(Partition::Configuration, &roots::static_switch_links())
    }

    pub fn static_edge_ports(&self) -> Result<Vec<StaticEdgePort>, CoreError> {
        self.list(Partition::Configuration, &roots::static_edge_ports())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ReadWriteTransaction};

    #[test]
    fn ports_are_listed_per_node() {
        let store = Arc::new(MemoryStore::new());
        let mut tx = ReadWriteTransaction::new(store.as_ref());
        for node in ["openflow:1", "openflow:2"] {
            let id: NodeId = node.parse().unwrap();
            tx.put(
                &Location::Node(id.clone()),
                Node {
                    id: id.clone(),
                    protocol_version: None,
                },
            );
            tx.put(
                &Location::Port(id.port(1)),
                Port {
                    id: id.port(1),
                    name: None,
                    enabled: true,
                    cost: 1,
                    port_links: Vec::new(),
                },
            );
        }
        tx.commit().unwrap();

        let reader = InventoryReader::new(store);
        assert_eq!(reader.nodes().unwrap().len(), 2);
        let ports = reader.ports(&"openflow:1".parse().unwrap()).unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].id.to_string(), "openflow:1:1");
    }
}
