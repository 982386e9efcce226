// ── Static topology overlay ──
//
// User-declared switch links and edge ports live in the configuration
// partition. The listener collects the ports named by each change (old and
// new values), and the update task re-resolves only those ports. A
// file-backed copy is written through `StaticTopologyPersister` so the
// overlay survives a store reset; the store stays the source of truth.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use super::resolver::{self, StaticRules};
use crate::error::{CoreError, StoreError};
use crate::listener::{BatchListener, EventContext};
use crate::model::{PortId, StaticEdgePort, StaticSwitchLink, StaticTopology, UpdateType};
use crate::queue::TxQueue;
use crate::store::{
    DataChange, Datastore, Entity, Location, Partition, ReadWriteTransaction, StoredEntity, roots,
};
use crate::update::{InventoryTask, UpdateStrategy, UpdateTask};

// ── Persistence seam ─────────────────────────────────────────────────

/// Secondary, durable copy of the static overlay.
///
/// Switch links and edge ports are saved independently so a change to one
/// never rewrites the other.
pub trait StaticTopologyPersister: Send + Sync {
    fn load(&self) -> Result<StaticTopology, CoreError>;

    fn save_switch_links(&self, links: &[StaticSwitchLink]) -> Result<(), CoreError>;

    fn save_edge_ports(&self, ports: &[StaticEdgePort]) -> Result<(), CoreError>;
}

/// In-process persister, for tests and ephemeral engines.
#[derive(Debug, Default)]
pub struct MemoryPersister {
    state: Mutex<StaticTopology>,
}

impl MemoryPersister {
    pub fn new(initial: StaticTopology) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }

    pub fn snapshot(&self) -> StaticTopology {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl StaticTopologyPersister for MemoryPersister {
    fn load(&self) -> Result<StaticTopology, CoreError> {
        Ok(self.snapshot())
    }

    fn save_switch_links(&self, links: &[StaticSwitchLink]) -> Result<(), CoreError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .switch_links = links.to_vec();
        Ok(())
    }

    fn save_edge_ports(&self, ports: &[StaticEdgePort]) -> Result<(), CoreError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .edge_ports = ports.to_vec();
        Ok(())
    }
}

/// Read the committed overlay straight from the store.
pub(crate) fn committed_static_topology(
    store: &dyn Datastore,
) -> Result<StaticTopology, StoreError> {
    let switch_links = store
        .scan(Partition::Configuration, &roots::static_switch_links())?
        .into_iter()
        .filter_map(|(_, entity)| StaticSwitchLink::from_entity(entity))
        .collect();
    let edge_ports = store
        .scan(Partition::Configuration, &roots::static_edge_ports())?
        .into_iter()
        .filter_map(|(_, entity)| StaticEdgePort::from_entity(entity))
        .collect();
    Ok(StaticTopology {
        switch_links,
        edge_ports,
    })
}

// ── Listener ─────────────────────────────────────────────────────────

pub(crate) struct StaticTopologyContext {
    targets: EventContext<Location>,
    ports: BTreeSet<PortId>,
    switch_links_dirty: bool,
    edge_ports_dirty: bool,
}

/// Watches `/static-topology` in the configuration partition.
pub(crate) struct StaticTopologyListener {
    queue: TxQueue,
    store: Arc<dyn Datastore>,
    persister: Arc<dyn StaticTopologyPersister>,
}

impl StaticTopologyListener {
    pub(crate) fn new(
        queue: TxQueue,
        store: Arc<dyn Datastore>,
        persister: Arc<dyn StaticTopologyPersister>,
    ) -> Self {
        Self {
            queue,
            store,
            persister,
        }
    }
}

fn endpoints(entity: &Entity, ports: &mut BTreeSet<PortId>) {
    match entity {
        Entity::StaticSwitchLink(link) => {
            ports.insert(link.source.clone());
            ports.insert(link.destination.clone());
        }
        Entity::StaticEdgePort(edge) => {
            ports.insert(edge.port.clone());
        }
        _ => {}
    }
}

impl BatchListener for StaticTopologyListener {
    type Context = StaticTopologyContext;

    fn kind(&self) -> &'static str {
        "static-topology"
    }

    fn enter_event(&self) -> Self::Context {
        StaticTopologyContext {
            targets: EventContext::new(),
            ports: BTreeSet::new(),
            switch_links_dirty: false,
            edge_ports_dirty: false,
        }
    }

    fn record(
        &self,
        ctx: &mut Self::Context,
        location: Location,
        update: UpdateType,
        change: &DataChange,
    ) -> bool {
        match &location {
            Location::StaticSwitchLink(source) => {
                ctx.switch_links_dirty = true;
                ctx.ports.insert(source.clone());
            }
            Location::StaticEdgePort(port) => {
                ctx.edge_ports_dirty = true;
                ctx.ports.insert(port.clone());
            }
            _ => return false,
        }
        // Both the old and the new value name affected ports.
        for entity in change.before.iter().chain(change.after.iter()) {
            endpoints(entity, &mut ctx.ports);
        }
        ctx.targets.add(update, location.clone(), location);
        true
    }

    fn exit_event(&self, ctx: Self::Context) {
        if ctx.targets.is_empty() {
            return;
        }
        let (created, updated, removed) = ctx.targets.counts();
        debug!(
            created,
            updated,
            removed,
            ports = ctx.ports.len(),
            "static topology batch collected"
        );
        let updater = StaticTopologyUpdater {
            ports: ctx.ports,
            switch_links_dirty: ctx.switch_links_dirty,
            edge_ports_dirty: ctx.edge_ports_dirty,
            store: Arc::clone(&self.store),
            persister: Arc::clone(&self.persister),
        };
        let task = UpdateTask::new(updater, ctx.targets.into_targets());
        self.queue.post(Box::new(InventoryTask::StaticTopology(task)));
    }
}

// ── Updater ──────────────────────────────────────────────────────────

pub(crate) struct StaticTopologyUpdater {
    ports: BTreeSet<PortId>,
    switch_links_dirty: bool,
    edge_ports_dirty: bool,
    store: Arc<dyn Datastore>,
    persister: Arc<dyn StaticTopologyPersister>,
}

impl StaticTopologyUpdater {
    /// Write the dirty halves of the committed overlay to the persister.
    fn persist(&self) {
        if !self.switch_links_dirty && !self.edge_ports_dirty {
            return;
        }
        let topology = match committed_static_topology(self.store.as_ref()) {
            Ok(topology) => topology,
            Err(e) => {
                warn!(error = %e, "static topology not persisted: store read failed");
                return;
            }
        };
        if self.switch_links_dirty {
            if let Err(e) = self.persister.save_switch_links(&topology.switch_links) {
                warn!(error = %e, "failed to persist static switch links");
            }
        }
        if self.edge_ports_dirty {
            if let Err(e) = self.persister.save_edge_ports(&topology.edge_ports) {
                warn!(error = %e, "failed to persist static edge ports");
            }
        }
    }
}

impl UpdateStrategy for StaticTopologyUpdater {
    type Key = Location;
    type Raw = Entity;

    const KIND: &'static str = "static-topology";

    fn add(
        &mut self,
        _tx: &mut ReadWriteTransaction<'_>,
        key: &Location,
        raw: Entity,
    ) -> Result<bool, CoreError> {
        let consistent = match (key, &raw) {
            (Location::StaticSwitchLink(source), Entity::StaticSwitchLink(link)) => {
                link.source == *source
            }
            (Location::StaticEdgePort(port), Entity::StaticEdgePort(edge)) => edge.port == *port,
            _ => false,
        };
        if !consistent {
            warn!(location = %key, kind = raw.kind(), "static entry does not match its path");
        }
        Ok(false)
    }

    fn remove(
        &mut self,
        _tx: &mut ReadWriteTransaction<'_>,
        _key: &Location,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    fn fix_up(&mut self, tx: &mut ReadWriteTransaction<'_>, _added: bool) -> Result<(), CoreError> {
        let rules = StaticRules::load(tx)?;
        for port in &self.ports {
            resolver::revalidate_port(tx, &rules, port)?;
        }
        let forced = resolver::resolve_static(tx, &rules, &self.ports)?;
        let promoted = resolver::resolve_ignored(tx, &rules, &self.ports)?;
        debug!(ports = self.ports.len(), forced, promoted, "static overlay applied");
        Ok(())
    }

    fn on_success(&mut self) {
        self.persist();
    }

    fn on_failure(&mut self, _error: &CoreError) {
        // The configuration itself is committed; keep the durable copy in step.
        self.persist();
    }
}

// ── Manager ──────────────────────────────────────────────────────────

/// Read/write surface over the static overlay in the configuration
/// partition. Writes are picked up by the static topology listener.
#[derive(Clone)]
pub struct StaticTopologyManager {
    store: Arc<dyn Datastore>,
    persister: Arc<dyn StaticTopologyPersister>,
}

impl StaticTopologyManager {
    pub(crate) fn new(
        store: Arc<dyn Datastore>,
        persister: Arc<dyn StaticTopologyPersister>,
    ) -> Self {
        Self { store, persister }
    }

    /// Declare (or redirect) the static link leaving `link.source`.
    pub fn set_switch_link(&self, link: StaticSwitchLink) -> Result<(), CoreError> {
        let mut tx = ReadWriteTransaction::new(self.store.as_ref());
        tx.put(&Location::StaticSwitchLink(link.source.clone()), link);
        tx.commit()?;
        Ok(())
    }

    /// Returns `false` if no static link left `source`.
    pub fn remove_switch_link(&self, source: &PortId) -> Result<bool, CoreError> {
        self.remove(&Location::StaticSwitchLink(source.clone()))
    }

    pub fn add_edge_port(&self, port: PortId) -> Result<(), CoreError> {
        let mut tx = ReadWriteTransaction::new(self.store.as_ref());
        tx.put(
            &Location::StaticEdgePort(port.clone()),
            StaticEdgePort { port },
        );
        tx.commit()?;
        Ok(())
    }

    /// Returns `false` if `port` wasn't an edge port.
    pub fn remove_edge_port(&self, port: &PortId) -> Result<bool, CoreError> {
        self.remove(&Location::StaticEdgePort(port.clone()))
    }

    /// The overlay as currently committed.
    pub fn current(&self) -> Result<StaticTopology, CoreError> {
        Ok(committed_static_topology(self.store.as_ref())?)
    }

    /// Copy persisted entries into the configuration partition, keeping any
    /// entry the store already holds. Returns how many were written.
    pub fn restore(&self) -> Result<usize, CoreError> {
        let topology = self.persister.load()?;
        let mut tx = ReadWriteTransaction::new(self.store.as_ref());
        let mut written = 0;
        for link in topology.switch_links {
            let location = Location::StaticSwitchLink(link.source.clone());
            if tx.get::<StaticSwitchLink>(&location)?.is_none() {
                tx.put(&location, link);
                written += 1;
            }
        }
        for edge in topology.edge_ports {
            let location = Location::StaticEdgePort(edge.port.clone());
            if tx.get::<StaticEdgePort>(&location)?.is_none() {
                tx.put(&location, edge);
                written += 1;
            }
        }
        tx.commit()?;
        info!(entries = written, "static topology restored");
        Ok(written)
    }

    fn remove(&self, location: &Location) -> Result<bool, CoreError> {
        let mut tx = ReadWriteTransaction::new(self.store.as_ref());
        if tx.read(location.partition(), &location.path())?.is_none() {
            return Ok(false);
        }
        tx.delete(location)?;
        tx.commit()?;
        Ok(true)
    }
}
