// ── Inventory manager ──
//
// Facade wiring the engine together: the transaction queue, the discovery
// and static-topology listeners, the event publisher and the node
// lifecycle registry, all bound to one injected datastore.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::inventory::{LinkListener, NodeListener, PortListener};
use crate::model::InventoryEvent;
use crate::publisher::{EventPublisher, InventoryListener};
use crate::queue::TxQueue;
use crate::rpc::NodeRpcRegistry;
use crate::store::{
    DataChange, DataChangeListener, Datastore, ListenerRegistration, Partition, StorePath, roots,
};
use crate::topology::{
    InventoryReader, StaticTopologyListener, StaticTopologyManager, StaticTopologyPersister,
};

/// The main entry point for embedders.
///
/// Cheaply cloneable via `Arc<ManagerInner>`. Nothing runs until
/// [`start()`](Self::start); [`shutdown()`](Self::shutdown) unsubscribes
/// every listener and stops the queue worker.
#[derive(Clone)]
pub struct InventoryManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: EngineConfig,
    store: Arc<dyn Datastore>,
    persister: Arc<dyn StaticTopologyPersister>,
    queue: TxQueue,
    publisher: Arc<EventPublisher>,
    registry: Arc<NodeRpcRegistry>,
    static_topology: StaticTopologyManager,
    cancel: CancellationToken,
    registrations: Mutex<Vec<ListenerRegistration>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InventoryManager {
    /// Build an engine over `store`. Does NOT start it.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn Datastore>,
        persister: Arc<dyn StaticTopologyPersister>,
    ) -> Self {
        let publisher = Arc::new(EventPublisher::new(
            config.initial_owner,
            config.event_channel_size,
        ));
        Self {
            inner: Arc::new(ManagerInner {
                queue: TxQueue::new(Arc::clone(&store)),
                static_topology: StaticTopologyManager::new(
                    Arc::clone(&store),
                    Arc::clone(&persister),
                ),
                config,
                store,
                persister,
                publisher,
                registry: Arc::new(NodeRpcRegistry::new()),
                cancel: CancellationToken::new(),
                registrations: Mutex::new(Vec::new()),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn Datastore> {
        &self.inner.store
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the queue worker, subscribe the listeners and converge on
    /// whatever raw state the store already holds. Must run inside a
    /// tokio runtime.
    pub async fn start(&self) -> Result<(), CoreError> {
        let inner = &self.inner;
        let Some(worker) = inner.queue.start(inner.cancel.child_token()) else {
            return Err(CoreError::Internal("inventory manager already started".into()));
        };
        *inner.worker.lock().await = Some(worker);

        let cost_base = inner.config.port_cost_base;
        let node_listener = Arc::new(NodeListener::new(inner.queue.clone(), cost_base));
        let port_listener = Arc::new(PortListener::new(inner.queue.clone(), cost_base));
        let link_listener = Arc::new(LinkListener::new(inner.queue.clone()));
        let static_listener = Arc::new(StaticTopologyListener::new(
            inner.queue.clone(),
            Arc::clone(&inner.store),
            Arc::clone(&inner.persister),
        ));

        let store = inner.store.as_ref();
        let registrations = vec![
            store.register_listener(
                Partition::Operational,
                roots::nodes(),
                inner.registry.clone(),
            ),
            store.register_listener(
                Partition::Operational,
                roots::derived_inventory(),
                inner.publisher.clone(),
            ),
            store.register_listener(
                Partition::Operational,
                roots::raw_nodes(),
                node_listener.clone(),
            ),
            store.register_listener(
                Partition::Operational,
                roots::raw_nodes(),
                port_listener.clone(),
            ),
            store.register_listener(
                Partition::Operational,
                roots::raw_links(),
                link_listener.clone(),
            ),
            store.register_listener(
                Partition::Configuration,
                roots::static_topology(),
                static_listener.clone(),
            ),
        ];
        inner.registrations.lock().await.extend(registrations);

        let tracked = inner.registry.seed(store)?;
        debug!(nodes = tracked, "node lifecycle registry seeded");

        // Replay what discovery and configuration reported before start.
        replay_existing(store, Partition::Operational, &roots::raw_nodes(), &[
            &*node_listener,
            &*port_listener,
        ])?;
        replay_existing(store, Partition::Operational, &roots::raw_links(), &[
            &*link_listener,
        ])?;
        replay_existing(
            store,
            Partition::Configuration,
            &roots::static_topology(),
            &[&*static_listener],
        )?;

        if inner.config.restore_static_topology {
            if let Err(e) = inner.static_topology.restore() {
                warn!(error = %e, "static topology not restored, continuing without overlay");
            }
        }

        info!(owner = inner.publisher.is_owner(), "inventory manager started");
        Ok(())
    }

    /// Unsubscribe every listener and stop the queue worker. Tasks still
    /// queued are failed with [`CoreError::QueueClosed`].
    pub async fn shutdown(&self) {
        self.inner.registrations.lock().await.clear();
        self.inner.cancel.cancel();
        if let Some(worker) = self.inner.worker.lock().await.take() {
            if let Err(e) = worker.await {
                error!(error = %e, "transaction queue worker failed");
            }
        }
        info!("inventory manager stopped");
    }

    /// Wait until every task queued so far has run.
    pub async fn sync(&self) -> Result<(), CoreError> {
        self.inner.queue.sync().await
    }

    // ── Ownership ────────────────────────────────────────────────────

    /// Set whether this instance owns the inventory. Returns the previous
    /// value.
    pub fn set_owner(&self, owner: bool) -> bool {
        self.inner.publisher.set_owner(owner)
    }

    pub fn is_owner(&self) -> bool {
        self.inner.publisher.is_owner()
    }

    pub fn ownership(&self) -> watch::Receiver<bool> {
        self.inner.publisher.ownership()
    }

    // ── Subscribers ──────────────────────────────────────────────────

    pub fn add_inventory_listener(&self, listener: Arc<dyn InventoryListener>) {
        self.inner.publisher.add_listener(listener);
    }

    pub fn remove_inventory_listener(&self, listener: &Arc<dyn InventoryListener>) -> bool {
        self.inner.publisher.remove_listener(listener)
    }

    /// Subscribe to the inventory event stream. Same order and owner gating
    /// as the listener callbacks.
    pub fn events(&self) -> broadcast::Receiver<Arc<InventoryEvent>> {
        self.inner.publisher.subscribe()
    }

    // ── Collaborators ────────────────────────────────────────────────

    pub fn rpc_registry(&self) -> &Arc<NodeRpcRegistry> {
        &self.inner.registry
    }

    pub fn static_topology(&self) -> &StaticTopologyManager {
        &self.inner.static_topology
    }

    pub fn reader(&self) -> InventoryReader {
        InventoryReader::new(Arc::clone(&self.inner.store))
    }
}

/// Feed the entries already under `prefix` to `listeners` as creations.
fn replay_existing(
    store: &dyn Datastore,
    partition: Partition,
    prefix: &StorePath,
    listeners: &[&dyn DataChangeListener],
) -> Result<(), CoreError> {
    let changes: Vec<DataChange> = store
        .scan(partition, prefix)?
        .into_iter()
        .map(|(path, entity)| DataChange {
            partition,
            path,
            before: None,
            after: Some(entity),
        })
        .collect();
    if changes.is_empty() {
        return Ok(());
    }
    debug!(%prefix, entries = changes.len(), "replaying existing entries");
    for listener in listeners {
        listener.on_data_changed(&changes);
    }
    Ok(())
}
