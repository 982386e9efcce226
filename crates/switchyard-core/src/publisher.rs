// ── Inventory event publisher ──
//
// Turns each committed change batch under `/derived-inventory` into node
// and port events and hands them to subscribers in a fixed order:
//
//   node CREATED, node CHANGED, port CREATED, port CHANGED,
//   port REMOVED, node REMOVED
//
// A port removed while still attached first reports the loss of its links
// as a CHANGED event. Publication only happens while this instance owns the
// inventory; derived state converges either way.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, trace, warn};

use crate::model::{InventoryEvent, NodeEvent, Port, PortEvent, UpdateType};
use crate::store::{DataChange, DataChangeListener, Entity, Location};

/// Error type returned by subscriber callbacks.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Subscriber for inventory events.
///
/// Callbacks run synchronously on the thread that committed the change and
/// must not write to the store. An error (or a panic) is logged and the
/// remaining subscribers still receive the event.
pub trait InventoryListener: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> &str {
        "inventory-listener"
    }

    fn on_node_event(&self, _event: &NodeEvent) -> Result<(), ListenerError> {
        Ok(())
    }

    fn on_port_event(&self, _event: &PortEvent) -> Result<(), ListenerError> {
        Ok(())
    }
}

// ── Ordering ─────────────────────────────────────────────────────────

/// Events of one batch, bucketed by delivery slot.
#[derive(Default)]
struct EventCollector {
    node_created: Vec<NodeEvent>,
    node_changed: Vec<NodeEvent>,
    port_created: Vec<PortEvent>,
    port_changed: Vec<PortEvent>,
    port_removed: Vec<PortEvent>,
    node_removed: Vec<NodeEvent>,
}

impl EventCollector {
    fn collect(&mut self, change: &DataChange) {
        let location = match Location::parse(change.partition, &change.path) {
            Ok(location) => location,
            Err(e) => {
                trace!(path = %change.path, error = %e, "not an inventory path");
                return;
            }
        };
        match location {
            Location::Node(_) => self.collect_node(change),
            Location::Port(_) => self.collect_port(change),
            _ => {}
        }
    }

    fn collect_node(&mut self, change: &DataChange) {
        let as_node = |entity: &Option<Entity>| match entity {
            Some(Entity::Node(node)) => Some(node.clone()),
            _ => None,
        };
        match (as_node(&change.before), as_node(&change.after)) {
            (None, Some(new)) => self
                .node_created
                .push(NodeEvent::new(&new, UpdateType::Created)),
            (Some(_), Some(new)) => self
                .node_changed
                .push(NodeEvent::new(&new, UpdateType::Changed)),
            (Some(old), None) => self
                .node_removed
                .push(NodeEvent::new(&old, UpdateType::Removed)),
            (None, None) => debug!(path = %change.path, "node change without a node entity"),
        }
    }

    fn collect_port(&mut self, change: &DataChange) {
        let as_port = |entity: &Option<Entity>| -> Option<Port> {
            match entity {
                Some(Entity::Port(port)) => Some(port.clone()),
                _ => None,
            }
        };
        match (as_port(&change.before), as_port(&change.after)) {
            (None, Some(new)) => self.port_created.push(PortEvent::created(&new)),
            (Some(old), Some(new)) => self.port_changed.push(PortEvent::changed(&old, &new)),
            (Some(old), None) => {
                if old.has_inter_switch_link() {
                    self.port_changed.push(PortEvent::links_detached(&old));
                }
                self.port_removed.push(PortEvent::removed(&old));
            }
            (None, None) => debug!(path = %change.path, "port change without a port entity"),
        }
    }

    fn into_events(self) -> Vec<InventoryEvent> {
        let nodes = |events: Vec<NodeEvent>| events.into_iter().map(InventoryEvent::Node);
        let ports = |events: Vec<PortEvent>| events.into_iter().map(InventoryEvent::Port);
        nodes(self.node_created)
            .chain(nodes(self.node_changed))
            .chain(ports(self.port_created))
            .chain(ports(self.port_changed))
            .chain(ports(self.port_removed))
            .chain(nodes(self.node_removed))
            .collect()
    }
}

/// Order the inventory events carried by one change batch.
pub(crate) fn order_events(changes: &[DataChange]) -> Vec<InventoryEvent> {
    let mut collector = EventCollector::default();
    for change in changes {
        collector.collect(change);
    }
    collector.into_events()
}

// ── Publisher ────────────────────────────────────────────────────────

pub(crate) struct EventPublisher {
    listeners: RwLock<Vec<Arc<dyn InventoryListener>>>,
    owner: watch::Sender<bool>,
    events: broadcast::Sender<Arc<InventoryEvent>>,
}

impl EventPublisher {
    pub(crate) fn new(initial_owner: bool, channel_size: usize) -> Self {
        let (owner, _) = watch::channel(initial_owner);
        let (events, _) = broadcast::channel(channel_size.max(1));
        Self {
            listeners: RwLock::new(Vec::new()),
            owner,
            events,
        }
    }

    pub(crate) fn add_listener(&self, listener: Arc<dyn InventoryListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Remove a subscriber by identity. Returns `false` if it wasn't added.
    pub(crate) fn remove_listener(&self, listener: &Arc<dyn InventoryListener>) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        before != listeners.len()
    }

    /// Returns the previous ownership.
    pub(crate) fn set_owner(&self, owner: bool) -> bool {
        let previous = self.owner.send_replace(owner);
        if previous != owner {
            info!(owner, "inventory ownership changed");
        }
        previous
    }

    pub(crate) fn is_owner(&self) -> bool {
        *self.owner.borrow()
    }

    pub(crate) fn ownership(&self) -> watch::Receiver<bool> {
        self.owner.subscribe()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Arc<InventoryEvent>> {
        self.events.subscribe()
    }

    fn dispatch(&self, event: &InventoryEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| match event {
                InventoryEvent::Node(e) => listener.on_node_event(e),
                InventoryEvent::Port(e) => listener.on_port_event(e),
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(listener = listener.name(), error = %e, "inventory listener failed");
                }
                Err(_) => error!(listener = listener.name(), "inventory listener panicked"),
            }
        }
        // No receivers is fine.
        let _ = self.events.send(Arc::new(event.clone()));
    }
}

impl DataChangeListener for EventPublisher {
    fn on_data_changed(&self, changes: &[DataChange]) {
        if !self.is_owner() {
            trace!(changes = changes.len(), "not owner, inventory events suppressed");
            return;
        }
        for event in order_events(changes) {
            self.dispatch(&event);
        }
    }
}
