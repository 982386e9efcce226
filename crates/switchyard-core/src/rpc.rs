// ── Node lifecycle registry ──
//
// Tracks in-flight remote operations per derived node so they can be
// cancelled when the node disappears. A node is tracked from its creation
// in the derived inventory until its removal. Registration against an
// untracked node cancels the operation on the spot, so an operation can
// never outlive its node.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::{Node, NodeId};
use crate::store::{DataChange, DataChangeListener, Datastore, Location, Partition, StoredEntity, roots};

/// An outstanding operation against a switch.
pub trait RemoteOperation: Send + Sync {
    /// Request cancellation. Returns `true` only for the call that actually
    /// cancelled it; later calls are no-ops.
    fn cancel(&self) -> bool;

    /// Label used in logs.
    fn describe(&self) -> String {
        "remote operation".into()
    }
}

/// Cancellable operation backed by a [`CancellationToken`].
#[derive(Debug)]
pub struct RpcHandle {
    label: String,
    token: CancellationToken,
    cancelled: AtomicBool,
}

impl RpcHandle {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: CancellationToken::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once the operation is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Child token for work that should stop with this operation.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

impl RemoteOperation for RpcHandle {
    fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Receipt for a registered operation, used to unregister it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcRegistration {
    pub node: NodeId,
    pub id: u64,
}

// ── Registry ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct NodeRpcRegistry {
    nodes: DashMap<NodeId, HashMap<u64, Arc<dyn RemoteOperation>>>,
    next_id: AtomicU64,
}

impl NodeRpcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `operation` to `node`.
    ///
    /// Returns `None`, with the operation already cancelled, if the node is
    /// not in the derived inventory.
    pub fn register_rpc(
        &self,
        node: &NodeId,
        operation: Arc<dyn RemoteOperation>,
    ) -> Option<RpcRegistration> {
        // The shard lock held by `get_mut` orders this against `node_removed`.
        if let Some(mut ops) = self.nodes.get_mut(node) {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            ops.insert(id, operation);
            debug!(%node, id, "remote operation registered");
            return Some(RpcRegistration {
                node: node.clone(),
                id,
            });
        }
        debug!(%node, operation = %operation.describe(), "node not tracked, operation cancelled");
        operation.cancel();
        None
    }

    /// Forget a finished operation. Returns `false` if it was already gone.
    pub fn unregister_rpc(&self, registration: &RpcRegistration) -> bool {
        self.nodes
            .get_mut(&registration.node)
            .is_some_and(|mut ops| ops.remove(&registration.id).is_some())
    }

    pub fn is_tracked(&self, node: &NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    /// Number of operations outstanding against `node`.
    pub fn pending(&self, node: &NodeId) -> usize {
        self.nodes.get(node).map_or(0, |ops| ops.len())
    }

    pub(crate) fn node_added(&self, node: &NodeId) {
        self.nodes.entry(node.clone()).or_default();
    }

    /// Stop tracking `node` and cancel everything bound to it. Returns how
    /// many operations were cancelled.
    pub(crate) fn node_removed(&self, node: &NodeId) -> usize {
        let Some((_, ops)) = self.nodes.remove(node) else {
            return 0;
        };
        let cancelled = ops.values().filter(|op| op.cancel()).count();
        if cancelled > 0 {
            info!(%node, cancelled, "remote operations cancelled with node");
        }
        cancelled
    }

    /// Track every node already in the derived inventory.
    pub(crate) fn seed(&self, store: &dyn Datastore) -> Result<usize, CoreError> {
        let nodes: Vec<Node> = store
            .scan(Partition::Operational, &roots::nodes())?
            .into_iter()
            .filter_map(|(_, entity)| Node::from_entity(entity))
            .collect();
        for node in &nodes {
            self.node_added(&node.id);
        }
        Ok(nodes.len())
    }
}

impl DataChangeListener for NodeRpcRegistry {
    fn on_data_changed(&self, changes: &[DataChange]) {
        for change in changes {
            let Ok(Location::Node(node)) = Location::parse(change.partition, &change.path) else {
                continue;
            };
            match (&change.before, &change.after) {
                (None, Some(_)) => self.node_added(&node),
                (Some(_), None) => {
                    self.node_removed(&node);
                }
                _ => {}
            }
        }
    }
}
