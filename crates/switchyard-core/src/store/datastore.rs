// ── Datastore seam ──
//
// The transactional key/value store is an external collaborator. The
// engine only needs point reads, subtree scans, atomic batch commits and
// per-commit change notification; `MemoryStore` is the in-process
// implementation used by tests and the CLI.

use std::fmt;
use std::sync::Arc;

use super::entity::Entity;
use super::path::{Partition, StorePath};
use crate::error::StoreError;

/// One staged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Create or overwrite the entry at `path`.
    Put {
        partition: Partition,
        path: StorePath,
        entity: Entity,
    },
    /// Remove the entry at `path` and everything below it.
    Delete {
        partition: Partition,
        path: StorePath,
    },
}

/// One changed entry within a committed batch.
///
/// `before: None` is a creation, `after: None` a removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChange {
    pub partition: Partition,
    pub path: StorePath,
    pub before: Option<Entity>,
    pub after: Option<Entity>,
}

/// Receives the changes of each commit that touch a registered subtree.
///
/// Called synchronously on the committing thread, one call per commit.
/// Implementations must not commit to the same store from inside the
/// callback.
pub trait DataChangeListener: Send + Sync {
    fn on_data_changed(&self, changes: &[DataChange]);
}

/// Hierarchical transactional datastore.
pub trait Datastore: Send + Sync {
    /// Read the entry stored exactly at `path`.
    fn read(&self, partition: Partition, path: &StorePath) -> Result<Option<Entity>, StoreError>;

    /// All entries strictly below `prefix`, in path order.
    fn scan(
        &self,
        partition: Partition,
        prefix: &StorePath,
    ) -> Result<Vec<(StorePath, Entity)>, StoreError>;

    /// Apply all operations atomically, in order.
    fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    /// Subscribe to changes at or below `prefix` in `partition`.
    fn register_listener(
        &self,
        partition: Partition,
        prefix: StorePath,
        listener: Arc<dyn DataChangeListener>,
    ) -> ListenerRegistration;
}

/// Handle for a listener subscription. Dropping it unsubscribes.
pub struct ListenerRegistration {
    closer: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerRegistration {
    pub fn new(closer: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            closer: Some(Box::new(closer)),
        }
    }

    /// Unsubscribe now. Idempotent.
    pub fn close(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("open", &self.closer.is_some())
            .finish()
    }
}
