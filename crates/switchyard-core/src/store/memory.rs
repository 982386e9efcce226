// ── In-memory datastore ──
//
// `BTreeMap`-backed implementation of the `Datastore` seam. Commits are
// serialized and applied under a single write lock, so every commit is
// atomic for readers. Change batches are computed while applying and
// delivered after the data lock is released, still in commit order.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use indexmap::IndexMap;
use tracing::trace;

use super::datastore::{DataChange, DataChangeListener, Datastore, ListenerRegistration, WriteOp};
use super::entity::Entity;
use super::path::{Partition, StorePath};
use crate::error::StoreError;

type Tree = BTreeMap<StorePath, Entity>;

struct ListenerEntry {
    id: u64,
    partition: Partition,
    prefix: StorePath,
    listener: Arc<dyn DataChangeListener>,
}

/// Thread-safe in-memory datastore with change notification.
pub struct MemoryStore {
    operational: RwLock<Tree>,
    configuration: RwLock<Tree>,
    /// Serializes commit + delivery so listeners see batches in commit order.
    commit_lock: Mutex<()>,
    listeners: Arc<RwLock<Vec<ListenerEntry>>>,
    next_listener_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            operational: RwLock::new(BTreeMap::new()),
            configuration: RwLock::new(BTreeMap::new()),
            commit_lock: Mutex::new(()),
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Number of entries in `partition`.
    pub fn len(&self, partition: Partition) -> usize {
        self.tree(partition)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self, partition: Partition) -> bool {
        self.len(partition) == 0
    }

    /// Number of live listener registrations.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn tree(&self, partition: Partition) -> &RwLock<Tree> {
        match partition {
            Partition::Operational => &self.operational,
            Partition::Configuration => &self.configuration,
        }
    }

    fn descendants(tree: &Tree, prefix: &StorePath) -> Vec<StorePath> {
        tree.range((Bound::Excluded(prefix.clone()), Bound::Unbounded))
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Apply `ops` to both trees, recording first-before / last-after per path.
    fn apply(
        &self,
        ops: Vec<WriteOp>,
    ) -> IndexMap<(Partition, StorePath), (Option<Entity>, Option<Entity>)> {
        let mut operational = self
            .operational
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut configuration = self
            .configuration
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut changes: IndexMap<(Partition, StorePath), (Option<Entity>, Option<Entity>)> =
            IndexMap::new();
        let mut record = |partition: Partition,
                          path: StorePath,
                          before: Option<Entity>,
                          after: Option<Entity>| {
            changes
                .entry((partition, path))
                .and_modify(|(_, last)| last.clone_from(&after))
                .or_insert((before, after));
        };

        for op in ops {
            match op {
                WriteOp::Put {
                    partition,
                    path,
                    entity,
                } => {
                    let tree = match partition {
                        Partition::Operational => &mut *operational,
                        Partition::Configuration => &mut *configuration,
                    };
                    let before = tree.insert(path.clone(), entity.clone());
                    record(partition, path, before, Some(entity));
                }
                WriteOp::Delete { partition, path } => {
                    let tree = match partition {
                        Partition::Operational => &mut *operational,
                        Partition::Configuration => &mut *configuration,
                    };
                    let mut doomed = Self::descendants(tree, &path);
                    doomed.insert(0, path);
                    for victim in doomed {
                        if let Some(before) = tree.remove(&victim) {
                            record(partition, victim, Some(before), None);
                        }
                    }
                }
            }
        }

        changes.retain(|_, (before, after)| before != after);
        changes
    }

    fn deliver(
        &self,
        changes: &IndexMap<(Partition, StorePath), (Option<Entity>, Option<Entity>)>,
    ) {
        if changes.is_empty() {
            return;
        }

        // Snapshot the matching listeners so callbacks run without the lock.
        let batches: Vec<(Arc<dyn DataChangeListener>, Vec<DataChange>)> = {
            let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            listeners
                .iter()
                .filter_map(|entry| {
                    let batch: Vec<DataChange> = changes
                        .iter()
                        .filter(|((partition, path), _)| {
                            *partition == entry.partition && path.starts_with(&entry.prefix)
                        })
                        .map(|((partition, path), (before, after))| DataChange {
                            partition: *partition,
                            path: path.clone(),
                            before: before.clone(),
                            after: after.clone(),
                        })
                        .collect();
                    (!batch.is_empty()).then(|| (Arc::clone(&entry.listener), batch))
                })
                .collect()
        };

        for (listener, batch) in batches {
            trace!(changes = batch.len(), "delivering change batch");
            listener.on_data_changed(&batch);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Datastore for MemoryStore {
    fn read(&self, partition: Partition, path: &StorePath) -> Result<Option<Entity>, StoreError> {
        Ok(self
            .tree(partition)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned())
    }

    fn scan(
        &self,
        partition: Partition,
        prefix: &StorePath,
    ) -> Result<Vec<(StorePath, Entity)>, StoreError> {
        let tree = self.tree(partition).read().unwrap_or_else(PoisonError::into_inner);
        Ok(tree
            .range((Bound::Excluded(prefix.clone()), Bound::Unbounded))
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, entity)| (path.clone(), entity.clone()))
            .collect())
    }

    fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let _serial = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let changes = self.apply(ops);
        self.deliver(&changes);
        Ok(())
    }

    fn register_listener(
        &self,
        partition: Partition,
        prefix: StorePath,
        listener: Arc<dyn DataChangeListener>,
    ) -> ListenerRegistration {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ListenerEntry {
                id,
                partition,
                prefix,
                listener,
            });

        let listeners: Weak<RwLock<Vec<ListenerEntry>>> = Arc::downgrade(&self.listeners);
        ListenerRegistration::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|entry| entry.id != id);
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::RawNode;
    use crate::store::path::{Location, roots};

    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<Vec<DataChange>>>,
    }

    impl DataChangeListener for Recorder {
        fn on_data_changed(&self, changes: &[DataChange]) {
            self.batches.lock().unwrap().push(changes.to_vec());
        }
    }

    fn node(id: &str) -> (StorePath, Entity) {
        let node = RawNode {
            id: id.parse().unwrap(),
            protocol_version: None,
        };
        (Location::RawNode(node.id.clone()).path(), Entity::RawNode(node))
    }

    fn put((path, entity): (StorePath, Entity)) -> WriteOp {
        WriteOp::Put {
            partition: Partition::Operational,
            path,
            entity,
        }
    }

    #[test]
    fn commit_is_visible_to_reads_and_scans() {
        let store = MemoryStore::new();
        store.commit(vec![put(node("openflow:1")), put(node("openflow:2"))]).unwrap();

        let (path, _) = node("openflow:1");
        assert!(store.read(Partition::Operational, &path).unwrap().is_some());
        assert!(store.read(Partition::Configuration, &path).unwrap().is_none());
        assert_eq!(store.scan(Partition::Operational, &roots::raw_nodes()).unwrap().len(), 2);
    }

    #[test]
    fn delete_removes_subtree_and_reports_each_entry() {
        let store = MemoryStore::new();
        let (path, entity) = node("openflow:1");
        let child = path.child("port").child("openflow:1:1");
        store
            .commit(vec![
                put((path.clone(), entity.clone())),
                put((child.clone(), entity)),
            ])
            .unwrap();

        let recorder = Arc::new(Recorder::default());
        let _reg = store.register_listener(
            Partition::Operational,
            roots::raw_nodes(),
            Arc::clone(&recorder) as Arc<dyn DataChangeListener>,
        );

        store
            .commit(vec![WriteOp::Delete {
                partition: Partition::Operational,
                path: path.clone(),
            }])
            .unwrap();

        assert!(store.is_empty(Partition::Operational));
        let batches = recorder.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let paths: Vec<_> = batches[0].iter().map(|c| c.path.clone()).collect();
        assert_eq!(paths, vec![path, child]);
        assert!(batches[0].iter().all(|c| c.after.is_none()));
    }

    #[test]
    fn identical_put_produces_no_change() {
        let store = MemoryStore::new();
        let recorder = Arc::new(Recorder::default());
        let _reg = store.register_listener(
            Partition::Operational,
            roots::raw_nodes(),
            Arc::clone(&recorder) as Arc<dyn DataChangeListener>,
        );

        store.commit(vec![put(node("openflow:1"))]).unwrap();
        store.commit(vec![put(node("openflow:1"))]).unwrap();

        assert_eq!(recorder.batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn put_then_delete_in_one_commit_cancels_out() {
        let store = MemoryStore::new();
        let recorder = Arc::new(Recorder::default());
        let _reg = store.register_listener(
            Partition::Operational,
            roots::raw_nodes(),
            Arc::clone(&recorder) as Arc<dyn DataChangeListener>,
        );

        let (path, entity) = node("openflow:1");
        store
            .commit(vec![
                put((path.clone(), entity)),
                WriteOp::Delete {
                    partition: Partition::Operational,
                    path,
                },
            ])
            .unwrap();

        assert!(recorder.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn dropping_registration_unsubscribes() {
        let store = MemoryStore::new();
        let recorder = Arc::new(Recorder::default());
        let reg = store.register_listener(
            Partition::Operational,
            roots::raw_nodes(),
            Arc::clone(&recorder) as Arc<dyn DataChangeListener>,
        );
        assert_eq!(store.listener_count(), 1);
        drop(reg);
        assert_eq!(store.listener_count(), 0);

        store.commit(vec![put(node("openflow:1"))]).unwrap();
        assert!(recorder.batches.lock().unwrap().is_empty());
    }

    #[test]
    fn listeners_only_see_their_subtree() {
        let store = MemoryStore::new();
        let recorder = Arc::new(Recorder::default());
        let _reg = store.register_listener(
            Partition::Operational,
            roots::raw_links(),
            Arc::clone(&recorder) as Arc<dyn DataChangeListener>,
        );
        store.commit(vec![put(node("openflow:1"))]).unwrap();
        assert!(recorder.batches.lock().unwrap().is_empty());
    }
}
