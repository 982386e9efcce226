// ── Read-write transaction ──
//
// Stages writes locally with read-your-writes semantics and hands them to
// the datastore as one atomic batch on commit. Nothing reaches the store
// if the transaction is dropped without committing.

use std::collections::BTreeMap;

use super::datastore::{Datastore, WriteOp};
use super::entity::{Entity, StoredEntity};
use super::path::{Location, Partition, StorePath};
use crate::error::{CoreError, StoreError};

pub struct ReadWriteTransaction<'a> {
    store: &'a dyn Datastore,
    /// Staged state per path: `Some` = written, `None` = deleted.
    staged: BTreeMap<(Partition, StorePath), Option<Entity>>,
    ops: Vec<WriteOp>,
}

impl<'a> ReadWriteTransaction<'a> {
    pub fn new(store: &'a dyn Datastore) -> Self {
        Self {
            store,
            staged: BTreeMap::new(),
            ops: Vec::new(),
        }
    }

    /// Whether any write has been staged.
    pub fn is_dirty(&self) -> bool {
        !self.ops.is_empty()
    }

    // ── Untyped access ───────────────────────────────────────────────

    pub fn read(&self, partition: Partition, path: &StorePath) -> Result<Option<Entity>, StoreError> {
        if let Some(staged) = self.staged.get(&(partition, path.clone())) {
            return Ok(staged.clone());
        }
        self.store.read(partition, path)
    }

    /// Entries strictly below `prefix`, including staged writes.
    pub fn scan(
        &self,
        partition: Partition,
        prefix: &StorePath,
    ) -> Result<Vec<(StorePath, Entity)>, StoreError> {
        let mut merged: BTreeMap<StorePath, Entity> =
            self.store.scan(partition, prefix)?.into_iter().collect();

        for ((p, path), staged) in &self.staged {
            if *p != partition || !path.is_descendant_of(prefix) {
                continue;
            }
            match staged {
                Some(entity) => {
                    merged.insert(path.clone(), entity.clone());
                }
                None => {
                    merged.remove(path);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    pub fn put_raw(&mut self, partition: Partition, path: StorePath, entity: Entity) {
        self.staged
            .insert((partition, path.clone()), Some(entity.clone()));
        self.ops.push(WriteOp::Put {
            partition,
            path,
            entity,
        });
    }

    /// Delete `path` and its whole subtree.
    pub fn delete_raw(&mut self, partition: Partition, path: StorePath) -> Result<(), StoreError> {
        let below = self.scan(partition, &path)?;
        for (child, _) in below {
            self.staged.insert((partition, child), None);
        }
        self.staged.insert((partition, path.clone()), None);
        self.ops.push(WriteOp::Delete { partition, path });
        Ok(())
    }

    // ── Typed access ─────────────────────────────────────────────────

    /// Read the entity at `location`, checking its variant.
    pub fn get<T: StoredEntity>(&self, location: &Location) -> Result<Option<T>, CoreError> {
        let path = location.path();
        match self.read(location.partition(), &path)? {
            None => Ok(None),
            Some(entity) => T::from_entity(entity)
                .map(Some)
                .ok_or(CoreError::UnexpectedEntity {
                    path,
                    expected: T::KIND,
                }),
        }
    }

    pub fn put<T: StoredEntity>(&mut self, location: &Location, value: T) {
        self.put_raw(location.partition(), location.path(), value.into_entity());
    }

    pub fn delete(&mut self, location: &Location) -> Result<(), CoreError> {
        self.delete_raw(location.partition(), location.path())?;
        Ok(())
    }

    /// All entities of type `T` below `prefix`; other variants are skipped.
    pub fn scan_as<T: StoredEntity>(
        &self,
        partition: Partition,
        prefix: &StorePath,
    ) -> Result<Vec<T>, CoreError> {
        Ok(self
            .scan(partition, prefix)?
            .into_iter()
            .filter_map(|(_, entity)| T::from_entity(entity))
            .collect())
    }

    /// Hand the staged operations to the store. A clean transaction is a no-op.
    pub fn commit(self) -> Result<(), StoreError> {
        if self.ops.is_empty() {
            return Ok(());
        }
        self.store.commit(self.ops)
    }
}
