// ── Update tasks ──
//
// One generic task drives every entity kind: for each collected target it
// reads the raw entity and calls the strategy's `add` (present) or
// `remove` (absent), then `fix_up` once for the whole batch. The concrete
// strategy is picked by the `InventoryTask` variant.

use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;

use crate::error::CoreError;
use crate::inventory::{LinkUpdater, NodeUpdater, PortUpdater};
use crate::queue::TxTask;
use crate::store::{Location, ReadWriteTransaction, StoredEntity};
use crate::topology::StaticTopologyUpdater;

/// Entity-kind specific half of an update task.
pub(crate) trait UpdateStrategy: Send {
    /// Key of the derived entity.
    type Key: Clone + Eq + Hash + fmt::Display + Send;
    /// Raw entity read for each target.
    type Raw: StoredEntity;

    const KIND: &'static str;

    fn prepare(&mut self, _tx: &mut ReadWriteTransaction<'_>) -> Result<(), CoreError> {
        Ok(())
    }

    /// Merge `raw` into the derived model. Returns `true` if a derived
    /// entity was newly created.
    fn add(
        &mut self,
        tx: &mut ReadWriteTransaction<'_>,
        key: &Self::Key,
        raw: Self::Raw,
    ) -> Result<bool, CoreError>;

    /// Remove the derived entity and whatever depends on it.
    fn remove(&mut self, tx: &mut ReadWriteTransaction<'_>, key: &Self::Key)
    -> Result<(), CoreError>;

    /// Runs once after all targets; `added` is true if any `add` created
    /// something.
    fn fix_up(
        &mut self,
        _tx: &mut ReadWriteTransaction<'_>,
        _added: bool,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    fn on_success(&mut self) {}

    fn on_failure(&mut self, _error: &CoreError) {}
}

/// Generic update task over a strategy.
pub(crate) struct UpdateTask<S: UpdateStrategy> {
    strategy: S,
    targets: IndexMap<S::Key, Location>,
}

impl<S: UpdateStrategy> UpdateTask<S> {
    pub(crate) fn new(strategy: S, targets: IndexMap<S::Key, Location>) -> Self {
        Self { strategy, targets }
    }

    fn run(&mut self, tx: &mut ReadWriteTransaction<'_>) -> Result<(), CoreError> {
        self.strategy.prepare(tx)?;
        let mut added = false;
        for (key, raw) in &self.targets {
            match tx.get::<S::Raw>(raw)? {
                Some(entity) => added |= self.strategy.add(tx, key, entity)?,
                None => self.strategy.remove(tx, key)?,
            }
        }
        self.strategy.fix_up(tx, added)
    }

    fn describe(&self) -> String {
        format!("{} update ({} targets)", S::KIND, self.targets.len())
    }
}

/// The update task variants submitted by the listeners.
pub(crate) enum InventoryTask {
    Node(UpdateTask<NodeUpdater>),
    Port(UpdateTask<PortUpdater>),
    Link(UpdateTask<LinkUpdater>),
    StaticTopology(UpdateTask<StaticTopologyUpdater>),
}

macro_rules! dispatch {
    ($self:ident, $task:ident => $body:expr) => {
        match $self {
            InventoryTask::Node($task) => $body,
            InventoryTask::Port($task) => $body,
            InventoryTask::Link($task) => $body,
            InventoryTask::StaticTopology($task) => $body,
        }
    };
}

impl TxTask for InventoryTask {
    fn describe(&self) -> String {
        dispatch!(self, task => task.describe())
    }

    fn execute(&mut self, tx: &mut ReadWriteTransaction<'_>) -> Result<(), CoreError> {
        dispatch!(self, task => task.run(tx))
    }

    fn on_success(&mut self) {
        dispatch!(self, task => task.strategy.on_success());
    }

    fn on_failure(&mut self, error: &CoreError) {
        dispatch!(self, task => task.strategy.on_failure(error));
    }
}
