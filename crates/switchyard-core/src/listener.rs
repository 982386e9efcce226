// ── Batching listeners ──
//
// A listener turns one change batch from the datastore into at most one
// update task. Each batch gets a fresh context; every change is parsed
// into a `Location`, classified as created / updated / removed, and
// recorded if the listener handles that shape. Bad paths are dropped
// with a debug log, never fatal.

use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::CoreError;
use crate::model::UpdateType;
use crate::store::{DataChange, DataChangeListener, Location};

/// Per-kind listener contract.
pub(crate) trait BatchListener: Send + Sync {
    type Context;

    fn kind(&self) -> &'static str;

    /// Open a fresh, empty context for one batch.
    fn enter_event(&self) -> Self::Context;

    /// Record one classified change. Return `false` if `location` is not a
    /// shape this listener handles.
    fn record(
        &self,
        ctx: &mut Self::Context,
        location: Location,
        update: UpdateType,
        change: &DataChange,
    ) -> bool;

    /// Close the batch, submitting work if the context is non-empty.
    fn exit_event(&self, ctx: Self::Context);
}

impl<L: BatchListener> DataChangeListener for L {
    fn on_data_changed(&self, changes: &[DataChange]) {
        let mut ctx = self.enter_event();
        for change in changes {
            let location = match Location::parse(change.partition, &change.path) {
                Ok(location) => location,
                Err(CoreError::UnsupportedPath { path }) => {
                    trace!(listener = self.kind(), %path, "ignoring unrelated path");
                    continue;
                }
                Err(e) => {
                    debug!(listener = self.kind(), path = %change.path, error = %e, "dropping malformed change");
                    continue;
                }
            };
            let update = classify(change);
            if !self.record(&mut ctx, location, update, change) {
                trace!(listener = self.kind(), path = %change.path, "ignoring unrelated path");
            }
        }
        self.exit_event(ctx);
    }
}

pub(crate) fn classify(change: &DataChange) -> UpdateType {
    match (&change.before, &change.after) {
        (None, Some(_)) => UpdateType::Created,
        (Some(_), Some(_)) => UpdateType::Changed,
        (_, None) => UpdateType::Removed,
    }
}

// ── Event context ────────────────────────────────────────────────────

/// Collected targets of one batch: derived key → raw location, deduped
/// in first-seen order.
pub(crate) struct EventContext<K> {
    targets: IndexMap<K, Location>,
    created: usize,
    updated: usize,
    removed: usize,
}

impl<K: Eq + Hash + fmt::Display> EventContext<K> {
    pub(crate) fn new() -> Self {
        Self {
            targets: IndexMap::new(),
            created: 0,
            updated: 0,
            removed: 0,
        }
    }

    pub(crate) fn add_created(&mut self, key: K, raw: Location) {
        self.created += 1;
        self.targets.insert(key, raw);
    }

    pub(crate) fn add_updated(&mut self, key: K, raw: Location) {
        self.updated += 1;
        self.targets.insert(key, raw);
    }

    pub(crate) fn add_removed(&mut self, key: K, raw: Location) {
        self.removed += 1;
        self.targets.insert(key, raw);
    }

    pub(crate) fn add(&mut self, update: UpdateType, key: K, raw: Location) {
        match update {
            UpdateType::Created => self.add_created(key, raw),
            UpdateType::Changed => self.add_updated(key, raw),
            UpdateType::Removed => self.add_removed(key, raw),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.targets.len()
    }

    /// `(created, updated, removed)` counts, for logging.
    pub(crate) fn counts(&self) -> (usize, usize, usize) {
        (self.created, self.updated, self.removed)
    }

    pub(crate) fn into_targets(self) -> IndexMap<K, Location> {
        self.targets
    }
}
