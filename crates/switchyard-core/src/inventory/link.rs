// ── Link listener and updater ──

use tracing::debug;

use crate::error::CoreError;
use crate::listener::{BatchListener, EventContext};
use crate::model::{IgnoredLink, Link, LinkId, RawLink, UpdateType};
use crate::queue::TxQueue;
use crate::store::{DataChange, Location, ReadWriteTransaction};
use crate::topology::resolver::{self, StaticRules};
use crate::update::{InventoryTask, UpdateStrategy, UpdateTask};

// ── Listener ─────────────────────────────────────────────────────────

/// Watches raw links below `/topology/link`.
pub(crate) struct LinkListener {
    queue: TxQueue,
}

impl LinkListener {
    pub(crate) fn new(queue: TxQueue) -> Self {
        Self { queue }
    }
}

impl BatchListener for LinkListener {
    type Context = EventContext<LinkId>;

    fn kind(&self) -> &'static str {
        "link"
    }

    fn enter_event(&self) -> Self::Context {
        EventContext::new()
    }

    fn record(
        &self,
        ctx: &mut Self::Context,
        location: Location,
        update: UpdateType,
        _change: &DataChange,
    ) -> bool {
        let Location::RawLink(id) = location else {
            return false;
        };
        // Static identifiers are reserved for the overlay.
        if id.is_static() {
            debug!(link = %id, "discovered link uses a reserved identifier, dropped");
            return true;
        }
        ctx.add(update, id.clone(), Location::RawLink(id));
        true
    }

    fn exit_event(&self, ctx: Self::Context) {
        if ctx.is_empty() {
            return;
        }
        let (created, updated, removed) = ctx.counts();
        debug!(created, updated, removed, "link batch collected");
        let task = UpdateTask::new(LinkUpdater::default(), ctx.into_targets());
        self.queue.post(Box::new(InventoryTask::Link(task)));
    }
}

// ── Updater ──────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct LinkUpdater {
    rules: StaticRules,
}

impl UpdateStrategy for LinkUpdater {
    type Key = LinkId;
    type Raw = RawLink;

    const KIND: &'static str = "link";

    fn prepare(&mut self, tx: &mut ReadWriteTransaction<'_>) -> Result<(), CoreError> {
        self.rules = StaticRules::load(tx)?;
        Ok(())
    }

    fn add(
        &mut self,
        tx: &mut ReadWriteTransaction<'_>,
        key: &LinkId,
        mut raw: RawLink,
    ) -> Result<bool, CoreError> {
        raw.id = key.clone();
        let existed = tx.get::<Link>(&Location::Link(key.clone()))?.is_some();
        let materialized = resolver::admit_discovered(tx, &self.rules, &raw)?;
        Ok(materialized && !existed)
    }

    fn remove(&mut self, tx: &mut ReadWriteTransaction<'_>, key: &LinkId) -> Result<(), CoreError> {
        let location = Location::Link(key.clone());
        if let Some(link) = tx.get::<Link>(&location)? {
            if !link.static_link {
                resolver::detach(tx, key)?;
            }
        }
        let ignored = Location::IgnoredLink(key.clone());
        if tx.get::<IgnoredLink>(&ignored)?.is_some() {
            debug!(link = %key, "pending link withdrawn");
            tx.delete(&ignored)?;
        }
        Ok(())
    }
}
