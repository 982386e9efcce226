// ── Transaction queue ──
//
// Single-consumer FIFO that runs update tasks one at a time against the
// datastore, each on the blocking pool. All derived-state mutation goes
// through here, so tasks can read-modify-write without per-entity locking. A failing (or panicking)
// task is reported through its own failure hook and never stops the
// worker.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::CoreError;
use crate::store::{Datastore, ReadWriteTransaction};

/// One atomic unit of work executed by the queue worker.
pub trait TxTask: Send {
    /// Short label used in logs.
    fn describe(&self) -> String;

    /// Stage writes on `tx`. Returning an error discards the transaction.
    fn execute(&mut self, tx: &mut ReadWriteTransaction<'_>) -> Result<(), CoreError>;

    /// Called after a successful commit.
    fn on_success(&mut self) {}

    /// Called when `execute` or the commit failed.
    fn on_failure(&mut self, _error: &CoreError) {}
}

struct QueuedTask {
    seq: u64,
    task: Box<dyn TxTask>,
    done: oneshot::Sender<Result<(), CoreError>>,
}

/// Completion of a posted task. Dropping it does not cancel the task.
pub struct TaskCompletion {
    rx: oneshot::Receiver<Result<(), CoreError>>,
}

impl TaskCompletion {
    /// Wait for the task to finish. Fails with [`CoreError::QueueClosed`]
    /// if the worker stopped before running it.
    pub async fn wait(self) -> Result<(), CoreError> {
        self.rx.await.map_err(|_| CoreError::QueueClosed)?
    }
}

/// Cheaply cloneable handle for posting tasks.
#[derive(Clone)]
pub struct TxQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    tx: mpsc::UnboundedSender<QueuedTask>,
    rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<QueuedTask>>>,
    store: Arc<dyn Datastore>,
    next_seq: AtomicU64,
}

impl TxQueue {
    /// Create a queue bound to `store`. Does not run anything until
    /// [`start()`](Self::start) spawns the worker.
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(QueueInner {
                tx,
                rx: std::sync::Mutex::new(Some(rx)),
                store,
                next_seq: AtomicU64::new(1),
            }),
        }
    }

    /// Spawn the worker. Returns `None` if it was already started.
    pub fn start(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let rx = self
            .inner
            .rx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()?;
        let store = Arc::clone(&self.inner.store);
        Some(tokio::spawn(queue_worker_task(store, rx, cancel)))
    }

    /// Submit a task. Never blocks; tasks run in submission order.
    pub fn post(&self, task: Box<dyn TxTask>) -> TaskCompletion {
        let (done, rx) = oneshot::channel();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let label = task.describe();
        if let Err(mpsc::error::SendError(rejected)) =
            self.inner.tx.send(QueuedTask { seq, task, done })
        {
            warn!(task = %label, "transaction queue closed, task dropped");
            let mut task = rejected.task;
            task.on_failure(&CoreError::QueueClosed);
        } else {
            debug!(seq, task = %label, "task posted");
        }
        TaskCompletion { rx }
    }

    /// Wait until every task posted before this call has finished.
    pub async fn sync(&self) -> Result<(), CoreError> {
        self.post(Box::new(Barrier)).wait().await
    }
}

/// No-op task used by [`TxQueue::sync`].
struct Barrier;

impl TxTask for Barrier {
    fn describe(&self) -> String {
        "barrier".into()
    }

    fn execute(&mut self, _tx: &mut ReadWriteTransaction<'_>) -> Result<(), CoreError> {
        Ok(())
    }
}

// ── Worker ───────────────────────────────────────────────────────────

async fn queue_worker_task(
    store: Arc<dyn Datastore>,
    mut rx: mpsc::UnboundedReceiver<QueuedTask>,
    cancel: CancellationToken,
) {
    info!("transaction queue started");
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            queued = rx.recv() => {
                let Some(queued) = queued else { break };
                let QueuedTask { seq, task, done } = queued;
                let Some((mut task, result)) = run_blocking(Arc::clone(&store), task, seq).await else {
                    let _ = done.send(Err(CoreError::QueueClosed));
                    continue;
                };
                match &result {
                    Ok(()) => {
                        debug!(seq, task = %task.describe(), "task committed");
                        task.on_success();
                    }
                    Err(e) => {
                        error!(seq, task = %task.describe(), error = %e, "task failed");
                        task.on_failure(e);
                    }
                }
                let _ = done.send(result);
            }
        }
    }

    // Anything still queued is failed rather than silently dropped.
    rx.close();
    while let Ok(mut queued) = rx.try_recv() {
        queued.task.on_failure(&CoreError::QueueClosed);
        let _ = queued.done.send(Err(CoreError::QueueClosed));
    }
    info!("transaction queue stopped");
}

/// Run one task off the async threads: store commits and the listener
/// callbacks they trigger may block. Yields `None` if the blocking pool
/// dropped the task.
async fn run_blocking(
    store: Arc<dyn Datastore>,
    mut task: Box<dyn TxTask>,
    seq: u64,
) -> Option<(Box<dyn TxTask>, Result<(), CoreError>)> {
    let ran = tokio::task::spawn_blocking(move || {
        let result = run_task(store.as_ref(), task.as_mut());
        (task, result)
    })
    .await;
    match ran {
        Ok(ran) => Some(ran),
        Err(e) => {
            error!(seq, error = %e, "task runner failed");
            None
        }
    }
}

fn run_task(store: &dyn Datastore, task: &mut dyn TxTask) -> Result<(), CoreError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut tx = ReadWriteTransaction::new(store);
        task.execute(&mut tx)?;
        tx.commit()?;
        Ok(())
    }));
    outcome.unwrap_or_else(|payload| {
        Err(CoreError::TaskPanicked {
            task: task.describe(),
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::mpsc::{self as std_mpsc, Receiver};
    use std::time::Duration;

    use super::*;
    use crate::StoreError;
    use crate::model::Node;
    use crate::store::{
        DataChangeListener, Entity, ListenerRegistration, Location, MemoryStore, Partition,
        StorePath, WriteOp,
    };

    struct PutNode {
        id: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl TxTask for PutNode {
        fn describe(&self) -> String {
            format!("put {}", self.id)
        }

        fn execute(&mut self, tx: &mut ReadWriteTransaction<'_>) -> Result<(), CoreError> {
            let node = Node {
                id: self.id.parse()?,
                protocol_version: None,
            };
            tx.put(&Location::Node(node.id.clone()), node);
            Ok(())
        }

        fn on_success(&mut self) {
            self.log.lock().unwrap().push(format!("ok {}", self.id));
        }
    }

    struct Failing {
        panic: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl TxTask for Failing {
        fn describe(&self) -> String {
            "failing".into()
        }

        fn execute(&mut self, tx: &mut ReadWriteTransaction<'_>) -> Result<(), CoreError> {
            let node = Node {
                id: "openflow:99".parse()?,
                protocol_version: None,
            };
            tx.put(&Location::Node(node.id.clone()), node);
            assert!(!self.panic, "boom");
            Err(CoreError::Internal("nope".into()))
        }

        fn on_failure(&mut self, error: &CoreError) {
            self.log.lock().unwrap().push(format!("failed: {error}"));
        }
    }

    #[tokio::test]
    async fn tasks_run_in_submission_order() {
        let store = Arc::new(MemoryStore::new());
        let queue = TxQueue::new(store.clone());
        let cancel = CancellationToken::new();
        queue.start(cancel.clone()).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        for id in ["openflow:1", "openflow:2", "openflow:3"] {
            queue.post(Box::new(PutNode {
                id,
                log: log.clone(),
            }));
        }
        queue.sync().await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["ok openflow:1", "ok openflow:2", "ok openflow:3"]
        );
        assert_eq!(store.len(Partition::Operational), 3);
        cancel.cancel();
    }

    #[tokio::test]
    async fn failed_task_commits_nothing_and_queue_keeps_going() {
        let store = Arc::new(MemoryStore::new());
        let queue = TxQueue::new(store.clone());
        queue.start(CancellationToken::new()).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let failed = queue.post(Box::new(Failing {
            panic: false,
            log: log.clone(),
        }));
        assert!(failed.wait().await.is_err());

        let panicked = queue.post(Box::new(Failing {
            panic: true,
            log: log.clone(),
        }));
        assert!(matches!(
            panicked.wait().await,
            Err(CoreError::TaskPanicked { .. })
        ));

        queue
            .post(Box::new(PutNode {
                id: "openflow:1",
                log: log.clone(),
            }))
            .wait()
            .await
            .unwrap();

        assert_eq!(store.len(Partition::Operational), 1);
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn start_is_one_shot() {
        let queue = TxQueue::new(Arc::new(MemoryStore::new()));
        let cancel = CancellationToken::new();
        assert!(queue.start(cancel.clone()).is_some());
        assert!(queue.start(cancel.clone()).is_none());
        cancel.cancel();
    }

    #[tokio::test]
    async fn cancelled_worker_fails_pending_tasks() {
        let queue = TxQueue::new(Arc::new(MemoryStore::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let handle = queue.start(cancel).unwrap();
        handle.await.unwrap();

        assert!(matches!(queue.sync().await, Err(CoreError::QueueClosed)));
    }

    /// Holds every commit until the test releases it.
    struct GatedStore {
        inner: MemoryStore,
        release: Mutex<Receiver<()>>,
    }

    impl Datastore for GatedStore {
        fn read(
            &self,
            partition: Partition,
            path: &StorePath,
        ) -> Result<Option<Entity>, StoreError> {
            self.inner.read(partition, path)
        }

        fn scan(
            &self,
            partition: Partition,
            prefix: &StorePath,
        ) -> Result<Vec<(StorePath, Entity)>, StoreError> {
            self.inner.scan(partition, prefix)
        }

        fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
            self.release
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(5))
                .map_err(|e| StoreError::CommitFailed {
                    reason: e.to_string(),
                })?;
            self.inner.commit(ops)
        }

        fn register_listener(
            &self,
            partition: Partition,
            prefix: StorePath,
            listener: Arc<dyn DataChangeListener>,
        ) -> ListenerRegistration {
            self.inner.register_listener(partition, prefix, listener)
        }
    }

    #[tokio::test]
    async fn blocking_commit_leaves_runtime_free() {
        let (release, gate) = std_mpsc::channel();
        let store = Arc::new(GatedStore {
            inner: MemoryStore::new(),
            release: Mutex::new(gate),
        });
        let queue = TxQueue::new(store.clone());
        queue.start(CancellationToken::new()).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let completion = queue.post(Box::new(PutNode {
            id: "openflow:1",
            log: log.clone(),
        }));
        // The worker is parked inside commit while this timer fires.
        tokio::time::sleep(Duration::from_millis(20)).await;
        release.send(()).unwrap();

        completion.wait().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["ok openflow:1"]);
        assert_eq!(store.inner.len(Partition::Operational), 1);
    }
}
