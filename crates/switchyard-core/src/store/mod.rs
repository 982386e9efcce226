// ── Transactional datastore ──
//
// The store seam, its in-memory implementation, the typed keyspace and
// the read-write transaction used by update tasks.

mod datastore;
mod entity;
mod memory;
mod path;
mod transaction;

pub use datastore::{DataChange, DataChangeListener, Datastore, ListenerRegistration, WriteOp};
pub use entity::{Entity, StoredEntity};
pub use memory::MemoryStore;
pub use path::{Location, Partition, StorePath, roots};
pub use transaction::ReadWriteTransaction;
