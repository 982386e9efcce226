//! Inventory and topology convergence engine for SDN controllers.
//!
//! Raw switch, port and link notifications land in a hierarchical
//! transactional store; this crate turns them into a consistent derived
//! topology and tells interested subsystems what changed:
//!
//! - **[`InventoryManager`]**: Facade owning the lifecycle. It is built
//!   over an injected [`Datastore`], and [`start()`](InventoryManager::start)
//!   subscribes the listeners and spawns the transaction queue worker.
//!
//! - **Listeners and update tasks**: One listener per raw entity kind
//!   batches each committed change set into a single update task. Tasks run
//!   one at a time on the [`TxQueue`], each inside one
//!   [`ReadWriteTransaction`]: all of it commits or none of it does.
//!
//! - **Topology resolution**: Links whose endpoints aren't known yet are
//!   parked as ignored links and promoted once both ports exist. Static
//!   switch links and edge ports from the configuration partition override
//!   discovery ([`StaticTopologyManager`]).
//!
//! - **Event publication**: Node and port events are delivered to
//!   [`InventoryListener`]s in a fixed creation/removal order, only while
//!   this instance owns the inventory.
//!
//! - **[`NodeRpcRegistry`]**: Binds outstanding remote operations to node
//!   lifecycle and cancels them when the node disappears.

pub mod config;
pub mod error;
pub mod manager;
pub mod model;
pub mod publisher;
pub mod queue;
pub mod rpc;
pub mod store;
pub mod topology;

mod inventory;
mod listener;
mod update;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::EngineConfig;
pub use error::{CoreError, StoreError};
pub use manager::InventoryManager;
pub use publisher::{InventoryListener, ListenerError};
pub use queue::{TaskCompletion, TxQueue, TxTask};
pub use rpc::{NodeRpcRegistry, RemoteOperation, RpcHandle, RpcRegistration};
pub use store::{Datastore, MemoryStore, ReadWriteTransaction};
pub use topology::{InventoryReader, MemoryPersister, StaticTopologyManager, StaticTopologyPersister};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    IgnoredLink, InventoryEvent, Link, LinkId, Node, NodeEvent, NodeId, Port, PortEvent, PortId,
    PortLink, ProtocolVersion, RawLink, RawNode, RawPort, StaticEdgePort, StaticSwitchLink,
    StaticTopology, UpdateType,
};
