// ── Topology ──
//
// Link resolution, the static overlay and the read-only consumer view.

mod reader;
pub(crate) mod resolver;
mod static_topology;

pub use reader::InventoryReader;
pub use static_topology::{MemoryPersister, StaticTopologyManager, StaticTopologyPersister};
pub(crate) use static_topology::{StaticTopologyListener, StaticTopologyUpdater};
