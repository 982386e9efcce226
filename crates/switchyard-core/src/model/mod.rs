// ── Domain model ──
//
// Identifiers, raw discovery records, the derived topology, static
// configuration and the events published for it.

pub mod discovery;
pub mod entity_id;
pub mod event;
pub mod static_topology;
pub mod topology;

pub use discovery::{ProtocolVersion, RawLink, RawNode, RawPort};
pub use entity_id::{LinkId, NodeId, PortId};
pub use event::{InventoryEvent, NodeEvent, PortEvent, UpdateType};
pub use static_topology::{StaticEdgePort, StaticSwitchLink, StaticTopology};
pub use topology::{IgnoredLink, Link, Node, Port, PortLink};
