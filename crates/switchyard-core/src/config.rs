// ── Runtime engine configuration ──
//
// These types describe how the engine behaves once started. They never
// touch disk: the config crate (or a test) builds an `EngineConfig` and
// hands it to `InventoryManager`.

/// Default `port_cost_base`: a 10 Gb/s reference speed, in kb/s.
pub const DEFAULT_PORT_COST_BASE: u64 = 10_000_000_000;

/// Default capacity of the inventory event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_SIZE: usize = 1024;

/// Configuration for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Whether this instance starts as the inventory owner. Only the owner
    /// publishes inventory events.
    pub initial_owner: bool,
    /// Copy the persisted static topology into the store on start.
    pub restore_static_topology: bool,
    /// Reference speed (kb/s) for port cost; cost = max(1, base / speed).
    pub port_cost_base: u64,
    /// Capacity of the broadcast channel behind
    /// [`InventoryManager::events`](crate::InventoryManager::events).
    pub event_channel_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_owner: true,
            restore_static_topology: true,
            port_cost_base: DEFAULT_PORT_COST_BASE,
            event_channel_size: DEFAULT_EVENT_CHANNEL_SIZE,
        }
    }
}
