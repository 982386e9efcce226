// ── Discovery listeners ──
//
// Node, port and link listeners over the raw keyspace, each paired with
// the updater its tasks run.

mod link;
mod node;
mod port;

pub(crate) use link::{LinkListener, LinkUpdater};
pub(crate) use node::{NodeListener, NodeUpdater};
pub(crate) use port::{PortListener, PortUpdater};

/// Cost of a port running at `speed_kbps`. Faster ports are cheaper; the
/// floor is 1 and unknown speeds cost 1.
pub(crate) fn port_cost(cost_base: u64, speed_kbps: Option<u64>) -> u64 {
    match speed_kbps {
        Some(speed) if speed > 0 => (cost_base / speed).max(1),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::port_cost;

    #[test]
    fn cost_scales_inversely_with_speed() {
        let base = 10_000_000_000;
        assert_eq!(port_cost(base, Some(1_000_000)), 10_000);
        assert_eq!(port_cost(base, Some(10_000_000)), 1_000);
    }

    #[test]
    fn cost_never_drops_below_one() {
        assert_eq!(port_cost(100, Some(1_000_000)), 1);
        assert_eq!(port_cost(100, Some(0)), 1);
        assert_eq!(port_cost(100, None), 1);
    }
}
