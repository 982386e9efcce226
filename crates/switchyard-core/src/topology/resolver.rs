// ── Topology resolution ──
//
// Decides which links are materialized. A link is materialized iff both
// endpoint ports exist and no edge port vetoes either end; static switch
// links override any discovered link sharing their source or destination.
// Discovered links that can't be materialized are parked in the ignored
// set, keyed by their raw id, and retried when an endpoint shows up.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::error::CoreError;
use crate::model::{
    IgnoredLink, Link, LinkId, Port, PortId, PortLink, RawLink, StaticEdgePort, StaticSwitchLink,
};
use crate::store::{Location, Partition, ReadWriteTransaction, roots};

// ── Static rules ─────────────────────────────────────────────────────

/// Snapshot of the static configuration as seen by one transaction.
#[derive(Debug, Default)]
pub(crate) struct StaticRules {
    edge_ports: HashSet<PortId>,
    by_source: HashMap<PortId, PortId>,
    by_destination: HashMap<PortId, PortId>,
}

impl StaticRules {
    pub(crate) fn load(tx: &ReadWriteTransaction<'_>) -> Result<Self, CoreError> {
        let mut rules = Self::default();
        for link in
            tx.scan_as::<StaticSwitchLink>(Partition::Configuration, &roots::static_switch_links())?
        {
            rules
                .by_destination
                .insert(link.destination.clone(), link.source.clone());
            rules.by_source.insert(link.source, link.destination);
        }
        for edge in
            tx.scan_as::<StaticEdgePort>(Partition::Configuration, &roots::static_edge_ports())?
        {
            rules.edge_ports.insert(edge.port);
        }
        Ok(rules)
    }

    pub(crate) fn is_edge(&self, port: &PortId) -> bool {
        self.edge_ports.contains(port)
    }

    /// An edge port on either end forbids any link.
    pub(crate) fn vetoes(&self, source: &PortId, destination: &PortId) -> bool {
        self.is_edge(source) || self.is_edge(destination)
    }

    /// Whether a discovered link `source -> destination` may be materialized
    /// as far as static configuration is concerned.
    pub(crate) fn allows_discovered(&self, source: &PortId, destination: &PortId) -> bool {
        !self.vetoes(source, destination)
            && !self.by_source.contains_key(source)
            && !self.by_destination.contains_key(destination)
    }

    /// Whether the static link `source -> destination` is still configured
    /// and not vetoed.
    pub(crate) fn allows_static(&self, source: &PortId, destination: &PortId) -> bool {
        self.by_source.get(source) == Some(destination) && !self.vetoes(source, destination)
    }

    /// Static links with an endpoint in `ports`, ordered by source.
    pub(crate) fn switch_links_touching(&self, ports: &BTreeSet<PortId>) -> Vec<StaticSwitchLink> {
        let mut links: Vec<StaticSwitchLink> = self
            .by_source
            .iter()
            .filter(|(src, dst)| ports.contains(*src) || ports.contains(*dst))
            .map(|(src, dst)| StaticSwitchLink {
                source: src.clone(),
                destination: dst.clone(),
            })
            .collect();
        links.sort_by(|a, b| a.source.cmp(&b.source));
        links
    }
}

// ── Primitive operations ─────────────────────────────────────────────

pub(crate) fn port_exists(tx: &ReadWriteTransaction<'_>, port: &PortId) -> Result<bool, CoreError> {
    Ok(tx.get::<Port>(&Location::Port(port.clone()))?.is_some())
}

/// Write `link` and the port links on both ends, clearing any pending
/// record with the same id.
pub(crate) fn materialize(tx: &mut ReadWriteTransaction<'_>, link: Link) -> Result<(), CoreError> {
    let location = Location::Link(link.id.clone());
    if let Some(existing) = tx.get::<Link>(&location)? {
        if existing == link {
            return Ok(());
        }
        detach(tx, &link.id)?;
    }

    for (port, peer) in [
        (&link.source, &link.destination),
        (&link.destination, &link.source),
    ] {
        let port_location = Location::Port(port.clone());
        if let Some(mut derived) = tx.get::<Port>(&port_location)? {
            let added = derived.add_port_link(PortLink {
                link_id: link.id.clone(),
                peer: peer.clone(),
            });
            if added {
                tx.put(&port_location, derived);
            }
        }
    }

    let ignored = Location::IgnoredLink(link.id.clone());
    if tx.get::<IgnoredLink>(&ignored)?.is_some() {
        tx.delete(&ignored)?;
    }

    debug!(link = %link.id, source = %link.source, destination = %link.destination, static_link = link.static_link, "link materialized");
    tx.put(&location, link);
    Ok(())
}

/// Remove a materialized link and its port links. Returns the removed link.
pub(crate) fn detach(
    tx: &mut ReadWriteTransaction<'_>,
    id: &LinkId,
) -> Result<Option<Link>, CoreError> {
    let location = Location::Link(id.clone());
    let Some(link) = tx.get::<Link>(&location)? else {
        return Ok(None);
    };

    for port in [&link.source, &link.destination] {
        let port_location = Location::Port(port.clone());
        if let Some(mut derived) = tx.get::<Port>(&port_location)? {
            if derived.remove_port_link(id) {
                tx.put(&port_location, derived);
            }
        }
    }
    tx.delete(&location)?;
    debug!(link = %id, "link detached");
    Ok(Some(link))
}

/// Move a discovered link to the pending set, if discovery still reports
/// it. Returns `true` if it was parked.
pub(crate) fn park(tx: &mut ReadWriteTransaction<'_>, id: &LinkId) -> Result<bool, CoreError> {
    let Some(raw) = tx.get::<RawLink>(&Location::RawLink(id.clone()))? else {
        return Ok(false);
    };
    debug!(link = %id, "link parked as ignored");
    tx.put(
        &Location::IgnoredLink(id.clone()),
        IgnoredLink {
            id: raw.id,
            source: raw.source,
            destination: raw.destination,
        },
    );
    Ok(true)
}

// ── Resolution passes ────────────────────────────────────────────────

/// Materialize a discovered link or park it. Returns `true` if materialized.
pub(crate) fn admit_discovered(
    tx: &mut ReadWriteTransaction<'_>,
    rules: &StaticRules,
    raw: &RawLink,
) -> Result<bool, CoreError> {
    let resolvable = rules.allows_discovered(&raw.source, &raw.destination)
        && port_exists(tx, &raw.source)?
        && port_exists(tx, &raw.destination)?;

    if resolvable {
        materialize(
            tx,
            Link {
                id: raw.id.clone(),
                source: raw.source.clone(),
                destination: raw.destination.clone(),
                static_link: false,
            },
        )?;
        return Ok(true);
    }

    detach(tx, &raw.id)?;
    let ignored = IgnoredLink {
        id: raw.id.clone(),
        source: raw.source.clone(),
        destination: raw.destination.clone(),
    };
    let location = Location::IgnoredLink(raw.id.clone());
    if tx.get::<IgnoredLink>(&location)?.as_ref() != Some(&ignored) {
        debug!(link = %raw.id, source = %raw.source, destination = %raw.destination, "link ignored");
        tx.put(&location, ignored);
    }
    Ok(false)
}

/// Retry pending links with an endpoint in `ports`. Returns how many were
/// promoted.
pub(crate) fn resolve_ignored(
    tx: &mut ReadWriteTransaction<'_>,
    rules: &StaticRules,
    ports: &BTreeSet<PortId>,
) -> Result<usize, CoreError> {
    let pending: Vec<IgnoredLink> = tx
        .scan_as::<IgnoredLink>(Partition::Operational, &roots::ignored_links())?
        .into_iter()
        .filter(|link| ports.iter().any(|port| link.touches(port)))
        .collect();

    let mut promoted = 0;
    for link in pending {
        let resolvable = rules.allows_discovered(&link.source, &link.destination)
            && port_exists(tx, &link.source)?
            && port_exists(tx, &link.destination)?;
        if !resolvable {
            debug!(link = %link.id, "link still pending");
            continue;
        }
        materialize(
            tx,
            Link {
                id: link.id,
                source: link.source,
                destination: link.destination,
                static_link: false,
            },
        )?;
        promoted += 1;
    }
    Ok(promoted)
}

/// Force the static links with an endpoint in `ports`, displacing
/// conflicting discovered links. Static links that can't be materialized
/// are withdrawn.
pub(crate) fn resolve_static(
    tx: &mut ReadWriteTransaction<'_>,
    rules: &StaticRules,
    ports: &BTreeSet<PortId>,
) -> Result<usize, CoreError> {
    let mut forced = 0;
    for link in rules.switch_links_touching(ports) {
        let id = LinkId::for_static(&link.source);
        let resolvable = !rules.vetoes(&link.source, &link.destination)
            && port_exists(tx, &link.source)?
            && port_exists(tx, &link.destination)?;
        if !resolvable {
            if detach(tx, &id)?.is_some() {
                debug!(link = %id, "static link withdrawn");
            }
            continue;
        }

        displace_discovered(tx, &link.source, &link.destination)?;
        materialize(
            tx,
            Link {
                id,
                source: link.source,
                destination: link.destination,
                static_link: true,
            },
        )?;
        forced += 1;
    }
    Ok(forced)
}

/// Park discovered links leaving `source` or arriving at `destination`.
fn displace_discovered(
    tx: &mut ReadWriteTransaction<'_>,
    source: &PortId,
    destination: &PortId,
) -> Result<(), CoreError> {
    for port in [source, destination] {
        let Some(derived) = tx.get::<Port>(&Location::Port(port.clone()))? else {
            continue;
        };
        for port_link in derived.port_links {
            if port_link.link_id.is_static() {
                continue;
            }
            let Some(link) = tx.get::<Link>(&Location::Link(port_link.link_id.clone()))? else {
                continue;
            };
            if link.source == *source || link.destination == *destination {
                detach(tx, &link.id)?;
                park(tx, &link.id)?;
            }
        }
    }
    Ok(())
}

/// Drop the links on `port` that the current rules no longer allow.
pub(crate) fn revalidate_port(
    tx: &mut ReadWriteTransaction<'_>,
    rules: &StaticRules,
    port: &PortId,
) -> Result<(), CoreError> {
    let Some(derived) = tx.get::<Port>(&Location::Port(port.clone()))? else {
        return Ok(());
    };
    for port_link in derived.port_links {
        let Some(link) = tx.get::<Link>(&Location::Link(port_link.link_id.clone()))? else {
            continue;
        };
        let keep = if link.static_link {
            rules.allows_static(&link.source, &link.destination)
        } else {
            rules.allows_discovered(&link.source, &link.destination)
        };
        if keep {
            continue;
        }
        detach(tx, &link.id)?;
        if !link.static_link {
            park(tx, &link.id)?;
        }
    }
    Ok(())
}

/// Resolution pass for freshly added ports: force their static links, then
/// retry pending links touching them.
pub(crate) fn resolve_added_ports(
    tx: &mut ReadWriteTransaction<'_>,
    ports: &BTreeSet<PortId>,
) -> Result<(), CoreError> {
    if ports.is_empty() {
        return Ok(());
    }
    let rules = StaticRules::load(tx)?;
    let forced = resolve_static(tx, &rules, ports)?;
    let promoted = resolve_ignored(tx, &rules, ports)?;
    debug!(ports = ports.len(), forced, promoted, "resolved added ports");
    Ok(())
}

/// Detach every link on a port that is about to be removed. Discovered
/// links still reported by discovery go back to the pending set.
pub(crate) fn release_port(tx: &mut ReadWriteTransaction<'_>, port: &Port) -> Result<(), CoreError> {
    for port_link in &port.port_links {
        if let Some(link) = detach(tx, &port_link.link_id)? {
            if !link.static_link {
                park(tx, &link.id)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::NodeId;
    use crate::store::MemoryStore;

    fn pid(s: &str) -> PortId {
        s.parse().unwrap()
    }

    fn put_port(tx: &mut ReadWriteTransaction<'_>, id: &str) {
        tx.put(
            &Location::Port(pid(id)),
            Port {
                id: pid(id),
                name: None,
                enabled: true,
                cost: 1,
                port_links: Vec::new(),
            },
        );
    }

    fn raw_link(id: &str, src: &str, dst: &str) -> RawLink {
        RawLink {
            id: id.parse().unwrap(),
            source: pid(src),
            destination: pid(dst),
        }
    }

    fn port_links(tx: &ReadWriteTransaction<'_>, id: &str) -> Vec<PortLink> {
        tx.get::<Port>(&Location::Port(pid(id)))
            .unwrap()
            .unwrap()
            .port_links
    }

    #[test]
    fn discovered_link_waits_for_both_ports() {
        let store = MemoryStore::new();
        let mut tx = ReadWriteTransaction::new(&store);
        let rules = StaticRules::default();
        put_port(&mut tx, "openflow:1:1");

        let raw = raw_link("openflow:1:1", "openflow:1:1", "openflow:2:1");
        assert!(!admit_discovered(&mut tx, &rules, &raw).unwrap());
        assert!(
            tx.get::<IgnoredLink>(&Location::IgnoredLink(raw.id.clone()))
                .unwrap()
                .is_some()
        );

        put_port(&mut tx, "openflow:2:1");
        let ports = BTreeSet::from([pid("openflow:2:1")]);
        assert_eq!(resolve_ignored(&mut tx, &rules, &ports).unwrap(), 1);
        assert!(
            tx.get::<IgnoredLink>(&Location::IgnoredLink(raw.id.clone()))
                .unwrap()
                .is_none()
        );
        assert_eq!(
            port_links(&tx, "openflow:2:1"),
            vec![PortLink {
                link_id: raw.id.clone(),
                peer: pid("openflow:1:1"),
            }]
        );
    }

    #[test]
    fn detach_clears_both_back_references() {
        let store = MemoryStore::new();
        let mut tx = ReadWriteTransaction::new(&store);
        put_port(&mut tx, "openflow:1:1");
        put_port(&mut tx, "openflow:2:1");
        let raw = raw_link("l1", "openflow:1:1", "openflow:2:1");
        admit_discovered(&mut tx, &StaticRules::default(), &raw).unwrap();

        let removed = detach(&mut tx, &raw.id).unwrap().unwrap();
        assert_eq!(removed.source, pid("openflow:1:1"));
        assert!(port_links(&tx, "openflow:1:1").is_empty());
        assert!(port_links(&tx, "openflow:2:1").is_empty());
        assert!(detach(&mut tx, &raw.id).unwrap().is_none());
    }

    #[test]
    fn edge_port_vetoes_discovered_and_static_links() {
        let mut rules = StaticRules::default();
        rules.edge_ports.insert(pid("openflow:2:1"));
        rules
            .by_source
            .insert(pid("openflow:1:1"), pid("openflow:2:1"));
        rules
            .by_destination
            .insert(pid("openflow:2:1"), pid("openflow:1:1"));

        assert!(!rules.allows_discovered(&pid("openflow:3:1"), &pid("openflow:2:1")));
        assert!(!rules.allows_static(&pid("openflow:1:1"), &pid("openflow:2:1")));
    }

    #[test]
    fn static_link_displaces_discovered_link_on_same_source() {
        let store = MemoryStore::new();
        let mut tx = ReadWriteTransaction::new(&store);
        for p in ["openflow:1:1", "openflow:2:1", "openflow:3:1"] {
            put_port(&mut tx, p);
        }
        let raw = raw_link("d1", "openflow:1:1", "openflow:2:1");
        tx.put(&Location::RawLink(raw.id.clone()), raw.clone());
        admit_discovered(&mut tx, &StaticRules::default(), &raw).unwrap();

        let mut rules = StaticRules::default();
        rules
            .by_source
            .insert(pid("openflow:1:1"), pid("openflow:3:1"));
        rules
            .by_destination
            .insert(pid("openflow:3:1"), pid("openflow:1:1"));

        let ports = BTreeSet::from([pid("openflow:1:1"), pid("openflow:3:1")]);
        assert_eq!(resolve_static(&mut tx, &rules, &ports).unwrap(), 1);

        let static_id = LinkId::for_static(&pid("openflow:1:1"));
        assert!(tx.get::<Link>(&Location::Link(static_id)).unwrap().is_some());
        assert!(tx.get::<Link>(&Location::Link(raw.id.clone())).unwrap().is_none());
        assert!(
            tx.get::<IgnoredLink>(&Location::IgnoredLink(raw.id))
                .unwrap()
                .is_some()
        );
        assert!(port_links(&tx, "openflow:2:1").is_empty());
    }

    #[test]
    fn release_port_parks_only_links_discovery_still_reports() {
        let store = MemoryStore::new();
        let mut tx = ReadWriteTransaction::new(&store);
        put_port(&mut tx, "openflow:1:1");
        put_port(&mut tx, "openflow:2:1");
        put_port(&mut tx, "openflow:2:2");
        let kept = raw_link("kept", "openflow:1:1", "openflow:2:1");
        let gone = raw_link("gone", "openflow:2:2", "openflow:1:1");
        tx.put(&Location::RawLink(kept.id.clone()), kept.clone());
        admit_discovered(&mut tx, &StaticRules::default(), &kept).unwrap();
        admit_discovered(&mut tx, &StaticRules::default(), &gone).unwrap();

        let node: NodeId = "openflow:1".parse().unwrap();
        let port = tx.get::<Port>(&Location::Port(node.port(1))).unwrap().unwrap();
        release_port(&mut tx, &port).unwrap();

        assert!(
            tx.get::<IgnoredLink>(&Location::IgnoredLink(kept.id))
                .unwrap()
                .is_some()
        );
        assert!(
            tx.get::<IgnoredLink>(&Location::IgnoredLink(gone.id))
                .unwrap()
                .is_none()
        );
        assert!(port_links(&tx, "openflow:2:1").is_empty());
        assert!(port_links(&tx, "openflow:2:2").is_empty());
    }
}
