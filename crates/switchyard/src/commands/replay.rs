//! `switchyard replay`: run a scenario through a fresh in-memory engine.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use switchyard_config::Config;
use switchyard_core::{
    IgnoredLink, InventoryEvent, InventoryManager, Link, MemoryPersister, MemoryStore, Node, Port,
    StaticTopology, StaticTopologyPersister,
};

use crate::cli::{GlobalOpts, ReplayArgs};
use crate::error::CliError;
use crate::output;
use crate::scenario::Scenario;

// ── Report ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<InventoryEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topology: Option<TopologySnapshot>,
}

#[derive(Debug, Serialize)]
struct TopologySnapshot {
    nodes: Vec<NodeView>,
    links: Vec<Link>,
    ignored_links: Vec<IgnoredLink>,
    static_topology: StaticTopology,
}

#[derive(Debug, Serialize)]
struct NodeView {
    #[serde(flatten)]
    node: Node,
    ports: Vec<Port>,
}

impl TopologySnapshot {
    fn capture(manager: &InventoryManager) -> Result<Self, CliError> {
        let reader = manager.reader();
        let nodes = reader
            .nodes()?
            .into_iter()
            .map(|node| {
                let ports = reader.ports(&node.id)?;
                Ok(NodeView { node, ports })
            })
            .collect::<Result<Vec<_>, CliError>>()?;
        Ok(Self {
            nodes,
            links: reader.links()?,
            ignored_links: reader.ignored_links()?,
            static_topology: manager.static_topology().current()?,
        })
    }
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(args: &ReplayArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let scenario = Scenario::load(&args.scenario)?;

    let mut engine_config = config.engine_config()?;
    if args.observer {
        engine_config.initial_owner = false;
    }
    let persister: Arc<dyn StaticTopologyPersister> = if args.persist {
        Arc::new(config.static_topology_store())
    } else {
        Arc::new(MemoryPersister::default())
    };

    let manager = InventoryManager::new(engine_config, Arc::new(MemoryStore::new()), persister);
    let mut events = manager.events();
    manager.start().await?;

    let outcome = collect(&manager, scenario, &mut events, args).await;
    manager.shutdown().await;
    let report = outcome?;

    output::print_output(&output::render(&global.output, &report)?, global.quiet);
    Ok(())
}

async fn collect(
    manager: &InventoryManager,
    scenario: Scenario,
    events: &mut broadcast::Receiver<Arc<InventoryEvent>>,
    args: &ReplayArgs,
) -> Result<Report, CliError> {
    let published = drive(manager, scenario, events).await?;
    Ok(Report {
        events: (!args.topology_only).then_some(published),
        topology: if args.events_only {
            None
        } else {
            Some(TopologySnapshot::capture(manager)?)
        },
    })
}

/// Apply each step and wait for the engine to converge before the next.
async fn drive(
    manager: &InventoryManager,
    scenario: Scenario,
    events: &mut broadcast::Receiver<Arc<InventoryEvent>>,
) -> Result<Vec<InventoryEvent>, CliError> {
    let mut published = Vec::new();
    manager.sync().await?;
    drain(events, &mut published);

    for (index, step) in scenario.steps.into_iter().enumerate() {
        debug!(index, ?step, "applying step");
        step.apply(manager)?;
        manager.sync().await?;
        drain(events, &mut published);
    }
    Ok(published)
}

fn drain(rx: &mut broadcast::Receiver<Arc<InventoryEvent>>, into: &mut Vec<InventoryEvent>) {
    loop {
        match rx.try_recv() {
            Ok(event) => into.push(event.as_ref().clone()),
            Err(TryRecvError::Lagged(missed)) => {
                warn!(missed, "event stream lagged; raise engine.event_channel_size");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}
