// ── Stored entity envelope ──
//
// Every value in the datastore is one `Entity` variant. `StoredEntity`
// gives typed access without a hand-written match at every call site.

use serde::{Deserialize, Serialize};

use crate::model::{
    IgnoredLink, Link, Node, Port, RawLink, RawNode, RawPort, StaticEdgePort, StaticSwitchLink,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Entity {
    RawNode(RawNode),
    RawPort(RawPort),
    RawLink(RawLink),
    Node(Node),
    Port(Port),
    Link(Link),
    IgnoredLink(IgnoredLink),
    StaticSwitchLink(StaticSwitchLink),
    StaticEdgePort(StaticEdgePort),
}

impl Entity {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RawNode(_) => RawNode::KIND,
            Self::RawPort(_) => RawPort::KIND,
            Self::RawLink(_) => RawLink::KIND,
            Self::Node(_) => Node::KIND,
            Self::Port(_) => Port::KIND,
            Self::Link(_) => Link::KIND,
            Self::IgnoredLink(_) => IgnoredLink::KIND,
            Self::StaticSwitchLink(_) => StaticSwitchLink::KIND,
            Self::StaticEdgePort(_) => StaticEdgePort::KIND,
        }
    }
}

/// A model type that is stored as one [`Entity`] variant.
pub trait StoredEntity: Sized + Clone {
    const KIND: &'static str;

    fn from_entity(entity: Entity) -> Option<Self>;
    fn as_entity_ref(entity: &Entity) -> Option<&Self>;
    fn into_entity(self) -> Entity;
}

/// Untyped access, for callers that dispatch on the variant themselves.
impl StoredEntity for Entity {
    const KIND: &'static str = "entity";

    fn from_entity(entity: Entity) -> Option<Self> {
        Some(entity)
    }

    fn as_entity_ref(entity: &Entity) -> Option<&Self> {
        Some(entity)
    }

    fn into_entity(self) -> Entity {
        self
    }
}

macro_rules! stored_entity {
    ($ty:ident, $kind:literal) => {
        impl StoredEntity for $ty {
            const KIND: &'static str = $kind;

            fn from_entity(entity: Entity) -> Option<Self> {
                match entity {
                    Entity::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            fn as_entity_ref(entity: &Entity) -> Option<&Self> {
                match entity {
                    Entity::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_entity(self) -> Entity {
                Entity::$ty(self)
            }
        }

        impl From<$ty> for Entity {
            fn from(value: $ty) -> Self {
                Entity::$ty(value)
            }
        }
    };
}

stored_entity!(RawNode, "raw-node");
stored_entity!(RawPort, "raw-port");
stored_entity!(RawLink, "raw-link");
stored_entity!(Node, "node");
stored_entity!(Port, "port");
stored_entity!(Link, "link");
stored_entity!(IgnoredLink, "ignored-link");
stored_entity!(StaticSwitchLink, "static-switch-link");
stored_entity!(StaticEdgePort, "static-edge-port");
