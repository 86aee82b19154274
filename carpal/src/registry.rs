//! Arbitration id registry
//!
//! A static routing table mapping each registered 11-bit arbitration id to a
//! [`MessageDescriptor`], plus the inverse mapping from `(sender, content)` to the
//! id that node emits on. The table is the single source of truth for who may say
//! what on the bus; an id missing from it is a configuration error on the sending
//! node.

use crate::core::{ContentType, NodeId, Target};
use crate::frame::FrameId;

/// Semantic description of a registered arbitration id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageDescriptor {
    pub sender: NodeId,
    pub target: Target,
    pub content: ContentType,
}

impl MessageDescriptor {
    /// Whether a node with identity `me` should consume frames on this route.
    ///
    /// Depends only on the target; self-loopback filtering is the controller's job.
    pub const fn should_listen(&self, me: NodeId) -> bool {
        self.target.includes(me)
    }
}

const fn route(
    id: u16,
    sender: NodeId,
    target: Target,
    content: ContentType,
) -> (FrameId, MessageDescriptor) {
    (
        FrameId::new(id).unwrap(),
        MessageDescriptor {
            sender,
            target,
            content,
        },
    )
}

/// Every registered arbitration id, in ascending id order.
///
/// The error block reserves one id per originator. Motor3 uses 0x050: the slot
/// after Motor2 is occupied by the palm board.
const ROUTES: [(FrameId, MessageDescriptor); 22] = [
    route(0x000, NodeId::Coordinator, Target::Any, ContentType::Error),
    route(0x010, NodeId::Motor0, Target::Any, ContentType::Error),
    route(0x020, NodeId::Motor1, Target::Any, ContentType::Error),
    route(0x030, NodeId::Motor2, Target::Any, ContentType::Error),
    route(0x040, NodeId::Palm, Target::Any, ContentType::Error),
    route(0x050, NodeId::Motor3, Target::Any, ContentType::Error),
    route(
        0x100,
        NodeId::Motor0,
        Target::Node(NodeId::Coordinator),
        ContentType::Heartbeat,
    ),
    route(
        0x10A,
        NodeId::Coordinator,
        Target::AnyPeripheral,
        ContentType::Heartbeat,
    ),
    route(
        0x110,
        NodeId::Motor1,
        Target::Node(NodeId::Coordinator),
        ContentType::Heartbeat,
    ),
    route(
        0x120,
        NodeId::Motor2,
        Target::Node(NodeId::Coordinator),
        ContentType::Heartbeat,
    ),
    route(
        0x130,
        NodeId::Motor3,
        Target::Node(NodeId::Coordinator),
        ContentType::Heartbeat,
    ),
    route(
        0x200,
        NodeId::Coordinator,
        Target::AnyPeripheral,
        ContentType::Command,
    ),
    route(
        0x300,
        NodeId::Motor0,
        Target::Node(NodeId::Coordinator),
        ContentType::Command,
    ),
    route(
        0x310,
        NodeId::Motor1,
        Target::Node(NodeId::Coordinator),
        ContentType::Command,
    ),
    route(
        0x320,
        NodeId::Motor2,
        Target::Node(NodeId::Coordinator),
        ContentType::Command,
    ),
    route(
        0x330,
        NodeId::Motor3,
        Target::Node(NodeId::Coordinator),
        ContentType::Command,
    ),
    route(
        0x340,
        NodeId::Palm,
        Target::Node(NodeId::Coordinator),
        ContentType::Command,
    ),
    route(
        0x400,
        NodeId::Motor0,
        Target::Node(NodeId::Coordinator),
        ContentType::SensorData,
    ),
    route(
        0x410,
        NodeId::Motor1,
        Target::Node(NodeId::Coordinator),
        ContentType::SensorData,
    ),
    route(
        0x420,
        NodeId::Motor2,
        Target::Node(NodeId::Coordinator),
        ContentType::SensorData,
    ),
    route(
        0x430,
        NodeId::Motor3,
        Target::Node(NodeId::Coordinator),
        ContentType::SensorData,
    ),
    route(
        0x440,
        NodeId::Palm,
        Target::Node(NodeId::Coordinator),
        ContentType::SensorData,
    ),
];

/// Resolves a received arbitration id. `None` iff the id is not registered.
pub fn lookup(id: FrameId) -> Option<MessageDescriptor> {
    ROUTES
        .iter()
        .find(|(route_id, _)| *route_id == id)
        .map(|(_, descriptor)| *descriptor)
}

/// The id `sender` emits `content` on.
///
/// First matching entry in ascending id order; stable across calls. `None` when
/// the pair is not an emitter (e.g. the coordinator has no sensor-data id).
pub fn encode(sender: NodeId, content: ContentType) -> Option<FrameId> {
    ROUTES
        .iter()
        .find(|(_, descriptor)| descriptor.sender == sender && descriptor.content == content)
        .map(|(id, _)| *id)
}
