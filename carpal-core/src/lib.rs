//! Carpal control-plane core data types
//!
//! This crate provides basic data type definitions used by other Carpal crates.
//! Carpal users should not depend on this crate directly. Use the `carpal::core` reexport instead.
#![no_std]

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValue;

/// Logical identity of a node on the bus
///
/// The type has explicit numeric encoding matching the wire representation used in
/// command and heartbeat payloads. Wildcard routing values are not node identities;
/// see [`Target`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NodeId {
    /// The coordinator. Issues commands, probes heartbeats, consumes telemetry.
    Coordinator = 0,
    /// Finger motor-driver peripheral 0
    Motor0 = 1,
    /// Finger motor-driver peripheral 1
    Motor1 = 2,
    /// Finger motor-driver peripheral 2
    Motor2 = 3,
    /// Finger motor-driver peripheral 3
    Motor3 = 4,
    /// The palm sensor board
    Palm = 5,
}

impl NodeId {
    pub const fn try_from_u8(code: u8) -> Option<NodeId> {
        match code {
            0 => Some(NodeId::Coordinator),
            1 => Some(NodeId::Motor0),
            2 => Some(NodeId::Motor1),
            3 => Some(NodeId::Motor2),
            4 => Some(NodeId::Motor3),
            5 => Some(NodeId::Palm),
            _ => None,
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }

    /// True for the four motor-driver peripherals.
    ///
    /// The palm board is a peer but not a peripheral: it never listens on
    /// peripheral-wildcard routes.
    pub const fn is_peripheral(self) -> bool {
        matches!(
            self,
            NodeId::Motor0 | NodeId::Motor1 | NodeId::Motor2 | NodeId::Motor3
        )
    }
}

impl From<NodeId> for u8 {
    fn from(value: NodeId) -> Self {
        value.into_u8()
    }
}

impl From<NodeId> for usize {
    fn from(value: NodeId) -> Self {
        u8::from(value).into()
    }
}

impl TryFrom<u8> for NodeId {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from_u8(value).ok_or(InvalidValue)
    }
}

/// Routing target of a registered message
///
/// Wildcards appear only in routing entries. A node's own identity is always a
/// concrete [`NodeId`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Target {
    Node(NodeId),
    /// Any of the four motor-driver peripherals
    AnyPeripheral,
    /// Every node on the bus
    Any,
}

impl Target {
    const ANY_PERIPHERAL_VALUE: u8 = 7;
    const ANY_VALUE: u8 = 8;

    pub const fn try_from_u8(code: u8) -> Option<Target> {
        match code {
            Self::ANY_PERIPHERAL_VALUE => Some(Target::AnyPeripheral),
            Self::ANY_VALUE => Some(Target::Any),
            _ => match NodeId::try_from_u8(code) {
                Some(node) => Some(Target::Node(node)),
                None => None,
            },
        }
    }

    pub const fn into_u8(self) -> u8 {
        match self {
            Target::Node(node) => node.into_u8(),
            Target::AnyPeripheral => Self::ANY_PERIPHERAL_VALUE,
            Target::Any => Self::ANY_VALUE,
        }
    }

    /// True iff a node with identity `me` is addressed by this target.
    pub const fn includes(self, me: NodeId) -> bool {
        match self {
            Target::Any => true,
            Target::AnyPeripheral => me.is_peripheral(),
            Target::Node(node) => node.into_u8() == me.into_u8(),
        }
    }
}

impl From<NodeId> for Target {
    fn from(value: NodeId) -> Self {
        Target::Node(value)
    }
}

impl From<Target> for u8 {
    fn from(value: Target) -> Self {
        value.into_u8()
    }
}

impl TryFrom<u8> for Target {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from_u8(value).ok_or(InvalidValue)
    }
}

/// Kind of content carried by a registered arbitration id
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ContentType {
    Error = 0,
    Heartbeat = 1,
    Command = 2,
    SensorData = 3,
}

impl ContentType {
    pub const fn try_from_u8(code: u8) -> Option<ContentType> {
        match code {
            0 => Some(ContentType::Error),
            1 => Some(ContentType::Heartbeat),
            2 => Some(ContentType::Command),
            3 => Some(ContentType::SensorData),
            _ => None,
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }
}

impl From<ContentType> for u8 {
    fn from(value: ContentType) -> Self {
        value.into_u8()
    }
}

impl TryFrom<u8> for ContentType {
    // spelled out: `Self::Error` would be ambiguous with the enum variant
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, InvalidValue> {
        Self::try_from_u8(value).ok_or(InvalidValue)
    }
}
