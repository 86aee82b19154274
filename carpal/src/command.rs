//! Command issue, acknowledgement and execution
//!
//! Commands flow from the coordinator to the peripherals on the coordinator's
//! command id; a peripheral acknowledges by echoing the identical payload on
//! its own command id. The originator retransmits unacknowledged commands and
//! holds any `Begin` until everything sent before it has been acknowledged or
//! dropped, so a sequencing run never starts on a partially delivered plan.
//!
//! Received commands queue in an [`buffer::ExecutionBuffer`] and run in
//! parallelisable slices; see the submodule.

pub mod buffer;

use heapless::{LinearMap, Vec};

use crate::core::{ContentType, InvalidValue, NodeId, Target};
use crate::frame::{Data, Frame};
use crate::port::FramePort;
use crate::registry;
use crate::sensor::SensorStream;
use crate::time::{Duration, Instant};

use self::buffer::ExecutionBuffer;

/// An unacknowledged command is re-sent after this much idle time.
pub const RETRANSMIT_IDLE: Duration = Duration::from_millis(1000);

/// Retries after the initial transmission; four sends total.
pub const MAX_RETRIES: u8 = 3;

/// In-flight command slots on the originator.
pub const MAX_UNACKED: usize = 16;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandType {
    /// Release the execution barrier on the receiving peripherals
    Begin = 0,
    /// Halt execution (reserved)
    Stop = 1,
    MotorControl = 2,
    SensorToggle = 3,
}

impl CommandType {
    pub const COUNT: usize = 4;

    pub const fn try_from_u8(code: u8) -> Option<CommandType> {
        match code {
            0 => Some(CommandType::Begin),
            1 => Some(CommandType::Stop),
            2 => Some(CommandType::MotorControl),
            3 => Some(CommandType::SensorToggle),
            _ => None,
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MotorMode {
    Position = 0,
    Velocity = 1,
}

impl MotorMode {
    pub const fn try_from_u8(code: u8) -> Option<MotorMode> {
        match code {
            0 => Some(MotorMode::Position),
            1 => Some(MotorMode::Velocity),
            _ => None,
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }
}

/// Detail of a motor-control command
///
/// Packed into the detail word as bytes `[node, motor, mode, value]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorControl {
    pub node: NodeId,
    pub motor: u8,
    pub mode: MotorMode,
    pub value: u8,
}

impl MotorControl {
    pub const fn encode_detail(&self) -> u32 {
        u32::from_le_bytes([
            self.node.into_u8(),
            self.motor,
            self.mode.into_u8(),
            self.value,
        ])
    }

    pub fn try_from_detail(detail: u32) -> Result<Self, InvalidValue> {
        let bytes = detail.to_le_bytes();
        Ok(Self {
            node: NodeId::try_from(bytes[0])?,
            motor: bytes[1],
            mode: MotorMode::try_from_u8(bytes[2]).ok_or(InvalidValue)?,
            value: bytes[3],
        })
    }
}

/// Detail of a sensor-toggle command
///
/// Packed into the detail word as bytes `[node, sensor_id, enable, 0]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorToggle {
    pub node: NodeId,
    pub sensor_id: u8,
    pub enable: bool,
}

impl SensorToggle {
    pub const fn encode_detail(&self) -> u32 {
        u32::from_le_bytes([
            self.node.into_u8(),
            self.sensor_id,
            self.enable as u8,
            0,
        ])
    }

    pub fn try_from_detail(detail: u32) -> Result<Self, InvalidValue> {
        let bytes = detail.to_le_bytes();
        Ok(Self {
            node: NodeId::try_from(bytes[0])?,
            sensor_id: bytes[1],
            enable: bytes[2] != 0,
        })
    }
}

/// A command in tagged-variant form, the shape user code works with
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandAction {
    Begin,
    Stop,
    MotorControl(MotorControl),
    SensorToggle(SensorToggle),
}

impl CommandAction {
    pub const fn kind(&self) -> CommandType {
        match self {
            CommandAction::Begin => CommandType::Begin,
            CommandAction::Stop => CommandType::Stop,
            CommandAction::MotorControl(_) => CommandType::MotorControl,
            CommandAction::SensorToggle(_) => CommandType::SensorToggle,
        }
    }

    pub const fn encode_detail(&self) -> u32 {
        match self {
            CommandAction::Begin | CommandAction::Stop => 0,
            CommandAction::MotorControl(detail) => detail.encode_detail(),
            CommandAction::SensorToggle(detail) => detail.encode_detail(),
        }
    }
}

/// Wire payload of a command frame
///
/// Byte 0: command type, byte 1: target, bytes 2-3: command id u16 LE,
/// bytes 4-7: detail word u32 LE. The command id is assigned by the
/// originator and echoed back verbatim in the acknowledgement.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandPayload {
    pub kind: CommandType,
    pub target: Target,
    pub command_id: u16,
    pub detail: u32,
}

impl CommandPayload {
    pub fn encode(&self) -> Data {
        let mut data = Data::new_zeros(8);
        data[0] = self.kind.into_u8();
        data[1] = self.target.into_u8();
        data[2..4].copy_from_slice(&self.command_id.to_le_bytes());
        data[4..8].copy_from_slice(&self.detail.to_le_bytes());
        data
    }
}

impl TryFrom<&Data> for CommandPayload {
    type Error = InvalidValue;

    fn try_from(data: &Data) -> Result<Self, InvalidValue> {
        if data.len() < 8 {
            return Err(InvalidValue);
        }
        let mut command_id = [0; 2];
        command_id.copy_from_slice(&data[2..4]);
        let mut detail = [0; 4];
        detail.copy_from_slice(&data[4..8]);
        Ok(Self {
            kind: CommandType::try_from_u8(data[0]).ok_or(InvalidValue)?,
            target: Target::try_from(data[1])?,
            command_id: u16::from_le_bytes(command_id),
            detail: u32::from_le_bytes(detail),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct UnackedCommand {
    frame: Frame,
    last_sent: Instant,
    retries: u8,
}

/// Outbound reliability and inbound execution for one node
///
/// The coordinator side tracks unacknowledged commands and the start barrier;
/// the peripheral side acknowledges and queues received commands.
pub struct CommandManager<'a> {
    me: NodeId,
    command_counter: u16,
    unacked: LinearMap<u16, UnackedCommand, MAX_UNACKED>,
    pending_begin: Option<Frame>,
    buffer: ExecutionBuffer<'a>,
}

impl<'a> CommandManager<'a> {
    pub fn new(me: NodeId) -> Self {
        Self {
            me,
            command_counter: 0,
            unacked: LinearMap::new(),
            pending_begin: None,
            buffer: ExecutionBuffer::new(),
        }
    }

    /// Builds a payload for `action`, assigning the next command id.
    pub fn compose(&mut self, target: Target, action: CommandAction) -> CommandPayload {
        let command_id = self.command_counter;
        self.command_counter = self.command_counter.wrapping_add(1);
        CommandPayload {
            kind: action.kind(),
            target,
            command_id,
            detail: action.encode_detail(),
        }
    }

    /// Transmits a command and tracks it until acknowledged. Coordinator only.
    ///
    /// A `Begin` is not transmitted here: it is held until every in-flight
    /// command has been acknowledged or dropped, then released from `tick`.
    pub fn send(&mut self, port: &mut dyn FramePort, now: Instant, payload: CommandPayload) {
        if self.me != NodeId::Coordinator {
            error!("unable to send a command, not the coordinator");
            return;
        }

        let Some(id) = registry::encode(self.me, ContentType::Command) else {
            error!("unable to send a command, no id registered");
            return;
        };
        let frame = Frame::new(id, payload.encode());

        if payload.kind == CommandType::Begin {
            debug!("holding begin command {} behind the barrier", payload.command_id);
            self.pending_begin = Some(frame);
            return;
        }

        port.send(&frame);

        let entry = UnackedCommand {
            frame,
            last_sent: now,
            retries: 0,
        };
        if self.unacked.insert(payload.command_id, entry).is_err() {
            error!(
                "unacked table full, command {} will not retransmit",
                payload.command_id
            );
        }
    }

    /// Releases the start barrier, retransmits stale commands, drops exhausted
    /// ones and advances the execution buffer.
    pub fn tick(&mut self, port: &mut dyn FramePort, now: Instant) {
        if self.unacked.is_empty() {
            if let Some(frame) = self.pending_begin.take() {
                debug!("barrier clear, releasing begin command");
                port.send(&frame);
            }
        }

        let mut expired: Vec<u16, MAX_UNACKED> = Vec::new();
        for (&command_id, entry) in self.unacked.iter_mut() {
            if now.duration_since(entry.last_sent) <= RETRANSMIT_IDLE {
                continue;
            }
            if entry.retries < MAX_RETRIES {
                debug!("retransmitting command {}", command_id);
                port.send(&entry.frame);
                entry.retries += 1;
                entry.last_sent = now;
            } else {
                let _ = expired.push(command_id);
            }
        }
        for command_id in expired {
            error!("command {} never acknowledged, dropping", command_id);
            self.unacked.remove(&command_id);
        }

        self.buffer.tick(now);
    }

    /// Consumes a received command-content frame.
    ///
    /// On the coordinator this is an acknowledgement; on any other node the
    /// payload is echoed back as the acknowledgement, then dispatched.
    pub fn handle_message(
        &mut self,
        port: &mut dyn FramePort,
        now: Instant,
        frame: &Frame,
        streams: &mut [SensorStream<'_>],
    ) {
        let payload = match CommandPayload::try_from(&frame.data) {
            Ok(payload) => payload,
            Err(_) => {
                error!("unable to decode a command payload");
                return;
            }
        };

        if self.me == NodeId::Coordinator {
            if self.unacked.remove(&payload.command_id).is_none() {
                error!(
                    "acknowledgement for command {} that was never sent",
                    payload.command_id
                );
            }
            return;
        }

        // acknowledge by echoing the identical payload on our command id
        match registry::encode(self.me, ContentType::Command) {
            Some(id) => port.send(&Frame::new(id, frame.data)),
            None => error!("unable to acknowledge, no command id registered"),
        }

        match payload.kind {
            CommandType::Begin => self.buffer.start_execution(now),
            CommandType::Stop => debug!("stop command is reserved, ignoring"),
            CommandType::MotorControl => self.buffer.push(payload),
            CommandType::SensorToggle => match SensorToggle::try_from_detail(payload.detail) {
                Ok(toggle) => {
                    match streams
                        .iter_mut()
                        .find(|stream| stream.sensor_id() == toggle.sensor_id)
                    {
                        Some(stream) => stream.set_enabled(toggle.enable),
                        None => error!("sensor toggle for unknown sensor {}", toggle.sensor_id),
                    }
                }
                Err(_) => error!("unable to decode a sensor toggle detail"),
            },
        }
    }

    pub fn execution_buffer(&mut self) -> &mut ExecutionBuffer<'a> {
        &mut self.buffer
    }

    /// True while a `Begin` is held behind the barrier.
    pub fn begin_pending(&self) -> bool {
        self.pending_begin.is_some()
    }
}
