//! Error reporting and latching
//!
//! Any node may broadcast an error on its error id. Reported errors are
//! retransmitted on a fixed interval until cleared, so a listener that joins
//! late (or misses a frame) still converges on the set of outstanding faults.
//! Received latching errors are re-echoed the same way; non-latching ones are
//! dispatched to handlers and forgotten.

use heapless::{LinearMap, Vec};

use crate::core::{ContentType, InvalidValue, NodeId};
use crate::frame::{Data, Frame};
use crate::port::FramePort;
use crate::registry;
use crate::time::{Duration, Instant};

/// Outstanding-error slots per node.
pub const MAX_ACTIVE_ERRORS: usize = 8;

/// Default retransmission interval, applied by the controller.
pub const DEFAULT_RETRANSMIT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Severity {
    Low = 0,
    Medium = 1,
    Critical = 2,
}

impl Severity {
    pub const COUNT: usize = 3;

    pub const fn try_from_u8(code: u8) -> Option<Severity> {
        match code {
            0 => Some(Severity::Low),
            1 => Some(Severity::Medium),
            2 => Some(Severity::Critical),
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
pub enum Behavior {
    NonLatching = 0,
    Latching = 1,
}

impl Behavior {
    pub const fn try_from_u8(code: u8) -> Option<Behavior> {
        match code {
            0 => Some(Behavior::NonLatching),
            1 => Some(Behavior::Latching),
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
pub enum ErrorCode {
    HeartbeatLoss = 0,
    DriveFault = 1,
    EncoderFail = 2,
    CommandFail = 3,
}

impl ErrorCode {
    pub const fn try_from_u8(code: u8) -> Option<ErrorCode> {
        match code {
            0 => Some(ErrorCode::HeartbeatLoss),
            1 => Some(ErrorCode::DriveFault),
            2 => Some(ErrorCode::EncoderFail),
            3 => Some(ErrorCode::CommandFail),
            _ => None,
        }
    }

    pub const fn into_u8(self) -> u8 {
        self as u8
    }
}

/// An error as carried on the bus
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemError {
    pub severity: Severity,
    pub behavior: Behavior,
    pub code: ErrorCode,
}

/// Wire payload of an error frame
///
/// Bytes 0-3: error number u32 LE, byte 4: severity, 5: behavior, 6: code,
/// 7 reserved. The error number is unique per originator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorPayload {
    pub error_number: u32,
    pub error: SystemError,
}

impl ErrorPayload {
    pub fn encode(&self) -> Data {
        let mut data = Data::new_zeros(8);
        data[0..4].copy_from_slice(&self.error_number.to_le_bytes());
        data[4] = self.error.severity.into_u8();
        data[5] = self.error.behavior.into_u8();
        data[6] = self.error.code.into_u8();
        data
    }
}

impl TryFrom<&Data> for ErrorPayload {
    type Error = InvalidValue;

    fn try_from(data: &Data) -> Result<Self, InvalidValue> {
        if data.len() < 7 {
            return Err(InvalidValue);
        }
        let mut number = [0; 4];
        number.copy_from_slice(&data[0..4]);
        Ok(Self {
            error_number: u32::from_le_bytes(number),
            error: SystemError {
                severity: Severity::try_from_u8(data[4]).ok_or(InvalidValue)?,
                behavior: Behavior::try_from_u8(data[5]).ok_or(InvalidValue)?,
                code: ErrorCode::try_from_u8(data[6]).ok_or(InvalidValue)?,
            },
        })
    }
}

/// Callback invoked for every error of a registered severity
pub type ErrorHandler = fn(SystemError);

#[derive(Debug, Clone, Copy)]
struct ActiveError {
    error: SystemError,
    last_transmission: Instant,
}

/// Per-node error state: handler table, active store, retransmission
pub struct ErrorManager {
    me: NodeId,
    retransmit_interval: Duration,
    handlers: [Option<ErrorHandler>; Severity::COUNT],
    active: LinearMap<u32, ActiveError, MAX_ACTIVE_ERRORS>,
    error_counter: u32,
}

impl ErrorManager {
    pub fn new(me: NodeId) -> Self {
        Self {
            me,
            retransmit_interval: DEFAULT_RETRANSMIT_INTERVAL,
            handlers: [None; Severity::COUNT],
            active: LinearMap::new(),
            error_counter: 0,
        }
    }

    pub fn initialize(&mut self, retransmit_interval: Duration) {
        self.retransmit_interval = retransmit_interval;
    }

    /// Registers `handler` for `severity`. The most recent registration wins.
    pub fn add_handler(&mut self, severity: Severity, handler: ErrorHandler) {
        self.handlers[usize::from(severity.into_u8())] = Some(handler);
    }

    /// Broadcasts a new error and stores it for retransmission.
    pub fn report(
        &mut self,
        port: &mut dyn FramePort,
        now: Instant,
        code: ErrorCode,
        severity: Severity,
        behavior: Behavior,
    ) {
        let error_number = self.error_counter;
        self.error_counter = self.error_counter.wrapping_add(1);

        let payload = ErrorPayload {
            error_number,
            error: SystemError {
                severity,
                behavior,
                code,
            },
        };

        let record = ActiveError {
            error: payload.error,
            last_transmission: now,
        };
        if self.active.insert(error_number, record).is_err() {
            error!("active error store full, {:?} will not retransmit", code);
        }

        self.emit(port, &payload);
    }

    /// Retransmits every stored error whose interval has elapsed.
    pub fn tick(&mut self, port: &mut dyn FramePort, now: Instant) {
        let Some(id) = registry::encode(self.me, ContentType::Error) else {
            return;
        };

        for (&error_number, status) in self.active.iter_mut() {
            if now.duration_since(status.last_transmission) >= self.retransmit_interval {
                let payload = ErrorPayload {
                    error_number,
                    error: status.error,
                };
                port.send(&Frame::new(id, payload.encode()));
                status.last_transmission = now;
            }
        }
    }

    /// Dispatches a received error and latches it when requested.
    pub fn handle_receive(&mut self, payload: &ErrorPayload, now: Instant) {
        if let Some(handler) = self.handlers[usize::from(payload.error.severity.into_u8())] {
            handler(payload.error);
        }

        if payload.error.behavior == Behavior::Latching {
            let record = ActiveError {
                error: payload.error,
                last_transmission: now,
            };
            if self.active.insert(payload.error_number, record).is_err() {
                error!(
                    "active error store full, dropping latched {:?}",
                    payload.error.code
                );
            }
        }
    }

    /// Removes every stored error with this code. Idempotent, local.
    pub fn clear(&mut self, code: ErrorCode) {
        let mut to_remove: Vec<u32, MAX_ACTIVE_ERRORS> = Vec::new();
        for (&error_number, status) in &self.active {
            if status.error.code == code {
                let _ = to_remove.push(error_number);
            }
        }
        for error_number in to_remove {
            self.active.remove(&error_number);
        }
    }

    fn emit(&mut self, port: &mut dyn FramePort, payload: &ErrorPayload) {
        let Some(id) = registry::encode(self.me, ContentType::Error) else {
            error!("unable to send an error, no id registered for {:?}", self.me);
            return;
        };
        port.send(&Frame::new(id, payload.encode()));
    }
}
