//! Controller façade
//!
//! One [`Controller`] per node. It owns the frame port and the clock, composes
//! the sub-protocol managers and drives them all from a single non-blocking
//! [`tick`](Controller::tick), which also consumes at most one inbound frame
//! and dispatches it by content type.

use heapless::Vec;

use crate::command::buffer::{CommandHandler, CompletionHook, ExecutionBuffer};
use crate::command::{CommandAction, CommandManager, CommandType};
use crate::core::{ContentType, NodeId, Target};
use crate::error::{
    Behavior, ErrorCode, ErrorHandler, ErrorManager, ErrorPayload, Severity,
    DEFAULT_RETRANSMIT_INTERVAL,
};
use crate::frame::Frame;
use crate::heartbeat::{HeartbeatManager, HeartbeatRequest};
use crate::port::FramePort;
use crate::registry::{self, MessageDescriptor};
use crate::sensor::{Sensor, SensorPayload, SensorStatus, SensorStream};
use crate::time::{Clock, Duration, Instant};

/// Telemetry streams a node may publish.
pub const MAX_SENSOR_STREAMS: usize = 4;

/// Remote sensor readings a node tracks.
pub const MAX_SENSOR_STATUSES: usize = 16;

/// Controller construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Interval between re-broadcasts of outstanding errors.
    pub error_retransmit: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            error_retransmit: DEFAULT_RETRANSMIT_INTERVAL,
        }
    }
}

/// Hook for frames the controller will not dispatch: unregistered ids,
/// self-loopback, and frames filtered out by the routing target.
pub type FrameHook = fn(&Frame);

/// A consumed frame and its resolved route
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickResult {
    pub frame: Frame,
    pub descriptor: MessageDescriptor,
}

/// Per-node control plane
pub struct Controller<'a, P: FramePort, C: Clock> {
    port: P,
    clock: C,
    me: NodeId,
    config: Config,
    streams: Vec<SensorStream<'a>, MAX_SENSOR_STREAMS>,
    heartbeat: HeartbeatManager,
    errors: ErrorManager,
    commands: CommandManager<'a>,
    sensor_statuses: Vec<SensorStatus, MAX_SENSOR_STATUSES>,
    unregistered_hook: Option<FrameHook>,
}

impl<'a, P: FramePort, C: Clock> Controller<'a, P, C> {
    pub fn new(port: P, clock: C, me: NodeId, config: Config) -> Self {
        Self {
            port,
            clock,
            me,
            config,
            streams: Vec::new(),
            heartbeat: HeartbeatManager::new(me),
            errors: ErrorManager::new(me),
            commands: CommandManager::new(me),
            sensor_statuses: Vec::new(),
            unregistered_hook: None,
        }
    }

    /// Brings the port up and arms the error manager.
    pub fn initialize(&mut self) {
        self.port.install();
        self.errors.initialize(self.config.error_retransmit);
    }

    pub fn me(&self) -> NodeId {
        self.me
    }

    /// Registers a telemetry stream publishing `sensor` every `interval`.
    ///
    /// The sensor's init hook runs here and the stream starts enabled.
    pub fn add_sensor(&mut self, interval: Duration, sensor_id: u8, sensor: &'a mut dyn Sensor) {
        let mut stream = SensorStream::new(self.me, interval, sensor_id, sensor);
        stream.initialize(self.clock.now());
        if self.streams.push(stream).is_err() {
            error!("sensor stream table full, dropping sensor {}", sensor_id);
        }
    }

    /// Issues a command to `target`. Coordinator only.
    ///
    /// Returns the assigned command id. A `Begin` is held until every earlier
    /// command has been acknowledged or dropped.
    pub fn send_command(&mut self, target: Target, action: CommandAction) -> u16 {
        let payload = self.commands.compose(target, action);
        let now = self.clock.now();
        self.commands.send(&mut self.port, now, payload);
        payload.command_id
    }

    /// Starts probing `peers` every `interval`.
    pub fn enable_heartbeat_monitoring(&mut self, interval: Duration, peers: &[NodeId]) {
        let now = self.clock.now();
        self.heartbeat
            .initialize(&mut self.port, now, interval, peers);
    }

    /// Broadcasts an error; it retransmits until [`clear_error`](Self::clear_error).
    pub fn report_error(&mut self, code: ErrorCode, severity: Severity, behavior: Behavior) {
        let now = self.clock.now();
        self.errors
            .report(&mut self.port, now, code, severity, behavior);
    }

    /// Stops retransmitting every stored error with this code.
    pub fn clear_error(&mut self, code: ErrorCode) {
        self.errors.clear(code);
    }

    pub fn add_error_handler(&mut self, severity: Severity, handler: ErrorHandler) {
        self.errors.add_handler(severity, handler);
    }

    pub fn set_command_handler(&mut self, kind: CommandType, handler: &'a mut dyn CommandHandler) {
        self.commands.execution_buffer().set_handler(kind, handler);
    }

    pub fn set_completion_hook(&mut self, hook: CompletionHook) {
        self.commands.execution_buffer().set_completion_hook(hook);
    }

    /// Begins executing locally buffered commands, as a received `Begin` would.
    pub fn start_execution(&mut self) {
        let now = self.clock.now();
        self.commands.execution_buffer().start_execution(now);
    }

    pub fn execution_buffer(&mut self) -> &mut ExecutionBuffer<'a> {
        self.commands.execution_buffer()
    }

    pub fn heartbeat(&self) -> &HeartbeatManager {
        &self.heartbeat
    }

    pub fn set_unregistered_handler(&mut self, handler: FrameHook) {
        self.unregistered_hook = Some(handler);
    }

    /// Latest value heard from `(sender, sensor_id)`.
    pub fn get_sensor_value(&self, sender: NodeId, sensor_id: u8) -> Option<f32> {
        self.sensor_statuses
            .iter()
            .find(|status| status.sender == sender && status.sensor_id == sensor_id)
            .map(|status| status.value)
    }

    /// Advances every sub-protocol, then consumes at most one inbound frame.
    ///
    /// Returns the frame and its route when one was dispatched.
    pub fn tick(&mut self) -> Option<TickResult> {
        let now = self.clock.now();

        for stream in self.streams.iter_mut() {
            stream.tick(&mut self.port, now);
        }
        if !self.heartbeat.tick(&mut self.port, now) {
            error!("heartbeat failure");
        }
        self.commands.tick(&mut self.port, now);
        self.errors.tick(&mut self.port, now);

        let frame = self.port.try_receive()?;

        let Some(descriptor) = registry::lookup(frame.id) else {
            match self.unregistered_hook {
                Some(hook) => hook(&frame),
                None => error!("received an unregistered id {}", frame.id.into_u16()),
            }
            return None;
        };

        if descriptor.sender == self.me {
            match self.unregistered_hook {
                Some(hook) => hook(&frame),
                None => error!("received a frame from self"),
            }
            return None;
        }

        if !descriptor.should_listen(self.me) {
            if let Some(hook) = self.unregistered_hook {
                hook(&frame);
            }
            return None;
        }

        match descriptor.content {
            ContentType::Command => {
                self.commands
                    .handle_message(&mut self.port, now, &frame, &mut self.streams);
            }
            ContentType::Heartbeat => self.handle_heartbeat(now, &frame, descriptor.sender),
            ContentType::Error => match ErrorPayload::try_from(&frame.data) {
                Ok(payload) => self.errors.handle_receive(&payload, now),
                Err(_) => error!("unable to decode an error payload"),
            },
            ContentType::SensorData => self.handle_sensor_data(descriptor.sender, &frame),
        }

        Some(TickResult { frame, descriptor })
    }

    fn handle_heartbeat(&mut self, now: Instant, frame: &Frame, sender: NodeId) {
        if self.me == NodeId::Coordinator {
            // responses carry the sender's counter; the sender identity is the
            // route's
            self.heartbeat.on_response(sender, now);
            return;
        }

        match HeartbeatRequest::try_from(&frame.data) {
            Ok(request) if request.node == self.me => {
                self.heartbeat.send_response(&mut self.port);
            }
            Ok(_) => {} // a probe for someone else
            Err(_) => error!("unable to decode a heartbeat request"),
        }
    }

    fn handle_sensor_data(&mut self, sender: NodeId, frame: &Frame) {
        let payload = match SensorPayload::try_from(&frame.data) {
            Ok(payload) => payload,
            Err(_) => {
                error!("unable to decode a sensor payload");
                return;
            }
        };

        for status in self.sensor_statuses.iter_mut() {
            if status.sender == sender && status.sensor_id == payload.sensor_id {
                status.value = payload.value;
                return;
            }
        }

        debug!("first sample from {:?} sensor {}", sender, payload.sensor_id);
        let status = SensorStatus {
            sender,
            sensor_id: payload.sensor_id,
            value: payload.value,
        };
        if self.sensor_statuses.push(status).is_err() {
            error!("sensor status table full, dropping sample");
        }
    }
}
