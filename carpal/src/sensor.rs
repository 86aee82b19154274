//! Sensor telemetry streams
//!
//! A [`SensorStream`] owns exclusive access to one host sensor and periodically
//! publishes its reading on the node's sensor-data id. Streams are polled from
//! the controller tick; a disabled stream keeps its timer so re-enabling does
//! not produce a burst.

use crate::core::{ContentType, InvalidValue, NodeId};
use crate::frame::{Data, Frame};
use crate::port::FramePort;
use crate::registry;
use crate::time::{Duration, Instant};

pub use carpal_port::sensor::{FnSensor, Sensor};

/// Wire payload of a sensor-data frame
///
/// Bytes 0-3: reading as IEEE-754 f32 LE, byte 4: sensor id, 5-7 reserved.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorPayload {
    pub value: f32,
    pub sensor_id: u8,
}

impl SensorPayload {
    pub fn encode(&self) -> Data {
        let mut data = Data::new_zeros(8);
        data[0..4].copy_from_slice(&self.value.to_le_bytes());
        data[4] = self.sensor_id;
        data
    }
}

impl TryFrom<&Data> for SensorPayload {
    type Error = InvalidValue;

    fn try_from(data: &Data) -> Result<Self, InvalidValue> {
        if data.len() < 5 {
            return Err(InvalidValue);
        }
        let mut bits = [0; 4];
        bits.copy_from_slice(&data[0..4]);
        Ok(Self {
            value: f32::from_le_bytes(bits),
            sensor_id: data[4],
        })
    }
}

/// Latest reading received from a remote sensor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorStatus {
    pub sender: NodeId,
    pub sensor_id: u8,
    pub value: f32,
}

/// Periodic publisher for one sensor
pub struct SensorStream<'a> {
    sensor: &'a mut dyn Sensor,
    owner: NodeId,
    sensor_id: u8,
    interval: Duration,
    enabled: bool,
    last_send: Instant,
}

impl<'a> SensorStream<'a> {
    pub fn new(
        owner: NodeId,
        interval: Duration,
        sensor_id: u8,
        sensor: &'a mut dyn Sensor,
    ) -> Self {
        Self {
            sensor,
            owner,
            sensor_id,
            interval,
            enabled: true,
            last_send: Instant::from_millis(0),
        }
    }

    /// Brings the sensor hardware up and arms the send timer.
    pub fn initialize(&mut self, now: Instant) {
        if !self.sensor.initialize() {
            error!("sensor {} failed to initialize", self.sensor_id);
        }
        self.last_send = now;
    }

    /// Reads and publishes when the interval has elapsed.
    ///
    /// If the owning node has no registered sensor-data id the send is skipped
    /// and the timer is not advanced, so the stream retries every tick.
    pub fn tick(&mut self, port: &mut dyn FramePort, now: Instant) {
        if !self.enabled {
            return;
        }
        if now.duration_since(self.last_send) < self.interval {
            return;
        }

        let value = self.sensor.read();
        let payload = SensorPayload {
            value,
            sensor_id: self.sensor_id,
        };

        let Some(id) = registry::encode(self.owner, ContentType::SensorData) else {
            error!(
                "unable to send sensor data, no id registered for {:?}",
                self.owner
            );
            return;
        };

        port.send(&Frame::new(id, payload.encode()));
        self.last_send = now;
    }

    /// Gates emission without touching the timer.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn sensor_id(&self) -> u8 {
        self.sensor_id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
