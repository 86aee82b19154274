//! Pollable sensor interface

/// A measurement source owned by a telemetry stream
///
/// The stream calls `initialize` once, then `read` on every emission. `cleanup`
/// is for hosts that tear streams down; the control plane itself never calls it.
pub trait Sensor {
    fn initialize(&mut self) -> bool;
    fn read(&mut self) -> f32;
    fn cleanup(&mut self) {}
}

/// Closure-backed [`Sensor`] for hosts without a sensor type of their own
pub struct FnSensor<I, R>
where
    I: FnMut() -> bool,
    R: FnMut() -> f32,
{
    initialize: I,
    read: R,
}

impl<I, R> FnSensor<I, R>
where
    I: FnMut() -> bool,
    R: FnMut() -> f32,
{
    pub fn new(initialize: I, read: R) -> Self {
        Self { initialize, read }
    }
}

impl<I, R> Sensor for FnSensor<I, R>
where
    I: FnMut() -> bool,
    R: FnMut() -> f32,
{
    fn initialize(&mut self) -> bool {
        (self.initialize)()
    }

    fn read(&mut self) -> f32 {
        (self.read)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_sensor() {
        let mut sensor = FnSensor::new(|| true, || 2.5f32);
        assert!(sensor.initialize());
        assert_eq!(sensor.read(), 2.5);
        sensor.cleanup();
    }
}
