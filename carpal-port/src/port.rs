//! Frame transceiver interface
//!
//! A driver implements [`FramePort`] over the board's CAN peripheral. The
//! control plane owns the port exclusively and polls it from `tick()`; drivers
//! may buffer frames in interrupt context internally, but the surface exposed
//! here is strictly non-blocking.

use crate::frame::Frame;

/// Non-blocking frame transceiver supplied by the host
pub trait FramePort {
    /// Brings the transceiver up. Called once from controller initialization.
    fn install(&mut self) {}

    /// Shuts the transceiver down.
    fn uninstall(&mut self) {}

    /// Queues a frame for transmission.
    ///
    /// Best-effort: a driver with a full transmit buffer may drop the frame.
    fn send(&mut self, frame: &Frame);

    /// Fetches one received frame, if any is pending. Must return immediately.
    fn try_receive(&mut self) -> Option<Frame>;
}
