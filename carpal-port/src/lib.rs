//! Carpal host-board interface
//!
//! The crate provides the interface between the host board and the Carpal control
//! plane. Limited scope facilitates compatibility across versions. Board support
//! crates should depend on this crate. Control-plane users should depend on the
//! `carpal` crate instead.
//!
//! Three seams connect a board to the stack:
//! * [`port::FramePort`] — the transceiver, abstracted as non-blocking send and
//!   try-receive of 11-bit-id frames with 8-byte payloads.
//! * [`time::Clock`] — a monotonic millisecond time source. The control plane
//!   performs all timeout arithmetic with wrapping subtraction, so a 32-bit
//!   counter that rolls over is fine.
//! * [`sensor::Sensor`] — a pollable measurement source feeding a telemetry
//!   stream.
//!
//! The control plane never blocks inside any of these: `try_receive` must return
//! immediately, and `send` is best-effort (a full transmit buffer may drop the
//! frame).
#![no_std]

pub mod frame;
pub mod port;
pub mod sensor;
pub mod time;
