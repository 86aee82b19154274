//! # Carpal
//!
//! Control plane for a small distributed robotic hand whose microcontrollers
//! share a CAN-class broadcast bus (11-bit arbitration ids, 8-byte payloads).
//! One node is the coordinator; the others drive finger motors and publish
//! sensor samples. The library gives every node a uniform façade over four
//! interaction patterns: commands with retransmit-until-acknowledged delivery
//! and a deferred start barrier, periodic sensor telemetry, heartbeat
//! liveness probing, and latched error broadcasting.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌────────────┐
//!                    │ Controller │◄── tick()
//!                    └──────┬─────┘
//!          ┌───────────┬────┴─────┬────────────┐
//!          ▼           ▼          ▼            ▼
//!    ┌──────────┐ ┌─────────┐ ┌───────┐ ┌────────────┐
//!    │ Command  │ │Heartbeat│ │ Error │ │ Sensor     │
//!    │ manager  │ │ manager │ │manager│ │ streams    │
//!    └────┬─────┘ └────┬────┘ └───┬───┘ └─────┬──────┘
//!         │            │          │           │
//!         └────────────┴────┬─────┴───────────┘
//!                           ▼
//!                    ┌────────────┐      ┌───────────┐
//!                    │  Registry  │      │ FramePort │
//!                    └────────────┘      └───────────┘
//! ```
//! Components:
//! * _Controller_ owns the frame port and the clock, advances every manager
//!   from a single cooperative `tick()`, and is the only receive path:
//!   each inbound frame is resolved through the registry, filtered
//!   (self-loopback, routing target), then dispatched by content type.
//! * _Registry_ is the immutable routing table between arbitration ids and
//!   `(sender, target, content)` descriptors.
//! * _Command manager_ provides outbound reliability (retransmit until
//!   acknowledged, a causal barrier holding `Begin` behind earlier commands)
//!   and the inbound execution buffer with slice-based scheduling.
//! * _Heartbeat manager_ probes peers from the coordinator and answers
//!   probes elsewhere, tracking expected-vs-actual response counters.
//! * _Error manager_ broadcasts reported errors, re-broadcasts them until
//!   cleared, and dispatches received errors to severity handlers.
//! * _Sensor streams_ publish one sensor reading each on a fixed interval.
//!
//! ## Concurrency model
//!
//! Strictly single-threaded and non-blocking: every behaviour advances only
//! inside `tick()`, which the host calls from its main loop. Time comes from
//! a host-supplied millisecond clock ([`time::Clock`]) and all timeout
//! arithmetic uses wrapping deltas, so a 32-bit counter roll-over is
//! harmless. The frame port is owned by the controller and lent to a manager
//! only for the duration of a call; there are no locks because there is
//! nothing to lock against.
//!
//! ## Limitations
//!
//! * The route table is static: no dynamic bus discovery or id negotiation.
//! * Fixed-interval scheduling only; no congestion control.
//! * No persistence across reboot and no message authentication.
#![no_std]

pub use carpal_core as core;
pub use carpal_port::{frame, port, time};

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod command;
pub mod controller;
pub mod error;
pub mod heartbeat;
pub mod registry;
pub mod sensor;

pub use controller::{Config, Controller, TickResult};
