//! Receive-path filtering: unknown ids, self-loopback, routing targets

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use carpal::core::{ContentType, NodeId};
use carpal::frame::Frame;
use carpal::{Config, Controller};

use common::{frame, MockClock, MockPort};

#[test]
fn test_self_loopback_is_dropped() {
    let port = MockPort::new();
    let clock = MockClock::new();
    let mut coordinator = Controller::new(port.clone(), clock, NodeId::Coordinator, Config::default());
    coordinator.initialize();

    // the coordinator's own command id arrives back at the coordinator
    port.push_rx(frame(0x200, &[0; 8]));
    assert!(coordinator.tick().is_none());
    assert!(port.sent().is_empty());
}

#[test]
fn test_unregistered_id_is_dropped() {
    let port = MockPort::new();
    let clock = MockClock::new();
    let mut coordinator = Controller::new(port.clone(), clock, NodeId::Coordinator, Config::default());
    coordinator.initialize();

    port.push_rx(frame(0x060, &[0; 8]));
    assert!(coordinator.tick().is_none());
}

#[test]
fn test_foreign_target_is_filtered() {
    let port = MockPort::new();
    let clock = MockClock::new();
    let mut motor0 = Controller::new(port.clone(), clock, NodeId::Motor0, Config::default());
    motor0.initialize();

    // another peripheral's command ack is addressed to the coordinator
    port.push_rx(frame(0x310, &[0; 8]));
    assert!(motor0.tick().is_none());
    assert!(port.sent().is_empty());
}

#[test]
fn test_unregistered_hook_sees_undispatched_frames() {
    static HOOK_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn hook(_frame: &Frame) {
        HOOK_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let port = MockPort::new();
    let clock = MockClock::new();
    let mut motor0 = Controller::new(port.clone(), clock, NodeId::Motor0, Config::default());
    motor0.initialize();
    motor0.set_unregistered_handler(hook);

    // unknown id, self-loopback, and a frame for someone else
    port.push_rx(frame(0x7F0, &[0; 8]));
    port.push_rx(frame(0x400, &[0; 8]));
    port.push_rx(frame(0x310, &[0; 8]));
    for _ in 0..3 {
        assert!(motor0.tick().is_none());
    }
    assert_eq!(HOOK_CALLS.load(Ordering::SeqCst), 3);
}

#[test]
fn test_dispatched_frame_is_returned() {
    let port = MockPort::new();
    let clock = MockClock::new();
    let mut motor0 = Controller::new(port.clone(), clock, NodeId::Motor0, Config::default());
    motor0.initialize();

    // a global error broadcast reaches every node
    port.push_rx(frame(
        0x000,
        &[1, 0, 0, 0, 0, 0, 0, 0], // error number 1, low, non-latching, heartbeat-loss
    ));
    let result = motor0.tick().expect("broadcast should be dispatched");
    assert_eq!(result.descriptor.sender, NodeId::Coordinator);
    assert_eq!(result.descriptor.content, ContentType::Error);
    assert_eq!(result.frame.id.into_u16(), 0x000);
}

#[test]
fn test_at_most_one_frame_per_tick() {
    let port = MockPort::new();
    let clock = MockClock::new();
    let mut motor0 = Controller::new(port.clone(), clock, NodeId::Motor0, Config::default());
    motor0.initialize();

    port.push_rx(frame(0x000, &[0; 8]));
    port.push_rx(frame(0x000, &[0; 8]));
    assert!(motor0.tick().is_some());
    assert!(motor0.tick().is_some());
    assert!(motor0.tick().is_none());
}
