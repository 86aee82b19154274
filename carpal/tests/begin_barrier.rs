//! Command delivery and the begin barrier across two simulated nodes

mod common;

use carpal::command::{
    CommandAction, CommandManager, CommandPayload, CommandType, MotorControl, MotorMode,
};
use carpal::core::{NodeId, Target};
use carpal::time::{Duration, Instant};
use carpal::{Config, Controller};

use common::{frame, frames_with_id, MockClock, MockPort};

fn motor_action() -> CommandAction {
    CommandAction::MotorControl(MotorControl {
        node: NodeId::Motor0,
        motor: 0,
        mode: MotorMode::Position,
        value: 10,
    })
}

#[test]
fn test_begin_barrier_end_to_end() {
    let coord_port = MockPort::new();
    let coord_clock = MockClock::new();
    let mut coordinator = Controller::new(
        coord_port.clone(),
        coord_clock.clone(),
        NodeId::Coordinator,
        Config::default(),
    );
    coordinator.initialize();

    let periph_port = MockPort::new();
    let periph_clock = MockClock::new();
    let mut peripheral = Controller::new(
        periph_port.clone(),
        periph_clock.clone(),
        NodeId::Motor0,
        Config::default(),
    );
    peripheral.initialize();

    // a motor command goes out immediately; the begin is held
    coordinator.send_command(Target::Node(NodeId::Motor0), motor_action());
    coordinator.send_command(Target::AnyPeripheral, CommandAction::Begin);

    let sent = coord_port.take_sent();
    assert_eq!(sent.len(), 1);
    let command_frame = sent[0];
    assert_eq!(command_frame.id.into_u16(), 0x200);
    assert_eq!(command_frame.data[0], CommandType::MotorControl.into_u8());
    assert_eq!(command_frame.data[1], NodeId::Motor0.into_u8());
    // detail word: [node, motor, mode, value]
    assert_eq!(&command_frame.data[4..8], &[1, 0, 0, 10]);

    // while the barrier is armed, ticking must not leak the begin
    assert!(coordinator.tick().is_none());
    assert!(coord_port.sent().is_empty());

    // the peripheral hears the command and echoes the payload as its ack
    periph_port.push_rx(command_frame);
    let result = peripheral.tick().expect("peripheral should consume the command");
    assert_eq!(result.frame.id.into_u16(), 0x200);

    let acks = frames_with_id(&periph_port.sent(), 0x300);
    assert_eq!(acks.len(), 1);
    assert_eq!(&acks[0].data[..], &command_frame.data[..]);

    // the ack releases the barrier on the next coordinator tick
    coord_port.push_rx(acks[0]);
    assert!(coordinator.tick().is_some());
    assert!(coord_port.sent().is_empty());

    coordinator.tick();
    let released = coord_port.take_sent();
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].id.into_u16(), 0x200);
    assert_eq!(released[0].data[0], CommandType::Begin.into_u8());
}

#[test]
fn test_barrier_state_at_manager_level() {
    let mut port = MockPort::new();
    let mut manager = CommandManager::new(NodeId::Coordinator);
    let now = Instant::from_millis(0);

    let motor = manager.compose(Target::Node(NodeId::Motor0), motor_action());
    let begin = manager.compose(Target::AnyPeripheral, CommandAction::Begin);
    assert_eq!(motor.command_id, 0);
    assert_eq!(begin.command_id, 1);

    manager.send(&mut port, now, motor);
    manager.send(&mut port, now, begin);
    assert!(manager.begin_pending());
    assert_eq!(port.sent_count(), 1);

    manager.tick(&mut port, now);
    assert!(manager.begin_pending());
    assert_eq!(port.sent_count(), 1);

    // the bit-identical echo arrives on the peripheral's command id
    let ack = frame(0x300, &motor.encode());
    let mut streams = [];
    manager.handle_message(&mut port, now, &ack, &mut streams);

    manager.tick(&mut port, now);
    assert!(!manager.begin_pending());
    let sent = port.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(
        CommandPayload::try_from(&sent[1].data).unwrap().kind,
        CommandType::Begin
    );
}

#[test]
fn test_spurious_ack_is_ignored() {
    let mut port = MockPort::new();
    let mut manager = CommandManager::new(NodeId::Coordinator);
    let now = Instant::from_millis(0);

    let payload = manager.compose(Target::Node(NodeId::Motor0), motor_action());
    manager.send(&mut port, now, payload);

    // an ack for a command never sent: logged and dropped
    let bogus = CommandPayload {
        command_id: 999,
        ..payload
    };
    let mut streams = [];
    manager.handle_message(&mut port, now, &frame(0x300, &bogus.encode()), &mut streams);

    // the real command is still tracked and retransmits
    manager.tick(&mut port, Instant::from_millis(1500));
    assert_eq!(port.sent_count(), 2);
}

#[test]
fn test_only_coordinator_sends() {
    let port = MockPort::new();
    let clock = MockClock::new();
    let mut peripheral = Controller::new(port.clone(), clock, NodeId::Motor1, Config::default());
    peripheral.initialize();

    peripheral.send_command(Target::Node(NodeId::Motor0), motor_action());
    assert!(port.sent().is_empty());
}

#[test]
fn test_stop_and_unknown_toggle_are_acked_only() {
    let port = MockPort::new();
    let clock = MockClock::new();
    let mut peripheral = Controller::new(port.clone(), clock, NodeId::Motor0, Config::default());
    peripheral.initialize();

    let stop = CommandPayload {
        kind: CommandType::Stop,
        target: Target::AnyPeripheral,
        command_id: 5,
        detail: 0,
    };
    port.push_rx(frame(0x200, &stop.encode()));
    peripheral.tick();

    // stop is reserved: acknowledged, otherwise a no-op
    let sent = port.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id.into_u16(), 0x300);
    assert_eq!(&sent[0].data[..], &stop.encode()[..]);

    // toggling a sensor this node does not have: acknowledged and dropped
    let toggle = CommandPayload {
        kind: CommandType::SensorToggle,
        target: Target::Node(NodeId::Motor0),
        command_id: 6,
        detail: u32::from_le_bytes([NodeId::Motor0.into_u8(), 9, 1, 0]),
    };
    port.push_rx(frame(0x200, &toggle.encode()));
    peripheral.tick();

    let sent = port.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id.into_u16(), 0x300);
}

#[test]
fn test_command_interval_allows_duplicate_sends() {
    // two commands with distinct ids are tracked independently
    let mut port = MockPort::new();
    let mut manager = CommandManager::new(NodeId::Coordinator);
    let now = Instant::from_millis(0);

    let first = manager.compose(Target::Node(NodeId::Motor0), motor_action());
    let second = manager.compose(Target::Node(NodeId::Motor0), motor_action());
    manager.send(&mut port, now, first);
    manager.send(&mut port, now, second);
    assert_eq!(port.sent_count(), 2);

    let mut streams = [];
    manager.handle_message(
        &mut port,
        now,
        &frame(0x300, &first.encode()),
        &mut streams,
    );

    // only the unacked one retransmits
    manager.tick(&mut port, now + Duration::from_millis(1500));
    let sent = port.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(
        CommandPayload::try_from(&sent[2].data).unwrap().command_id,
        second.command_id
    );
}
