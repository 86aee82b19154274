#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use carpal::frame::{Data, Frame, FrameId};
use carpal::port::FramePort;
use carpal::time::{Clock, Instant};

#[derive(Default)]
struct PortState {
    installed: bool,
    sent: Vec<Frame>,
    rx: VecDeque<Frame>,
}

/// Frame port backed by in-memory queues.
///
/// Clones share state, so a test can keep one handle while the controller
/// owns another.
#[derive(Clone, Default)]
pub struct MockPort(Rc<RefCell<PortState>>);

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self) -> bool {
        self.0.borrow().installed
    }

    /// Enqueues a frame for the node to receive.
    pub fn push_rx(&self, frame: Frame) {
        self.0.borrow_mut().rx.push_back(frame);
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<Frame> {
        self.0.borrow().sent.clone()
    }

    /// Drains the sent log.
    pub fn take_sent(&self) -> Vec<Frame> {
        std::mem::take(&mut self.0.borrow_mut().sent)
    }

    pub fn sent_count(&self) -> usize {
        self.0.borrow().sent.len()
    }
}

impl FramePort for MockPort {
    fn install(&mut self) {
        self.0.borrow_mut().installed = true;
    }

    fn send(&mut self, frame: &Frame) {
        self.0.borrow_mut().sent.push(*frame);
    }

    fn try_receive(&mut self) -> Option<Frame> {
        self.0.borrow_mut().rx.pop_front()
    }
}

/// Manually advanced millisecond clock. Clones share the counter.
#[derive(Clone, Default)]
pub struct MockClock(Rc<Cell<u32>>);

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, millis: u32) {
        self.0.set(millis);
    }

    pub fn advance(&self, millis: u32) {
        self.0.set(self.0.get().wrapping_add(millis));
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.0.get())
    }
}

pub fn frame(id: u16, bytes: &[u8]) -> Frame {
    Frame::new(FrameId::new(id).unwrap(), Data::new(bytes).unwrap())
}

/// Frames in `sent` carrying the given arbitration id.
pub fn frames_with_id(sent: &[Frame], id: u16) -> Vec<Frame> {
    sent.iter()
        .filter(|frame| frame.id.into_u16() == id)
        .copied()
        .collect()
}
