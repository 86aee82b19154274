//! Slice-based command execution
//!
//! Received commands accumulate in order and run in slices: contiguous runs
//! that the registered handlers agree may execute concurrently. A slice grows
//! forward until a handler reports the prospective slice is no longer
//! parallelisable; that command closes the slice and runs inside it. Handlers
//! are polled every tick while their slice is current, and the slice completes
//! when every command in it has reported completion once.

use heapless::Vec;

use crate::command::{CommandPayload, CommandType};
use crate::time::{Duration, Instant};

/// Buffered command slots per peripheral.
pub const CAPACITY: usize = 32;

/// Result of polling a command handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    Pending,
    Complete,
}

/// Executes buffered commands of one [`CommandType`]
pub trait CommandHandler {
    /// Whether `pending`, the prospective slice grown so far, can run as one
    /// concurrent batch.
    fn is_parallelizable(&self, pending: &[CommandPayload]) -> bool;

    /// Drives `command`. Called every tick while the command's slice is
    /// current; the first `Complete` is counted, further polls stop.
    fn poll(&mut self, command: &CommandPayload) -> Progress;
}

/// Summary of a finished execution run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExecutionStats {
    pub elapsed: Duration,
    pub executed: u8,
    pub success: bool,
}

/// Callback fired when an execution run finishes
pub type CompletionHook = fn(ExecutionStats);

/// Half-open index range over the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandSlice {
    start: usize,
    end: usize,
}

impl CommandSlice {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The empty sentinel. Any slice with `start >= end` is empty.
    pub const fn empty() -> Self {
        Self { start: 10, end: 0 }
    }

    pub const fn start(&self) -> usize {
        self.start
    }

    pub const fn end(&self) -> usize {
        self.end
    }

    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub const fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.end - self.start
        }
    }
}

/// Ordered command storage with slice-based concurrent execution
pub struct ExecutionBuffer<'a> {
    commands: Vec<CommandPayload, CAPACITY>,
    handlers: [Option<&'a mut dyn CommandHandler>; CommandType::COUNT],
    completion_hook: Option<CompletionHook>,
    current: CommandSlice,
    completed: [bool; CAPACITY],
    num_completed: usize,
    executing: bool,
    start_time: Instant,
}

impl<'a> ExecutionBuffer<'a> {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            handlers: [const { None }; CommandType::COUNT],
            completion_hook: None,
            current: CommandSlice::empty(),
            completed: [false; CAPACITY],
            num_completed: 0,
            executing: false,
            start_time: Instant::from_millis(0),
        }
    }

    /// Appends a command to the end of the buffer.
    pub fn push(&mut self, command: CommandPayload) {
        if self.commands.push(command).is_err() {
            error!("execution buffer full, dropping command");
        }
    }

    /// Installs the handler for `kind`. The most recent registration wins.
    pub fn set_handler(&mut self, kind: CommandType, handler: &'a mut dyn CommandHandler) {
        self.handlers[usize::from(kind.into_u8())] = Some(handler);
    }

    pub fn set_completion_hook(&mut self, hook: CompletionHook) {
        self.completion_hook = Some(hook);
    }

    /// Begins an execution run over the buffered commands.
    pub fn start_execution(&mut self, now: Instant) {
        if self.executing {
            error!("execution buffer is already executing");
            return;
        }
        self.start_time = now;
        self.executing = true;
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Advances the current slice, polling each of its commands.
    pub fn tick(&mut self, now: Instant) {
        if !self.executing {
            return;
        }

        if self.current.is_empty() {
            self.enter_slice(self.find_next_slice(self.current));
        }

        if self.current.is_empty() {
            self.executing = false;
            return;
        }

        for i in self.current.start()..self.current.end() {
            if self.completed[i] {
                continue;
            }
            let command = self.commands[i];
            let Some(handler) = self.handlers[usize::from(command.kind.into_u8())].as_mut() else {
                continue;
            };
            if handler.poll(&command) == Progress::Complete {
                self.completed[i] = true;
                self.num_completed += 1;
            }
        }

        if self.num_completed == self.current.len() {
            // capture before clearing the slice, or the count reads as zero
            let stats = ExecutionStats {
                elapsed: now.duration_since(self.start_time),
                executed: self.current.len() as u8,
                success: true,
            };
            self.num_completed = 0;
            self.current = CommandSlice::empty();
            self.executing = false;
            if let Some(hook) = self.completion_hook {
                hook(stats);
            }
        }
    }

    /// Drops all buffered commands and the current slice.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.current = CommandSlice::empty();
    }

    /// Rewinds slice scanning to the start of the buffer.
    ///
    /// Does not touch the executing flag; an ongoing run continues from the
    /// first command.
    pub fn reset(&mut self) {
        self.current = CommandSlice::new(0, 0);
    }

    fn enter_slice(&mut self, slice: CommandSlice) {
        self.current = slice;
        self.num_completed = 0;
        for i in slice.start()..slice.end() {
            self.completed[i] = false;
        }
    }

    /// The next slice after `current`: grows forward from `current.end` until
    /// a handler reports the prospective slice is not parallelisable; that
    /// command closes the slice and is included in it. If every remaining
    /// command is parallelisable the slice runs to the end of the buffer.
    fn find_next_slice(&self, current: CommandSlice) -> CommandSlice {
        let start = current.end();
        if start >= self.commands.len() {
            return CommandSlice::empty();
        }

        let mut end = self.commands.len();
        for i in start..self.commands.len() {
            let command = &self.commands[i];
            let Some(handler) = self.handlers[usize::from(command.kind.into_u8())].as_ref() else {
                continue;
            };
            if !handler.is_parallelizable(&self.commands[start..=i]) {
                end = i + 1;
                break;
            }
        }

        CommandSlice::new(start, end)
    }
}

impl<'a> Default for ExecutionBuffer<'a> {
    fn default() -> Self {
        Self::new()
    }
}
