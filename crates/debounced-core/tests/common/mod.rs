// Shared fakes for the integration tests: no hardware, no real timers

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime};

use debounced_core::{
    Action, Backend, DeviceError, Emission, ExpiryTimer, KeySink, KeySource, Keycode,
    RawKeyEvent, SinkError, TimerSource,
};

pub fn at(base: Instant, ms: u64) -> Instant {
    base + Duration::from_millis(ms)
}

pub fn keys(emissions: &[Emission]) -> Vec<(u16, Action)> {
    emissions.iter().map(|e| (e.key.code(), e.action)).collect()
}

/// Live handle counters shared between the test and the backend
#[derive(Debug, Default, Clone)]
pub struct Handles {
    pub timers: Rc<Cell<usize>>,
    pub sources: Rc<Cell<usize>>,
    pub sinks: Rc<Cell<usize>>,
    /// Everything written to any sink, in order
    pub emitted: Rc<RefCell<Vec<Emission>>>,
    /// Batches the next `read_events` calls return
    pub pending: Rc<RefCell<VecDeque<Vec<RawKeyEvent>>>>,
    pub alive: Rc<Cell<bool>>,
    /// Make the next read fail as if the node vanished
    pub fail_read: Rc<Cell<bool>>,
}

impl Handles {
    pub fn new() -> Self {
        let handles = Self::default();
        handles.alive.set(true);
        handles
    }

    pub fn push(&self, key: Keycode, action: Action) {
        self.pending
            .borrow_mut()
            .push_back(vec![RawKeyEvent::new(key, action, SystemTime::now())]);
    }

    pub fn take_emitted(&self) -> Vec<(u16, Action)> {
        let emitted = std::mem::take(&mut *self.emitted.borrow_mut());
        keys(&emitted)
    }

    pub fn open_handles(&self) -> usize {
        self.timers.get() + self.sources.get() + self.sinks.get()
    }
}

#[derive(Debug)]
pub struct FakeTimer {
    deadline: Instant,
    live: Rc<Cell<usize>>,
}

impl ExpiryTimer for FakeTimer {
    fn deadline(&self) -> Instant {
        self.deadline
    }

    fn poll_fd(&self) -> Option<RawFd> {
        None
    }
}

impl Drop for FakeTimer {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeTimers {
    live: Rc<Cell<usize>>,
}

impl FakeTimers {
    pub fn new(live: Rc<Cell<usize>>) -> Self {
        Self { live }
    }

    pub fn live(&self) -> usize {
        self.live.get()
    }
}

impl TimerSource for FakeTimers {
    type Timer = FakeTimer;

    fn arm(&mut self, deadline: Instant, _now: Instant) -> io::Result<FakeTimer> {
        self.live.set(self.live.get() + 1);
        Ok(FakeTimer {
            deadline,
            live: Rc::clone(&self.live),
        })
    }
}

pub struct FakeSource {
    handles: Handles,
}

impl KeySource for FakeSource {
    fn poll_fd(&self) -> Option<RawFd> {
        None
    }

    fn read_events(&mut self) -> Result<Vec<RawKeyEvent>, DeviceError> {
        if self.handles.fail_read.get() {
            return Err(DeviceError::Lost("No such device".to_string()));
        }
        Ok(self.handles.pending.borrow_mut().pop_front().unwrap_or_default())
    }

    fn is_alive(&self) -> bool {
        self.handles.alive.get()
    }

    fn extra_keys(&self) -> Vec<u16> {
        Vec::new()
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.handles.sources.set(self.handles.sources.get() - 1);
    }
}

pub struct RecordingSink {
    handles: Handles,
}

impl KeySink for RecordingSink {
    fn emit(&mut self, emission: &Emission) -> Result<(), SinkError> {
        self.handles.emitted.borrow_mut().push(*emission);
        Ok(())
    }

    fn release_all(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        self.handles.sinks.set(self.handles.sinks.get() - 1);
    }
}

pub struct FakeBackend {
    pub handles: Handles,
    /// Paths that fail to grab
    pub busy: Vec<PathBuf>,
    pub fail_sink: bool,
}

impl FakeBackend {
    pub fn new(handles: Handles) -> Self {
        Self {
            handles,
            busy: Vec::new(),
            fail_sink: false,
        }
    }
}

impl Backend for FakeBackend {
    type Source = FakeSource;
    type Sink = RecordingSink;
    type Timers = FakeTimers;

    fn open_source(&mut self, path: &Path) -> Result<FakeSource, DeviceError> {
        if self.busy.iter().any(|busy| busy == path) {
            return Err(DeviceError::Grab {
                path: path.to_path_buf(),
                source: io::Error::from_raw_os_error(16),
            });
        }
        self.handles.sources.set(self.handles.sources.get() + 1);
        Ok(FakeSource {
            handles: self.handles.clone(),
        })
    }

    fn create_sink(&mut self, _name: &str, _extra_keys: &[u16]) -> Result<RecordingSink, SinkError> {
        if self.fail_sink {
            return Err(SinkError::DeviceCreation("uinput unavailable".to_string()));
        }
        self.handles.sinks.set(self.handles.sinks.get() + 1);
        Ok(RecordingSink {
            handles: self.handles.clone(),
        })
    }

    fn timers(&mut self) -> FakeTimers {
        FakeTimers::new(Rc::clone(&self.handles.timers))
    }
}
