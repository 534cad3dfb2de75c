// Test doubles shared by unit tests

use std::cell::Cell;
use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::timer::{ExpiryTimer, TimerSource};

/// `base + ms`
pub(crate) fn at(base: Instant, ms: u64) -> Instant {
    base + Duration::from_millis(ms)
}

/// Deadline-only timer that counts live handles
#[derive(Debug)]
pub(crate) struct ManualTimer {
    deadline: Instant,
    live: Rc<Cell<usize>>,
}

impl ExpiryTimer for ManualTimer {
    fn deadline(&self) -> Instant {
        self.deadline
    }

    fn poll_fd(&self) -> Option<RawFd> {
        None
    }
}

impl Drop for ManualTimer {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Debug, Default)]
pub(crate) struct ManualTimers {
    live: Rc<Cell<usize>>,
    fail_next: bool,
}

impl ManualTimers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Outstanding timer handles
    pub(crate) fn live(&self) -> usize {
        self.live.get()
    }

    pub(crate) fn fail_next(&mut self) {
        self.fail_next = true;
    }
}

impl TimerSource for ManualTimers {
    type Timer = ManualTimer;

    fn arm(&mut self, deadline: Instant, _now: Instant) -> io::Result<ManualTimer> {
        if std::mem::take(&mut self.fail_next) {
            return Err(io::Error::new(io::ErrorKind::Other, "timer unavailable"));
        }
        self.live.set(self.live.get() + 1);
        Ok(ManualTimer {
            deadline,
            live: Rc::clone(&self.live),
        })
    }
}
