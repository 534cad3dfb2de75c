// Debounced Event Multiplexer
// Single poll(2) wait over the control queue, the grabbed device and key timers

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Result type for event loop operations
pub type EventLoopResult<T> = Result<T, EventLoopError>;

/// Errors that can occur in the event loop
#[derive(Debug, thiserror::Error)]
pub enum EventLoopError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Control queue closed")]
    ControlClosed,
}

/// Which sources became ready during one wait
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub control: bool,
    pub timers: bool,
    pub device: bool,
    /// POLLHUP, POLLERR or POLLNVAL on the device descriptor
    pub device_hangup: bool,
}

impl Readiness {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Reusable poll set.
///
/// Slot 0 is always the control queue, slot 1 the device when one is bound,
/// timer descriptors follow.
#[derive(Debug, Default)]
pub struct Multiplexer {
    poll_fds: Vec<libc::pollfd>,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until a source is ready or `timeout` elapses.
    ///
    /// `None` waits indefinitely. An interrupted wait (EINTR) reports
    /// nothing ready; the caller just goes around again.
    pub fn wait(
        &mut self,
        control: RawFd,
        device: Option<RawFd>,
        timers: impl IntoIterator<Item = RawFd>,
        timeout: Option<Duration>,
    ) -> EventLoopResult<Readiness> {
        self.poll_fds.clear();
        self.poll_fds.push(pollfd(control));
        if let Some(fd) = device {
            self.poll_fds.push(pollfd(fd));
        }
        let first_timer = self.poll_fds.len();
        self.poll_fds.extend(timers.into_iter().map(pollfd));

        let poll_result = unsafe {
            libc::poll(
                self.poll_fds.as_mut_ptr(),
                self.poll_fds.len() as libc::nfds_t,
                timeout_ms(timeout),
            )
        };

        let mut readiness = Readiness::default();
        if poll_result < 0 {
            let err = io::Error::last_os_error();
            // A signal was delivered; the caller re-checks its queues.
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(readiness);
            }
            return Err(EventLoopError::Io(err));
        }
        if poll_result == 0 {
            return Ok(readiness);
        }

        readiness.control = self.poll_fds[0].revents & libc::POLLIN != 0;
        if device.is_some() {
            let revents = self.poll_fds[1].revents;
            readiness.device = revents & libc::POLLIN != 0;
            readiness.device_hangup =
                revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0;
        }
        readiness.timers = self.poll_fds[first_timer..]
            .iter()
            .any(|pfd| pfd.revents & libc::POLLIN != 0);

        Ok(readiness)
    }
}

fn pollfd(fd: RawFd) -> libc::pollfd {
    libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    }
}

/// Convert to a poll(2) timeout, rounding up so a deadline is never
/// reported early.
fn timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(duration) => {
            let mut ms = duration.as_millis();
            if duration.subsec_nanos() % 1_000_000 != 0 {
                ms += 1;
            }
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}
