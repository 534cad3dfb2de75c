// Debounced Expiry Timers
// One OS timer per pending key release

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::{Duration, Instant};

/// A single armed expiry timer.
///
/// A timer is owned by exactly one key record. Dropping the handle
/// cancels the timer and releases whatever OS resource backs it.
pub trait ExpiryTimer {
    /// Monotonic instant at which the timer fires
    fn deadline(&self) -> Instant;

    /// Descriptor that becomes readable when the timer fires.
    ///
    /// Timers without a descriptor are waited on by deadline instead.
    fn poll_fd(&self) -> Option<RawFd>;
}

/// Factory for expiry timers
pub trait TimerSource {
    type Timer: ExpiryTimer;

    /// Arm a timer for `deadline`, measured against `now`
    fn arm(&mut self, deadline: Instant, now: Instant) -> io::Result<Self::Timer>;
}

/// Linux `timerfd` backed expiry timer
#[derive(Debug)]
pub struct TimerFd {
    fd: OwnedFd,
    deadline: Instant,
}

impl TimerFd {
    /// Create and arm a one-shot CLOCK_MONOTONIC timer.
    pub fn arm(deadline: Instant, now: Instant) -> io::Result<Self> {
        let raw = unsafe {
            libc::timerfd_create(
                libc::CLOCK_MONOTONIC,
                libc::TFD_NONBLOCK | libc::TFD_CLOEXEC,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // Owned from here on: any early return closes the descriptor.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // A zero it_value disarms a timerfd, so an already-due deadline
        // still gets the smallest possible delay.
        let delay = deadline
            .saturating_duration_since(now)
            .max(Duration::from_nanos(1));
        let spec = libc::itimerspec {
            it_interval: libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            it_value: libc::timespec {
                tv_sec: delay.as_secs() as libc::time_t,
                tv_nsec: delay.subsec_nanos() as libc::c_long,
            },
        };

        let rc = unsafe { libc::timerfd_settime(fd.as_raw_fd(), 0, &spec, std::ptr::null_mut()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { fd, deadline })
    }
}

impl ExpiryTimer for TimerFd {
    fn deadline(&self) -> Instant {
        self.deadline
    }

    fn poll_fd(&self) -> Option<RawFd> {
        Some(self.fd.as_raw_fd())
    }
}

/// Timer source used by the daemon
#[derive(Debug, Default, Clone, Copy)]
pub struct TimerFdSource;

impl TimerSource for TimerFdSource {
    type Timer = TimerFd;

    fn arm(&mut self, deadline: Instant, now: Instant) -> io::Result<TimerFd> {
        TimerFd::arm(deadline, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_readable(fd: RawFd, timeout_ms: i32) -> bool {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        rc == 1 && pfd.revents & libc::POLLIN != 0
    }

    #[test]
    fn test_timerfd_fires_after_deadline() {
        let now = Instant::now();
        let deadline = now + Duration::from_millis(20);
        let timer = TimerFd::arm(deadline, now).unwrap();

        assert_eq!(timer.deadline(), deadline);
        let fd = timer.poll_fd().unwrap();
        assert!(!wait_readable(fd, 0));
        assert!(wait_readable(fd, 1000));
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn test_timerfd_past_deadline_fires_immediately() {
        let now = Instant::now();
        let timer = TimerFd::arm(now, now + Duration::from_millis(5)).unwrap();
        assert!(wait_readable(timer.poll_fd().unwrap(), 1000));
    }
}
