// Debounced Trailing-Edge Debouncer
// Delays releases that arrive inside the debounce window, never drops a press

use std::time::{Duration, Instant, SystemTime};

use crate::action::Action;
use crate::key::Keycode;
use crate::state::{KeyRecord, PendingRelease};
use crate::timer::{ExpiryTimer, TimerSource};

/// Decision for a single physical transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceAction {
    /// Forward the press
    EmitDown,
    /// Forward the release now
    EmitUp,
    /// Forward as autorepeat (value 2)
    EmitRepeat,
    /// Swallow the event
    Suppress,
    /// Hold the release until the given instant
    ScheduleDelayedUp(Instant),
}

/// Per-key debounce state machine.
///
/// A release that lands within `window` of the accepted press is delayed
/// until `press_time + window`. A press arriving while that release is
/// pending cancels it, so contact chatter collapses into one continuous
/// press. The window is measured from the original press only: cancelling
/// a pending release does not restart it.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    window: Duration,
}

impl Debouncer {
    pub fn new(window_ms: u8) -> Self {
        Self {
            window: Duration::from_millis(u64::from(window_ms)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide what to do with one physical transition of `key`.
    ///
    /// The caller must flush an already-expired pending release through
    /// [`Debouncer::expire`] first.
    pub fn on_transition<S: TimerSource>(
        &self,
        key: Keycode,
        record: &mut KeyRecord<S::Timer>,
        action: Action,
        now: Instant,
        time: SystemTime,
        timers: &mut S,
    ) -> DebounceAction {
        let delta = record.touch(now);
        match action {
            Action::Press => self.on_down(key, record, now, delta),
            Action::Release => self.on_up(key, record, now, time, delta, timers),
            Action::Repeat => {
                if record.logical_down && !record.has_pending_release() {
                    log::trace!("[DB] {} REPEAT", key);
                    DebounceAction::EmitRepeat
                } else {
                    log::trace!("[DB] {} REPEAT dropped, key not held", key);
                    DebounceAction::Suppress
                }
            }
        }
    }

    fn on_down<T>(
        &self,
        key: Keycode,
        record: &mut KeyRecord<T>,
        now: Instant,
        delta: u128,
    ) -> DebounceAction {
        if record.pending_release.take().is_some() {
            // The UP was bounce on the break contact. Dropping the pending
            // release cancels its timer; press_time keeps its value.
            record.physically_down = true;
            log::debug!(
                "[DB] {} DOWN canceled pending UP, {}ms since last event",
                key,
                delta
            );
            return DebounceAction::Suppress;
        }

        if record.physically_down || record.logical_down {
            record.physically_down = true;
            log::trace!("[DB] {} DOWN while held, forwarded as repeat", key);
            return DebounceAction::EmitRepeat;
        }

        record.press_time = Some(now);
        record.physically_down = true;
        record.logical_down = true;
        log::debug!("[DB] {} DOWN, {}ms since last event", key, delta);
        DebounceAction::EmitDown
    }

    fn on_up<S: TimerSource>(
        &self,
        key: Keycode,
        record: &mut KeyRecord<S::Timer>,
        now: Instant,
        time: SystemTime,
        delta: u128,
        timers: &mut S,
    ) -> DebounceAction {
        record.physically_down = false;

        if !record.logical_down {
            // Held before the grab, or already released: nothing was
            // reported, so nothing to release.
            log::debug!("[DB] {} UP for a key not held, ignored", key);
            return DebounceAction::Suppress;
        }
        if record.has_pending_release() {
            log::trace!("[DB] {} UP while release already pending", key);
            return DebounceAction::Suppress;
        }

        let Some(press_time) = record.press_time else {
            record.logical_down = false;
            return DebounceAction::EmitUp;
        };

        let elapsed = now.saturating_duration_since(press_time);
        if elapsed >= self.window {
            record.logical_down = false;
            log::debug!("[DB] {} UP immediate, {}ms since last event", key, delta);
            return DebounceAction::EmitUp;
        }

        let deadline = press_time + self.window;
        match timers.arm(deadline, now) {
            Ok(timer) => {
                record.pending_release = Some(PendingRelease {
                    timer,
                    released_at: time,
                });
                log::debug!(
                    "[DB] {} UP pending, {}ms since press, flush after {}ms",
                    key,
                    elapsed.as_millis(),
                    (self.window - elapsed).as_millis()
                );
                DebounceAction::ScheduleDelayedUp(deadline)
            }
            Err(e) => {
                // Losing a release would leave the key stuck down.
                log::error!("Failed to arm release timer for {}: {}", key, e);
                record.logical_down = false;
                DebounceAction::EmitUp
            }
        }
    }

    /// Flush a pending release whose deadline has passed.
    ///
    /// Returns the timestamp of the original UP event, which the caller
    /// emits as the release.
    pub fn expire<T: ExpiryTimer>(
        &self,
        key: Keycode,
        record: &mut KeyRecord<T>,
        now: Instant,
    ) -> Option<SystemTime> {
        let due = record
            .pending_release
            .as_ref()
            .is_some_and(|pending| pending.deadline() <= now);
        if !due {
            return None;
        }

        let pending = record.pending_release.take()?;
        record.physically_down = false;
        record.logical_down = false;
        let delta = record.touch(now);
        log::debug!(
            "[DB] {} flush UP after {}ms, {}ms since last event",
            key,
            self.window.as_millis(),
            delta
        );
        Some(pending.released_at)
    }
}
