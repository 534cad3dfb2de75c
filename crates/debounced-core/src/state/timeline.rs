// Debounced Key Timeline
// Dense per-keycode arena of physical/logical press state

use std::time::{Instant, SystemTime};

use crate::key::Keycode;
use crate::timer::ExpiryTimer;

/// A release that has been observed but not yet reported.
#[derive(Debug)]
pub struct PendingRelease<T> {
    /// Expiry timer, cancelled when this value is dropped
    pub timer: T,
    /// Timestamp of the physical UP event being delayed
    pub released_at: SystemTime,
}

impl<T: ExpiryTimer> PendingRelease<T> {
    pub fn deadline(&self) -> Instant {
        self.timer.deadline()
    }
}

/// State of one keycode.
///
/// Invariant: `pending_release.is_some()` implies `logical_down`.
#[derive(Debug)]
pub struct KeyRecord<T> {
    /// Last known physical state
    pub physically_down: bool,
    /// State last reported to the virtual sink
    pub logical_down: bool,
    /// Monotonic time of the most recent accepted DOWN
    pub press_time: Option<Instant>,
    /// Delayed release and its timer (at most one per key)
    pub pending_release: Option<PendingRelease<T>>,
    /// Diagnostics only
    pub last_event_time: Option<Instant>,
}

impl<T> Default for KeyRecord<T> {
    fn default() -> Self {
        Self {
            physically_down: false,
            logical_down: false,
            press_time: None,
            pending_release: None,
            last_event_time: None,
        }
    }
}

impl<T> KeyRecord<T> {
    /// Milliseconds since the previous event on this key, for log lines
    pub fn touch(&mut self, now: Instant) -> u128 {
        let delta = self
            .last_event_time
            .map(|last| now.saturating_duration_since(last).as_millis())
            .unwrap_or(0);
        self.last_event_time = Some(now);
        delta
    }

    pub fn has_pending_release(&self) -> bool {
        self.pending_release.is_some()
    }
}

/// Arena of [`KeyRecord`]s indexed by raw keycode.
#[derive(Debug)]
pub struct KeyTimeline<T> {
    records: Vec<KeyRecord<T>>,
}

impl<T> Default for KeyTimeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> KeyTimeline<T> {
    pub fn new() -> Self {
        Self {
            records: (0..Keycode::ADDRESSABLE).map(|_| KeyRecord::default()).collect(),
        }
    }

    /// Record for an addressable keycode
    pub fn get(&self, key: Keycode) -> Option<&KeyRecord<T>> {
        key.index().map(|idx| &self.records[idx])
    }

    pub fn get_mut(&mut self, key: Keycode) -> Option<&mut KeyRecord<T>> {
        key.index().map(move |idx| &mut self.records[idx])
    }

    /// Number of outstanding expiry timers
    pub fn pending_count(&self) -> usize {
        self.records.iter().filter(|r| r.has_pending_release()).count()
    }

    /// Keycodes currently reported as held, in keycode order
    pub fn logically_down(&self) -> Vec<Keycode> {
        self.keys()
            .filter(|(_, record)| record.logical_down)
            .map(|(key, _)| key)
            .collect()
    }

    /// Iterate records with their keycodes, in keycode order
    pub fn keys(&self) -> impl Iterator<Item = (Keycode, &KeyRecord<T>)> {
        self.records
            .iter()
            .enumerate()
            .map(|(idx, record)| (Keycode(idx as u16), record))
    }

    /// Reset every record, dropping all timers
    pub fn clear(&mut self) {
        self.records
            .iter_mut()
            .for_each(|record| *record = KeyRecord::default());
    }
}

impl<T: ExpiryTimer> KeyTimeline<T> {
    /// Keys whose pending release is due at `now`, in keycode order
    pub fn expired(&self, now: Instant) -> Vec<Keycode> {
        self.keys()
            .filter(|(_, record)| {
                record
                    .pending_release
                    .as_ref()
                    .is_some_and(|pending| pending.deadline() <= now)
            })
            .map(|(key, _)| key)
            .collect()
    }

    /// Earliest pending deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.records
            .iter()
            .filter_map(|record| record.pending_release.as_ref())
            .map(PendingRelease::deadline)
            .min()
    }

    /// Timers for the multiplexer's wait set
    pub fn timers(&self) -> impl Iterator<Item = &T> {
        self.records
            .iter()
            .filter_map(|record| record.pending_release.as_ref())
            .map(|pending| &pending.timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::RawFd;
    use std::time::Duration;

    struct Deadline(Instant);

    impl ExpiryTimer for Deadline {
        fn deadline(&self) -> Instant {
            self.0
        }

        fn poll_fd(&self) -> Option<RawFd> {
            None
        }
    }

    fn pending(at: Instant) -> Option<PendingRelease<Deadline>> {
        Some(PendingRelease {
            timer: Deadline(at),
            released_at: SystemTime::now(),
        })
    }

    #[test]
    fn test_timeline_covers_addressable_range() {
        let timeline: KeyTimeline<Deadline> = KeyTimeline::new();
        assert!(timeline.get(Keycode(0)).is_some());
        assert!(timeline.get(Keycode(255)).is_some());
        assert!(timeline.get(Keycode(256)).is_none());
        assert_eq!(timeline.pending_count(), 0);
    }

    #[test]
    fn test_expired_in_keycode_order() {
        let base = Instant::now();
        let mut timeline = KeyTimeline::new();
        for (code, offset) in [(40u16, 5u64), (10, 8), (20, 50)] {
            let record = timeline.get_mut(Keycode(code)).unwrap();
            record.logical_down = true;
            record.pending_release = pending(base + Duration::from_millis(offset));
        }

        let due = timeline.expired(base + Duration::from_millis(10));
        assert_eq!(due, vec![Keycode(10), Keycode(40)]);
        assert_eq!(timeline.next_deadline(), Some(base + Duration::from_millis(5)));
        assert_eq!(timeline.pending_count(), 3);
    }

    #[test]
    fn test_clear_drops_timers() {
        let mut timeline = KeyTimeline::new();
        let record = timeline.get_mut(Keycode::A).unwrap();
        record.logical_down = true;
        record.pending_release = pending(Instant::now());

        assert_eq!(timeline.logically_down(), vec![Keycode::A]);
        timeline.clear();
        assert_eq!(timeline.pending_count(), 0);
        assert!(timeline.logically_down().is_empty());
    }

    #[test]
    fn test_touch_reports_delta() {
        let base = Instant::now();
        let mut record: KeyRecord<Deadline> = KeyRecord::default();
        assert_eq!(record.touch(base), 0);
        assert_eq!(record.touch(base + Duration::from_millis(12)), 12);
    }
}
