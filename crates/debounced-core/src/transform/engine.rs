// Debounced Engine Context
// Routes physical transitions through FlashTap and the debouncer
//
// One engine exists per active session. It exclusively owns every key
// record, FlashTap pair and expiry timer; nothing else mutates them.

use smallvec::{smallvec, SmallVec};
use std::time::{Instant, SystemTime};

use crate::action::Action;
use crate::config::DaemonConfig;
use crate::key::Keycode;
use crate::output::Emission;
use crate::state::KeyTimeline;
use crate::timer::TimerSource;
use crate::transform::debounce::{DebounceAction, Debouncer};
use crate::transform::flashtap::FlashPair;

/// Emissions produced by one engine step
pub type Emissions = SmallVec<[Emission; 4]>;

/// Event-processing engine for one bound device session
pub struct Engine<S: TimerSource> {
    config: DaemonConfig,
    debouncer: Debouncer,
    timeline: KeyTimeline<S::Timer>,
    pairs: Vec<FlashPair>,
    timers: S,
}

impl<S: TimerSource> Engine<S> {
    pub fn new(config: DaemonConfig, timers: S) -> Self {
        let pairs = if config.mode.flashtap_enabled() {
            config
                .flashtap_pairs
                .pairs()
                .into_iter()
                .map(|(a, b)| FlashPair::new(a, b))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            debouncer: Debouncer::new(config.debounce_window_ms),
            config,
            timeline: KeyTimeline::new(),
            pairs,
            timers,
        }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn timeline(&self) -> &KeyTimeline<S::Timer> {
        &self.timeline
    }

    pub fn pairs(&self) -> &[FlashPair] {
        &self.pairs
    }

    /// Number of outstanding release timers
    pub fn pending_timers(&self) -> usize {
        self.timeline.pending_count()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timeline.next_deadline()
    }

    /// Timers to include in the multiplexer's wait set
    pub fn timers(&self) -> impl Iterator<Item = &S::Timer> {
        self.timeline.timers()
    }

    /// Process one physical key transition observed at `now`.
    pub fn process(
        &mut self,
        key: Keycode,
        action: Action,
        now: Instant,
        time: SystemTime,
    ) -> Emissions {
        if !key.is_addressable() || key.is_bypass() {
            return smallvec![Emission::new(key, action, time)];
        }

        let mut out = Emissions::new();

        // A release whose timer already fired but was not yet serviced
        // must reach the consumer before this newer event.
        if let Some(record) = self.timeline.get_mut(key) {
            if let Some(released_at) = self.debouncer.expire(key, record, now) {
                out.push(Emission::new(key, Action::Release, released_at));
            }
        }

        if self.config.mode.flashtap_enabled() {
            if let Some(pair) = self.pairs.iter_mut().find(|pair| pair.contains(key)) {
                out.extend(pair.on_event(key, action, time));
                return out;
            }
        }

        if !self.config.mode.debounce_enabled() {
            out.push(Emission::new(key, action, time));
            return out;
        }

        if let Some(record) = self.timeline.get_mut(key) {
            let decision =
                self.debouncer
                    .on_transition(key, record, action, now, time, &mut self.timers);
            match decision {
                DebounceAction::EmitDown => out.push(Emission::new(key, Action::Press, time)),
                DebounceAction::EmitUp => out.push(Emission::new(key, Action::Release, time)),
                DebounceAction::EmitRepeat => out.push(Emission::new(key, Action::Repeat, time)),
                DebounceAction::Suppress | DebounceAction::ScheduleDelayedUp(_) => {}
            }
        }
        out
    }

    /// Flush every delayed release due at `now`, in keycode order.
    pub fn flush_expired(&mut self, now: Instant) -> Emissions {
        let mut out = Emissions::new();
        for key in self.timeline.expired(now) {
            if let Some(record) = self.timeline.get_mut(key) {
                if let Some(released_at) = self.debouncer.expire(key, record, now) {
                    out.push(Emission::new(key, Action::Release, released_at));
                }
            }
        }
        out
    }

    /// Release every logically-down key and cancel all timers.
    pub fn release_all(&mut self, time: SystemTime) -> Emissions {
        let mut out: Emissions = self
            .timeline
            .logically_down()
            .into_iter()
            .map(|key| Emission::new(key, Action::Release, time))
            .collect();
        self.timeline.clear();

        out.extend(self.pairs.iter_mut().filter_map(|pair| pair.release_all(time)));
        out
    }
}
