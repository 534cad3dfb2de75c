// Debounced Daemon
// Idle/Active lifecycle and the engine-owning multiplexer loop
//
// Everything a session owns (device grab, virtual sink, key records and
// their timers) lives in `RunState::Active` and is touched by this
// thread only. Other threads reach it through the control queue.

mod backend;
mod status;

pub use backend::{Backend, EvdevBackend};
pub use status::StatusHandle;

use smallvec::SmallVec;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use crate::config::DaemonConfig;
use crate::event::{Control, ControlReceiver, EventLoopError, Multiplexer};
use crate::input::KeySource;
use crate::output::{Emission, KeySink};
use crate::protocol::{StartRequest, StatusReport, REPLY_OK, REPLY_REJECTED};
use crate::settings::Settings;
use crate::timer::ExpiryTimer;
use crate::transform::Engine;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("Event loop error: {0}")]
    EventLoop(#[from] EventLoopError),
}

/// Whether the loop keeps going after a wake cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

struct Session<B: Backend> {
    path: PathBuf,
    source: B::Source,
    sink: B::Sink,
    engine: Engine<B::Timers>,
}

enum RunState<B: Backend> {
    Idle,
    Active(Session<B>),
}

pub struct Daemon<B: Backend> {
    backend: B,
    max_debounce_ms: u8,
    virtual_device_name: String,
    state: RunState<B>,
    /// Bumped on every accepted START
    session_serial: u64,
    status: StatusHandle,
    control: ControlReceiver,
    multiplexer: Multiplexer,
}

impl<B: Backend> Daemon<B> {
    pub fn new(
        backend: B,
        settings: &Settings,
        control: ControlReceiver,
        status: StatusHandle,
    ) -> Self {
        status.set(StatusReport::IDLE);
        Self {
            backend,
            max_debounce_ms: settings.max_debounce_ms(),
            virtual_device_name: settings.virtual_device_name().to_string(),
            state: RunState::Idle,
            session_serial: 0,
            status,
            control,
            multiplexer: Multiplexer::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, RunState::Active(_))
    }

    /// Device bound to the current session
    pub fn device_path(&self) -> Option<&Path> {
        match &self.state {
            RunState::Active(session) => Some(&session.path),
            RunState::Idle => None,
        }
    }

    /// Outstanding release timers of the current session
    pub fn pending_timers(&self) -> usize {
        match &self.state {
            RunState::Active(session) => session.engine.pending_timers(),
            RunState::Idle => 0,
        }
    }

    pub fn status(&self) -> StatusReport {
        self.status.get()
    }

    /// Run until a shutdown message arrives.
    ///
    /// Any live session is torn down before returning, error or not.
    pub fn run(&mut self) -> Result<(), DaemonError> {
        log::info!("Debounced daemon ready");
        let result = loop {
            match self.step() {
                Ok(LoopControl::Continue) => {}
                Ok(LoopControl::Exit) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.teardown("Shutdown");
        result
    }

    /// One wake cycle: wait, then service control, timers and the device
    /// in that order.
    pub fn step(&mut self) -> Result<LoopControl, DaemonError> {
        if let RunState::Active(session) = &self.state {
            if !session.source.is_alive() {
                self.device_lost("liveness probe failed");
            }
        }

        let (device_fd, timer_fds, timeout) = match &self.state {
            RunState::Idle => (None, SmallVec::<[RawFd; 8]>::new(), None),
            RunState::Active(session) => {
                let now = Instant::now();
                (
                    session.source.poll_fd(),
                    session
                        .engine
                        .timers()
                        .filter_map(|timer| timer.poll_fd())
                        .collect(),
                    session
                        .engine
                        .next_deadline()
                        .map(|deadline| deadline.saturating_duration_since(now)),
                )
            }
        };
        let serial = self.session_serial;

        let readiness =
            self.multiplexer
                .wait(self.control.poll_fd(), device_fd, timer_fds, timeout)?;

        if readiness.control {
            for message in self.control.drain() {
                if self.handle_control(message) == LoopControl::Exit {
                    return Ok(LoopControl::Exit);
                }
            }
        }

        self.service_timers(Instant::now());

        // Device readiness belongs to the session that was polled.
        if serial == self.session_serial && self.is_active() {
            if readiness.device_hangup {
                self.device_lost("device hung up");
            } else if readiness.device {
                self.service_device(Instant::now());
            }
        }

        Ok(LoopControl::Continue)
    }

    /// Apply one control message on the engine thread
    pub fn handle_control(&mut self, message: Control) -> LoopControl {
        match message {
            Control::Start { request, reply } => {
                reply.send(self.start(request));
                LoopControl::Continue
            }
            Control::Stop { reply } => {
                reply.send(self.stop());
                LoopControl::Continue
            }
            Control::Shutdown => {
                log::info!("Shutdown requested");
                self.teardown("Shutdown");
                LoopControl::Exit
            }
        }
    }

    fn start(&mut self, request: StartRequest) -> u8 {
        if let RunState::Active(session) = &self.state {
            log::warn!(
                "START received but daemon already running on {}, ignoring",
                session.path.display()
            );
            return REPLY_REJECTED;
        }

        let config = match DaemonConfig::new(
            request.timeout_ms,
            self.max_debounce_ms,
            request.mode,
            request.pairs,
        ) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("START rejected: {}", e);
                return REPLY_REJECTED;
            }
        };

        let source = match self.backend.open_source(&request.device) {
            Ok(source) => source,
            Err(e) => {
                log::error!("START failed: {}", e);
                return REPLY_REJECTED;
            }
        };

        // On failure the source drops here and releases its grab.
        let sink = match self
            .backend
            .create_sink(&self.virtual_device_name, &source.extra_keys())
        {
            Ok(sink) => sink,
            Err(e) => {
                log::error!("START failed: {}", e);
                return REPLY_REJECTED;
            }
        };

        let engine = Engine::new(config, self.backend.timers());
        log::info!(
            "START {} mode={} debounce={}ms pairs={}",
            request.device.display(),
            config.mode.flag(),
            config.debounce_window_ms,
            config.flashtap_pairs
        );

        self.status.set(StatusReport::active(&config));
        self.session_serial += 1;
        self.state = RunState::Active(Session {
            path: request.device,
            source,
            sink,
            engine,
        });
        REPLY_OK
    }

    fn stop(&mut self) -> u8 {
        if self.teardown("STOP") {
            REPLY_OK
        } else {
            log::warn!("STOP received but daemon not running, ignoring");
            REPLY_REJECTED
        }
    }

    /// Flush delayed releases due at `now`
    pub fn service_timers(&mut self, now: Instant) {
        if let RunState::Active(session) = &mut self.state {
            let emissions = session.engine.flush_expired(now);
            emit_all(&mut session.sink, &emissions);
        }
    }

    /// Read and route whatever the device has pending
    pub fn service_device(&mut self, now: Instant) {
        let RunState::Active(session) = &mut self.state else {
            return;
        };

        match session.source.read_events() {
            Ok(events) => {
                for event in events {
                    let Some(action) = event.action() else {
                        log::debug!("Ignoring {} with value {}", event.key, event.value);
                        continue;
                    };
                    let emissions = session.engine.process(event.key, action, now, event.time);
                    emit_all(&mut session.sink, &emissions);
                }
            }
            Err(e) => {
                let reason = e.to_string();
                self.device_lost(&reason);
            }
        }
    }

    fn device_lost(&mut self, reason: &str) {
        log::warn!(
            "Keyboard device disappeared ({}). Stopping and resetting state.",
            reason
        );
        self.teardown("Device loss");
    }

    /// Release held keys, drop every session resource and go Idle.
    ///
    /// Returns false if there was no session.
    fn teardown(&mut self, reason: &str) -> bool {
        let RunState::Active(mut session) = std::mem::replace(&mut self.state, RunState::Idle)
        else {
            return false;
        };

        let emissions = session.engine.release_all(SystemTime::now());
        emit_all(&mut session.sink, &emissions);
        if let Err(e) = session.sink.release_all() {
            log::warn!("Failed to release held keys: {}", e);
        }

        log::info!(
            "{}: released {} and destroyed virtual keyboard",
            reason,
            session.path.display()
        );
        drop(session);
        self.status.set(StatusReport::IDLE);
        true
    }
}

fn emit_all<K: KeySink>(sink: &mut K, emissions: &[Emission]) {
    for emission in emissions {
        if let Err(e) = sink.emit(emission) {
            log::error!(
                "Failed to emit {} {}: {}",
                emission.key,
                emission.action,
                e
            );
        }
    }
}
