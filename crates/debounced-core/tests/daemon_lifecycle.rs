// Daemon lifecycle: START/STOP/STATUS state machine and device loss
//
// Uses the fake backend, so every resource a session owns is counted.

mod common;

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use common::{at, FakeBackend, Handles};
use debounced_core::{
    control_channel, Action, Control, ControlSender, Daemon, Keycode, LoopControl, Mode,
    PairSelection, Reply, Settings, StartRequest, StatusHandle, StatusReport, REPLY_OK,
    REPLY_REJECTED,
};

struct Harness {
    daemon: Daemon<FakeBackend>,
    handles: Handles,
    status: StatusHandle,
    sender: ControlSender,
}

fn harness_with(backend: impl FnOnce(&mut FakeBackend)) -> Harness {
    let handles = Handles::new();
    let mut fake = FakeBackend::new(handles.clone());
    backend(&mut fake);

    let (sender, receiver) = control_channel().unwrap();
    let status = StatusHandle::new();
    let daemon = Daemon::new(fake, &Settings::new(), receiver, status.clone());
    Harness {
        daemon,
        handles,
        status,
        sender,
    }
}

fn harness() -> Harness {
    harness_with(|_| {})
}

fn start_request(timeout_ms: i64, mode: Mode, pairs: PairSelection) -> StartRequest {
    StartRequest {
        device: PathBuf::from("/dev/input/event7"),
        timeout_ms,
        mode,
        pairs,
    }
}

fn send(daemon: &mut Daemon<FakeBackend>, build: impl FnOnce(Reply) -> Control) -> u8 {
    let (reply, rx) = Reply::channel();
    assert_eq!(daemon.handle_control(build(reply)), LoopControl::Continue);
    rx.recv_timeout(Duration::from_secs(1)).unwrap()
}

fn start(daemon: &mut Daemon<FakeBackend>, request: StartRequest) -> u8 {
    send(daemon, |reply| Control::Start { request, reply })
}

fn stop(daemon: &mut Daemon<FakeBackend>) -> u8 {
    send(daemon, |reply| Control::Stop { reply })
}

#[test]
fn test_start_then_stop_twice() {
    let mut h = harness();

    assert_eq!(start(&mut h.daemon, start_request(50, Mode::DebounceOnly, PairSelection::None)), REPLY_OK);
    assert!(h.daemon.is_active());
    assert_eq!(h.handles.sources.get(), 1);
    assert_eq!(h.handles.sinks.get(), 1);

    // Leave a release pending so STOP has a timer to cancel.
    let base = Instant::now();
    h.handles.push(Keycode(38), Action::Press);
    h.daemon.service_device(base);
    h.handles.push(Keycode(38), Action::Release);
    h.daemon.service_device(at(base, 5));
    assert_eq!(h.handles.timers.get(), 1);

    assert_eq!(stop(&mut h.daemon), REPLY_OK);
    assert_eq!(stop(&mut h.daemon), REPLY_REJECTED);
    assert!(!h.daemon.is_active());
    assert_eq!(h.handles.open_handles(), 0);
    assert_eq!(h.daemon.pending_timers(), 0);
}

#[test]
fn test_stop_releases_held_keys() {
    let mut h = harness();
    start(&mut h.daemon, start_request(50, Mode::DebounceOnly, PairSelection::None));

    h.handles.push(Keycode(42), Action::Press);
    h.daemon.service_device(Instant::now());
    assert_eq!(h.handles.take_emitted(), vec![(42, Action::Press)]);

    stop(&mut h.daemon);
    assert_eq!(h.handles.take_emitted(), vec![(42, Action::Release)]);
}

#[test]
fn test_start_while_active_is_ignored() {
    let mut h = harness();
    assert_eq!(start(&mut h.daemon, start_request(30, Mode::DebounceOnly, PairSelection::None)), REPLY_OK);

    let second = StartRequest {
        device: PathBuf::from("/dev/input/event9"),
        ..start_request(80, Mode::Both, PairSelection::Both)
    };
    assert_eq!(start(&mut h.daemon, second), REPLY_REJECTED);

    assert_eq!(h.daemon.device_path(), Some(PathBuf::from("/dev/input/event7").as_path()));
    assert_eq!(h.status.get().encode(), [0x88, 30]);
    assert_eq!(h.handles.sources.get(), 1);
}

#[test]
fn test_flashtap_without_pairs_rejected() {
    let mut h = harness();

    for mode in [Mode::FlashTapOnly, Mode::Both] {
        assert_eq!(start(&mut h.daemon, start_request(50, mode, PairSelection::None)), REPLY_REJECTED);
        assert!(!h.daemon.is_active());
        assert_eq!(h.status.get(), StatusReport::IDLE);
    }
    assert_eq!(h.handles.open_handles(), 0);
}

#[test]
fn test_status_reflects_last_start_until_stop() {
    let mut h = harness();
    assert_eq!(h.status.get().encode(), [0, 0]);

    start(&mut h.daemon, start_request(400, Mode::Both, PairSelection::Arrows));
    // Window clamped to the configured maximum.
    assert_eq!(h.status.get().encode(), [0x80 | 0x08 | 0x04 | 0x01, 250]);
    assert_eq!(h.daemon.status(), h.status.get());

    stop(&mut h.daemon);
    assert_eq!(h.status.get().encode(), [0, 0]);

    start(&mut h.daemon, start_request(-3, Mode::FlashTapOnly, PairSelection::Ad));
    assert_eq!(h.status.get().encode(), [0x80 | 0x04 | 0x02, 0]);
}

#[test]
fn test_grab_conflict_leaves_daemon_idle() {
    let mut h = harness_with(|backend| backend.busy.push(PathBuf::from("/dev/input/event7")));

    assert_eq!(start(&mut h.daemon, start_request(50, Mode::DebounceOnly, PairSelection::None)), REPLY_REJECTED);
    assert!(!h.daemon.is_active());
    assert_eq!(h.handles.open_handles(), 0);
}

#[test]
fn test_sink_failure_releases_grab() {
    let mut h = harness_with(|backend| backend.fail_sink = true);

    assert_eq!(start(&mut h.daemon, start_request(50, Mode::DebounceOnly, PairSelection::None)), REPLY_REJECTED);
    assert!(!h.daemon.is_active());
    assert_eq!(h.handles.sources.get(), 0);
}

#[test]
fn test_device_read_error_tears_down() {
    let mut h = harness();
    start(&mut h.daemon, start_request(50, Mode::Both, PairSelection::Ad));

    let base = Instant::now();
    h.handles.push(Keycode::A, Action::Press);
    h.daemon.service_device(base);
    h.handles.push(Keycode(18), Action::Press);
    h.daemon.service_device(at(base, 1));
    h.handles.push(Keycode(18), Action::Release);
    h.daemon.service_device(at(base, 4));
    h.handles.take_emitted();

    h.handles.fail_read.set(true);
    h.daemon.service_device(at(base, 10));

    let mut released = h.handles.take_emitted();
    released.sort_by_key(|(code, _)| *code);
    assert_eq!(released, vec![(18, Action::Release), (30, Action::Release)]);
    assert!(!h.daemon.is_active());
    assert!(!h.status.get().running);
    assert_eq!(h.handles.open_handles(), 0);
}

#[test]
fn test_failed_liveness_probe_tears_down() {
    let mut h = harness();
    start(&mut h.daemon, start_request(50, Mode::DebounceOnly, PairSelection::None));
    h.handles.push(Keycode(57), Action::Press);
    h.daemon.service_device(Instant::now());
    h.handles.take_emitted();

    h.handles.alive.set(false);
    // Liveness is probed at the top of the cycle; the queued STOP keeps
    // the wait itself from blocking.
    let sender = h.sender.clone();
    let client = thread::spawn(move || sender.stop());
    assert_eq!(h.daemon.step().unwrap(), LoopControl::Continue);

    assert_eq!(h.handles.take_emitted(), vec![(57, Action::Release)]);
    assert_eq!(client.join().unwrap().unwrap(), REPLY_REJECTED);
    assert!(!h.status.get().running);
    assert_eq!(h.handles.open_handles(), 0);
}

#[test]
fn test_timers_flushed_by_service() {
    let mut h = harness();
    start(&mut h.daemon, start_request(50, Mode::DebounceOnly, PairSelection::None));

    let base = Instant::now();
    h.handles.push(Keycode(38), Action::Press);
    h.daemon.service_device(base);
    h.handles.push(Keycode(38), Action::Release);
    h.daemon.service_device(at(base, 10));
    assert_eq!(h.handles.take_emitted(), vec![(38, Action::Press)]);

    h.daemon.service_timers(at(base, 49));
    assert!(h.handles.take_emitted().is_empty());
    h.daemon.service_timers(at(base, 50));
    assert_eq!(h.handles.take_emitted(), vec![(38, Action::Release)]);
    assert_eq!(h.handles.timers.get(), 0);
}

#[test]
fn test_shutdown_tears_down_and_exits() {
    let mut h = harness();
    start(&mut h.daemon, start_request(50, Mode::DebounceOnly, PairSelection::None));

    assert_eq!(h.daemon.handle_control(Control::Shutdown), LoopControl::Exit);
    assert!(!h.daemon.is_active());
    assert_eq!(h.handles.open_handles(), 0);
}

#[test]
fn test_run_returns_on_shutdown_message() {
    let mut h = harness();
    let (done_tx, done_rx) = mpsc::channel();
    let sender = h.sender.clone();

    let client = thread::spawn(move || {
        let code = sender.start(start_request(20, Mode::DebounceOnly, PairSelection::None));
        sender.shutdown().unwrap();
        done_tx.send(code).unwrap();
    });

    h.daemon.run().unwrap();
    client.join().unwrap();
    assert_eq!(done_rx.recv().unwrap().unwrap(), REPLY_OK);
    assert!(!h.daemon.is_active());
    assert_eq!(h.handles.open_handles(), 0);
}
