// Debounced Control Queue
// Hands START/STOP from the listener thread to the engine-owning thread

use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::mpsc;
use std::sync::Arc;

use super::r#loop::{EventLoopError, EventLoopResult};
use crate::protocol::StartRequest;

/// One-shot reply slot carried by a control message
#[derive(Debug)]
pub struct Reply(mpsc::Sender<u8>);

impl Reply {
    /// Reply slot plus the receiving end the requester waits on
    pub fn channel() -> (Self, mpsc::Receiver<u8>) {
        let (tx, rx) = mpsc::channel();
        (Self(tx), rx)
    }

    pub fn send(self, code: u8) {
        if self.0.send(code).is_err() {
            log::debug!("Requester went away before reply {}", code);
        }
    }
}

/// Messages consumed by the engine-owning thread
#[derive(Debug)]
pub enum Control {
    Start { request: StartRequest, reply: Reply },
    Stop { reply: Reply },
    /// Process termination: tear down like STOP, then leave the loop
    Shutdown,
}

/// Create a connected sender/receiver pair
pub fn control_channel() -> io::Result<(ControlSender, ControlReceiver)> {
    let (wake_tx, wake_rx) = UnixStream::pair()?;
    wake_tx.set_nonblocking(true)?;
    wake_rx.set_nonblocking(true)?;
    let (tx, rx) = mpsc::channel();

    Ok((
        ControlSender {
            tx,
            wake: Arc::new(wake_tx),
        },
        ControlReceiver { rx, wake: wake_rx },
    ))
}

/// Cloneable producer side, used by the socket listener and signal thread
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::Sender<Control>,
    wake: Arc<UnixStream>,
}

impl ControlSender {
    pub fn send(&self, message: Control) -> EventLoopResult<()> {
        self.tx
            .send(message)
            .map_err(|_| EventLoopError::ControlClosed)?;

        match (&*self.wake).write(&[1]) {
            Ok(_) => Ok(()),
            // Buffer full: the receiver already has a pending wake-up.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(EventLoopError::Io(e)),
        }
    }

    /// Queue a START and block until the engine thread answers
    pub fn start(&self, request: StartRequest) -> EventLoopResult<u8> {
        let (reply, rx) = Reply::channel();
        self.send(Control::Start { request, reply })?;
        rx.recv().map_err(|_| EventLoopError::ControlClosed)
    }

    /// Queue a STOP and block until the engine thread answers
    pub fn stop(&self) -> EventLoopResult<u8> {
        let (reply, rx) = Reply::channel();
        self.send(Control::Stop { reply })?;
        rx.recv().map_err(|_| EventLoopError::ControlClosed)
    }

    pub fn shutdown(&self) -> EventLoopResult<()> {
        self.send(Control::Shutdown)
    }
}

/// Consumer side, owned by the multiplexer thread
#[derive(Debug)]
pub struct ControlReceiver {
    rx: mpsc::Receiver<Control>,
    wake: UnixStream,
}

impl ControlReceiver {
    /// Readable whenever messages may be queued
    pub fn poll_fd(&self) -> RawFd {
        self.wake.as_raw_fd()
    }

    /// Take every queued message in arrival order
    pub fn drain(&mut self) -> Vec<Control> {
        let mut buf = [0u8; 64];
        loop {
            match self.wake.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, PairSelection};
    use std::path::PathBuf;
    use std::thread;

    fn request() -> StartRequest {
        StartRequest {
            device: PathBuf::from("/dev/input/event3"),
            timeout_ms: 50,
            mode: Mode::DebounceOnly,
            pairs: PairSelection::None,
        }
    }

    #[test]
    fn test_drain_preserves_order() {
        let (sender, mut receiver) = control_channel().unwrap();
        let (reply, _rx) = Reply::channel();
        sender.send(Control::Stop { reply }).unwrap();
        sender.shutdown().unwrap();

        let messages = receiver.drain();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], Control::Stop { .. }));
        assert!(matches!(messages[1], Control::Shutdown));
        assert!(receiver.drain().is_empty());
    }

    #[test]
    fn test_start_waits_for_reply() {
        let (sender, mut receiver) = control_channel().unwrap();
        let client = thread::spawn(move || sender.start(request()));

        let message = loop {
            if let Some(message) = receiver.drain().pop() {
                break message;
            }
            thread::yield_now();
        };
        match message {
            Control::Start { request: got, reply } => {
                assert_eq!(got, request());
                reply.send(0);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
        assert_eq!(client.join().unwrap().unwrap(), 0);
    }

    #[test]
    fn test_closed_receiver() {
        let (sender, receiver) = control_channel().unwrap();
        drop(receiver);
        assert!(matches!(sender.stop(), Err(EventLoopError::ControlClosed)));
    }
}
