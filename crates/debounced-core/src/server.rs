// Debounced Control Server
// Unix socket listener: decodes requests, never touches engine state

use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::daemon::StatusHandle;
use crate::event::{ControlSender, EventLoopError};
use crate::protocol::{Command, MAX_REQUEST_LEN};

const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind control socket {path}: {source}")]
    Bind { path: PathBuf, source: io::Error },

    #[error("{path} exists and is not a socket")]
    NotASocket { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Control-plane listener.
///
/// START and STOP are forwarded to the engine thread; STATUS is answered
/// from the shared snapshot.
pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
    control: ControlSender,
    status: StatusHandle,
}

impl ControlServer {
    /// Bind `path`, replacing a stale socket, and apply `mode` to it
    pub fn bind(
        path: &Path,
        mode: u32,
        control: ControlSender,
        status: StatusHandle,
    ) -> Result<Self, ServerError> {
        if let Ok(meta) = fs::symlink_metadata(path) {
            if !meta.file_type().is_socket() {
                return Err(ServerError::NotASocket {
                    path: path.to_path_buf(),
                });
            }
            log::debug!("Removing stale socket {}", path.display());
            fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path).map_err(|source| ServerError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        log::info!("Listening on {} (mode {:o})", path.display(), mode);

        Ok(Self {
            listener,
            path: path.to_path_buf(),
            control,
            status,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serve on a background thread.
    ///
    /// The returned guard removes the socket file when dropped.
    pub fn spawn(self) -> io::Result<SocketGuard> {
        let guard = SocketGuard {
            path: self.path.clone(),
        };
        thread::Builder::new()
            .name("debounced-control".to_string())
            .spawn(move || self.serve())?;
        Ok(guard)
    }

    /// Accept connections until the engine thread goes away
    pub fn serve(self) {
        for stream in self.listener.incoming() {
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    log::warn!("Accept failed: {}", e);
                    continue;
                }
            };
            if let Err(e) = stream.set_read_timeout(Some(CLIENT_READ_TIMEOUT)) {
                log::warn!("Failed to set client timeout: {}", e);
            }

            match handle_connection(&mut stream, &self.control, &self.status) {
                Ok(()) => {}
                Err(ConnectionError::EventLoop(EventLoopError::ControlClosed)) => {
                    log::debug!("Engine thread gone, control listener exiting");
                    break;
                }
                Err(e) => log::warn!("Control connection failed: {}", e),
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    EventLoop(#[from] EventLoopError),
}

/// Serve one request on `stream`.
///
/// Malformed requests get no reply; the caller closes the connection.
pub fn handle_connection<S: Read + Write>(
    stream: &mut S,
    control: &ControlSender,
    status: &StatusHandle,
) -> Result<(), ConnectionError> {
    let line = read_request(stream)?;
    let command = match Command::parse(&line) {
        Ok(command) => command,
        Err(e) => {
            log::warn!("{}", e);
            if let Some(code) = e.reply() {
                stream.write_all(&[code])?;
            }
            return Ok(());
        }
    };
    log::debug!("Control request: {}", command);

    match command {
        Command::Status => stream.write_all(&status.get().encode())?,
        Command::Stop => stream.write_all(&[control.stop()?])?,
        Command::Start(request) => stream.write_all(&[control.start(request)?])?,
    }
    Ok(())
}

/// Read up to the first newline, EOF, or `MAX_REQUEST_LEN` bytes
fn read_request<S: Read>(stream: &mut S) -> io::Result<String> {
    let mut buf = Vec::with_capacity(64);
    let mut chunk = [0u8; 128];
    while buf.len() < MAX_REQUEST_LEN && !buf.contains(&b'\n') {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buf.truncate(MAX_REQUEST_LEN);
    let end = buf.iter().position(|&b| b == b'\n').unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// Removes the control socket file on drop
#[derive(Debug)]
pub struct SocketGuard {
    path: PathBuf,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::debug!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}
