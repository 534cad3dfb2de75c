// Debounced Control Client
// One connection per request, as used by debouncectl

use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::protocol::{Command, StatusReport};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Cannot reach daemon at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The daemon closed the connection without answering
    #[error("Daemon closed the connection without a reply")]
    NoReply,
}

/// What the daemon answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Code(u8),
    Status(StatusReport),
}

pub struct ControlClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl ControlClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn send(&self, command: &Command) -> Result<Response, ClientError> {
        let mut stream =
            UnixStream::connect(&self.socket_path).map_err(|source| ClientError::Connect {
                path: self.socket_path.clone(),
                source,
            })?;
        stream.set_read_timeout(Some(self.timeout))?;

        stream.write_all(format!("{}\n", command).as_bytes())?;
        stream.shutdown(Shutdown::Write)?;

        let mut reply = Vec::with_capacity(2);
        stream.read_to_end(&mut reply)?;
        log::debug!("{} -> {:?}", command, reply);

        if reply.len() < command.reply_len() {
            return Err(ClientError::NoReply);
        }
        match command {
            Command::Status => Ok(Response::Status(StatusReport::decode([reply[0], reply[1]]))),
            Command::Start(_) | Command::Stop => Ok(Response::Code(reply[0])),
        }
    }
}
