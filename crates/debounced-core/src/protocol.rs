// Debounced Control Protocol
// Whitespace separated text commands in, status bytes out

use std::fmt;
use std::path::PathBuf;

use crate::config::{DaemonConfig, Mode, PairSelection};

/// Command accepted or performed
pub const REPLY_OK: u8 = 0;
/// Command rejected or ignored
pub const REPLY_REJECTED: u8 = 1;

/// Longest request line the listener reads
pub const MAX_REQUEST_LEN: usize = 511;

const STATUS_RUNNING: u8 = 0x80;
const STATUS_DEBOUNCE: u8 = 0x08;
const STATUS_FLASHTAP: u8 = 0x04;
const STATUS_PAIR_AD: u8 = 0x02;
const STATUS_PAIR_ARROWS: u8 = 0x01;

/// Parameters of a START command as sent by the client.
///
/// The timeout is the raw requested value; clamping happens when the
/// daemon builds its [`DaemonConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub device: PathBuf,
    pub timeout_ms: i64,
    pub mode: Mode,
    pub pairs: PairSelection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(StartRequest),
    Stop,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Missing fields or unknown verb: the connection is closed unanswered
    #[error("Malformed command: {0}")]
    Malformed(String),

    /// Fields present but unusable: answered with a rejection
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl ProtocolError {
    /// Status byte owed to the client, if any
    pub fn reply(&self) -> Option<u8> {
        match self {
            ProtocolError::Malformed(_) => None,
            ProtocolError::InvalidValue(_) => Some(REPLY_REJECTED),
        }
    }
}

impl Command {
    /// Parse one request line.
    ///
    /// Verbs and enumerated values are case-insensitive; trailing tokens
    /// are ignored.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut tokens = line.split_whitespace();
        let verb = tokens
            .next()
            .ok_or_else(|| ProtocolError::Malformed("empty request".to_string()))?;

        match verb.to_ascii_uppercase().as_str() {
            "STOP" => Ok(Command::Stop),
            "STATUS" => Ok(Command::Status),
            "START" => {
                let (Some(device), Some(timeout), Some(mode), Some(pairs)) =
                    (tokens.next(), tokens.next(), tokens.next(), tokens.next())
                else {
                    return Err(ProtocolError::Malformed(
                        "START needs <device> <timeout-ms> <mode> <pairs>".to_string(),
                    ));
                };

                let timeout_ms = timeout.parse::<i64>().map_err(|_| {
                    ProtocolError::InvalidValue(format!("timeout '{}' is not an integer", timeout))
                })?;
                let mode = Mode::from_flag(mode)
                    .ok_or_else(|| ProtocolError::InvalidValue(format!("mode '{}'", mode)))?;
                let pairs = pairs
                    .parse::<PairSelection>()
                    .map_err(|e| ProtocolError::InvalidValue(e.to_string()))?;

                Ok(Command::Start(StartRequest {
                    device: PathBuf::from(device),
                    timeout_ms,
                    mode,
                    pairs,
                }))
            }
            other => Err(ProtocolError::Malformed(format!("unknown verb '{}'", other))),
        }
    }

    /// Bytes expected back for this command
    pub fn reply_len(&self) -> usize {
        match self {
            Command::Status => 2,
            Command::Start(_) | Command::Stop => 1,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start(request) => write!(
                f,
                "START {} {} {} {}",
                request.device.display(),
                request.timeout_ms,
                request.mode.flag(),
                request.pairs
            ),
            Command::Stop => f.write_str("STOP"),
            Command::Status => f.write_str("STATUS"),
        }
    }
}

/// Snapshot answered to STATUS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub running: bool,
    pub debounce: bool,
    pub flashtap: bool,
    pub pair_ad: bool,
    pub pair_arrows: bool,
    /// Active debounce window, 0 while idle
    pub timeout_ms: u8,
}

impl StatusReport {
    pub const IDLE: StatusReport = StatusReport {
        running: false,
        debounce: false,
        flashtap: false,
        pair_ad: false,
        pair_arrows: false,
        timeout_ms: 0,
    };

    /// Report for a session running with `config`
    pub fn active(config: &DaemonConfig) -> Self {
        let flashtap = config.mode.flashtap_enabled();
        Self {
            running: true,
            debounce: config.mode.debounce_enabled(),
            flashtap,
            pair_ad: flashtap && config.flashtap_pairs.ad(),
            pair_arrows: flashtap && config.flashtap_pairs.arrows(),
            timeout_ms: config.debounce_window_ms,
        }
    }

    pub fn encode(&self) -> [u8; 2] {
        let mut flags = 0;
        if self.running {
            flags |= STATUS_RUNNING;
        }
        if self.debounce {
            flags |= STATUS_DEBOUNCE;
        }
        if self.flashtap {
            flags |= STATUS_FLASHTAP;
        }
        if self.pair_ad {
            flags |= STATUS_PAIR_AD;
        }
        if self.pair_arrows {
            flags |= STATUS_PAIR_ARROWS;
        }
        [flags, self.timeout_ms]
    }

    pub fn decode(bytes: [u8; 2]) -> Self {
        let [flags, timeout_ms] = bytes;
        Self {
            running: flags & STATUS_RUNNING != 0,
            debounce: flags & STATUS_DEBOUNCE != 0,
            flashtap: flags & STATUS_FLASHTAP != 0,
            pair_ad: flags & STATUS_PAIR_AD != 0,
            pair_arrows: flags & STATUS_PAIR_ARROWS != 0,
            timeout_ms,
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Debounce daemon status")?;
        writeln!(f, "================================")?;
        write!(f, "Running: {}", if self.running { 'Y' } else { 'N' })?;
        if !self.running {
            return Ok(());
        }

        let mode = match (self.debounce, self.flashtap) {
            (true, true) => "Debounce & FlashTap",
            (true, false) => "Debounce",
            (false, true) => "FlashTap",
            (false, false) => "",
        };
        write!(f, "\nMode: {}", mode)?;

        if self.flashtap {
            let pairs = match (self.pair_ad, self.pair_arrows) {
                (true, true) => "s: A/D & Arrows",
                (true, false) => ": A/D",
                (false, true) => ": Arrows",
                (false, false) => ": ",
            };
            write!(f, "\nFlashTap Pair{}", pairs)?;
        }
        if self.debounce {
            write!(f, "\nTimeout: {}ms", self.timeout_ms)?;
        }
        Ok(())
    }
}
