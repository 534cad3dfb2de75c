use std::fmt;
use std::str::FromStr;

use crate::key::Keycode;

/// Which engines are live for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    DebounceOnly,
    FlashTapOnly,
    Both,
}

impl Mode {
    /// Parse the single-letter protocol flag (`d`, `f`, `b`)
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag.to_ascii_lowercase().as_str() {
            "d" => Some(Mode::DebounceOnly),
            "f" => Some(Mode::FlashTapOnly),
            "b" => Some(Mode::Both),
            _ => None,
        }
    }

    pub fn flag(self) -> char {
        match self {
            Mode::DebounceOnly => 'd',
            Mode::FlashTapOnly => 'f',
            Mode::Both => 'b',
        }
    }

    pub fn debounce_enabled(self) -> bool {
        matches!(self, Mode::DebounceOnly | Mode::Both)
    }

    pub fn flashtap_enabled(self) -> bool {
        matches!(self, Mode::FlashTapOnly | Mode::Both)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::DebounceOnly => write!(f, "Debounce"),
            Mode::FlashTapOnly => write!(f, "FlashTap"),
            Mode::Both => write!(f, "Debounce & FlashTap"),
        }
    }
}

/// Opposing key pairs governed by FlashTap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairSelection {
    #[default]
    None,
    Ad,
    Arrows,
    Both,
}

impl PairSelection {
    pub fn ad(self) -> bool {
        matches!(self, PairSelection::Ad | PairSelection::Both)
    }

    pub fn arrows(self) -> bool {
        matches!(self, PairSelection::Arrows | PairSelection::Both)
    }

    /// Keycodes of every selected pair
    pub fn pairs(self) -> Vec<(Keycode, Keycode)> {
        let mut pairs = Vec::with_capacity(2);
        if self.ad() {
            pairs.push((Keycode::A, Keycode::D));
        }
        if self.arrows() {
            pairs.push((Keycode::LEFT, Keycode::RIGHT));
        }
        pairs
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PairSelection::None => "none",
            PairSelection::Ad => "ad",
            PairSelection::Arrows => "arrows",
            PairSelection::Both => "both",
        }
    }
}

impl FromStr for PairSelection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(PairSelection::None),
            "ad" => Ok(PairSelection::Ad),
            "arrows" => Ok(PairSelection::Arrows),
            "both" => Ok(PairSelection::Both),
            other => Err(ConfigError::UnknownPairs(other.to_string())),
        }
    }
}

impl fmt::Display for PairSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors rejected synchronously at START
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown mode flag: {0}")]
    UnknownMode(String),

    #[error("Unknown FlashTap pair selection: {0}")]
    UnknownPairs(String),

    #[error("Mode '{0}' requires a FlashTap pair selection other than 'none'")]
    MissingPairs(char),
}

/// Clamp a requested debounce window into `0..=max_ms`
pub fn clamp_timeout(requested_ms: i64, max_ms: u8) -> u8 {
    requested_ms.clamp(0, i64::from(max_ms)) as u8
}

/// Validated engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonConfig {
    pub debounce_window_ms: u8,
    pub mode: Mode,
    pub flashtap_pairs: PairSelection,
}

impl DaemonConfig {
    /// Validate a START request.
    ///
    /// The window is clamped, never rejected. FlashTap modes need at least
    /// one pair; in debounce-only mode the pair selection is ignored.
    pub fn new(
        requested_ms: i64,
        max_ms: u8,
        mode: Mode,
        pairs: PairSelection,
    ) -> Result<Self, ConfigError> {
        if mode.flashtap_enabled() && pairs == PairSelection::None {
            return Err(ConfigError::MissingPairs(mode.flag()));
        }

        let flashtap_pairs = if mode.flashtap_enabled() {
            pairs
        } else {
            if pairs != PairSelection::None {
                log::debug!("Ignoring pair selection '{}' in debounce-only mode", pairs);
            }
            PairSelection::None
        };

        let debounce_window_ms = clamp_timeout(requested_ms, max_ms);
        if i64::from(debounce_window_ms) != requested_ms {
            log::info!(
                "Debounce window {}ms clamped to {}ms",
                requested_ms,
                debounce_window_ms
            );
        }

        Ok(Self {
            debounce_window_ms,
            mode,
            flashtap_pairs,
        })
    }
}
