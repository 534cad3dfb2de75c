// Debounced Keycode Type
// A single key code from Linux input-event-codes.h

use std::fmt;

/// Represents a single keyboard key code.
///
/// The numeric values match Linux input-event-codes.h definitions.
/// Only codes below [`Keycode::ADDRESSABLE`] are tracked by the engines;
/// anything above is forwarded untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Keycode(pub u16);

impl Keycode {
    /// Number of keycodes with a per-key record
    pub const ADDRESSABLE: usize = 256;

    pub const A: Keycode = Keycode(30);
    pub const D: Keycode = Keycode(32);
    pub const LEFT: Keycode = Keycode(105);
    pub const RIGHT: Keycode = Keycode(106);

    /// Get the raw numeric code value
    pub fn code(self) -> u16 {
        self.0
    }

    /// Index into a per-key arena, if the code is addressable
    pub fn index(self) -> Option<usize> {
        let idx = self.0 as usize;
        (idx < Self::ADDRESSABLE).then_some(idx)
    }

    pub fn is_addressable(self) -> bool {
        self.index().is_some()
    }

    /// Volume and media keys skip both engines.
    ///
    /// Knobs and media buttons on gaming boards report rapid legitimate
    /// transitions that look exactly like chatter.
    pub fn is_bypass(self) -> bool {
        BYPASS_CODES.contains(&self.0)
    }

    /// Get the name of this key
    pub fn name(self) -> &'static str {
        key_name(self.0)
    }
}

/// MUTE, VOLUMEDOWN, VOLUMEUP, NEXTSONG, PLAYPAUSE, STOPCD, PREVIOUSSONG
const BYPASS_CODES: &[u16] = &[113, 114, 115, 163, 164, 165, 166];

impl From<u16> for Keycode {
    fn from(code: u16) -> Self {
        Keycode(code)
    }
}

impl From<Keycode> for u16 {
    fn from(key: Keycode) -> Self {
        key.0
    }
}

impl fmt::Display for Keycode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match key_name(self.0) {
            "UNKNOWN" => write!(f, "KEY_{}", self.0),
            name => f.write_str(name),
        }
    }
}

/// Display name for a key code, used in log lines only
pub fn key_name(code: u16) -> &'static str {
    match code {
        1 => "ESC",
        2 => "1",
        3 => "2",
        4 => "3",
        5 => "4",
        6 => "5",
        7 => "6",
        8 => "7",
        9 => "8",
        10 => "9",
        11 => "0",
        12 => "MINUS",
        13 => "EQUAL",
        14 => "BACKSPACE",
        15 => "TAB",
        16 => "Q",
        17 => "W",
        18 => "E",
        19 => "R",
        20 => "T",
        21 => "Y",
        22 => "U",
        23 => "I",
        24 => "O",
        25 => "P",
        26 => "LEFT_BRACE",
        27 => "RIGHT_BRACE",
        28 => "ENTER",
        29 => "LEFT_CTRL",
        30 => "A",
        31 => "S",
        32 => "D",
        33 => "F",
        34 => "G",
        35 => "H",
        36 => "J",
        37 => "K",
        38 => "L",
        39 => "SEMICOLON",
        40 => "APOSTROPHE",
        41 => "GRAVE",
        42 => "LEFT_SHIFT",
        43 => "BACKSLASH",
        44 => "Z",
        45 => "X",
        46 => "C",
        47 => "V",
        48 => "B",
        49 => "N",
        50 => "M",
        51 => "COMMA",
        52 => "DOT",
        53 => "SLASH",
        54 => "RIGHT_SHIFT",
        55 => "KPASTERISK",
        56 => "LEFT_ALT",
        57 => "SPACE",
        58 => "CAPSLOCK",
        59 => "F1",
        60 => "F2",
        61 => "F3",
        62 => "F4",
        63 => "F5",
        64 => "F6",
        65 => "F7",
        66 => "F8",
        67 => "F9",
        68 => "F10",
        69 => "NUMLOCK",
        70 => "SCROLLLOCK",
        87 => "F11",
        88 => "F12",
        96 => "KPENTER",
        97 => "RIGHT_CTRL",
        99 => "SYSRQ",
        100 => "RIGHT_ALT",
        102 => "HOME",
        103 => "UP",
        104 => "PAGE_UP",
        105 => "LEFT",
        106 => "RIGHT",
        107 => "END",
        108 => "DOWN",
        109 => "PAGE_DOWN",
        110 => "INSERT",
        111 => "DELETE",
        113 => "MUTE",
        114 => "VOLUME_DOWN",
        115 => "VOLUME_UP",
        119 => "PAUSE",
        125 => "LEFT_META",
        126 => "RIGHT_META",
        127 => "COMPOSE",
        163 => "NEXT_SONG",
        164 => "PLAY_PAUSE",
        165 => "STOP_CD",
        166 => "PREVIOUS_SONG",
        _ => "UNKNOWN",
    }
}
