// Debounced Input Layer - Device Detection
// Capability analysis for keyboard candidates

use std::collections::HashSet;

/// Device capabilities extracted from an evdev device
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    /// Whether the device supports EV_KEY events
    pub has_ev_key: bool,
    /// Supported key codes (EV_KEY capability codes)
    pub supported_keys: HashSet<u16>,
}

impl DeviceCapabilities {
    pub fn new(has_ev_key: bool, supported_keys: impl IntoIterator<Item = u16>) -> Self {
        Self {
            has_ev_key,
            supported_keys: supported_keys.into_iter().collect(),
        }
    }

    pub fn supports_key(&self, key_code: u16) -> bool {
        self.supported_keys.contains(&key_code)
    }
}

// QWERTY row key codes: Q, W, E, R, T, Y
const QWERTY_CODES: &[u16] = &[16, 17, 18, 19, 20, 21];

// Representative A-Z and SPACE codes for keyboard detection
const A_Z_SPACE_CODES: &[u16] = &[57, 30, 44]; // SPACE, A, Z

/// Determine if a device is a keyboard based on its capabilities.
///
/// A device is considered a keyboard if it supports EV_KEY and reports the
/// whole QWERTY row plus A, Z and SPACE. Mice, power buttons and media
/// remotes fail this test.
pub fn is_keyboard(capabilities: &DeviceCapabilities) -> bool {
    if !capabilities.has_ev_key {
        return false;
    }

    QWERTY_CODES
        .iter()
        .chain(A_Z_SPACE_CODES)
        .all(|code| capabilities.supports_key(*code))
}

/// Check if a device is our own virtual keyboard.
///
/// Listing or grabbing it would feed output back into input.
pub fn is_virtual_device(name: &str, virtual_name: &str) -> bool {
    name.contains(virtual_name)
}
