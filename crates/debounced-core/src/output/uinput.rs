// Debounced uinput Output Layer
// Virtual device creation and key event emission

use std::time::{SystemTime, UNIX_EPOCH};

use evdev::uinput::VirtualDeviceBuilder;
use evdev::{AttributeSet, BusType, EventType, InputEvent, InputId};

use super::sink::{Emission, KeySink, SinkError};
use super::state::PressedKeyState;
use crate::action::Action;
use crate::key::Keycode;

/// Identity advertised by the virtual keyboard
const VIRTUAL_VENDOR: u16 = 0x1234;
const VIRTUAL_PRODUCT: u16 = 0x5678;
const VIRTUAL_VERSION: u16 = 1;

/// Virtual uinput keyboard for cleaned output.
///
/// The kernel destroys the device when this value is dropped.
pub struct UinputSink {
    device: evdev::uinput::VirtualDevice,
    pressed: PressedKeyState,
}

impl UinputSink {
    /// Create the virtual keyboard.
    ///
    /// Advertises every addressable keycode plus `extra_keys`, the keys the
    /// physical device reports beyond that range, so passthrough of high
    /// keycodes still reaches consumers.
    pub fn new(name: &str, extra_keys: &[u16]) -> Result<Self, SinkError> {
        let mut keys = AttributeSet::new();
        for code in 0..Keycode::ADDRESSABLE as u16 {
            keys.insert(evdev::Key::new(code));
        }
        for &code in extra_keys {
            keys.insert(evdev::Key::new(code));
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(|e: std::io::Error| SinkError::DeviceCreation(e.to_string()))?
            .name(name)
            .input_id(InputId::new(
                BusType::BUS_USB,
                VIRTUAL_VENDOR,
                VIRTUAL_PRODUCT,
                VIRTUAL_VERSION,
            ))
            .with_keys(&keys)
            .map_err(|e: std::io::Error| SinkError::DeviceCreation(e.to_string()))?
            .build()
            .map_err(|e: std::io::Error| SinkError::DeviceCreation(e.to_string()))?;

        log::info!("Created virtual keyboard '{}'", name);
        Ok(Self {
            device,
            pressed: PressedKeyState::new(),
        })
    }

    fn key_event(emission: &Emission) -> InputEvent {
        let since_epoch = emission
            .time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let raw = libc::input_event {
            time: libc::timeval {
                tv_sec: since_epoch.as_secs() as libc::time_t,
                tv_usec: since_epoch.subsec_micros() as libc::suseconds_t,
            },
            type_: EventType::KEY.0,
            code: emission.key.code(),
            value: emission.action.to_i32(),
        };
        InputEvent::from(raw)
    }

    /// Number of keys currently held on the virtual device
    pub fn pressed_key_count(&self) -> usize {
        self.pressed.len()
    }
}

impl KeySink for UinputSink {
    fn emit(&mut self, emission: &Emission) -> Result<(), SinkError> {
        let key_event = Self::key_event(emission);
        // SYN event is required for the kernel to process the key event
        let syn_event = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);

        self.device
            .emit(&[key_event, syn_event])
            .map_err(|e: std::io::Error| SinkError::WriteError(e.to_string()))?;

        self.pressed.apply(emission.key, emission.action);
        Ok(())
    }

    fn release_all(&mut self) -> Result<(), SinkError> {
        let now = SystemTime::now();
        for key in self.pressed.drain() {
            log::debug!("Releasing {} held on virtual device", key);
            self.emit(&Emission::new(key, Action::Release, now))?;
        }
        Ok(())
    }
}

impl Drop for UinputSink {
    fn drop(&mut self) {
        if let Err(e) = self.release_all() {
            log::warn!("Failed to release held keys on virtual device: {}", e);
        }
    }
}
