// Debounced Physical Keyboard
// Exclusive grab, non-blocking reads and liveness probing of a keyboard node

use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use evdev::{Device, EventType};

use super::device::{is_keyboard, is_virtual_device, DeviceCapabilities};
use super::source::{DeviceError, KeySource, RawKeyEvent};
use crate::key::Keycode;

/// `_IOR('E', 0x01, int)`
const EVIOCGVERSION: libc::c_ulong = 0x8004_4501;

/// A grabbed physical keyboard.
///
/// The grab is released when this value is dropped, even during panic
/// unwinding, so the keyboard never stays captured by a dead session.
pub struct EvdevSource {
    device: Device,
    path: PathBuf,
    grabbed: bool,
}

impl EvdevSource {
    /// Open `path` and take an exclusive grab.
    ///
    /// Fails if another process already holds the grab.
    pub fn open(path: &Path) -> Result<Self, DeviceError> {
        let mut device = Device::open(path).map_err(|source| DeviceError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        set_nonblocking(device.as_raw_fd()).map_err(|source| DeviceError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        device.grab().map_err(|source| DeviceError::Grab {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!(
            "Grabbed {} ({})",
            path.display(),
            device.name().unwrap_or("Unknown")
        );

        Ok(Self {
            device,
            path: path.to_path_buf(),
            grabbed: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the exclusive grab
    pub fn ungrab(&mut self) {
        if self.grabbed {
            if let Err(e) = self.device.ungrab() {
                // Expected when the node is already gone.
                log::debug!("Ungrab of {} failed: {}", self.path.display(), e);
            }
            self.grabbed = false;
        }
    }
}

impl KeySource for EvdevSource {
    fn poll_fd(&self) -> Option<RawFd> {
        Some(self.device.as_raw_fd())
    }

    fn read_events(&mut self) -> Result<Vec<RawKeyEvent>, DeviceError> {
        match self.device.fetch_events() {
            Ok(events) => Ok(events
                .filter(|event| event.event_type() == EventType::KEY)
                .map(|event| RawKeyEvent {
                    key: Keycode(event.code()),
                    value: event.value(),
                    time: event.timestamp(),
                })
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(e) => Err(DeviceError::Lost(format!("{}: {}", self.path.display(), e))),
        }
    }

    fn is_alive(&self) -> bool {
        let mut version: libc::c_int = 0;
        let rc = unsafe {
            libc::ioctl(
                self.device.as_raw_fd(),
                EVIOCGVERSION as _,
                &mut version as *mut libc::c_int,
            )
        };
        rc >= 0
    }

    fn extra_keys(&self) -> Vec<u16> {
        self.device
            .supported_keys()
            .map(|keys| {
                keys.iter()
                    .map(|key| key.code())
                    .filter(|code| !Keycode(*code).is_addressable())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Drop for EvdevSource {
    fn drop(&mut self) {
        self.ungrab();
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Keyboard candidate for the device listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardInfo {
    pub path: PathBuf,
    pub name: String,
    pub bus: u16,
    pub vendor: u16,
    pub product: u16,
    /// Serial / unique identifier, when the driver reports one
    pub unique: Option<String>,
}

/// List keyboards under /dev/input, ordered by event node number.
///
/// `virtual_name` filters out our own virtual keyboard.
pub fn list_keyboards(virtual_name: &str) -> Vec<KeyboardInfo> {
    let mut keyboards: Vec<KeyboardInfo> = evdev::enumerate()
        .filter(|(_, device)| {
            let has_ev_key = device.supported_events().contains(EventType::KEY);
            let keys = device
                .supported_keys()
                .map(|keys| keys.iter().map(|key| key.code()).collect::<Vec<_>>())
                .unwrap_or_default();
            let name = device.name().unwrap_or("");
            is_keyboard(&DeviceCapabilities::new(has_ev_key, keys))
                && !is_virtual_device(name, virtual_name)
        })
        .map(|(path, device)| {
            let id = device.input_id();
            KeyboardInfo {
                path,
                name: device.name().unwrap_or("Unknown").to_string(),
                bus: id.bus_type().0,
                vendor: id.vendor(),
                product: id.product(),
                unique: device.unique_name().map(str::to_string),
            }
        })
        .collect();

    keyboards.sort_by_key(|info| event_number(&info.path));
    keyboards
}

fn event_number(path: &Path) -> u32 {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix("event"))
        .and_then(|num| num.parse().ok())
        .unwrap_or(u32::MAX)
}
