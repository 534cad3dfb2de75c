// Debounced Input Layer
// Physical keyboard access and detection

mod device;
mod keyboard;
mod source;

pub use device::{is_keyboard, is_virtual_device, DeviceCapabilities};
pub use keyboard::{list_keyboards, EvdevSource, KeyboardInfo};
pub use source::{DeviceError, KeySource, RawKeyEvent};
