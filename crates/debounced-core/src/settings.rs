// Debounced Settings Module
// Daemon-level settings: where to listen and what to create

use std::path::{Path, PathBuf};

/// System-wide settings file
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/debounced/settings.toml";
pub const DEFAULT_SOCKET_PATH: &str = "/run/debounced.sock";
pub const DEFAULT_VIRTUAL_DEVICE_NAME: &str = "debounced-virtual-keyboard";
pub const DEFAULT_MAX_DEBOUNCE_MS: u8 = 250;
pub const DEFAULT_SOCKET_MODE: u32 = 0o666;

/// Settings for the debounced daemon.
///
/// Engine tuning (window, mode, pairs) is not here: it arrives with each
/// START and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    socket_path: PathBuf,
    socket_mode: u32,
    max_debounce_ms: u8,
    virtual_device_name: String,
    /// Path to the settings file (for reload)
    source_path: Option<PathBuf>,
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid setting value: {0}")]
    InvalidValue(String),
}

/// TOML representation for deserializing settings
#[derive(Debug, Clone, serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SettingsToml {
    #[serde(default)]
    control: Option<ControlSettings>,

    #[serde(default)]
    engine: Option<EngineSettings>,

    #[serde(default)]
    output: Option<OutputSettings>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ControlSettings {
    #[serde(default)]
    socket_path: Option<PathBuf>,
    #[serde(default)]
    socket_mode: Option<toml::Value>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EngineSettings {
    #[serde(default)]
    max_debounce_ms: Option<i64>,
}

#[derive(Debug, Clone, serde::Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputSettings {
    #[serde(default)]
    virtual_device_name: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    pub fn new() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            socket_mode: DEFAULT_SOCKET_MODE,
            max_debounce_ms: DEFAULT_MAX_DEBOUNCE_MS,
            virtual_device_name: DEFAULT_VIRTUAL_DEVICE_NAME.to_string(),
            source_path: None,
        }
    }

    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(&path)?;
        let mut settings = Self::from_toml(&content)?;
        settings.source_path = Some(path.as_ref().to_path_buf());
        Ok(settings)
    }

    /// Load settings from TOML string
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let toml_settings: SettingsToml =
            toml::from_str(content).map_err(|e| SettingsError::TomlParse(e.to_string()))?;

        let mut settings = Self::new();

        if let Some(control) = toml_settings.control {
            if let Some(path) = control.socket_path {
                if path.as_os_str().is_empty() {
                    return Err(SettingsError::InvalidValue(
                        "socket_path must not be empty".to_string(),
                    ));
                }
                settings.socket_path = path;
            }
            if let Some(mode) = control.socket_mode {
                settings.socket_mode = parse_mode_value(&mode)?;
            }
        }

        if let Some(engine) = toml_settings.engine {
            if let Some(max) = engine.max_debounce_ms {
                settings.max_debounce_ms = u8::try_from(max).map_err(|_| {
                    SettingsError::InvalidValue(format!(
                        "max_debounce_ms {} is outside 0..=255",
                        max
                    ))
                })?;
            }
        }

        if let Some(output) = toml_settings.output {
            if let Some(name) = output.virtual_device_name {
                if name.trim().is_empty() {
                    return Err(SettingsError::InvalidValue(
                        "virtual_device_name must not be empty".to_string(),
                    ));
                }
                settings.virtual_device_name = name;
            }
        }

        Ok(settings)
    }

    /// Load an explicit file, or the system file if present, or defaults
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::load_default(),
        }
    }

    /// Load from the default location (/etc/debounced/settings.toml)
    pub fn load_default() -> Result<Self, SettingsError> {
        let path = Path::new(DEFAULT_SETTINGS_PATH);
        if path.exists() {
            return Self::from_file(path);
        }
        // Return default settings if file doesn't exist
        Ok(Self::new())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn socket_mode(&self) -> u32 {
        self.socket_mode
    }

    /// Upper bound for the debounce window requested by START
    pub fn max_debounce_ms(&self) -> u8 {
        self.max_debounce_ms
    }

    pub fn virtual_device_name(&self) -> &str {
        &self.virtual_device_name
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }
}

/// Parse a permission mode: an integer (`0o666`) or an octal string ("0666")
fn parse_mode_value(value: &toml::Value) -> Result<u32, SettingsError> {
    let mode = match value {
        toml::Value::Integer(i) => u32::try_from(*i).ok(),
        toml::Value::String(s) => {
            let digits = s.trim_start_matches("0o");
            u32::from_str_radix(digits, 8).ok()
        }
        _ => None,
    };

    match mode {
        Some(mode) if mode <= 0o777 => Ok(mode),
        _ => Err(SettingsError::InvalidValue(format!(
            "Cannot use {} as a socket mode",
            value
        ))),
    }
}

/// Create default settings content for a new installation
pub fn default_settings_content() -> &'static str {
    r#"# Debounced Settings
# Place this file at: /etc/debounced/settings.toml
# Debounce window, mode and FlashTap pairs are chosen per START by debouncectl.

[control]
socket_path = "/run/debounced.sock"
# Permissions applied to the control socket
socket_mode = "0666"

[engine]
# START requests above this window are clamped to it
max_debounce_ms = 250

[output]
virtual_device_name = "debounced-virtual-keyboard"
"#
}
