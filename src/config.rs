//! Configuration management for Quartz Keyboard
//!
//! Provides persistent configuration that is loaded from a platform-specific
//! config file.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/quartz-keyboard/config.toml` |
//! | macOS | `~/Library/Application Support/quartz-keyboard/config.toml` |
//! | Windows | `%APPDATA%\quartz-keyboard\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use quartz_keyboard::Config;
//!
//! // Load existing config or use defaults
//! let mut config = Config::load().unwrap_or_default();
//!
//! // Modify settings
//! config.hotkeys.push("<cmd>+<shift>+k".to_string());
//!
//! // Save to disk
//! config.save().expect("Failed to save config");
//! ```

use crate::keyboard::{HotKey, HotKeyError, LayoutMapping};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to determine config directory
    NoConfigDir,
    /// IO error reading or writing config file
    Io(io::Error),
    /// Failed to parse config file
    Parse(toml::de::Error),
    /// Failed to serialize config
    Serialize(toml::ser::Error),
    /// Layout override key is not a single character
    InvalidKey(String),
    /// Hot key description could not be parsed
    HotKey(HotKeyError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NoConfigDir => write!(f, "Could not determine config directory"),
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Serialize(e) => write!(f, "Serialize error: {}", e),
            ConfigError::InvalidKey(key) => {
                write!(f, "Layout override '{}' is not a single character", key)
            }
            ConfigError::HotKey(e) => write!(f, "Hot key error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        ConfigError::Serialize(e)
    }
}

impl From<HotKeyError> for ConfigError {
    fn from(e: HotKeyError) -> Self {
        ConfigError::HotKey(e)
    }
}

/// Returns the path to the config file.
///
/// Creates the config directory if it doesn't exist.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    let app_dir = config_dir.join("quartz-keyboard");

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }

    Ok(app_dir.join("config.toml"))
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default log filter, used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Hot keys reported by the interpreter front end
    #[serde(default)]
    pub hotkeys: Vec<String>,
    /// Keyboard layout used for character synthesis
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            hotkeys: Vec::new(),
            layout: LayoutConfig::default(),
        }
    }
}

/// Starting table for the layout mapping
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutBase {
    /// US ANSI positions
    #[default]
    UsAnsi,
    /// No entries; every character is sent as Unicode
    Empty,
}

/// Layout mapping configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub base: LayoutBase,
    /// Character to scan code entries added on top of the base
    #[serde(default)]
    pub overrides: BTreeMap<String, u16>,
}

impl LayoutConfig {
    /// Build the layout mapping described by this configuration
    pub fn mapping(&self) -> Result<LayoutMapping, ConfigError> {
        let base = match self.base {
            LayoutBase::UsAnsi => LayoutMapping::us_ansi(),
            LayoutBase::Empty => LayoutMapping::empty(),
        };

        let mut overrides = Vec::with_capacity(self.overrides.len());
        for (key, vk) in &self.overrides {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => overrides.push((ch, *vk)),
                _ => return Err(ConfigError::InvalidKey(key.clone())),
            }
        }
        Ok(base.with_overrides(overrides))
    }
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Layout mapping for the controller
    pub fn layout_mapping(&self) -> Result<LayoutMapping, ConfigError> {
        self.layout.mapping()
    }

    /// Parsed hot keys, paired with their descriptions
    pub fn parsed_hotkeys(&self) -> Result<Vec<(String, HotKey)>, ConfigError> {
        self.hotkeys
            .iter()
            .map(|description| Ok((description.clone(), HotKey::parse(description)?)))
            .collect()
    }
}
