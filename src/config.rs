//! Configuration and color scheme management for termfeed.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.termfeed/config.toml`
//! - Server URL validation
//! - Built-in status bar color schemes
//!
//! # Configuration File
//!
//! ```toml
//! # Web terminal server
//! server = "http://127.0.0.1:8080"
//! connect_timeout_secs = 10
//!
//! # Color scheme: default, solarized-dark, monokai, nord, dracula,
//! #               gruvbox-dark, tokyo-night
//! color_scheme = "nord"
//!
//! [status_bar]
//! visible = true
//!
//! [input]
//! forward = false
//! linefeed_newline = false
//! application_cursor = false
//! ```

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::ui::InputModes;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid server URL '{url}': {source}")]
    InvalidServer {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported server URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("Failed to read config file: {0}")]
    Read(#[from] io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the web terminal server
    pub server: String,
    /// Connect timeout for every request, in seconds
    pub connect_timeout_secs: u64,
    /// Color scheme name
    pub color_scheme: String,
    /// Status bar settings
    pub status_bar: StatusBarConfig,
    /// Input forwarding settings
    pub input: InputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            connect_timeout_secs: 10,
            color_scheme: "default".to_string(),
            status_bar: StatusBarConfig::default(),
            input: InputConfig::default(),
        }
    }
}

/// Status bar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusBarConfig {
    pub visible: bool,
}

impl Default for StatusBarConfig {
    fn default() -> Self {
        Self { visible: true }
    }
}

/// Input forwarding configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Send key presses to the remote terminal
    pub forward: bool,
    pub linefeed_newline: bool,
    pub application_cursor: bool,
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::get_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path)
            .map_err(ConfigError::from)
            .and_then(|content| Self::from_toml(&content))
        {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Directory holding the config and log files
    pub fn dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".termfeed"))
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        Self::dir().map(|dir| dir.join("config.toml"))
    }

    /// Parsed and validated server base URL
    pub fn server_url(&self) -> Result<Url> {
        let url = Url::parse(&self.server).map_err(|source| ConfigError::InvalidServer {
            url: self.server.clone(),
            source,
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn input_modes(&self) -> InputModes {
        InputModes {
            linefeed_newline: self.input.linefeed_newline,
            application_cursor: self.input.application_cursor,
        }
    }

    /// Get the color scheme
    pub fn get_color_scheme(&self) -> ColorScheme {
        ColorScheme::by_name(&self.color_scheme)
    }
}

/// Color definition (RGB)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(&self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Status bar color scheme
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorScheme {
    pub name: String,

    // Normal status
    pub status_bar_bg: Color,
    pub status_bar_fg: Color,

    // Notices and ended sessions
    pub status_alert_bg: Color,
    pub status_alert_fg: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::default_scheme()
    }
}

impl ColorScheme {
    /// Default color scheme
    pub fn default_scheme() -> Self {
        Self {
            name: "default".to_string(),
            status_bar_bg: Color::new(0, 100, 0),
            status_bar_fg: Color::new(255, 255, 255),
            status_alert_bg: Color::new(200, 200, 0),
            status_alert_fg: Color::new(0, 0, 0),
        }
    }

    /// Solarized Dark scheme
    pub fn solarized_dark() -> Self {
        Self {
            name: "solarized-dark".to_string(),
            status_bar_bg: Color::new(7, 54, 66),
            status_bar_fg: Color::new(147, 161, 161),
            status_alert_bg: Color::new(181, 137, 0),
            status_alert_fg: Color::new(0, 43, 54),
        }
    }

    /// Monokai scheme
    pub fn monokai() -> Self {
        Self {
            name: "monokai".to_string(),
            status_bar_bg: Color::new(60, 60, 54),
            status_bar_fg: Color::new(248, 248, 242),
            status_alert_bg: Color::new(249, 38, 114),
            status_alert_fg: Color::new(248, 248, 242),
        }
    }

    /// Nord scheme
    pub fn nord() -> Self {
        Self {
            name: "nord".to_string(),
            status_bar_bg: Color::new(59, 66, 82),
            status_bar_fg: Color::new(216, 222, 233),
            status_alert_bg: Color::new(163, 190, 140),
            status_alert_fg: Color::new(46, 52, 64),
        }
    }

    /// Dracula scheme
    pub fn dracula() -> Self {
        Self {
            name: "dracula".to_string(),
            status_bar_bg: Color::new(68, 71, 90),
            status_bar_fg: Color::new(248, 248, 242),
            status_alert_bg: Color::new(80, 250, 123),
            status_alert_fg: Color::new(40, 42, 54),
        }
    }

    /// Gruvbox Dark scheme
    pub fn gruvbox_dark() -> Self {
        Self {
            name: "gruvbox-dark".to_string(),
            status_bar_bg: Color::new(60, 56, 54),
            status_bar_fg: Color::new(235, 219, 178),
            status_alert_bg: Color::new(152, 151, 26),
            status_alert_fg: Color::new(40, 40, 40),
        }
    }

    /// Tokyo Night scheme
    pub fn tokyo_night() -> Self {
        Self {
            name: "tokyo-night".to_string(),
            status_bar_bg: Color::new(36, 40, 59),
            status_bar_fg: Color::new(169, 177, 214),
            status_alert_bg: Color::new(158, 206, 106),
            status_alert_fg: Color::new(26, 27, 38),
        }
    }

    /// Get scheme by name
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "solarized-dark" | "solarized_dark" => Self::solarized_dark(),
            "monokai" => Self::monokai(),
            "nord" => Self::nord(),
            "dracula" => Self::dracula(),
            "gruvbox-dark" | "gruvbox_dark" | "gruvbox" => Self::gruvbox_dark(),
            "tokyo-night" | "tokyo_night" | "tokyonight" => Self::tokyo_night(),
            _ => Self::default_scheme(),
        }
    }

    /// List available schemes
    pub fn list() -> Vec<&'static str> {
        vec![
            "default",
            "solarized-dark",
            "monokai",
            "nord",
            "dracula",
            "gruvbox-dark",
            "tokyo-night",
        ]
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
