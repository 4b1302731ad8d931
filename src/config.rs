//! Configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Add-in configuration.
#[derive(Debug, Clone)]
pub struct AddinConfig {
    /// Product name used in captions and the menu entry.
    pub product_name: String,
    /// Prefix the host puts in front of every command name.
    pub command_namespace: String,
    /// Name of the output pane diagnostics go to.
    pub output_pane: String,
    /// Top-level menu the product popup is added to.
    pub menu_bar: String,
    /// Position of the popup inside `menu_bar` (1-based).
    pub menu_position: u32,
    /// Bitmap resource id of the tool window icon.
    pub tool_window_icon: u32,
    /// Service endpoint handed to the controller.
    pub endpoint: String,
    /// Time-tracking repository directory handed to the controller.
    pub data_dir: Option<PathBuf>,
    /// Latency of the simulated controller.
    pub connect_latency: Duration,
}

impl Default for AddinConfig {
    fn default() -> Self {
        Self {
            product_name: "Tracker".to_string(),
            command_namespace: "Tracker.Connect".to_string(),
            output_pane: "Tracker".to_string(),
            menu_bar: "Tools".to_string(),
            menu_position: 1,
            tool_window_icon: 1,
            endpoint: "https://tracker.example".to_string(),
            data_dir: None,
            connect_latency: Duration::from_millis(250),
        }
    }
}

impl AddinConfig {
    /// Build config from `TRACKER_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let menu_position: u32 = std::env::var("TRACKER_MENU_POSITION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.menu_position);

        let latency_ms: u64 = std::env::var("TRACKER_CONNECT_LATENCY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.connect_latency.as_millis() as u64);

        Self {
            product_name: std::env::var("TRACKER_PRODUCT_NAME").unwrap_or(defaults.product_name),
            command_namespace: std::env::var("TRACKER_COMMAND_NAMESPACE")
                .unwrap_or(defaults.command_namespace),
            output_pane: std::env::var("TRACKER_OUTPUT_PANE").unwrap_or(defaults.output_pane),
            menu_bar: std::env::var("TRACKER_MENU_BAR").unwrap_or(defaults.menu_bar),
            menu_position,
            tool_window_icon: defaults.tool_window_icon,
            endpoint: std::env::var("TRACKER_ENDPOINT").unwrap_or(defaults.endpoint),
            data_dir: std::env::var("TRACKER_DATA_DIR").ok().map(PathBuf::from),
            connect_latency: Duration::from_millis(latency_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.product_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "product_name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.command_namespace.trim().is_empty() || self.command_namespace.ends_with('.') {
            return Err(ConfigError::InvalidValue {
                key: "command_namespace".to_string(),
                message: format!("'{}' is not a valid namespace", self.command_namespace),
            });
        }
        if self.menu_position == 0 {
            return Err(ConfigError::InvalidValue {
                key: "menu_position".to_string(),
                message: "positions are 1-based".to_string(),
            });
        }
        Ok(())
    }

    /// Create the data directory if one is configured.
    pub fn ensure_data_dir(&self) -> Result<Option<&Path>, ConfigError> {
        match &self.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Ok(Some(dir.as_path()))
            }
            None => Ok(None),
        }
    }

    /// `"<Product> Window"`, the prefix of every tool window caption.
    pub fn window_title(&self) -> String {
        format!("{} Window", self.product_name)
    }
}

/// User preferences the add-in reads. Persistence belongs to the host.
pub trait Settings: Send + Sync {
    fn auto_login(&self) -> bool;
}

/// Fixed settings, for embedding and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSettings {
    pub auto_login: bool,
}

impl Settings for StaticSettings {
    fn auto_login(&self) -> bool {
        self.auto_login
    }
}

/// Reads `TRACKER_AUTO_LOGIN` each time it is consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSettings;

impl Settings for EnvSettings {
    fn auto_login(&self) -> bool {
        std::env::var("TRACKER_AUTO_LOGIN")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    }
}
